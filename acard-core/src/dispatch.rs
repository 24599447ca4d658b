//! Frame dispatch: decode an inbound frame, call the emulator, frame the response.

use std::sync::Arc;

use crate::emulator::Emulator;
use crate::protocol::{Request, Response};
use crate::session::SessionContext;
use crate::wire::{self, FrameDecodeError};

pub struct Dispatcher {
    emulator: Arc<dyn Emulator>,
}

impl Dispatcher {
    pub fn new(emulator: Arc<dyn Emulator>) -> Self {
        Self { emulator }
    }

    /// Handle one inbound frame. Returns the outbound frame, or `None` when the frame is
    /// malformed and no response must be sent.
    pub fn on_frame(&self, ctx: &SessionContext, raw: &[u8]) -> Option<Vec<u8>> {
        let response = match wire::decode_frame(raw) {
            Ok(Request::Apdu(apdu)) => {
                tracing::debug!(session = %ctx.id, len = apdu.len(), "apdu request");
                Response::Apdu(self.emulator.process(ctx, apdu))
            }
            Ok(Request::AidList) => {
                tracing::debug!(session = %ctx.id, "aid list request");
                Response::AidList(self.emulator.registered_aids(ctx))
            }
            Err(FrameDecodeError::Empty) => {
                tracing::error!(session = %ctx.id, "empty frame from consumer");
                return None;
            }
            Err(FrameDecodeError::UnknownTag { tag, raw }) => {
                tracing::error!(session = %ctx.id, tag, "unknown message from consumer: {}", raw);
                return None;
            }
        };
        Some(wire::encode_frame(&response))
    }

    pub fn emulator(&self) -> &Arc<dyn Emulator> {
        &self.emulator
    }
}
