//! Send worker: one task drains the outbound queue onto the current session, so the
//! coordinator never waits on the transport.

use acard_core::{Channel, SendOutcome, SessionHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct SendWorker {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl SendWorker {
    /// Spawn the sender task for `session`. It stops once every `SendWorker` clone is dropped.
    pub fn spawn<C: Channel>(session: SessionHandle<C>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(session, rx));
        (Self { tx }, handle)
    }

    /// Queue a frame for transmission. Never blocks.
    pub fn submit(&self, frame: Vec<u8>) {
        if self.tx.send(frame).is_err() {
            tracing::warn!("send worker stopped; frame dropped");
        }
    }
}

async fn run<C: Channel>(session: SessionHandle<C>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        match session.try_send(&frame) {
            Ok(SendOutcome::Sent) => {
                tracing::trace!(len = frame.len(), "frame sent");
            }
            Ok(SendOutcome::NoSession) => {
                tracing::debug!(len = frame.len(), "no session; frame dropped");
            }
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "send failed; frame dropped");
            }
        }
    }
}
