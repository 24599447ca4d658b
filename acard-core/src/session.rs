//! Session: the one live channel to an authenticated peer.
//!
//! [`SessionHandle`] is cloned between the coordinator (which establishes and clears it) and the
//! send worker (which reads it on every send). Both go through the same mutex, so a send never
//! observes a half-replaced session; an absent session just drops the frame.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::protocol::{PeerId, ACCESSORY_CHANNEL_ID};

/// Duplex channel handed over by the transport once a connection is established.
pub trait Channel: Clone + Send + Sync + 'static {
    /// Guaranteed-delivery send on a logical channel.
    fn secure_send(&self, channel_id: u16, data: &[u8]) -> Result<(), SendError>;
}

/// Identity of the current session, passed to the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub id: Uuid,
    pub peer: PeerId,
}

struct ActiveSession<C> {
    context: SessionContext,
    channel: C,
}

/// Result of a send attempt that did not fail at the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// No session is active; nothing was transmitted.
    NoSession,
}

pub struct SessionHandle<C: Channel> {
    inner: Arc<Mutex<Option<ActiveSession<C>>>>,
}

impl<C: Channel> Clone for SessionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Channel> SessionHandle<C> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Store `channel` as the current session. Replaces any existing session.
    pub fn establish(&self, peer: PeerId, channel: C) -> SessionContext {
        let context = SessionContext {
            id: Uuid::new_v4(),
            peer,
        };
        let previous = self.inner.lock().replace(ActiveSession {
            context: context.clone(),
            channel,
        });
        if let Some(prev) = previous {
            tracing::warn!(
                session = %prev.context.id,
                peer = %prev.context.peer,
                "session replaced by new connection"
            );
        }
        context
    }

    /// Drop the current session. Returns its context if one was active.
    pub fn clear(&self) -> Option<SessionContext> {
        self.inner.lock().take().map(|s| s.context)
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn context(&self) -> Option<SessionContext> {
        self.inner.lock().as_ref().map(|s| s.context.clone())
    }

    /// Send `data` on the accessory channel of the current session.
    /// The lock is released before the transport is called.
    pub fn try_send(&self, data: &[u8]) -> Result<SendOutcome, SendError> {
        let channel = match self.inner.lock().as_ref() {
            Some(s) => s.channel.clone(),
            None => return Ok(SendOutcome::NoSession),
        };
        channel.secure_send(ACCESSORY_CHANNEL_ID, data)?;
        Ok(SendOutcome::Sent)
    }
}

impl<C: Channel> Default for SessionHandle<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel closed")]
    Closed,
}
