//! Host-driven API: BridgeCore receives transport events from the host, returns actions.

use std::sync::Arc;

use crate::auth::{AuthGate, ConnectionDecision, Verdict};
use crate::discovery::{DiscoveryReport, DiscoveryStatus};
use crate::dispatch::Dispatcher;
use crate::emulator::Emulator;
use crate::identity::IdentityProvider;
use crate::protocol::{AuthToken, ConnectionResult, PeerId};
use crate::session::{Channel, SessionHandle};

/// Transport callback, turned into a value so one task can process them in order.
pub enum Event<C> {
    PeersFound(DiscoveryReport),
    ConnectionRequested(PeerId),
    AuthenticationResponse {
        peer: PeerId,
        token: Option<AuthToken>,
        error: i32,
    },
    ConnectionResponse {
        peer: PeerId,
        channel: Option<C>,
        result: ConnectionResult,
    },
    FrameReceived(Vec<u8>),
    ConnectionLost {
        peer: PeerId,
        reason: i32,
    },
}

/// Action for host to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Issue the certificate challenge to the peer.
    Authenticate(PeerId),
    Accept(PeerId),
    Reject(PeerId),
    /// Hand the frame to the send worker.
    Transmit(Vec<u8>),
    Notify(Notice),
}

/// User-facing notification. The host decides how to surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ConnectionEstablished,
    ConnectionLost,
}

/// Main coordinator. Not shared: exactly one task owns it and feeds it events.
pub struct BridgeCore<C: Channel> {
    gate: AuthGate,
    session: SessionHandle<C>,
    dispatcher: Dispatcher,
    identity: Arc<dyn IdentityProvider>,
}

impl<C: Channel> BridgeCore<C> {
    pub fn new(emulator: Arc<dyn Emulator>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_session(SessionHandle::new(), emulator, identity)
    }

    /// Build around an existing session handle (shared with the send worker).
    pub fn with_session(
        session: SessionHandle<C>,
        emulator: Arc<dyn Emulator>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            gate: AuthGate::new(),
            session,
            dispatcher: Dispatcher::new(emulator),
            identity,
        }
    }

    pub fn session(&self) -> &SessionHandle<C> {
        &self.session
    }

    pub fn on_event(&mut self, event: Event<C>) -> Vec<Action> {
        match event {
            Event::PeersFound(report) => {
                self.on_peers_found(report);
                Vec::new()
            }
            Event::ConnectionRequested(peer) => self.on_connection_requested(peer),
            Event::AuthenticationResponse { peer, token, error } => {
                self.on_authentication_response(peer, token, error)
            }
            Event::ConnectionResponse {
                peer,
                channel,
                result,
            } => self.on_connection_response(peer, channel, result),
            Event::FrameReceived(data) => self.on_frame_received(&data),
            Event::ConnectionLost { peer, reason } => self.on_connection_lost(&peer, reason),
        }
    }

    /// Discovery result. Logged only; the bridge waits for peers to request a connection.
    pub fn on_peers_found(&mut self, report: DiscoveryReport) {
        if report.found() {
            tracing::info!(count = report.peers.len(), "peer agents found");
            for peer in &report.peers {
                tracing::debug!(%peer, "peer agent");
            }
            return;
        }
        match report.status {
            DiscoveryStatus::PeerFound => {
                tracing::warn!("find peers: success without any peer");
            }
            DiscoveryStatus::ServiceNotFound => {
                tracing::warn!("find peers: service not found on peer");
            }
            DiscoveryStatus::DeviceNotConnected => {
                tracing::warn!("find peers: device not connected");
            }
            DiscoveryStatus::Unknown(code) => {
                tracing::warn!(code, "find peers: unrecognized result");
            }
        }
    }

    pub fn on_connection_requested(&mut self, peer: PeerId) -> Vec<Action> {
        tracing::info!(%peer, "service connection requested");
        self.gate.on_connection_requested(peer.clone());
        vec![Action::Authenticate(peer)]
    }

    /// Peer answered the challenge. Emits exactly one of Accept / Reject, or nothing when the
    /// peer already owns the session.
    pub fn on_authentication_response(
        &mut self,
        peer: PeerId,
        token: Option<AuthToken>,
        error: i32,
    ) -> Vec<Action> {
        if self.session.context().is_some_and(|ctx| ctx.peer == peer) {
            tracing::warn!(%peer, error, "authentication response for connected peer ignored");
            return Vec::new();
        }
        let local = self.identity.local_credential();
        let verdict = self
            .gate
            .on_authentication_response(&peer, token.as_ref(), &local);
        match verdict {
            Verdict::Accept => {
                tracing::info!(%peer, error, key = %local.fingerprint(), "peer authenticated");
                vec![Action::Accept(peer)]
            }
            Verdict::Reject(reason) => {
                tracing::warn!(%peer, error, ?reason, "peer rejected");
                self.gate.forget(&peer);
                vec![Action::Reject(peer)]
            }
        }
    }

    pub fn on_connection_response(
        &mut self,
        peer: PeerId,
        channel: Option<C>,
        result: ConnectionResult,
    ) -> Vec<Action> {
        if self.gate.on_connection_response(&peer, result) != ConnectionDecision::Establish {
            return Vec::new();
        }
        let Some(channel) = channel else {
            tracing::warn!(%peer, "connection success without a socket");
            return Vec::new();
        };
        let ctx = self.session.establish(peer, channel);
        tracing::info!(session = %ctx.id, peer = %ctx.peer, "connection established");
        vec![Action::Notify(Notice::ConnectionEstablished)]
    }

    /// Inbound frame. Dropped without touching the emulator when no session is active.
    pub fn on_frame_received(&mut self, data: &[u8]) -> Vec<Action> {
        let Some(ctx) = self.session.context() else {
            tracing::debug!(len = data.len(), "frame without active session dropped");
            return Vec::new();
        };
        match self.dispatcher.on_frame(&ctx, data) {
            Some(frame) => vec![Action::Transmit(frame)],
            None => Vec::new(),
        }
    }

    /// Connection lost. Clears the session, deactivates the emulator and notifies the user.
    pub fn on_connection_lost(&mut self, peer: &PeerId, reason: i32) -> Vec<Action> {
        match self.session.context() {
            Some(ctx) if &ctx.peer == peer => {}
            _ => {
                tracing::debug!(%peer, reason, "loss of connection without session ignored");
                return Vec::new();
            }
        }
        if let Some(ctx) = self.session.clear() {
            tracing::info!(session = %ctx.id, %peer, reason, "connection lost");
        }
        self.dispatcher.emulator().deactivate();
        vec![Action::Notify(Notice::ConnectionLost)]
    }
}
