//! ACard bridge: session and framing protocol between a host and a smartcard-emulation peer.
//! Host-driven: no I/O; host passes transport events and receives actions.

pub mod auth;
pub mod core;
pub mod discovery;
pub mod dispatch;
pub mod emulator;
pub mod identity;
pub mod protocol;
pub mod session;
pub mod wire;

pub use auth::{AuthGate, AuthState, RejectReason, Verdict};
pub use crate::core::{Action, BridgeCore, Event, Notice};
pub use discovery::{DiscoveryReport, DiscoveryStatus};
pub use dispatch::Dispatcher;
pub use emulator::Emulator;
pub use identity::{Credential, IdentityError, IdentityProvider};
pub use protocol::{
    AuthToken, AuthenticationType, ConnectionResult, PeerId, ACCESSORY_CHANNEL_ID,
};
pub use session::{Channel, SendError, SendOutcome, SessionContext, SessionHandle};
pub use wire::{decode_frame, encode_frame, FrameDecodeError};
