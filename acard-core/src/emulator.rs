//! Emulator collaborator. Card emulation itself lives behind this trait; the bridge only forwards.

use crate::session::SessionContext;

/// Smartcard emulator bound to the bridge. Activation is construction; the host builds one
/// instance at startup and injects it into [`crate::BridgeCore`].
pub trait Emulator: Send + Sync {
    /// Execute one APDU exchange and return the raw response (data + status word).
    fn process(&self, ctx: &SessionContext, apdu: &[u8]) -> Vec<u8>;

    /// Registered AIDs, in registry order.
    fn registered_aids(&self, ctx: &SessionContext) -> Vec<String>;

    /// Release in-progress emulation state. Called when the session is lost.
    fn deactivate(&self);
}
