//! Bridge protocol: frame tags, channel id and the transport-level types shared by all components.

use crate::identity::Credential;

/// Logical accessory channel every frame travels on.
pub const ACCESSORY_CHANNEL_ID: u16 = 104;

/// Tag of an APDU frame (`'d'`).
pub const TAG_APDU: u8 = b'd';
/// Tag of an AID-list frame (`'a'`).
pub const TAG_AID_LIST: u8 = b'a';
/// Separator used when serializing the AID list.
pub const AID_SEPARATOR: &str = ",";

/// Opaque handle to a remote agent. Referenced, never mutated.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(name: impl Into<String>) -> Self {
        PeerId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inbound request decoded from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// Raw APDU command bytes.
    Apdu(&'a [u8]),
    /// Request for the registered AID list. Any payload is ignored.
    AidList,
}

/// Outbound response to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Apdu(Vec<u8>),
    AidList(Vec<String>),
}

/// Credential kind carried by an authentication token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationType {
    CertificateX509,
    Other(u8),
}

/// Credential a peer presents in answer to the authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub auth_type: AuthenticationType,
    pub key: Credential,
}

/// Outcome the transport reports after a connection was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionResult {
    Success,
    AlreadyExists,
    Failed(i32),
}
