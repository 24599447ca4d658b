//! Peer discovery results. The scan itself is done by the host.

use crate::protocol::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    PeerFound,
    ServiceNotFound,
    DeviceNotConnected,
    /// Status code the transport reported that has no meaning here.
    Unknown(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub peers: Vec<PeerId>,
    pub status: DiscoveryStatus,
}

impl DiscoveryReport {
    pub fn new(peers: Vec<PeerId>, status: DiscoveryStatus) -> Self {
        Self { peers, status }
    }

    pub fn found(&self) -> bool {
        self.status == DiscoveryStatus::PeerFound && !self.peers.is_empty()
    }
}
