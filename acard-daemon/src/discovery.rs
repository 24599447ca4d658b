//! Peer directory: one UDP multicast probe after startup, replies collected for a short window.
//! Best-effort; the result is reported to the coordinator and never retried.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use acard_core::{DiscoveryReport, DiscoveryStatus, Event, PeerId};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::transport::EventSender;

/// Multicast group (same subnet).
const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 60, 104);
const PROBE: &[u8] = b"ACRD?";
const REPLY_MAGIC: &[u8] = b"ACRD";

const STATUS_SERVICE_PRESENT: u8 = 0;
const STATUS_SERVICE_ABSENT: u8 = 1;

/// Parsed reply to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Service,
    NoService,
    Unknown(u8),
}

/// Parse one datagram. `None` if it is not a reply (including our own probe echoed back).
pub fn parse_reply(buf: &[u8]) -> Option<Reply> {
    let rest = buf.strip_prefix(REPLY_MAGIC)?;
    match rest {
        [STATUS_SERVICE_PRESENT, ..] => Some(Reply::Service),
        [STATUS_SERVICE_ABSENT, ..] => Some(Reply::NoService),
        [other, ..] => Some(Reply::Unknown(*other)),
        [] => None,
    }
}

/// Turn collected replies into a discovery report.
pub fn classify(replies: &[(SocketAddr, Reply)]) -> DiscoveryReport {
    let peers: Vec<PeerId> = replies
        .iter()
        .filter(|(_, r)| *r == Reply::Service)
        .map(|(addr, _)| PeerId::new(addr.to_string()))
        .collect();
    if !peers.is_empty() {
        return DiscoveryReport::new(peers, DiscoveryStatus::PeerFound);
    }
    let status = replies
        .iter()
        .find_map(|(_, r)| match r {
            Reply::Unknown(code) => Some(DiscoveryStatus::Unknown(i32::from(*code))),
            _ => None,
        })
        .unwrap_or(if replies.is_empty() {
            DiscoveryStatus::DeviceNotConnected
        } else {
            DiscoveryStatus::ServiceNotFound
        });
    DiscoveryReport::new(Vec::new(), status)
}

/// Probe once and collect replies until `window` elapses.
pub async fn discover(discovery_port: u16, window: Duration) -> DiscoveryReport {
    match probe(discovery_port, window).await {
        Ok(replies) => classify(&replies),
        Err(e) => {
            tracing::warn!(error = %e, "discovery probe failed");
            DiscoveryReport::new(Vec::new(), DiscoveryStatus::DeviceNotConnected)
        }
    }
}

async fn probe(discovery_port: u16, window: Duration) -> std::io::Result<Vec<(SocketAddr, Reply)>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_multicast_ttl_v4(1)?;
    socket
        .send_to(PROBE, SocketAddr::from((MULTICAST_GROUP, discovery_port)))
        .await?;

    let deadline = Instant::now() + window;
    let mut buf = [0u8; 512];
    let mut replies = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => {
                if let Some(reply) = parse_reply(&buf[..n]) {
                    tracing::debug!(%from, ?reply, "discovery reply");
                    replies.push((from, reply));
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }
    Ok(replies)
}

/// Run discovery once and hand the result to the coordinator.
pub async fn run_discovery(discovery_port: u16, window: Duration, events: EventSender) {
    let report = discover(discovery_port, window).await;
    let _ = events.send(Event::PeersFound(report));
}
