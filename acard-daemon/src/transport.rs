//! Accessory transport over TCP: each accepted connection is a peer agent asking for the service.
//! Reader tasks turn link messages into core events; writer tasks drain a per-connection queue.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use acard_core::{Channel, ConnectionResult, Event, PeerId, SendError, ACCESSORY_CHANNEL_ID};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::coordinator::PeerControl;
use crate::link::{self, LinkMessage};

/// Loss reason: peer closed the stream.
pub const LOST_PEER_CLOSED: i32 = 1;
/// Loss reason: read failed.
pub const LOST_IO_ERROR: i32 = 2;
/// Loss reason: peer sent something that is not a link message.
pub const LOST_PROTOCOL_ERROR: i32 = 3;

pub type EventSender = mpsc::UnboundedSender<Event<LinkChannel>>;

/// Session channel: queues DATA messages on the connection's writer task.
#[derive(Clone)]
pub struct LinkChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Channel for LinkChannel {
    fn secure_send(&self, channel_id: u16, data: &[u8]) -> Result<(), SendError> {
        self.tx
            .send(link::data_body(channel_id, data))
            .map_err(|_| SendError::Closed)
    }
}

struct Connection {
    writer: mpsc::UnboundedSender<Vec<u8>>,
    accepted: bool,
}

#[derive(Clone)]
pub struct LinkTransport {
    connections: Arc<Mutex<HashMap<PeerId, Connection>>>,
    events: EventSender,
}

impl LinkTransport {
    pub fn new(events: EventSender) -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Listen for peer agents and serve each connection on its own task.
    pub async fn run(self, port: u16) -> io::Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!(port, "accessory link listening");
        loop {
            let (stream, addr) = listener.accept().await?;
            let _ = stream.set_nodelay(true);
            tokio::spawn(self.clone().serve(stream, PeerId::new(addr.to_string())));
        }
    }

    /// Serve one connection until it closes. Generic so tests can use in-memory streams.
    pub async fn serve<S>(self, stream: S, peer: PeerId)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().insert(
            peer.clone(),
            Connection {
                writer: tx,
                accepted: false,
            },
        );
        tokio::spawn(write_loop(writer, rx));
        let _ = self.events.send(Event::ConnectionRequested(peer.clone()));

        let reason = loop {
            let body = match link::read_message(&mut reader).await {
                Ok(Some(body)) => body,
                Ok(None) => break LOST_PEER_CLOSED,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "link read failed");
                    break LOST_IO_ERROR;
                }
            };
            match link::decode(&body) {
                Ok(LinkMessage::AuthResponse { token, error }) => {
                    let _ = self.events.send(Event::AuthenticationResponse {
                        peer: peer.clone(),
                        token,
                        error,
                    });
                }
                Ok(LinkMessage::Data {
                    channel_id,
                    payload,
                }) => {
                    if channel_id != ACCESSORY_CHANNEL_ID {
                        tracing::debug!(%peer, channel_id, "data on foreign channel ignored");
                    } else if self.is_accepted(&peer) {
                        let _ = self.events.send(Event::FrameReceived(payload));
                    } else {
                        tracing::warn!(%peer, "data before accept dropped");
                    }
                }
                Ok(other) => {
                    tracing::debug!(%peer, ?other, "unexpected link message from peer");
                }
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "malformed link message");
                    break LOST_PROTOCOL_ERROR;
                }
            }
        };

        let was_accepted = self
            .connections
            .lock()
            .remove(&peer)
            .map(|c| c.accepted)
            .unwrap_or(false);
        if was_accepted {
            let _ = self.events.send(Event::ConnectionLost { peer, reason });
        } else {
            tracing::debug!(%peer, reason, "unauthenticated connection closed");
        }
    }

    fn is_accepted(&self, peer: &PeerId) -> bool {
        self.connections
            .lock()
            .get(peer)
            .map(|c| c.accepted)
            .unwrap_or(false)
    }

    fn send_link(&self, peer: &PeerId, msg: &LinkMessage) -> bool {
        match self.connections.lock().get(peer) {
            Some(conn) => conn.writer.send(link::encode(msg)).is_ok(),
            None => false,
        }
    }
}

impl PeerControl for LinkTransport {
    fn authenticate(&self, peer: &PeerId) {
        if !self.send_link(peer, &LinkMessage::AuthChallenge) {
            tracing::debug!(%peer, "challenge for closed connection");
        }
    }

    /// Accept the peer and report the connection result. Only one accepted connection may
    /// exist; a second one is reported as already existing and closed. The result event is
    /// queued before ACCEPT reaches the peer, so no DATA from the peer can overtake it.
    fn accept(&self, peer: &PeerId) {
        let (writer, result) = {
            let mut conns = self.connections.lock();
            let other_accepted = conns.iter().any(|(p, c)| p != peer && c.accepted);
            if other_accepted {
                conns.remove(peer);
                (None, ConnectionResult::AlreadyExists)
            } else {
                match conns.get_mut(peer) {
                    Some(conn) => {
                        conn.accepted = true;
                        (Some(conn.writer.clone()), ConnectionResult::Success)
                    }
                    None => (None, ConnectionResult::Failed(LOST_PEER_CLOSED)),
                }
            }
        };
        let _ = self.events.send(Event::ConnectionResponse {
            peer: peer.clone(),
            channel: writer.clone().map(|tx| LinkChannel { tx }),
            result,
        });
        if let Some(writer) = writer {
            let _ = writer.send(link::encode(&LinkMessage::Accept));
        }
    }

    /// Refuse the peer. Dropping the queue ends the writer task, which closes the stream.
    /// An accepted connection is left alone; its session ends only when the peer goes away.
    fn reject(&self, peer: &PeerId) {
        let mut conns = self.connections.lock();
        match conns.get(peer) {
            Some(conn) if conn.accepted => {
                tracing::warn!(%peer, "reject for accepted connection ignored");
            }
            Some(conn) => {
                let _ = conn.writer.send(link::encode(&LinkMessage::Reject));
                conns.remove(peer);
            }
            None => tracing::debug!(%peer, "reject for closed connection"),
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(body) = rx.recv().await {
        if let Err(e) = link::write_message(&mut writer, &body).await {
            tracing::debug!(error = %e, "link write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
