//! Accessory-link model over a byte stream: length-prefix (4 bytes LE) + one-byte kind + body.
//! Stands in for the accessory SDK's socket so the session contract can run over TCP.

use std::io;

use acard_core::{AuthToken, AuthenticationType, Credential};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LEN_SIZE: usize = 4;
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024; // 1 MiB

const KIND_AUTH_CHALLENGE: u8 = 0x01;
const KIND_AUTH_RESPONSE: u8 = 0x02;
const KIND_ACCEPT: u8 = 0x03;
const KIND_REJECT: u8 = 0x04;
const KIND_DATA: u8 = 0x05;

const AUTH_TYPE_X509: u8 = 0x01;
/// kind + auth_type + error
const AUTH_RESPONSE_HEADER: usize = 1 + 1 + 4;
/// kind + channel_id
const DATA_HEADER: usize = 1 + 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMessage {
    AuthChallenge,
    AuthResponse {
        token: Option<AuthToken>,
        error: i32,
    },
    Accept,
    Reject,
    Data {
        channel_id: u16,
        payload: Vec<u8>,
    },
}

/// Encode a message body (no length prefix).
pub fn encode(msg: &LinkMessage) -> Vec<u8> {
    match msg {
        LinkMessage::AuthChallenge => vec![KIND_AUTH_CHALLENGE],
        LinkMessage::AuthResponse { token, error } => {
            let mut out = Vec::with_capacity(AUTH_RESPONSE_HEADER);
            out.push(KIND_AUTH_RESPONSE);
            // A bare kind byte is how a peer answers without a credential.
            if let Some(token) = token {
                out.push(match token.auth_type {
                    AuthenticationType::CertificateX509 => AUTH_TYPE_X509,
                    AuthenticationType::Other(t) => t,
                });
                out.extend_from_slice(&error.to_le_bytes());
                out.extend_from_slice(token.key.as_bytes());
            }
            out
        }
        LinkMessage::Accept => vec![KIND_ACCEPT],
        LinkMessage::Reject => vec![KIND_REJECT],
        LinkMessage::Data {
            channel_id,
            payload,
        } => data_body(*channel_id, payload),
    }
}

/// Body of a DATA message. Used directly by the session channel to avoid a copy into LinkMessage.
pub fn data_body(channel_id: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(DATA_HEADER + payload.len());
    out.push(KIND_DATA);
    out.extend_from_slice(&channel_id.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decode a message body.
pub fn decode(body: &[u8]) -> Result<LinkMessage, LinkDecodeError> {
    let (&kind, rest) = body.split_first().ok_or(LinkDecodeError::Empty)?;
    match kind {
        KIND_AUTH_CHALLENGE => Ok(LinkMessage::AuthChallenge),
        KIND_AUTH_RESPONSE => {
            if body.len() < AUTH_RESPONSE_HEADER {
                return Ok(LinkMessage::AuthResponse {
                    token: None,
                    error: 0,
                });
            }
            let auth_type = match rest[0] {
                AUTH_TYPE_X509 => AuthenticationType::CertificateX509,
                other => AuthenticationType::Other(other),
            };
            let error = i32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]);
            Ok(LinkMessage::AuthResponse {
                token: Some(AuthToken {
                    auth_type,
                    key: Credential::new(&body[AUTH_RESPONSE_HEADER..]),
                }),
                error,
            })
        }
        KIND_ACCEPT => Ok(LinkMessage::Accept),
        KIND_REJECT => Ok(LinkMessage::Reject),
        KIND_DATA => {
            if body.len() < DATA_HEADER {
                return Err(LinkDecodeError::Truncated);
            }
            Ok(LinkMessage::Data {
                channel_id: u16::from_le_bytes([rest[0], rest[1]]),
                payload: body[DATA_HEADER..].to_vec(),
            })
        }
        other => Err(LinkDecodeError::UnknownKind(other)),
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkDecodeError {
    #[error("empty link message")]
    Empty,
    #[error("truncated link message")]
    Truncated,
    #[error("unknown link message kind {0:#04x}")]
    UnknownKind(u8),
}

/// Read one length-prefixed body. `Ok(None)` when the stream ends at a message boundary.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; LEN_SIZE];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "link message too large",
        ));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one length-prefixed body and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    if body.len() > MAX_MESSAGE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "link message too large",
        ));
    }
    let len = body.len() as u32;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}
