//! Framing: one tag byte followed by the payload. The transport preserves message boundaries,
//! so there is no length prefix.

use crate::protocol::{Request, Response, AID_SEPARATOR, TAG_AID_LIST, TAG_APDU};

/// Decode an inbound frame into a request.
pub fn decode_frame(bytes: &[u8]) -> Result<Request<'_>, FrameDecodeError> {
    let (&tag, payload) = bytes.split_first().ok_or(FrameDecodeError::Empty)?;
    match tag {
        TAG_APDU => Ok(Request::Apdu(payload)),
        TAG_AID_LIST => Ok(Request::AidList),
        _ => Err(FrameDecodeError::UnknownTag {
            tag,
            raw: String::from_utf8_lossy(bytes).into_owned(),
        }),
    }
}

/// Encode a response: tag byte + payload.
pub fn encode_frame(response: &Response) -> Vec<u8> {
    match response {
        Response::Apdu(data) => tagged(TAG_APDU, data),
        Response::AidList(aids) => tagged(TAG_AID_LIST, aids.join(AID_SEPARATOR).as_bytes()),
    }
}

fn tagged(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(tag);
    out.extend_from_slice(payload);
    out
}

/// Error decoding an inbound frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameDecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown tag {tag:#04x} in frame {raw:?}")]
    UnknownTag { tag: u8, raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_apdu_strips_tag() {
        let raw = [0x64, 0x00, 0xA4, 0x04, 0x00];
        assert_eq!(
            decode_frame(&raw),
            Ok(Request::Apdu(&[0x00, 0xA4, 0x04, 0x00]))
        );
    }

    #[test]
    fn decode_apdu_without_payload() {
        assert_eq!(decode_frame(b"d"), Ok(Request::Apdu(&[])));
    }

    #[test]
    fn decode_aid_list_ignores_payload() {
        assert_eq!(decode_frame(b"a"), Ok(Request::AidList));
        assert_eq!(decode_frame(b"a-junk"), Ok(Request::AidList));
    }

    #[test]
    fn decode_empty() {
        assert_eq!(decode_frame(&[]), Err(FrameDecodeError::Empty));
    }

    #[test]
    fn decode_unknown_tag_keeps_raw_text() {
        match decode_frame(&[0x7A, 0x01]) {
            Err(FrameDecodeError::UnknownTag { tag, raw }) => {
                assert_eq!(tag, b'z');
                assert_eq!(raw, "z\u{1}");
            }
            other => panic!("expected UnknownTag, got {other:?}"),
        }
    }

    #[test]
    fn encode_apdu_response() {
        let frame = encode_frame(&Response::Apdu(vec![0x90, 0x00]));
        assert_eq!(frame, vec![0x64, 0x90, 0x00]);
    }

    #[test]
    fn encode_aid_list_is_comma_joined() {
        let frame = encode_frame(&Response::AidList(vec![
            "A000000003".to_string(),
            " A000000004".to_string(),
        ]));
        assert_eq!(frame[0], b'a');
        assert_eq!(&frame[1..], b"A000000003, A000000004");
    }

    #[test]
    fn encode_empty_aid_list_is_bare_tag() {
        assert_eq!(encode_frame(&Response::AidList(vec![])), b"a".to_vec());
    }
}
