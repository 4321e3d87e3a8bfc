use bytes::{BufMut, Bytes, BytesMut};

use super::{Frame, HEADER_LEN, LEN_PREFIX_LEN, MsgType, ProtoError};

// ---- Encode ---------------------------------------------------------------

/// Encodes a frame, length prefix included, ready to be written as-is.
///
/// The result is reference counted, so one encoding can be queued to many
/// connections.
pub fn encode_frame(frame: &Frame) -> Result<Bytes, ProtoError> {
    let name = frame.name_str().as_bytes();
    let text = frame.text_str().as_bytes();

    let body_len = HEADER_LEN as u64 + name.len() as u64 + text.len() as u64;
    let body_len = u32::try_from(body_len).map_err(|_| ProtoError::Unencodable(body_len))?;

    let mut buf = BytesMut::with_capacity(LEN_PREFIX_LEN + body_len as usize);
    buf.put_u32(body_len);
    buf.put_u32(frame.msg_type.as_u32());
    buf.put_u32(name.len() as u32);
    buf.put_u32(text.len() as u32);
    buf.put_slice(name);
    buf.put_slice(text);
    Ok(buf.freeze())
}

// ---- Decode ---------------------------------------------------------------

/// The fixed 12-byte header that follows the length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub msg_type: MsgType,
    pub name_len: u32,
    pub text_len: u32,
}

impl FrameHeader {
    pub fn from_bytes(raw: [u8; HEADER_LEN]) -> Self {
        let word = |i: usize| u32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Self {
            msg_type: MsgType::from_u32(word(0)),
            name_len: word(4),
            text_len: word(8),
        }
    }

    /// The header must account for every byte of the declared body.
    pub fn check_body_len(&self, body_len: u32) -> Result<(), ProtoError> {
        let expected = HEADER_LEN as u64 + u64::from(self.name_len) + u64::from(self.text_len);
        if expected != u64::from(body_len) {
            return Err(ProtoError::LengthMismatch {
                body_len,
                name_len: self.name_len,
                text_len: self.text_len,
            });
        }
        Ok(())
    }
}

/// Checks a declared body length against the header size and the cap.
pub fn check_declared_len(body_len: u32, max_body: usize) -> Result<(), ProtoError> {
    if (body_len as usize) < HEADER_LEN {
        return Err(ProtoError::BodyTooShort(body_len));
    }
    if body_len as usize > max_body {
        return Err(ProtoError::TooLarge {
            len: body_len as usize,
            max: max_body,
        });
    }
    Ok(())
}

/// Turns a raw payload field into an owned string; empty means absent.
///
/// Fields are opaque bytes on the wire. Invalid UTF-8 sequences become U+FFFD
/// so a peer typing in a legacy encoding stays connected.
pub fn field_to_string(raw: Vec<u8>) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(match String::from_utf8(raw) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
