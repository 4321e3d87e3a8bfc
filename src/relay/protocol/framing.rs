use std::io::{ErrorKind, Read, Write};

use byteorder::{BigEndian, ReadBytesExt};

use super::codec::{FrameHeader, check_declared_len, encode_frame, field_to_string};
use super::{Frame, FrameError, HEADER_LEN, MAX_BODY_LEN};

/// Write one frame and flush. Short writes are retried by `write_all`.
pub fn write_frame<W: Write>(w: &mut W, frame: &Frame) -> Result<(), FrameError> {
    let bytes = encode_frame(frame)?;
    w.write_all(&bytes)?;
    w.flush()?;
    Ok(())
}

/// Read exactly one frame, enforcing the default 32 MiB body cap.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Frame, FrameError> {
    read_frame_with_limit(r, MAX_BODY_LEN)
}

/// Read exactly one frame, rejecting bodies larger than `max_body`.
///
/// EOF before the first prefix byte is [`FrameError::Closed`]; EOF anywhere
/// later is an I/O error (`UnexpectedEof`).
pub fn read_frame_with_limit<R: Read>(r: &mut R, max_body: usize) -> Result<Frame, FrameError> {
    let body_len = read_len_prefix(r)?;
    check_declared_len(body_len, max_body)?;

    let mut raw_header = [0u8; HEADER_LEN];
    r.read_exact(&mut raw_header)?;
    let header = FrameHeader::from_bytes(raw_header);
    header.check_body_len(body_len)?;

    let name = read_field(r, header.name_len)?;
    let text = read_field(r, header.text_len)?;

    Ok(Frame {
        msg_type: header.msg_type,
        name: field_to_string(name),
        text: field_to_string(text),
    })
}

/// Reads the 4-byte prefix, telling a clean close apart from a torn one.
fn read_len_prefix<R: Read>(r: &mut R) -> Result<u32, FrameError> {
    let mut first = [0u8; 1];
    loop {
        match r.read(&mut first) {
            Ok(0) => return Err(FrameError::Closed),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let rest = r.read_u24::<BigEndian>()?;
    Ok((u32::from(first[0]) << 24) | rest)
}

fn read_field<R: Read>(r: &mut R, len: u32) -> Result<Vec<u8>, FrameError> {
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
