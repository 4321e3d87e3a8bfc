use std::io;

use thiserror::Error;

/// The bytes arrived but do not form a valid frame.
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("declared body length {0} is shorter than the 12-byte header")]
    BodyTooShort(u32),

    #[error("declared body length {len} exceeds the {max}-byte cap")]
    TooLarge { len: usize, max: usize },

    #[error("body length {body_len} does not match header + name {name_len} + text {text_len}")]
    LengthMismatch {
        body_len: u32,
        name_len: u32,
        text_len: u32,
    },

    #[error("frame body of {0} bytes does not fit the 32-bit length prefix")]
    Unencodable(u64),
}

/// Anything that can stop a frame from being read or written.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Peer closed cleanly at a frame boundary.
    #[error("connection closed by peer")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),
}

impl FrameError {
    /// True for malformed input, false for transport failures.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Proto(_))
    }
}
