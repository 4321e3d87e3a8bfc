use std::io;

use thiserror::Error;

use crate::relay::protocol::FrameError;

/// Errors surfaced by [`RelayClient`](super::RelayClient) commands.
#[derive(Debug, Error)]
pub enum RelayClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Frame(#[from] FrameError),

    #[error("not connected; use JOIN first")]
    NotConnected,

    #[error("already connected")]
    AlreadyConnected,
}
