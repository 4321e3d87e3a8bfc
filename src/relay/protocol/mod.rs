pub mod codec;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod framing;
pub mod msg_type;

pub use codec::encode_frame;
pub use constants::*;
pub use errors::{FrameError, ProtoError};
pub use frame::{BYE_EXITING, BYE_SHUTTING_DOWN, Frame};
pub use framing::{read_frame, read_frame_with_limit, write_frame};
pub use msg_type::MsgType;
