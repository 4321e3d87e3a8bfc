use crate::relay::protocol::{Frame, MsgType};

/// Turns a server frame into the line shown to the user, or `None` for frames
/// a client has no reason to display.
pub fn render_notice(frame: &Frame) -> Option<String> {
    match frame.msg_type {
        MsgType::Deliver => Some(format!("{}: {}", frame.name_str(), frame.text_str())),
        MsgType::Joining => Some(format!("[info] {} joined", frame.name_str())),
        MsgType::Left => Some(format!("[info] {} left", frame.name_str())),
        MsgType::Bye => Some(format!("[server] {}", frame.text_str())),
        _ => None,
    }
}
