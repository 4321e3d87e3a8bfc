use crate::relay::protocol::MsgType;

/// Text the server sends with BYE when a participant requests SHUTDOWN_ALL.
pub const BYE_SHUTTING_DOWN: &str = "Server shutting down";
/// Text the server sends with BYE to whoever is left when its accept loop ends.
pub const BYE_EXITING: &str = "Server exiting";

/// One protocol message.
///
/// An empty name or text is stored as `None`: the wire cannot tell "absent"
/// from "empty", so neither can this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: MsgType,
    pub name: Option<String>,
    pub text: Option<String>,
}

impl Frame {
    pub fn new(msg_type: MsgType, name: Option<String>, text: Option<String>) -> Self {
        Self {
            msg_type,
            name: name.filter(|s| !s.is_empty()),
            text: text.filter(|s| !s.is_empty()),
        }
    }

    // ---- client -> server -------------------------------------------------

    pub fn join(name: impl Into<String>) -> Self {
        Self::new(MsgType::Join, Some(name.into()), None)
    }

    pub fn leave() -> Self {
        Self::new(MsgType::Leave, None, None)
    }

    pub fn note(text: impl Into<String>) -> Self {
        Self::new(MsgType::Note, None, Some(text.into()))
    }

    pub fn shutdown() -> Self {
        Self::new(MsgType::Shutdown, None, None)
    }

    pub fn shutdown_all() -> Self {
        Self::new(MsgType::ShutdownAll, None, None)
    }

    // ---- server -> client -------------------------------------------------

    pub fn joining(name: impl Into<String>) -> Self {
        Self::new(MsgType::Joining, Some(name.into()), None)
    }

    pub fn left(name: impl Into<String>) -> Self {
        Self::new(MsgType::Left, Some(name.into()), None)
    }

    pub fn deliver(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MsgType::Deliver, Some(from.into()), Some(text.into()))
    }

    pub fn bye(reason: impl Into<String>) -> Self {
        Self::new(MsgType::Bye, None, Some(reason.into()))
    }

    /// Name field, empty when absent.
    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Text field, empty when absent.
    pub fn text_str(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}
