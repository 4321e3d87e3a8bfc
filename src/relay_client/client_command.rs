/// One line typed by the user, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `JOIN` alone uses the configured server; `JOIN <ip> <port>` overrides it.
    Join { target: Option<(String, u16)> },
    Leave,
    Shutdown,
    ShutdownAll,
    Note(String),
    /// Blank line.
    Empty,
    /// A keyword with arguments that do not parse, e.g. `JOIN host notaport`.
    Invalid(String),
}

impl ClientCommand {
    /// Keywords are matched case-sensitively on whitespace-split words; any
    /// other line is a note and is sent as typed (minus the line ending).
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => Self::Empty,
            ["JOIN"] => Self::Join { target: None },
            ["JOIN", host, port] => match port.parse::<u16>() {
                Ok(port) => Self::Join {
                    target: Some(((*host).to_string(), port)),
                },
                Err(_) => Self::Invalid(format!("bad port {port:?}")),
            },
            ["JOIN", ..] => Self::Invalid("usage: JOIN [<ip> <port>]".to_string()),
            ["LEAVE"] => Self::Leave,
            ["SHUTDOWN"] => Self::Shutdown,
            ["SHUTDOWN", "ALL"] => Self::ShutdownAll,
            _ => Self::Note(line.to_string()),
        }
    }
}
