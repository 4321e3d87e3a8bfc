/// Numeric frame type carried in the first header word.
///
/// Client requests occupy 1..=5, server indications 10..=13. Anything else
/// decodes as `Unknown` so a session can ignore it instead of dropping the
/// connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MsgType {
    Join,
    Leave,
    Note,
    Shutdown,
    ShutdownAll,

    Joining,
    Left,
    Deliver,
    Bye,

    Unknown(u32),
}

impl MsgType {
    pub fn from_u32(v: u32) -> MsgType {
        use MsgType::*;
        match v {
            1 => Join,
            2 => Leave,
            3 => Note,
            4 => Shutdown,
            5 => ShutdownAll,
            10 => Joining,
            11 => Left,
            12 => Deliver,
            13 => Bye,
            other => Unknown(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        use MsgType::*;
        match self {
            Join => 1,
            Leave => 2,
            Note => 3,
            Shutdown => 4,
            ShutdownAll => 5,
            Joining => 10,
            Left => 11,
            Deliver => 12,
            Bye => 13,
            Unknown(v) => v,
        }
    }

    /// Short name for log lines; never includes payload.
    pub fn label(self) -> &'static str {
        use MsgType::*;
        match self {
            Join => "JOIN",
            Leave => "LEAVE",
            Note => "NOTE",
            Shutdown => "SHUTDOWN",
            ShutdownAll => "SHUTDOWN_ALL",
            Joining => "JOINING",
            Left => "LEFT",
            Deliver => "DELIVER",
            Bye => "BYE",
            Unknown(_) => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_match_the_wire_table() {
        let table = [
            (1, MsgType::Join),
            (2, MsgType::Leave),
            (3, MsgType::Note),
            (4, MsgType::Shutdown),
            (5, MsgType::ShutdownAll),
            (10, MsgType::Joining),
            (11, MsgType::Left),
            (12, MsgType::Deliver),
            (13, MsgType::Bye),
        ];
        for (code, ty) in table {
            assert_eq!(MsgType::from_u32(code), ty);
            assert_eq!(ty.as_u32(), code);
        }
    }

    #[test]
    fn unassigned_codes_survive_as_unknown() {
        assert_eq!(MsgType::from_u32(0), MsgType::Unknown(0));
        assert_eq!(MsgType::from_u32(6), MsgType::Unknown(6));
        assert_eq!(MsgType::Unknown(0xdead_beef).as_u32(), 0xdead_beef);
    }
}
