/// Wire layout
/// ----------- Prefix -----------------
/// Body Length (4B, BE)
/// ----------- Body: header -----------
/// Type (4B) - Name Length (4B) - Text Length (4B)
/// ----------- Body: payload ----------
/// Name bytes, then Text bytes
pub const LEN_PREFIX_LEN: usize = 4;

/// Fixed body header: type, name length, text length.
pub const HEADER_LEN: usize = 12;

/// Largest body a receiver will allocate for (32 MiB).
pub const MAX_BODY_LEN: usize = 32 << 20;

/// Longest participant name the registry stores, in bytes.
pub const MAX_NAME_LEN: usize = 63;
