use num_enum::{IntoPrimitive, TryFromPrimitive};

/// CDAP operation codes.
///
/// Paired request/response opcodes plus the connect/release pair. Mirrors
/// `CDAPMessage::Opcode` in the reference `librina-cdap.h`, with a reserved
/// zero discriminant (`NoOpcode`) so a record decoded with no opcode tag is
/// a decodable-but-invalid message rather than a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Opcode {
    NoOpcode = 0,
    MConnect = 1,
    MConnectR = 2,
    MRelease = 3,
    MReleaseR = 4,
    MCreate = 5,
    MCreateR = 6,
    MDelete = 7,
    MDeleteR = 8,
    MRead = 9,
    MReadR = 10,
    MCancelRead = 11,
    MCancelReadR = 12,
    MWrite = 13,
    MWriteR = 14,
    MStart = 15,
    MStartR = 16,
    MStop = 17,
    MStopR = 18,
}

impl Opcode {
    /// Whether this opcode is a response (carries `result`/`result_reason`).
    pub fn is_response(self) -> bool {
        matches!(
            self,
            Self::MConnectR
                | Self::MReleaseR
                | Self::MCreateR
                | Self::MDeleteR
                | Self::MReadR
                | Self::MCancelReadR
                | Self::MWriteR
                | Self::MStartR
                | Self::MStopR
        )
    }

    /// The paired response opcode for a request opcode, if any.
    pub fn response_pair(self) -> Option<Self> {
        Some(match self {
            Self::MConnect => Self::MConnectR,
            Self::MRelease => Self::MReleaseR,
            Self::MCreate => Self::MCreateR,
            Self::MDelete => Self::MDeleteR,
            Self::MRead => Self::MReadR,
            Self::MCancelRead => Self::MCancelReadR,
            Self::MWrite => Self::MWriteR,
            Self::MStart => Self::MStartR,
            Self::MStop => Self::MStopR,
            _ => return None,
        })
    }
}

/// CDAP authentication mechanism tag carried by `M_CONNECT`/`M_CONNECT_R`.
///
/// The mechanisms themselves are out of scope; this is
/// only the wire-level closed set the `auth_value` opaque bytes are tagged
/// with, matching `CDAPMessage::AuthTypes` in the reference sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum AuthType {
    None = 0,
    Passwd = 1,
    SshRsa = 2,
    SshDsa = 3,
}

/// CDAP message flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Flags {
    None = 0,
    Sync = 1,
    ReadIncomplete = 2,
}
