use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MalformedRecord,
    UnknownMessageType(u16),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRecord => write!(f, "malformed kernel control-channel record"),
            Self::UnknownMessageType(t) => write!(f, "unknown kernel message type: {t}"),
        }
    }
}

impl std::error::Error for Error {}
