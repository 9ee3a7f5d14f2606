use std::fmt;

/// Failure modes for CDAP message encoding, decoding and validation.
///
/// Session-state and invoke-id bookkeeping errors live in `ipcpd-control`
/// (the session engine owns that state); this crate only ever fails at the
/// wire/validation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    MalformedMessage,
    RequiredFieldMissing(&'static str),
    InvalidField(&'static str),
    UnknownOpcode(u16),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage => write!(f, "malformed CDAP message"),
            Self::RequiredFieldMissing(field) => write!(f, "required field missing: {field}"),
            Self::InvalidField(field) => write!(f, "invalid field: {field}"),
            Self::UnknownOpcode(tag) => write!(f, "unknown opcode tag: {tag}"),
        }
    }
}

impl std::error::Error for Error {}
