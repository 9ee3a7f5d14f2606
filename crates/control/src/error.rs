use std::fmt;

/// The error taxonomy shared by every component in this crate.
///
/// Propagation policy: validation and state errors are reported
/// to the requester without tearing down the session; transport errors
/// close the affected session and fail every outstanding request on it;
/// resource exhaustion fails the request without side effects; timing
/// errors resolve the waiting continuation without closing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation
    MalformedMessage,
    InvalidField(&'static str),
    RequiredFieldMissing(&'static str),

    // State
    InvalidStateTransition(&'static str),
    NotAMemberOfDif,
    AlreadyRegistered,
    NotRegistered,

    // Resource
    NoFreePortId,
    NoFreeCepId,
    NoFreeInvokeId,
    KernelBusy,
    OutOfMemory,

    // Timing
    Timeout,
    UnknownSequenceNumber(u32),
    UnknownInvokeId(u32),

    // Transport
    ChannelClosed,
    WriteFailed,
    ReadFailed,

    // RIB
    UnknownObjectClass,
    UnknownObjectName,
    OperationNotAllowed,
    ObjectAlreadyExists,
    ChildNotFound,
    ObjectValueNull,

    // Flow allocation
    UnknownApplication,
    FlowSpecUnsatisfiable,
    PeerRejected(String),
}

impl Error {
    /// Whether a retry of the operation that produced this error might
    /// succeed. Only resource exhaustion and timing failures are
    /// considered transient; every validation, state, transport and RIB
    /// error is treated as permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NoFreePortId
                | Error::NoFreeCepId
                | Error::NoFreeInvokeId
                | Error::KernelBusy
                | Error::Timeout
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedMessage => write!(f, "malformed message"),
            Error::InvalidField(field) => write!(f, "invalid field: {field}"),
            Error::RequiredFieldMissing(field) => write!(f, "required field missing: {field}"),
            Error::InvalidStateTransition(ctx) => write!(f, "invalid state transition: {ctx}"),
            Error::NotAMemberOfDif => write!(f, "not a member of DIF"),
            Error::AlreadyRegistered => write!(f, "already registered"),
            Error::NotRegistered => write!(f, "not registered"),
            Error::NoFreePortId => write!(f, "no free port-id"),
            Error::NoFreeCepId => write!(f, "no free cep-id"),
            Error::NoFreeInvokeId => write!(f, "no free invoke-id"),
            Error::KernelBusy => write!(f, "kernel control channel busy"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::Timeout => write!(f, "timeout"),
            Error::UnknownSequenceNumber(seq) => write!(f, "unknown sequence number: {seq}"),
            Error::UnknownInvokeId(id) => write!(f, "unknown invoke-id: {id}"),
            Error::ChannelClosed => write!(f, "channel closed"),
            Error::WriteFailed => write!(f, "write failed"),
            Error::ReadFailed => write!(f, "read failed"),
            Error::UnknownObjectClass => write!(f, "unknown object class"),
            Error::UnknownObjectName => write!(f, "unknown object name"),
            Error::OperationNotAllowed => write!(f, "operation not allowed"),
            Error::ObjectAlreadyExists => write!(f, "object already exists"),
            Error::ChildNotFound => write!(f, "child not found"),
            Error::ObjectValueNull => write!(f, "object value is null"),
            Error::UnknownApplication => write!(f, "unknown application"),
            Error::FlowSpecUnsatisfiable => write!(f, "flow specification unsatisfiable"),
            Error::PeerRejected(reason) => write!(f, "peer rejected: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<cdap::Error> for Error {
    fn from(err: cdap::Error) -> Self {
        match err {
            cdap::Error::MalformedMessage => Error::MalformedMessage,
            cdap::Error::RequiredFieldMissing(f) => Error::RequiredFieldMissing(f),
            cdap::Error::InvalidField(f) => Error::InvalidField(f),
            cdap::Error::UnknownOpcode(_) => Error::MalformedMessage,
        }
    }
}

impl From<kctl::Error> for Error {
    fn from(_: kctl::Error) -> Self {
        Error::MalformedMessage
    }
}

/// A numeric result code plus a human-readable reason, the shape every
/// public-boundary failure carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCode {
    pub code: i32,
    pub reason: String,
}

impl ResultCode {
    pub const SUCCESS: i32 = 0;

    pub fn success() -> Self {
        Self {
            code: Self::SUCCESS,
            reason: String::new(),
        }
    }

    pub fn failure(code: i32, reason: impl Into<String>) -> Self {
        debug_assert_ne!(code, Self::SUCCESS);
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }
}

impl From<&Error> for ResultCode {
    fn from(err: &Error) -> Self {
        // There is no single numeric error-code space shared with the
        // kernel wire protocol; this assigns one, stable within this
        // implementation, so every component replies consistently.
        let code = match err {
            Error::MalformedMessage => 1,
            Error::InvalidField(_) => 2,
            Error::RequiredFieldMissing(_) => 3,
            Error::InvalidStateTransition(_) => 4,
            Error::NotAMemberOfDif => 5,
            Error::AlreadyRegistered => 6,
            Error::NotRegistered => 7,
            Error::NoFreePortId => 8,
            Error::NoFreeCepId => 9,
            Error::NoFreeInvokeId => 10,
            Error::KernelBusy => 11,
            Error::OutOfMemory => 12,
            Error::Timeout => 13,
            Error::UnknownSequenceNumber(_) => 14,
            Error::UnknownInvokeId(_) => 15,
            Error::ChannelClosed => 16,
            Error::WriteFailed => 17,
            Error::ReadFailed => 18,
            Error::UnknownObjectClass => 19,
            Error::UnknownObjectName => 20,
            Error::OperationNotAllowed => 21,
            Error::ObjectAlreadyExists => 22,
            Error::ChildNotFound => 23,
            Error::ObjectValueNull => 24,
            Error::UnknownApplication => 25,
            Error::FlowSpecUnsatisfiable => 26,
            Error::PeerRejected(_) => 27,
        };

        ResultCode::failure(code, err.to_string())
    }
}
