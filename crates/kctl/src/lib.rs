//! ## Kernel control-channel wire format
//!
//! The typed, sequence-numbered request/response transport carrying
//! assignment, connection, forwarding-table and flow-allocation requests
//! between user space and the in-kernel EFCP/DTP/DTCP/RMT engine. This
//! crate only knows the wire format — it carries opaque,
//! message-type-tagged attribute records and has no notion of RINA
//! semantics. The client that multiplexes requests over a real transport
//! lives in `ipcpd-control::kernel_client`.

mod attrs;
mod error;
mod header;
mod message_type;
mod record;

pub use attrs::{Attributes, Tag};
pub use error::Error;
pub use header::{Flags, Header};
pub use message_type::MessageType;
pub use record::Record;
