//! CDAP session state: invoke-id allocation, request/response matching and
//! the negotiated session descriptor, layered over the wire-format-only
//! `cdap` crate.

mod descriptor;
mod invoke_id;
mod manager;
mod session;
mod state;

pub use descriptor::SessionDescriptor;
pub use invoke_id::InvokeIdManager;
pub use manager::CdapSessionManager;
pub use session::CdapSession;
pub use state::CdapSessionState;
