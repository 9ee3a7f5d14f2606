//! Flow allocation: negotiating an end-to-end flow and its underlying
//! EFCP connection between two application processes.

mod allocator;
mod flow_object;

pub use allocator::{AllocateFlowRequestResult, FLOW_OBJECT_NAME_PREFIX, FlowAllocator, flow_object_port_id};
pub use flow_object::FlowObject;
