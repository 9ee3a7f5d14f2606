//! The RIB (Resource Information Base) and its object broker: a per-IPCP
//! tree of name-addressable objects, each carrying a handler vtable for the
//! five CDAP operations that can reach it (§4.7). The broker itself is
//! generic over what an object does; concrete objects for the well-known
//! paths live in `objects`.

pub mod broker;
pub mod object;
pub mod objects;

pub use broker::Rib;
pub use object::RibObject;
pub use objects::{
    DIRECTORY_CLASS, DIRECTORY_NAME, DirectoryForwardingTableObject, NEIGHBORS_CLASS, NEIGHBORS_NAME,
    NeighborsObject, OPERATIONAL_STATUS_CLASS, OPERATIONAL_STATUS_NAME, OperationalStatusObject, PDUFT_CLASS,
    PDUFT_NAME, PduftObject, WHATEVERCAST_NAMES_CLASS, WHATEVERCAST_NAMES_NAME, WhatevercastNamesObject,
};
