//! Data model types shared across every component.

pub mod apni;
pub mod connection;
pub mod dif;
pub mod directory;
pub mod flow;
pub mod flow_spec;
pub mod ipcp;
pub mod neighbor;
pub mod pduft;
pub mod policy;

pub use apni::Apni;
pub use connection::{Connection, ConnectionPolicies, ConnectionState};
pub use dif::{DataTransferConstants, DifConfiguration, DifInformation, DifType, LinkStateRoutingConfig};
pub use directory::DirectoryForwardingTable;
pub use flow::{Flow, FlowState};
pub use flow_spec::{FlowSpec, QosCube, select_qos_cube};
pub use ipcp::{Ipcp, IpcpState};
pub use neighbor::Neighbor;
pub use pduft::{PduftEntry, PduftMode, RoutingEntry};
pub use policy::{PolicyParameter, PolicySet};
