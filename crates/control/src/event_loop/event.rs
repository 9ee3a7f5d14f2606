use cdap::CdapMessage;

use crate::{
    error::ResultCode,
    model::{Apni, DifInformation, Neighbor, PduftEntry, RoutingEntry},
};

use super::timer::TimerId;

/// One event crossing the per-IPCP queue. Every component feeds this same
/// queue rather than calling into the event loop's owner directly; the
/// dispatch site pattern-matches on this enum instead of the deep event
/// hierarchy described in Design Notes §9.
#[derive(Debug, Clone)]
pub enum Event {
    /// An `M_CREATE` or `M_DELETE` on the flow object arrived from a peer
    /// IPCP, addressed to the management flow at `management_port_id`.
    FlowRequest { ipcp_id: u16, management_port_id: u32, request: CdapMessage },
    /// A locally requested flow allocation finished, successfully or not.
    AllocateResult { port_id: Option<u32>, result: ResultCode },
    /// A locally initiated deallocation of `port_id`, to be announced to
    /// the peer over the session on `management_port_id`.
    Deallocate { ipcp_id: u16, management_port_id: u32, port_id: u32 },
    ApplicationRegister { ipcp_id: u16, application: Apni },
    ApplicationUnregister { ipcp_id: u16, application: Apni },
    AssignToDif { ipcp_id: u16, dif_information: DifInformation },
    EnrollToDif {
        ipcp_id: u16,
        management_port_id: u32,
        neighbor_name: Apni,
        supporting_dif_name: Apni,
    },
    NeighborsModified { ipcp_id: u16, neighbors: Vec<Neighbor> },
    /// A CDAP request addressed to a RIB object other than the flow or
    /// enrollment objects (those are routed directly, see `rib::objects`),
    /// arrived on the management flow at `management_port_id`.
    QueryRib { ipcp_id: u16, management_port_id: u32, request: CdapMessage },
    CreateConnectionResponse { ipcp_id: u16, port_id: u32, source_cep_id: u32 },
    DestroyConnectionResult { ipcp_id: u16, port_id: u32 },
    DumpPduftResponse { ipcp_id: u16, entries: Vec<PduftEntry> },
    /// The routing algorithm produced a new routing table; regenerate and
    /// reprogram the PDU forwarding table from it.
    RoutingTableUpdated { ipcp_id: u16, routing_table: Vec<RoutingEntry> },
    TimerExpired { timer_id: TimerId },
    OsProcessFinalized { ipcp_id: u16 },
}
