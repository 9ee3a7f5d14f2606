use ahash::HashMap;

use crate::model::{
    apni::Apni, dif::DifInformation, directory::DirectoryForwardingTable, flow::Flow, neighbor::Neighbor,
};

/// IPCP lifecycle: `Created -> Initialized -> Assigned ->
/// Enrolled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcpState {
    Created,
    Initialized,
    Assigned,
    Enrolled,
}

/// One IPC Process instance hosted by this node.
pub struct Ipcp {
    pub ipcp_id: u16,
    pub name: Apni,
    pub state: IpcpState,
    pub dif_information: Option<DifInformation>,
    pub registered_applications: Vec<Apni>,
    pub flows_by_port_id: HashMap<u32, Flow>,
    pub neighbors: HashMap<String, Neighbor>,
    pub directory_forwarding_table: DirectoryForwardingTable,
    pub os_process_id: Option<u32>,
}

impl Ipcp {
    pub fn new(ipcp_id: u16, name: Apni) -> Self {
        Self {
            ipcp_id,
            name,
            state: IpcpState::Created,
            dif_information: None,
            registered_applications: Vec::new(),
            flows_by_port_id: HashMap::default(),
            neighbors: HashMap::default(),
            directory_forwarding_table: DirectoryForwardingTable::new(),
            os_process_id: None,
        }
    }

    pub fn mark_initialized(&mut self) {
        debug_assert_eq!(self.state, IpcpState::Created);
        self.state = IpcpState::Initialized;
    }

    pub fn mark_assigned(&mut self) {
        debug_assert_eq!(self.state, IpcpState::Initialized);
        self.state = IpcpState::Assigned;
    }

    pub fn mark_enrolled(&mut self) {
        debug_assert!(matches!(self.state, IpcpState::Assigned | IpcpState::Enrolled));
        self.state = IpcpState::Enrolled;
    }

    pub fn is_application_registered(&self, app: &Apni) -> bool {
        self.registered_applications
            .iter()
            .any(|registered| registered.canonical_key() == app.canonical_key())
    }

    /// The N-1 port-id of the management flow reaching `address`, if
    /// `address` belongs to a directly enrolled neighbor. Multi-hop
    /// address resolution is the pluggable routing algorithm's job, out
    /// of scope here; this only ever does a direct lookup.
    pub fn management_port_for_address(&self, address: u32) -> Option<u32> {
        self.neighbors
            .values()
            .find(|n| n.address == address && n.enrolled)
            .and_then(|n| n.underlying_port_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Neighbor;

    #[test]
    fn lifecycle_advances_created_initialized_assigned_enrolled() {
        let mut ipcp = Ipcp::new(1, Apni::new("app"));
        assert_eq!(ipcp.state, IpcpState::Created);
        ipcp.mark_initialized();
        assert_eq!(ipcp.state, IpcpState::Initialized);
        ipcp.mark_assigned();
        assert_eq!(ipcp.state, IpcpState::Assigned);
        ipcp.mark_enrolled();
        assert_eq!(ipcp.state, IpcpState::Enrolled);
    }

    #[test]
    fn is_application_registered_compares_apni_componentwise() {
        let mut ipcp = Ipcp::new(1, Apni::new("app"));
        ipcp.registered_applications.push(Apni::new("app1").with_entity_name("mgmt"));
        assert!(ipcp.is_application_registered(&Apni::new("app1").with_entity_name("mgmt")));
        assert!(!ipcp.is_application_registered(&Apni::new("app1")));
        assert!(!ipcp.is_application_registered(&Apni::new("app2")));
    }

    #[test]
    fn management_port_for_address_requires_an_enrolled_neighbor() {
        let mut ipcp = Ipcp::new(1, Apni::new("app"));

        let mut unenrolled = Neighbor::new(Apni::new("down"), Apni::new("shim"));
        unenrolled.address = 2;
        unenrolled.underlying_port_id = Some(9);
        ipcp.neighbors.insert(unenrolled.name.canonical_key(), unenrolled);

        let mut enrolled = Neighbor::new(Apni::new("up"), Apni::new("shim"));
        enrolled.address = 3;
        enrolled.enrolled = true;
        enrolled.underlying_port_id = Some(7);
        ipcp.neighbors.insert(enrolled.name.canonical_key(), enrolled);

        assert_eq!(ipcp.management_port_for_address(2), None);
        assert_eq!(ipcp.management_port_for_address(3), Some(7));
        assert_eq!(ipcp.management_port_for_address(4), None);
    }
}
