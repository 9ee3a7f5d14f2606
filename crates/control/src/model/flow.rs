use crate::model::{apni::Apni, connection::Connection, flow_spec::FlowSpec};

/// Flow lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Empty,
    AllocationInProgress,
    Allocated,
    WaitingMplBeforeTeardown,
    Deallocated,
}

/// An end-to-end flow offered by the DIF, as tracked by the IPCP that is a
/// flow endpoint.
///
/// Invariant: while `state == Allocated`, exactly one entry of
/// `connections` is the active connection (`active_connection_index`
/// indexes it). `debug_assert_active_connection_invariant` checks this in
/// debug builds at the seams where the invariant matters.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub local_apni: Apni,
    pub remote_apni: Apni,
    pub local_port_id: u32,
    pub remote_port_id: Option<u32>,
    pub local_address: u32,
    pub remote_address: u32,
    pub connections: Vec<Connection>,
    pub active_connection_index: Option<usize>,
    pub flow_spec: FlowSpec,
    pub state: FlowState,
    pub hop_count: u32,
    pub create_retry_count: u32,
}

impl Flow {
    pub fn new(local_apni: Apni, remote_apni: Apni, local_port_id: u32, hop_count: u32) -> Self {
        Self {
            local_apni,
            remote_apni,
            local_port_id,
            remote_port_id: None,
            local_address: 0,
            remote_address: 0,
            connections: Vec::new(),
            active_connection_index: None,
            flow_spec: FlowSpec::default(),
            state: FlowState::Empty,
            hop_count,
            create_retry_count: 0,
        }
    }

    pub fn active_connection(&self) -> Option<&Connection> {
        self.active_connection_index.map(|i| &self.connections[i])
    }

    pub fn active_connection_mut(&mut self) -> Option<&mut Connection> {
        self.active_connection_index.map(move |i| &mut self.connections[i])
    }

    /// Debug-only check of the "exactly one active connection while
    /// Allocated" invariant.
    pub fn debug_assert_active_connection_invariant(&self) {
        if self.state == FlowState::Allocated {
            debug_assert!(
                self.active_connection_index.is_some(),
                "allocated flow must have an active connection"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::connection::Connection;

    #[test]
    fn active_connection_tracks_the_indexed_entry() {
        let mut flow = Flow::new(Apni::new("a"), Apni::new("b"), 1, 10);
        assert!(flow.active_connection().is_none());

        flow.connections.push(Connection::new(1, 1, 2, 0));
        flow.active_connection_index = Some(0);
        assert_eq!(flow.active_connection().unwrap().port_id, 1);

        flow.active_connection_mut().unwrap().source_cep_id = Some(5);
        assert_eq!(flow.connections[0].source_cep_id, Some(5));
    }

    #[test]
    #[should_panic(expected = "allocated flow must have an active connection")]
    fn invariant_panics_when_allocated_without_an_active_connection() {
        let mut flow = Flow::new(Apni::new("a"), Apni::new("b"), 1, 10);
        flow.state = FlowState::Allocated;
        flow.debug_assert_active_connection_invariant();
    }
}
