use crate::model::policy::PolicyParameter;

/// DTCP-level policy knobs for one EFCP connection. The policy bodies
/// themselves (window/rate-based control,
/// retransmission) are out of scope — only the parameterization is kept,
/// since it crosses the user-space/kernel boundary on connection creation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionPolicies {
    pub dtcp_present: bool,
    pub flow_control: bool,
    pub retransmission_control: bool,
    pub window_based: bool,
    pub rate_based: bool,
    pub initial_credit: u32,
    pub max_retx_time_ms: u32,
    pub data_rate_limit_bps: u64,
    pub parameters: Vec<PolicyParameter>,
}

/// Lifecycle of one EFCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Requested,
    Created,
    Updated,
    Destroyed,
}

/// One EFCP connection, as tracked by user space. The data-transfer
/// behavior lives in the kernel; this is the
/// control-plane record of its identity and policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub port_id: u32,
    pub source_address: u32,
    pub dest_address: u32,
    pub qos_id: u32,
    pub source_cep_id: Option<u32>,
    pub dest_cep_id: Option<u32>,
    pub policies: ConnectionPolicies,
    pub flow_user_ipcp_id: u16,
    pub state: ConnectionState,
}

impl Connection {
    pub fn new(port_id: u32, source_address: u32, dest_address: u32, qos_id: u32) -> Self {
        Self::with_policies(port_id, source_address, dest_address, qos_id, ConnectionPolicies::default())
    }

    /// As `new`, parameterized with the DTCP policy template negotiated
    /// for this connection (§4.4 step 3: the selected QoS cube's
    /// `connection_policies`).
    pub fn with_policies(
        port_id: u32,
        source_address: u32,
        dest_address: u32,
        qos_id: u32,
        policies: ConnectionPolicies,
    ) -> Self {
        Self {
            port_id,
            source_address,
            dest_address,
            qos_id,
            source_cep_id: None,
            dest_cep_id: None,
            policies,
            flow_user_ipcp_id: 0,
            state: ConnectionState::Requested,
        }
    }
}
