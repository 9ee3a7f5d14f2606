use crate::model::{apni::Apni, flow_spec::QosCube, policy::PolicySet};

/// Field widths (in bytes) and global limits for the data-transfer protocol
/// instance a DIF runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTransferConstants {
    pub qos_id_width: u8,
    pub port_id_width: u8,
    pub cep_id_width: u8,
    pub sequence_number_width: u8,
    pub address_width: u8,
    pub length_width: u8,
    pub max_pdu_size: u32,
    pub max_pdu_lifetime_ms: u32,
    pub dif_integrity: bool,
}

impl Default for DataTransferConstants {
    fn default() -> Self {
        Self {
            qos_id_width: 1,
            port_id_width: 2,
            cep_id_width: 2,
            sequence_number_width: 4,
            address_width: 2,
            length_width: 2,
            max_pdu_size: 10_000,
            max_pdu_lifetime_ms: 4_000,
            dif_integrity: false,
        }
    }
}

/// Link-state routing knobs; the routing algorithm itself is pluggable and
/// out of scope.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStateRoutingConfig {
    pub object_maximum_age_ms: u32,
    pub wait_until_read_cdap_ms: u32,
    pub wait_until_error_ms: u32,
    pub wait_until_pdufty_computation_ms: u32,
}

impl Default for LinkStateRoutingConfig {
    fn default() -> Self {
        Self {
            object_maximum_age_ms: 10_000,
            wait_until_read_cdap_ms: 5_001,
            wait_until_error_ms: 5_001,
            wait_until_pdufty_computation_ms: 1_001,
        }
    }
}

/// Everything needed to run a DIF instance locally once assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct DifConfiguration {
    pub data_transfer_constants: DataTransferConstants,
    pub local_address: u32,
    pub qos_cubes: Vec<QosCube>,
    pub policies: Vec<PolicySet>,
    pub pduft_generator_policy: PolicySet,
    pub link_state_routing: LinkStateRoutingConfig,
}

/// A DIF's type tag — "normal" or one of the shim DIF implementations.
/// The shim bodies themselves are out of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DifType {
    Normal,
    Shim(String),
}

/// Identity and configuration of a DIF an IPCP may be assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct DifInformation {
    pub dif_type: DifType,
    pub dif_name: Apni,
    pub configuration: DifConfiguration,
}
