//! Nested attribute-block encodings for data-model types that travel
//! inside a CDAP `ObjectValue::Bytes` payload.
//!
//! CDAP's own `ObjectValue` union (`cdap::ObjectValue`) only carries a
//! single scalar or an opaque byte string — real RIB objects (a flow, an
//! enrollment-information-request, a neighbor) are structured records, so
//! they are serialized with the same tagged-attribute framing the kernel
//! control channel uses (`kctl::Attributes`) and carried as
//! `ObjectValue::Bytes`. This keeps one wire-framing discipline across both
//! boundaries instead of inventing a second one just for CDAP payloads.

use kctl::{Attributes, Tag};

use crate::{
    error::Error,
    model::{
        Apni, ConnectionPolicies, DataTransferConstants, DifConfiguration, FlowSpec, LinkStateRoutingConfig,
        Neighbor, PolicyParameter, PolicySet, QosCube,
    },
};

pub fn encode_apni(apni: &Apni) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_string(Tag::ProcessName, &apni.process_name);
    attrs.push_string(Tag::ProcessInstance, &apni.process_instance);
    attrs.push_string(Tag::EntityName, &apni.entity_name);
    attrs.push_string(Tag::EntityInstance, &apni.entity_instance);
    attrs
}

pub fn decode_apni(attrs: &Attributes) -> Result<Apni, Error> {
    let process_name = attrs
        .get_string(Tag::ProcessName)
        .ok_or(Error::RequiredFieldMissing("process_name"))?;
    if process_name.is_empty() {
        return Err(Error::RequiredFieldMissing("process_name"));
    }

    Ok(Apni {
        process_name,
        process_instance: attrs.get_string(Tag::ProcessInstance).unwrap_or_default(),
        entity_name: attrs.get_string(Tag::EntityName).unwrap_or_default(),
        entity_instance: attrs.get_string(Tag::EntityInstance).unwrap_or_default(),
    })
}

pub fn encode_flow_spec(spec: &FlowSpec) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_u64(Tag::AvgBandwidth, spec.avg_bandwidth);
    attrs.push_u64(Tag::AvgSduBandwidth, spec.avg_sdu_bandwidth);
    attrs.push_u32(Tag::PeakDurationMs, spec.peak_duration_ms);
    attrs.push_u32(Tag::DelayMs, spec.delay_ms);
    attrs.push_u32(Tag::JitterMs, spec.jitter_ms);
    attrs.push_i32(Tag::MaxAllowableGap, spec.max_allowable_gap);
    attrs.push_u32(Tag::MaxSduSize, spec.max_sdu_size);
    attrs.push_bool(Tag::OrderedDelivery, spec.ordered_delivery);
    attrs.push_bool(Tag::PartialDelivery, spec.partial_delivery);
    attrs.push_f64(Tag::UndetectedBer, spec.undetected_bit_error_rate);
    attrs
}

pub fn decode_flow_spec(attrs: &Attributes) -> FlowSpec {
    FlowSpec {
        avg_bandwidth: attrs.get_u64(Tag::AvgBandwidth).unwrap_or(0),
        avg_sdu_bandwidth: attrs.get_u64(Tag::AvgSduBandwidth).unwrap_or(0),
        peak_duration_ms: attrs.get_u32(Tag::PeakDurationMs).unwrap_or(0),
        delay_ms: attrs.get_u32(Tag::DelayMs).unwrap_or(0),
        jitter_ms: attrs.get_u32(Tag::JitterMs).unwrap_or(0),
        max_allowable_gap: attrs.get_i32(Tag::MaxAllowableGap).unwrap_or(0),
        max_sdu_size: attrs.get_u32(Tag::MaxSduSize).unwrap_or(0),
        ordered_delivery: attrs.get_bool(Tag::OrderedDelivery).unwrap_or(false),
        partial_delivery: attrs.get_bool(Tag::PartialDelivery).unwrap_or(false),
        undetected_bit_error_rate: attrs.get_f64(Tag::UndetectedBer).unwrap_or(0.0),
    }
}

pub fn encode_policy_parameters(params: &[PolicyParameter]) -> Attributes {
    let mut attrs = Attributes::new();
    for param in params {
        let mut nested = Attributes::new();
        nested.push_string(Tag::PolicyParameterName, &param.name);
        nested.push_string(Tag::PolicyParameterValue, &param.value);
        attrs.push_nested(Tag::PolicyParameter, &nested);
    }
    attrs
}

pub fn decode_policy_parameters(attrs: &Attributes) -> Vec<PolicyParameter> {
    attrs
        .get_all_nested(Tag::PolicyParameter)
        .map(|nested| PolicyParameter {
            name: nested.get_string(Tag::PolicyParameterName).unwrap_or_default(),
            value: nested.get_string(Tag::PolicyParameterValue).unwrap_or_default(),
        })
        .collect()
}

pub fn encode_connection_policies(policies: &ConnectionPolicies) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_bool(Tag::DtcpPresent, policies.dtcp_present);
    attrs.push_bool(Tag::FlowControl, policies.flow_control);
    attrs.push_bool(Tag::RetransmissionControl, policies.retransmission_control);
    attrs.push_bool(Tag::WindowBased, policies.window_based);
    attrs.push_bool(Tag::RateBased, policies.rate_based);
    attrs.push_u32(Tag::InitialCredit, policies.initial_credit);
    attrs.push_u32(Tag::MaxRetxTimeMs, policies.max_retx_time_ms);
    attrs.push_u64(Tag::DataRateLimitBps, policies.data_rate_limit_bps);
    attrs.push_nested(Tag::PolicyParameterList, &encode_policy_parameters(&policies.parameters));
    attrs
}

pub fn decode_connection_policies(attrs: &Attributes) -> ConnectionPolicies {
    ConnectionPolicies {
        dtcp_present: attrs.get_bool(Tag::DtcpPresent).unwrap_or(false),
        flow_control: attrs.get_bool(Tag::FlowControl).unwrap_or(false),
        retransmission_control: attrs.get_bool(Tag::RetransmissionControl).unwrap_or(false),
        window_based: attrs.get_bool(Tag::WindowBased).unwrap_or(false),
        rate_based: attrs.get_bool(Tag::RateBased).unwrap_or(false),
        initial_credit: attrs.get_u32(Tag::InitialCredit).unwrap_or(0),
        max_retx_time_ms: attrs.get_u32(Tag::MaxRetxTimeMs).unwrap_or(0),
        data_rate_limit_bps: attrs.get_u64(Tag::DataRateLimitBps).unwrap_or(0),
        parameters: attrs
            .get_nested(Tag::PolicyParameterList)
            .map(|nested| decode_policy_parameters(&nested))
            .unwrap_or_default(),
    }
}

pub fn encode_policy_set(set: &PolicySet) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_string(Tag::PolicySetName, &set.name);
    attrs.push_string(Tag::PolicySetVersion, &set.version);
    attrs.push_nested(Tag::PolicyParameterList, &encode_policy_parameters(&set.parameters));
    attrs
}

pub fn decode_policy_set(attrs: &Attributes) -> PolicySet {
    PolicySet {
        name: attrs.get_string(Tag::PolicySetName).unwrap_or_default(),
        version: attrs.get_string(Tag::PolicySetVersion).unwrap_or_default(),
        parameters: attrs
            .get_nested(Tag::PolicyParameterList)
            .map(|nested| decode_policy_parameters(&nested))
            .unwrap_or_default(),
    }
}

fn encode_qos_cube(cube: &QosCube) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_u32(Tag::QosId, cube.id);
    attrs.push_string(Tag::QosCubeName, &cube.name);
    attrs.push_nested(Tag::FlowSpec, &encode_flow_spec(&cube.spec));
    attrs.push_nested(Tag::ConnectionPolicies, &encode_connection_policies(&cube.connection_policies));
    attrs
}

fn decode_qos_cube(attrs: &Attributes) -> QosCube {
    QosCube {
        id: attrs.get_u32(Tag::QosId).unwrap_or(0),
        name: attrs.get_string(Tag::QosCubeName).unwrap_or_default(),
        spec: attrs.get_nested(Tag::FlowSpec).map(|n| decode_flow_spec(&n)).unwrap_or_default(),
        connection_policies: attrs
            .get_nested(Tag::ConnectionPolicies)
            .map(|n| decode_connection_policies(&n))
            .unwrap_or_default(),
    }
}

fn encode_data_transfer_constants(dtc: &DataTransferConstants) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_u32(Tag::QosIdWidth, dtc.qos_id_width as u32);
    attrs.push_u32(Tag::PortIdWidth, dtc.port_id_width as u32);
    attrs.push_u32(Tag::CepIdWidth, dtc.cep_id_width as u32);
    attrs.push_u32(Tag::SequenceNumberWidth, dtc.sequence_number_width as u32);
    attrs.push_u32(Tag::AddressWidth, dtc.address_width as u32);
    attrs.push_u32(Tag::LengthWidth, dtc.length_width as u32);
    attrs.push_u32(Tag::MaxPduSize, dtc.max_pdu_size);
    attrs.push_u32(Tag::MaxPduLifetimeMs, dtc.max_pdu_lifetime_ms);
    attrs.push_bool(Tag::DifIntegrity, dtc.dif_integrity);
    attrs
}

fn decode_data_transfer_constants(attrs: &Attributes) -> DataTransferConstants {
    DataTransferConstants {
        qos_id_width: attrs.get_u32(Tag::QosIdWidth).unwrap_or(1) as u8,
        port_id_width: attrs.get_u32(Tag::PortIdWidth).unwrap_or(2) as u8,
        cep_id_width: attrs.get_u32(Tag::CepIdWidth).unwrap_or(2) as u8,
        sequence_number_width: attrs.get_u32(Tag::SequenceNumberWidth).unwrap_or(4) as u8,
        address_width: attrs.get_u32(Tag::AddressWidth).unwrap_or(2) as u8,
        length_width: attrs.get_u32(Tag::LengthWidth).unwrap_or(2) as u8,
        max_pdu_size: attrs.get_u32(Tag::MaxPduSize).unwrap_or(0),
        max_pdu_lifetime_ms: attrs.get_u32(Tag::MaxPduLifetimeMs).unwrap_or(0),
        dif_integrity: attrs.get_bool(Tag::DifIntegrity).unwrap_or(false),
    }
}

fn encode_link_state_routing(config: &LinkStateRoutingConfig) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_u32(Tag::ObjectMaximumAgeMs, config.object_maximum_age_ms);
    attrs.push_u32(Tag::WaitUntilReadCdapMs, config.wait_until_read_cdap_ms);
    attrs.push_u32(Tag::WaitUntilErrorMs, config.wait_until_error_ms);
    attrs.push_u32(Tag::WaitUntilPduftComputationMs, config.wait_until_pdufty_computation_ms);
    attrs
}

fn decode_link_state_routing(attrs: &Attributes) -> LinkStateRoutingConfig {
    LinkStateRoutingConfig {
        object_maximum_age_ms: attrs.get_u32(Tag::ObjectMaximumAgeMs).unwrap_or(0),
        wait_until_read_cdap_ms: attrs.get_u32(Tag::WaitUntilReadCdapMs).unwrap_or(0),
        wait_until_error_ms: attrs.get_u32(Tag::WaitUntilErrorMs).unwrap_or(0),
        wait_until_pdufty_computation_ms: attrs.get_u32(Tag::WaitUntilPduftComputationMs).unwrap_or(0),
    }
}

pub fn encode_dif_configuration(config: &DifConfiguration) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_nested(Tag::DataTransferConstants, &encode_data_transfer_constants(&config.data_transfer_constants));
    attrs.push_u32(Tag::Address, config.local_address);
    for cube in &config.qos_cubes {
        attrs.push_nested(Tag::QosCube, &encode_qos_cube(cube));
    }
    for policy in &config.policies {
        attrs.push_nested(Tag::PolicySetList, &encode_policy_set(policy));
    }
    attrs.push_nested(Tag::PduftGeneratorPolicy, &encode_policy_set(&config.pduft_generator_policy));
    attrs.push_nested(Tag::LinkStateRouting, &encode_link_state_routing(&config.link_state_routing));
    attrs
}

pub fn decode_dif_configuration(attrs: &Attributes) -> DifConfiguration {
    DifConfiguration {
        data_transfer_constants: attrs
            .get_nested(Tag::DataTransferConstants)
            .map(|n| decode_data_transfer_constants(&n))
            .unwrap_or_default(),
        local_address: attrs.get_u32(Tag::Address).unwrap_or(0),
        qos_cubes: attrs.get_all_nested(Tag::QosCube).map(|n| decode_qos_cube(&n)).collect(),
        policies: attrs.get_all_nested(Tag::PolicySetList).map(|n| decode_policy_set(&n)).collect(),
        pduft_generator_policy: attrs
            .get_nested(Tag::PduftGeneratorPolicy)
            .map(|n| decode_policy_set(&n))
            .unwrap_or_else(|| PolicySet::new("default", "1")),
        link_state_routing: attrs
            .get_nested(Tag::LinkStateRouting)
            .map(|n| decode_link_state_routing(&n))
            .unwrap_or_default(),
    }
}

/// The body of an `EnrollmentInformationRequest` RIB object: the
/// enrolling IPCP's address and the supporting DIFs it can be reached
/// through.
pub fn encode_enrollment_info(address: u32, supporting_difs: &[Apni]) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_u32(Tag::EnrollmentAddress, address);
    for dif in supporting_difs {
        attrs.push_string(Tag::SupportingDifList, &dif.process_name);
    }
    attrs
}

pub fn decode_enrollment_info(attrs: &Attributes) -> Result<(u32, Vec<Apni>), Error> {
    let address = attrs
        .get_u32(Tag::EnrollmentAddress)
        .ok_or(Error::RequiredFieldMissing("address"))?;
    let supporting_difs = attrs
        .get_all_bytes(Tag::SupportingDifList)
        .filter_map(|b| String::from_utf8(b.to_vec()).ok())
        .map(Apni::new)
        .collect();
    Ok((address, supporting_difs))
}

/// The body of the enrolling peer's `M_START` reply: the DIF
/// configuration delta plus the current neighbor table.
pub fn encode_enrollment_reply(config: &DifConfiguration, neighbors: &[Neighbor]) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_nested(Tag::DifConfig, &encode_dif_configuration(config));
    for neighbor in neighbors {
        attrs.push_nested(Tag::NeighborList, &encode_neighbor(neighbor));
    }
    attrs
}

pub fn decode_enrollment_reply(attrs: &Attributes) -> Result<(DifConfiguration, Vec<Neighbor>), Error> {
    let config = attrs
        .get_nested(Tag::DifConfig)
        .ok_or(Error::RequiredFieldMissing("dif_config"))
        .map(|n| decode_dif_configuration(&n))?;
    let neighbors = attrs
        .get_all_nested(Tag::NeighborList)
        .map(|n| decode_neighbor(&n))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((config, neighbors))
}

pub fn encode_neighbor(neighbor: &Neighbor) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.push_nested(Tag::Apni, &encode_apni(&neighbor.name));
    attrs.push_string(Tag::SupportingDifName, &neighbor.supporting_dif_name.process_name);
    for dif in &neighbor.supporting_difs {
        attrs.push_string(Tag::SupportingDifList, &dif.process_name);
    }
    attrs.push_u32(Tag::Address, neighbor.address);
    attrs.push_bool(Tag::NeighborEnrolled, neighbor.enrolled);
    attrs.push_u32(Tag::NeighborRtt, neighbor.average_rtt_ms);
    if let Some(port_id) = neighbor.underlying_port_id {
        attrs.push_u32(Tag::PortId, port_id);
    }
    attrs.push_u64(Tag::NeighborLastHeard, neighbor.last_heard_from_ms);
    attrs.push_u32(Tag::NeighborAttempts, neighbor.enrollment_attempt_count);
    attrs
}

pub fn decode_neighbor(attrs: &Attributes) -> Result<Neighbor, Error> {
    let name = attrs
        .get_nested(Tag::Apni)
        .ok_or(Error::RequiredFieldMissing("name"))
        .and_then(|n| decode_apni(&n))?;
    let supporting_dif_name = Apni::new(attrs.get_string(Tag::SupportingDifName).unwrap_or_default());

    Ok(Neighbor {
        name,
        supporting_dif_name,
        supporting_difs: attrs
            .get_all_bytes(Tag::SupportingDifList)
            .filter_map(|b| String::from_utf8(b.to_vec()).ok())
            .map(Apni::new)
            .collect(),
        address: attrs.get_u32(Tag::Address).unwrap_or(0),
        enrolled: attrs.get_bool(Tag::NeighborEnrolled).unwrap_or(false),
        average_rtt_ms: attrs.get_u32(Tag::NeighborRtt).unwrap_or(0),
        underlying_port_id: attrs.get_u32(Tag::PortId),
        last_heard_from_ms: attrs.get_u64(Tag::NeighborLastHeard).unwrap_or(0),
        enrollment_attempt_count: attrs.get_u32(Tag::NeighborAttempts).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apni_round_trips() {
        let apni = Apni::new("app1").with_entity_name("src");
        let decoded = decode_apni(&encode_apni(&apni)).unwrap();
        assert_eq!(decoded, apni);
    }

    #[test]
    fn flow_spec_round_trips() {
        let spec = FlowSpec {
            max_sdu_size: 1500,
            ordered_delivery: true,
            max_allowable_gap: -1,
            ..FlowSpec::default()
        };
        let decoded = decode_flow_spec(&encode_flow_spec(&spec));
        assert_eq!(decoded, spec);
    }

    #[test]
    fn neighbor_round_trips() {
        let mut neighbor = Neighbor::new(Apni::new("b"), Apni::new("shim"));
        neighbor.address = 2;
        neighbor.enrolled = true;
        neighbor.underlying_port_id = Some(11);
        neighbor.last_heard_from_ms = 4_200;
        let decoded = decode_neighbor(&encode_neighbor(&neighbor)).unwrap();
        assert_eq!(decoded, neighbor);
    }

    #[test]
    fn dif_configuration_round_trips() {
        let config = DifConfiguration {
            data_transfer_constants: DataTransferConstants::default(),
            local_address: 1,
            qos_cubes: vec![QosCube {
                id: 0,
                name: "unreliable".to_string(),
                spec: FlowSpec::default(),
                connection_policies: ConnectionPolicies::default(),
            }],
            policies: vec![],
            pduft_generator_policy: PolicySet::new("default", "1"),
            link_state_routing: LinkStateRoutingConfig::default(),
        };
        let decoded = decode_dif_configuration(&encode_dif_configuration(&config));
        assert_eq!(decoded, config);
    }
}
