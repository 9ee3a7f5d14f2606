use bytes::BytesMut;
use cdap::{AuthType, CdapMessage, ObjectValue, Opcode};
use kctl::Attributes;

use crate::{
    cdap_session::CdapSession,
    error::Error,
    kernel_client::KernelClient,
    model::{Apni, DifInformation, Ipcp, IpcpState, Neighbor},
    wire::{decode_enrollment_info, decode_enrollment_reply, encode_enrollment_info, encode_enrollment_reply},
};

pub const ENROLLMENT_OBJECT_CLASS: &str = "enrollment-information";
pub const ENROLLMENT_OBJECT_NAME: &str = "/daf/management/enrollment";

/// Drives an `Ipcp` through `Initialized -> Assigned -> Enrolled`. Like
/// `FlowAllocator`, holds only configuration — every call takes the
/// `Ipcp`, session and kernel handles it needs.
pub struct EnrollmentController;

impl Default for EnrollmentController {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrollmentController {
    pub fn new() -> Self {
        Self
    }

    /// Legal only from `Initialized`. Stores the DIF information, asks
    /// the kernel to assign it, and rolls the stored information back on
    /// failure.
    pub async fn assign_to_dif(
        &self,
        ipcp: &mut Ipcp,
        kernel: &KernelClient,
        dif_information: DifInformation,
    ) -> Result<(), Error> {
        if ipcp.state != IpcpState::Initialized {
            return Err(Error::InvalidStateTransition("assign_to_dif requires Initialized"));
        }

        ipcp.dif_information = Some(dif_information.clone());

        match kernel.assign_to_dif(ipcp.ipcp_id, &dif_information.dif_name.process_name).await {
            Ok(()) => {
                kernel.update_dif_config(ipcp.ipcp_id, &dif_information.configuration).await?;
                ipcp.mark_assigned();
                Ok(())
            }
            Err(err) => {
                ipcp.dif_information = None;
                Err(err)
            }
        }
    }

    /// Requires `Assigned`. `management_port_id` is the already-allocated
    /// N-1 flow reaching `neighbor_name` — allocating that flow is the
    /// supporting IPCP's job and happens before this is called.
    pub async fn enroll_to_dif(
        &self,
        ipcp: &mut Ipcp,
        session: &mut CdapSession,
        kernel: &KernelClient,
        management_port_id: u32,
        neighbor_name: Apni,
        supporting_dif_name: Apni,
    ) -> Result<Vec<Neighbor>, Error> {
        if ipcp.state != IpcpState::Assigned {
            return Err(Error::InvalidStateTransition("enroll_to_dif requires Assigned"));
        }

        // Step 2: open a CDAP session over the N-1 flow.
        let mut connect = CdapMessage::new(Opcode::MConnect, 0);
        connect.abs_syntax = Some(1);
        connect.auth_mech = Some(AuthType::None);
        connect.src_ap_name = Some(ipcp.name.process_name.clone());
        connect.dest_ap_name = Some(neighbor_name.process_name.clone());
        let connect_reply = self.exchange(session, kernel, ipcp.ipcp_id, management_port_id, connect).await?;
        if connect_reply.result != Some(0) {
            return Err(Error::PeerRejected(
                connect_reply.result_reason.unwrap_or_else(|| "connect rejected".to_string()),
            ));
        }

        // Step 3: exchange the enrollment information request.
        let address = ipcp
            .dif_information
            .as_ref()
            .map(|dif| dif.configuration.local_address)
            .unwrap_or(0);

        let mut start = CdapMessage::new(Opcode::MStart, 0);
        start.obj_class = Some(ENROLLMENT_OBJECT_CLASS.to_string());
        start.obj_name = Some(ENROLLMENT_OBJECT_NAME.to_string());
        start.obj_value = Some(encode_to_bytes(&encode_enrollment_info(address, &[supporting_dif_name])));

        let start_reply = self.exchange(session, kernel, ipcp.ipcp_id, management_port_id, start).await?;
        if start_reply.result != Some(0) {
            return Err(Error::PeerRejected(
                start_reply.result_reason.unwrap_or_else(|| "enrollment rejected".to_string()),
            ));
        }

        // Step 4: receive the DIF configuration delta and neighbor table.
        let reply_attrs = match start_reply.obj_value {
            Some(ObjectValue::Bytes(bytes)) => Attributes::decode(&bytes)?,
            _ => return Err(Error::InvalidField("obj_value")),
        };
        let (config, neighbors) = decode_enrollment_reply(&reply_attrs)?;

        if let Some(dif) = ipcp.dif_information.as_mut() {
            dif.configuration = config;
        }

        let mut neighbor = Neighbor::new(neighbor_name, supporting_dif_name);
        neighbor.enrolled = true;
        neighbor.underlying_port_id = Some(management_port_id);
        ipcp.neighbors.insert(neighbor.name.canonical_key(), neighbor);
        for n in &neighbors {
            ipcp.neighbors.entry(n.name.canonical_key()).or_insert_with(|| n.clone());
        }

        ipcp.mark_enrolled();
        Ok(neighbors)
    }

    /// Peer side: respond to an incoming `M_CONNECT` with `M_CONNECT_R`.
    pub fn handle_remote_connect(&self, request: &CdapMessage) -> CdapMessage {
        let mut reply = cdap::reply_skeleton(request);
        reply.result = Some(0);
        reply
    }

    /// Peer side: respond to an incoming `M_START` on the enrollment
    /// object with this IPCP's DIF configuration and neighbor table, and
    /// record the enrolling peer as a neighbor.
    pub fn handle_remote_enroll(&self, ipcp: &mut Ipcp, peer_name: Apni, request: &CdapMessage) -> CdapMessage {
        let mut reply = cdap::reply_skeleton(request);

        let neighbors_before: Vec<Neighbor> = ipcp.neighbors.values().cloned().collect();

        let dif = match ipcp.dif_information.as_ref() {
            Some(dif) => dif.clone(),
            None => {
                reply.result = Some(1);
                reply.result_reason = Some(Error::NotAMemberOfDif.to_string());
                return reply;
            }
        };

        let (peer_address, peer_supporting_difs) = match request
            .obj_value
            .as_ref()
            .ok_or(Error::RequiredFieldMissing("obj_value"))
            .and_then(|value| match value {
                ObjectValue::Bytes(bytes) => Attributes::decode(bytes).map_err(Error::from),
                _ => Err(Error::InvalidField("obj_value")),
            })
            .and_then(|attrs| decode_enrollment_info(&attrs))
        {
            Ok(decoded) => decoded,
            Err(err) => {
                reply.result = Some(1);
                reply.result_reason = Some(err.to_string());
                return reply;
            }
        };

        let supporting_dif_name = peer_supporting_difs.into_iter().next().unwrap_or_else(|| Apni::new(""));
        let mut neighbor = Neighbor::new(peer_name, supporting_dif_name);
        neighbor.address = peer_address;
        neighbor.enrolled = true;
        ipcp.neighbors.insert(neighbor.name.canonical_key(), neighbor);

        reply.result = Some(0);
        reply.obj_value = Some(encode_to_bytes(&encode_enrollment_reply(&dif.configuration, &neighbors_before)));
        reply
    }

    async fn exchange(
        &self,
        session: &mut CdapSession,
        kernel: &KernelClient,
        ipcp_id: u16,
        management_port_id: u32,
        message: CdapMessage,
    ) -> Result<CdapMessage, Error> {
        let (bytes, rx) = session.encode_next(message)?;
        kernel.write_management_sdu(ipcp_id, management_port_id, &bytes).await?;
        rx.ok_or(Error::MalformedMessage)?.await.map_err(|_| Error::ChannelClosed)
    }
}

fn encode_to_bytes(attrs: &Attributes) -> ObjectValue {
    let mut buf = BytesMut::new();
    attrs.encode(&mut buf);
    ObjectValue::Bytes(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataTransferConstants, DifConfiguration, DifType, LinkStateRoutingConfig, PolicySet, QosCube};

    fn dif(address: u32) -> DifInformation {
        DifInformation {
            dif_type: DifType::Normal,
            dif_name: Apni::new("dif"),
            configuration: DifConfiguration {
                data_transfer_constants: DataTransferConstants::default(),
                local_address: address,
                qos_cubes: vec![QosCube {
                    id: 0,
                    name: "unreliable".to_string(),
                    spec: Default::default(),
                    connection_policies: Default::default(),
                }],
                policies: vec![],
                pduft_generator_policy: PolicySet::new("default", "1"),
                link_state_routing: LinkStateRoutingConfig::default(),
            },
        }
    }

    #[test]
    fn handle_remote_enroll_without_dif_information_fails() {
        let mut ipcp = Ipcp::new(1, Apni::new("a"));
        let mut request = CdapMessage::new(Opcode::MStart, 4);
        request.obj_class = Some(ENROLLMENT_OBJECT_CLASS.to_string());
        let controller = EnrollmentController::new();
        let reply = controller.handle_remote_enroll(&mut ipcp, Apni::new("b"), &request);
        assert_eq!(reply.result, Some(1));
    }

    #[test]
    fn handle_remote_enroll_replies_with_dif_config_and_records_the_peer() {
        let mut ipcp = Ipcp::new(1, Apni::new("a"));
        ipcp.dif_information = Some(dif(1));
        let mut request = CdapMessage::new(Opcode::MStart, 4);
        request.obj_class = Some(ENROLLMENT_OBJECT_CLASS.to_string());
        request.obj_value = Some(encode_to_bytes(&encode_enrollment_info(2, &[Apni::new("shim")])));

        let controller = EnrollmentController::new();
        let reply = controller.handle_remote_enroll(&mut ipcp, Apni::new("b"), &request);
        assert_eq!(reply.result, Some(0));
        assert!(ipcp.neighbors.contains_key(&Apni::new("b").canonical_key()));

        let attrs = match reply.obj_value {
            Some(ObjectValue::Bytes(bytes)) => Attributes::decode(&bytes).unwrap(),
            _ => panic!("expected bytes"),
        };
        let (config, neighbors) = decode_enrollment_reply(&attrs).unwrap();
        assert_eq!(config.local_address, 1);
        assert!(neighbors.is_empty());
    }
}
