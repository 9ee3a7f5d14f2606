use cdap::{CdapMessage, Opcode};

use crate::{
    cdap_session::CdapSession,
    error::{Error, ResultCode},
    flow_allocator::flow_object::FlowObject,
    kernel_client::KernelClient,
    model::{Apni, Connection, Flow, FlowSpec, FlowState, select_qos_cube},
};

const INITIAL_HOP_COUNT: u32 = 10;

/// Name prefix every flow RIB object is created under (§4.7). Exposed so
/// the event producer that classifies inbound CDAP traffic can route
/// `M_CREATE`/`M_DELETE` against it without duplicating the path.
pub const FLOW_OBJECT_NAME_PREFIX: &str = "/dif/resourceallocation/flowallocator/flows/";

fn flow_object_name(port_id: u32) -> String {
    format!("{FLOW_OBJECT_NAME_PREFIX}{port_id}")
}

/// Recover the port-id a flow object's RIB name was built from, the
/// inverse of `flow_object_name`. Used by the event dispatcher to route
/// an incoming `M_DELETE` on a flow object to `handle_remote_delete`.
pub fn flow_object_port_id(obj_name: &str) -> Option<u32> {
    obj_name.rsplit('/').next()?.parse().ok()
}

/// Send `M_DELETE` on the flow object to `management_port`, best-effort.
/// Shared by the initiator-side deallocate path and the compensating
/// teardown sent when a peer's accepted `M_CREATE` can't be finalized
/// locally.
async fn send_flow_delete(
    ipcp_id: u16,
    kernel: &KernelClient,
    session: &mut CdapSession,
    management_port: u32,
    port_id: u32,
) {
    let mut request = CdapMessage::new(Opcode::MDelete, 0);
    request.obj_class = Some("flow".to_string());
    request.obj_name = Some(flow_object_name(port_id));
    if let Ok((bytes, _rx)) = session.encode_next(request) {
        let _ = kernel.write_management_sdu(ipcp_id, management_port, &bytes).await;
    }
}

/// Outcome of waiting for the peer's `M_CREATE_R`: whether a failure
/// happened before or after the peer accepted the flow. `AfterPeerAccept`
/// means the peer's CDAP session already believes this flow is
/// `Allocated` and must be told otherwise with a compensating `M_DELETE`.
enum CreateOutcomeError {
    BeforePeerAccept(Error),
    AfterPeerAccept(Error),
}

/// Outcome of a flow allocation attempt: the port-id on success, or a
/// result code the requester can inspect on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocateFlowRequestResult {
    pub port_id: Option<u32>,
    pub result: ResultCode,
}

impl AllocateFlowRequestResult {
    fn success(port_id: u32) -> Self {
        Self {
            port_id: Some(port_id),
            result: ResultCode::success(),
        }
    }

    fn failure(err: &Error) -> Self {
        Self {
            port_id: None,
            result: ResultCode::from(err),
        }
    }
}

/// Drives a flow from `Empty` through `Allocated`/`Deallocated`. Holds
/// no per-flow state of its own — every operation takes the owning
/// `Ipcp` and the session/kernel handles it needs rather than a pointer
/// back into them.
pub struct FlowAllocator {
    pub max_create_flow_retries: u32,
}

impl FlowAllocator {
    pub fn new(max_create_flow_retries: u32) -> Self {
        Self { max_create_flow_retries }
    }

    /// Locally initiated allocation: reserve a port-id, resolve the
    /// destination, negotiate an EFCP connection, then exchange the flow
    /// object with the peer over CDAP.
    pub async fn allocate_locally(
        &self,
        ipcp: &mut crate::model::Ipcp,
        kernel: &KernelClient,
        session: &mut CdapSession,
        local_apni: Apni,
        destination: Apni,
        requested: FlowSpec,
    ) -> AllocateFlowRequestResult {
        // Step 1: reserve a local port-id.
        let port_id = match kernel.allocate_flow(ipcp.ipcp_id, &local_apni, &destination).await {
            Ok(id) => id,
            Err(err) => return AllocateFlowRequestResult::failure(&err),
        };

        let mut flow = Flow::new(local_apni.clone(), destination.clone(), port_id, INITIAL_HOP_COUNT);
        flow.state = FlowState::AllocationInProgress;
        flow.flow_spec = requested;
        ipcp.flows_by_port_id.insert(port_id, flow);

        let result = self
            .drive_locally_initiated(ipcp, kernel, session, port_id, &local_apni, &destination, requested)
            .await;

        match result {
            Ok(()) => AllocateFlowRequestResult::success(port_id),
            Err(err) => {
                ipcp.flows_by_port_id.remove(&port_id);
                let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
                AllocateFlowRequestResult::failure(&err)
            }
        }
    }

    async fn drive_locally_initiated(
        &self,
        ipcp: &mut crate::model::Ipcp,
        kernel: &KernelClient,
        session: &mut CdapSession,
        port_id: u32,
        local_apni: &Apni,
        destination: &Apni,
        requested: FlowSpec,
    ) -> Result<(), Error> {
        // Step 2: resolve the destination APNI to a destination address.
        let dest_address = ipcp
            .directory_forwarding_table
            .resolve(destination)
            .ok_or(Error::UnknownApplication)?;

        let dif = ipcp.dif_information.as_ref().ok_or(Error::NotAMemberOfDif)?;
        let local_address = dif.configuration.local_address;
        let qos_cube = select_qos_cube(&dif.configuration.qos_cubes, &requested)
            .ok_or(Error::FlowSpecUnsatisfiable)?
            .clone();

        let management_port = ipcp
            .management_port_for_address(dest_address)
            .ok_or(Error::UnknownApplication)?;

        // Step 3: request creation of an EFCP connection.
        let mut connection = Connection::with_policies(
            port_id,
            local_address,
            dest_address,
            qos_cube.id,
            qos_cube.connection_policies.clone(),
        );
        let source_cep_id = kernel.create_connection(ipcp.ipcp_id, &connection).await?;
        connection.source_cep_id = Some(source_cep_id);

        if let Some(flow) = ipcp.flows_by_port_id.get_mut(&port_id) {
            flow.connections.push(connection);
            flow.active_connection_index = Some(0);
        }

        let mut retry_count = 0;
        loop {
            // Step 4: send M_CREATE for the flow object.
            let flow_object = FlowObject {
                source_apni: local_apni.clone(),
                dest_apni: destination.clone(),
                source_port_id: port_id,
                source_cep_id,
                dest_cep_id: None,
                flow_spec: requested,
                policies: connection_policies(ipcp, port_id),
                hop_count: INITIAL_HOP_COUNT,
            };

            let mut request = CdapMessage::new(Opcode::MCreate, 0);
            request.obj_class = Some("flow".to_string());
            request.obj_name = Some(flow_object_name(port_id));
            request.obj_value = Some(flow_object.to_object_value());

            let (bytes, rx) = session.encode_next(request)?;
            kernel.write_management_sdu(ipcp.ipcp_id, management_port, &bytes).await?;

            let step = self.await_create_response(rx, kernel, ipcp.ipcp_id, port_id).await;

            match step {
                Ok(()) => return Ok(()),
                Err(CreateOutcomeError::BeforePeerAccept(err))
                    if err.is_transient() && retry_count < self.max_create_flow_retries =>
                {
                    retry_count += 1;
                    if let Some(flow) = ipcp.flows_by_port_id.get_mut(&port_id) {
                        flow.create_retry_count = retry_count;
                    }
                    continue;
                }
                Err(CreateOutcomeError::AfterPeerAccept(err)) => {
                    // The peer already moved its session to "accepted"
                    // before the local finalization step failed; it
                    // believes the flow is allocated, so it must be told
                    // to tear down with a compensating M_DELETE.
                    send_flow_delete(ipcp.ipcp_id, kernel, session, management_port, port_id).await;
                    let _ = kernel.destroy_connection(ipcp.ipcp_id, port_id, source_cep_id).await;
                    return Err(err);
                }
                Err(CreateOutcomeError::BeforePeerAccept(err)) => {
                    // The peer already saw M_CREATE; tear the connection
                    // down here so it isn't left dangling on the kernel
                    // side. `allocate_locally` still owns releasing the
                    // port-id once this returns.
                    let _ = kernel.destroy_connection(ipcp.ipcp_id, port_id, source_cep_id).await;
                    return Err(err);
                }
            }
        }
    }

    async fn await_create_response(
        &self,
        rx: Option<tokio::sync::oneshot::Receiver<CdapMessage>>,
        kernel: &KernelClient,
        ipcp_id: u16,
        port_id: u32,
    ) -> Result<(), CreateOutcomeError> {
        let rx = rx.ok_or(CreateOutcomeError::BeforePeerAccept(Error::MalformedMessage))?;
        let reply = rx
            .await
            .map_err(|_| CreateOutcomeError::BeforePeerAccept(Error::ChannelClosed))?;

        match reply.result {
            Some(0) => {
                // From here on the peer has already accepted the flow; any
                // failure must be reported back with a compensating
                // M_DELETE rather than silently left for it to discover.
                let flow_object = FlowObject::from_object_value(
                    reply
                        .obj_value
                        .as_ref()
                        .ok_or(Error::RequiredFieldMissing("obj_value"))
                        .map_err(CreateOutcomeError::AfterPeerAccept)?,
                )
                .map_err(CreateOutcomeError::AfterPeerAccept)?;
                let dest_cep_id = flow_object
                    .dest_cep_id
                    .ok_or(Error::RequiredFieldMissing("dest_cep_id"))
                    .map_err(CreateOutcomeError::AfterPeerAccept)?;
                kernel
                    .update_connection(ipcp_id, port_id, dest_cep_id, ipcp_id)
                    .await
                    .map_err(CreateOutcomeError::AfterPeerAccept)?;
                Ok(())
            }
            Some(_) => Err(CreateOutcomeError::BeforePeerAccept(Error::PeerRejected(
                reply.result_reason.unwrap_or_else(|| "unspecified".to_string()),
            ))),
            None => Err(CreateOutcomeError::BeforePeerAccept(Error::MalformedMessage)),
        }
    }

    /// Remotely initiated allocation: validate the incoming flow object,
    /// reserve a port-id and connection for it, and let `accept` decide
    /// whether to bind it to a registered application. Returns the
    /// `M_CREATE_R` to hand back to the peer; the caller is responsible
    /// for sending it and, in the accept case, completing
    /// `session.on_sent`.
    pub async fn handle_remote_create(
        &self,
        ipcp: &mut crate::model::Ipcp,
        kernel: &KernelClient,
        request: &CdapMessage,
        accept: impl FnOnce(&Apni, &FlowSpec) -> bool,
    ) -> Result<CdapMessage, Error> {
        let mut reply = cdap::reply_skeleton(request);

        let flow_object = match request
            .obj_value
            .as_ref()
            .ok_or(Error::RequiredFieldMissing("obj_value"))
            .and_then(FlowObject::from_object_value)
        {
            Ok(f) => f,
            Err(err) => {
                reply.result = Some(1);
                reply.result_reason = Some(err.to_string());
                return Ok(reply);
            }
        };

        if flow_object.hop_count == 0 {
            reply.result = Some(1);
            reply.result_reason = Some("hop count exhausted".to_string());
            return Ok(reply);
        }

        if !ipcp.is_application_registered(&flow_object.dest_apni) {
            reply.result = Some(1);
            reply.result_reason = Some(Error::UnknownApplication.to_string());
            return Ok(reply);
        }

        let port_id = match kernel
            .allocate_flow(ipcp.ipcp_id, &flow_object.dest_apni, &flow_object.source_apni)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                reply.result = Some(1);
                reply.result_reason = Some(err.to_string());
                return Ok(reply);
            }
        };

        let dif = ipcp.dif_information.as_ref().ok_or(Error::NotAMemberOfDif)?;
        let local_address = dif.configuration.local_address;

        let peer_address = match ipcp.directory_forwarding_table.resolve(&flow_object.source_apni) {
            Some(address) => address,
            None => {
                let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
                reply.result = Some(1);
                reply.result_reason = Some(Error::UnknownApplication.to_string());
                return Ok(reply);
            }
        };
        let qos_cube = match select_qos_cube(&dif.configuration.qos_cubes, &flow_object.flow_spec) {
            Some(cube) => cube.clone(),
            None => {
                let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
                reply.result = Some(1);
                reply.result_reason = Some(Error::FlowSpecUnsatisfiable.to_string());
                return Ok(reply);
            }
        };

        let mut connection = Connection::with_policies(
            port_id,
            local_address,
            peer_address,
            qos_cube.id,
            qos_cube.connection_policies.clone(),
        );
        connection.dest_cep_id = Some(flow_object.source_cep_id);

        let source_cep_id = match kernel.create_connection_arrived(ipcp.ipcp_id, &connection).await {
            Ok(id) => id,
            Err(err) => {
                let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
                reply.result = Some(1);
                reply.result_reason = Some(err.to_string());
                return Ok(reply);
            }
        };
        connection.source_cep_id = Some(source_cep_id);

        let mut flow = Flow::new(flow_object.dest_apni.clone(), flow_object.source_apni.clone(), port_id, 0);
        flow.flow_spec = flow_object.flow_spec;
        flow.connections.push(connection);
        flow.active_connection_index = Some(0);

        if accept(&flow_object.source_apni, &flow_object.flow_spec) {
            flow.state = FlowState::Allocated;
            ipcp.flows_by_port_id.insert(port_id, flow);

            let accepted = FlowObject {
                dest_cep_id: Some(source_cep_id),
                ..flow_object
            };
            reply.result = Some(0);
            reply.obj_value = Some(accepted.to_object_value());
        } else {
            let _ = kernel.destroy_connection(ipcp.ipcp_id, port_id, source_cep_id).await;
            let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
            reply.result = Some(1);
            reply.result_reason = Some("application rejected flow".to_string());
        }

        Ok(reply)
    }

    /// Initiating side of deallocation, first half: announce `M_DELETE`
    /// to the peer and move the flow to `WaitingMplBeforeTeardown`.
    /// Returns the `max_pdu_lifetime_ms` the caller must wait before
    /// calling `complete_deallocate` — the DIF's data-transfer constants
    /// bound how long a PDU belonging to this connection can still be in
    /// flight, so local resources can't be reused before that window
    /// passes (§4.4).
    pub async fn begin_deallocate(
        &self,
        ipcp: &mut crate::model::Ipcp,
        kernel: &KernelClient,
        session: &mut CdapSession,
        management_port: u32,
        port_id: u32,
    ) -> Result<u32, Error> {
        let flow = ipcp.flows_by_port_id.get_mut(&port_id).ok_or(Error::NotRegistered)?;
        flow.state = FlowState::WaitingMplBeforeTeardown;

        send_flow_delete(ipcp.ipcp_id, kernel, session, management_port, port_id).await;

        Ok(ipcp
            .dif_information
            .as_ref()
            .map(|dif| dif.configuration.data_transfer_constants.max_pdu_lifetime_ms)
            .unwrap_or_default())
    }

    /// Initiating side of deallocation, second half: once
    /// `max_pdu_lifetime_ms` has elapsed, tear the EFCP connection down
    /// and release the port-id. A no-op if the flow is already gone (the
    /// peer's own `M_DELETE` raced this one and `handle_remote_delete`
    /// already cleaned it up).
    pub async fn complete_deallocate(&self, ipcp: &mut crate::model::Ipcp, kernel: &KernelClient, port_id: u32) {
        let Some(flow) = ipcp.flows_by_port_id.get_mut(&port_id) else {
            return;
        };
        let cep_id = flow.active_connection().and_then(|c| c.source_cep_id);
        flow.state = FlowState::Deallocated;

        if let Some(cep_id) = cep_id {
            let _ = kernel.destroy_connection(ipcp.ipcp_id, port_id, cep_id).await;
        }
        let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
        ipcp.flows_by_port_id.remove(&port_id);
    }

    /// Peer side of deallocation. Also covers the race where the peer
    /// sends `M_DELETE` while the local flow is still
    /// `AllocationInProgress`: in both cases the local flow moves
    /// directly to `Deallocated` and its connection is torn down.
    pub async fn handle_remote_delete(
        &self,
        ipcp: &mut crate::model::Ipcp,
        kernel: &KernelClient,
        port_id: u32,
    ) -> Result<(), Error> {
        if let Some(flow) = ipcp.flows_by_port_id.get_mut(&port_id) {
            let cep_id = flow.active_connection().and_then(|c| c.source_cep_id);
            flow.state = FlowState::Deallocated;
            if let Some(cep_id) = cep_id {
                let _ = kernel.destroy_connection(ipcp.ipcp_id, port_id, cep_id).await;
            }
        }
        let _ = kernel.deallocate_flow(ipcp.ipcp_id, port_id).await;
        ipcp.flows_by_port_id.remove(&port_id);
        Ok(())
    }
}

fn connection_policies(ipcp: &crate::model::Ipcp, port_id: u32) -> crate::model::ConnectionPolicies {
    ipcp.flows_by_port_id
        .get(&port_id)
        .and_then(|flow| flow.active_connection())
        .map(|connection| connection.policies.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionPolicies, DataTransferConstants, DifConfiguration, DifInformation, DifType, Ipcp, QosCube};

    fn dif_with_address(address: u32) -> DifInformation {
        DifInformation {
            dif_type: DifType::Normal,
            dif_name: Apni::new("dif"),
            configuration: DifConfiguration {
                data_transfer_constants: DataTransferConstants::default(),
                local_address: address,
                qos_cubes: vec![QosCube {
                    id: 0,
                    name: "unreliable".to_string(),
                    spec: FlowSpec::default(),
                    connection_policies: ConnectionPolicies::default(),
                }],
                policies: vec![],
                pduft_generator_policy: crate::model::PolicySet::new("default", "1"),
                link_state_routing: crate::model::LinkStateRoutingConfig::default(),
            },
        }
    }

    #[test]
    fn unknown_application_fails_before_reserving_a_connection() {
        // Regression guard for the directory-miss path: a destination
        // absent from the directory forwarding table must fail before any
        // EFCP connection is attempted, exercised at the model level since
        // the full async path needs a live kernel client.
        let mut ipcp = Ipcp::new(1, Apni::new("app1"));
        ipcp.dif_information = Some(dif_with_address(1));
        assert!(ipcp.directory_forwarding_table.resolve(&Apni::new("app2")).is_none());
    }

    #[test]
    fn flow_object_port_id_recovers_what_flow_object_name_encoded() {
        assert_eq!(flow_object_name(7), "/dif/resourceallocation/flowallocator/flows/7");
        assert_eq!(flow_object_port_id("/dif/resourceallocation/flowallocator/flows/7"), Some(7));
        assert_eq!(flow_object_port_id("/garbage"), None);
    }
}
