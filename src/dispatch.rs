//! Routes every `Event` the loop in `lib.rs` pulls off the queue to the
//! component that owns it (§2, §4.8): the flow allocator, the enrollment
//! controller, the resource allocator, or a per-IPCP RIB.

use std::time::Duration;

use bytes::BytesMut;
use cdap::{CdapMessage, Opcode};
use control::{
    enrollment::ENROLLMENT_OBJECT_CLASS,
    event_loop::{Event, EventLoop},
    flow_allocator::flow_object_port_id,
    model::{Apni, DifInformation, RoutingEntry},
    rib::{NEIGHBORS_CLASS, NEIGHBORS_NAME, NeighborsObject, PDUFT_CLASS, PDUFT_NAME, PduftObject, Rib},
};

use crate::context::{NodeContext, PendingTeardown};

pub async fn dispatch(context: &NodeContext, event_loop: &mut EventLoop, event: Event) {
    match event {
        Event::FlowRequest {
            ipcp_id,
            management_port_id,
            request,
        } => handle_flow_request(context, ipcp_id, management_port_id, request).await,
        Event::AllocateResult { port_id, result } => {
            if result.is_success() {
                log::info!("flow allocation succeeded: port {port_id:?}");
            } else {
                log::warn!("flow allocation failed for port {port_id:?}: {}", result.reason);
            }
        }
        Event::Deallocate {
            ipcp_id,
            management_port_id,
            port_id,
        } => handle_deallocate(context, event_loop, ipcp_id, management_port_id, port_id).await,
        Event::ApplicationRegister { ipcp_id, application } => {
            handle_application_register(context, ipcp_id, application).await
        }
        Event::ApplicationUnregister { ipcp_id, application } => {
            handle_application_unregister(context, ipcp_id, application).await
        }
        Event::AssignToDif { ipcp_id, dif_information } => handle_assign_to_dif(context, ipcp_id, dif_information).await,
        Event::EnrollToDif {
            ipcp_id,
            management_port_id,
            neighbor_name,
            supporting_dif_name,
        } => handle_enroll_to_dif(context, ipcp_id, management_port_id, neighbor_name, supporting_dif_name).await,
        Event::NeighborsModified { ipcp_id, neighbors } => {
            context.with_rib(ipcp_id, |rib| refresh_neighbors(rib, neighbors));
        }
        Event::QueryRib {
            ipcp_id,
            management_port_id,
            request,
        } => handle_query_rib(context, ipcp_id, management_port_id, request).await,
        Event::CreateConnectionResponse {
            ipcp_id,
            port_id,
            source_cep_id,
        } => {
            let mut ipcps = context.ipcps.lock();
            if let Some(flow) = ipcps.get_mut(&ipcp_id).and_then(|ipcp| ipcp.flows_by_port_id.get_mut(&port_id)) {
                if let Some(connection) = flow.active_connection_mut() {
                    connection.source_cep_id = Some(source_cep_id);
                }
            }
        }
        Event::DestroyConnectionResult { ipcp_id, port_id } => {
            log::debug!("connection for port {port_id} on ipcp {ipcp_id} destroyed");
        }
        Event::DumpPduftResponse { ipcp_id, entries } => {
            context.with_rib(ipcp_id, |rib| {
                if let Some(pduft) = rib.get_mut(PDUFT_CLASS, PDUFT_NAME).and_then(|o| o.as_any_mut().downcast_mut::<PduftObject>()) {
                    pduft.refresh(entries);
                }
            });
        }
        Event::RoutingTableUpdated { ipcp_id, routing_table } => {
            handle_routing_table_updated(context, ipcp_id, routing_table)
        }
        Event::TimerExpired { timer_id } => {
            match context.take_pending_teardown(timer_id) {
                Some(teardown) => complete_pending_teardown(context, teardown).await,
                None => log::debug!("timer {timer_id:?} expired"),
            }
        }
        Event::OsProcessFinalized { ipcp_id } => {
            if context.ipcps.destroy(ipcp_id).is_some() {
                context.drop_rib(ipcp_id);
                log::info!("ipcp {ipcp_id} finalized");
            }
        }
    }
}

/// An `M_CREATE`/`M_DELETE` on the flow object, arrived from a peer
/// IPCP. Both are routed here rather than through `Rib::dispatch`, per
/// `rib::objects`'s doc comment: flow allocation needs a kernel round
/// trip the synchronous `RibObject` contract can't express.
async fn handle_flow_request(context: &NodeContext, ipcp_id: u16, management_port_id: u32, request: CdapMessage) {
    let reply = {
        let mut ipcps = context.ipcps.lock();
        let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
            log::warn!("flow request for unknown ipcp {ipcp_id}");
            return;
        };

        let outcome = match request.opcode {
            Opcode::MCreate => {
                context
                    .flow_allocator
                    .handle_remote_create(ipcp, &context.kernel, &request, |_source, _spec| true)
                    .await
            }
            Opcode::MDelete => {
                if let Some(port_id) = request.obj_name.as_deref().and_then(flow_object_port_id) {
                    if let Err(err) = context
                        .flow_allocator
                        .handle_remote_delete(ipcp, &context.kernel, port_id)
                        .await
                    {
                        log::warn!("remote M_DELETE for port {port_id} on ipcp {ipcp_id} failed: {err}");
                    }
                } else {
                    log::warn!("M_DELETE with an unparseable flow object name on ipcp {ipcp_id}");
                }
                Ok(cdap::reply_skeleton(&request))
            }
            other => {
                log::warn!("unexpected opcode {other:?} addressed to a flow object on ipcp {ipcp_id}");
                return;
            }
        };

        match outcome {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("flow request on ipcp {ipcp_id} failed: {err}");
                return;
            }
        }
    };

    send_reply(context, ipcp_id, management_port_id, reply).await;
}

/// A CDAP request addressed to anything other than a flow object: an
/// `M_CONNECT`/`M_START` for enrollment (routed directly, same reason as
/// the flow object), or a read/write against a well-known RIB object,
/// which falls through to `Rib::dispatch`.
async fn handle_query_rib(context: &NodeContext, ipcp_id: u16, management_port_id: u32, request: CdapMessage) {
    let reply = match request.opcode {
        Opcode::MConnect => context.enrollment.handle_remote_connect(&request),
        Opcode::MStart if request.obj_class.as_deref() == Some(ENROLLMENT_OBJECT_CLASS) => {
            let mut ipcps = context.ipcps.lock();
            let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
                log::warn!("enrollment request for unknown ipcp {ipcp_id}");
                return;
            };
            let peer_name = Apni::new(request.src_ap_name.clone().unwrap_or_default());
            context.enrollment.handle_remote_enroll(ipcp, peer_name, &request)
        }
        _ => context.with_rib(ipcp_id, |rib| rib.dispatch(&request)),
    };

    send_reply(context, ipcp_id, management_port_id, reply).await;
}

/// Advances the session's state past the reply it is about to send
/// (`CdapSession::on_sent`) before encoding and writing it.
async fn send_reply(context: &NodeContext, ipcp_id: u16, management_port_id: u32, reply: CdapMessage) {
    let bytes = {
        let mut sessions = context.sessions.lock();
        let session = sessions.get_or_create(ipcp_id, management_port_id);
        session.on_sent(&reply);
        let mut buf = BytesMut::new();
        cdap::encode(&reply, &mut buf);
        buf.to_vec()
    };

    if let Err(err) = context.kernel.write_management_sdu(ipcp_id, management_port_id, &bytes).await {
        log::warn!("writing reply to ipcp {ipcp_id} port {management_port_id} failed: {err}");
    }
}

/// First half of a locally initiated deallocation: announce `M_DELETE`
/// and schedule the actual teardown `max_pdu_lifetime_ms` out on the
/// event loop's own timer wheel (§4.4). `Event::TimerExpired` completes
/// it via `complete_pending_teardown`.
async fn handle_deallocate(
    context: &NodeContext,
    event_loop: &mut EventLoop,
    ipcp_id: u16,
    management_port_id: u32,
    port_id: u32,
) {
    let mpl_ms = {
        let mut ipcps = context.ipcps.lock();
        let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
            log::warn!("deallocate for unknown ipcp {ipcp_id}");
            return;
        };

        let mut sessions = context.sessions.lock();
        let session = sessions.get_or_create(ipcp_id, management_port_id);
        match context
            .flow_allocator
            .begin_deallocate(ipcp, &context.kernel, session, management_port_id, port_id)
            .await
        {
            Ok(mpl_ms) => mpl_ms,
            Err(err) => {
                log::warn!("deallocating port {port_id} on ipcp {ipcp_id} failed: {err}");
                return;
            }
        }
    };

    let timer_id = event_loop.schedule_in(Duration::from_millis(u64::from(mpl_ms)));
    context.register_pending_teardown(timer_id, PendingTeardown { ipcp_id, port_id });
}

async fn complete_pending_teardown(context: &NodeContext, teardown: PendingTeardown) {
    let mut ipcps = context.ipcps.lock();
    let Some(ipcp) = ipcps.get_mut(&teardown.ipcp_id) else {
        return;
    };
    context.flow_allocator.complete_deallocate(ipcp, &context.kernel, teardown.port_id).await;
}

async fn handle_assign_to_dif(context: &NodeContext, ipcp_id: u16, dif_information: DifInformation) {
    let mut ipcps = context.ipcps.lock();
    let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
        log::warn!("assign-to-dif for unknown ipcp {ipcp_id}");
        return;
    };

    if let Err(err) = context.enrollment.assign_to_dif(ipcp, &context.kernel, dif_information).await {
        log::warn!("assign-to-dif on ipcp {ipcp_id} failed: {err}");
    }
}

async fn handle_enroll_to_dif(
    context: &NodeContext,
    ipcp_id: u16,
    management_port_id: u32,
    neighbor_name: Apni,
    supporting_dif_name: Apni,
) {
    let mut ipcps = context.ipcps.lock();
    let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
        log::warn!("enroll-to-dif for unknown ipcp {ipcp_id}");
        return;
    };

    let mut sessions = context.sessions.lock();
    let session = sessions.get_or_create(ipcp_id, management_port_id);

    let neighbors = match context
        .enrollment
        .enroll_to_dif(ipcp, session, &context.kernel, management_port_id, neighbor_name, supporting_dif_name)
        .await
    {
        Ok(_) => ipcp.neighbors.values().cloned().collect(),
        Err(err) => {
            log::warn!("enroll-to-dif on ipcp {ipcp_id} failed: {err}");
            return;
        }
    };

    drop(sessions);
    drop(ipcps);
    context.with_rib(ipcp_id, |rib| refresh_neighbors(rib, neighbors));
}

async fn handle_application_register(context: &NodeContext, ipcp_id: u16, application: Apni) {
    let mut ipcps = context.ipcps.lock();
    let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
        log::warn!("application register for unknown ipcp {ipcp_id}");
        return;
    };

    match context.kernel.register_application(ipcp_id, &application).await {
        Ok(()) => {
            if !ipcp.is_application_registered(&application) {
                ipcp.registered_applications.push(application);
            }
        }
        Err(err) => log::warn!("registering application on ipcp {ipcp_id} failed: {err}"),
    }
}

async fn handle_application_unregister(context: &NodeContext, ipcp_id: u16, application: Apni) {
    let mut ipcps = context.ipcps.lock();
    let Some(ipcp) = ipcps.get_mut(&ipcp_id) else {
        log::warn!("application unregister for unknown ipcp {ipcp_id}");
        return;
    };

    match context.kernel.unregister_application(ipcp_id, &application).await {
        Ok(()) => {
            ipcp.registered_applications
                .retain(|registered| registered.canonical_key() != application.canonical_key());
        }
        Err(err) => log::warn!("unregistering application on ipcp {ipcp_id} failed: {err}"),
    }
}

fn handle_routing_table_updated(context: &NodeContext, ipcp_id: u16, routing_table: Vec<RoutingEntry>) {
    let ipcps = context.ipcps.lock();
    let Some(ipcp) = ipcps.get(&ipcp_id) else {
        log::warn!("routing table update for unknown ipcp {ipcp_id}");
        return;
    };

    if let Err(err) = context.resource_allocator.update_routing_table(ipcp, &context.kernel, &routing_table) {
        log::warn!("updating the pdu forwarding table on ipcp {ipcp_id} failed: {err}");
    }
}

fn refresh_neighbors(rib: &mut Rib, neighbors: Vec<control::model::Neighbor>) {
    if let Some(object) = rib.get_mut(NEIGHBORS_CLASS, NEIGHBORS_NAME).and_then(|o| o.as_any_mut().downcast_mut::<NeighborsObject>()) {
        object.refresh(neighbors);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use control::{
        kernel_client::KernelClient,
        model::{Apni, Connection, Flow, Ipcp, Neighbor, PduftEntry},
    };
    use tokio::sync::mpsc;

    use super::*;
    use crate::context::NodeContext;

    fn test_context() -> NodeContext {
        let (client_side, _peer_side) = tokio::io::duplex(4096);
        let kernel = Arc::new(KernelClient::spawn(1, client_side, Duration::from_secs(5)));
        let (sender, _receiver) = mpsc::channel(16);
        NodeContext::new(kernel, sender)
    }

    fn neighbor(name: &str) -> Neighbor {
        Neighbor {
            name: Apni::new(name),
            supporting_dif_name: Apni::new("dif"),
            supporting_difs: vec![Apni::new("dif")],
            address: 2,
            enrolled: true,
            average_rtt_ms: 0,
            underlying_port_id: Some(1),
            last_heard_from_ms: 0,
            enrollment_attempt_count: 0,
        }
    }

    fn rib_object_is_empty(context: &NodeContext, ipcp_id: u16, class: &str, name: &str) -> bool {
        context.with_rib(ipcp_id, |rib| match rib.get(class, name).map(|o| o.on_read()) {
            Some(Ok(cdap::ObjectValue::Bytes(bytes))) => bytes.is_empty(),
            _ => true,
        })
    }

    #[tokio::test]
    async fn neighbors_modified_refreshes_the_rib_snapshot() {
        let context = test_context();
        let mut event_loop = EventLoop::new(8);
        assert!(rib_object_is_empty(&context, 1, NEIGHBORS_CLASS, NEIGHBORS_NAME));

        dispatch(
            &context,
            &mut event_loop,
            Event::NeighborsModified {
                ipcp_id: 1,
                neighbors: vec![neighbor("neighbor1")],
            },
        )
        .await;

        assert!(!rib_object_is_empty(&context, 1, NEIGHBORS_CLASS, NEIGHBORS_NAME));
    }

    #[tokio::test]
    async fn dump_pduft_response_refreshes_the_rib_snapshot() {
        let context = test_context();
        let mut event_loop = EventLoop::new(8);
        assert!(rib_object_is_empty(&context, 1, PDUFT_CLASS, PDUFT_NAME));

        dispatch(
            &context,
            &mut event_loop,
            Event::DumpPduftResponse {
                ipcp_id: 1,
                entries: vec![PduftEntry {
                    address: 2,
                    qos_id: 0,
                    port_ids: vec![7],
                }],
            },
        )
        .await;

        assert!(!rib_object_is_empty(&context, 1, PDUFT_CLASS, PDUFT_NAME));
    }

    #[tokio::test]
    async fn create_connection_response_records_the_source_cep_id() {
        let context = test_context();
        let mut event_loop = EventLoop::new(8);
        context.ipcps.create(1, Apni::new("app1")).unwrap();
        {
            let mut ipcps = context.ipcps.lock();
            let ipcp = ipcps.get_mut(&1).unwrap();
            let mut flow = Flow::new(Apni::new("app1"), Apni::new("app2"), 7, 64);
            flow.connections.push(Connection::new(7, 1, 2, 0));
            flow.active_connection_index = Some(0);
            ipcp.flows_by_port_id.insert(7, flow);
        }

        dispatch(
            &context,
            &mut event_loop,
            Event::CreateConnectionResponse {
                ipcp_id: 1,
                port_id: 7,
                source_cep_id: 42,
            },
        )
        .await;

        let mut ipcps = context.ipcps.lock();
        let flow = ipcps.get_mut(&1).unwrap().flows_by_port_id.get_mut(&7).unwrap();
        assert_eq!(flow.active_connection_mut().unwrap().source_cep_id, Some(42));
    }

    #[tokio::test]
    async fn os_process_finalized_drops_the_ipcp_and_its_rib() {
        let context = test_context();
        let mut event_loop = EventLoop::new(8);
        context.ipcps.create(1, Apni::new("app1")).unwrap();
        context.with_rib(1, |_rib| ());

        dispatch(&context, &mut event_loop, Event::OsProcessFinalized { ipcp_id: 1 }).await;

        assert!(context.ipcps.lock().get(&1).is_none());
        assert!(rib_object_is_empty(&context, 1, NEIGHBORS_CLASS, NEIGHBORS_NAME));
    }

    #[tokio::test]
    async fn events_for_an_unknown_ipcp_are_dropped_without_panicking() {
        let context = test_context();
        let mut event_loop = EventLoop::new(8);

        dispatch(
            &context,
            &mut event_loop,
            Event::Deallocate {
                ipcp_id: 99,
                management_port_id: 1,
                port_id: 7,
            },
        )
        .await;

        assert!(context.ipcps.lock().get(&99).is_none());
    }
}
