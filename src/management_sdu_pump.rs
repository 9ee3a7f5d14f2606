//! Translates inbound management SDUs into `Event`s.
//!
//! §5 describes a background reader that "marshals bytes into event
//! records and enqueues them; it does not call into components
//! directly". `KernelClient`'s own reader only resolves pending
//! requests/notifications (it knows nothing about CDAP); this is the
//! layer above it that decodes the SDU payload and classifies it as a
//! flow request or a generic RIB query before handing it to the loop.

use std::{sync::Arc, time::Duration};

use cdap::Opcode;
use control::{event_loop::{Event, EventSource}, flow_allocator::FLOW_OBJECT_NAME_PREFIX};
use tokio::sync::mpsc;

use crate::context::NodeContext;

/// How long a per-IPCP `read_management_sdu` poll is allowed to sit idle
/// before the pump re-checks which IPCPs are currently hosted (an IPCP
/// created after the pump started must still get polled).
const IPCP_LIST_REFRESH_INTERVAL: Duration = Duration::from_millis(200);

pub struct ManagementSduPump {
    context: Arc<NodeContext>,
}

impl ManagementSduPump {
    pub fn new(context: Arc<NodeContext>) -> Self {
        Self { context }
    }
}

impl EventSource for ManagementSduPump {
    fn spawn(self, tx: mpsc::Sender<Event>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let ipcp_ids = self.context.ipcps.ids();
                if ipcp_ids.is_empty() {
                    tokio::time::sleep(IPCP_LIST_REFRESH_INTERVAL).await;
                    continue;
                }

                let mut polls = tokio::task::JoinSet::new();
                for ipcp_id in ipcp_ids {
                    let context = self.context.clone();
                    polls.spawn(async move {
                        tokio::time::timeout(IPCP_LIST_REFRESH_INTERVAL, context.kernel.read_management_sdu(ipcp_id))
                            .await
                            .ok()
                            .and_then(Result::ok)
                            .map(|(bytes, port_id)| (ipcp_id, port_id, bytes))
                    });
                }

                while let Some(joined) = polls.join_next().await {
                    let Ok(Some((ipcp_id, port_id, bytes))) = joined else {
                        continue;
                    };

                    let Ok(request) = cdap::decode(&bytes) else {
                        log::warn!("malformed CDAP message on ipcp {ipcp_id} port {port_id}, dropped");
                        continue;
                    };

                    let event = classify(ipcp_id, port_id, request);
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        })
    }
}

fn classify(ipcp_id: u16, management_port_id: u32, request: cdap::CdapMessage) -> Event {
    let is_flow_object = request.obj_name.as_deref().is_some_and(|name| name.starts_with(FLOW_OBJECT_NAME_PREFIX));

    match request.opcode {
        (Opcode::MCreate | Opcode::MDelete) if is_flow_object => Event::FlowRequest {
            ipcp_id,
            management_port_id,
            request,
        },
        _ => Event::QueryRib {
            ipcp_id,
            management_port_id,
            request,
        },
    }
}

#[cfg(test)]
mod tests {
    use cdap::CdapMessage;

    use super::*;

    fn flow_create() -> CdapMessage {
        let mut msg = CdapMessage::new(Opcode::MCreate, 1);
        msg.obj_name = Some(format!("{FLOW_OBJECT_NAME_PREFIX}7"));
        msg
    }

    #[test]
    fn create_on_a_flow_object_is_a_flow_request() {
        let event = classify(1, 9, flow_create());
        assert!(matches!(event, Event::FlowRequest { ipcp_id: 1, management_port_id: 9, .. }));
    }

    #[test]
    fn delete_on_a_flow_object_is_a_flow_request() {
        let mut msg = flow_create();
        msg.opcode = Opcode::MDelete;
        let event = classify(1, 9, msg);
        assert!(matches!(event, Event::FlowRequest { .. }));
    }

    #[test]
    fn create_on_a_non_flow_object_falls_through_to_query_rib() {
        let mut msg = CdapMessage::new(Opcode::MCreate, 1);
        msg.obj_name = Some("/dif/management/neighbors".to_string());
        let event = classify(1, 9, msg);
        assert!(matches!(event, Event::QueryRib { .. }));
    }

    #[test]
    fn connect_is_always_a_query_rib_event() {
        let msg = CdapMessage::new(Opcode::MConnect, 1);
        let event = classify(1, 9, msg);
        assert!(matches!(event, Event::QueryRib { .. }));
    }
}
