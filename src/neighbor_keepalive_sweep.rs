//! Periodic neighbor liveness sweep (§4.5 "Neighbor maintenance", §8
//! testable property 7).
//!
//! `NeighborMaintenance` itself is pure — it only knows how to remove
//! dead neighbors from an `Ipcp` and compute a backoff delay. This is
//! the background task that drives it on a wall-clock interval, pushes
//! the resulting `NeighborsModified` onto the event queue so the RIB
//! snapshot stays in sync (§8 property 7: "the forwarding table is
//! regenerated without N's port-ids"), and schedules the re-enrollment
//! attempt `NeighborMaintenance::sweep` said was still owed.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use control::{
    enrollment::NeighborMaintenance,
    event_loop::{Event, EventSource},
    model::Neighbor,
};
use tokio::sync::mpsc;

use crate::context::NodeContext;

pub struct NeighborKeepaliveSweep {
    context: Arc<NodeContext>,
    maintenance: NeighborMaintenance,
}

impl NeighborKeepaliveSweep {
    pub fn new(context: Arc<NodeContext>, keepalive_interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            context,
            maintenance: NeighborMaintenance::new(keepalive_interval_ms, max_attempts),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

impl EventSource for NeighborKeepaliveSweep {
    fn spawn(self, tx: mpsc::Sender<Event>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let interval = Duration::from_millis(self.maintenance.keepalive_interval_ms.max(1));
            loop {
                tokio::time::sleep(interval).await;
                let now = now_ms();

                for ipcp_id in self.context.ipcps.ids() {
                    let (dead, refreshed) = {
                        let mut ipcps = self.context.ipcps.lock();
                        let Some(ipcp) = ipcps.get_mut(&ipcp_id) else { continue };
                        let before: ahash::HashMap<String, Neighbor> = ipcp.neighbors.clone();
                        let dead = self.maintenance.sweep(ipcp, now);

                        let mut dead_with_record = Vec::new();
                        for candidate in dead {
                            let Some(attempt) = candidate.next_attempt else { continue };
                            if let Some(neighbor) = before.get(&candidate.canonical_key) {
                                dead_with_record.push((attempt, neighbor.clone()));
                            }
                        }
                        (dead_with_record, ipcp.neighbors.values().cloned().collect::<Vec<_>>())
                    };

                    if !dead.is_empty() {
                        if tx.send(Event::NeighborsModified { ipcp_id, neighbors: refreshed }).await.is_err() {
                            return;
                        }
                    }

                    for (attempt, neighbor) in dead {
                        let context = self.context.clone();
                        let tx = tx.clone();
                        let delay = Duration::from_millis(self.maintenance.backoff_delay_ms(attempt));
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            schedule_reenrollment(&context, &tx, ipcp_id, neighbor).await;
                        });
                    }
                }
            }
        })
    }
}

/// Allocates a fresh N-1 flow to the dead neighbor (§4.5 step 1) and, on
/// success, enqueues the `EnrollToDif` re-enrollment attempt (steps
/// 2-5) over it.
async fn schedule_reenrollment(context: &NodeContext, tx: &mpsc::Sender<Event>, ipcp_id: u16, neighbor: Neighbor) {
    let local_name = {
        let ipcps = context.ipcps.lock();
        match ipcps.get(&ipcp_id) {
            Some(ipcp) => ipcp.name.clone(),
            None => return,
        }
    };

    match context.kernel.allocate_flow(ipcp_id, &local_name, &neighbor.name).await {
        Ok(management_port_id) => {
            let _ = tx
                .send(Event::EnrollToDif {
                    ipcp_id,
                    management_port_id,
                    neighbor_name: neighbor.name,
                    supporting_dif_name: neighbor.supporting_dif_name,
                })
                .await;
        }
        Err(err) => {
            log::warn!("re-enrollment N-1 flow allocation to neighbor on ipcp {ipcp_id} failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::BytesMut;
    use control::{kernel_client::KernelClient, model::Apni};
    use kctl::{Attributes, Flags, Header, Record, Tag};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::context::NodeContext;

    fn test_context() -> (Arc<NodeContext>, tokio::io::DuplexStream) {
        let (client_side, peer_side) = tokio::io::duplex(4096);
        let kernel = Arc::new(KernelClient::spawn(1, client_side, Duration::from_secs(5)));
        let (sender, _receiver) = mpsc::channel(16);
        (Arc::new(NodeContext::new(kernel, sender)), peer_side)
    }

    #[tokio::test]
    async fn schedule_reenrollment_allocates_a_flow_and_enqueues_enroll_to_dif() {
        let (context, mut peer) = test_context();
        context.ipcps.create(1, Apni::new("local")).unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        let neighbor = Neighbor::new(Apni::new("peer"), Apni::new("shim"));
        let neighbor_for_task = neighbor.clone();
        let context_for_task = context.clone();
        let handle = tokio::spawn(async move {
            schedule_reenrollment(&context_for_task, &tx, 1, neighbor_for_task).await;
        });

        let mut buf = BytesMut::with_capacity(256);
        let sent = loop {
            if let Ok(Some(record)) = Record::decode(&mut buf) {
                break record;
            }
            let mut chunk = [0u8; 256];
            let n = peer.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
        };

        let mut reply_attrs = Attributes::new();
        reply_attrs.push_u32(Tag::PortId, 42);
        let reply = Record {
            header: Header {
                sequence_number: sent.header.sequence_number,
                source_ipcp_id: sent.header.destination_ipcp_id,
                destination_ipcp_id: sent.header.source_ipcp_id,
                destination_port: sent.header.destination_port,
                message_type: sent.header.message_type,
                flags: Flags::response(),
            },
            attrs: reply_attrs,
        };
        let mut wire = BytesMut::new();
        reply.encode(&mut wire);
        peer.write_all(&wire).await.unwrap();

        handle.await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            Event::EnrollToDif { ipcp_id: 1, management_port_id: 42, neighbor_name, .. }
                if neighbor_name == neighbor.name
        ));
    }
}
