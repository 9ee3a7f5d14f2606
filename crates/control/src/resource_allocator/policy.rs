use ahash::HashMap;

use crate::model::{Ipcp, PduftEntry, RoutingEntry};

/// Turns a routing table into a PDU forwarding table. Swappable so a DIF
/// can plug in an alternative generation strategy; `DefaultPduftGenerator`
/// is the only body this crate ships.
pub trait PduftGeneratorPolicy {
    fn generate(&self, ipcp: &Ipcp, routing_table: &[RoutingEntry]) -> Vec<PduftEntry>;
}

/// For each routing entry, resolves the primary next-hop address to an
/// N-1 management port-id via the neighbor table and drops entries that
/// have no resolvable next hop. Routing entries that share an
/// `(address, qos_id)` key — equal-cost alternatives — collapse into one
/// `PduftEntry` carrying every resolved port-id.
pub struct DefaultPduftGenerator;

impl PduftGeneratorPolicy for DefaultPduftGenerator {
    fn generate(&self, ipcp: &Ipcp, routing_table: &[RoutingEntry]) -> Vec<PduftEntry> {
        let mut by_key: HashMap<(u32, u32), Vec<u32>> = HashMap::default();
        let mut order: Vec<(u32, u32)> = Vec::new();

        for entry in routing_table {
            let Some(primary) = entry.next_hop_addresses.first() else {
                continue;
            };
            let Some(port_id) = ipcp.management_port_for_address(*primary) else {
                continue;
            };

            let key = (entry.destination_address, entry.qos_id);
            let port_ids = by_key.entry(key).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            if !port_ids.contains(&port_id) {
                port_ids.push(port_id);
            }
        }

        order
            .into_iter()
            .map(|(address, qos_id)| PduftEntry {
                address,
                qos_id,
                port_ids: by_key.remove(&(address, qos_id)).unwrap_or_default(),
            })
            .collect()
    }
}
