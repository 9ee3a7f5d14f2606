use crate::{
    error::Error,
    kernel_client::KernelClient,
    model::{Ipcp, PduftMode, RoutingEntry},
};

use super::policy::{DefaultPduftGenerator, PduftGeneratorPolicy};

/// Owns the generator policy and reprograms the kernel's PDU forwarding
/// table whenever the routing table changes. Holds no per-flow state, so
/// one instance covers every IPCP.
pub struct ResourceAllocator {
    policy: Box<dyn PduftGeneratorPolicy + Send + Sync>,
}

impl Default for ResourceAllocator {
    fn default() -> Self {
        Self::new(Box::new(DefaultPduftGenerator))
    }
}

impl ResourceAllocator {
    pub fn new(policy: Box<dyn PduftGeneratorPolicy + Send + Sync>) -> Self {
        Self { policy }
    }

    /// Regenerates the PDU forwarding table from `routing_table` and
    /// programs it into the kernel as a flush-and-add, so the kernel
    /// replaces the previous table atomically.
    pub fn update_routing_table(&self, ipcp: &Ipcp, kernel: &KernelClient, routing_table: &[RoutingEntry]) -> Result<(), Error> {
        let entries = self.policy.generate(ipcp, routing_table);
        kernel.modify_pduft(ipcp.ipcp_id, PduftMode::FlushAndAdd, &entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Apni;

    #[test]
    fn empty_routing_table_programs_an_empty_flush() {
        // Smoke test that routes through the policy with no neighbors at
        // all, confirming the module wires together without a kernel
        // handle available in this crate's unit tests.
        let ipcp = Ipcp::new(1, Apni::new("a"));
        let generator = DefaultPduftGenerator;
        let entries = generator.generate(&ipcp, &[]);
        assert!(entries.is_empty());
    }
}
