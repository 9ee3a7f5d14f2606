use crate::model::Ipcp;

/// A neighbor declared dead by a keepalive sweep, with its scheduled
/// re-enrollment attempt number (`None` once `max_attempts` is spent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadNeighbor {
    pub canonical_key: String,
    pub next_attempt: Option<u32>,
}

/// Sweeps an IPCP's neighbor table for missed keepalives and schedules
/// re-enrollment with exponential backoff. Carries no state of its own —
/// the attempt counters live on `Neighbor` so a restarted event loop
/// picks the sweep back up without losing history.
pub struct NeighborMaintenance {
    pub keepalive_interval_ms: u64,
    pub max_attempts: u32,
}

impl NeighborMaintenance {
    pub fn new(keepalive_interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            keepalive_interval_ms,
            max_attempts,
        }
    }

    /// The backoff delay before re-enrollment attempt number `attempt`
    /// (1-indexed): `keepalive_interval * 2^(attempt - 1)`.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        self.keepalive_interval_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(32))
    }

    /// Removes every neighbor that has missed 3 keepalive intervals from
    /// `ipcp.neighbors` and returns the ones that still have
    /// re-enrollment attempts left, in the order they were found dead.
    pub fn sweep(&self, ipcp: &mut Ipcp, now_ms: u64) -> Vec<DeadNeighbor> {
        let dead_keys: Vec<String> = ipcp
            .neighbors
            .iter()
            .filter(|(_, neighbor)| neighbor.is_dead(now_ms, self.keepalive_interval_ms))
            .map(|(key, _)| key.clone())
            .collect();

        let mut dead = Vec::with_capacity(dead_keys.len());
        for key in dead_keys {
            if let Some(neighbor) = ipcp.neighbors.remove(&key) {
                let attempt = neighbor.enrollment_attempt_count + 1;
                let next_attempt = if attempt <= self.max_attempts { Some(attempt) } else { None };
                dead.push(DeadNeighbor {
                    canonical_key: key,
                    next_attempt,
                });
            }
        }
        dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Apni, Ipcp, Neighbor};

    #[test]
    fn dead_neighbor_is_removed_and_scheduled_for_retry() {
        let mut ipcp = Ipcp::new(1, Apni::new("a"));
        let mut neighbor = Neighbor::new(Apni::new("b"), Apni::new("shim"));
        neighbor.enrolled = true;
        neighbor.last_heard_from_ms = 0;
        ipcp.neighbors.insert(neighbor.name.canonical_key(), neighbor);

        let maintenance = NeighborMaintenance::new(5_000, 3);
        let dead = maintenance.sweep(&mut ipcp, 15_000);

        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].next_attempt, Some(1));
        assert!(ipcp.neighbors.is_empty());
    }

    #[test]
    fn live_neighbor_is_not_touched() {
        let mut ipcp = Ipcp::new(1, Apni::new("a"));
        let mut neighbor = Neighbor::new(Apni::new("b"), Apni::new("shim"));
        neighbor.last_heard_from_ms = 14_000;
        ipcp.neighbors.insert(neighbor.name.canonical_key(), neighbor);

        let maintenance = NeighborMaintenance::new(5_000, 3);
        let dead = maintenance.sweep(&mut ipcp, 15_000);

        assert!(dead.is_empty());
        assert_eq!(ipcp.neighbors.len(), 1);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let maintenance = NeighborMaintenance::new(5_000, 5);
        assert_eq!(maintenance.backoff_delay_ms(1), 5_000);
        assert_eq!(maintenance.backoff_delay_ms(2), 10_000);
        assert_eq!(maintenance.backoff_delay_ms(3), 20_000);
    }

    #[test]
    fn exhausted_attempts_stop_being_scheduled() {
        let mut ipcp = Ipcp::new(1, Apni::new("a"));
        let mut neighbor = Neighbor::new(Apni::new("b"), Apni::new("shim"));
        neighbor.enrollment_attempt_count = 3;
        neighbor.last_heard_from_ms = 0;
        ipcp.neighbors.insert(neighbor.name.canonical_key(), neighbor);

        let maintenance = NeighborMaintenance::new(5_000, 3);
        let dead = maintenance.sweep(&mut ipcp, 15_000);
        assert_eq!(dead[0].next_attempt, None);
    }
}
