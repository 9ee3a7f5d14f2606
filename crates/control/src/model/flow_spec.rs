use crate::model::connection::ConnectionPolicies;

/// Requested quality attributes for a flow.
///
/// Zero means "do not care" for every numeric field; `max_allowable_gap`
/// additionally treats `-1` as "any gap" (equivalent to "all delivered" at
/// `0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSpec {
    pub avg_bandwidth: u64,
    pub avg_sdu_bandwidth: u64,
    pub peak_duration_ms: u32,
    pub delay_ms: u32,
    pub jitter_ms: u32,
    pub max_allowable_gap: i32,
    pub max_sdu_size: u32,
    pub ordered_delivery: bool,
    pub partial_delivery: bool,
    pub undetected_bit_error_rate: f64,
}

impl Default for FlowSpec {
    fn default() -> Self {
        Self {
            avg_bandwidth: 0,
            avg_sdu_bandwidth: 0,
            peak_duration_ms: 0,
            delay_ms: 0,
            jitter_ms: 0,
            max_allowable_gap: 0,
            max_sdu_size: 0,
            ordered_delivery: false,
            partial_delivery: false,
            undetected_bit_error_rate: 0.0,
        }
    }
}

impl FlowSpec {
    /// A gap of N SDUs is equivalent to "all delivered"; `-1`
    /// means any gap is acceptable.
    pub fn accepts_gap(&self, observed_gap: u32) -> bool {
        self.max_allowable_gap == -1 || observed_gap as i64 <= self.max_allowable_gap as i64
    }
}

/// A DIF-offered quality-of-service cube: the same shape as a flow
/// specification plus a name and id.
///
/// `connection_policies` is the DTCP policy template an EFCP connection
/// created against this cube is parameterized with (§4.4 step 3) —
/// real RINA ties DTCP policy selection to the QoS cube, not the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct QosCube {
    pub id: u32,
    pub name: String,
    pub spec: FlowSpec,
    pub connection_policies: ConnectionPolicies,
}

impl QosCube {
    /// Whether this cube can satisfy the numeric bounds of `requested`.
    /// A cube satisfies a bound if its own value is zero ("do not care",
    /// i.e. unconstrained) or at least as generous as requested.
    pub fn satisfies(&self, requested: &FlowSpec) -> bool {
        let bw_ok = requested.avg_bandwidth == 0 || self.spec.avg_bandwidth >= requested.avg_bandwidth;
        let delay_ok = requested.delay_ms == 0 || self.spec.delay_ms == 0
            || self.spec.delay_ms <= requested.delay_ms;
        let sdu_ok = requested.max_sdu_size == 0 || self.spec.max_sdu_size == 0
            || self.spec.max_sdu_size >= requested.max_sdu_size;
        let ordered_ok = !requested.ordered_delivery || self.spec.ordered_delivery;

        bw_ok && delay_ok && sdu_ok && ordered_ok
    }
}

/// Selects the first QoS cube in `cubes` able to satisfy `requested`.
pub fn select_qos_cube<'a>(cubes: &'a [QosCube], requested: &FlowSpec) -> Option<&'a QosCube> {
    cubes.iter().find(|cube| cube.satisfies(requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fields_mean_do_not_care() {
        let requested = FlowSpec::default();
        let cube = QosCube {
            id: 0,
            name: "unreliable".to_string(),
            spec: FlowSpec {
                ordered_delivery: false,
                ..FlowSpec::default()
            },
            connection_policies: ConnectionPolicies::default(),
        };
        assert!(cube.satisfies(&requested));
    }

    #[test]
    fn ordered_delivery_must_be_matched() {
        let requested = FlowSpec {
            ordered_delivery: true,
            ..FlowSpec::default()
        };
        let unordered_cube = QosCube {
            id: 0,
            name: "unreliable".to_string(),
            spec: FlowSpec::default(),
            connection_policies: ConnectionPolicies::default(),
        };
        assert!(!unordered_cube.satisfies(&requested));
    }

    #[test]
    fn select_qos_cube_picks_first_match() {
        let requested = FlowSpec {
            max_sdu_size: 1500,
            ..FlowSpec::default()
        };
        let cubes = vec![
            QosCube {
                id: 0,
                name: "best-effort".to_string(),
                spec: FlowSpec::default(),
                connection_policies: ConnectionPolicies::default(),
            },
            QosCube {
                id: 1,
                name: "reliable".to_string(),
                spec: FlowSpec {
                    ordered_delivery: true,
                    ..FlowSpec::default()
                },
                connection_policies: ConnectionPolicies::default(),
            },
        ];

        let chosen = select_qos_cube(&cubes, &requested).unwrap();
        assert_eq!(chosen.id, 0);
    }
}
