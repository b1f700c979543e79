use std::collections::BTreeMap;

use conduit_router::RouterMetricsSnapshot;
use conduit_supervisor::SupervisorStatus;

/// One supervisor's contribution to the periodic reporting snapshot (§4.7):
/// its lifecycle status plus how full its inbound channel currently is.
/// Plugin-specific self-reported counters (via `Plugin::report_msg`) are a
/// concrete plugin's own concern and aren't aggregated here.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorSnapshot {
    pub status: SupervisorStatus,
    pub channel_len: usize,
    pub channel_capacity: usize,
}

/// A point-in-time view of the whole pipeline, combining every supervisor's
/// status with the router's fan-out counters.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub supervisors: BTreeMap<String, SupervisorSnapshot>,
    pub router: RouterMetricsSnapshot,
}
