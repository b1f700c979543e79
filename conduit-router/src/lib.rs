//! The fan-out router: evaluates every registered matcher against
//! each injected envelope and delivers to every winner, pre-incrementing
//! the envelope's refcount by the winning count before any send.

mod metrics;
mod route;
mod router;

pub use metrics::{RouterMetrics, RouterMetricsSnapshot};
pub use route::Route;
pub use router::{spawn, Router, RouterInjector, RouterTask, DEFAULT_SLOW_SUPERVISOR_THRESHOLD};
