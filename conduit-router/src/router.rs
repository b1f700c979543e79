use std::sync::Arc;
use std::time::{Duration, Instant};

use conduit_match::evaluate;
use conduit_message::MessageEnvelope;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::metrics::RouterMetrics;
use crate::route::Route;

type Injection = (MessageEnvelope, Option<String>);

/// The router's injection endpoint: every plugin's `inject` call lands
/// here. Cloning shares the same underlying channel.
#[derive(Clone)]
pub struct Router {
    inject_tx: UnboundedSender<Injection>,
    hop_limit: u32,
    metrics: Arc<RouterMetrics>,
}

impl Router {
    /// Injects `env`, attributing it to `origin` (the name of the
    /// supervisor that produced it, if any) for self-match suppression.
    /// Returns `false` if the envelope's hop count would exceed the
    /// configured limit, or the router has shut down.
    pub fn inject(&self, env: MessageEnvelope, origin: Option<String>) -> bool {
        let hops = env.increment_hop_count();
        if hops > self.hop_limit {
            self.metrics.hop_limit_drops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            tracing::warn!(hops, limit = self.hop_limit, "envelope exceeded hop limit, dropping");
            return false;
        }
        self.inject_tx.send((env, origin)).is_ok()
    }

    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }
}

/// Wires a [`conduit_plugin::Injector`] bound to a fixed origin name, so
/// each supervisor's `RunnerContext::inject` calls land here tagged with
/// the supervisor's own identity.
pub struct RouterInjector {
    router: Router,
    origin: String,
}

impl RouterInjector {
    pub fn new(router: Router, origin: impl Into<String>) -> Self {
        RouterInjector { router, origin: origin.into() }
    }
}

impl conduit_plugin::Injector for RouterInjector {
    fn inject(&self, env: MessageEnvelope) -> bool {
        self.router.inject(env, Some(self.origin.clone()))
    }
}

/// How long a per-supervisor delivery may sit behind a full channel before
/// the router counts it as a "slow supervisor" event. Delivery still
/// completes — this only affects when the metric fires.
pub const DEFAULT_SLOW_SUPERVISOR_THRESHOLD: Duration = Duration::from_millis(250);

/// The router's injection channel, created before its delivery loop starts.
///
/// Split out from [`spawn`] so a coordinator can hand every supervisor a
/// [`RouterInjector`] bound to this router *before* any of those supervisors
/// exist — the router's registered routes are only known once the
/// supervisors they fan out to have been spawned and their inbound senders
/// collected, but the supervisors themselves need an injector handle to
/// spawn with. [`RouterTask::start`] closes that loop once the full route
/// list is in hand.
pub struct RouterTask {
    inject_rx: UnboundedReceiver<Injection>,
    metrics: Arc<RouterMetrics>,
}

impl RouterTask {
    /// Starts the delivery loop against `routes`. Call once every
    /// supervisor that should receive fan-out has been registered as a
    /// route.
    pub fn start(self, routes: Vec<Route>, slow_supervisor_threshold: Duration) -> JoinHandle<()> {
        tokio::spawn(run_router(routes, self.inject_rx, slow_supervisor_threshold, self.metrics))
    }
}

impl Router {
    /// Creates the injection handle and its paired, not-yet-started task.
    pub fn new(hop_limit: u32) -> (Router, RouterTask) {
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(RouterMetrics::default());
        let router = Router { inject_tx, hop_limit, metrics: metrics.clone() };
        (router, RouterTask { inject_rx, metrics })
    }
}

/// Spawns the router task in one step. Returns the handle plugins use to
/// inject, the task's join handle (await during coordinator shutdown), and
/// the shared metrics counters for the reporting snapshot.
///
/// Convenience wrapper over [`Router::new`] + [`RouterTask::start`] for
/// callers (tests, and anyone wiring a fixed route list upfront) that don't
/// need the two halves apart.
pub fn spawn(
    routes: Vec<Route>,
    hop_limit: u32,
    slow_supervisor_threshold: Duration,
) -> (Router, JoinHandle<()>, Arc<RouterMetrics>) {
    let (router, task) = Router::new(hop_limit);
    let metrics = router.metrics().clone();
    let join = task.start(routes, slow_supervisor_threshold);
    (router, join, metrics)
}

async fn run_router(
    routes: Vec<Route>,
    mut inject_rx: UnboundedReceiver<Injection>,
    slow_supervisor_threshold: Duration,
    metrics: Arc<RouterMetrics>,
) {
    while let Some((env, origin)) = inject_rx.recv().await {
        let winners: Vec<&Route> = routes
            .iter()
            .filter(|route| origin.as_deref() != Some(route.name.as_str()))
            .filter(|route| env.with_message(|m| evaluate(&route.expr, m)))
            .collect();

        if winners.is_empty() {
            metrics.zero_match_drops.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            continue; // `env` drops here, its last reference, returning it to the pool
        }

        // Pre-increment the refcount by exactly `winners.len()` before any
        // send: every winner but the last gets a clone (an atomic Arc
        // bump), the original `env` becomes the last winner's copy.
        let mut to_deliver: Vec<MessageEnvelope> = Vec::with_capacity(winners.len());
        for _ in 1..winners.len() {
            to_deliver.push(env.clone());
        }
        to_deliver.push(env);

        for (route, env) in winners.into_iter().zip(to_deliver.into_iter()) {
            deliver(route, env, slow_supervisor_threshold, &metrics).await;
        }
    }
    // `routes` drops here, in declaration (registration) order, closing
    // every supervisor's inbound channel.
}

async fn deliver(route: &Route, env: MessageEnvelope, slow_threshold: Duration, metrics: &RouterMetrics) {
    match route.sender.try_send(env) {
        Ok(()) => {
            metrics.delivered.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(route = %route.name, "supervisor channel closed, dropping envelope");
        }
        Err(TrySendError::Full(env)) => {
            let start = Instant::now();
            if route.sender.send(env).await.is_ok() {
                metrics.delivered.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                let waited = start.elapsed();
                if waited > slow_threshold {
                    metrics
                        .slow_supervisor_events
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    tracing::warn!(
                        route = %route.name,
                        waited_ms = waited.as_millis() as u64,
                        "supervisor channel was slow to accept delivery"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_match::compile;
    use conduit_message::MessagePool;

    async fn make_route(name: &str, expr: &str, capacity: usize) -> (Route, mpsc::Receiver<MessageEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Route { name: name.into(), expr: compile(expr).unwrap(), sender: tx }, rx)
    }

    #[tokio::test]
    async fn fans_out_to_every_matching_route_and_refcount_matches_winner_count() {
        let (route_a, mut rx_a) = make_route("a", r#"Type == "x""#, 4).await;
        let (route_b, mut rx_b) = make_route("b", r#"Severity >= 3"#, 4).await;
        let (route_c, mut rx_c) = make_route("c", r#"Type == "nope""#, 4).await;

        let (router, join, _metrics) =
            spawn(vec![route_a, route_b, route_c], 16, Duration::from_secs(1));

        let pool = MessagePool::new(4);
        let env = pool.acquire().await;
        env.with_message_mut(|m| {
            m.message_type = "x".into();
            m.severity = 5;
        });

        assert!(router.inject(env, None));

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.refcount(), 2);
        assert_eq!(got_b.refcount(), 2);
        assert!(tokio::time::timeout(Duration::from_millis(50), rx_c.recv()).await.is_err());

        drop((got_a, got_b));
        drop(router);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn zero_matches_releases_the_envelope_immediately() {
        let (route, _rx) = make_route("only", r#"Type == "nope""#, 4).await;
        let (router, _join, metrics) = spawn(vec![route], 16, Duration::from_secs(1));

        let pool = MessagePool::new(1);
        let env = pool.acquire().await;
        router.inject(env, None);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(metrics.snapshot().zero_match_drops, 1);
        assert!(pool.try_acquire().is_some());
    }

    #[tokio::test]
    async fn self_match_is_suppressed() {
        let (route, mut rx) = make_route("filter-a", "TRUE", 4).await;
        let (router, _join, _metrics) = spawn(vec![route], 16, Duration::from_secs(1));

        let pool = MessagePool::new(1);
        let env = pool.acquire().await;
        router.inject(env, Some("filter-a".into()));

        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn envelopes_over_the_hop_limit_are_dropped_and_counted() {
        let (route, _rx) = make_route("any", "TRUE", 4).await;
        let (router, _join, metrics) = spawn(vec![route], 2, Duration::from_secs(1));

        let pool = MessagePool::new(1);
        let env = pool.acquire().await;
        assert!(router.inject(env.clone(), None));
        assert!(router.inject(env.clone(), None));
        assert!(!router.inject(env, None));
        assert_eq!(metrics.snapshot().hop_limit_drops, 1);
    }
}
