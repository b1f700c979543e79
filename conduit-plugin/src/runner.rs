use std::sync::Arc;
use std::time::Duration;

use conduit_message::MessageEnvelope;
use tokio::sync::mpsc;
use tokio::time::Interval;

/// The router's injection endpoint, as seen by a running plugin.
///
/// Filters and Inputs call [`Injector::inject`] to hand a newly produced or
/// mutated envelope back to the router for fan-out. Implemented by
/// `conduit-router`; plugins never construct one themselves.
pub trait Injector: Send + Sync {
    /// Returns `false` if injection was refused (hop limit exceeded, or the
    /// coordinator is shutting down) rather than enqueued.
    fn inject(&self, env: MessageEnvelope) -> bool;
}

/// Everything a running plugin needs from its supervisor: its inbound
/// envelope stream (Filter/Output only — Inputs simply never call `recv`),
/// the injection handle, an optional ticker, and the shutdown signal.
///
/// Borrows its inbound channel from the supervisor rather than owning it,
/// so the same channel survives across restarts while a fresh
/// `RunnerContext` is built for each run.
pub struct RunnerContext<'a> {
    inbound: &'a mut mpsc::Receiver<MessageEnvelope>,
    injector: Arc<dyn Injector>,
    ticker: Option<Interval>,
    cancellation: tokio_util::sync::CancellationToken,
    retained: Option<MessageEnvelope>,
}

impl<'a> RunnerContext<'a> {
    /// Constructs a runner context for one supervised run. Called by
    /// `conduit-supervisor`; plugins never build one of these themselves.
    pub fn new(
        inbound: &'a mut mpsc::Receiver<MessageEnvelope>,
        injector: Arc<dyn Injector>,
        tick_interval: Option<Duration>,
        cancellation: tokio_util::sync::CancellationToken,
        retained: Option<MessageEnvelope>,
    ) -> Self {
        RunnerContext {
            inbound,
            injector,
            ticker: tick_interval.map(tokio::time::interval),
            cancellation,
            retained,
        }
    }

    /// Receives the next inbound envelope, redelivering a retained one
    /// (from a previous restart) first. Returns `None` once the inbound
    /// channel is closed — the supervisor's shutdown signal.
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        if let Some(env) = self.retained.take() {
            return Some(env);
        }
        self.inbound.recv().await
    }

    /// Injects an envelope back at the router. See [`Injector::inject`].
    pub fn inject(&self, env: MessageEnvelope) -> bool {
        self.injector.inject(env)
    }

    /// Resolves when the plugin's configured tick interval fires. Never
    /// resolves if no interval was configured — select against it freely.
    pub async fn tick(&mut self) {
        match &mut self.ticker {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Resolves when the supervisor has asked this plugin to stop.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Marks `env` to be redelivered via [`RunnerContext::recv`] before any
    /// new inbound envelope, on the next restart.
    /// An output plugin calls this just before returning from `run` when it
    /// failed to fully hand off the envelope it was currently processing.
    pub fn retain(&mut self, env: MessageEnvelope) {
        self.retained = Some(env);
    }

    /// Takes whatever envelope is left retained for redelivery, clearing
    /// it from this context. Called by the supervisor after `run` returns.
    pub fn take_retained(&mut self) -> Option<MessageEnvelope> {
        self.retained.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_message::MessagePool;

    struct NullInjector;
    impl Injector for NullInjector {
        fn inject(&self, _env: MessageEnvelope) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn retained_envelope_is_delivered_before_new_inbound_ones() {
        let pool = MessagePool::new(2);
        let retained = pool.acquire().await;
        retained.with_message_mut(|m| m.payload = "retained".into());
        let fresh = pool.acquire().await;
        fresh.with_message_mut(|m| m.payload = "fresh".into());

        let (tx, mut rx) = mpsc::channel(4);
        tx.send(fresh).await.unwrap();

        let mut ctx = RunnerContext::new(
            &mut rx,
            Arc::new(NullInjector),
            None,
            tokio_util::sync::CancellationToken::new(),
            Some(retained),
        );

        let first = ctx.recv().await.unwrap();
        first.with_message(|m| assert_eq!(m.payload, "retained"));
        let second = ctx.recv().await.unwrap();
        second.with_message(|m| assert_eq!(m.payload, "fresh"));
    }

    #[tokio::test]
    async fn recv_returns_none_once_inbound_channel_closes() {
        let (tx, mut rx) = mpsc::channel::<MessageEnvelope>(1);
        drop(tx);
        let mut ctx = RunnerContext::new(
            &mut rx,
            Arc::new(NullInjector),
            None,
            tokio_util::sync::CancellationToken::new(),
            None,
        );
        assert!(ctx.recv().await.is_none());
    }
}
