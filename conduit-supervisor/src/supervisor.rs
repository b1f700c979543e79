use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use conduit_message::MessageEnvelope;
use conduit_plugin::{Injector, Plugin, PluginConfig, PluginError, RunnerContext};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::handle::SupervisorHandle;
use crate::policy::RestartPolicy;
use crate::status::SupervisorStatus;

/// Builds a fresh plugin instance for each `Initializing` transition —
/// including the first one and every restart. A panic mid-run destroys the
/// panicking task's `Plugin` value along with it, so the supervisor never
/// reuses one across a crash; this is also why it's a constructor rather
/// than a stored instance.
pub type PluginConstructor = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Everything needed to spawn one supervised plugin.
pub struct SupervisorSpawnOptions {
    pub name: String,
    pub constructor: PluginConstructor,
    pub config: PluginConfig,
    pub restart_policy: RestartPolicy,
    /// Whether this plugin kind is restarted at all on exit. Exhausting the
    /// retry budget or this being `false` both move `Stopping` straight to
    /// `Stopped`.
    pub restartable: bool,
    pub tick_interval: Option<Duration>,
    pub channel_capacity: usize,
    pub injector: Arc<dyn Injector>,
}

/// Spawns a supervisor task owning one plugin's full lifecycle.
pub fn spawn(opts: SupervisorSpawnOptions) -> SupervisorHandle {
    let (inbound_tx, inbound_rx) = mpsc::channel(opts.channel_capacity);
    let (status_tx, status_rx) = watch::channel(SupervisorStatus::Initializing);
    let cancellation = CancellationToken::new();
    let task_cancellation = cancellation.clone();
    let name = opts.name.clone();
    let capacity = opts.channel_capacity;

    let join = tokio::spawn(run_supervisor(
        opts.name,
        opts.constructor,
        opts.config,
        opts.restart_policy,
        opts.restartable,
        opts.tick_interval,
        opts.injector,
        inbound_rx,
        status_tx,
        task_cancellation,
    ));

    SupervisorHandle { name, inbound_tx, status_rx, cancellation, join, capacity }
}

#[allow(clippy::too_many_arguments)]
async fn run_supervisor(
    name: String,
    constructor: PluginConstructor,
    config: PluginConfig,
    policy: RestartPolicy,
    restartable: bool,
    tick_interval: Option<Duration>,
    injector: Arc<dyn Injector>,
    mut inbound_rx: mpsc::Receiver<MessageEnvelope>,
    status_tx: watch::Sender<SupervisorStatus>,
    cancellation: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut retained: Option<MessageEnvelope> = None;

    loop {
        let _ = status_tx.send(SupervisorStatus::Initializing);
        let mut plugin = constructor();
        if let Err(e) = plugin.init(&config) {
            tracing::error!(supervisor = %name, error = %e, "plugin rejected its configuration");
            let _ = status_tx.send(SupervisorStatus::Stopped);
            return;
        }

        let _ = status_tx.send(SupervisorStatus::Running);
        let mut ctx = RunnerContext::new(
            &mut inbound_rx,
            injector.clone(),
            tick_interval,
            cancellation.clone(),
            retained.take(),
        );

        let outcome = AssertUnwindSafe(plugin.run(&mut ctx)).catch_unwind().await;
        retained = ctx.take_retained();

        let _ = status_tx.send(SupervisorStatus::Stopping);
        let restart_eligible = match outcome {
            Ok(Ok(())) => {
                tracing::info!(supervisor = %name, "plugin run loop exited cleanly");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(supervisor = %name, error = %e, "plugin run loop failed");
                e.is_restart_eligible()
            }
            Err(panic) => {
                tracing::error!(
                    supervisor = %name,
                    panic = %panic_message(&panic),
                    "plugin panicked"
                );
                true
            }
        };

        if restartable && restart_eligible && policy.allows_attempt(attempt) {
            let _ = status_tx.send(SupervisorStatus::Restarting);
            let delay = policy.delay_for_attempt(attempt);
            tracing::info!(supervisor = %name, attempt, ?delay, "restarting plugin");
            tokio::time::sleep(delay).await;
            plugin.cleanup_for_restart();
            attempt += 1;
            continue;
        }

        let _ = status_tx.send(SupervisorStatus::Stopped);
        return;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_message::MessagePool;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NullInjector;
    impl Injector for NullInjector {
        fn inject(&self, _env: MessageEnvelope) -> bool {
            true
        }
    }

    struct CountingPlugin {
        runs: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        async fn run(&mut self, _ctx: &mut RunnerContext<'_>) -> Result<(), PluginError> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(PluginError::Fatal(anyhow::anyhow!("boom on run {n}")))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingPlugin;

    #[async_trait]
    impl Plugin for PanickingPlugin {
        async fn run(&mut self, _ctx: &mut RunnerContext<'_>) -> Result<(), PluginError> {
            panic!("plugin exploded");
        }
    }

    #[tokio::test]
    async fn restarts_up_to_max_retries_then_stops() {
        let runs = Arc::new(AtomicU32::new(0));
        let runs_for_ctor = runs.clone();
        let handle = spawn(SupervisorSpawnOptions {
            name: "test".into(),
            constructor: Box::new(move || {
                Box::new(CountingPlugin { runs: runs_for_ctor.clone(), fail_times: 10 })
            }),
            config: PluginConfig::default(),
            restart_policy: RestartPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                jitter: Duration::ZERO,
            },
            restartable: true,
            tick_interval: None,
            channel_capacity: 4,
            injector: Arc::new(NullInjector),
        });

        handle.join.await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3); // 1 initial run + 2 restarts
    }

    #[tokio::test]
    async fn a_panic_is_caught_and_counted_as_restart_eligible() {
        let handle = spawn(SupervisorSpawnOptions {
            name: "panicker".into(),
            constructor: Box::new(|| Box::new(PanickingPlugin)),
            config: PluginConfig::default(),
            restart_policy: RestartPolicy::NEVER,
            restartable: true,
            tick_interval: None,
            channel_capacity: 4,
            injector: Arc::new(NullInjector),
        });

        handle.join.await.unwrap();
    }

    #[tokio::test]
    async fn a_retained_envelope_is_redelivered_on_restart() {
        struct RetainOnceThenRead {
            pool: conduit_message::MessagePool,
            retained_once: bool,
            seen: Arc<std::sync::Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl Plugin for RetainOnceThenRead {
            async fn run(&mut self, ctx: &mut RunnerContext<'_>) -> Result<(), PluginError> {
                if !self.retained_once {
                    self.retained_once = true;
                    let env = self.pool.acquire().await;
                    env.with_message_mut(|m| m.payload = "held-back".into());
                    ctx.retain(env);
                    return Err(PluginError::Fatal(anyhow::anyhow!("simulated crash")));
                }
                if let Some(env) = ctx.recv().await {
                    env.with_message(|m| self.seen.lock().unwrap().push(m.payload.clone()));
                }
                Ok(())
            }
        }

        let pool = MessagePool::new(2);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_for_ctor = seen.clone();
        let pool_for_ctor = pool.clone();

        let handle = spawn(SupervisorSpawnOptions {
            name: "resume".into(),
            constructor: Box::new(move || {
                Box::new(RetainOnceThenRead {
                    pool: pool_for_ctor.clone(),
                    retained_once: false,
                    seen: seen_for_ctor.clone(),
                })
            }),
            config: PluginConfig::default(),
            restart_policy: RestartPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                jitter: Duration::ZERO,
            },
            restartable: true,
            tick_interval: None,
            channel_capacity: 4,
            injector: Arc::new(NullInjector),
        });

        handle.join.await.unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), ["held-back"]);
    }
}
