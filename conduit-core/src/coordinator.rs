use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use conduit_message::{MessageEnvelope, MessagePool};
use conduit_plugin::{Injector, PluginKind};
use conduit_router::{Route, Router, RouterInjector, RouterMetrics};
use conduit_supervisor::{
    spawn as spawn_supervisor, PluginConstructor, SupervisorHandle, SupervisorSpawnOptions,
};
use tokio::task::JoinHandle;

use crate::config::{Config, PluginSpec};
use crate::descriptor::PluginDescriptor;
use crate::error::CoreError;
use crate::reporting::{PipelineSnapshot, SupervisorSnapshot};

/// Owns the whole plugin graph for one running pipeline: the shared message
/// pool, the router, and every supervised plugin, grouped by kind so start
/// and shutdown can follow a fixed dependency order.
pub struct Coordinator {
    pool: MessagePool,
    router: Router,
    router_join: JoinHandle<()>,
    router_metrics: Arc<RouterMetrics>,
    inputs: BTreeMap<String, SupervisorHandle>,
    decoders: BTreeMap<String, SupervisorHandle>,
    filters: BTreeMap<String, SupervisorHandle>,
    outputs: BTreeMap<String, SupervisorHandle>,
    shutdown_grace: Duration,
}

impl Coordinator {
    /// Builds and starts every component in dependency order: pool, then
    /// outputs' supervisors, then filters' supervisors, then the router's
    /// delivery loop, then decoders, then inputs.
    ///
    /// `registry_factory` receives the pool so the caller's plugin
    /// constructors can capture an `Arc`-backed clone of it — concrete
    /// plugin bodies are out of scope here, so the pool has to reach them
    /// through whatever the caller's constructors close over, not through
    /// `Plugin::init`.
    pub async fn build<F>(
        config: Config,
        registry_factory: F,
        shutdown_grace: Duration,
    ) -> Result<Coordinator, CoreError>
    where
        F: FnOnce(&MessagePool) -> HashMap<String, PluginConstructor>,
    {
        let pool = MessagePool::new(config.pool_capacity);
        let mut registry = registry_factory(&pool);

        let mut inputs_d = Vec::new();
        let mut decoders_d = Vec::new();
        let mut filters_d = Vec::new();
        let mut outputs_d = Vec::new();

        for (name, spec) in config.plugins {
            let constructor = registry
                .remove(&name)
                .ok_or_else(|| CoreError::MissingConstructor { name: name.clone() })?;
            let descriptor = PluginDescriptor { name, spec, constructor };
            match descriptor.spec.kind {
                PluginKind::Input => inputs_d.push(descriptor),
                PluginKind::Decoder => decoders_d.push(descriptor),
                PluginKind::Filter => filters_d.push(descriptor),
                PluginKind::Output => outputs_d.push(descriptor),
            }
        }

        let (router, router_task) = Router::new(config.hop_limit);
        let router_metrics = router.metrics().clone();

        let mut routes = Vec::new();
        let outputs = spawn_group(outputs_d, &router, &mut routes);
        let filters = spawn_group(filters_d, &router, &mut routes);

        let router_join = router_task.start(routes, config.slow_supervisor_threshold);

        let mut unused_routes = Vec::new();
        let decoders = spawn_group(decoders_d, &router, &mut unused_routes);
        let inputs = spawn_group(inputs_d, &router, &mut unused_routes);
        debug_assert!(unused_routes.is_empty(), "decoders and inputs never carry a matcher");

        Ok(Coordinator {
            pool,
            router,
            router_join,
            router_metrics,
            inputs,
            decoders,
            filters,
            outputs,
            shutdown_grace,
        })
    }

    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Injects an envelope from outside the plugin graph (e.g. an admin
    /// command), attributed to no origin so self-match suppression never
    /// applies to it.
    pub fn inject(&self, env: MessageEnvelope) -> bool {
        self.router.inject(env, None)
    }

    /// A point-in-time snapshot for the periodic reporting surface.
    pub fn snapshot(&self) -> PipelineSnapshot {
        let mut supervisors = BTreeMap::new();
        for group in [&self.inputs, &self.decoders, &self.filters, &self.outputs] {
            for (name, handle) in group {
                supervisors.insert(
                    name.clone(),
                    SupervisorSnapshot {
                        status: handle.status(),
                        channel_len: handle.channel_len(),
                        channel_capacity: handle.channel_capacity(),
                    },
                );
            }
        }
        PipelineSnapshot { supervisors, router: self.router_metrics.snapshot() }
    }

    /// Shuts the pipeline down in reverse start order, barrier-sequenced
    /// per stage: every supervisor within a stage is asked to stop
    /// concurrently, and the next stage only begins once that stage has
    /// fully drained.
    pub async fn shutdown(self) {
        stop_group(self.inputs, self.shutdown_grace).await;
        stop_group(self.decoders, self.shutdown_grace).await;

        // Dropping the router closes its injection channel; `run_router`
        // drains whatever is already in flight, then drops `routes` —
        // closing every filter/output supervisor's inbound channel in
        // registration order — and exits.
        drop(self.router);
        let _ = self.router_join.await;

        stop_group(self.filters, self.shutdown_grace).await;
        stop_group(self.outputs, self.shutdown_grace).await;
    }
}

fn spawn_group(
    descriptors: Vec<PluginDescriptor>,
    router: &Router,
    routes: &mut Vec<Route>,
) -> BTreeMap<String, SupervisorHandle> {
    let mut handles = BTreeMap::new();
    for d in descriptors {
        let PluginDescriptor { name, spec, constructor } = d;
        let PluginSpec {
            kind: _,
            matcher,
            restart_policy,
            restartable,
            channel_capacity,
            tick_interval,
            config,
        } = spec;

        let injector: Arc<dyn Injector> = Arc::new(RouterInjector::new(router.clone(), name.clone()));
        let handle = spawn_supervisor(SupervisorSpawnOptions {
            name: name.clone(),
            constructor,
            config,
            restart_policy,
            restartable,
            tick_interval,
            channel_capacity,
            injector,
        });

        if let Some(expr) = matcher {
            routes.push(Route { name: name.clone(), expr, sender: handle.inbound().clone() });
        }

        handles.insert(name, handle);
    }
    handles
}

async fn stop_group(group: BTreeMap<String, SupervisorHandle>, grace: Duration) {
    let stops = group.into_values().map(|h| h.stop(grace));
    futures::future::join_all(stops).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_plugin::{Plugin, PluginError, RunnerContext};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOutput {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for CountingOutput {
        async fn run(&mut self, ctx: &mut RunnerContext<'_>) -> Result<(), PluginError> {
            while ctx.recv().await.is_some() {
                self.count.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    struct BurstInput {
        pool: MessagePool,
        remaining: usize,
    }

    #[async_trait]
    impl Plugin for BurstInput {
        async fn run(&mut self, ctx: &mut RunnerContext<'_>) -> Result<(), PluginError> {
            while self.remaining > 0 {
                let env = self.pool.acquire().await;
                env.with_message_mut(|m| m.payload = "hi".into());
                ctx.inject(env);
                self.remaining -= 1;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn builds_and_runs_a_minimal_pipeline_end_to_end() {
        let toml = r#"
            pool_capacity = 8
            hop_limit = 4

            [plugins.burst]
            kind = "input"

            [plugins.sink]
            kind = "output"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let count_for_ctor = count.clone();

        let coordinator = Coordinator::build(
            config,
            |pool| {
                let mut registry: HashMap<String, PluginConstructor> = HashMap::new();
                let burst_pool = pool.clone();
                registry.insert(
                    "burst".to_string(),
                    Box::new(move || {
                        Box::new(BurstInput { pool: burst_pool.clone(), remaining: 3 }) as Box<dyn Plugin>
                    }),
                );
                registry.insert(
                    "sink".to_string(),
                    Box::new(move || {
                        Box::new(CountingOutput { count: count_for_ctor.clone() }) as Box<dyn Plugin>
                    }),
                );
                registry
            },
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.shutdown().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn build_fails_when_the_registry_is_missing_a_constructor() {
        let toml = r#"
            [plugins.orphan]
            kind = "input"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        let err = Coordinator::build(config, |_pool| HashMap::new(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingConstructor { name } if name == "orphan"));
    }
}
