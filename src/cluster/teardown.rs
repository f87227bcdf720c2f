use std::sync::Arc;
use tracing::info;

use crate::cluster::topology::ClusterTopology;
use crate::config::Settings;
use crate::core::{ContainerIdentity, ContainerLayout, Credential, ExecutionContext, HostRouter, RemoteExecutor};
use crate::errors::{LifecycleResult, Stage, StageContext};

/// Stops and destroys every container of a cluster, master first.
///
/// The first failure aborts the rest, so a partially torn down cluster is
/// possible; running teardown again picks up where it stopped.
#[derive(Clone)]
pub struct TeardownOrchestrator {
    executor: Arc<dyn RemoteExecutor>,
    router: HostRouter,
    layout: ContainerLayout,
    credential: Credential,
}

impl TeardownOrchestrator {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        router: HostRouter,
        layout: ContainerLayout,
        credential: Credential,
    ) -> Self {
        Self {
            executor,
            router,
            layout,
            credential,
        }
    }

    pub fn from_settings(executor: Arc<dyn RemoteExecutor>, settings: &Settings) -> Self {
        Self::new(
            executor,
            settings.host_router(),
            settings.container_layout(),
            settings.credentials.infrastructure.clone(),
        )
    }

    /// Returns the destroyed containers in the order they went away.
    pub async fn destroy_cluster(&self, topology: &ClusterTopology) -> LifecycleResult<Vec<ContainerIdentity>> {
        info!(master = %topology.master(), workers = topology.workers().len(), "destroying cluster");

        let containers = topology.resolve_containers().stage(Stage::Plan)?;

        let mut destroyed = Vec::new();
        for container in containers {
            let name = container.identity;
            let ctx = ExecutionContext::routed(&self.router, name.as_str(), &self.credential)
                .stage(Stage::StopContainer)?;

            info!(container = %name, host = %ctx.host, "stopping container");
            self.executor
                .execute(&ctx, &self.layout.stop_command(&name))
                .await
                .stage(Stage::StopContainer)?;

            info!(container = %name, host = %ctx.host, "destroying container");
            self.executor
                .execute(&ctx, &self.layout.destroy_command(&name))
                .await
                .stage(Stage::DestroyContainer)?;

            destroyed.push(name);
        }

        info!(count = destroyed.len(), "cluster destroyed");
        Ok(destroyed)
    }
}
