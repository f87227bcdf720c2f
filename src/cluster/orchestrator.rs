use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cluster::topology::{ClusterTopology, TopologyPlan};
use crate::config::Settings;
use crate::core::template::{IP_ADDRESS, NAME_RESOLUTION};
use crate::core::{
    ContainerIdentity, ContainerLayout, Credentials, ExecutionContext, HostRouter, RemoteExecutor, RenderRequest,
    TemplateRenderer,
};
use crate::errors::{LifecycleError, LifecycleResult, RetryHandler, RetryPolicy, Stage, StageContext};

pub const FORMAT_FILESYSTEM: &str = "hdfs namenode -format";
pub const START_DFS: &str = "start-dfs.sh";
pub const START_YARN: &str = "start-yarn.sh";

/// Milestones of cluster creation, reached strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Planned,
    ContainersCloned,
    HostsConfigured,
    WorkerListWritten,
    ContainersStarted,
    FilesystemFormatted,
    Running,
}

impl LifecycleState {
    pub fn next(self) -> Option<Self> {
        use LifecycleState::*;
        match self {
            Planned => Some(ContainersCloned),
            ContainersCloned => Some(HostsConfigured),
            HostsConfigured => Some(WorkerListWritten),
            WorkerListWritten => Some(ContainersStarted),
            ContainersStarted => Some(FilesystemFormatted),
            FilesystemFormatted => Some(Running),
            Running => None,
        }
    }

    /// The stage whose completion lands in this state.
    pub fn stage(self) -> Stage {
        use LifecycleState::*;
        match self {
            Planned => Stage::Plan,
            ContainersCloned => Stage::CloneContainers,
            HostsConfigured => Stage::ConfigureHosts,
            WorkerListWritten => Stage::WriteWorkerList,
            ContainersStarted => Stage::StartContainers,
            FilesystemFormatted => Stage::FormatFilesystem,
            Running => Stage::StartServices,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LifecycleState::*;
        let name = match self {
            Planned => "planned",
            ContainersCloned => "containers-cloned",
            HostsConfigured => "hosts-configured",
            WorkerListWritten => "worker-list-written",
            ContainersStarted => "containers-started",
            FilesystemFormatted => "filesystem-formatted",
            Running => "running",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub state: LifecycleState,
    pub master: ContainerIdentity,
    pub containers: Vec<ContainerIdentity>,
    pub worker_list: String,
    pub format_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Tracks which milestone the current run has reached.
struct Progress {
    state: Option<LifecycleState>,
}

impl Progress {
    fn new() -> Self {
        Self { state: None }
    }

    fn advance(&mut self, to: LifecycleState) {
        let expected = match self.state {
            None => Some(LifecycleState::Planned),
            Some(state) => state.next(),
        };
        debug_assert_eq!(expected, Some(to), "lifecycle states must not be skipped");
        info!(state = %to, completed = %to.stage(), "cluster lifecycle advanced");
        self.state = Some(to);
    }
}

/// Brings a Hadoop-on-LXC cluster from nothing to running.
#[derive(Clone)]
pub struct ClusterOrchestrator {
    executor: Arc<dyn RemoteExecutor>,
    renderer: TemplateRenderer,
    router: HostRouter,
    layout: ContainerLayout,
    credentials: Credentials,
    format_retry: RetryPolicy,
    alias_prefix: String,
}

impl ClusterOrchestrator {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        router: HostRouter,
        layout: ContainerLayout,
        credentials: Credentials,
        format_retry: RetryPolicy,
        alias_prefix: impl Into<String>,
    ) -> Self {
        Self {
            renderer: TemplateRenderer::new(executor.clone()),
            executor,
            router,
            layout,
            credentials,
            format_retry,
            alias_prefix: alias_prefix.into(),
        }
    }

    pub fn from_settings(executor: Arc<dyn RemoteExecutor>, settings: &Settings) -> Self {
        Self::new(
            executor,
            settings.host_router(),
            settings.container_layout(),
            settings.credentials.clone(),
            settings.format_retry(),
            settings.topology.alias_prefix.clone(),
        )
    }

    pub async fn create_cluster(&self, topology: &ClusterTopology) -> LifecycleResult<ClusterReport> {
        let started_at = Utc::now();
        let mut progress = Progress::new();
        info!(master = %topology.master(), workers = topology.workers().len(), "creating cluster");

        let plan = TopologyPlan::plan(topology, &self.alias_prefix).stage(Stage::Plan)?;
        progress.advance(LifecycleState::Planned);

        self.clone_containers(&plan).await?;
        progress.advance(LifecycleState::ContainersCloned);

        self.configure_hosts(&plan).await?;
        progress.advance(LifecycleState::HostsConfigured);

        self.write_worker_list(&plan).await?;
        progress.advance(LifecycleState::WorkerListWritten);

        self.start_containers(&plan).await?;
        progress.advance(LifecycleState::ContainersStarted);

        let format_attempts = self.format_filesystem(&plan).await?;
        progress.advance(LifecycleState::FilesystemFormatted);

        self.start_services(&plan).await?;
        progress.advance(LifecycleState::Running);

        info!(master = %plan.master().identity, "cluster is running");
        Ok(ClusterReport {
            state: LifecycleState::Running,
            master: plan.master().identity.clone(),
            containers: plan.identities(),
            worker_list: plan.worker_list(),
            format_attempts,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn clone_containers(&self, plan: &TopologyPlan) -> LifecycleResult<()> {
        let stage = Stage::CloneContainers;
        for container in plan.containers() {
            let name = &container.identity;
            info!(container = %name, address = %container.address, "cloning container");

            let ctx = ExecutionContext::routed(&self.router, container.address.as_str(), &self.credentials.infrastructure)
                .stage(stage)?;
            self.executor
                .execute(&ctx, &self.layout.clone_command(name))
                .await
                .stage(stage)?;

            let request = RenderRequest::new(self.layout.network_template(name), self.layout.network_config(name))
                .substitute(IP_ADDRESS, container.address.as_str());
            self.renderer.render(&ctx, &request).await.stage(stage)?;
        }
        Ok(())
    }

    async fn configure_hosts(&self, plan: &TopologyPlan) -> LifecycleResult<()> {
        let stage = Stage::ConfigureHosts;
        let table = plan.name_resolution().render();
        for name in plan.identities() {
            info!(container = %name, "configuring name resolution");
            let ctx = ExecutionContext::routed(&self.router, name.as_str(), &self.credentials.infrastructure)
                .stage(stage)?;
            let request = RenderRequest::new(self.layout.hosts_template(&name), self.layout.hosts_file(&name))
                .substitute(NAME_RESOLUTION, table.as_str());
            self.renderer.render(&ctx, &request).await.stage(stage)?;
        }
        Ok(())
    }

    async fn write_worker_list(&self, plan: &TopologyPlan) -> LifecycleResult<()> {
        let stage = Stage::WriteWorkerList;
        let master = plan.master();
        info!(container = %master.identity, workers = plan.workers().len(), "writing worker list");

        let ctx = ExecutionContext::routed(&self.router, master.address.as_str(), &self.credentials.infrastructure)
            .stage(stage)?;
        self.renderer
            .write_file(&ctx, &plan.worker_list(), &self.layout.worker_list_file(&master.identity))
            .await
            .stage(stage)?;
        Ok(())
    }

    async fn start_containers(&self, plan: &TopologyPlan) -> LifecycleResult<()> {
        let stage = Stage::StartContainers;
        for name in plan.identities() {
            info!(container = %name, "starting container");
            let ctx = ExecutionContext::routed(&self.router, name.as_str(), &self.credentials.infrastructure)
                .stage(stage)?;
            self.executor
                .execute(&ctx, &self.layout.start_command(&name))
                .await
                .stage(stage)?;
        }
        Ok(())
    }

    /// Freshly started containers may not accept ssh yet, so connectivity
    /// failures here are retried; returns the number of attempts made.
    async fn format_filesystem(&self, plan: &TopologyPlan) -> LifecycleResult<u32> {
        let ctx = self.master_context(plan);
        let mut handler = RetryHandler::new(self.format_retry.clone());
        let executor = &self.executor;
        let ctx_ref = &ctx;

        let result = handler
            .run(|| async move { executor.execute(ctx_ref, FORMAT_FILESYSTEM).await })
            .await;

        match result {
            Ok(_) => {
                info!(attempts = handler.attempts(), "distributed filesystem formatted");
                Ok(handler.attempts())
            }
            Err(e) => {
                warn!(attempts = handler.attempts(), error = %e, "formatting the distributed filesystem failed");
                Err(LifecycleError::new(Stage::FormatFilesystem, e))
            }
        }
    }

    async fn start_services(&self, plan: &TopologyPlan) -> LifecycleResult<()> {
        let ctx = self.master_context(plan);
        for command in [START_DFS, START_YARN] {
            info!(host = %ctx.host, command, "starting cluster service");
            self.executor
                .execute(&ctx, command)
                .await
                .stage(Stage::StartServices)?;
        }
        Ok(())
    }

    /// Hadoop daemons are driven inside the master container itself.
    fn master_context(&self, plan: &TopologyPlan) -> ExecutionContext {
        ExecutionContext::direct(plan.master().address.as_str(), &self.credentials.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_form_a_single_chain() {
        let mut state = LifecycleState::Planned;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            visited.push(next);
            state = next;
        }
        assert_eq!(visited.len(), 7);
        assert_eq!(state, LifecycleState::Running);
    }

    #[test]
    fn each_state_maps_to_its_stage() {
        assert_eq!(LifecycleState::Planned.stage(), Stage::Plan);
        assert_eq!(LifecycleState::FilesystemFormatted.stage(), Stage::FormatFilesystem);
        assert_eq!(LifecycleState::Running.stage(), Stage::StartServices);
    }

    #[test]
    fn display_matches_wire_name() {
        let mut state = Some(LifecycleState::Planned);
        while let Some(current) = state {
            let wire = serde_json::to_string(&current).unwrap();
            assert_eq!(wire, format!("\"{}\"", current));
            state = current.next();
        }
    }
}
