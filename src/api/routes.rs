/*
* Cluster Lifecycle API
* ---------------------
* @project: lxc-cluster-manager
*
* The same create/destroy sequences the CLI runs, reachable over HTTP for the
* web front end. Every request is a one-shot lifecycle event; nothing is
* remembered between requests.
*
* GET    /api/v1/health            - liveness probe
* POST   /api/v1/clusters          - {master, workers} -> ClusterReport
* POST   /api/v1/clusters/destroy  - {master, workers} -> destroyed containers
*
* Lifecycle requests queue on a single mutex: the orchestrator is a
* sequential machine and two of them poking the same LXC hosts at once is
* how you end up with half a cluster.
*/

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;

use crate::api::error::ErrorResponse;
use crate::cluster::{ClusterOrchestrator, ClusterReport, ClusterTopology, TeardownOrchestrator};
use crate::config::Settings;
use crate::core::{ContainerIdentity, RemoteExecutor};
use crate::errors::{Stage, StageContext};

pub struct AppState {
    pub orchestrator: ClusterOrchestrator,
    pub teardown: TeardownOrchestrator,
    pub lifecycle: Mutex<()>,
}

impl AppState {
    pub fn new(orchestrator: ClusterOrchestrator, teardown: TeardownOrchestrator) -> Self {
        Self {
            orchestrator,
            teardown,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn from_settings(executor: Arc<dyn RemoteExecutor>, settings: &Settings) -> Self {
        Self::new(
            ClusterOrchestrator::from_settings(executor.clone(), settings),
            TeardownOrchestrator::from_settings(executor, settings),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ClusterRequest {
    pub master: String,
    #[serde(default)]
    pub workers: Vec<String>,
}

impl ClusterRequest {
    fn topology(&self) -> Result<ClusterTopology, ErrorResponse> {
        Ok(ClusterTopology::parse(&self.master, &self.workers).stage(Stage::Plan)?)
    }
}

#[derive(Debug, Serialize)]
pub struct DestroyResponse {
    pub destroyed: Vec<ContainerIdentity>,
}

pub fn create_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/clusters", post(create_cluster))
        .route("/api/v1/clusters/destroy", post(destroy_cluster))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
}

pub async fn serve(settings: Settings, executor: Arc<dyn RemoteExecutor>, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_settings(executor, &settings));
    let app = create_router(state, settings.server.max_body_bytes);

    let addr = format!("{}:{}", settings.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

// Lifecycle runs on its own task: once started it must finish even if the
// client goes away and the request future is dropped.
async fn create_cluster(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClusterRequest>,
) -> Result<Json<ClusterReport>, ErrorResponse> {
    let topology = request.topology()?;
    let report = tokio::spawn(async move {
        let _guard = state.lifecycle.lock().await;
        state.orchestrator.create_cluster(&topology).await
    })
    .await??;
    Ok(Json(report))
}

async fn destroy_cluster(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClusterRequest>,
) -> Result<Json<DestroyResponse>, ErrorResponse> {
    let topology = request.topology()?;
    let destroyed = tokio::spawn(async move {
        let _guard = state.lifecycle.lock().await;
        state.teardown.destroy_cluster(&topology).await
    })
    .await??;
    Ok(Json(DestroyResponse { destroyed }))
}
