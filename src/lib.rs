pub mod api;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod core;
pub mod errors;

// Re-exports
pub use crate::api::{create_router, AppState};
pub use crate::cluster::{ClusterOrchestrator, ClusterTopology, TeardownOrchestrator, TopologyPlan, WorkloadRunner};
pub use crate::config::Settings;
pub use crate::errors::{ClusterError, LifecycleError, Stage};
