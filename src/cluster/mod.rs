pub mod orchestrator;
pub mod teardown;
pub mod topology;
pub mod workload;

pub use orchestrator::{ClusterOrchestrator, ClusterReport, LifecycleState};
pub use teardown::TeardownOrchestrator;
pub use topology::{ClusterTopology, NameResolutionEntry, NameResolutionTable, PlannedContainer, TopologyPlan};
pub use workload::WorkloadRunner;
