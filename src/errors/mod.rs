pub mod handlers;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use handlers::{RetryHandler, RetryPolicy};

#[derive(Error, Debug)]
pub enum ClusterError {
    /// The transport never reached the host (ssh exit 255, killed by signal).
    #[error("cannot reach {host}: {message}")]
    Connectivity {
        host: String,
        message: String,
    },

    #[error("`{command}` on {host} exited with status {status}: {stderr}")]
    RemoteCommandFailure {
        host: String,
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("container identity {identity} is claimed by both {first} and {second}")]
    NamingCollision {
        identity: String,
        first: String,
        second: String,
    },

    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress {
        address: String,
        reason: String,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(PathBuf),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ClusterError>,
    },

    #[error("failed to launch remote shell: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ClusterError {
    /// Only transport failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClusterError::Connectivity { .. })
    }

    /// Errors caused by caller input rather than by the remote side.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClusterError::NamingCollision { .. }
                | ClusterError::InvalidAddress { .. }
                | ClusterError::InvalidTopology(_)
                | ClusterError::ArtifactNotFound(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClusterError::Connectivity { .. } => "connectivity",
            ClusterError::RemoteCommandFailure { .. } => "remote-command-failure",
            ClusterError::NamingCollision { .. } => "naming-collision",
            ClusterError::InvalidAddress { .. } => "invalid-address",
            ClusterError::InvalidTopology(_) => "invalid-topology",
            ClusterError::ArtifactNotFound(_) => "artifact-not-found",
            ClusterError::RetriesExhausted { .. } => "retries-exhausted",
            ClusterError::Spawn(_) => "spawn",
        }
    }
}

/// The step of a lifecycle operation that was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Plan,
    CloneContainers,
    ConfigureHosts,
    WriteWorkerList,
    StartContainers,
    FormatFilesystem,
    StartServices,
    StopContainer,
    DestroyContainer,
    UploadArtifact,
    RunWorkload,
    RemoveArtifact,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Plan => "plan",
            Stage::CloneContainers => "clone-containers",
            Stage::ConfigureHosts => "configure-hosts",
            Stage::WriteWorkerList => "write-worker-list",
            Stage::StartContainers => "start-containers",
            Stage::FormatFilesystem => "format-filesystem",
            Stage::StartServices => "start-services",
            Stage::StopContainer => "stop-container",
            Stage::DestroyContainer => "destroy-container",
            Stage::UploadArtifact => "upload-artifact",
            Stage::RunWorkload => "run-workload",
            Stage::RemoveArtifact => "remove-artifact",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
#[error("stage {stage} failed: {source}")]
pub struct LifecycleError {
    pub stage: Stage,
    #[source]
    pub source: ClusterError,
}

impl LifecycleError {
    pub fn new(stage: Stage, source: ClusterError) -> Self {
        Self { stage, source }
    }
}

/// Tags a `ClusterError` result with the stage it happened in.
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T, LifecycleError>;
}

impl<T> StageContext<T> for Result<T, ClusterError> {
    fn stage(self, stage: Stage) -> Result<T, LifecycleError> {
        self.map_err(|source| LifecycleError::new(stage, source))
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_is_transient() {
        let down = ClusterError::Connectivity {
            host: "157.82.3.140".into(),
            message: "timed out".into(),
        };
        let failed = ClusterError::RemoteCommandFailure {
            host: "157.82.3.140".into(),
            command: "lxc-start -n master-10 -d".into(),
            status: 1,
            stderr: String::new(),
        };
        assert!(down.is_transient());
        assert!(!failed.is_transient());
        assert!(!ClusterError::InvalidTopology("empty".into()).is_transient());
    }

    #[test]
    fn lifecycle_error_names_the_stage() {
        let err: Result<(), _> = Err(ClusterError::InvalidTopology("dup".into()));
        let err = err.stage(Stage::Plan).unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert_eq!(err.to_string(), "stage plan failed: invalid topology: dup");
    }

    #[test]
    fn stage_serializes_like_it_displays() {
        let json = serde_json::to_string(&Stage::FormatFilesystem).unwrap();
        assert_eq!(json, format!("\"{}\"", Stage::FormatFilesystem));
    }
}
