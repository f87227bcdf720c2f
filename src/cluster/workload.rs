use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{HadoopSettings, Settings};
use crate::core::template::shell_quote;
use crate::core::{CommandOutput, Credential, ExecutionContext, NodeAddress, RemoteExecutor};
use crate::errors::{ClusterError, LifecycleError, LifecycleResult, Stage, StageContext};

/// Submits MapReduce jobs to a running cluster's master.
#[derive(Clone)]
pub struct WorkloadRunner {
    executor: Arc<dyn RemoteExecutor>,
    credential: Credential,
    hadoop: HadoopSettings,
}

impl WorkloadRunner {
    pub fn new(executor: Arc<dyn RemoteExecutor>, credential: Credential, hadoop: HadoopSettings) -> Self {
        Self {
            executor,
            credential,
            hadoop,
        }
    }

    pub fn from_settings(executor: Arc<dyn RemoteExecutor>, settings: &Settings) -> Self {
        Self::new(executor, settings.credentials.cluster.clone(), settings.hadoop.clone())
    }

    /// Uploads `artifact`, runs it with `hadoop jar`, then removes the upload.
    ///
    /// The upload is removed even when the job fails; a job failure is
    /// reported in preference to a cleanup failure.
    pub async fn run_workload(
        &self,
        master: &NodeAddress,
        artifact: &Path,
        args: &[String],
    ) -> LifecycleResult<CommandOutput> {
        if !artifact.is_file() {
            return Err(LifecycleError::new(
                Stage::UploadArtifact,
                ClusterError::ArtifactNotFound(artifact.to_path_buf()),
            ));
        }

        let ctx = ExecutionContext::direct(master.as_str(), &self.credential);
        let remote = self.staging_path(artifact);

        info!(master = %master, artifact = %artifact.display(), remote = %remote, "uploading workload");
        self.executor
            .upload(&ctx, artifact, &remote)
            .await
            .stage(Stage::UploadArtifact)?;

        let outcome = self
            .executor
            .execute(&ctx, &jar_command(&remote, args))
            .await
            .stage(Stage::RunWorkload);

        let cleanup = self
            .executor
            .execute(&ctx, &format!("rm -f {}", shell_quote(&remote)))
            .await
            .stage(Stage::RemoveArtifact);

        match (outcome, cleanup) {
            (Ok(output), Ok(_)) => Ok(output),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                warn!(remote = %remote, error = %cleanup_err, "could not remove uploaded artifact");
                Err(e)
            }
        }
    }

    /// Runs the bundled `pi` example, optionally bouncing all daemons first.
    pub async fn smoke_test(
        &self,
        master: &NodeAddress,
        restart: bool,
        maps: u32,
        samples: u32,
    ) -> LifecycleResult<CommandOutput> {
        let ctx = ExecutionContext::direct(master.as_str(), &self.credential);

        if restart {
            for command in ["stop-all.sh", "start-all.sh"] {
                info!(master = %master, command, "restarting cluster services");
                self.executor
                    .execute(&ctx, command)
                    .await
                    .stage(Stage::StartServices)?;
            }
        }

        let args = vec!["pi".to_string(), maps.to_string(), samples.to_string()];
        info!(master = %master, maps, samples, "running pi example");
        self.executor
            .execute(&ctx, &jar_command(&self.hadoop.examples_jar_path(), &args))
            .await
            .stage(Stage::RunWorkload)
            .map_err(|e| {
                error!(error = %e, "smoke test failed");
                e
            })
    }

    fn staging_path(&self, artifact: &Path) -> String {
        let file_name = artifact
            .file_name()
            .map(|n| staging_file_name(&n.to_string_lossy()))
            .unwrap_or_else(|| "workload.jar".to_string());
        format!(
            "{}/{}-{}",
            self.hadoop.staging_dir.trim_end_matches('/'),
            Uuid::new_v4(),
            file_name
        )
    }
}

/// scp does not quote the remote path, so the name must stay a plain shell word.
fn staging_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | ',') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn jar_command(jar: &str, args: &[String]) -> String {
    let mut command = format!("hadoop jar {}", shell_quote(jar));
    for arg in args {
        command.push(' ');
        command.push_str(&shell_quote(arg));
    }
    command
}
