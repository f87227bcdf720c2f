use async_trait::async_trait;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SshSettings;
use crate::core::router::{HostRouter, PhysicalHost};
use crate::errors::{ClusterError, ClusterResult};

/// Who we log in as on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user: String,
    pub key_file: PathBuf,
}

/// Container management runs as the infrastructure user, Hadoop daemons as
/// the cluster user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub infrastructure: Credential,
    pub cluster: Credential,
}

/// Target host and credential for exactly one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub host: PhysicalHost,
    pub credential: Credential,
}

impl ExecutionContext {
    /// Context for a command that must run on the machine hosting `target`.
    pub fn routed(router: &HostRouter, target: &str, credential: &Credential) -> ClusterResult<Self> {
        Ok(Self {
            host: router.route(target)?.clone(),
            credential: credential.clone(),
        })
    }

    /// Context for a command that runs on `host` itself, e.g. inside a container.
    pub fn direct(host: impl Into<String>, credential: &Credential) -> Self {
        Self {
            host: PhysicalHost::new(host),
            credential: credential.clone(),
        }
    }

    pub fn login(&self) -> String {
        format!("{}@{}", self.credential.user, self.host)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Runs `command` through the remote shell of `ctx.host`.
    async fn execute(&self, ctx: &ExecutionContext, command: &str) -> ClusterResult<CommandOutput>;

    /// Copies a local file to `remote` on `ctx.host`.
    async fn upload(&self, ctx: &ExecutionContext, local: &Path, remote: &str) -> ClusterResult<()>;
}

/// Talks to hosts through the system `ssh` and `scp` binaries.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    settings: SshSettings,
}

impl SshExecutor {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn common_args(&self, cmd: &mut Command, ctx: &ExecutionContext, port_flag: &str) {
        cmd.arg("-i")
            .arg(&ctx.credential.key_file)
            .arg(port_flag)
            .arg(self.settings.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.settings.connect_timeout_secs));
        for option in &self.settings.options {
            cmd.arg("-o").arg(option);
        }
    }

    fn interpret(ctx: &ExecutionContext, command: &str, output: Output) -> ClusterResult<CommandOutput> {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        match output.status.code() {
            Some(0) => Ok(CommandOutput { stdout, stderr }),
            // ssh reserves 255 for its own failures
            Some(255) | None => Err(ClusterError::Connectivity {
                host: ctx.host.to_string(),
                message: if stderr.is_empty() {
                    format!("remote shell terminated ({})", output.status)
                } else {
                    stderr
                },
            }),
            Some(status) => Err(ClusterError::RemoteCommandFailure {
                host: ctx.host.to_string(),
                command: command.to_string(),
                status,
                stderr,
            }),
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, ctx: &ExecutionContext, command: &str) -> ClusterResult<CommandOutput> {
        debug!(host = %ctx.host, user = %ctx.credential.user, command, "executing remote command");

        let mut cmd = Command::new(&self.settings.binary);
        self.common_args(&mut cmd, ctx, "-p");
        cmd.arg(ctx.login()).arg("--").arg(command).kill_on_drop(true);

        let output = cmd.output().await?;
        Self::interpret(ctx, command, output)
    }

    async fn upload(&self, ctx: &ExecutionContext, local: &Path, remote: &str) -> ClusterResult<()> {
        info!(host = %ctx.host, local = %local.display(), remote, "uploading file");

        let mut cmd = Command::new(&self.settings.scp_binary);
        self.common_args(&mut cmd, ctx, "-P");
        cmd.arg(local)
            .arg(format!("{}:{}", ctx.login(), remote))
            .kill_on_drop(true);

        let description = format!("scp {} {}", local.display(), remote);
        let output = cmd.output().await?;
        Self::interpret(ctx, &description, output).map(|_| ())
    }
}

/// Prints what would run instead of running it.
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl RemoteExecutor for DryRunExecutor {
    async fn execute(&self, ctx: &ExecutionContext, command: &str) -> ClusterResult<CommandOutput> {
        println!("{} {}", format!("[{}]", ctx.login()).cyan(), command);
        Ok(CommandOutput::default())
    }

    async fn upload(&self, ctx: &ExecutionContext, local: &Path, remote: &str) -> ClusterResult<()> {
        println!(
            "{} upload {} -> {}",
            format!("[{}]", ctx.login()).cyan(),
            local.display(),
            remote
        );
        Ok(())
    }
}
