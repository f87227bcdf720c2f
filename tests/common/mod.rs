#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lxc_cluster_manager::config::Settings;
use lxc_cluster_manager::core::{CommandOutput, ExecutionContext, RemoteExecutor};
use lxc_cluster_manager::errors::{ClusterError, ClusterResult};

pub const EVEN_HOST: &str = "157.82.3.140";
pub const ODD_HOST: &str = "157.82.3.141";

/// One remote call as the executor saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub host: String,
    pub user: String,
    pub command: String,
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Unreachable,
    ExitStatus(i32),
}

struct Rule {
    needle: String,
    remaining: usize,
    failure: Failure,
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    rules: Vec<Rule>,
}

/// In-memory executor that records every call and fails on request.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` calls whose command contains `needle` fail.
    pub fn fail(&self, needle: &str, times: usize, failure: Failure) -> &Self {
        self.inner.lock().unwrap().rules.push(Rule {
            needle: needle.to_string(),
            remaining: times,
            failure,
        });
        self
    }

    pub fn fail_always(&self, needle: &str, failure: Failure) -> &Self {
        self.fail(needle, usize::MAX, failure)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.command.contains(needle)).count()
    }

    fn record(&self, ctx: &ExecutionContext, command: String) -> ClusterResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call {
            host: ctx.host.to_string(),
            user: ctx.credential.user.clone(),
            command: command.clone(),
        });

        let triggered = inner
            .rules
            .iter_mut()
            .find(|rule| rule.remaining > 0 && command.contains(&rule.needle))
            .map(|rule| {
                rule.remaining -= 1;
                rule.failure
            });

        match triggered {
            None => Ok(()),
            Some(Failure::Unreachable) => Err(ClusterError::Connectivity {
                host: ctx.host.to_string(),
                message: "Connection refused".to_string(),
            }),
            Some(Failure::ExitStatus(status)) => Err(ClusterError::RemoteCommandFailure {
                host: ctx.host.to_string(),
                command,
                status,
                stderr: "scripted failure".to_string(),
            }),
        }
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn execute(&self, ctx: &ExecutionContext, command: &str) -> ClusterResult<CommandOutput> {
        self.record(ctx, command.to_string())?;
        Ok(CommandOutput {
            stdout: format!("ran: {}\n", command),
            stderr: String::new(),
        })
    }

    async fn upload(&self, ctx: &ExecutionContext, local: &Path, remote: &str) -> ClusterResult<()> {
        self.record(ctx, format!("upload {} {}", local.display(), remote))
    }
}

/// Default settings with the given retry schedule.
pub fn settings(max_attempts: u32, delay_ms: u64) -> Settings {
    let mut settings = Settings::default();
    settings.retry.max_attempts = max_attempts;
    settings.retry.initial_delay_ms = delay_ms;
    settings.retry.max_delay_ms = delay_ms;
    settings.retry.multiplier = 1.0;
    settings
}
