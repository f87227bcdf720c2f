use std::sync::Arc;
use tracing::debug;

use crate::core::executor::{CommandOutput, ExecutionContext, RemoteExecutor};
use crate::errors::ClusterResult;

pub const IP_ADDRESS: &str = "IP_ADDRESS";
pub const NAME_RESOLUTION: &str = "NAME_RESOLUTION";

/// Quotes `value` for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | '+' | ','));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn escape_sed_pattern(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if matches!(c, '\\' | '/' | '.' | '*' | '[' | ']' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_sed_replacement(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '&' | '/' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str(r"\n"),
            _ => out.push(c),
        }
    }
    out
}

/// A template file to fill in and where to put the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub template: String,
    pub substitutions: Vec<(String, String)>,
    pub output: String,
}

impl RenderRequest {
    pub fn new(template: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            substitutions: Vec::new(),
            output: output.into(),
        }
    }

    pub fn substitute(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.substitutions.push((placeholder.into(), value.into()));
        self
    }

    /// The single shell pipeline that performs the render on the remote side.
    pub fn command(&self) -> String {
        let source = shell_quote(&self.template);
        let target = shell_quote(&self.output);

        if self.substitutions.is_empty() {
            return format!("cat {} > {}", source, target);
        }

        let mut command = String::from("sed");
        for (placeholder, value) in &self.substitutions {
            let script = format!(
                "s/{}/{}/g",
                escape_sed_pattern(placeholder),
                escape_sed_replacement(value)
            );
            command.push_str(" -e ");
            command.push_str(&shell_quote(&script));
        }
        command.push(' ');
        command.push_str(&source);
        command.push_str(" > ");
        command.push_str(&target);
        command
    }
}

/// Writes rendered templates and literal files on remote hosts.
#[derive(Clone)]
pub struct TemplateRenderer {
    executor: Arc<dyn RemoteExecutor>,
}

impl TemplateRenderer {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    pub async fn render(&self, ctx: &ExecutionContext, request: &RenderRequest) -> ClusterResult<CommandOutput> {
        debug!(host = %ctx.host, template = %request.template, output = %request.output, "rendering template");
        self.executor.execute(ctx, &request.command()).await
    }

    /// Replaces `path` with `content` plus a trailing newline.
    pub async fn write_file(&self, ctx: &ExecutionContext, content: &str, path: &str) -> ClusterResult<CommandOutput> {
        debug!(host = %ctx.host, path, "writing file");
        self.executor.execute(ctx, &write_file_command(content, path)).await
    }
}

pub fn write_file_command(content: &str, path: &str) -> String {
    format!("printf '%s\\n' {} > {}", shell_quote(content), shell_quote(path))
}
