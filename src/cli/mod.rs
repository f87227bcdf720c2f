/*
* LXC Cluster Command Line Interface
* ----------------------------------
* @project: lxc-cluster-manager
*
* Command Structure:
* ---------------
* lxc-cluster
* ├── create-cluster <master> [workers]...     // clone, configure, boot, format, start Hadoop
* ├── destroy-cluster <master> [workers]...    // stop + destroy, master first
* ├── run-workload <master> <jar> [args]...    // upload, hadoop jar, clean up
* ├── smoke-test <master> [--restart]          // the good old pi example
* ├── serve [--port]                           // same thing over HTTP
* └── init [--force]                           // write config/default.toml
*
* Global flags: --config FILE, --dry-run (print commands, touch nothing),
* -v/-vv/-vvv for more log output on stderr.
*
* Exit status is non-zero whenever a stage fails, and the failing stage is
* printed, so a script can tell "lxc-clone blew up" from "sshd never came up".
*/

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};

use crate::cluster::{ClusterOrchestrator, ClusterTopology, TeardownOrchestrator, WorkloadRunner};
use crate::config::Settings;
use crate::core::{DryRunExecutor, NodeAddress, RemoteExecutor, SshExecutor};
use crate::errors::{LifecycleError, Stage, StageContext};

#[derive(Parser)]
#[command(name = "lxc-cluster")]
#[command(version)]
#[command(about = "Hadoop-on-LXC cluster lifecycle manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Print remote commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision containers and start Hadoop on them
    CreateCluster {
        master: String,
        workers: Vec<String>,
    },
    /// Stop and destroy every container of a cluster
    DestroyCluster {
        master: String,
        workers: Vec<String>,
    },
    /// Upload a jar to the master and run it with `hadoop jar`
    RunWorkload {
        master: String,
        artifact: PathBuf,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the bundled MapReduce pi example on a running cluster
    SmokeTest {
        master: String,
        /// Restart all Hadoop daemons first
        #[arg(long)]
        restart: bool,
        #[arg(long, default_value_t = 100)]
        maps: u32,
        #[arg(long, default_value_t = 100)]
        samples: u32,
    },
    /// Start the HTTP API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Generate default configuration
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Init { force } = cli.command {
        return handle_init_command(force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::new_from_file(path),
        None => Settings::new(),
    }
    .context("failed to load configuration")?;

    let executor: Arc<dyn RemoteExecutor> = if cli.dry_run {
        info!("dry run: remote commands will only be printed");
        Arc::new(DryRunExecutor)
    } else {
        Arc::new(SshExecutor::new(settings.ssh.clone()))
    };

    match cli.command {
        Commands::CreateCluster { master, workers } => {
            let topology = ClusterTopology::parse(&master, &workers).stage(Stage::Plan)?;
            let report = ClusterOrchestrator::from_settings(executor, &settings)
                .create_cluster(&topology)
                .await?;

            println!(
                "{} Cluster '{}' is {} ({} containers, filesystem formatted after {} attempt(s))",
                "✓".green(),
                report.master,
                "running".green(),
                report.containers.len(),
                report.format_attempts
            );
            for name in &report.containers {
                println!("- {}", name);
            }
        }
        Commands::DestroyCluster { master, workers } => {
            let topology = ClusterTopology::parse(&master, &workers).stage(Stage::Plan)?;
            let destroyed = TeardownOrchestrator::from_settings(executor, &settings)
                .destroy_cluster(&topology)
                .await?;

            for name in &destroyed {
                println!("{} {} destroyed", "✓".green(), name);
            }
        }
        Commands::RunWorkload { master, artifact, args } => {
            let master = NodeAddress::parse(&master).stage(Stage::Plan)?;
            let output = WorkloadRunner::from_settings(executor, &settings)
                .run_workload(&master, &artifact, &args)
                .await?;
            print!("{}", output.stdout);
        }
        Commands::SmokeTest { master, restart, maps, samples } => {
            let master = NodeAddress::parse(&master).stage(Stage::Plan)?;
            let output = WorkloadRunner::from_settings(executor, &settings)
                .smoke_test(&master, restart, maps, samples)
                .await?;
            print!("{}", output.stdout);
            println!("{} Smoke test passed", "✓".green());
        }
        Commands::Serve { port } => {
            let server_port = port.unwrap_or(settings.server.port);
            info!("Starting server on port {}", server_port);
            crate::api::serve(settings, executor, server_port).await?;
        }
        Commands::Init { .. } => unreachable!("handled before configuration is loaded"),
    }

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_init_command(force: bool) -> anyhow::Result<()> {
    let config_dir = PathBuf::from("config");
    let config_file = config_dir.join("default.toml");
    if config_file.exists() && !force {
        error!("Configuration file already exists. Use --force to overwrite.");
        anyhow::bail!("{} already exists", config_file.display());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = crate::config::generate_default_config();
    let config_str = toml::to_string_pretty(&default_config)?;
    std::fs::write(&config_file, config_str)?;

    println!("{} Default configuration generated", "✓".green());
    Ok(())
}

/// Exit status for any failed command.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// One-line description of a failed command, naming the lifecycle stage when
/// there is one.
pub fn failure_message(err: &anyhow::Error) -> String {
    match err.chain().find_map(|e| e.downcast_ref::<LifecycleError>()) {
        Some(lifecycle) => format!("stage {} failed: {}", lifecycle.stage, lifecycle.source),
        None => format!("{:#}", err),
    }
}
