use colored::Colorize;

use lxc_cluster_manager::cli;

#[tokio::main]
async fn main() {
    if let Err(err) = cli::run().await {
        eprintln!("{} {}", "✗".red(), cli::failure_message(&err));
        std::process::exit(cli::FAILURE_EXIT_CODE);
    }
}
