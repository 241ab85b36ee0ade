// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ccb_autoloop::{evaluate_once, run_daemon, AutoloopConfig};
use clap::Parser;

#[derive(Parser)]
#[command(name = "autoloop", about = "Re-injects /tr into the caller's pane as its task loop progresses.")]
struct Cli {
    #[command(flatten)]
    config: AutoloopConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let repo_root = match cli.config.resolved_repo_root() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("autoloop: cannot resolve repo root: {err}");
            std::process::exit(1);
        }
    };

    if cli.config.once {
        let outcome = evaluate_once(&repo_root, &cli.config, true).await;
        tracing::info!(?outcome, "autoloop: single evaluation complete");
        return;
    }

    run_daemon(repo_root, cli.config).await;
}
