// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex's own single-provider daemon (spec §4.4).

use ccb_core::Provider;
use ccb_daemon::config::DaemonConfig;
use ccb_daemon::registry::ProviderRegistry;
use ccb_daemon::spec::DaemonSpec;
use clap::Parser;

#[derive(Parser)]
#[command(name = "caskd", about = "Codex single-provider CCB daemon.")]
struct Cli {
    #[command(flatten)]
    config: DaemonConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let Some(registry) = ProviderRegistry::single(Provider::Codex) else {
        eprintln!("caskd: no codex adapter registered");
        std::process::exit(1);
    };

    match ccb_daemon::lifecycle::run(DaemonSpec::CASKD, cli.config, Some(Provider::Codex), registry).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("caskd: fatal: {err}");
            std::process::exit(1);
        }
    }
}
