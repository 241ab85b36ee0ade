// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini's own single-provider daemon (spec §4.4).

use ccb_core::Provider;
use ccb_daemon::config::DaemonConfig;
use ccb_daemon::registry::ProviderRegistry;
use ccb_daemon::spec::DaemonSpec;
use clap::Parser;

#[derive(Parser)]
#[command(name = "gaskd", about = "Gemini single-provider CCB daemon.")]
struct Cli {
    #[command(flatten)]
    config: DaemonConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let Some(registry) = ProviderRegistry::single(Provider::Gemini) else {
        eprintln!("gaskd: no gemini adapter registered");
        std::process::exit(1);
    };

    match ccb_daemon::lifecycle::run(DaemonSpec::GASKD, cli.config, Some(Provider::Gemini), registry).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("gaskd: fatal: {err}");
            std::process::exit(1);
        }
    }
}
