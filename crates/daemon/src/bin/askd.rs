// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified provider daemon: one listener routing `<prefix>.request`
//! messages to whichever of Codex/Gemini/OpenCode/Droid the `provider`
//! field names (spec §4.5).

use ccb_daemon::config::DaemonConfig;
use ccb_daemon::registry::ProviderRegistry;
use ccb_daemon::spec::DaemonSpec;
use clap::Parser;

#[derive(Parser)]
#[command(name = "askd", about = "Unified CCB provider daemon (codex/gemini/opencode/droid).")]
struct Cli {
    #[command(flatten)]
    config: DaemonConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let registry = ProviderRegistry::unified();

    match ccb_daemon::lifecycle::run(DaemonSpec::ASKD, cli.config, None, registry).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("askd: fatal: {err}");
            std::process::exit(1);
        }
    }
}
