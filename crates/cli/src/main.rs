// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ccb_cli::{command, Target};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ccbctl", about = "Control the CCB daemon family: ping, shutdown, status.")]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Check whether a daemon is up and answering its own ping.
    Ping {
        #[arg(long, value_enum)]
        daemon: Target,
        #[arg(long, default_value_t = 2.0)]
        timeout_s: f64,
    },
    /// Ask a daemon to shut itself down.
    Shutdown {
        #[arg(long, value_enum)]
        daemon: Target,
        #[arg(long, default_value_t = 2.0)]
        timeout_s: f64,
    },
    /// Print a daemon's published state (and whether it still answers).
    Status {
        #[arg(long, value_enum)]
        daemon: Target,
        #[arg(long, default_value_t = 2.0)]
        timeout_s: f64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.action {
        Action::Ping { daemon, timeout_s } => command::ping(daemon, timeout_s).await.map(|alive| {
            println!("{}", if alive { "up" } else { "down" });
            if alive {
                0
            } else {
                1
            }
        }),
        Action::Shutdown { daemon, timeout_s } => command::shutdown(daemon, timeout_s).await.map(|sent| {
            println!("{}", if sent { "shutdown requested" } else { "no daemon to shut down" });
            0
        }),
        Action::Status { daemon, timeout_s } => command::status(daemon, timeout_s).await.map(|value| {
            match serde_json::to_string_pretty(&value) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => eprintln!("ccbctl: cannot render status: {err}"),
            }
            0
        }),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("ccbctl: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
