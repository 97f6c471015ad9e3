//! 🚀 esprobe-cli: the front door, the bouncer, the maitre d' of esprobe.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that sets up logging, loads config,
//! and then lets the library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use esprobe::{RunOptions, Scenario};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🔍 Write a log document to Elasticsearch, then prove it can be read back.
#[derive(Parser, Debug)]
#[command(name = "esprobe", version, about)]
struct Cli {
    /// 📋 TOML config with `elasticsearch.url`, `elasticsearch.username`, `elasticsearch.password`.
    #[arg(short, long, env = "ESPROBE_CONFIG", default_value = "esprobe.toml")]
    config: PathBuf,

    /// 🎬 Which scenario to run: `text-message`, `object-message`, or `all`.
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// 🧪 Run against the in-memory backend. The config file is still required.
    #[arg(long)]
    dry_run: bool,
}

fn scenarios_from_arg(raw: &str) -> Result<Vec<Scenario>> {
    if raw == "all" {
        return Ok(Scenario::ALL.to_vec());
    }
    Ok(vec![raw.parse()?])
}

/// 🚀 main(): where it all begins. The genesis. The big bang.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args
/// 3. Load config (the moment of truth, and a missing file ends it right here)
/// 4. Run the scenarios
/// 5. Handle errors (cry, then print a hint)
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 default to info so the hits actually show up. RUST_LOG still wins.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let options = RunOptions {
        scenarios: scenarios_from_arg(&cli.scenario)?,
        dry_run: cli.dry_run,
    };

    let result = match esprobe::app_config::load_config(&cli.config)
        .context("💀 In esprobe-cli, main, we couldn't load the config file. Take a look at it, make sure it's correct, and make sure it's where you think it is.")
    {
        Ok(app_config) => esprobe::run(app_config, options).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(reports) => {
            for report in &reports {
                info!(
                    "✅ {}: document {} visible in '{}' after {} attempt(s)",
                    report.scenario, report.id, report.index, report.attempts
                );
            }
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}

/// 💀 Peel the onion of sadness, one layer at a time, and hint at the usual suspect.
fn report_failure(err: &anyhow::Error) {
    error!("💀 error: {}", err);
    let mut the_vibes_are_giving_connection_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        let cause_str = cause.to_string();
        if cause_str.contains("error sending request")
            || cause_str.contains("connection refused")
            || cause_str.contains("Connection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
        {
            the_vibes_are_giving_connection_issues = true;
        }
    }

    if the_vibes_are_giving_connection_issues {
        error!(
            "🔧 hint: looks like Elasticsearch isn't reachable. \
            Double-check `elasticsearch.url`, and that the cluster is actually running. \
            If you're using Docker, try `docker ps` to see what's up. \
            Or pass --dry-run to check everything except the network. ☕"
        );
    }
}
