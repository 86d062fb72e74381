use clap::Parser;
use keysweep_config::{CliOverrides, ConfigResolver};
use std::path::PathBuf;
use std::process;

/// Find and rotate credentials stored in a hierarchical secret store.
#[derive(Parser)]
#[command(name = "keysweep-broker", version)]
struct BrokerArgs {
    /// Override config file path
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override bind address
    #[arg(long)]
    bind: Option<String>,
    /// Secret store backend (vault or memory)
    #[arg(long)]
    store: Option<String>,
    /// Container searched when a request has no base path
    #[arg(long)]
    root: Option<String>,
    /// Print where each setting came from
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = real_main().await {
        eprintln!("broker exited with error: {err:#}");
        process::exit(1);
    }
}

async fn real_main() -> anyhow::Result<()> {
    let args = BrokerArgs::parse();
    let mut overrides = CliOverrides::new();
    if let Some(path) = args.config.clone() {
        overrides = overrides.with_config_path(path);
    }
    if let Some(bind) = args.bind.clone() {
        overrides = overrides.with_bind(bind);
    }
    if let Some(store) = args.store.clone() {
        overrides = overrides.with_store(store);
    }
    if let Some(root) = args.root.clone() {
        overrides = overrides.with_root(root);
    }

    let resolved = ConfigResolver::new()
        .with_cli_overrides(overrides)
        .load()?;
    keysweep_broker::telemetry::init(&resolved.config.telemetry)?;

    if args.verbose {
        println!("{}", resolved.explain());
    } else {
        for warning in &resolved.warnings {
            tracing::warn!(%warning, "configuration warning");
        }
    }

    keysweep_broker::run(resolved.config).await
}
