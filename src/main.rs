use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("lockstep: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let path = match args.next() {
        Some(p) => PathBuf::from(p),
        None => bail!("usage: lockstep <scenario.toml>"),
    };
    if args.next().is_some() {
        bail!("usage: lockstep <scenario.toml>");
    }

    let scenario = lockstep_config::load_scenario(&path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;
    info!(
        path = %path.display(),
        instances = scenario.instances.len(),
        actions = scenario.sequence.len(),
        "scenario loaded"
    );

    lockstep_runner::run(&scenario)
        .await
        .context("scenario run failed")?;
    info!("scenario completed");
    Ok(())
}
