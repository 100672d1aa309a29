use anyhow::Result;
use clap::Parser;

use surveyor_daemon::cli::DaemonCli;
use surveyor_daemon::logging;
use surveyor_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Tracing is not up yet, so load errors surface through anyhow on stderr
    let config = cli.load_config().await?;

    if cli.validate {
        println!(
            "configuration is valid ({} scope domains, {} transformations)",
            config.scope.domains.len(),
            config.transformations.len()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "surveyor-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    let summary = orchestrator.run().await?;

    tracing::info!(
        seeds = summary.seeds,
        entities = summary.graph.entities,
        interrupted = summary.interrupted,
        "surveyor-daemon shut down"
    );
    Ok(())
}
