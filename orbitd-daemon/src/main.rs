use anyhow::Result;
use clap::Parser;

use orbitd_daemon::cli::DaemonCli;
use orbitd_daemon::logging;
use orbitd_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = cli.load_config().await?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "orbitd starting");

    let orchestrator = Orchestrator::build(config)?;

    if cli.once {
        let report = orchestrator.run_once().await?;
        tracing::info!(
            updated = report.updated,
            rolled_back = report.rolled_back,
            failed = report.failed,
            down = report.down,
            "single update cycle complete"
        );
        if report.down > 0 {
            return Err(anyhow::anyhow!(
                "{} container(s) left down, manual intervention required",
                report.down
            ));
        }
        return Ok(());
    }

    orchestrator.run().await
}
