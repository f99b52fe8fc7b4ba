use calendar_tree::commands::{self, Cli};
use calendar_tree::startup;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = startup::load_config()?;

    // Initialize logging
    let verbose = cli.debug || config.read().await.debug;
    startup::init_logging(verbose)?;

    info!("Starting calendar");

    commands::dispatch(cli.command, config).await?;
    Ok(())
}
