use anyhow::Result;
use clap::Parser;
use cht::cli::{run, Cli};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout carries converted data, so logs go to stderr.
    let level = if cli.debug() { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
    tracing::info!("CLI arguments parsed, invoking run");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
