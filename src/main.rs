use clap::Parser;
use jma_backfill::cli::{run, Cli};
use jma_backfill::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
