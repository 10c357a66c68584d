//! TraceCraft - compile browser runs into replayable scripts

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracecraft_cli::cli::run_cli().await
}
