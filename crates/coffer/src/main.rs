//! Coffer CLI binary.
//!
//! This binary provides command-line access to configured stores:
//! - Store and retrieve attachment content
//! - Check for and remove content
//! - List configured stores

use clap::Parser;
use coffer::{Coffer, CofferConfig, CofferResult, init_logging};

mod cli;

use cli::{Cli, Commands, handle_command};

#[cfg(feature = "database")]
const POOL_SIZE: u32 = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CofferConfig::from_file(path)?,
        None => CofferConfig::load()?,
    };

    init_logging(&config.logging, cli.verbose)?;
    tracing::debug!(stores = config.stores.len(), "Loaded configuration");

    run(&config, cli.command).await?;
    Ok(())
}

#[cfg(not(feature = "database"))]
async fn run(config: &CofferConfig, command: Commands) -> CofferResult<()> {
    let coffer = Coffer::from_config(config, coffer::BackendContext::in_memory())?;
    handle_command(&coffer, command).await
}

/// Resolve stores from PostgreSQL and run the command inside one database
/// transaction.
#[cfg(feature = "database")]
async fn run(config: &CofferConfig, command: Commands) -> CofferResult<()> {
    use coffer::database::{AmbientConnection, create_pool, run_migrations};

    let ambient = AmbientConnection::establish()?;
    ambient.run(run_migrations).await?;
    let pool = create_pool(POOL_SIZE)?;
    let coffer = Coffer::from_database(config, pool, &ambient).await?;

    ambient.begin().await?;
    match handle_command(&coffer, command).await {
        Ok(()) => {
            ambient.commit().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback) = ambient.rollback().await {
                tracing::warn!(error = %rollback, "Database rollback failed");
            }
            Err(e)
        }
    }
}
