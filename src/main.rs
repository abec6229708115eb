//! Gridstakes server binary.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use gridstakes::{AppConfig, AppState, GameStore, Ledger, SettlementEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            db_path,
        } => run_server(host, port, db_path).await,
    }
}

/// Run the HTTP game server
async fn run_server(host: String, port: u16, db_path: String) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting gridstakes server");

    let config = AppConfig::from_env()?;
    let store = GameStore::new(db_path)?;
    store.run_migrations()?;

    let ledger = Ledger::new(*config.platform_fee_percent());
    let engine = SettlementEngine::new(store.clone(), ledger.clone(), config);
    let app = gridstakes::router(AppState::new(engine, store, ledger));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
