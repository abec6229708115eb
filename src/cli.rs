//! Command-line interface for gridstakes.

use clap::{Parser, Subcommand};

/// Gridstakes - staked tic-tac-toe game server
#[derive(Parser, Debug)]
#[command(name = "gridstakes")]
#[command(about = "Staked tic-tac-toe game server with atomic settlement", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Path to the database file (created if it doesn't exist)
        #[arg(long, default_value = "gridstakes.db")]
        db_path: String,
    },
}
