//! Gridstakes - staked tic-tac-toe with atomic wager settlement
//!
//! The core of the crate is the settlement engine: it validates moves
//! against authoritative game state, advances the turn-based state
//! machine, computes the AI counter-move, and settles the financial
//! consequences (stake capture, pot payout, refunds, ledger entries,
//! statistics) in a single database transaction.
//!
//! # Architecture
//!
//! - **games::tictactoe**: pure board rules and the heuristic AI
//! - **db**: diesel persistence with a typed game model at the boundary
//! - **Ledger**: balances, statistics, and the append-only transaction log
//! - **SettlementEngine**: game lifecycle and atomic move settlement
//! - **server**: axum HTTP boundary mapping engine errors to status codes
//!
//! # Example
//!
//! ```no_run
//! use gridstakes::{AppConfig, GameStore, Ledger, SettlementEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::new(75, 0, 10, 1_000)?;
//! let store = GameStore::new("gridstakes.db".to_string())?;
//! store.run_migrations()?;
//!
//! let ledger = Ledger::new(*config.platform_fee_percent());
//! let engine = SettlementEngine::new(store, ledger, config);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod db;
mod games;
mod ledger;
mod server;
mod settlement;

// Crate-level exports - Configuration
pub use config::{AppConfig, ConfigError};

// Crate-level exports - Persistence
pub use db::{
    DbError, Game, GameRecord, GameStatus, GameStore, GameTransition, MIGRATIONS, Transaction,
    TransactionKind, TransactionStatus, User,
};

// Crate-level exports - Board engine and AI
pub use games::tictactoe::{Board, BoardError, Cell, LINES, Mark, NoLegalMove, Outcome, choose_move};

// Crate-level exports - Ledger
pub use ledger::{Ledger, LedgerError};

// Crate-level exports - Settlement engine
pub use settlement::{EngineError, SettlementEngine};

// Crate-level exports - HTTP boundary
pub use server::{
    AppState, CreateGameRequest, CreateUserRequest, DepositRequest, GameView, JoinGameRequest,
    MoveRequest, UserView, router,
};
