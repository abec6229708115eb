//! Database persistence layer for games, users, and the transaction log.

mod error;
mod models;
pub(crate) mod schema;
mod store;

pub use error::DbError;
pub use models::{
    Game, GameRecord, GameStatus, GameTransition, NewGameRecord, NewTransaction, NewUser,
    Transaction, TransactionKind, TransactionStatus, User,
};
pub use store::{GameStore, MIGRATIONS};
