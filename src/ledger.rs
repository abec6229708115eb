//! Balance, statistics, and transaction-log operations.

use chrono::Utc;
use derive_more::{Display, Error, From};
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::db::{
    DbError, Game, NewTransaction, Transaction, TransactionKind, TransactionStatus, User, schema,
};
use crate::games::tictactoe::{Mark, Outcome};

/// Errors raised by ledger operations.
#[derive(Debug, Display, Error, From)]
pub enum LedgerError {
    /// No user row exists for the given id.
    #[display("user {_0} not found")]
    UnknownUser(#[error(not(source))] i32),

    /// A debit would drive the balance below zero.
    #[display("user {user_id} has insufficient funds for {amount}")]
    InsufficientFunds {
        /// The user whose balance fell short.
        user_id: i32,
        /// The amount the debit asked for.
        amount: i64,
    },

    /// A negative amount was passed to a balance operation.
    #[display("invalid ledger amount {_0}")]
    InvalidAmount(#[error(not(source))] i64),

    /// Settlement was requested for a game that is still open.
    #[display("cannot settle a game that is still open")]
    NotTerminal,

    /// The persistence layer failed.
    #[display("storage failure: {_0}")]
    #[from]
    Storage(#[error(source)] DbError),
}

impl From<diesel::result::Error> for LedgerError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::Storage(DbError::from(err))
    }
}

/// Owner of all `User.balance` and statistics mutations.
///
/// Every balance change appends exactly one [`Transaction`] row; callers
/// provide the connection so a sequence of ledger calls shares one
/// database transaction with the game-state write.
#[derive(Debug, Clone)]
pub struct Ledger {
    fee_percent: u8,
}

impl Ledger {
    /// Creates a ledger charging the given platform fee (percent, 0-100)
    /// on net winnings.
    #[instrument]
    pub fn new(fee_percent: u8) -> Self {
        info!(fee_percent, "Creating Ledger");
        Self { fee_percent }
    }

    /// Returns the configured platform fee percent.
    pub fn fee_percent(&self) -> u8 {
        self.fee_percent
    }

    /// Computes the fee withheld from the given net winnings.
    pub fn fee_on(&self, net_winnings: i64) -> i64 {
        net_winnings * i64::from(self.fee_percent) / 100
    }

    /// Adds `amount` to a user's balance and appends a transaction row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] for negative amounts,
    /// [`LedgerError::UnknownUser`] for missing users, or a storage
    /// error.
    #[instrument(skip(self, conn))]
    pub fn credit(
        &self,
        conn: &mut SqliteConnection,
        user_id: i32,
        amount: i64,
        kind: TransactionKind,
        game_id: Option<i32>,
    ) -> Result<Transaction, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let affected = diesel::update(schema::users::table.find(user_id))
            .set((
                schema::users::balance.eq(schema::users::balance + amount),
                schema::users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        if affected == 0 {
            warn!(user_id, "Credit target does not exist");
            return Err(LedgerError::UnknownUser(user_id));
        }

        debug!(user_id, amount, kind = kind.to_db_string(), "Balance credited");
        self.append_entry(conn, user_id, game_id, kind, amount)
    }

    /// Subtracts `amount` from a user's balance and appends a
    /// transaction row.
    ///
    /// The balance check and the subtraction are one conditional update,
    /// so the non-negative invariant holds even under concurrent debits.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] when the balance is too
    /// small, [`LedgerError::UnknownUser`] for missing users,
    /// [`LedgerError::InvalidAmount`] for negative amounts, or a storage
    /// error.
    #[instrument(skip(self, conn))]
    pub fn debit(
        &self,
        conn: &mut SqliteConnection,
        user_id: i32,
        amount: i64,
        kind: TransactionKind,
        game_id: Option<i32>,
    ) -> Result<Transaction, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let affected = diesel::update(
            schema::users::table
                .filter(schema::users::id.eq(user_id))
                .filter(schema::users::balance.ge(amount)),
        )
        .set((
            schema::users::balance.eq(schema::users::balance - amount),
            schema::users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

        if affected == 0 {
            let exists = schema::users::table
                .find(user_id)
                .first::<User>(conn)
                .optional()?
                .is_some();
            if exists {
                debug!(user_id, amount, "Debit rejected: insufficient funds");
                return Err(LedgerError::InsufficientFunds { user_id, amount });
            }
            warn!(user_id, "Debit target does not exist");
            return Err(LedgerError::UnknownUser(user_id));
        }

        debug!(user_id, amount, kind = kind.to_db_string(), "Balance debited");
        self.append_entry(conn, user_id, game_id, kind, amount)
    }

    /// Records a finished game in a user's statistics.
    ///
    /// Played and won counters move in the same update, so
    /// `games_won <= games_played` cannot be violated by sequencing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownUser`] or a storage error.
    #[instrument(skip(self, conn))]
    pub fn record_result(
        &self,
        conn: &mut SqliteConnection,
        user_id: i32,
        won: bool,
        winnings_delta: i64,
    ) -> Result<(), LedgerError> {
        let won_increment = i32::from(won);
        let affected = diesel::update(schema::users::table.find(user_id))
            .set((
                schema::users::games_played.eq(schema::users::games_played + 1),
                schema::users::games_won.eq(schema::users::games_won + won_increment),
                schema::users::total_winnings.eq(schema::users::total_winnings + winnings_delta),
                schema::users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        if affected == 0 {
            return Err(LedgerError::UnknownUser(user_id));
        }

        debug!(user_id, won, winnings_delta, "Statistics recorded");
        Ok(())
    }

    /// Converts a terminal outcome into balance and ledger changes.
    ///
    /// On a win the winner is credited the pot minus the platform fee
    /// (fee taken on net winnings, after the synthetic doubling for AI
    /// games); a human loser gets a loss record with no balance change.
    /// On a draw every human participant is refunded their own stake.
    /// The synthetic AI seat never receives transactions or statistics.
    ///
    /// Must be called inside the same database transaction that persists
    /// the terminal game row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotTerminal`] for an open outcome, or any
    /// error from the underlying balance operations.
    #[instrument(skip(self, conn, game), fields(game_id = game.id()))]
    pub fn settle(
        &self,
        conn: &mut SqliteConnection,
        game: &Game,
        outcome: &Outcome,
    ) -> Result<(), LedgerError> {
        let game_id = Some(*game.id());
        let bet = *game.bet_amount();
        let pot = *game.pot();

        match outcome {
            Outcome::Open => Err(LedgerError::NotTerminal),
            Outcome::Win { mark, .. } => {
                if let Some(winner_id) = game.player_for(*mark) {
                    // The winner's own stake is already inside the pot.
                    let fee = self.fee_on(pot - bet);
                    let payout = pot - fee;
                    self.credit(conn, winner_id, payout, TransactionKind::Win, game_id)?;
                    if fee > 0 {
                        self.append_entry(
                            conn,
                            winner_id,
                            game_id,
                            TransactionKind::PlatformFee,
                            fee,
                        )?;
                    }
                    self.record_result(conn, winner_id, true, payout)?;
                    info!(game_id = game.id(), winner_id, payout, fee, "Pot paid out");
                }

                if let Some(loser_id) = game.player_for(mark.opponent()) {
                    self.append_entry(conn, loser_id, game_id, TransactionKind::Loss, bet)?;
                    self.record_result(conn, loser_id, false, 0)?;
                }

                Ok(())
            }
            Outcome::Draw => {
                for mark in [Mark::X, Mark::O] {
                    if let Some(user_id) = game.player_for(mark) {
                        self.credit(conn, user_id, bet, TransactionKind::Refund, game_id)?;
                        self.record_result(conn, user_id, false, 0)?;
                    }
                }
                info!(game_id = game.id(), "Stakes refunded after draw");
                Ok(())
            }
        }
    }

    /// Appends an immutable transaction row without touching balances.
    fn append_entry(
        &self,
        conn: &mut SqliteConnection,
        user_id: i32,
        game_id: Option<i32>,
        kind: TransactionKind,
        amount: i64,
    ) -> Result<Transaction, LedgerError> {
        let entry = NewTransaction::new(
            user_id,
            game_id,
            kind.to_db_string().to_string(),
            amount,
            TransactionStatus::Completed.to_db_string().to_string(),
        );

        let recorded = diesel::insert_into(schema::transactions::table)
            .values(&entry)
            .returning(Transaction::as_returning())
            .get_result(conn)?;

        Ok(recorded)
    }
}
