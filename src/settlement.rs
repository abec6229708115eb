//! Move validation, state advancement, and atomic settlement.

use chrono::Utc;
use derive_more::{Display, Error};
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::db::{DbError, Game, GameStatus, GameStore, GameTransition, TransactionKind};
use crate::games::tictactoe::{self, BoardError, NoLegalMove, Outcome};
use crate::ledger::{Ledger, LedgerError};

/// Errors raised by engine operations.
///
/// Validation, authorization, and state-conflict variants are expected
/// conditions resolved by the caller refreshing and retrying; only
/// `Storage` indicates an incident.
#[derive(Debug, Display, Error)]
pub enum EngineError {
    /// No game row exists for the given id.
    #[display("game {_0} not found")]
    GameNotFound(#[error(not(source))] i32),

    /// The game is not in a status that accepts moves.
    #[display("game is not accepting moves")]
    GameNotActive,

    /// The game is not open for a second player.
    #[display("game is not open to join")]
    GameNotJoinable,

    /// The acting user holds no seat in the game.
    #[display("user {_0} is not a participant in this game")]
    NotAParticipant(#[error(not(source))] i32),

    /// The acting user's seat is not the one to move.
    #[display("it is not your turn")]
    NotYourTurn,

    /// The target cell already holds a mark.
    #[display("cell {_0} is already occupied")]
    CellOccupied(#[error(not(source))] usize),

    /// The move index is outside 0-8.
    #[display("position {_0} is out of bounds")]
    OutOfBounds(#[error(not(source))] usize),

    /// A concurrent writer changed the game between read and write.
    #[display("game state changed while the move was processed")]
    StateChanged,

    /// The AI was asked to move on a full board.
    #[display("no legal move is available")]
    NoLegalMove,

    /// The stake is outside the configured bet bounds.
    #[display("bet {_0} is outside the configured bounds")]
    BetOutOfRange(#[error(not(source))] i64),

    /// The stake exceeds the acting user's balance.
    #[display("insufficient funds to cover the stake")]
    InsufficientFunds,

    /// No user row exists for the given id.
    #[display("user {_0} not found")]
    UnknownUser(#[error(not(source))] i32),

    /// The persistence layer failed.
    #[display("storage failure: {_0}")]
    Storage(#[error(source)] DbError),
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        Self::Storage(err)
    }
}

impl From<diesel::result::Error> for EngineError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::Storage(DbError::from(err))
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownUser(id) => Self::UnknownUser(id),
            LedgerError::InsufficientFunds { .. } => Self::InsufficientFunds,
            LedgerError::InvalidAmount(amount) => {
                Self::Storage(DbError::new(format!("invalid ledger amount {}", amount)))
            }
            LedgerError::NotTerminal => {
                Self::Storage(DbError::new("settlement requested for an open game"))
            }
            LedgerError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<BoardError> for EngineError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::CellOccupied(i) => Self::CellOccupied(i),
            BoardError::OutOfBounds(i) => Self::OutOfBounds(i),
        }
    }
}

impl From<NoLegalMove> for EngineError {
    fn from(_: NoLegalMove) -> Self {
        Self::NoLegalMove
    }
}

/// Orchestrates game lifecycle and settlement.
///
/// Each operation runs inside a single sqlite immediate transaction, so
/// the write lock is held from the first read to the final write and the
/// game row, balances, and transaction log move together or not at all.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    store: GameStore,
    ledger: Ledger,
    config: AppConfig,
}

impl SettlementEngine {
    /// Creates an engine over the given store and ledger.
    #[instrument(skip(store, ledger, config))]
    pub fn new(store: GameStore, ledger: Ledger, config: AppConfig) -> Self {
        info!("Creating SettlementEngine");
        Self {
            store,
            ledger,
            config,
        }
    }

    /// Creates a game, capturing the creator's stake.
    ///
    /// Against the AI the game starts `playing` with a pot of twice the
    /// stake (the AI half is synthetic platform money); against a human
    /// it starts `waiting` with only the creator's stake in the pot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BetOutOfRange`],
    /// [`EngineError::UnknownUser`], [`EngineError::InsufficientFunds`],
    /// or a storage error.
    #[instrument(skip(self))]
    pub fn create_game(
        &self,
        creator: i32,
        bet_amount: i64,
        vs_ai: bool,
    ) -> Result<Game, EngineError> {
        if bet_amount < *self.config.min_bet() || bet_amount > *self.config.max_bet() {
            debug!(bet_amount, "Rejected bet outside bounds");
            return Err(EngineError::BetOutOfRange(bet_amount));
        }

        let mut conn = self.store.connection()?;
        conn.immediate_transaction(|conn| {
            self.store
                .get_user(conn, creator)?
                .ok_or(EngineError::UnknownUser(creator))?;

            let (status, pot) = if vs_ai {
                (GameStatus::Playing, bet_amount * 2)
            } else {
                (GameStatus::Waiting, bet_amount)
            };

            let game = self
                .store
                .insert_game(conn, creator, None, status, bet_amount, pot)?;
            self.ledger
                .debit(conn, creator, bet_amount, TransactionKind::Bet, Some(*game.id()))?;

            info!(game_id = game.id(), creator, bet_amount, vs_ai, "Game created");
            Ok(game)
        })
    }

    /// Joins a waiting game as the O seat, capturing the joiner's stake.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GameNotFound`],
    /// [`EngineError::GameNotJoinable`], [`EngineError::UnknownUser`],
    /// [`EngineError::InsufficientFunds`], [`EngineError::StateChanged`],
    /// or a storage error.
    #[instrument(skip(self))]
    pub fn join_game(&self, game_id: i32, user_id: i32) -> Result<Game, EngineError> {
        let mut conn = self.store.connection()?;
        conn.immediate_transaction(|conn| {
            let game = self
                .store
                .load_game(conn, game_id)?
                .ok_or(EngineError::GameNotFound(game_id))?;

            if *game.status() != GameStatus::Waiting || game.player_o().is_some() {
                return Err(EngineError::GameNotJoinable);
            }
            if *game.player_x() == user_id {
                debug!(game_id, user_id, "Creator tried to join own game");
                return Err(EngineError::GameNotJoinable);
            }
            self.store
                .get_user(conn, user_id)?
                .ok_or(EngineError::UnknownUser(user_id))?;

            let stake = *game.bet_amount();
            self.ledger
                .debit(conn, user_id, stake, TransactionKind::Bet, Some(game_id))?;

            let affected = self.store.seat_player_o(conn, game_id, user_id, stake)?;
            if affected == 0 {
                warn!(game_id, user_id, "Lost the race for the O seat");
                return Err(EngineError::StateChanged);
            }

            info!(game_id, user_id, stake, "Player joined game");
            self.store
                .load_game(conn, game_id)?
                .ok_or(EngineError::GameNotFound(game_id))
        })
    }

    /// Validates and applies one move, settling the game if it ends.
    ///
    /// When the move leaves the game open and the O seat is
    /// AI-controlled, the AI counter-move is computed and applied within
    /// the same unit of work, so the caller sees a combined update.
    ///
    /// The write is a conditional update keyed on the state validated
    /// above; zero affected rows aborts the transaction with
    /// [`EngineError::StateChanged`] and no money moves. A retry of an
    /// already-settled move finds the row terminal and gets
    /// [`EngineError::GameNotActive`], never a second payout.
    ///
    /// # Errors
    ///
    /// Returns a validation, authorization, or state-conflict variant
    /// without mutation, or [`EngineError::Storage`] when persistence
    /// fails (in which case the whole transaction rolled back).
    #[instrument(skip(self))]
    pub fn submit_move(
        &self,
        game_id: i32,
        user_id: i32,
        position: usize,
    ) -> Result<Game, EngineError> {
        let skill = self.config.skill_probability();
        let mut conn = self.store.connection()?;

        conn.immediate_transaction(|conn| {
            let game = self
                .store
                .load_game(conn, game_id)?
                .ok_or(EngineError::GameNotFound(game_id))?;

            if *game.status() != GameStatus::Playing {
                debug!(game_id, status = ?game.status(), "Move on inactive game");
                return Err(EngineError::GameNotActive);
            }
            let mark = game
                .seat_of(user_id)
                .ok_or(EngineError::NotAParticipant(user_id))?;
            if mark != *game.current_player() {
                debug!(game_id, user_id, %mark, "Move out of turn");
                return Err(EngineError::NotYourTurn);
            }

            let mut board = game.board().place(position, mark)?;
            let mut outcome = board.outcome();
            let mut next = mark.opponent();

            if !outcome.is_terminal() && game.is_ai_seat(next) {
                let ai_index =
                    tictactoe::choose_move(&board, next, skill, &mut rand::thread_rng())?;
                board = board.place(ai_index, next)?;
                outcome = board.outcome();
                next = next.opponent();
                debug!(game_id, ai_index, "AI counter-move applied");
            }

            let now = Utc::now().naive_utc();
            let transition = match outcome {
                Outcome::Open => GameTransition::open(board, next),
                Outcome::Win { mark: winner, .. } => GameTransition::won(board, next, winner, now),
                Outcome::Draw => GameTransition::drawn(board, next, now),
            };

            let affected = self.store.persist_transition(conn, &game, &transition)?;
            if affected == 0 {
                warn!(game_id, "Concurrent writer changed the game row");
                return Err(EngineError::StateChanged);
            }

            if outcome.is_terminal() {
                self.ledger.settle(conn, &game, &outcome)?;
                info!(game_id, ?outcome, "Game settled");
            }

            self.store
                .load_game(conn, game_id)?
                .ok_or(EngineError::GameNotFound(game_id))
        })
    }

    /// Loads the current view of a game.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::GameNotFound`] or a storage error.
    #[instrument(skip(self))]
    pub fn game(&self, game_id: i32) -> Result<Game, EngineError> {
        let mut conn = self.store.connection()?;
        self.store
            .load_game(&mut conn, game_id)?
            .ok_or(EngineError::GameNotFound(game_id))
    }
}
