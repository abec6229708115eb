//! Database models and the typed game domain model.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::db::{DbError, schema};
use crate::games::tictactoe::{Board, Cell, Mark};

/// User account database model.
///
/// Balance and statistics are mutated only through [`crate::Ledger`]
/// operations; the balance never goes below zero.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
pub struct User {
    id: i32,
    display_name: String,
    balance: i64,
    games_played: i32,
    games_won: i32,
    total_winnings: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Insertable user model. New accounts start with a zero balance.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    display_name: String,
}

/// Raw game row as stored. Converted to [`Game`] at the load boundary.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = schema::games)]
pub struct GameRecord {
    id: i32,
    board: String,
    current_player: String,
    player_x: i32,
    player_o: Option<i32>,
    status: String,
    bet_amount: i64,
    pot: i64,
    winner: Option<String>,
    created_at: NaiveDateTime,
    ended_at: Option<NaiveDateTime>,
}

impl GameRecord {
    /// Validates the raw row into the typed domain model.
    ///
    /// This is the single point where persisted text becomes typed state;
    /// everything past the store operates on [`Game`] exclusively.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the board, marks, or status text is
    /// malformed.
    pub fn into_game(self) -> Result<Game, DbError> {
        Ok(Game {
            id: self.id,
            board: board_from_db(&self.board)?,
            current_player: mark_from_db(&self.current_player)?,
            player_x: self.player_x,
            player_o: self.player_o,
            status: GameStatus::from_db_string(&self.status)?,
            bet_amount: self.bet_amount,
            pot: self.pot,
            winner: self.winner.as_deref().map(mark_from_db).transpose()?,
            created_at: self.created_at,
            ended_at: self.ended_at,
        })
    }
}

/// Insertable game model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGameRecord {
    board: String,
    current_player: String,
    player_x: i32,
    player_o: Option<i32>,
    status: String,
    bet_amount: i64,
    pot: i64,
}

/// Ledger transaction database model. Rows are append-only.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::transactions)]
#[diesel(belongs_to(User))]
pub struct Transaction {
    id: i32,
    user_id: i32,
    game_id: Option<i32>,
    kind: String,
    amount: i64,
    status: String,
    created_at: NaiveDateTime,
}

impl Transaction {
    /// Parses the stored kind string into a [`TransactionKind`].
    pub fn parse_kind(&self) -> Result<TransactionKind, DbError> {
        TransactionKind::from_db_string(self.kind())
    }
}

/// Insertable transaction model.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::transactions)]
pub struct NewTransaction {
    user_id: i32,
    game_id: Option<i32>,
    kind: String,
    amount: i64,
    status: String,
}

/// Lifecycle status of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// Created, waiting for a second human player.
    Waiting,
    /// Both seats filled; moves are accepted.
    Playing,
    /// Terminal: a player won the pot.
    Completed,
    /// Terminal: the board filled with no winner.
    Draw,
}

impl GameStatus {
    /// Converts the status to the string stored in the database.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Completed => "completed",
            Self::Draw => "draw",
        }
    }

    /// Parses a status from its stored string form.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for unknown status values.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "playing" => Ok(Self::Playing),
            "completed" => Ok(Self::Completed),
            "draw" => Ok(Self::Draw),
            _ => Err(DbError::new(format!("Invalid game status: '{}'", s))),
        }
    }

    /// Checks whether no further moves are accepted in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Draw)
    }
}

/// Kind of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Stake captured when entering a game.
    Bet,
    /// Pot payout to a winner.
    Win,
    /// Loss record for a losing participant (no balance change).
    Loss,
    /// Stake returned after a draw.
    Refund,
    /// Fee withheld from a payout.
    PlatformFee,
    /// External funds credited to a balance.
    Deposit,
}

impl TransactionKind {
    /// Converts the kind to the string stored in the database.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Bet => "bet",
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Refund => "refund",
            Self::PlatformFee => "platform_fee",
            Self::Deposit => "deposit",
        }
    }

    /// Parses a kind from its stored string form.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for unknown kind values.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "bet" => Ok(Self::Bet),
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            "refund" => Ok(Self::Refund),
            "platform_fee" => Ok(Self::PlatformFee),
            "deposit" => Ok(Self::Deposit),
            _ => Err(DbError::new(format!("Invalid transaction kind: '{}'", s))),
        }
    }
}

/// Settlement status of a ledger transaction.
///
/// Everything this engine writes is `Completed`; `Pending` and `Failed`
/// belong to the external deposit/withdrawal flows that share the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Applied to the balance.
    Completed,
    /// Awaiting an external confirmation.
    Pending,
    /// Rejected before applying.
    Failed,
}

impl TransactionStatus {
    /// Converts the status to the string stored in the database.
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its stored string form.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for unknown status values.
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "completed" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            _ => Err(DbError::new(format!("Invalid transaction status: '{}'", s))),
        }
    }
}

/// Typed, validated game state.
///
/// Produced once per load by [`GameRecord::into_game`]; all engine logic
/// operates on this form, never on raw row text.
#[derive(Debug, Clone, Getters)]
pub struct Game {
    id: i32,
    board: Board,
    current_player: Mark,
    player_x: i32,
    player_o: Option<i32>,
    status: GameStatus,
    bet_amount: i64,
    pot: i64,
    winner: Option<Mark>,
    created_at: NaiveDateTime,
    ended_at: Option<NaiveDateTime>,
}

impl Game {
    /// Returns the mark the given user plays, if they hold a seat.
    pub fn seat_of(&self, user_id: i32) -> Option<Mark> {
        if self.player_x == user_id {
            Some(Mark::X)
        } else if self.player_o == Some(user_id) {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Returns the user occupying the given seat, if it is human-held.
    pub fn player_for(&self, mark: Mark) -> Option<i32> {
        match mark {
            Mark::X => Some(self.player_x),
            Mark::O => self.player_o,
        }
    }

    /// Checks whether the given seat is AI-controlled (no human occupant).
    pub fn is_ai_seat(&self, mark: Mark) -> bool {
        self.player_for(mark).is_none()
    }
}

/// The state written back to a game row by one settlement pass.
///
/// Applied as a single conditional update keyed on the previously loaded
/// state, so a concurrent writer can never be silently overwritten.
#[derive(Debug, Clone, Getters)]
pub struct GameTransition {
    board: Board,
    current_player: Mark,
    status: GameStatus,
    winner: Option<Mark>,
    ended_at: Option<NaiveDateTime>,
}

impl GameTransition {
    /// A non-terminal transition: play continues with `next` to move.
    pub fn open(board: Board, next: Mark) -> Self {
        Self {
            board,
            current_player: next,
            status: GameStatus::Playing,
            winner: None,
            ended_at: None,
        }
    }

    /// A terminal transition for a won game.
    pub fn won(board: Board, next: Mark, winner: Mark, ended_at: NaiveDateTime) -> Self {
        Self {
            board,
            current_player: next,
            status: GameStatus::Completed,
            winner: Some(winner),
            ended_at: Some(ended_at),
        }
    }

    /// A terminal transition for a drawn game.
    pub fn drawn(board: Board, next: Mark, ended_at: NaiveDateTime) -> Self {
        Self {
            board,
            current_player: next,
            status: GameStatus::Draw,
            winner: None,
            ended_at: Some(ended_at),
        }
    }
}

/// Encodes a mark for storage.
pub(crate) fn mark_to_db(mark: Mark) -> &'static str {
    match mark {
        Mark::X => "X",
        Mark::O => "O",
    }
}

/// Decodes a stored mark.
pub(crate) fn mark_from_db(s: &str) -> Result<Mark, DbError> {
    match s {
        "X" => Ok(Mark::X),
        "O" => Ok(Mark::O),
        _ => Err(DbError::new(format!("Invalid mark: '{}'", s))),
    }
}

/// Encodes a board as its 9-character stored form (`X`, `O`, `-`).
pub(crate) fn board_to_db(board: &Board) -> String {
    board
        .cells()
        .iter()
        .map(|cell| match cell {
            Cell::Empty => '-',
            Cell::Taken(Mark::X) => 'X',
            Cell::Taken(Mark::O) => 'O',
        })
        .collect()
}

/// Decodes a stored board, validating length and cell characters.
pub(crate) fn board_from_db(s: &str) -> Result<Board, DbError> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() != 9 {
        return Err(DbError::new(format!(
            "Invalid board: expected 9 cells, got {}",
            chars.len()
        )));
    }

    let mut cells = [Cell::Empty; 9];
    for (i, c) in chars.iter().enumerate() {
        cells[i] = match c {
            '-' => Cell::Empty,
            'X' => Cell::Taken(Mark::X),
            'O' => Cell::Taken(Mark::O),
            other => return Err(DbError::new(format!("Invalid board cell: '{}'", other))),
        };
    }

    Ok(Board::from_cells(cells))
}
