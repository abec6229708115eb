//! Row access for games, users, and the transaction log.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::db::models::{board_to_db, mark_to_db};
use crate::db::{
    DbError, Game, GameRecord, GameStatus, GameTransition, NewGameRecord, NewUser, Transaction,
    User, schema,
};
use crate::games::tictactoe::{Board, Mark};

/// Embedded schema migrations, applied at startup and by test setups.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Store for all persisted game-platform state.
///
/// Row-level operations take an explicit connection so they compose
/// inside one database transaction; [`crate::SettlementEngine`] relies on
/// this to keep board state and money movement atomic.
#[derive(Debug, Clone)]
pub struct GameStore {
    db_path: String,
}

impl GameStore {
    /// Creates a store for the database at the given path.
    ///
    /// Use `":memory:"` for an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is invalid.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        info!(path = %db_path, "Creating GameStore");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    pub fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Creates a new user account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the display name is taken or a database
    /// error occurs.
    #[instrument(skip(self, conn))]
    pub fn create_user(
        &self,
        conn: &mut SqliteConnection,
        display_name: &str,
    ) -> Result<User, DbError> {
        debug!(display_name = %display_name, "Creating user");

        let user = diesel::insert_into(schema::users::table)
            .values(&NewUser::new(display_name.to_string()))
            .returning(User::as_returning())
            .get_result(conn)?;

        info!(user_id = user.id(), display_name = %user.display_name(), "User created");
        Ok(user)
    }

    /// Gets a user by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn))]
    pub fn get_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: i32,
    ) -> Result<Option<User>, DbError> {
        let user = schema::users::table
            .find(user_id)
            .first::<User>(conn)
            .optional()?;
        Ok(user)
    }

    /// Gets a user by display name. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn))]
    pub fn get_user_by_name(
        &self,
        conn: &mut SqliteConnection,
        display_name: &str,
    ) -> Result<Option<User>, DbError> {
        let user = schema::users::table
            .filter(schema::users::display_name.eq(display_name))
            .first::<User>(conn)
            .optional()?;
        Ok(user)
    }

    /// Inserts a new game row with an empty board and X to move.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn))]
    pub fn insert_game(
        &self,
        conn: &mut SqliteConnection,
        player_x: i32,
        player_o: Option<i32>,
        status: GameStatus,
        bet_amount: i64,
        pot: i64,
    ) -> Result<Game, DbError> {
        debug!(player_x, ?player_o, bet_amount, "Inserting game");

        let record = NewGameRecord::new(
            board_to_db(&Board::new()),
            mark_to_db(Mark::X).to_string(),
            player_x,
            player_o,
            status.to_db_string().to_string(),
            bet_amount,
            pot,
        );

        let game = diesel::insert_into(schema::games::table)
            .values(&record)
            .returning(GameRecord::as_returning())
            .get_result::<GameRecord>(conn)?
            .into_game()?;

        info!(game_id = game.id(), "Game created");
        Ok(game)
    }

    /// Loads a game by id and validates it into the typed model.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on database errors or malformed rows.
    #[instrument(skip(self, conn))]
    pub fn load_game(
        &self,
        conn: &mut SqliteConnection,
        game_id: i32,
    ) -> Result<Option<Game>, DbError> {
        let record = schema::games::table
            .find(game_id)
            .first::<GameRecord>(conn)
            .optional()?;

        record.map(|r| r.into_game()).transpose()
    }

    /// Seats a second human player, flipping the game to `playing`.
    ///
    /// The update is conditional on the row still being `waiting` with an
    /// open O seat; the returned row count is zero when a concurrent
    /// joiner got there first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn))]
    pub fn seat_player_o(
        &self,
        conn: &mut SqliteConnection,
        game_id: i32,
        user_id: i32,
        added_stake: i64,
    ) -> Result<usize, DbError> {
        let affected = diesel::update(
            schema::games::table
                .filter(schema::games::id.eq(game_id))
                .filter(schema::games::status.eq(GameStatus::Waiting.to_db_string()))
                .filter(schema::games::player_o.is_null()),
        )
        .set((
            schema::games::player_o.eq(Some(user_id)),
            schema::games::status.eq(GameStatus::Playing.to_db_string()),
            schema::games::pot.eq(schema::games::pot + added_stake),
        ))
        .execute(conn)?;

        debug!(game_id, user_id, affected, "Seated player O");
        Ok(affected)
    }

    /// Writes one settlement pass back to a game row.
    ///
    /// Single conditional update keyed on the expected prior state
    /// (status, mover, and board as loaded). Zero affected rows means a
    /// concurrent writer changed the row since it was read; the caller
    /// must abort its unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn, expected, update), fields(game_id = expected.id()))]
    pub fn persist_transition(
        &self,
        conn: &mut SqliteConnection,
        expected: &Game,
        update: &GameTransition,
    ) -> Result<usize, DbError> {
        let affected = diesel::update(
            schema::games::table
                .filter(schema::games::id.eq(expected.id()))
                .filter(schema::games::status.eq(GameStatus::Playing.to_db_string()))
                .filter(schema::games::current_player.eq(mark_to_db(*expected.current_player())))
                .filter(schema::games::board.eq(board_to_db(expected.board()))),
        )
        .set((
            schema::games::board.eq(board_to_db(update.board())),
            schema::games::current_player.eq(mark_to_db(*update.current_player())),
            schema::games::status.eq(update.status().to_db_string()),
            schema::games::winner.eq((*update.winner()).map(mark_to_db)),
            schema::games::ended_at.eq(*update.ended_at()),
        ))
        .execute(conn)?;

        debug!(
            game_id = expected.id(),
            affected,
            status = update.status().to_db_string(),
            "Persisted game transition"
        );
        Ok(affected)
    }

    /// Gets all transactions recorded for a game, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn))]
    pub fn transactions_for_game(
        &self,
        conn: &mut SqliteConnection,
        game_id: i32,
    ) -> Result<Vec<Transaction>, DbError> {
        let rows = schema::transactions::table
            .filter(schema::transactions::game_id.eq(game_id))
            .order(schema::transactions::id.asc())
            .load::<Transaction>(conn)?;
        Ok(rows)
    }

    /// Gets all transactions for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, conn))]
    pub fn transactions_for_user(
        &self,
        conn: &mut SqliteConnection,
        user_id: i32,
    ) -> Result<Vec<Transaction>, DbError> {
        let rows = schema::transactions::table
            .filter(schema::transactions::user_id.eq(user_id))
            .order(schema::transactions::id.asc())
            .load::<Transaction>(conn)?;
        Ok(rows)
    }
}
