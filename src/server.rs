//! HTTP boundary: routes, request/response DTOs, and error mapping.
//!
//! Handlers translate between the wire format and the engine; all
//! business logic lives in [`SettlementEngine`] and [`Ledger`].

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::db::{DbError, Game, GameStore, TransactionKind, User};
use crate::games::tictactoe::{Cell, Mark};
use crate::ledger::{Ledger, LedgerError};
use crate::settlement::{EngineError, SettlementEngine};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: SettlementEngine,
    store: GameStore,
    ledger: Ledger,
}

impl AppState {
    /// Bundles the engine with the store and ledger it was built from.
    pub fn new(engine: SettlementEngine, store: GameStore, ledger: Ledger) -> Self {
        Self {
            engine,
            store,
            ledger,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/deposit", post(deposit))
        .route("/games", post(create_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/join", post(join_game))
        .route("/games/{id}/moves", post(submit_move))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────
//  Request and response DTOs
// ─────────────────────────────────────────────────────────────

/// Request for creating a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Unique display name.
    pub display_name: String,
}

/// Request for crediting externally-provided funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Amount to credit, in minor units. Must be positive.
    pub amount: i64,
}

/// Request for creating a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    /// The creating user, seated as X.
    pub user_id: i32,
    /// Stake per player, in minor units.
    pub bet_amount: i64,
    /// Whether the O seat is played by the AI.
    #[serde(default)]
    pub vs_ai: bool,
}

/// Request for joining a waiting game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinGameRequest {
    /// The joining user, seated as O.
    pub user_id: i32,
}

/// Request for submitting a move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// The acting user.
    pub user_id: i32,
    /// Board index 0-8, row-major.
    pub position: usize,
}

/// Display-ready game state.
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    /// Game id.
    pub id: i32,
    /// Nine cells in row-major order; `null` for empty.
    pub board: Vec<Option<Mark>>,
    /// The mark to move next.
    pub current_player: Mark,
    /// Lifecycle status.
    pub status: String,
    /// Winning mark, if the game is completed.
    pub winner: Option<Mark>,
    /// Stake per player.
    pub bet_amount: i64,
    /// Total staked amount payable to the winner.
    pub pot: i64,
}

impl From<&Game> for GameView {
    fn from(game: &Game) -> Self {
        Self {
            id: *game.id(),
            board: game
                .board()
                .cells()
                .iter()
                .map(|cell| match cell {
                    Cell::Empty => None,
                    Cell::Taken(mark) => Some(*mark),
                })
                .collect(),
            current_player: *game.current_player(),
            status: game.status().to_db_string().to_string(),
            winner: *game.winner(),
            bet_amount: *game.bet_amount(),
            pot: *game.pot(),
        }
    }
}

/// Display-ready user account state.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    /// User id.
    pub id: i32,
    /// Display name.
    pub display_name: String,
    /// Current balance in minor units.
    pub balance: i64,
    /// Games finished.
    pub games_played: i32,
    /// Games won.
    pub games_won: i32,
    /// Payouts received over the account's lifetime.
    pub total_winnings: i64,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: *user.id(),
            display_name: user.display_name().clone(),
            balance: *user.balance(),
            games_played: *user.games_played(),
            games_won: *user.games_won(),
            total_winnings: *user.total_winnings(),
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Error mapping
// ─────────────────────────────────────────────────────────────

/// Boundary error: a status code plus a JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::GameNotFound(_) | EngineError::UnknownUser(_) => StatusCode::NOT_FOUND,
            EngineError::NotAParticipant(_) => StatusCode::FORBIDDEN,
            EngineError::GameNotActive
            | EngineError::GameNotJoinable
            | EngineError::NotYourTurn
            | EngineError::CellOccupied(_)
            | EngineError::StateChanged
            | EngineError::InsufficientFunds => StatusCode::CONFLICT,
            EngineError::OutOfBounds(_) | EngineError::BetOutOfRange(_) => StatusCode::BAD_REQUEST,
            EngineError::NoLegalMove | EngineError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "Request failed");
            // Storage detail stays in the log, not on the wire.
            return Self {
                status,
                message: "failed to complete move".to_string(),
            };
        }

        debug!(error = %err, "Request rejected");
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self::from(EngineError::Storage(err))
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self::from(EngineError::from(err))
    }
}

// ─────────────────────────────────────────────────────────────
//  Handlers
// ─────────────────────────────────────────────────────────────

/// Creates a user account.
#[instrument(skip(state))]
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    if req.display_name.trim().is_empty() {
        return Err(ApiError::bad_request("display_name must not be empty"));
    }

    let mut conn = state.store.connection()?;
    let user = state.store.create_user(&mut conn, req.display_name.trim())?;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

/// Returns a user's balance and statistics.
#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> Result<Json<UserView>, ApiError> {
    let mut conn = state.store.connection()?;
    let user = state
        .store
        .get_user(&mut conn, user_id)?
        .ok_or_else(|| ApiError::from(EngineError::UnknownUser(user_id)))?;
    Ok(Json(UserView::from(&user)))
}

/// Credits externally-provided funds to a user's balance.
#[instrument(skip(state))]
async fn deposit(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<UserView>, ApiError> {
    if req.amount <= 0 {
        return Err(ApiError::bad_request("deposit amount must be positive"));
    }

    let mut conn = state.store.connection()?;
    conn.immediate_transaction(|conn| {
        state
            .ledger
            .credit(conn, user_id, req.amount, TransactionKind::Deposit, None)
    })?;
    let user = state
        .store
        .get_user(&mut conn, user_id)?
        .ok_or_else(|| ApiError::from(EngineError::UnknownUser(user_id)))?;
    Ok(Json(UserView::from(&user)))
}

/// Creates a game, capturing the creator's stake.
#[instrument(skip(state))]
async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let game = state
        .engine
        .create_game(req.user_id, req.bet_amount, req.vs_ai)?;
    Ok((StatusCode::CREATED, Json(GameView::from(&game))))
}

/// Returns the current state of a game.
#[instrument(skip(state))]
async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<i32>,
) -> Result<Json<GameView>, ApiError> {
    let game = state.engine.game(game_id)?;
    Ok(Json(GameView::from(&game)))
}

/// Seats the caller as player O in a waiting game.
#[instrument(skip(state))]
async fn join_game(
    State(state): State<AppState>,
    Path(game_id): Path<i32>,
    Json(req): Json<JoinGameRequest>,
) -> Result<Json<GameView>, ApiError> {
    let game = state.engine.join_game(game_id, req.user_id)?;
    Ok(Json(GameView::from(&game)))
}

/// Validates and applies a move, returning the combined update.
#[instrument(skip(state))]
async fn submit_move(
    State(state): State<AppState>,
    Path(game_id): Path<i32>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<GameView>, ApiError> {
    let game = state
        .engine
        .submit_move(game_id, req.user_id, req.position)?;
    Ok(Json(GameView::from(&game)))
}
