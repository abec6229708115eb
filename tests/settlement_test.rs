//! Tests for the settlement engine: lifecycle, move validation, the
//! combined AI pass, and exactly-once settlement.

use gridstakes::{
    AppConfig, EngineError, GameStatus, GameStore, Ledger, Mark, SettlementEngine,
    TransactionKind,
};
use tempfile::NamedTempFile;

const START_BALANCE: i64 = 500;
const BET: i64 = 100;

fn setup(ai_skill_percent: u8) -> (NamedTempFile, SettlementEngine, GameStore, Ledger) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let store = GameStore::new(db_path).expect("Failed to create store");
    store.run_migrations().expect("Migrations failed");

    let ledger = Ledger::new(0);
    let config = AppConfig::new(ai_skill_percent, 0, 10, 100_000).expect("Invalid config");
    let engine = SettlementEngine::new(store.clone(), ledger.clone(), config);
    (db_file, engine, store, ledger)
}

fn funded_user(store: &GameStore, ledger: &Ledger, name: &str) -> i32 {
    let mut conn = store.connection().expect("Connect failed");
    let user = store.create_user(&mut conn, name).expect("Create failed");
    ledger
        .credit(
            &mut conn,
            *user.id(),
            START_BALANCE,
            TransactionKind::Deposit,
            None,
        )
        .expect("Funding failed");
    *user.id()
}

fn balance_of(store: &GameStore, user_id: i32) -> i64 {
    let mut conn = store.connection().expect("Connect failed");
    *store
        .get_user(&mut conn, user_id)
        .expect("Query failed")
        .expect("User missing")
        .balance()
}

fn game_tx_kinds(store: &GameStore, game_id: i32) -> Vec<String> {
    let mut conn = store.connection().expect("Connect failed");
    store
        .transactions_for_game(&mut conn, game_id)
        .expect("Query failed")
        .iter()
        .map(|e| e.kind().clone())
        .collect()
}

/// Creates a two-human game with both stakes captured.
fn pvp_game(engine: &SettlementEngine, x: i32, o: i32) -> i32 {
    let game = engine.create_game(x, BET, false).expect("Create failed");
    engine.join_game(*game.id(), o).expect("Join failed");
    *game.id()
}

// ─────────────────────────────────────────────────────────────
//  Lifecycle: create and join
// ─────────────────────────────────────────────────────────────

#[test]
fn test_create_ai_game_captures_stake_and_doubles_pot() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Alice");

    let game = engine.create_game(user, BET, true).expect("Create failed");

    assert_eq!(*game.status(), GameStatus::Playing);
    assert_eq!(*game.player_o(), None, "AI seat has no human occupant");
    assert_eq!(*game.bet_amount(), BET);
    assert_eq!(*game.pot(), BET * 2, "AI stake is synthetic");
    assert_eq!(balance_of(&store, user), START_BALANCE - BET);
    assert_eq!(game_tx_kinds(&store, *game.id()), vec!["bet"]);
}

#[test]
fn test_create_pvp_game_waits_for_opponent() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Bob");

    let game = engine.create_game(user, BET, false).expect("Create failed");

    assert_eq!(*game.status(), GameStatus::Waiting);
    assert_eq!(*game.pot(), BET, "Only the creator's stake is captured");
}

#[test]
fn test_create_game_rejects_unknown_user() {
    let (_db, engine, _store, _ledger) = setup(100);
    let result = engine.create_game(999, BET, true);
    assert!(matches!(result, Err(EngineError::UnknownUser(999))));
}

#[test]
fn test_create_game_rejects_bet_outside_bounds() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Carl");

    assert!(matches!(
        engine.create_game(user, 5, true),
        Err(EngineError::BetOutOfRange(5))
    ));
    assert!(matches!(
        engine.create_game(user, 1_000_000, true),
        Err(EngineError::BetOutOfRange(1_000_000))
    ));
    assert_eq!(balance_of(&store, user), START_BALANCE);
}

#[test]
fn test_create_game_insufficient_funds_rolls_back() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Dina");
    let mut conn = store.connection().expect("Connect failed");
    ledger
        .debit(&mut conn, user, START_BALANCE - 50, TransactionKind::Bet, None)
        .expect("Drain failed");

    let result = engine.create_game(user, BET, true);
    assert!(matches!(result, Err(EngineError::InsufficientFunds)));

    // The game insert rolled back with the failed debit.
    assert!(matches!(engine.game(1), Err(EngineError::GameNotFound(1))));
    assert_eq!(balance_of(&store, user), 50);
}

#[test]
fn test_join_game_captures_second_stake() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Elsa");
    let o = funded_user(&store, &ledger, "Finn");

    let game = engine.create_game(x, BET, false).expect("Create failed");
    let joined = engine.join_game(*game.id(), o).expect("Join failed");

    assert_eq!(*joined.status(), GameStatus::Playing);
    assert_eq!(*joined.player_o(), Some(o));
    assert_eq!(*joined.pot(), BET * 2);
    assert_eq!(balance_of(&store, x), START_BALANCE - BET);
    assert_eq!(balance_of(&store, o), START_BALANCE - BET);
    assert_eq!(game_tx_kinds(&store, *game.id()), vec!["bet", "bet"]);
}

#[test]
fn test_join_own_game_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Gwen");

    let game = engine.create_game(x, BET, false).expect("Create failed");
    let result = engine.join_game(*game.id(), x);
    assert!(matches!(result, Err(EngineError::GameNotJoinable)));
}

#[test]
fn test_join_started_game_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Hans");
    let o = funded_user(&store, &ledger, "Ivy");
    let late = funded_user(&store, &ledger, "Jon");

    let game_id = pvp_game(&engine, x, o);
    let result = engine.join_game(game_id, late);
    assert!(matches!(result, Err(EngineError::GameNotJoinable)));
    assert_eq!(balance_of(&store, late), START_BALANCE);
}

// ─────────────────────────────────────────────────────────────
//  Move validation
// ─────────────────────────────────────────────────────────────

#[test]
fn test_center_opening_move() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Kate");
    let o = funded_user(&store, &ledger, "Luka");
    let game_id = pvp_game(&engine, x, o);

    let game = engine.submit_move(game_id, x, 4).expect("Move failed");

    assert!(!game.board().is_empty(4));
    assert_eq!(game.board().empty_cells().len(), 8);
    assert_eq!(*game.current_player(), Mark::O);
    assert_eq!(*game.status(), GameStatus::Playing);
    assert_eq!(*game.winner(), None);
}

#[test]
fn test_unknown_game_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Mila");

    let result = engine.submit_move(999, user, 0);
    assert!(matches!(result, Err(EngineError::GameNotFound(999))));
}

#[test]
fn test_waiting_game_rejects_moves() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Nora");

    let game = engine.create_game(x, BET, false).expect("Create failed");
    let result = engine.submit_move(*game.id(), x, 0);
    assert!(matches!(result, Err(EngineError::GameNotActive)));
}

#[test]
fn test_non_participant_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Omar");
    let o = funded_user(&store, &ledger, "Pia");
    let outsider = funded_user(&store, &ledger, "Quentin");
    let game_id = pvp_game(&engine, x, o);

    let result = engine.submit_move(game_id, outsider, 0);
    assert!(matches!(result, Err(EngineError::NotAParticipant(id)) if id == outsider));
}

#[test]
fn test_out_of_turn_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Rosa");
    let o = funded_user(&store, &ledger, "Sten");
    let game_id = pvp_game(&engine, x, o);

    let result = engine.submit_move(game_id, o, 0);
    assert!(matches!(result, Err(EngineError::NotYourTurn)));

    // The board is untouched.
    let game = engine.game(game_id).expect("Load failed");
    assert_eq!(game.board().empty_cells().len(), 9);
}

#[test]
fn test_occupied_cell_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Tara");
    let o = funded_user(&store, &ledger, "Udo");
    let game_id = pvp_game(&engine, x, o);

    engine.submit_move(game_id, x, 4).expect("Move failed");
    let result = engine.submit_move(game_id, o, 4);
    assert!(matches!(result, Err(EngineError::CellOccupied(4))));
}

#[test]
fn test_out_of_bounds_rejected() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Vera");
    let o = funded_user(&store, &ledger, "Wim");
    let game_id = pvp_game(&engine, x, o);

    let result = engine.submit_move(game_id, x, 9);
    assert!(matches!(result, Err(EngineError::OutOfBounds(9))));
}

#[test]
fn test_turn_alternation() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Xia");
    let o = funded_user(&store, &ledger, "Yuri");
    let game_id = pvp_game(&engine, x, o);

    let moves = [(x, 0), (o, 3), (x, 1), (o, 4)];
    let mut expected = Mark::X;
    for (user, position) in moves {
        let game = engine.game(game_id).expect("Load failed");
        assert_eq!(*game.current_player(), expected);

        let updated = engine.submit_move(game_id, user, position).expect("Move failed");
        expected = expected.opponent();
        assert_eq!(*updated.current_player(), expected);
    }
}

// ─────────────────────────────────────────────────────────────
//  Terminal settlement
// ─────────────────────────────────────────────────────────────

#[test]
fn test_win_credits_pot_to_winner() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Zoe");
    let o = funded_user(&store, &ledger, "Abel");
    let game_id = pvp_game(&engine, x, o);

    for (user, position) in [(x, 0), (o, 3), (x, 1), (o, 4)] {
        engine.submit_move(game_id, user, position).expect("Move failed");
    }
    let game = engine.submit_move(game_id, x, 2).expect("Move failed");

    assert_eq!(*game.status(), GameStatus::Completed);
    assert_eq!(*game.winner(), Some(Mark::X));
    assert!(game.ended_at().is_some());

    // Winner takes the whole pot; the loser's stake stays captured.
    assert_eq!(balance_of(&store, x), START_BALANCE - BET + BET * 2);
    assert_eq!(balance_of(&store, o), START_BALANCE - BET);
    assert_eq!(
        balance_of(&store, x) + balance_of(&store, o),
        START_BALANCE * 2,
        "Money is conserved across the game"
    );
    assert_eq!(
        game_tx_kinds(&store, game_id),
        vec!["bet", "bet", "win", "loss"]
    );
}

#[test]
fn test_draw_refunds_both_stakes() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Bea");
    let o = funded_user(&store, &ledger, "Cleo");
    let game_id = pvp_game(&engine, x, o);

    let moves = [
        (x, 0),
        (o, 1),
        (x, 2),
        (o, 4),
        (x, 3),
        (o, 5),
        (x, 7),
        (o, 6),
        (x, 8),
    ];
    let mut last = None;
    for (user, position) in moves {
        last = Some(engine.submit_move(game_id, user, position).expect("Move failed"));
    }

    let game = last.expect("No final state");
    assert_eq!(*game.status(), GameStatus::Draw);
    assert_eq!(*game.winner(), None);
    assert!(game.board().is_full());

    assert_eq!(balance_of(&store, x), START_BALANCE);
    assert_eq!(balance_of(&store, o), START_BALANCE);
    assert_eq!(
        game_tx_kinds(&store, game_id),
        vec!["bet", "bet", "refund", "refund"]
    );
}

#[test]
fn test_finished_game_rejects_further_moves() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Dean");
    let o = funded_user(&store, &ledger, "Emma");
    let game_id = pvp_game(&engine, x, o);

    for (user, position) in [(x, 0), (o, 3), (x, 1), (o, 4), (x, 2)] {
        engine.submit_move(game_id, user, position).expect("Move failed");
    }

    let result = engine.submit_move(game_id, o, 5);
    assert!(matches!(result, Err(EngineError::GameNotActive)));

    // Records are untouched by the rejected move.
    let game = engine.game(game_id).expect("Load failed");
    assert_eq!(*game.status(), GameStatus::Completed);
    assert!(game.board().is_empty(5));
}

#[test]
fn test_retried_winning_move_settles_exactly_once() {
    let (_db, engine, store, ledger) = setup(100);
    let x = funded_user(&store, &ledger, "Fred");
    let o = funded_user(&store, &ledger, "Gail");
    let game_id = pvp_game(&engine, x, o);

    for (user, position) in [(x, 0), (o, 3), (x, 1), (o, 4)] {
        engine.submit_move(game_id, user, position).expect("Move failed");
    }
    engine.submit_move(game_id, x, 2).expect("Move failed");

    let balance_after_win = balance_of(&store, x);
    let entries_after_win = game_tx_kinds(&store, game_id).len();

    // A client retry of the same winning move must not pay out again.
    let retry = engine.submit_move(game_id, x, 2);
    assert!(matches!(retry, Err(EngineError::GameNotActive)));

    assert_eq!(balance_of(&store, x), balance_after_win);
    assert_eq!(game_tx_kinds(&store, game_id).len(), entries_after_win);
}

// ─────────────────────────────────────────────────────────────
//  AI games
// ─────────────────────────────────────────────────────────────

#[test]
fn test_ai_counter_move_in_same_pass() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Hope");

    let game = engine.create_game(user, BET, true).expect("Create failed");
    let updated = engine.submit_move(*game.id(), user, 4).expect("Move failed");

    // One request produced both the human move and the AI reply.
    assert!(!updated.board().is_empty(4));
    assert!(
        !updated.board().is_empty(0),
        "Skill-100 AI takes the first corner once the center is gone"
    );
    assert_eq!(updated.board().empty_cells().len(), 7);
    assert_eq!(*updated.current_player(), Mark::X);
    assert_eq!(*updated.status(), GameStatus::Playing);
}

#[test]
fn test_ai_victory_keeps_stake_captured() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Inga");

    let game = engine.create_game(user, BET, true).expect("Create failed");
    let game_id = *game.id();

    // Weak play: the tactical AI builds the 0-4-8 diagonal unopposed.
    engine.submit_move(game_id, user, 1).expect("Move failed");
    engine.submit_move(game_id, user, 3).expect("Move failed");
    let last = engine.submit_move(game_id, user, 5).expect("Move failed");

    assert_eq!(*last.status(), GameStatus::Completed);
    assert_eq!(*last.winner(), Some(Mark::O));

    // No payout anywhere; the human's stake stays in the house.
    assert_eq!(balance_of(&store, user), START_BALANCE - BET);
    assert_eq!(game_tx_kinds(&store, game_id), vec!["bet", "loss"]);
}

#[test]
fn test_human_beats_ai_and_wins_synthetic_pot() {
    let (_db, engine, store, ledger) = setup(100);
    let user = funded_user(&store, &ledger, "Jade");

    let game = engine.create_game(user, BET, true).expect("Create failed");
    let game_id = *game.id();

    // Corner fork: the one-ply AI cannot cover both open lines.
    engine.submit_move(game_id, user, 0).expect("Move failed"); // AI: 4
    engine.submit_move(game_id, user, 8).expect("Move failed"); // AI: 2
    engine.submit_move(game_id, user, 6).expect("Move failed"); // AI: 3 (block)
    let last = engine.submit_move(game_id, user, 7).expect("Move failed");

    assert_eq!(*last.status(), GameStatus::Completed);
    assert_eq!(*last.winner(), Some(Mark::X));

    // The payout equals the doubled pot even though half is synthetic.
    assert_eq!(balance_of(&store, user), START_BALANCE + BET);
    assert_eq!(game_tx_kinds(&store, game_id), vec!["bet", "win"]);

    let mut conn = store.connection().expect("Connect failed");
    let winner = store
        .get_user(&mut conn, user)
        .expect("Query failed")
        .expect("User missing");
    assert_eq!(*winner.games_played(), 1);
    assert_eq!(*winner.games_won(), 1);
    assert_eq!(*winner.total_winnings(), BET * 2);
}
