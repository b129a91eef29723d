//! End-to-end game scenarios through the registry.

use braindice_state::{
    Audience, Event, GameConfig, JoinRole, Phase, ScriptedSource, SessionRegistry, TurnStats,
    TOTAL_DICE,
};
use pretty_assertions::assert_eq;

const A: u64 = 1;
const B: u64 = 2;
const C: u64 = 3;

/// Lobby with the given players, dice replaying `script`.
fn setup(players: &[(u64, &str)], script: Vec<usize>) -> (SessionRegistry, String) {
    let mut registry = SessionRegistry::with_seed(GameConfig::default(), 99);
    let (host, host_name) = players[0];
    let (code, _) = registry.create_session(host, host_name).unwrap();
    for &(id, name) in &players[1..] {
        registry.join(&code, id, name).unwrap();
    }
    registry
        .get_mut(&code)
        .unwrap()
        .set_random_source(Box::new(ScriptedSource::new(script)));
    (registry, code)
}

fn banked(registry: &SessionRegistry, code: &str, id: u64) -> u32 {
    registry.get(code).unwrap().get_player(id).unwrap().banked
}

#[test]
fn bank_then_bust() {
    let script = vec![
        // A draws three greens: brain, brain, footsteps
        0, 0, 0, 0, 0, 5,
        // B draws three reds: shotgun x3
        7, 7, 7, 1, 1, 1,
    ];
    let (mut registry, code) = setup(&[(A, "A"), (B, "B")], script);

    registry.start(&code, A).unwrap();
    assert_eq!(registry.get(&code).unwrap().turn_order(), &[A, B]);

    registry.roll(&code, A).unwrap();
    let lobby = registry.get(&code).unwrap();
    assert_eq!(
        lobby.get_player(A).unwrap().turn,
        TurnStats {
            brains: 2,
            shotguns: 0,
            footsteps: 1
        }
    );

    registry.end_turn(&code, A, true).unwrap();
    assert_eq!(banked(&registry, &code, A), 2);
    assert_eq!(registry.get(&code).unwrap().current_player_id(), Some(B));

    let outbox = registry.roll(&code, B).unwrap();
    let eliminated: Vec<_> = outbox
        .iter()
        .filter(|d| d.event.name() == "player_eliminated")
        .collect();
    assert_eq!(eliminated.len(), 1);
    assert_eq!(eliminated[0].audience, Audience::Only(B));

    let lobby = registry.get(&code).unwrap();
    assert_eq!(banked(&registry, &code, B), 0);
    assert_eq!(lobby.get_player(B).unwrap().turn, TurnStats::default());
    assert_eq!(lobby.current_player_id(), Some(A));
    assert!(lobby.dice_conserved());
}

#[test]
fn first_to_threshold_wins_and_match_restarts() {
    // An empty script draws index 0 and rolls face 0: every die a brain
    let (mut registry, code) = setup(&[(A, "A"), (B, "B")], vec![]);
    registry.start(&code, A).unwrap();

    for _ in 0..3 {
        registry.roll(&code, A).unwrap();
    }
    registry.end_turn(&code, A, true).unwrap();
    assert_eq!(banked(&registry, &code, A), 9);

    let outbox = registry.end_turn(&code, B, false).unwrap();
    let last = outbox.events().last();
    match last {
        Some(Event::TurnStarted { message, .. }) => {
            assert_eq!(message.as_deref(), Some("B lost all brains!"));
        }
        other => panic!("expected turn_started, got {:?}", other),
    }

    registry.roll(&code, A).unwrap();
    assert_eq!(banked(&registry, &code, A), 9);

    // 9 banked + 6 this turn crosses 13 mid-roll
    let outbox = registry.roll(&code, A).unwrap();
    let game_overs: Vec<&Event> = outbox
        .events()
        .filter(|e| e.name() == "game_over")
        .collect();
    assert_eq!(game_overs.len(), 1);
    match game_overs[0] {
        Event::GameOver {
            winner, winner_id, ..
        } => {
            assert_eq!(winner, "A");
            assert_eq!(*winner_id, A);
        }
        other => panic!("expected game_over, got {:?}", other),
    }
    assert!(!outbox.names().contains(&"turn_ended"));

    let lobby = registry.get(&code).unwrap();
    assert_eq!(lobby.phase(), Phase::Playing);
    assert_eq!(lobby.turn_order(), &[A, B]);
    assert_eq!(lobby.current_player_id(), Some(A));
    assert!(lobby.players().iter().all(|p| p.banked == 0));
    assert_eq!(lobby.cup().available(), TOTAL_DICE);
}

#[test]
fn current_player_disconnects_mid_turn() {
    let (mut registry, code) = setup(&[(A, "A"), (B, "B"), (C, "C")], vec![]);
    registry.start(&code, A).unwrap();
    registry.roll(&code, A).unwrap();

    let departure = registry.leave(A).unwrap();
    assert!(!departure.removed);
    assert_eq!(departure.room, vec![B, C]);
    assert_eq!(departure.outbox.names(), vec!["player_left", "turn_started"]);

    let lobby = registry.get(&code).unwrap();
    assert_eq!(lobby.current_player_id(), Some(B));
    assert_eq!(lobby.turn_order(), &[B, C]);
    assert!(lobby.get_player(A).is_none());
    assert_eq!(lobby.host_id(), Some(B));
    assert_eq!(banked(&registry, &code, B), 0);
    assert!(lobby.dice_conserved());
    assert_eq!(registry.code_for(A), None);
}

#[test]
fn spectator_seated_after_win() {
    let (mut registry, code) = setup(&[(A, "A"), (B, "B")], vec![]);
    registry.start(&code, A).unwrap();

    let (role, outbox) = registry.join(&code, C, "A").unwrap();
    assert_eq!(role, JoinRole::Spectator);
    assert_eq!(outbox.names(), vec!["spectator_joined", "spectator_count_update"]);
    assert_eq!(registry.get(&code).unwrap().spectators()[0].name, "A 2");

    // Five all-brain rolls: 15 brains
    for _ in 0..5 {
        registry.roll(&code, A).unwrap();
    }

    let lobby = registry.get(&code).unwrap();
    assert_eq!(lobby.turn_order(), &[A, B, C]);
    assert_eq!(lobby.spectator_count(), 0);
    assert_eq!(lobby.phase(), Phase::Playing);
}

#[test]
fn stale_requests_change_nothing() {
    let (mut registry, code) = setup(&[(A, "A"), (B, "B")], vec![]);

    // Before the game starts
    assert!(registry.roll(&code, A).unwrap_err().is_silent());

    registry.start(&code, A).unwrap();
    registry.roll(&code, A).unwrap();
    let before = registry.get(&code).unwrap().snapshot();

    assert!(registry.roll(&code, B).unwrap_err().is_silent());
    assert!(registry.end_turn(&code, B, true).unwrap_err().is_silent());
    assert!(registry.roll(&code, 42).unwrap_err().is_silent());

    assert_eq!(registry.get(&code).unwrap().snapshot(), before);
}
