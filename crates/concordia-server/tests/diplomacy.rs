//! Integration tests for treaty handling through the turn controller.

use concordia_protocol::{DiplState, Notification, PlayerId, RejectReason, TileId, TreatyAction};
use concordia_server::config::CascadePolicy;
use concordia_server::{GameConfig, HeadlessWorld, TurnController};

const A: PlayerId = PlayerId(0);
const B: PlayerId = PlayerId(1);
const C: PlayerId = PlayerId(2);

/// Running game of `n` AI players, each with one city at tile `id * 100`.
fn running_game(n: u8, config: GameConfig) -> TurnController<HeadlessWorld> {
    let mut world = HeadlessWorld::new();
    for i in 0..n {
        world.add_city(PlayerId(i), TileId(u32::from(i) * 100));
    }
    let mut game = TurnController::new(config, world);
    for i in 0..n {
        game.create_player(format!("AI {}", i + 1), true, None).unwrap();
    }
    game.start_game(true).unwrap();
    game.drain_notifications();
    game
}

/// Expired cease-fire between two allies of C: C drops the higher id
#[tokio::test]
async fn expired_ceasefire_cancels_one_alliance() {
    let mut game = running_game(3, GameConfig::default());
    let table = game.diplomacy_mut();
    table.set_pair(A, B, DiplState::Ceasefire, 1);
    table.set_pair(A, C, DiplState::Alliance, 0);
    table.set_pair(B, C, DiplState::Alliance, 0);

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::War);
    assert_eq!(game.diplomacy().pact(A, C), DiplState::Alliance);
    assert_eq!(game.diplomacy().pact(C, B), DiplState::Armistice);
    assert_eq!(game.diplomacy().state(B, C).auto_cancel_turn, Some(1));
    let remapped = game.hooks().calls_to("recompute_city_map");
    assert!(remapped.contains(&A) && remapped.contains(&B));
}

#[tokio::test]
async fn cancel_both_policy_drops_every_alliance() {
    let mut config = GameConfig::default();
    config.diplomacy.cascade = CascadePolicy::CancelBoth;
    let mut game = running_game(3, config);
    let table = game.diplomacy_mut();
    table.set_pair(A, B, DiplState::Ceasefire, 1);
    table.set_pair(A, C, DiplState::Alliance, 0);
    table.set_pair(B, C, DiplState::Alliance, 0);

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, C), DiplState::Armistice);
    assert_eq!(game.diplomacy().pact(B, C), DiplState::Armistice);
}

#[tokio::test]
async fn ceasefire_warns_a_turn_ahead() {
    let mut game = running_game(2, GameConfig::default());
    game.diplomacy_mut().set_pair(A, B, DiplState::Ceasefire, 2);

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::Ceasefire);
    assert!(game
        .drain_notifications()
        .contains(&Notification::CeasefireExpiring { a: A, b: B }));
}

/// Armistice turning into peace removes military units from the other side's land
#[tokio::test]
async fn armistice_expiry_disbands_intruders() {
    let mut game = running_game(2, GameConfig::default());
    game.diplomacy_mut().set_pair(A, B, DiplState::Armistice, 1);
    let world = game.hooks_mut();
    let intruder = world.spawn_unit(A, TileId(100), true).unwrap();
    let settler = world.spawn_unit(A, TileId(100), false).unwrap();
    let garrison = world.spawn_unit(A, TileId(0), true).unwrap();

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::Peace);
    assert!(!game.hooks().has_unit(intruder));
    assert!(game.hooks().has_unit(settler));
    assert!(game.hooks().has_unit(garrison));
    assert!(game.drain_notifications().contains(&Notification::UnitsDisbanded {
        owner: A,
        territory_of: B,
        count: 1,
    }));
}

#[tokio::test]
async fn peace_needs_both_signatures() {
    let mut game = running_game(2, GameConfig::default());
    let handle = game.input_handle();
    handle.treaty_action(A, B, TreatyAction::SignPeace);

    game.run_turn(true).await.unwrap();
    assert_eq!(game.diplomacy().pact(A, B), DiplState::War);
    assert!(game.diplomacy().has_proposal(A, B, TreatyAction::SignPeace));

    handle.treaty_action(B, A, TreatyAction::SignPeace);
    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::Armistice);
    // Signed on turn 2 and counted down once at its end.
    assert_eq!(game.diplomacy().state(A, B).turns_left, 15);
}

#[tokio::test]
async fn illegal_treaty_is_refused_to_the_sender() {
    let mut game = running_game(2, GameConfig::default());
    game.input_handle()
        .treaty_action(A, B, TreatyAction::ProposeAlliance);

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::War);
    let refused = game.drain_notifications().into_iter().any(|n| {
        matches!(
            n,
            Notification::InputRejected {
                player: Some(A),
                reason: RejectReason::TreatyRefused { .. },
            }
        )
    });
    assert!(refused);
}

#[tokio::test]
async fn ai_declaring_war_breaks_the_treaty() {
    let mut game = running_game(2, GameConfig::default());
    game.diplomacy_mut().set_pair(A, B, DiplState::Peace, 0);
    game.hooks_mut()
        .script_diplomacy(A, vec![(B, TreatyAction::DeclareWar)]);

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::War);
    let notes = game.drain_notifications();
    assert!(notes.contains(&Notification::TreatyBroken {
        breaker: A,
        victim: B
    }));
    // The victim may cancel its own pacts without penalty for a while.
    assert!(game.diplomacy().state(B, A).has_reason_to_cancel > 0);
}

#[tokio::test]
async fn teammates_cannot_change_their_pact() {
    let mut world = HeadlessWorld::new();
    world.add_city(A, TileId(0));
    world.add_city(B, TileId(100));
    let mut game = TurnController::new(GameConfig::default(), world);
    let team = concordia_protocol::TeamId(0);
    game.create_player("AI 1", true, Some(team)).unwrap();
    game.create_player("AI 2", true, Some(team)).unwrap();
    game.start_game(true).unwrap();
    game.input_handle()
        .treaty_action(A, B, TreatyAction::DeclareWar);

    game.run_turn(true).await.unwrap();

    assert_eq!(game.diplomacy().pact(A, B), DiplState::Team);
}
