use crate::actions::VALIDATION_FAILED;
use crate::ai::{AdaptiveAi, BehaviorSystem, PersonalityTraits};
use crate::climate::{ClimateConfig, WeatherCondition, WeatherReport};
use crate::config::GameConfig;
use crate::events::{ChannelEventSink, EventPayload};
use crate::input::{ActionParams, CombatType, DiplomacyOp, GameAction};
use crate::session::{GameSession, SessionError};
use crate::state::{AllianceTerms, RegionState, ResourceKind, Resources, Timestamp, UnitId};
use crate::units::{Position, UnitError, UnitType};
use crate::world_events::EventManagerConfig;

const P1: &str = "player1";
const P2: &str = "player2";

fn t(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

fn stock() -> Resources {
    Resources {
        energy: 1000.0,
        materials: 100.0,
        technology: 1.0,
        intelligence: 100.0,
        morale: 100.0,
    }
}

fn calm_world_events() -> EventManagerConfig {
    EventManagerConfig {
        base_probability: 0.0,
        turn_scaling: 0.0,
        ..Default::default()
    }
}

fn calm_climate() -> ClimateConfig {
    ClimateConfig {
        weather_change_probability: 0.0,
        disaster_probability: 0.0,
        ..Default::default()
    }
}

/// Two players with a home region each, a neutral region, six infantry for
/// player1 and two for player2. No random world or climate events.
fn session() -> GameSession {
    let mut s = GameSession::new("game1", GameConfig::default())
        .unwrap()
        .with_world_events(calm_world_events())
        .with_climate(calm_climate());
    s.add_player(P1, stock()).unwrap();
    s.add_player(P2, stock()).unwrap();
    s.add_region("home1", RegionState::default(), Some(P1)).unwrap();
    s.add_region("home2", RegionState::default(), Some(P2)).unwrap();
    s.add_region("wilds", RegionState::default(), None).unwrap();
    for _ in 0..6 {
        s.spawn_unit(P1, UnitType::Infantry, Position::default()).unwrap();
    }
    for _ in 0..2 {
        s.spawn_unit(P2, UnitType::Infantry, Position::default()).unwrap();
    }
    s
}

fn act(s: &GameSession, player: &str, params: ActionParams) -> GameAction {
    GameAction::new("game1", player, s.cycle(), params, t(0))
}

fn attack_with_all(s: &GameSession, player: &str, target: &str) -> GameAction {
    let units: Vec<UnitId> = s.player(player).unwrap().units.iter().copied().collect();
    act(
        s,
        player,
        ActionParams::Combat {
            combat_type: CombatType::Attack,
            target_territory_id: target.into(),
            attacking_units: units,
        },
    )
}

fn diplomacy(s: &GameSession, player: &str, op: DiplomacyOp, target: &str) -> GameAction {
    act(
        s,
        player,
        ActionParams::Diplomacy {
            op,
            target_player_id: target.into(),
            terms: Some(AllianceTerms {
                resource_sharing: true,
                mutual_defense: true,
                trading_bonus: None,
            }),
        },
    )
}

fn collect(s: &GameSession, player: &str, territory: &str) -> GameAction {
    act(
        s,
        player,
        ActionParams::CollectResource {
            resource_type: ResourceKind::Energy,
            territory_id: territory.into(),
            amount: 10.0,
        },
    )
}

// =========================================================================
// Combat and territory
// =========================================================================

#[test]
fn test_capture_moves_territory_between_players() {
    let mut s = session();

    // 6 units * 10 * 1.05 = 63 strength, one unit lost
    let result = s.submit(attack_with_all(&s, P1, "home2")).unwrap();
    assert!(result.success, "{:?}", result.error);

    let p1 = s.player(P1).unwrap();
    let p2 = s.player(P2).unwrap();
    assert!(p1.owns_territory("home2"));
    assert!(!p2.owns_territory("home2"));
    assert_eq!(s.territory_owners()["home2"], P1);
    assert_eq!(p1.units.len(), 5);
    assert_eq!(s.units().len(), 7);
    assert_eq!(p1.turns_remaining, 48);
    assert_eq!(s.diplomacy().relation(P1, P2).unwrap().conflict_count, 1);
}

#[test]
fn test_neutral_capture_records_no_conflict() {
    let mut s = session();
    let result = s.submit(attack_with_all(&s, P1, "wilds")).unwrap();
    assert!(result.success);
    assert_eq!(s.territory_owners()["wilds"], P1);
    assert!(s.diplomacy().relation(P1, P2).is_none());
}

#[test]
fn test_attack_on_unknown_territory_is_rejected() {
    let mut s = session();
    let before = s.player(P1).unwrap().clone();

    let result = s.submit(attack_with_all(&s, P1, "atlantis")).unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(VALIDATION_FAILED));
    assert_eq!(s.player(P1).unwrap(), &before);
    assert_eq!(s.metrics().actions_rejected, 1);
}

#[test]
fn test_unknown_player_is_an_error() {
    let mut s = session();
    let action = collect(&s, "ghost", "home1");
    assert!(matches!(s.submit(action), Err(SessionError::UnknownPlayer(_))));
}

// =========================================================================
// Diplomacy
// =========================================================================

#[test]
fn test_alliance_lifecycle_mirrors_both_players() {
    let mut s = session();
    s.diplomacy_mut().modify_trust(P1, P2, 60.0, t(0));

    let proposed = s.submit(diplomacy(&s, P1, DiplomacyOp::ProposeAlliance, P2)).unwrap();
    assert!(proposed.success, "{:?}", proposed.error);
    assert!(s.player(P1).unwrap().has_pending_with(P2));
    assert!(s.player(P2).unwrap().has_pending_with(P1));

    let accepted = s.submit(diplomacy(&s, P2, DiplomacyOp::AcceptAlliance, P1)).unwrap();
    assert!(accepted.success, "{:?}", accepted.error);
    let (p1, p2) = (s.player(P1).unwrap(), s.player(P2).unwrap());
    assert!(p1.is_allied_with(P2));
    assert!(p2.is_allied_with(P1));
    assert!(p1.pending_alliances.is_empty());
    assert!(p2.pending_alliances.is_empty());
    // Shared resources plus the acceptance morale bonus
    assert_eq!(p2.resources.energy, 1100.0);
    assert_eq!(p2.resources.morale, 110.0);
    assert!(s.diplomacy().are_allies(P1, P2));

    let broken = s.submit(diplomacy(&s, P1, DiplomacyOp::BreakAlliance, P2)).unwrap();
    assert!(broken.success);
    assert!(!s.player(P1).unwrap().is_allied_with(P2));
    assert!(!s.player(P2).unwrap().is_allied_with(P1));
    assert!(!s.diplomacy().are_allies(P1, P2));
}

#[test]
fn test_proposal_needs_trust() {
    let mut s = session();
    let result = s.submit(diplomacy(&s, P1, DiplomacyOp::ProposeAlliance, P2)).unwrap();
    assert!(!result.success);
    assert!(s.player(P2).unwrap().pending_alliances.is_empty());
}

#[test]
fn test_proposer_cannot_accept_own_offer() {
    let mut s = session();
    s.diplomacy_mut().modify_trust(P1, P2, 60.0, t(0));
    s.submit(diplomacy(&s, P1, DiplomacyOp::ProposeAlliance, P2)).unwrap();

    let result = s.submit(diplomacy(&s, P1, DiplomacyOp::AcceptAlliance, P2)).unwrap();
    assert!(!result.success);
    assert!(!s.player(P1).unwrap().is_allied_with(P2));
}

#[test]
fn test_accept_without_proposal_is_rejected() {
    let mut s = session();
    let result = s.submit(diplomacy(&s, P2, DiplomacyOp::AcceptAlliance, P1)).unwrap();
    assert!(!result.success);
}

// =========================================================================
// Turn loop
// =========================================================================

#[test]
fn test_end_turn_credits_production_and_resets_budget() {
    let mut s = session();
    s.submit(collect(&s, P1, "home1")).unwrap();
    assert_eq!(s.player(P1).unwrap().turns_remaining, 49);

    s.end_turn(t(1_000));

    let p1 = s.player(P1).unwrap();
    // 1000 + 10 collected + 20 produced by home1
    assert_eq!(p1.resources.energy, 1030.0);
    assert_eq!(p1.resources.materials, 120.0);
    assert_eq!(p1.turns_remaining, 50);
    assert_eq!(s.cycle(), 2);
    assert_eq!(s.metrics().turns, 1);
}

#[test]
fn test_climate_effect_scales_production_without_compounding() {
    let mut s = session();
    let report = WeatherReport {
        condition: WeatherCondition::Clear,
        severity: 0.5,
        duration_secs: 3600,
        effects: [(ResourceKind::Energy, -0.5)].into_iter().collect(),
    };
    let events = s
        .climate()
        .lock()
        .unwrap()
        .ingest_conditions(&[report], &["home1".to_string()], t(0));
    assert_eq!(events.len(), 1);

    s.end_turn(t(1_000));
    s.end_turn(t(2_000));

    assert_eq!(s.player(P1).unwrap().resources.energy, 1020.0);
    assert_eq!(s.player(P2).unwrap().resources.energy, 1040.0);
    assert_eq!(s.regions()["home1"].production.energy, 20.0);
}

#[test]
fn test_world_events_hit_region_owner() {
    let mut s = GameSession::new("game1", GameConfig::default())
        .unwrap()
        .with_world_events(EventManagerConfig {
            base_probability: 1.0,
            turn_scaling: 0.0,
            ..Default::default()
        })
        .with_climate(calm_climate());
    s.add_player(P1, stock()).unwrap();
    s.add_player(P2, stock()).unwrap();
    s.add_region("home1", RegionState::default(), Some(P1)).unwrap();

    s.end_turn(t(1_000));

    assert_eq!(s.world_events().active_events().len(), 5);
    // -30 from disaster and crisis, +20 production
    assert_eq!(s.player(P1).unwrap().resources.materials, 90.0);
    assert_eq!(s.player(P2).unwrap().resources.materials, 100.0);
    let published = s.drain_events();
    assert_eq!(
        published
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::WorldEvent { .. }))
            .count(),
        5
    );
}

#[test]
fn test_finished_session_refuses_actions() {
    let mut s = session();
    s.finish();
    let action = collect(&s, P1, "home1");
    assert!(matches!(s.submit(action), Err(SessionError::Finished(_))));
}

#[test]
fn test_sinks_receive_published_events() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut s = session();
    s.register_sink(Box::new(ChannelEventSink::new(tx)));

    s.submit(collect(&s, P1, "home1")).unwrap();

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert!(matches!(
        received[0].payload,
        EventPayload::ActionResolved { success: true, .. }
    ));
    assert_eq!(s.drain_events().len(), 1);
    assert!(s.drain_events().is_empty());
}

// =========================================================================
// Units
// =========================================================================

#[test]
fn test_ability_charges_owner_once() {
    let mut s = session();
    let unit = *s.player(P1).unwrap().units.iter().next().unwrap();

    let used = s.use_ability(P1, unit, "entrench", &[unit]).unwrap();
    assert_eq!(used.affected, vec![unit]);
    assert_eq!(s.player(P1).unwrap().resources.morale, 99.0);

    let again = s.use_ability(P1, unit, "entrench", &[unit]);
    assert!(matches!(
        again,
        Err(SessionError::Unit(UnitError::OnCooldown { .. }))
    ));
    assert_eq!(s.player(P1).unwrap().resources.morale, 99.0);
}

#[test]
fn test_ability_requires_ownership() {
    let mut s = session();
    let unit = *s.player(P1).unwrap().units.iter().next().unwrap();
    assert!(matches!(
        s.use_ability(P2, unit, "entrench", &[]),
        Err(SessionError::NotOwner { .. })
    ));
}

// =========================================================================
// AI
// =========================================================================

fn traits(diplomacy: f64, economics: f64) -> PersonalityTraits {
    PersonalityTraits {
        aggression: 0.1,
        expansion: 0.1,
        technology: 0.1,
        diplomacy,
        economics,
        adaptation: 0.1,
    }
}

#[test]
fn test_ai_turn_respects_action_budget() {
    let mut s = session();
    let ai = AdaptiveAi::new(s.config().combat.clone()).with_actions_per_cycle(3);
    s.seat_ai_with(
        BehaviorSystem::with_personality(P1, traits(0.1, 0.9), 7),
        Box::new(ai),
    )
    .unwrap();

    let taken = s.take_ai_turn(P1, t(0)).unwrap();
    assert_eq!(taken, 3);
    assert_eq!(s.player(P1).unwrap().turns_remaining, 47);
}

#[test]
fn test_ai_accepts_incoming_proposal() {
    let mut s = session();
    s.diplomacy_mut().modify_trust(P1, P2, 60.0, t(0));
    let ai = AdaptiveAi::new(s.config().combat.clone());
    s.seat_ai_with(
        BehaviorSystem::with_personality(P2, traits(0.9, 0.5), 7),
        Box::new(ai),
    )
    .unwrap();
    s.submit(diplomacy(&s, P1, DiplomacyOp::ProposeAlliance, P2)).unwrap();

    let view = s.visible_state(P2).unwrap();
    assert_eq!(view.incoming_proposals, vec![P1.to_string()]);

    s.take_ai_turn(P2, t(0)).unwrap();
    assert!(s.player(P1).unwrap().is_allied_with(P2));
    assert!(s.player(P2).unwrap().is_allied_with(P1));
}

#[test]
fn test_human_players_have_no_view() {
    let s = session();
    assert!(matches!(
        s.visible_state(P1),
        Err(SessionError::NotAiControlled(_))
    ));
}

#[test]
fn test_summary_ranks_by_territory() {
    let mut s = session();
    s.submit(attack_with_all(&s, P1, "wilds")).unwrap();
    let summary = s.summary();
    assert_eq!(summary[0].player_id, P1);
    assert_eq!(summary[0].territories, 2);
    assert_eq!(summary[1].territories, 1);
}
