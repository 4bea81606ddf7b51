//! AI decision-making subsystem
//!
//! Two halves:
//!
//! - [`BehaviorSystem`] keeps a player's personality and learns from the
//!   events it is shown. It decides nothing by itself.
//! - [`AiPlayer`] implementations pick actions. They see a
//!   [`VisibleGameState`] (which carries the current [`BehaviorPattern`]) and
//!   the finite list of legal candidates produced by [`available_actions`].
//!
//! Choosing from an enumerated list means an AI can never produce a
//! malformed action, only one the registry later rejects.
//!
//! # Determinism
//!
//! Every implementation is seeded. Same seed and same inputs give the same
//! decisions.

pub mod adaptive;
pub mod behavior;

pub use adaptive::AdaptiveAi;
pub use behavior::{
    AiActivityMetrics, BehaviorPattern, BehaviorSystem, PersonalityTraits, Strategy,
    TerritoryPreference, Trait, TrustDirection,
};

use crate::config::GameConfig;
use crate::input::{ActionParams, CombatType, DiplomacyOp, TechnologyType};
use crate::state::{PlayerId, PlayerState, ResourceKind, TerritoryId};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Amount requested by generated collection candidates.
pub const COLLECT_AMOUNT: f64 = 10.0;
/// Upper bound on a generated research investment.
pub const MAX_RESEARCH_INVESTMENT: f64 = 100.0;
/// Private trust below which breaking an alliance becomes a candidate.
pub const BREAK_TRUST_THRESHOLD: f64 = 25.0;

/// What one AI player can see when deciding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibleGameState {
    pub player_id: PlayerId,
    pub cycle: u32,
    pub player: PlayerState,
    pub territory_owners: BTreeMap<TerritoryId, PlayerId>,
    pub known_players: Vec<PlayerId>,
    /// Shared diplomatic trust, -100..=100.
    pub diplomatic_trust: BTreeMap<PlayerId, f64>,
    /// The AI's private trust, 0..=100.
    pub ai_trust: BTreeMap<PlayerId, f64>,
    pub personality: PersonalityTraits,
    pub pattern: BehaviorPattern,
    /// Players whose alliance proposal to us is still open.
    pub incoming_proposals: Vec<PlayerId>,
}

impl VisibleGameState {
    pub fn diplomatic_trust(&self, other: &str) -> f64 {
        self.diplomatic_trust.get(other).copied().unwrap_or(0.0)
    }

    pub fn ai_trust(&self, other: &str) -> f64 {
        self.ai_trust.get(other).copied().unwrap_or(50.0)
    }
}

/// AI decision-making trait.
///
/// Called repeatedly within a cycle; returning an empty list passes for the
/// rest of it.
pub trait AiPlayer: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide(&mut self, view: &VisibleGameState, candidates: &[ActionParams])
        -> Vec<ActionParams>;
}

/// Enumerate the candidate actions worth offering an AI this step.
///
/// Candidates respect the player's own state (turns, energy, ownership,
/// alliance bookkeeping). Checks that need shared state, such as the
/// diplomatic trust gate, are approximated from the view.
pub fn available_actions(view: &VisibleGameState, config: &GameConfig) -> Vec<ActionParams> {
    let player = &view.player;
    let turns = player.turns_remaining;
    let mut out = Vec::new();
    if turns == 0 {
        return out;
    }

    if turns >= config.resources.collection_cost {
        for territory in &player.territories {
            for resource in ResourceKind::ALL {
                out.push(ActionParams::CollectResource {
                    resource_type: resource,
                    territory_id: territory.clone(),
                    amount: COLLECT_AMOUNT,
                });
            }
        }
    }

    let investment = player.resources.energy.min(MAX_RESEARCH_INVESTMENT);
    if turns >= config.technology.research_cost
        && investment > 0.0
        && player.resources.technology < config.technology.max_tech_level
    {
        for technology_type in [
            TechnologyType::Military,
            TechnologyType::Economic,
            TechnologyType::Intelligence,
        ] {
            out.push(ActionParams::Research {
                technology_type,
                investment_amount: investment,
            });
        }
    }

    let units: Vec<_> = player.units.iter().copied().collect();
    let energy_needed = units.len() as f64 * config.combat.energy_per_unit;
    if !units.is_empty() && player.resources.energy >= energy_needed {
        if turns >= config.combat.base_attack_cost {
            for (territory, owner) in &view.territory_owners {
                if *owner == view.player_id || player.is_allied_with(owner) {
                    continue;
                }
                out.push(ActionParams::Combat {
                    combat_type: CombatType::Attack,
                    target_territory_id: territory.clone(),
                    attacking_units: units.clone(),
                });
            }
        }
        if turns >= config.combat.base_defend_cost {
            if let Some(home) = player.territories.iter().next() {
                out.push(ActionParams::Combat {
                    combat_type: CombatType::Defend,
                    target_territory_id: home.clone(),
                    attacking_units: units.clone(),
                });
            }
        }
    }

    if turns >= config.diplomacy.alliance_formation_cost {
        let has_room = player.alliances.len() < config.diplomacy.max_alliance_size;
        for other in &view.known_players {
            if *other == view.player_id {
                continue;
            }
            let diplomacy = |op| ActionParams::Diplomacy {
                op,
                target_player_id: other.clone(),
                terms: None,
            };
            if player.is_allied_with(other) {
                if view.ai_trust(other) < BREAK_TRUST_THRESHOLD {
                    out.push(diplomacy(DiplomacyOp::BreakAlliance));
                }
            } else if view.incoming_proposals.contains(other) {
                if has_room {
                    out.push(diplomacy(DiplomacyOp::AcceptAlliance));
                }
            } else if has_room
                && !player.has_pending_with(other)
                && view.diplomatic_trust(other) >= config.diplomacy.alliance_trust_threshold
            {
                out.push(diplomacy(DiplomacyOp::ProposeAlliance));
            }
        }
    }

    out
}

/// Random AI that picks valid actions at random
pub struct RandomAi {
    rng: rand::rngs::StdRng,
}

impl RandomAi {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }
}

impl AiPlayer for RandomAi {
    fn name(&self) -> &'static str {
        "random"
    }

    fn decide(
        &mut self,
        _view: &VisibleGameState,
        candidates: &[ActionParams],
    ) -> Vec<ActionParams> {
        if candidates.is_empty() {
            return vec![];
        }

        // 50% chance to act at all
        if self.rng.gen::<bool>() {
            if let Some(action) = candidates.choose(&mut self.rng) {
                return vec![action.clone()];
            }
        }

        vec![]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::PlayerStateBuilder;

    pub(crate) fn view(player: PlayerState) -> VisibleGameState {
        let personality = PersonalityTraits {
            aggression: 0.5,
            expansion: 0.5,
            technology: 0.5,
            diplomacy: 0.5,
            economics: 0.5,
            adaptation: 0.5,
        };
        let mut territory_owners = BTreeMap::new();
        for t in &player.territories {
            territory_owners.insert(t.clone(), "player1".to_string());
        }
        territory_owners.insert("enemy_land".into(), "player2".into());
        VisibleGameState {
            player_id: "player1".into(),
            cycle: 1,
            player,
            territory_owners,
            known_players: vec!["player1".into(), "player2".into()],
            diplomatic_trust: BTreeMap::new(),
            ai_trust: BTreeMap::new(),
            pattern: BehaviorPattern::from_personality(&personality),
            personality,
            incoming_proposals: vec![],
        }
    }

    fn count(candidates: &[ActionParams], pred: impl Fn(&ActionParams) -> bool) -> usize {
        candidates.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_no_turns_no_candidates() {
        let v = view(PlayerStateBuilder::new().turns_remaining(0).build());
        assert!(available_actions(&v, &GameConfig::default()).is_empty());
    }

    #[test]
    fn test_candidates_cover_every_kind() {
        let v = view(PlayerStateBuilder::new().build());
        let candidates = available_actions(&v, &GameConfig::default());

        // One territory, five resources
        assert_eq!(
            count(&candidates, |c| matches!(
                c,
                ActionParams::CollectResource { .. }
            )),
            5
        );
        assert_eq!(
            count(&candidates, |c| matches!(c, ActionParams::Research { .. })),
            3
        );
        assert!(candidates.contains(&ActionParams::Combat {
            combat_type: CombatType::Attack,
            target_territory_id: "enemy_land".into(),
            attacking_units: vec![crate::state::UnitId(1), crate::state::UnitId(2)],
        }));
        // Trust 0 is below the alliance gate
        assert_eq!(
            count(&candidates, |c| matches!(c, ActionParams::Diplomacy { .. })),
            0
        );
    }

    #[test]
    fn test_no_attack_without_energy() {
        let v = view(PlayerStateBuilder::new().energy(5.0).build());
        let candidates = available_actions(&v, &GameConfig::default());
        assert_eq!(
            count(&candidates, |c| matches!(c, ActionParams::Combat { .. })),
            0
        );
        match candidates
            .iter()
            .find(|c| matches!(c, ActionParams::Research { .. }))
        {
            Some(ActionParams::Research {
                investment_amount, ..
            }) => assert_eq!(*investment_amount, 5.0),
            other => panic!("expected research candidate, got {other:?}"),
        }
    }

    #[test]
    fn test_diplomacy_candidates() {
        let mut v = view(PlayerStateBuilder::new().build());
        v.diplomatic_trust.insert("player2".into(), 60.0);
        let candidates = available_actions(&v, &GameConfig::default());
        assert!(candidates.contains(&ActionParams::Diplomacy {
            op: DiplomacyOp::ProposeAlliance,
            target_player_id: "player2".into(),
            terms: None,
        }));

        v.incoming_proposals.push("player2".into());
        let candidates = available_actions(&v, &GameConfig::default());
        assert!(candidates.contains(&ActionParams::Diplomacy {
            op: DiplomacyOp::AcceptAlliance,
            target_player_id: "player2".into(),
            terms: None,
        }));
    }

    #[test]
    fn test_break_only_when_distrusted() {
        let mut v = view(PlayerStateBuilder::new().allied_with("player2").build());
        let is_break = |c: &ActionParams| {
            matches!(
                c,
                ActionParams::Diplomacy {
                    op: DiplomacyOp::BreakAlliance,
                    ..
                }
            )
        };
        let config = GameConfig::default();
        assert_eq!(count(&available_actions(&v, &config), is_break), 0);

        v.ai_trust.insert("player2".into(), 10.0);
        assert_eq!(count(&available_actions(&v, &config), is_break), 1);
        // Allies are not attack targets
        assert_eq!(
            count(&available_actions(&v, &config), |c| matches!(
                c,
                ActionParams::Combat {
                    combat_type: CombatType::Attack,
                    ..
                }
            )),
            0
        );
    }

    #[test]
    fn random_ai_smoke_test() {
        let mut ai = RandomAi::new(12345);
        let v = view(PlayerStateBuilder::new().build());
        assert!(ai.decide(&v, &[]).is_empty());

        let candidates = available_actions(&v, &GameConfig::default());
        let picks: Vec<_> = (0..50).map(|_| ai.decide(&v, &candidates)).collect();
        assert!(picks.iter().all(|p| p.len() <= 1));
        assert!(picks.iter().any(|p| p.len() == 1));
        assert!(picks
            .iter()
            .flatten()
            .all(|p| candidates.contains(p)));
    }
}
