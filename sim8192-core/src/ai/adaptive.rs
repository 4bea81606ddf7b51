use crate::actions::resolve_combat;
use crate::ai::{AiPlayer, Strategy, TerritoryPreference, VisibleGameState};
use crate::config::CombatConfig;
use crate::input::{ActionParams, CombatType, DiplomacyOp};

/// Actions an adaptive player takes per cycle before passing.
pub const DEFAULT_ACTIONS_PER_CYCLE: u32 = 5;

/// Deterministic AI steered by the player's current behaviour pattern.
///
/// Each call scores every candidate and returns the single best one with a
/// positive score. Strategy ranks dominate, personality weights break ties
/// within a strategy.
pub struct AdaptiveAi {
    combat: CombatConfig,
    actions_per_cycle: u32,
    cycle: u32,
    taken: u32,
}

impl AdaptiveAi {
    pub fn new(combat: CombatConfig) -> Self {
        Self {
            combat,
            actions_per_cycle: DEFAULT_ACTIONS_PER_CYCLE,
            cycle: 0,
            taken: 0,
        }
    }

    pub fn with_actions_per_cycle(mut self, actions: u32) -> Self {
        self.actions_per_cycle = actions;
        self
    }

    fn strategy_bonus(view: &VisibleGameState, strategies: &[Strategy]) -> i32 {
        let pattern = &view.pattern;
        if strategies.contains(&pattern.primary_strategy) {
            3000
        } else if strategies.contains(&pattern.secondary_strategy) {
            2000
        } else {
            0
        }
    }

    fn weight(value: f64) -> i32 {
        (value * 1000.0) as i32
    }

    fn score(&self, action: &ActionParams, view: &VisibleGameState) -> i32 {
        let p = &view.personality;
        match action {
            ActionParams::CollectResource { resource_type, .. } => {
                let rank = view
                    .pattern
                    .resource_priority
                    .iter()
                    .position(|r| r == resource_type)
                    .unwrap_or(view.pattern.resource_priority.len());
                Self::strategy_bonus(view, &[Strategy::Economic])
                    + Self::weight(p.economics)
                    + (5 - rank as i32) * 100
            }

            ActionParams::Research { .. } => {
                Self::strategy_bonus(view, &[Strategy::Research]) + Self::weight(p.technology)
            }

            ActionParams::Combat {
                combat_type: CombatType::Attack,
                attacking_units,
                ..
            } => {
                let outcome =
                    resolve_combat(&self.combat, attacking_units, view.player.resources.technology);
                if !outcome.success {
                    return -1000; // Would only bleed units
                }
                let preference = match view.pattern.territory_preference {
                    TerritoryPreference::Aggressive => 500,
                    TerritoryPreference::Defensive => -500,
                    TerritoryPreference::Opportunistic => 0,
                };
                Self::strategy_bonus(view, &[Strategy::Attack, Strategy::Move])
                    + Self::weight(p.aggression.max(p.expansion))
                    + preference
            }

            ActionParams::Combat {
                combat_type: CombatType::Defend,
                ..
            } => match view.pattern.territory_preference {
                TerritoryPreference::Defensive => 300,
                _ => -100,
            },

            ActionParams::Diplomacy {
                op,
                target_player_id,
                ..
            } => {
                let gap = view.ai_trust(target_player_id) - view.pattern.alliance_threshold;
                match op {
                    DiplomacyOp::ProposeAlliance => {
                        Self::strategy_bonus(view, &[Strategy::Diplomatic])
                            + Self::weight(p.diplomacy)
                            + (gap * 20.0) as i32
                    }
                    DiplomacyOp::AcceptAlliance => {
                        Self::strategy_bonus(view, &[Strategy::Diplomatic])
                            + Self::weight(p.diplomacy)
                            + (gap * 20.0) as i32
                            + 500
                    }
                    DiplomacyOp::BreakAlliance => {
                        (-gap * 20.0) as i32 + Self::weight(p.aggression) / 2
                    }
                }
            }
        }
    }
}

impl AiPlayer for AdaptiveAi {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn decide(
        &mut self,
        view: &VisibleGameState,
        candidates: &[ActionParams],
    ) -> Vec<ActionParams> {
        if view.cycle != self.cycle {
            self.cycle = view.cycle;
            self.taken = 0;
        }
        if candidates.is_empty() || self.taken >= self.actions_per_cycle {
            return vec![];
        }

        let mut best = None;
        let mut best_score = i32::MIN;
        for candidate in candidates {
            let score = self.score(candidate, view);
            if score > best_score && score > 0 {
                best_score = score;
                best = Some(candidate);
            }
        }

        match best {
            Some(action) => {
                self.taken += 1;
                vec![action.clone()]
            }
            None => vec![],
        }
    }
}
