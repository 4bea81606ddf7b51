use super::{remaining_turns, ActionError, ActionHandler};
use crate::config::CombatConfig;
use crate::events::{EventPayload, GameEvent};
use crate::input::{
    ActionKind, ActionParams, CombatType, GameAction, GameActionContext, GameActionResult,
    PlayerChanges,
};
use crate::state::{ResourceKind, UnitId};
use std::collections::BTreeSet;

/// Deterministic result of one engagement.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatOutcome {
    pub success: bool,
    pub total_strength: f64,
    /// Attacking units lost, taken from the front of the attack order.
    pub destroyed_units: Vec<UnitId>,
    pub energy_cost: f64,
    pub materials_cost: f64,
}

/// Resolve an engagement from unit count and technology alone.
///
/// `strength = units * strength_per_unit * (1 + technology * tech_strength_factor)`;
/// the attack holds when strength reaches `min_attack_strength`.
pub fn resolve_combat(
    config: &CombatConfig,
    attacking_units: &[UnitId],
    technology: f64,
) -> CombatOutcome {
    let count = attacking_units.len();
    let base_strength = count as f64 * config.strength_per_unit;
    let modifier = 1.0 + technology * config.tech_strength_factor;
    let total_strength = base_strength * modifier;
    let success = total_strength >= config.min_attack_strength;

    let loss_ratio = if success {
        config.success_loss_ratio
    } else {
        config.failure_loss_ratio
    };
    let lost = ((count as f64 * loss_ratio).floor() as usize).min(count);
    let destroyed_units = attacking_units[..lost].to_vec();

    CombatOutcome {
        success,
        total_strength,
        energy_cost: count as f64 * config.energy_per_unit,
        materials_cost: lost as f64 * config.materials_per_lost_unit,
        destroyed_units,
    }
}

pub struct CombatHandler {
    config: CombatConfig,
}

impl CombatHandler {
    pub fn new(config: CombatConfig) -> Self {
        Self { config }
    }
}

impl ActionHandler for CombatHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Combat
    }

    fn cost(&self, action: &GameAction) -> u32 {
        match &action.params {
            ActionParams::Combat {
                combat_type: CombatType::Defend,
                ..
            } => self.config.base_defend_cost,
            _ => self.config.base_attack_cost,
        }
    }

    fn validate_specific(&self, action: &GameAction, ctx: &GameActionContext) -> bool {
        let ActionParams::Combat {
            combat_type,
            target_territory_id,
            attacking_units,
        } = &action.params
        else {
            return false;
        };
        let player = &ctx.player_state;

        if attacking_units.is_empty() || !attacking_units.iter().all(|u| player.units.contains(u))
        {
            return false;
        }
        // Each unit fights once.
        let distinct: BTreeSet<&UnitId> = attacking_units.iter().collect();
        if distinct.len() != attacking_units.len() {
            return false;
        }

        // Attacks target foreign ground, defence holds our own.
        let owns_target = player.owns_territory(target_territory_id);
        match combat_type {
            CombatType::Attack if owns_target => return false,
            CombatType::Defend if !owns_target => return false,
            _ => {}
        }

        let energy_needed = attacking_units.len() as f64 * self.config.energy_per_unit;
        player.resources.energy >= energy_needed
    }

    fn execute(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<GameActionResult, ActionError> {
        let ActionParams::Combat {
            combat_type,
            target_territory_id,
            attacking_units,
        } = &action.params
        else {
            return Err(ActionError::ParameterMismatch {
                expected: ActionKind::Combat,
                actual: action.kind(),
            });
        };
        let player = &ctx.player_state;
        let outcome = resolve_combat(&self.config, attacking_units, player.resources.technology);

        if player.resources.energy < outcome.energy_cost {
            return Err(ActionError::InsufficientResource {
                resource: ResourceKind::Energy,
                required: outcome.energy_cost,
                available: player.resources.energy,
            });
        }

        let mut resources = player.resources;
        resources.energy -= outcome.energy_cost;
        resources.materials = (resources.materials - outcome.materials_cost).max(0.0);

        let mut units = player.units.clone();
        for unit in &outcome.destroyed_units {
            units.remove(unit);
        }

        let captured = outcome.success && *combat_type == CombatType::Attack;
        let mut territories = player.territories.clone();
        if captured {
            territories.insert(target_territory_id.clone());
        }

        let changes = PlayerChanges {
            resources: Some(resources),
            territories: Some(territories),
            units: Some(units),
            turns_remaining: Some(remaining_turns(ctx, self.cost(action))?),
            ..Default::default()
        };

        let message = match (combat_type, outcome.success) {
            (CombatType::Attack, true) => {
                format!("Successfully captured territory {}", target_territory_id)
            }
            (CombatType::Attack, false) => {
                format!("Combat failed to capture territory {}", target_territory_id)
            }
            (CombatType::Defend, true) => format!("Held territory {}", target_territory_id),
            (CombatType::Defend, false) => {
                format!("Defence of territory {} faltered", target_territory_id)
            }
        };

        let event = GameEvent::public(
            action.timestamp,
            EventPayload::CombatResult {
                player_id: ctx.player_id.clone(),
                target_territory_id: target_territory_id.clone(),
                success: outcome.success,
                destroyed_units: outcome.destroyed_units,
                territory_changed: captured,
            },
        );

        Ok(GameActionResult::success(changes, message).with_event(event))
    }
}
