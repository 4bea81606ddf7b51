use super::{remaining_turns, ActionError, ActionHandler};
use crate::config::DiplomacyConfig;
use crate::input::{
    ActionKind, ActionParams, DiplomacyOp, GameAction, GameActionContext, GameActionResult,
    PlayerChanges,
};
use crate::state::{Alliance, PendingAlliance};

/// Alliance bookkeeping on the acting player's own state.
///
/// The counterpart's state and the shared trust ledger are kept in step by
/// the session, not here.
pub struct DiplomacyHandler {
    config: DiplomacyConfig,
}

impl DiplomacyHandler {
    pub fn new(config: DiplomacyConfig) -> Self {
        Self { config }
    }
}

impl ActionHandler for DiplomacyHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Diplomacy
    }

    fn cost(&self, _action: &GameAction) -> u32 {
        self.config.alliance_formation_cost
    }

    fn validate_specific(&self, action: &GameAction, ctx: &GameActionContext) -> bool {
        let ActionParams::Diplomacy {
            op,
            target_player_id,
            ..
        } = &action.params
        else {
            return false;
        };
        if *target_player_id == ctx.player_id {
            return false;
        }

        let player = &ctx.player_state;
        let at_capacity = player.alliances.len() >= self.config.max_alliance_size;
        let allied = player.is_allied_with(target_player_id);
        let pending = player.has_pending_with(target_player_id);

        match op {
            DiplomacyOp::ProposeAlliance => !at_capacity && !allied && !pending,
            DiplomacyOp::AcceptAlliance => !at_capacity && !allied && pending,
            DiplomacyOp::BreakAlliance => allied,
        }
    }

    fn execute(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<GameActionResult, ActionError> {
        let ActionParams::Diplomacy {
            op,
            target_player_id,
            terms,
        } = &action.params
        else {
            return Err(ActionError::ParameterMismatch {
                expected: ActionKind::Diplomacy,
                actual: action.kind(),
            });
        };
        let player = &ctx.player_state;
        let mut changes = PlayerChanges {
            turns_remaining: Some(remaining_turns(ctx, self.cost(action))?),
            ..Default::default()
        };

        let message = match op {
            DiplomacyOp::ProposeAlliance => {
                let mut pending = player.pending_alliances.clone();
                pending.push(PendingAlliance {
                    target_player_id: target_player_id.clone(),
                    terms: terms.clone(),
                    proposed_at: action.timestamp,
                });
                changes.pending_alliances = Some(pending);
                format!("Alliance proposed to player {}", target_player_id)
            }
            DiplomacyOp::AcceptAlliance => {
                let (matching, pending): (Vec<_>, Vec<_>) = player
                    .pending_alliances
                    .iter()
                    .cloned()
                    .partition(|p| p.target_player_id == *target_player_id);
                let agreed_terms = terms
                    .clone()
                    .or_else(|| matching.into_iter().find_map(|p| p.terms));

                let mut resources = player.resources;
                resources.morale += self.config.accept_morale_bonus;
                if agreed_terms.as_ref().is_some_and(|t| t.resource_sharing) {
                    resources.energy += self.config.resource_sharing_bonus;
                    resources.materials += self.config.resource_sharing_bonus;
                }

                let mut alliances = player.alliances.clone();
                alliances.push(Alliance {
                    player_id: target_player_id.clone(),
                    terms: agreed_terms,
                    formed_at: action.timestamp,
                });

                changes.pending_alliances = Some(pending);
                changes.alliances = Some(alliances);
                changes.resources = Some(resources);
                format!("Alliance formed with player {}", target_player_id)
            }
            DiplomacyOp::BreakAlliance => {
                let alliances = player
                    .alliances
                    .iter()
                    .filter(|a| a.player_id != *target_player_id)
                    .cloned()
                    .collect();

                let mut resources = player.resources;
                resources.morale = (resources.morale - self.config.break_morale_penalty).max(0.0);

                changes.alliances = Some(alliances);
                changes.resources = Some(resources);
                format!("Alliance broken with player {}", target_player_id)
            }
        };

        Ok(GameActionResult::success(changes, message))
    }
}
