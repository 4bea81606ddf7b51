use super::{remaining_turns, ActionError, ActionHandler};
use crate::config::ResourceConfig;
use crate::input::{
    ActionKind, ActionParams, GameAction, GameActionContext, GameActionResult, PlayerChanges,
};
use crate::state::ResourceKind;

/// Harvests a resource from a territory the player holds.
pub struct ResourceCollectionHandler {
    config: ResourceConfig,
    max_tech_level: f64,
}

impl ResourceCollectionHandler {
    pub fn new(config: ResourceConfig, max_tech_level: f64) -> Self {
        Self {
            config,
            max_tech_level,
        }
    }
}

impl ActionHandler for ResourceCollectionHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::CollectResource
    }

    fn cost(&self, _action: &GameAction) -> u32 {
        self.config.collection_cost
    }

    fn validate_specific(&self, action: &GameAction, ctx: &GameActionContext) -> bool {
        let ActionParams::CollectResource {
            territory_id,
            amount,
            ..
        } = &action.params
        else {
            return false;
        };
        *amount > 0.0 && ctx.player_state.owns_territory(territory_id)
    }

    fn execute(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<GameActionResult, ActionError> {
        let ActionParams::CollectResource {
            resource_type,
            territory_id,
            amount,
        } = &action.params
        else {
            return Err(ActionError::ParameterMismatch {
                expected: ActionKind::CollectResource,
                actual: action.kind(),
            });
        };
        if !ctx.player_state.owns_territory(territory_id) {
            return Err(ActionError::UnknownTerritory(territory_id.clone()));
        }

        let gained = amount * self.config.collection_efficiency;
        let mut resources = ctx.player_state.resources;
        resources.add(*resource_type, gained);
        if *resource_type == ResourceKind::Technology {
            resources.technology = resources.technology.min(self.max_tech_level);
        }

        let changes = PlayerChanges {
            resources: Some(resources),
            turns_remaining: Some(remaining_turns(ctx, self.cost(action))?),
            ..Default::default()
        };

        Ok(GameActionResult::success(
            changes,
            format!(
                "Collected {:.1} {} from territory {}",
                gained, resource_type, territory_id
            ),
        ))
    }
}
