use super::{remaining_turns, ActionError, ActionHandler};
use crate::config::TechnologyConfig;
use crate::input::{
    ActionKind, ActionParams, GameAction, GameActionContext, GameActionResult, PlayerChanges,
    TechnologyType,
};
use crate::state::{PlayerState, ResourceKind};

fn type_bonus(technology_type: TechnologyType, player: &PlayerState) -> f64 {
    match technology_type {
        TechnologyType::Military => 1.0 + player.territories.len() as f64 * 0.05,
        TechnologyType::Economic => 1.0 + (player.resources.energy / 10_000.0) * 0.1,
        TechnologyType::Intelligence => 1.2,
    }
}

/// Technology gained by investing `investment` energy at `current_tech`.
///
/// Returns shrink linearly to zero as `current_tech` approaches the cap.
pub fn research_gain(
    config: &TechnologyConfig,
    investment: f64,
    current_tech: f64,
    bonus: f64,
) -> f64 {
    let diminishing = (1.0 - current_tech / config.max_tech_level).max(0.0);
    investment * config.base_efficiency * diminishing * bonus
}

pub struct ResearchHandler {
    config: TechnologyConfig,
}

impl ResearchHandler {
    pub fn new(config: TechnologyConfig) -> Self {
        Self { config }
    }
}

impl ActionHandler for ResearchHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Research
    }

    fn cost(&self, _action: &GameAction) -> u32 {
        self.config.research_cost
    }

    fn validate_specific(&self, action: &GameAction, ctx: &GameActionContext) -> bool {
        let ActionParams::Research {
            investment_amount, ..
        } = &action.params
        else {
            return false;
        };
        let resources = &ctx.player_state.resources;

        *investment_amount > 0.0
            && resources.energy >= *investment_amount
            && resources.technology < self.config.max_tech_level
    }

    fn execute(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<GameActionResult, ActionError> {
        let ActionParams::Research {
            technology_type,
            investment_amount,
        } = &action.params
        else {
            return Err(ActionError::ParameterMismatch {
                expected: ActionKind::Research,
                actual: action.kind(),
            });
        };
        let player = &ctx.player_state;

        if player.resources.energy < *investment_amount {
            return Err(ActionError::InsufficientResource {
                resource: ResourceKind::Energy,
                required: *investment_amount,
                available: player.resources.energy,
            });
        }

        let gain = research_gain(
            &self.config,
            *investment_amount,
            player.resources.technology,
            type_bonus(*technology_type, player),
        );

        let mut resources = player.resources;
        resources.energy -= investment_amount;
        resources.technology = (resources.technology + gain).min(self.config.max_tech_level);

        let changes = PlayerChanges {
            resources: Some(resources),
            turns_remaining: Some(remaining_turns(ctx, self.cost(action))?),
            ..Default::default()
        };

        Ok(GameActionResult::success(
            changes,
            format!(
                "Research successful: Technology level increased by {:.2}",
                gain
            ),
        ))
    }
}
