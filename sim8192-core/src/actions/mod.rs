//! Action validation and execution.
//!
//! One [`ActionHandler`] per [`ActionKind`], held by an [`ActionRegistry`].
//! The registry is the failure boundary: whatever goes wrong inside a
//! handler comes back as a failed [`GameActionResult`] with empty changes,
//! and only configuration mistakes (a missing or duplicated handler) surface
//! as `Err`.

pub mod combat;
pub mod diplomacy;
pub mod research;
pub mod resource;

pub use combat::{resolve_combat, CombatHandler, CombatOutcome};
pub use diplomacy::DiplomacyHandler;
pub use research::{research_gain, ResearchHandler};
pub use resource::ResourceCollectionHandler;

use crate::config::GameConfig;
use crate::input::{ActionKind, GameAction, GameActionContext, GameActionResult};
use crate::state::{ResourceKind, TerritoryId};
use std::collections::BTreeMap;
use thiserror::Error;

pub const VALIDATION_FAILED: &str = "Action validation failed";

/// Failures raised while executing an already-validated action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Handler for {expected} received {actual} parameters")]
    ParameterMismatch {
        expected: ActionKind,
        actual: ActionKind,
    },
    #[error("Insufficient turns: required {required}, available {available}")]
    InsufficientTurns { required: u32, available: u32 },
    #[error("Insufficient {resource}: required {required}, available {available}")]
    InsufficientResource {
        resource: ResourceKind,
        required: f64,
        available: f64,
    },
    #[error("Unknown territory: {0}")]
    UnknownTerritory(TerritoryId),
}

/// Configuration errors. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Action handler for type {0} is already registered")]
    DuplicateRegistration(ActionKind),
    #[error("No handler registered for action type: {0}")]
    HandlerNotFound(ActionKind),
}

/// Validation, execution and cost for one action kind.
pub trait ActionHandler: Send + Sync {
    fn kind(&self) -> ActionKind;

    /// Turns consumed by `action`.
    fn cost(&self, action: &GameAction) -> u32;

    /// Kind-specific checks layered on top of [`validate`](Self::validate).
    fn validate_specific(&self, _action: &GameAction, _ctx: &GameActionContext) -> bool {
        true
    }

    /// Shared checks: the action is of this handler's kind and the player
    /// can afford its turn cost.
    fn validate(&self, action: &GameAction, ctx: &GameActionContext) -> bool {
        action.kind() == self.kind()
            && ctx.player_state.turns_remaining >= self.cost(action)
            && self.validate_specific(action, ctx)
    }

    /// Compute the outcome. Must not be called unless `validate` passed.
    fn execute(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<GameActionResult, ActionError>;
}

/// Turns left after paying `cost`.
pub(crate) fn remaining_turns(ctx: &GameActionContext, cost: u32) -> Result<u32, ActionError> {
    ctx.player_state
        .turns_remaining
        .checked_sub(cost)
        .ok_or(ActionError::InsufficientTurns {
            required: cost,
            available: ctx.player_state.turns_remaining,
        })
}

pub struct ActionRegistry {
    handlers: BTreeMap<ActionKind, Box<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registry with the four standard handlers.
    pub fn with_defaults(config: &GameConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::empty();
        registry.register(Box::new(ResourceCollectionHandler::new(
            config.resources.clone(),
            config.technology.max_tech_level,
        )))?;
        registry.register(Box::new(CombatHandler::new(config.combat.clone())))?;
        registry.register(Box::new(ResearchHandler::new(config.technology.clone())))?;
        registry.register(Box::new(DiplomacyHandler::new(config.diplomacy.clone())))?;
        Ok(registry)
    }

    pub fn register(&mut self, handler: Box<dyn ActionHandler>) -> Result<(), RegistryError> {
        let kind = handler.kind();
        if self.handlers.contains_key(&kind) {
            return Err(RegistryError::DuplicateRegistration(kind));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    fn handler(&self, kind: ActionKind) -> Result<&dyn ActionHandler, RegistryError> {
        self.handlers
            .get(&kind)
            .map(|h| h.as_ref())
            .ok_or(RegistryError::HandlerNotFound(kind))
    }

    pub fn validate_action(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<bool, RegistryError> {
        Ok(self.handler(action.kind())?.validate(action, ctx))
    }

    pub fn action_cost(&self, action: &GameAction) -> Result<u32, RegistryError> {
        Ok(self.handler(action.kind())?.cost(action))
    }

    pub fn registered_kinds(&self) -> Vec<ActionKind> {
        self.handlers.keys().copied().collect()
    }

    /// Validate then execute.
    ///
    /// A rejected validation never reaches the handler's `execute`.
    #[tracing::instrument(skip_all, name = "execute_action")]
    pub fn execute_action(
        &self,
        action: &GameAction,
        ctx: &GameActionContext,
    ) -> Result<GameActionResult, RegistryError> {
        let handler = self.handler(action.kind())?;

        if !handler.validate(action, ctx) {
            log::debug!(
                "Rejected {} from {} in game {} (cycle {})",
                action.kind(),
                ctx.player_id,
                ctx.game_id,
                ctx.current_cycle
            );
            return Ok(GameActionResult::failure(VALIDATION_FAILED));
        }

        match handler.execute(action, ctx) {
            Ok(result) => {
                log::info!(
                    "Action executed: {} game={} player={} success={} cycle={}",
                    action.kind(),
                    ctx.game_id,
                    ctx.player_id,
                    result.success,
                    ctx.current_cycle
                );
                Ok(result)
            }
            Err(e) => {
                log::warn!(
                    "Action execution failed: {} game={} player={} error={}",
                    action.kind(),
                    ctx.game_id,
                    ctx.player_id,
                    e
                );
                Ok(GameActionResult::failure(format!(
                    "Action execution failed: {}",
                    e
                )))
            }
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::empty()
    }
}
