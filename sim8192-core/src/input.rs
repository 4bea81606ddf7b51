use crate::events::GameEvent;
use crate::state::{
    Alliance, AllianceTerms, GameId, GameState, PendingAlliance, PlayerId, PlayerState,
    ResourceKind, Resources, TerritoryId, Timestamp, UnitId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub u64);

impl ActionId {
    /// Allocate a fresh id, unique within the process.
    pub fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "action-{}", self.0)
    }
}

/// Discriminant used to route an action to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    CollectResource,
    Combat,
    Research,
    Diplomacy,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::CollectResource,
        ActionKind::Combat,
        ActionKind::Research,
        ActionKind::Diplomacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CollectResource => "COLLECT_RESOURCE",
            ActionKind::Combat => "COMBAT",
            ActionKind::Research => "RESEARCH",
            ActionKind::Diplomacy => "DIPLOMACY",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombatType {
    Attack,
    Defend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TechnologyType {
    Military,
    Economic,
    Intelligence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiplomacyOp {
    ProposeAlliance,
    AcceptAlliance,
    BreakAlliance,
}

/// Kind-specific parameters. The variant is the action's kind, so a
/// handler can never receive parameters of another kind's shape.
///
/// ```json
/// {"action_type":"COMBAT","parameters":{"combat_type":"ATTACK",...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "action_type",
    content = "parameters",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ActionParams {
    CollectResource {
        resource_type: ResourceKind,
        territory_id: TerritoryId,
        amount: f64,
    },
    Combat {
        combat_type: CombatType,
        target_territory_id: TerritoryId,
        attacking_units: Vec<UnitId>,
    },
    Research {
        technology_type: TechnologyType,
        investment_amount: f64,
    },
    Diplomacy {
        op: DiplomacyOp,
        target_player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terms: Option<AllianceTerms>,
    },
}

impl ActionParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionParams::CollectResource { .. } => ActionKind::CollectResource,
            ActionParams::Combat { .. } => ActionKind::Combat,
            ActionParams::Research { .. } => ActionKind::Research,
            ActionParams::Diplomacy { .. } => ActionKind::Diplomacy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// A player-submitted action. Consumed exactly once by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    pub id: ActionId,
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub cycle_number: u32,
    #[serde(flatten)]
    pub params: ActionParams,
    #[serde(default)]
    pub status: ActionStatus,
    pub timestamp: Timestamp,
}

impl GameAction {
    pub fn new(
        game_id: impl Into<GameId>,
        player_id: impl Into<PlayerId>,
        cycle_number: u32,
        params: ActionParams,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: ActionId::next(),
            game_id: game_id.into(),
            player_id: player_id.into(),
            cycle_number,
            params,
            status: ActionStatus::Pending,
            timestamp,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.params.kind()
    }
}

/// Everything a handler may read while validating or executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameActionContext {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub current_cycle: u32,
    pub player_state: PlayerState,
    pub game_state: GameState,
}

/// Partial `PlayerState`: only fields set to `Some` are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territories: Option<BTreeSet<TerritoryId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<BTreeSet<UnitId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alliances: Option<Vec<Alliance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_alliances: Option<Vec<PendingAlliance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_remaining: Option<u32>,
}

impl PlayerChanges {
    pub fn is_empty(&self) -> bool {
        self.resources.is_none()
            && self.territories.is_none()
            && self.units.is_none()
            && self.alliances.is_none()
            && self.pending_alliances.is_none()
            && self.turns_remaining.is_none()
    }

    pub fn apply_to(&self, state: &mut PlayerState) {
        if let Some(resources) = self.resources {
            state.resources = resources;
        }
        if let Some(territories) = &self.territories {
            state.territories = territories.clone();
        }
        if let Some(units) = &self.units {
            state.units = units.clone();
        }
        if let Some(alliances) = &self.alliances {
            state.alliances = alliances.clone();
        }
        if let Some(pending) = &self.pending_alliances {
            state.pending_alliances = pending.clone();
        }
        if let Some(turns) = self.turns_remaining {
            state.turns_remaining = turns;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameActionResult {
    pub success: bool,
    pub changes: PlayerChanges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Notifications produced by the action, published by the caller.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<GameEvent>,
}

impl GameActionResult {
    pub fn success(changes: PlayerChanges, message: impl Into<String>) -> Self {
        Self {
            success: true,
            changes,
            message: Some(message.into()),
            error: None,
            events: Vec::new(),
        }
    }

    /// A failed result never carries changes.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            changes: PlayerChanges::default(),
            message: None,
            error: Some(error.into()),
            events: Vec::new(),
        }
    }

    pub fn with_event(mut self, event: GameEvent) -> Self {
        self.events.push(event);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ids_are_unique() {
        let a = ActionId::next();
        let b = ActionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_action_json_shape() {
        let action = GameAction::new(
            "game1",
            "player1",
            1,
            ActionParams::Research {
                technology_type: TechnologyType::Military,
                investment_amount: 100.0,
            },
            Timestamp::from_millis(0),
        );
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["action_type"], "RESEARCH");
        assert_eq!(json["parameters"]["technology_type"], "MILITARY");
        assert_eq!(json["status"], "PENDING");

        let back: GameAction = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ActionKind::Research);
    }

    #[test]
    fn test_changes_apply_only_set_fields() {
        let mut state = PlayerState {
            turns_remaining: 5,
            ..Default::default()
        };
        state.territories.insert("t1".into());

        let changes = PlayerChanges {
            turns_remaining: Some(3),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        changes.apply_to(&mut state);

        assert_eq!(state.turns_remaining, 3);
        assert!(state.owns_territory("t1"));
        assert!(PlayerChanges::default().is_empty());
    }
}
