use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type GameId = String;
pub type PlayerId = String;
pub type TerritoryId = String;
/// Regions and territories share one id space: a region is the
/// environmental view of a territory.
pub type RegionId = TerritoryId;

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Arena key for a combat unit. Allocated from a per-session counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct UnitId(pub u64);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Wall-clock instant in milliseconds since the Unix epoch.
///
/// Passed explicitly into every time-dependent operation so tests can
/// drive the clock.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn add(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as u64))
    }

    pub fn add_days(&self, days: u64) -> Self {
        self.add(Duration::from_secs(days * 24 * 60 * 60))
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Fractional days elapsed since `earlier`.
    pub fn days_since(&self, earlier: Timestamp) -> f64 {
        self.0.saturating_sub(earlier.0) as f64 / MILLIS_PER_DAY
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// The five quantities of the resource economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Energy,
    Materials,
    Technology,
    Intelligence,
    Morale,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Energy,
        ResourceKind::Materials,
        ResourceKind::Technology,
        ResourceKind::Intelligence,
        ResourceKind::Morale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Energy => "energy",
            ResourceKind::Materials => "materials",
            ResourceKind::Technology => "technology",
            ResourceKind::Intelligence => "intelligence",
            ResourceKind::Morale => "morale",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial per-resource map: multipliers for climate effects, absolute
/// deltas for world events and ability costs.
pub type ResourceImpact = BTreeMap<ResourceKind, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Resources {
    pub energy: f64,
    pub materials: f64,
    pub technology: f64,
    pub intelligence: f64,
    pub morale: f64,
}

impl Resources {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Energy => self.energy,
            ResourceKind::Materials => self.materials,
            ResourceKind::Technology => self.technology,
            ResourceKind::Intelligence => self.intelligence,
            ResourceKind::Morale => self.morale,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Energy => &mut self.energy,
            ResourceKind::Materials => &mut self.materials,
            ResourceKind::Technology => &mut self.technology,
            ResourceKind::Intelligence => &mut self.intelligence,
            ResourceKind::Morale => &mut self.morale,
        }
    }

    pub fn set(&mut self, kind: ResourceKind, value: f64) {
        *self.get_mut(kind) = value;
    }

    pub fn add(&mut self, kind: ResourceKind, delta: f64) {
        *self.get_mut(kind) += delta;
    }

    /// Apply absolute deltas, flooring every resource at zero and capping
    /// technology at `max_tech`.
    pub fn apply_deltas(&mut self, deltas: &ResourceImpact, max_tech: f64) {
        for (&kind, &delta) in deltas {
            let slot = self.get_mut(kind);
            *slot = (*slot + delta).max(0.0);
        }
        self.technology = self.technology.min(max_tech);
    }

    /// True when every entry of `cost` is covered.
    pub fn covers(&self, cost: &ResourceImpact) -> bool {
        cost.iter().all(|(&kind, &amount)| self.get(kind) >= amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AllianceTerms {
    #[serde(default)]
    pub resource_sharing: bool,
    #[serde(default)]
    pub mutual_defense: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_bonus: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alliance {
    pub player_id: PlayerId,
    pub terms: Option<AllianceTerms>,
    pub formed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAlliance {
    pub target_player_id: PlayerId,
    pub terms: Option<AllianceTerms>,
    pub proposed_at: Timestamp,
}

/// Per-player authoritative state, mutated only by applying action results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerState {
    pub resources: Resources,
    pub territories: BTreeSet<TerritoryId>,
    pub units: BTreeSet<UnitId>,
    pub alliances: Vec<Alliance>,
    pub pending_alliances: Vec<PendingAlliance>,
    /// Remaining action budget for the current cycle.
    pub turns_remaining: u32,
}

impl PlayerState {
    pub fn owns_territory(&self, territory: &str) -> bool {
        self.territories.contains(territory)
    }

    pub fn is_allied_with(&self, player: &str) -> bool {
        self.alliances.iter().any(|a| a.player_id == player)
    }

    pub fn has_pending_with(&self, player: &str) -> bool {
        self.pending_alliances
            .iter()
            .any(|p| p.target_player_id == player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Setup,
    #[default]
    Action,
    Resolution,
    Finished,
}

/// Game-wide view handed to handlers alongside the acting player's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameState {
    pub current_phase: GamePhase,
    pub players: Vec<PlayerId>,
    /// Current owner of every claimed territory.
    pub territory_owners: BTreeMap<TerritoryId, PlayerId>,
}

impl GameState {
    pub fn owner_of(&self, territory: &str) -> Option<&PlayerId> {
        self.territory_owners.get(territory)
    }
}

/// Environmental state of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionState {
    /// Per-turn production credited to the owner.
    pub production: Resources,
    pub population: f64,
    pub production_capacity: f64,
}

impl Default for RegionState {
    fn default() -> Self {
        Self {
            production: Resources {
                energy: 20.0,
                materials: 20.0,
                technology: 0.0,
                intelligence: 5.0,
                morale: 0.0,
            },
            population: 1000.0,
            production_capacity: 1.0,
        }
    }
}
