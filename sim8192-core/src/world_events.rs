//! Turn-driven world events: disasters, crises, uprisings, breakthroughs and
//! incidents that hit a handful of regions and their owners.

use crate::state::{PlayerId, RegionId, ResourceImpact, ResourceKind};
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_WORLD_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Most regions a single event can touch.
pub const MAX_AFFECTED_REGIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldEventId(pub u64);

impl WorldEventId {
    pub fn next() -> Self {
        Self(NEXT_WORLD_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for WorldEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "world-event-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldEventType {
    NaturalDisaster,
    EconomicCrisis,
    PoliticalUprising,
    TechnologicalBreakthrough,
    DiplomaticIncident,
}

impl WorldEventType {
    pub const ALL: [WorldEventType; 5] = [
        WorldEventType::NaturalDisaster,
        WorldEventType::EconomicCrisis,
        WorldEventType::PoliticalUprising,
        WorldEventType::TechnologicalBreakthrough,
        WorldEventType::DiplomaticIncident,
    ];
}

struct Template {
    name: &'static str,
    description: &'static str,
    duration: u32,
    impact: &'static [(ResourceKind, f64)],
    severity: u8,
}

fn template(event_type: WorldEventType) -> Template {
    use ResourceKind::*;
    match event_type {
        WorldEventType::NaturalDisaster => Template {
            name: "Natural Disaster",
            description: "A devastating natural event affects the region",
            duration: 3,
            impact: &[(Materials, -20.0), (Morale, -10.0)],
            severity: 4,
        },
        WorldEventType::EconomicCrisis => Template {
            name: "Economic Crisis",
            description: "Markets collapse and supply lines falter",
            duration: 5,
            impact: &[(Energy, -15.0), (Materials, -10.0), (Morale, -5.0)],
            severity: 3,
        },
        WorldEventType::PoliticalUprising => Template {
            name: "Political Uprising",
            description: "Unrest spreads through the population",
            duration: 4,
            impact: &[(Morale, -20.0), (Intelligence, -5.0)],
            severity: 3,
        },
        WorldEventType::TechnologicalBreakthrough => Template {
            name: "Technological Breakthrough",
            description: "Local researchers make an unexpected discovery",
            duration: 2,
            impact: &[(Technology, 0.5), (Energy, 10.0)],
            severity: 2,
        },
        WorldEventType::DiplomaticIncident => Template {
            name: "Diplomatic Incident",
            description: "An envoy is expelled amid accusations of espionage",
            duration: 3,
            impact: &[(Intelligence, -10.0), (Morale, -5.0)],
            severity: 2,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    pub id: WorldEventId,
    pub event_type: WorldEventType,
    pub name: String,
    pub description: String,
    /// Turns the event stays active.
    pub duration: u32,
    pub started_turn: u32,
    pub affected_regions: Vec<RegionId>,
    pub affected_players: Vec<PlayerId>,
    /// Applied once to every affected player when the event starts.
    pub resource_impact: ResourceImpact,
    pub probability: f64,
    /// 1..=5
    pub severity: u8,
}

impl WorldEvent {
    pub fn from_template(
        event_type: WorldEventType,
        started_turn: u32,
        probability: f64,
        affected_regions: Vec<RegionId>,
        affected_players: Vec<PlayerId>,
    ) -> Self {
        let t = template(event_type);
        Self {
            id: WorldEventId::next(),
            event_type,
            name: t.name.to_string(),
            description: t.description.to_string(),
            duration: t.duration,
            started_turn,
            affected_regions,
            affected_players,
            resource_impact: t.impact.iter().copied().collect(),
            probability,
            severity: t.severity,
        }
    }

    pub fn is_expired(&self, turn: u32) -> bool {
        turn >= self.started_turn.saturating_add(self.duration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventManagerConfig {
    pub base_probability: f64,
    /// Added per elapsed turn, up to `max_turn_bonus`.
    pub turn_scaling: f64,
    pub max_turn_bonus: f64,
    pub seed: u64,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self {
            base_probability: 0.05,
            turn_scaling: 0.01,
            max_turn_bonus: 0.2,
            seed: 0,
        }
    }
}

/// Events started and retired by one [`EventManager::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldEventUpdate {
    pub started: Vec<WorldEvent>,
    pub expired: Vec<WorldEvent>,
}

pub struct EventManager {
    config: EventManagerConfig,
    active: Vec<WorldEvent>,
    history: Vec<WorldEvent>,
    turn: u32,
    rng: StdRng,
}

impl EventManager {
    pub fn new(config: EventManagerConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            active: Vec::new(),
            history: Vec::new(),
            turn: 0,
        }
    }

    /// Chance each event type fires on `turn`.
    pub fn event_probability(&self, turn: u32) -> f64 {
        let bonus = (turn as f64 * self.config.turn_scaling).min(self.config.max_turn_bonus);
        self.config.base_probability + bonus
    }

    /// Retire expired events, then roll once per event type.
    ///
    /// `world` maps each region to its owner, if any.
    #[tracing::instrument(skip_all, name = "world_events")]
    pub fn update(
        &mut self,
        turn: u32,
        world: &BTreeMap<RegionId, PlayerId>,
    ) -> WorldEventUpdate {
        self.turn = turn;
        let mut update = WorldEventUpdate::default();

        let (expired, active): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|e| e.is_expired(turn));
        self.active = active;
        for event in expired {
            log::debug!("{} ({}) ended on turn {}", event.name, event.id, turn);
            self.history.push(event.clone());
            update.expired.push(event);
        }

        let probability = self.event_probability(turn);
        for event_type in WorldEventType::ALL {
            if self.rng.gen::<f64>() < probability {
                update.started.push(self.trigger(event_type, world).clone());
            }
        }
        update
    }

    /// Start an event of `event_type` now, regardless of probability.
    pub fn trigger(
        &mut self,
        event_type: WorldEventType,
        world: &BTreeMap<RegionId, PlayerId>,
    ) -> &WorldEvent {
        let count = if world.is_empty() {
            0
        } else {
            self.rng.gen_range(1..=world.len().min(MAX_AFFECTED_REGIONS))
        };
        let mut regions: Vec<RegionId> = world.keys().cloned().choose_multiple(&mut self.rng, count);
        regions.sort();
        let players: BTreeSet<PlayerId> = regions
            .iter()
            .filter_map(|r| world.get(r).cloned())
            .collect();

        let event = WorldEvent::from_template(
            event_type,
            self.turn,
            self.event_probability(self.turn),
            regions,
            players.into_iter().collect(),
        );
        log::debug!(
            "{} ({}) started on turn {} affecting {:?}",
            event.name,
            event.id,
            self.turn,
            event.affected_regions
        );
        let index = self.active.len();
        self.active.push(event);
        &self.active[index]
    }

    pub fn active_events(&self) -> &[WorldEvent] {
        &self.active
    }

    pub fn event_history(&self) -> &[WorldEvent] {
        &self.history
    }

    pub fn events_for_region<'a>(
        &'a self,
        region: &'a str,
    ) -> impl Iterator<Item = &'a WorldEvent> + 'a {
        self.active
            .iter()
            .filter(move |e| e.affected_regions.iter().any(|r| r == region))
    }

    pub fn events_for_player<'a>(
        &'a self,
        player: &'a str,
    ) -> impl Iterator<Item = &'a WorldEvent> + 'a {
        self.active
            .iter()
            .filter(move |e| e.affected_players.iter().any(|p| p == player))
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(EventManagerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> BTreeMap<RegionId, PlayerId> {
        [("north", "alice"), ("south", "alice"), ("east", "bob"), ("west", "bob")]
            .into_iter()
            .map(|(r, p)| (r.to_string(), p.to_string()))
            .collect()
    }

    #[test]
    fn test_probability_rises_with_turns() {
        let manager = EventManager::default();
        assert!((manager.event_probability(0) - 0.05).abs() < 1e-12);
        assert!((manager.event_probability(10) - 0.15).abs() < 1e-12);
        assert!((manager.event_probability(20) - 0.25).abs() < 1e-12);
        // Capped
        assert!((manager.event_probability(500) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_templates_exist_for_every_type() {
        for event_type in WorldEventType::ALL {
            let event = WorldEvent::from_template(event_type, 0, 0.1, vec![], vec![]);
            assert!(!event.name.is_empty());
            assert!(event.duration > 0);
            assert!((1..=5).contains(&event.severity));
            assert!(!event.resource_impact.is_empty());
        }
        let disaster =
            WorldEvent::from_template(WorldEventType::NaturalDisaster, 0, 0.1, vec![], vec![]);
        assert_eq!(disaster.resource_impact[&ResourceKind::Materials], -20.0);
        assert_eq!(disaster.resource_impact[&ResourceKind::Morale], -10.0);
        assert_eq!(disaster.severity, 4);
    }

    #[test]
    fn test_trigger_picks_regions_and_owners() {
        let mut manager = EventManager::default();
        let world = world();
        let event = manager
            .trigger(WorldEventType::EconomicCrisis, &world)
            .clone();

        assert!((1..=MAX_AFFECTED_REGIONS).contains(&event.affected_regions.len()));
        for region in &event.affected_regions {
            assert!(event.affected_players.contains(&world[region]));
        }
        assert_eq!(manager.active_events().len(), 1);
        let region = &event.affected_regions[0];
        assert_eq!(manager.events_for_region(region).count(), 1);
        assert_eq!(manager.events_for_player(&world[region]).count(), 1);
        assert_eq!(manager.events_for_region("nowhere").count(), 0);
    }

    #[test]
    fn test_empty_world_still_records_event() {
        let mut manager = EventManager::default();
        let event = manager.trigger(WorldEventType::DiplomaticIncident, &BTreeMap::new());
        assert!(event.affected_regions.is_empty());
        assert!(event.affected_players.is_empty());
    }

    #[test]
    fn test_expiry_relative_to_start() {
        let config = EventManagerConfig {
            base_probability: 0.0,
            turn_scaling: 0.0,
            ..Default::default()
        };
        let mut manager = EventManager::new(config);
        manager.update(10, &world());
        manager.trigger(WorldEventType::NaturalDisaster, &world());

        // Started on turn 10 with duration 3
        let update = manager.update(12, &world());
        assert!(update.expired.is_empty());
        assert_eq!(manager.active_events().len(), 1);

        let update = manager.update(13, &world());
        assert_eq!(update.expired.len(), 1);
        assert!(manager.active_events().is_empty());
        assert_eq!(manager.event_history().len(), 1);
    }

    #[test]
    fn test_certain_probability_starts_every_type() {
        let config = EventManagerConfig {
            base_probability: 1.0,
            ..Default::default()
        };
        let mut manager = EventManager::new(config);
        let update = manager.update(1, &world());
        let types: Vec<_> = update.started.iter().map(|e| e.event_type).collect();
        assert_eq!(types, WorldEventType::ALL.to_vec());
        assert!(update.started.iter().all(|e| e.started_turn == 1));
    }

    #[test]
    fn test_same_seed_same_events() {
        let run = || {
            let mut manager = EventManager::new(EventManagerConfig {
                seed: 42,
                ..Default::default()
            });
            (0..30)
                .flat_map(|turn| manager.update(turn, &world()).started)
                .map(|e| (e.event_type, e.started_turn, e.affected_regions))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
