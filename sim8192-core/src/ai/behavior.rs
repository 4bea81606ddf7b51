//! Adaptive personality model driving an AI player's strategy.

use crate::bounded::{new_ai_trust, BoundedF64};
use crate::climate::ClimateEffectType;
use crate::events::{EventPayload, GameEvent, Visibility};
use crate::state::{PlayerId, ResourceKind};
use crate::world_events::WorldEventType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TRAIT_MIN: f64 = 0.1;
pub const TRAIT_MAX: f64 = 0.9;
pub const LEARNING_RATE: f64 = 0.1;

/// High-level intent derived from the dominant personality traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    Attack,
    Move,
    Research,
    Diplomatic,
    Economic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Aggression,
    Expansion,
    Technology,
    Diplomacy,
    Economics,
    Adaptation,
}

impl Trait {
    pub const ALL: [Trait; 6] = [
        Trait::Aggression,
        Trait::Expansion,
        Trait::Technology,
        Trait::Diplomacy,
        Trait::Economics,
        Trait::Adaptation,
    ];

    /// Adaptation governs how often the pattern changes, not what it is.
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Trait::Aggression => Some(Strategy::Attack),
            Trait::Expansion => Some(Strategy::Move),
            Trait::Technology => Some(Strategy::Research),
            Trait::Diplomacy => Some(Strategy::Diplomatic),
            Trait::Economics => Some(Strategy::Economic),
            Trait::Adaptation => None,
        }
    }
}

/// Six-dimensional personality. Every value stays within
/// [`TRAIT_MIN`]..=[`TRAIT_MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub aggression: f64,
    pub expansion: f64,
    pub technology: f64,
    pub diplomacy: f64,
    pub economics: f64,
    pub adaptation: f64,
}

impl PersonalityTraits {
    /// Draw each trait from its starting band.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            aggression: rng.gen_range(0.5..0.8),
            expansion: rng.gen_range(0.4..0.8),
            technology: rng.gen_range(0.3..0.7),
            diplomacy: rng.gen_range(0.4..0.8),
            economics: rng.gen_range(0.4..0.7),
            adaptation: rng.gen_range(0.3..0.7),
        }
        .normalized()
    }

    pub fn get(&self, t: Trait) -> f64 {
        match t {
            Trait::Aggression => self.aggression,
            Trait::Expansion => self.expansion,
            Trait::Technology => self.technology,
            Trait::Diplomacy => self.diplomacy,
            Trait::Economics => self.economics,
            Trait::Adaptation => self.adaptation,
        }
    }

    fn slot(&mut self, t: Trait) -> &mut f64 {
        match t {
            Trait::Aggression => &mut self.aggression,
            Trait::Expansion => &mut self.expansion,
            Trait::Technology => &mut self.technology,
            Trait::Diplomacy => &mut self.diplomacy,
            Trait::Economics => &mut self.economics,
            Trait::Adaptation => &mut self.adaptation,
        }
    }

    /// Shift a trait, re-clamping into range.
    pub fn adjust(&mut self, t: Trait, delta: f64) {
        let slot = self.slot(t);
        *slot = (*slot + delta).clamp(TRAIT_MIN, TRAIT_MAX);
    }

    pub fn normalized(mut self) -> Self {
        for t in Trait::ALL {
            self.adjust(t, 0.0);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerritoryPreference {
    Aggressive,
    Defensive,
    Opportunistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub primary_strategy: Strategy,
    pub secondary_strategy: Strategy,
    /// All five resources, most wanted first.
    pub resource_priority: Vec<ResourceKind>,
    pub territory_preference: TerritoryPreference,
    /// Private trust required before seeking an alliance.
    pub alliance_threshold: f64,
}

impl BehaviorPattern {
    pub fn from_personality(p: &PersonalityTraits) -> Self {
        // Stable sort: ties keep declaration order.
        let mut ranked: Vec<(Strategy, f64)> = Trait::ALL
            .iter()
            .filter_map(|t| t.strategy().map(|s| (s, p.get(*t))))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut resources = [
            (ResourceKind::Energy, p.economics * 1.2),
            (ResourceKind::Materials, p.expansion),
            (ResourceKind::Technology, p.technology * 1.5),
            (ResourceKind::Intelligence, p.diplomacy),
            (ResourceKind::Morale, p.aggression),
        ];
        resources.sort_by(|a, b| b.1.total_cmp(&a.1));

        let territory_preference = if p.aggression > 0.7 {
            TerritoryPreference::Aggressive
        } else if p.diplomacy > 0.7 {
            TerritoryPreference::Defensive
        } else {
            TerritoryPreference::Opportunistic
        };

        Self {
            primary_strategy: ranked[0].0,
            secondary_strategy: ranked[1].0,
            resource_priority: resources.iter().map(|(k, _)| *k).collect(),
            territory_preference,
            alliance_threshold: 50.0 + p.diplomacy * 30.0,
        }
    }

    pub fn favours(&self, strategy: Strategy) -> bool {
        self.primary_strategy == strategy || self.secondary_strategy == strategy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustDirection {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiActivityMetrics {
    pub aggression_level: f64,
    pub expansion_rate: f64,
    pub tech_progress: f64,
    pub predicted_next_actions: Vec<Strategy>,
}

/// Personality, derived behaviour pattern and private trust ledger of one
/// AI-controlled player.
#[derive(Debug, Clone)]
pub struct BehaviorSystem {
    player_id: PlayerId,
    personality: PersonalityTraits,
    pattern: BehaviorPattern,
    trust: BTreeMap<PlayerId, BoundedF64>,
    learning_rate: f64,
    rng: StdRng,
}

impl BehaviorSystem {
    pub fn new(player_id: impl Into<PlayerId>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let personality = PersonalityTraits::random(&mut rng);
        Self::build(player_id.into(), personality, rng)
    }

    pub fn with_personality(
        player_id: impl Into<PlayerId>,
        personality: PersonalityTraits,
        seed: u64,
    ) -> Self {
        Self::build(
            player_id.into(),
            personality.normalized(),
            StdRng::seed_from_u64(seed),
        )
    }

    fn build(player_id: PlayerId, personality: PersonalityTraits, rng: StdRng) -> Self {
        Self {
            player_id,
            pattern: BehaviorPattern::from_personality(&personality),
            personality,
            trust: BTreeMap::new(),
            learning_rate: LEARNING_RATE,
            rng,
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn personality(&self) -> PersonalityTraits {
        self.personality
    }

    pub fn current_pattern(&self) -> &BehaviorPattern {
        &self.pattern
    }

    /// Private trust in `other`; 50 until first adjusted.
    pub fn trust(&self, other: &str) -> f64 {
        self.trust.get(other).map_or(50.0, |t| t.get())
    }

    pub fn trust_levels(&self) -> BTreeMap<PlayerId, f64> {
        self.trust
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect()
    }

    pub fn update_trust(&mut self, other: &str, direction: TrustDirection, magnitude: f64) {
        let delta = match direction {
            TrustDirection::Positive => magnitude,
            TrustDirection::Negative => -magnitude,
        };
        self.trust
            .entry(other.to_string())
            .or_insert_with(new_ai_trust)
            .add(delta);
    }

    /// Learn from an event. Returns a `behavior_updated` notification when
    /// the pattern was recomputed.
    pub fn handle_event(&mut self, event: &GameEvent) -> Option<GameEvent> {
        let handled = match &event.payload {
            EventPayload::CombatResult {
                player_id,
                territory_changed,
                ..
            } if *player_id == self.player_id => {
                self.update_from_combat(*territory_changed);
                true
            }
            EventPayload::WorldEvent { event } => {
                self.update_from_world_event(event.event_type);
                true
            }
            EventPayload::ClimateEffect { effect }
                if effect.effect_type == ClimateEffectType::Disaster =>
            {
                self.update_from_world_event(WorldEventType::NaturalDisaster);
                true
            }
            _ => false,
        };
        if handled {
            log::trace!("{} learned from {}", self.player_id, event.payload.type_name());
        }

        // Any event, learned from or not, may prompt a rethink.
        if self.rng.gen::<f64>() >= self.personality.adaptation {
            return None;
        }
        self.pattern = BehaviorPattern::from_personality(&self.personality);
        log::debug!(
            "{} now favours {:?}/{:?}",
            self.player_id,
            self.pattern.primary_strategy,
            self.pattern.secondary_strategy
        );
        Some(GameEvent::new(
            event.timestamp,
            Visibility::Private,
            EventPayload::BehaviorUpdated {
                player_id: self.player_id.clone(),
                primary_strategy: self.pattern.primary_strategy,
                secondary_strategy: self.pattern.secondary_strategy,
            },
        ))
    }

    fn update_from_combat(&mut self, territory_changed: bool) {
        let lr = self.learning_rate;
        let p = &mut self.personality;
        if territory_changed {
            p.adjust(Trait::Aggression, lr);
            p.adjust(Trait::Expansion, lr * 0.5);
        } else {
            // A lost battle pushes toward caution and partners.
            p.adjust(Trait::Aggression, -lr);
            p.adjust(Trait::Expansion, -lr * 0.5);
            p.adjust(Trait::Diplomacy, lr * 0.5);
        }
    }

    fn update_from_world_event(&mut self, event_type: WorldEventType) {
        let lr = self.learning_rate;
        let p = &mut self.personality;
        match event_type {
            WorldEventType::NaturalDisaster => {
                p.adjust(Trait::Economics, lr);
                p.adjust(Trait::Expansion, -lr);
            }
            WorldEventType::EconomicCrisis => {
                p.adjust(Trait::Economics, lr * 2.0);
                p.adjust(Trait::Aggression, -lr);
            }
            WorldEventType::PoliticalUprising => {
                p.adjust(Trait::Diplomacy, lr);
                p.adjust(Trait::Aggression, -lr * 0.5);
            }
            WorldEventType::TechnologicalBreakthrough => {
                p.adjust(Trait::Technology, lr);
                p.adjust(Trait::Economics, lr * 0.5);
            }
            WorldEventType::DiplomaticIncident => {
                p.adjust(Trait::Diplomacy, -lr);
                p.adjust(Trait::Aggression, lr);
            }
        }
    }

    pub fn metrics(&self) -> AiActivityMetrics {
        AiActivityMetrics {
            aggression_level: self.personality.aggression,
            expansion_rate: self.personality.expansion,
            tech_progress: self.personality.technology,
            predicted_next_actions: vec![
                self.pattern.primary_strategy,
                self.pattern.secondary_strategy,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Timestamp;
    use crate::world_events::WorldEvent;
    use proptest::prelude::*;
    use proptest::strategy::Strategy as _;
    use super::Strategy;

    fn traits(values: [f64; 6]) -> PersonalityTraits {
        PersonalityTraits {
            aggression: values[0],
            expansion: values[1],
            technology: values[2],
            diplomacy: values[3],
            economics: values[4],
            adaptation: values[5],
        }
    }

    fn combat(player: &str, territory_changed: bool) -> GameEvent {
        GameEvent::public(
            Timestamp::default(),
            EventPayload::CombatResult {
                player_id: player.into(),
                target_territory_id: "t".into(),
                success: territory_changed,
                destroyed_units: vec![],
                territory_changed,
            },
        )
    }

    fn world(event_type: WorldEventType) -> GameEvent {
        GameEvent::public(
            Timestamp::default(),
            EventPayload::WorldEvent {
                event: WorldEvent::from_template(event_type, 0, 0.1, vec![], vec![]),
            },
        )
    }

    #[test]
    fn test_random_personality_in_bands() {
        for seed in 0..50 {
            let ai = BehaviorSystem::new("ai", seed);
            let p = ai.personality();
            assert!((0.5..0.8).contains(&p.aggression));
            assert!((0.4..0.7).contains(&p.economics));
            assert!((0.3..0.7).contains(&p.adaptation));
        }
    }

    #[test]
    fn test_pattern_from_personality() {
        let p = traits([0.85, 0.2, 0.6, 0.75, 0.3, 0.9]);
        let pattern = BehaviorPattern::from_personality(&p);

        // Adaptation is the largest trait but maps to no strategy
        assert_eq!(pattern.primary_strategy, Strategy::Attack);
        assert_eq!(pattern.secondary_strategy, Strategy::Diplomatic);
        // technology 0.9 > aggression 0.85 > diplomacy 0.75 > economics 0.36 > expansion 0.2
        assert_eq!(
            pattern.resource_priority,
            vec![
                ResourceKind::Technology,
                ResourceKind::Morale,
                ResourceKind::Intelligence,
                ResourceKind::Energy,
                ResourceKind::Materials,
            ]
        );
        assert_eq!(pattern.territory_preference, TerritoryPreference::Aggressive);
        assert!((pattern.alliance_threshold - 72.5).abs() < 1e-9);
    }

    #[test]
    fn test_territory_preference_defensive() {
        let p = traits([0.5, 0.5, 0.5, 0.8, 0.5, 0.5]);
        assert_eq!(
            BehaviorPattern::from_personality(&p).territory_preference,
            TerritoryPreference::Defensive
        );
    }

    #[test]
    fn test_combat_learning() {
        let start = traits([0.5, 0.5, 0.5, 0.5, 0.5, 0.1]);
        let mut ai = BehaviorSystem::with_personality("ai", start, 1);

        ai.handle_event(&combat("ai", true));
        assert!((ai.personality().aggression - 0.6).abs() < 1e-9);
        assert!((ai.personality().expansion - 0.55).abs() < 1e-9);

        ai.handle_event(&combat("ai", false));
        assert!((ai.personality().aggression - 0.5).abs() < 1e-9);
        assert!((ai.personality().diplomacy - 0.55).abs() < 1e-9);

        // Another player's battle teaches nothing
        ai.handle_event(&combat("rival", true));
        assert!((ai.personality().aggression - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_disaster_shifts_economics() {
        let start = traits([0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);
        let mut ai = BehaviorSystem::with_personality("ai", start, 1);

        ai.handle_event(&world(WorldEventType::NaturalDisaster));
        let p = ai.personality();
        assert!((p.economics - 0.6).abs() < 1e-9);
        assert!((p.expansion - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_events_can_prompt_recompute() {
        let start = traits([0.5, 0.5, 0.5, 0.5, 0.5, 0.9]);
        let mut ai = BehaviorSystem::with_personality("ai", start, 3);
        let updates = (0..200)
            .filter_map(|_| ai.handle_event(&combat("rival", true)))
            .count();
        assert!(updates > 100, "got {updates} updates at adaptation 0.9");
        assert_eq!(ai.personality(), start);
    }

    #[test]
    fn test_low_adaptation_rarely_recomputes() {
        let start = traits([0.5, 0.5, 0.5, 0.5, 0.5, 0.1]);
        let mut ai = BehaviorSystem::with_personality("ai", start, 7);
        let updates = (0..200)
            .filter_map(|_| ai.handle_event(&world(WorldEventType::PoliticalUprising)))
            .count();
        assert!(updates < 60, "got {updates} updates at adaptation 0.1");
    }

    #[test]
    fn test_trust_defaults_and_clamps() {
        let mut ai = BehaviorSystem::new("ai", 3);
        assert_eq!(ai.trust("other"), 50.0);

        ai.update_trust("other", TrustDirection::Positive, 80.0);
        assert_eq!(ai.trust("other"), 100.0);

        ai.update_trust("other", TrustDirection::Negative, 250.0);
        assert_eq!(ai.trust("other"), 0.0);
    }

    #[test]
    fn test_metrics_predict_pattern() {
        let ai = BehaviorSystem::new("ai", 9);
        let metrics = ai.metrics();
        assert_eq!(
            metrics.predicted_next_actions,
            vec![
                ai.current_pattern().primary_strategy,
                ai.current_pattern().secondary_strategy
            ]
        );
    }

    fn any_event() -> impl proptest::strategy::Strategy<Value = GameEvent> {
        prop_oneof![
            any::<bool>().prop_map(|won| combat("ai", won)),
            prop::sample::select(vec![
                WorldEventType::NaturalDisaster,
                WorldEventType::EconomicCrisis,
                WorldEventType::PoliticalUprising,
                WorldEventType::TechnologicalBreakthrough,
                WorldEventType::DiplomaticIncident,
            ])
            .prop_map(world),
        ]
    }

    proptest! {
        #[test]
        fn prop_traits_stay_clamped(
            seed in any::<u64>(),
            events in proptest::collection::vec(any_event(), 0..100)
        ) {
            let mut ai = BehaviorSystem::new("ai", seed);
            for event in &events {
                ai.handle_event(event);
                let p = ai.personality();
                for t in Trait::ALL {
                    prop_assert!((TRAIT_MIN..=TRAIT_MAX).contains(&p.get(t)));
                }
            }
        }
    }
}
