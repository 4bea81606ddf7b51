//! Wall-clock climate: ambient temperature, weather fronts and disasters
//! that scale regional production while they last.
//!
//! [`ClimateSystem`] is plain state advanced by [`ClimateSystem::update_climate`].
//! [`ClimateDriver`] optionally ticks it from a background thread on a fixed
//! interval; whoever owns the session drains the events it produces.

use crate::events::{EventPayload, GameEvent};
use crate::state::{RegionId, RegionState, ResourceImpact, ResourceKind, Timestamp};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const YEAR_MS: f64 = 1000.0 * 60.0 * 60.0 * 24.0 * 365.0;
const HOT_ABOVE: f64 = 30.0;
const COLD_BELOW: f64 = 10.0;
/// Most regions touched by one effect.
const MAX_EFFECT_REGIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub base_temperature: f64,
    pub temperature_variance: f64,
    pub disaster_probability: f64,
    pub weather_change_probability: f64,
    pub update_interval_secs: u64,
    /// Candidate regions for new effects.
    pub regions: Vec<RegionId>,
    pub seed: u64,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            base_temperature: 20.0,
            temperature_variance: 10.0,
            disaster_probability: 0.01,
            weather_change_probability: 0.1,
            update_interval_secs: 60,
            regions: Vec::new(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateEffectType {
    Temperature,
    Weather,
    Disaster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCondition {
    Clear,
    Stormy,
    ExtremeHeat,
    ExtremeCold,
    ElectromagneticStorm,
}

impl WeatherCondition {
    /// Fractional production change per resource.
    pub fn impact(&self) -> ResourceImpact {
        use ResourceKind::*;
        let pairs: &[(ResourceKind, f64)] = match self {
            WeatherCondition::Clear => &[],
            WeatherCondition::Stormy => &[(Materials, -0.2), (Energy, -0.1)],
            WeatherCondition::ExtremeHeat => &[(Energy, -0.3), (Materials, -0.2)],
            WeatherCondition::ExtremeCold => &[(Energy, -0.4), (Morale, -0.2)],
            WeatherCondition::ElectromagneticStorm => &[(Technology, -0.5), (Intelligence, -0.3)],
        };
        pairs.iter().copied().collect()
    }

    fn for_temperature(temperature: f64) -> &'static [WeatherCondition] {
        if temperature > HOT_ABOVE {
            &[WeatherCondition::ExtremeHeat, WeatherCondition::ElectromagneticStorm]
        } else if temperature < COLD_BELOW {
            &[WeatherCondition::ExtremeCold, WeatherCondition::Stormy]
        } else {
            &[WeatherCondition::Clear, WeatherCondition::Stormy]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisasterKind {
    Drought,
    Wildfire,
    Blizzard,
    IceStorm,
    Earthquake,
    Flood,
}

impl DisasterKind {
    pub fn impact(&self) -> ResourceImpact {
        use ResourceKind::*;
        let pairs: &[(ResourceKind, f64)] = match self {
            DisasterKind::Drought => &[(Materials, -0.5), (Morale, -0.3)],
            DisasterKind::Wildfire => &[(Materials, -0.6), (Energy, -0.4)],
            DisasterKind::Blizzard => &[(Energy, -0.4), (Morale, -0.2)],
            DisasterKind::IceStorm => &[(Materials, -0.3), (Energy, -0.3)],
            DisasterKind::Earthquake => &[(Materials, -0.7), (Technology, -0.4)],
            DisasterKind::Flood => &[(Materials, -0.5), (Energy, -0.3), (Morale, -0.2)],
        };
        pairs.iter().copied().collect()
    }

    fn for_temperature(temperature: f64) -> &'static [DisasterKind] {
        if temperature > HOT_ABOVE {
            &[DisasterKind::Drought, DisasterKind::Wildfire]
        } else if temperature < COLD_BELOW {
            &[DisasterKind::Blizzard, DisasterKind::IceStorm]
        } else {
            &[DisasterKind::Earthquake, DisasterKind::Flood]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateCause {
    Ambient,
    Weather(WeatherCondition),
    Disaster(DisasterKind),
}

/// A transient modifier on regional production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateEffect {
    pub id: u64,
    pub effect_type: ClimateEffectType,
    pub cause: ClimateCause,
    /// 0..=1
    pub severity: f64,
    pub regions: Vec<RegionId>,
    /// Production multiplier offsets: each resource is scaled by `1 + impact`.
    pub resource_impact: ResourceImpact,
    pub duration_secs: u64,
    pub started_at: Timestamp,
}

impl ClimateEffect {
    pub fn expires_at(&self) -> Timestamp {
        self.started_at.add(Duration::from_secs(self.duration_secs))
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at()
    }

    fn apply_to(&self, region: &mut RegionState) {
        for (kind, impact) in &self.resource_impact {
            *region.production.get_mut(*kind) *= 1.0 + impact;
        }
        if self.effect_type == ClimateEffectType::Disaster {
            region.population *= 1.0 - self.severity * 0.1;
            region.production_capacity *= 1.0 - self.severity * 0.2;
        }
    }
}

/// A weather observation already normalised from an external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub condition: WeatherCondition,
    /// 0..=1
    pub severity: f64,
    pub duration_secs: u64,
    /// Extra production offsets on top of the condition's own impact.
    #[serde(default)]
    pub effects: ResourceImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    pub temperature: f64,
    pub active_effects: Vec<ClimateEffect>,
}

pub struct ClimateSystem {
    config: ClimateConfig,
    effects: BTreeMap<u64, ClimateEffect>,
    next_effect: u64,
    temperature: f64,
    rng: StdRng,
}

impl ClimateSystem {
    pub fn new(config: ClimateConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            temperature: config.base_temperature,
            config,
            effects: BTreeMap::new(),
            next_effect: 1,
        }
    }

    pub fn config(&self) -> &ClimateConfig {
        &self.config
    }

    /// Make `region` a candidate for future effects.
    pub fn add_region(&mut self, region: impl Into<RegionId>) {
        let region = region.into();
        if !self.config.regions.contains(&region) {
            self.config.regions.push(region);
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.config.update_interval_secs)
    }

    /// Seasonal sinusoid plus bounded noise.
    fn next_temperature(&mut self, now: Timestamp) -> f64 {
        let season = (now.as_millis() as f64 / YEAR_MS * PI * 2.0).sin();
        let noise = (self.rng.gen::<f64>() - 0.5) * 2.0;
        let variance = self.config.temperature_variance;
        self.config.base_temperature + season * variance * 0.5 + noise * variance * 0.2
    }

    /// One climate step: new temperature, maybe a weather front, maybe a
    /// disaster, then expiry. Returns the events to publish.
    #[tracing::instrument(skip_all, name = "update_climate")]
    pub fn update_climate(&mut self, now: Timestamp) -> Vec<GameEvent> {
        self.temperature = self.next_temperature(now);
        let mut events = Vec::new();

        if self.rng.gen::<f64>() < self.config.weather_change_probability {
            let condition = *WeatherCondition::for_temperature(self.temperature)
                .choose(&mut self.rng)
                .unwrap_or(&WeatherCondition::Clear);
            let severity = self.rng.gen_range(0.3..=1.0);
            let duration_secs = self.rng.gen_range(1800..=5400);
            let regions = self.pick_regions();
            events.push(self.spawn(
                ClimateEffectType::Weather,
                ClimateCause::Weather(condition),
                severity,
                regions,
                condition.impact(),
                duration_secs,
                now,
            ));
        }

        if self.rng.gen::<f64>() < self.config.disaster_probability {
            let kind = *DisasterKind::for_temperature(self.temperature)
                .choose(&mut self.rng)
                .unwrap_or(&DisasterKind::Flood);
            let severity = self.rng.gen_range(0.7..=1.0);
            let duration_secs = self.rng.gen_range(3600..=10800);
            let regions = self.pick_regions();
            events.push(self.spawn(
                ClimateEffectType::Disaster,
                ClimateCause::Disaster(kind),
                severity,
                regions,
                kind.impact(),
                duration_secs,
                now,
            ));
        }

        events.extend(self.remove_expired(now));
        events
    }

    /// Turn normalised weather observations into effects on the given regions.
    pub fn ingest_conditions(
        &mut self,
        reports: &[WeatherReport],
        regions: &[RegionId],
        now: Timestamp,
    ) -> Vec<GameEvent> {
        reports
            .iter()
            .filter(|r| r.condition != WeatherCondition::Clear || !r.effects.is_empty())
            .map(|report| {
                let mut impact = report.condition.impact();
                for (kind, delta) in &report.effects {
                    *impact.entry(*kind).or_insert(0.0) += delta;
                }
                self.spawn(
                    ClimateEffectType::Weather,
                    ClimateCause::Weather(report.condition),
                    report.severity.clamp(0.0, 1.0),
                    regions.to_vec(),
                    impact,
                    report.duration_secs,
                    now,
                )
            })
            .collect()
    }

    fn pick_regions(&mut self) -> Vec<RegionId> {
        let count = MAX_EFFECT_REGIONS.min(self.config.regions.len());
        let mut regions: Vec<RegionId> = self
            .config
            .regions
            .iter()
            .cloned()
            .choose_multiple(&mut self.rng, count);
        regions.sort();
        regions
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &mut self,
        effect_type: ClimateEffectType,
        cause: ClimateCause,
        severity: f64,
        regions: Vec<RegionId>,
        resource_impact: ResourceImpact,
        duration_secs: u64,
        now: Timestamp,
    ) -> GameEvent {
        let id = self.next_effect;
        self.next_effect += 1;
        let effect = ClimateEffect {
            id,
            effect_type,
            cause,
            severity,
            regions,
            resource_impact,
            duration_secs,
            started_at: now,
        };
        log::debug!(
            "Climate effect {} spawned: {:?} severity {:.2} on {:?} for {}s",
            id,
            effect.cause,
            effect.severity,
            effect.regions,
            effect.duration_secs
        );
        self.effects.insert(id, effect.clone());
        GameEvent::public(now, EventPayload::ClimateEffect { effect })
    }

    fn remove_expired(&mut self, now: Timestamp) -> Vec<GameEvent> {
        let expired: Vec<u64> = self
            .effects
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.id)
            .collect();
        for id in &expired {
            self.effects.remove(id);
            log::debug!("Climate effect {} expired", id);
        }
        expired
            .into_iter()
            .map(|effect_id| GameEvent::public(now, EventPayload::ClimateExpired { effect_id }))
            .collect()
    }

    /// Scale each affected region's production by every active effect.
    /// Regions not present in `regions` are skipped.
    pub fn apply_climate_effects(&self, regions: &mut BTreeMap<RegionId, RegionState>) {
        for effect in self.effects.values() {
            for id in &effect.regions {
                if let Some(region) = regions.get_mut(id) {
                    effect.apply_to(region);
                }
            }
        }
    }

    pub fn active_effects(&self) -> impl Iterator<Item = &ClimateEffect> {
        self.effects.values()
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn climate_state(&self) -> ClimateState {
        ClimateState {
            temperature: self.temperature,
            active_effects: self.effects.values().cloned().collect(),
        }
    }

    pub fn clear_effects(&mut self) {
        self.effects.clear();
    }
}

impl Default for ClimateSystem {
    fn default() -> Self {
        Self::new(ClimateConfig::default())
    }
}

/// Background ticker for a shared [`ClimateSystem`].
///
/// `start` and `stop` are idempotent.
pub struct ClimateDriver {
    system: Arc<Mutex<ClimateSystem>>,
    events: Sender<GameEvent>,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl ClimateDriver {
    /// Events produced by the background thread arrive on the returned receiver.
    pub fn new(system: Arc<Mutex<ClimateSystem>>) -> (Self, Receiver<GameEvent>) {
        let (events, rx) = crossbeam_channel::unbounded();
        (
            Self {
                system,
                events,
                worker: None,
            },
            rx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.worker.is_some() {
            return false;
        }
        let interval = self
            .system
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_interval();
        let ticker = tick(interval);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let system = Arc::clone(&self.system);
        let events = self.events.clone();

        let handle = thread::spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    let produced = system
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .update_climate(Timestamp::now());
                    for event in produced {
                        if events.send(event).is_err() {
                            log::warn!("Climate event receiver dropped; stopping driver");
                            return;
                        }
                    }
                }
                recv(stop_rx) -> _ => return,
            }
        });
        log::info!("Climate driver started ({:?} interval)", interval);
        self.worker = Some((stop_tx, handle));
        true
    }

    /// Returns false if not running.
    pub fn stop(&mut self) -> bool {
        let Some((stop_tx, handle)) = self.worker.take() else {
            return false;
        };
        let _ = stop_tx.send(());
        if handle.join().is_err() {
            log::warn!("Climate driver thread panicked");
        }
        log::info!("Climate driver stopped");
        true
    }

    /// Stop, then drop every active effect.
    pub fn cleanup(&mut self) {
        self.stop();
        self.system
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_effects();
    }
}

impl Drop for ClimateDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
