//! Normalisation of external data feeds into game vocabulary.
//!
//! Each [`Domain`] has one structural validator and an ordered list of
//! [`TransformRule`]s. A payload that fails validation is rejected whole:
//! no rule runs, the domain's error counter goes up and the caller gets a
//! [`TransformError`]. Feeds arrive as loosely typed JSON, so rules work on
//! [`serde_json::Value`].

use crate::ai::AiActivityMetrics;
use crate::climate::{WeatherCondition, WeatherReport};
use crate::state::{RegionId, ResourceImpact, ResourceKind, Resources, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_WEATHER_DURATION_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Economic,
    Weather,
    Geopolitical,
    /// Composite climate feeds. Ships with rules but no validator.
    Climate,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Domain::Economic => "economic",
            Domain::Weather => "weather",
            Domain::Geopolitical => "geopolitical",
            Domain::Climate => "climate",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid {0} data format")]
    Validation(Domain),
    #[error("No validator registered for {0} data")]
    UnknownDomain(Domain),
    #[error("Rule for '{field}' failed: {reason}")]
    Rule { field: String, reason: String },
}

/// Linear remap of `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
/// Values outside the input range extrapolate.
pub fn normalize_value(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let t = (value - in_min) / (in_max - in_min);
    out_min + t * (out_max - out_min)
}

pub type CustomTransform = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;
pub type Validator = Box<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum RuleTransform {
    Linear {
        in_min: f64,
        in_max: f64,
        out_min: f64,
        out_max: f64,
    },
    /// `1 - linear(...)`
    InvertedLinear {
        in_min: f64,
        in_max: f64,
        out_min: f64,
        out_max: f64,
    },
    Custom(CustomTransform),
}

impl std::fmt::Debug for RuleTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleTransform::Linear {
                in_min,
                in_max,
                out_min,
                out_max,
            } => write!(f, "Linear({in_min}..{in_max} -> {out_min}..{out_max})"),
            RuleTransform::InvertedLinear {
                in_min,
                in_max,
                out_min,
                out_max,
            } => write!(
                f,
                "InvertedLinear({in_min}..{in_max} -> {out_min}..{out_max})"
            ),
            RuleTransform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl RuleTransform {
    pub fn linear(in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> Self {
        RuleTransform::Linear {
            in_min,
            in_max,
            out_min,
            out_max,
        }
    }

    pub fn custom(f: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        RuleTransform::Custom(Arc::new(f))
    }

    fn apply(&self, value: &Value) -> Result<Value, String> {
        match self {
            RuleTransform::Linear {
                in_min,
                in_max,
                out_min,
                out_max,
            } => {
                let v = value.as_f64().ok_or("expected a number")?;
                Ok(json!(normalize_value(v, *in_min, *in_max, *out_min, *out_max)))
            }
            RuleTransform::InvertedLinear {
                in_min,
                in_max,
                out_min,
                out_max,
            } => {
                let v = value.as_f64().ok_or("expected a number")?;
                Ok(json!(
                    1.0 - normalize_value(v, *in_min, *in_max, *out_min, *out_max)
                ))
            }
            RuleTransform::Custom(f) => f(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformRule {
    pub source_field: String,
    pub target_field: String,
    pub transform: RuleTransform,
}

impl TransformRule {
    pub fn new(source: &str, target: &str, transform: RuleTransform) -> Self {
        Self {
            source_field: source.to_string(),
            target_field: target.to_string(),
            transform,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformMetrics {
    pub processed_count: u64,
    pub error_count: u64,
    pub last_processed: Option<Timestamp>,
    /// Running mean over successful transforms.
    pub average_processing_time: Duration,
}

impl TransformMetrics {
    fn record_success(&mut self, elapsed: Duration) {
        self.processed_count += 1;
        self.last_processed = Some(Timestamp::now());
        let n = self.processed_count as f64;
        let total = self.average_processing_time.as_secs_f64() * (n - 1.0) + elapsed.as_secs_f64();
        self.average_processing_time = Duration::from_secs_f64(total / n);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTrend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub commodity_prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub trading_volume: BTreeMap<String, f64>,
    #[serde(default)]
    pub market_trends: BTreeMap<String, MarketTrend>,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub resource_multipliers: ResourceImpact,
    pub trading_efficiency: f64,
    pub market_stability: f64,
}

impl MarketConditions {
    pub fn from_market(data: &MarketData) -> Self {
        let mut resource_multipliers = ResourceImpact::new();
        for (name, price) in &data.commodity_prices {
            let Some(kind) = ResourceKind::ALL.into_iter().find(|k| k.as_str() == name) else {
                continue;
            };
            let mut multiplier = normalize_value(*price, 0.0, 1000.0, 0.5, 1.5);
            match data.market_trends.get(name) {
                Some(MarketTrend::Rising) => multiplier *= 1.2,
                Some(MarketTrend::Falling) => multiplier *= 0.8,
                _ => {}
            }
            let volume = data.trading_volume.get(name).copied().unwrap_or(0.0);
            multiplier *= normalize_value(volume, 0.0, 10000.0, 0.9, 1.1);
            resource_multipliers.insert(kind, multiplier);
        }

        let volume_bonus = data.trading_volume.values().sum::<f64>() / 10000.0;
        let base_efficiency = 1.0 - data.volatility * 0.5;
        let trading_efficiency = normalize_value(base_efficiency + volume_bonus, 0.0, 2.0, 0.5, 1.5);

        let stable_share = if data.market_trends.is_empty() {
            0.0
        } else {
            data.market_trends
                .values()
                .filter(|t| **t == MarketTrend::Stable)
                .count() as f64
                / data.market_trends.len() as f64
        };
        let market_stability = normalize_value(
            (1.0 - data.volatility + stable_share) / 2.0,
            0.0,
            1.0,
            0.3,
            1.0,
        );

        Self {
            resource_multipliers,
            trading_efficiency,
            market_stability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicState {
    pub growth_rate: f64,
    pub production_efficiency: f64,
    pub innovation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicOutput {
    pub resources: Resources,
    pub market: Option<MarketConditions>,
    pub economic_state: Option<EconomicState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherOutput {
    /// 1 at 20°C, falling off linearly with distance from it.
    pub environmental_effect: f64,
    pub reports: Vec<WeatherReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldModifiers {
    pub global_stability: f64,
    pub ai_activity: AiActivityMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalClimate {
    pub production_modifier: f64,
    pub stability_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalConditions {
    pub base_temperature: f64,
    pub extreme_event_probability: f64,
    pub regional_effects: BTreeMap<RegionId, RegionalClimate>,
    pub resource_impact: ResourceImpact,
}

#[derive(Debug, Clone, Deserialize)]
struct ExtremeEvent {
    probability: f64,
    severity: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct RegionalConditions {
    temperature: f64,
    stability: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClimateData {
    temperature: f64,
    precipitation: f64,
    #[serde(default)]
    extreme_events: Vec<ExtremeEvent>,
    #[serde(default)]
    regional_conditions: BTreeMap<RegionId, RegionalConditions>,
}

fn temperature_stress(temperature: f64) -> f64 {
    (temperature - 20.0).abs() / 50.0
}

impl EnvironmentalConditions {
    fn from_climate(data: &ClimateData) -> Self {
        let extreme_event_probability = if data.extreme_events.is_empty() {
            0.0
        } else {
            data.extreme_events
                .iter()
                .map(|e| e.probability * e.severity)
                .sum::<f64>()
                / data.extreme_events.len() as f64
        };

        let regional_effects = data
            .regional_conditions
            .iter()
            .map(|(id, c)| {
                let stress = temperature_stress(c.temperature);
                let effect = RegionalClimate {
                    production_modifier: normalize_value(
                        (1.0 - stress + c.stability) / 2.0,
                        0.0,
                        1.0,
                        0.6,
                        1.2,
                    ),
                    stability_impact: normalize_value(
                        c.stability - stress * 0.3,
                        0.0,
                        1.0,
                        0.4,
                        1.0,
                    ),
                };
                (id.clone(), effect)
            })
            .collect();

        let stress = temperature_stress(data.temperature);
        let resource_impact = [
            (ResourceKind::Energy, 1.0 - stress * 0.3),
            (
                ResourceKind::Materials,
                if data.precipitation > 100.0 { 0.8 } else { 1.0 },
            ),
            (ResourceKind::Technology, 1.0),
            (ResourceKind::Intelligence, 1.0),
            (ResourceKind::Morale, 1.0 - stress * 0.1),
        ]
        .into_iter()
        .collect();

        Self {
            base_temperature: normalize_value(data.temperature, -20.0, 50.0, 0.0, 1.0),
            extreme_event_probability,
            regional_effects,
            resource_impact,
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Feed value treated as absent when missing, non-numeric or zero.
fn nonzero(data: &Value, field: &str) -> Option<f64> {
    data.get(field).and_then(Value::as_f64).filter(|v| *v != 0.0)
}

fn field(transformed: &Map<String, Value>, name: &str) -> Result<f64, TransformError> {
    transformed
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| TransformError::Rule {
            field: name.to_string(),
            reason: "missing after transform".to_string(),
        })
}

fn map_weather_type(api_type: &str) -> WeatherCondition {
    match api_type {
        "rain" => WeatherCondition::Stormy,
        "heat_wave" => WeatherCondition::ExtremeHeat,
        "blizzard" => WeatherCondition::ExtremeCold,
        "electromagnetic_storm" => WeatherCondition::ElectromagneticStorm,
        _ => WeatherCondition::Clear,
    }
}

fn weather_effects(api_type: &str, severity: f64) -> ResourceImpact {
    match api_type {
        "heat_wave" => [(ResourceKind::Energy, -0.2 * severity)].into_iter().collect(),
        "electromagnetic_storm" => [(ResourceKind::Technology, -0.3 * severity)]
            .into_iter()
            .collect(),
        _ => ResourceImpact::new(),
    }
}

fn default_validators() -> BTreeMap<Domain, Validator> {
    let mut validators: BTreeMap<Domain, Validator> = BTreeMap::new();
    validators.insert(
        Domain::Economic,
        Box::new(|data| {
            ["gdpGrowth", "industrialProduction", "resourceScarcity"]
                .iter()
                .all(|f| data.get(*f).is_some_and(Value::is_number))
        }),
    );
    validators.insert(
        Domain::Weather,
        Box::new(|data| {
            data.get("conditions").is_some_and(Value::is_array)
                && data.get("temperature").is_some_and(|t| !t.is_null())
        }),
    );
    validators.insert(
        Domain::Geopolitical,
        Box::new(|data| {
            ["stabilityIndex", "conflictLevel"]
                .iter()
                .all(|f| data.get(*f).is_some_and(Value::is_number))
        }),
    );
    validators
}

fn default_rules() -> BTreeMap<Domain, Vec<TransformRule>> {
    let mut rules = BTreeMap::new();
    rules.insert(
        Domain::Economic,
        vec![
            TransformRule::new(
                "gdpGrowth",
                "resourceMultiplier",
                RuleTransform::linear(-10.0, 10.0, 0.5, 2.0),
            ),
            TransformRule::new(
                "industrialProduction",
                "productionEfficiency",
                RuleTransform::linear(0.0, 100.0, 0.8, 1.5),
            ),
            TransformRule::new(
                "resourceScarcity",
                "resourceAvailability",
                RuleTransform::InvertedLinear {
                    in_min: 0.0,
                    in_max: 100.0,
                    out_min: 0.0,
                    out_max: 1.0,
                },
            ),
            TransformRule::new(
                "marketData",
                "marketConditions",
                RuleTransform::custom(|v| to_value(&MarketConditions::from_market(&parse(v)?))),
            ),
            TransformRule::new(
                "economicIndicators",
                "economicState",
                RuleTransform::custom(|v| {
                    let get = |name: &str| {
                        v.get(name)
                            .and_then(Value::as_f64)
                            .ok_or_else(|| format!("economicIndicators.{name} missing"))
                    };
                    to_value(&EconomicState {
                        growth_rate: normalize_value(get("gdpGrowth")?, -5.0, 10.0, 0.5, 1.5),
                        production_efficiency: normalize_value(
                            get("industrialOutput")?,
                            0.0,
                            100.0,
                            0.8,
                            1.2,
                        ),
                        innovation_rate: normalize_value(get("techIndex")?, 0.0, 100.0, 1.0, 2.0),
                    })
                }),
            ),
        ],
    );
    rules.insert(
        Domain::Weather,
        vec![
            TransformRule::new(
                "temperature",
                "environmentalEffect",
                RuleTransform::custom(|v| {
                    let t = v.as_f64().ok_or("expected a number")?;
                    Ok(json!(1.0 - temperature_stress(t)))
                }),
            ),
            TransformRule::new(
                "conditions",
                "weatherConditions",
                RuleTransform::custom(|v| {
                    let conditions = v.as_array().ok_or("expected an array")?;
                    let reports = conditions
                        .iter()
                        .map(|c| {
                            let api_type = c.get("type").and_then(Value::as_str).unwrap_or("");
                            let severity = normalize_value(
                                c.get("severity").and_then(Value::as_f64).unwrap_or(0.0),
                                0.0,
                                100.0,
                                0.0,
                                1.0,
                            );
                            WeatherReport {
                                condition: map_weather_type(api_type),
                                severity,
                                duration_secs: c
                                    .get("duration")
                                    .and_then(Value::as_u64)
                                    .filter(|d| *d > 0)
                                    .unwrap_or(DEFAULT_WEATHER_DURATION_SECS),
                                effects: weather_effects(api_type, severity),
                            }
                        })
                        .collect::<Vec<_>>();
                    to_value(&reports)
                }),
            ),
        ],
    );
    rules.insert(
        Domain::Geopolitical,
        vec![
            TransformRule::new(
                "stabilityIndex",
                "globalStability",
                RuleTransform::linear(0.0, 100.0, 0.0, 1.0),
            ),
            TransformRule::new(
                "conflictLevel",
                "aiAggressionModifier",
                RuleTransform::linear(0.0, 100.0, 1.0, 2.0),
            ),
        ],
    );
    rules.insert(
        Domain::Climate,
        vec![TransformRule::new(
            "climateData",
            "environmentalConditions",
            RuleTransform::custom(|v| {
                to_value(&EnvironmentalConditions::from_climate(&parse::<ClimateData>(v)?))
            }),
        )],
    );
    rules
}

pub struct DataTransformers {
    rules: BTreeMap<Domain, Vec<TransformRule>>,
    validators: BTreeMap<Domain, Validator>,
    metrics: BTreeMap<Domain, TransformMetrics>,
}

impl DataTransformers {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            validators: default_validators(),
            metrics: [Domain::Economic, Domain::Weather, Domain::Geopolitical]
                .into_iter()
                .map(|d| (d, TransformMetrics::default()))
                .collect(),
        }
    }

    fn validate(&self, domain: Domain, data: &Value) -> Result<(), TransformError> {
        let validator = self
            .validators
            .get(&domain)
            .ok_or(TransformError::UnknownDomain(domain))?;
        if validator(data) {
            Ok(())
        } else {
            Err(TransformError::Validation(domain))
        }
    }

    fn apply_rules(&self, domain: Domain, data: &Value) -> Result<Map<String, Value>, TransformError> {
        let mut out = Map::new();
        for rule in self.rules.get(&domain).into_iter().flatten() {
            let Some(source) = data.get(&rule.source_field).filter(|v| !v.is_null()) else {
                continue;
            };
            let value = rule
                .transform
                .apply(source)
                .map_err(|reason| TransformError::Rule {
                    field: rule.source_field.clone(),
                    reason,
                })?;
            out.insert(rule.target_field.clone(), value);
        }
        Ok(out)
    }

    /// Validate, run rules, then `finish`; all timed and counted as one call.
    fn run<T>(
        &mut self,
        domain: Domain,
        data: &Value,
        finish: impl FnOnce(&Map<String, Value>, &Value) -> Result<T, TransformError>,
    ) -> Result<T, TransformError> {
        let started = Instant::now();
        let result = self
            .validate(domain, data)
            .and_then(|()| self.apply_rules(domain, data))
            .and_then(|transformed| finish(&transformed, data));

        let metrics = self.metrics.entry(domain).or_default();
        match &result {
            Ok(_) => metrics.record_success(started.elapsed()),
            Err(e) => {
                metrics.error_count += 1;
                log::warn!("Rejected {} feed: {}", domain, e);
            }
        }
        result
    }

    /// Apply `domain`'s rules and return the raw target fields.
    pub fn transform(
        &mut self,
        domain: Domain,
        data: &Value,
    ) -> Result<Map<String, Value>, TransformError> {
        self.run(domain, data, |transformed, _| Ok(transformed.clone()))
    }

    pub fn transform_economic_data(&mut self, data: &Value) -> Result<EconomicOutput, TransformError> {
        self.run(Domain::Economic, data, |t, data| {
            let availability = field(t, "resourceAvailability")?;
            let resources = Resources {
                energy: resource_value(availability, data),
                materials: resource_value(availability, data),
                technology: resource_value(field(t, "resourceMultiplier")?, data),
                intelligence: resource_value(field(t, "productionEfficiency")?, data),
                morale: morale_value(data),
            };
            Ok(EconomicOutput {
                resources,
                market: decode(t, "marketConditions")?,
                economic_state: decode(t, "economicState")?,
            })
        })
    }

    pub fn transform_weather_data(&mut self, data: &Value) -> Result<WeatherOutput, TransformError> {
        self.run(Domain::Weather, data, |t, _| {
            Ok(WeatherOutput {
                environmental_effect: field(t, "environmentalEffect")?,
                reports: decode(t, "weatherConditions")?.unwrap_or_default(),
            })
        })
    }

    pub fn transform_geopolitical_data(
        &mut self,
        data: &Value,
    ) -> Result<WorldModifiers, TransformError> {
        self.run(Domain::Geopolitical, data, |t, _| {
            let stability = field(t, "globalStability")?;
            let aggression = field(t, "aiAggressionModifier")?;
            Ok(WorldModifiers {
                global_stability: stability,
                ai_activity: AiActivityMetrics {
                    aggression_level: aggression * (1.0 - stability),
                    expansion_rate: normalize_value(1.0 - stability, 0.0, 1.0, 0.1, 0.5),
                    tech_progress: 0.0,
                    predicted_next_actions: vec![],
                },
            })
        })
    }

    pub fn add_transform_rule(&mut self, domain: Domain, rule: TransformRule) {
        self.rules.entry(domain).or_default().push(rule);
    }

    /// Replaces any existing validator for `domain`.
    pub fn add_validation_rule(
        &mut self,
        domain: Domain,
        validator: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) {
        self.validators.insert(domain, Box::new(validator));
    }

    pub fn metrics(&self) -> &BTreeMap<Domain, TransformMetrics> {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        for metrics in self.metrics.values_mut() {
            *metrics = TransformMetrics::default();
        }
    }
}

impl Default for DataTransformers {
    fn default() -> Self {
        Self::new()
    }
}

fn decode<T: for<'de> Deserialize<'de>>(
    transformed: &Map<String, Value>,
    name: &str,
) -> Result<Option<T>, TransformError> {
    transformed
        .get(name)
        .map(|v| {
            parse(v).map_err(|reason| TransformError::Rule {
                field: name.to_string(),
                reason,
            })
        })
        .transpose()
}

/// `floor(100 * base * scarcity * production)`
fn resource_value(base: f64, data: &Value) -> f64 {
    let scarcity = nonzero(data, "resourceScarcity")
        .map_or(1.0, |s| 1.0 - normalize_value(s, 0.0, 100.0, 0.0, 0.5));
    let production = nonzero(data, "industrialProduction")
        .map_or(1.0, |p| normalize_value(p, 0.0, 100.0, 0.8, 1.2));
    (100.0 * base * scarcity * production).floor()
}

fn morale_value(data: &Value) -> f64 {
    let factors = [
        nonzero(data, "gdpGrowth").map_or(1.0, |v| normalize_value(v, -10.0, 10.0, 0.5, 1.5)),
        nonzero(data, "employmentRate").map_or(1.0, |v| normalize_value(v, 0.0, 100.0, 0.7, 1.3)),
        nonzero(data, "socialStability").map_or(1.0, |v| normalize_value(v, 0.0, 100.0, 0.8, 1.2)),
    ];
    (100.0 * factors.iter().product::<f64>()).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn economic() -> Value {
        json!({
            "gdpGrowth": 0.0,
            "industrialProduction": 50.0,
            "resourceScarcity": 50.0,
        })
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(0.0, -10.0, 10.0, 0.5, 2.0), 1.25);
        assert_eq!(normalize_value(100.0, 0.0, 100.0, 1.0, 2.0), 2.0);
        assert_eq!(normalize_value(-10.0, -10.0, 10.0, 0.5, 2.0), 0.5);
    }

    #[test]
    fn test_economic_transform() {
        let mut transformers = DataTransformers::new();
        let out = transformers.transform_economic_data(&economic()).unwrap();

        // availability 0.5, scarcity 0.75, production 1.0
        assert_eq!(out.resources.energy, 37.0);
        assert_eq!(out.resources.materials, 37.0);
        // multiplier 1.25
        assert_eq!(out.resources.technology, 93.0);
        // efficiency 1.15
        assert_eq!(out.resources.intelligence, 86.0);
        // gdpGrowth 0 counts as absent
        assert_eq!(out.resources.morale, 100.0);
        assert!(out.market.is_none());

        let metrics = &transformers.metrics()[&Domain::Economic];
        assert_eq!(metrics.processed_count, 1);
        assert_eq!(metrics.error_count, 0);
        assert!(metrics.last_processed.is_some());
    }

    #[test]
    fn test_invalid_feed_rejected_whole() {
        let mut transformers = DataTransformers::new();
        let err = transformers
            .transform_economic_data(&json!({"gdpGrowth": "fast"}))
            .unwrap_err();

        assert_eq!(err, TransformError::Validation(Domain::Economic));
        assert_eq!(err.to_string(), "Invalid economic data format");
        let metrics = &transformers.metrics()[&Domain::Economic];
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.processed_count, 0);
    }

    #[test]
    fn test_market_composite() {
        let mut transformers = DataTransformers::new();
        let mut data = economic();
        data["marketData"] = json!({
            "commodityPrices": {"energy": 500.0, "spice": 10.0},
            "tradingVolume": {"energy": 5000.0},
            "marketTrends": {"energy": "rising"},
            "volatility": 0.2,
        });
        let market = transformers
            .transform_economic_data(&data)
            .unwrap()
            .market
            .unwrap();

        // 1.0 * 1.2 * 1.0
        assert!((market.resource_multipliers[&ResourceKind::Energy] - 1.2).abs() < 1e-9);
        assert_eq!(market.resource_multipliers.len(), 1);
        // (0.9 + 0.5) on 0..2 -> 0.5..1.5
        assert!((market.trading_efficiency - 1.2).abs() < 1e-9);
        // (0.8 + 0) / 2 on 0..1 -> 0.3..1.0
        assert!((market.market_stability - 0.58).abs() < 1e-9);
    }

    #[test]
    fn test_bad_composite_is_a_rule_error() {
        let mut transformers = DataTransformers::new();
        let mut data = economic();
        data["economicIndicators"] = json!({"gdpGrowth": 2.0});
        let err = transformers.transform_economic_data(&data).unwrap_err();
        assert!(matches!(err, TransformError::Rule { ref field, .. } if field == "economicIndicators"));
        assert_eq!(transformers.metrics()[&Domain::Economic].error_count, 1);
    }

    #[test]
    fn test_weather_transform() {
        let mut transformers = DataTransformers::new();
        let out = transformers
            .transform_weather_data(&json!({
                "temperature": 45.0,
                "conditions": [
                    {"type": "heat_wave", "severity": 50.0},
                    {"type": "fog", "severity": 10.0, "duration": 600},
                ],
            }))
            .unwrap();

        assert!((out.environmental_effect - 0.5).abs() < 1e-9);
        assert_eq!(out.reports.len(), 2);
        assert_eq!(out.reports[0].condition, WeatherCondition::ExtremeHeat);
        assert_eq!(out.reports[0].duration_secs, DEFAULT_WEATHER_DURATION_SECS);
        assert!((out.reports[0].effects[&ResourceKind::Energy] + 0.1).abs() < 1e-9);
        assert_eq!(out.reports[1].condition, WeatherCondition::Clear);
        assert_eq!(out.reports[1].duration_secs, 600);
    }

    #[test]
    fn test_geopolitical_transform() {
        let mut transformers = DataTransformers::new();
        let out = transformers
            .transform_geopolitical_data(&json!({"stabilityIndex": 25.0, "conflictLevel": 50.0}))
            .unwrap();
        assert_eq!(out.global_stability, 0.25);
        assert!((out.ai_activity.aggression_level - 1.125).abs() < 1e-9);
        assert!((out.ai_activity.expansion_rate - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_climate_needs_validator() {
        let mut transformers = DataTransformers::new();
        let data = json!({"climateData": {"temperature": 20.0, "precipitation": 150.0}});
        assert_eq!(
            transformers.transform(Domain::Climate, &data).unwrap_err(),
            TransformError::UnknownDomain(Domain::Climate)
        );

        transformers.add_validation_rule(Domain::Climate, |d| d.get("climateData").is_some());
        let out = transformers.transform(Domain::Climate, &data).unwrap();
        let conditions: EnvironmentalConditions =
            serde_json::from_value(out["environmentalConditions"].clone()).unwrap();
        assert!((conditions.base_temperature - 40.0 / 70.0).abs() < 1e-9);
        assert_eq!(conditions.resource_impact[&ResourceKind::Materials], 0.8);
        assert_eq!(conditions.extreme_event_probability, 0.0);
    }

    #[test]
    fn test_custom_rule_and_reset() {
        let mut transformers = DataTransformers::new();
        transformers.add_transform_rule(
            Domain::Geopolitical,
            TransformRule::new("tension", "tensionScore", RuleTransform::linear(0.0, 10.0, 0.0, 1.0)),
        );
        let out = transformers
            .transform(
                Domain::Geopolitical,
                &json!({"stabilityIndex": 50.0, "conflictLevel": 0.0, "tension": 5.0}),
            )
            .unwrap();
        assert_eq!(out["tensionScore"], json!(0.5));

        transformers.reset_metrics();
        assert_eq!(
            transformers.metrics()[&Domain::Geopolitical],
            TransformMetrics::default()
        );
    }
}
