use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use sim8192_core::{ClimateConfig, EventManagerConfig, GameConfig};
use std::path::Path;

/// Everything tunable about a run, loadable from one JSON document.
///
/// ```json
/// {"game": {"session": {"turns_per_cycle": 20}}, "climate": {"disaster_probability": 0.05}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub game: GameConfig,
    pub world_events: EventManagerConfig,
    pub climate: ClimateConfig,
}

impl RunnerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        ensure!(
            game.session.turns_per_cycle > 0,
            "invalid config: session.turns_per_cycle must be positive"
        );
        ensure!(
            game.technology.max_tech_level > 0.0,
            "invalid config: technology.max_tech_level must be positive"
        );
        ensure!(
            self.climate.update_interval_secs > 0,
            "invalid config: climate.update_interval_secs must be positive"
        );
        for (name, ratio) in [
            ("combat.success_loss_ratio", game.combat.success_loss_ratio),
            ("combat.failure_loss_ratio", game.combat.failure_loss_ratio),
            ("climate.disaster_probability", self.climate.disaster_probability),
            (
                "climate.weather_change_probability",
                self.climate.weather_change_probability,
            ),
            ("world_events.base_probability", self.world_events.base_probability),
        ] {
            ensure!(
                (0.0..=1.0).contains(&ratio),
                "invalid config: {} must be within 0..=1, got {}",
                name,
                ratio
            );
        }
        Ok(())
    }
}
