//! Seeding and playing one self-play session.

use crate::config::RunnerConfig;
use anyhow::{Context, Result};
use sim8192_core::units::Position;
use sim8192_core::{
    AdaptiveAi, AiPlayer, GameSession, JsonlEventSink, PlayerSummary, RandomAi, RegionState,
    Resources, SessionMetrics, Timestamp, UnitType,
};
use std::path::PathBuf;

/// 2023-11-14, so event timestamps look like real wall-clock times.
const START_MS: u64 = 1_700_000_000_000;
/// Trust every pair starts with, enough to open alliance talks.
const STARTING_TRUST: f64 = 60.0;
const STARTING_UNITS: [UnitType; 5] = [
    UnitType::Infantry,
    UnitType::Infantry,
    UnitType::Infantry,
    UnitType::Mechanized,
    UnitType::Special,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AiKind {
    Adaptive,
    Random,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub index: usize,
    pub players: usize,
    pub turns: u32,
    pub seed: u64,
    pub ai: AiKind,
    pub events_out: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub game_id: String,
    pub standings: Vec<PlayerSummary>,
    pub metrics: SessionMetrics,
    pub events: usize,
}

fn starting_resources() -> Resources {
    Resources {
        energy: 500.0,
        materials: 200.0,
        technology: 1.0,
        intelligence: 50.0,
        morale: 100.0,
    }
}

impl Scenario {
    fn game_id(&self) -> String {
        format!("game-{}", self.index + 1)
    }

    fn session_seed(&self) -> u64 {
        self.seed.wrapping_add((self.index as u64) << 16)
    }

    /// One home region per player plus as many unclaimed frontier regions.
    pub fn build(&self, config: &RunnerConfig) -> Result<GameSession> {
        let seed = self.session_seed();
        let mut world_events = config.world_events.clone();
        world_events.seed = world_events.seed.wrapping_add(seed);
        let mut climate = config.climate.clone();
        climate.seed = climate.seed.wrapping_add(seed);

        let mut session = GameSession::new(self.game_id(), config.game.clone())?
            .with_world_events(world_events)
            .with_climate(climate);

        if let Some(path) = &self.events_out {
            let sink = JsonlEventSink::file(path)
                .with_context(|| format!("creating event log {}", path.display()))?;
            session.register_sink(Box::new(sink));
        }

        let players: Vec<String> = (1..=self.players).map(|i| format!("player{}", i)).collect();
        for (i, player) in players.iter().enumerate() {
            session.add_player(player.as_str(), starting_resources())?;
            session.add_region(
                format!("home-{}", i + 1),
                RegionState::default(),
                Some(player.as_str()),
            )?;
            session.add_region(format!("frontier-{}", i + 1), RegionState::default(), None)?;
            for (n, unit_type) in STARTING_UNITS.iter().enumerate() {
                let position = Position {
                    x: i as i32 * 10,
                    y: n as i32,
                };
                session.spawn_unit(player, *unit_type, position)?;
            }
        }

        let now = Timestamp::from_millis(START_MS);
        for (i, a) in players.iter().enumerate() {
            for b in &players[i + 1..] {
                session.diplomacy_mut().modify_trust(a, b, STARTING_TRUST, now);
            }
        }

        for (i, player) in players.iter().enumerate() {
            let ai_seed = seed.wrapping_add(i as u64 + 1);
            let ai: Box<dyn AiPlayer> = match self.ai {
                AiKind::Adaptive => Box::new(AdaptiveAi::new(config.game.combat.clone())),
                AiKind::Random => Box::new(RandomAi::new(ai_seed)),
            };
            session.seat_ai(player, ai, ai_seed)?;
        }

        Ok(session)
    }

    /// Play every cycle to completion. One cycle is one in-game day.
    pub fn run(&self, config: &RunnerConfig) -> Result<SessionReport> {
        let mut session = self.build(config)?;
        let start = Timestamp::from_millis(START_MS);
        let mut events = 0;

        for turn in 0..self.turns {
            let now = start.add_days(turn as u64);
            let taken = session.run_ai_turns(now)?;
            session.end_turn(now);
            let published = session.drain_events().len();
            events += published;
            log::debug!(
                "{} cycle {}: {} actions, {} events",
                session.game_id(),
                turn + 1,
                taken,
                published
            );
        }
        session.finish();

        Ok(SessionReport {
            game_id: session.game_id().clone(),
            standings: session.summary(),
            metrics: session.metrics().clone(),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(ai: AiKind) -> Scenario {
        Scenario {
            index: 0,
            players: 3,
            turns: 3,
            seed: 7,
            ai,
            events_out: None,
        }
    }

    #[test]
    fn test_build_seeds_every_player() {
        let session = scenario(AiKind::Adaptive)
            .build(&RunnerConfig::default())
            .unwrap();
        assert_eq!(session.players().len(), 3);
        assert_eq!(session.regions().len(), 6);
        assert_eq!(session.territory_owners().len(), 3);
        assert_eq!(session.units().len(), 15);
        assert_eq!(session.diplomacy().trust("player1", "player3"), STARTING_TRUST);
        assert!(session.behavior("player2").is_some());
    }

    #[test]
    fn test_run_is_reproducible() {
        let config = RunnerConfig::default();
        let a = scenario(AiKind::Adaptive).run(&config).unwrap();
        let b = scenario(AiKind::Adaptive).run(&config).unwrap();
        assert_eq!(a.standings, b.standings);
        assert_eq!(a.metrics.turns, 3);
        assert!(a.metrics.actions_succeeded > 0);
    }

    #[test]
    fn test_random_players_finish() {
        let report = scenario(AiKind::Random).run(&RunnerConfig::default()).unwrap();
        assert_eq!(report.standings.len(), 3);
        assert_eq!(report.metrics.turns, 3);
    }
}
