use anyhow::{ensure, Result};
use clap::Parser;
use rayon::prelude::*;
use sim8192_core::SessionMetrics;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod config;
mod scenario;

use config::RunnerConfig;
use scenario::{AiKind, Scenario, SessionReport};

/// Largest table a session seeds.
const MAX_PLAYERS: usize = 8;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless AI self-play for the sim8192 core", long_about = None)]
struct Args {
    /// Cycles to play per session
    #[arg(short, long, default_value_t = 20, env = "SIM8192_TURNS")]
    turns: u32,

    /// AI players per session
    #[arg(short, long, default_value_t = 4, env = "SIM8192_PLAYERS")]
    players: usize,

    /// Base seed; each session derives its own from it
    #[arg(long, default_value_t = 42, env = "SIM8192_SEED")]
    seed: u64,

    /// Independent sessions, run in parallel
    #[arg(long, default_value_t = 1, env = "SIM8192_SESSIONS")]
    sessions: usize,

    /// AI driving every seat
    #[arg(long, value_enum, default_value_t = AiKind::Adaptive, env = "SIM8192_AI")]
    ai: AiKind,

    /// JSON file with game, world event and climate settings
    #[arg(long, env = "SIM8192_CONFIG")]
    config: Option<PathBuf>,

    /// Write published events as JSON lines (one file per session when
    /// running more than one)
    #[arg(long, env = "SIM8192_EVENTS_OUT")]
    events_out: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "SIM8192_LOG_LEVEL")]
    log_level: String,
}

/// `events.jsonl` becomes `events-2.jsonl` for the second of several sessions.
fn events_path(base: &Path, index: usize, sessions: usize) -> PathBuf {
    if sessions <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "events".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{}-{}.{}", stem, index + 1, ext.to_string_lossy()),
        None => format!("{}-{}", stem, index + 1),
    };
    base.with_file_name(name)
}

fn log_report(report: &SessionReport) {
    log::info!(
        "{}: {} events, {}/{} actions succeeded",
        report.game_id,
        report.events,
        report.metrics.actions_succeeded,
        report.metrics.actions_submitted
    );
    for standing in &report.standings {
        log::info!(
            "  {} | territories: {} | units: {} | tech: {:.2} | energy: {:.0} | alliances: [{}]",
            standing.player_id,
            standing.territories,
            standing.units,
            standing.technology,
            standing.resources.energy,
            standing.alliances.join(", ")
        );
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    ensure!(
        (2..=MAX_PLAYERS).contains(&args.players),
        "invalid configuration: --players must be between 2 and {}",
        MAX_PLAYERS
    );
    ensure!(args.turns > 0, "invalid configuration: --turns must be positive");
    ensure!(
        args.sessions > 0,
        "invalid configuration: --sessions must be positive"
    );
    let config = RunnerConfig::load(args.config.as_deref())?;

    log::info!(
        "Starting {} session(s): {} {:?} players, {} cycles, seed {}",
        args.sessions,
        args.players,
        args.ai,
        args.turns,
        args.seed
    );
    let started = Instant::now();

    let reports: Vec<SessionReport> = (0..args.sessions)
        .into_par_iter()
        .map(|index| {
            Scenario {
                index,
                players: args.players,
                turns: args.turns,
                seed: args.seed,
                ai: args.ai,
                events_out: args
                    .events_out
                    .as_deref()
                    .map(|p| events_path(p, index, args.sessions)),
            }
            .run(&config)
        })
        .collect::<Result<_>>()?;

    let mut totals = SessionMetrics::default();
    for report in &reports {
        log_report(report);
        totals.merge(&report.metrics);
    }

    log::info!(
        "All sessions finished in {:.2?}: {} cycles, {:.1}% of {} actions succeeded, {} abilities, {:.2} ms/cycle",
        started.elapsed(),
        totals.turns,
        totals.success_rate() * 100.0,
        totals.actions_submitted,
        totals.abilities_used,
        totals.turn_avg_ms()
    );

    Ok(())
}
