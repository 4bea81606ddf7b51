//! # sim8192 core
//!
//! Server-side rules for a turn-based strategy game: players collect
//! resources, research, fight over territory and form alliances, while world
//! events and a climate model perturb the economy underneath them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │  AI seats   │────▶│  GameAction  │────▶│ ActionRegistry │
//! │  (decide)   │     │  (params)    │     │ validate/exec  │
//! └──────▲──────┘     └──────────────┘     └───────┬────────┘
//!        │                                         │ PlayerChanges
//!        │            ┌──────────────┐     ┌───────▼────────┐
//!        └────────────│  GameEvent   │◀────│  GameSession   │
//!      BehaviorSystem │  (fan-out)   │     │ units, diplo,  │
//!                     └──────┬───────┘     │ world, climate │
//!                            ▼             └────────────────┘
//!                        EventSinks
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`GameSession`] | Owns one game's state and runs the cycle |
//! | [`ActionRegistry`] | One handler per action kind, the failure boundary for actions |
//! | [`UnitManager`] | Unit roster, special abilities and cooldowns |
//! | [`DiplomaticSystem`] | Pairwise trust and agreement lifecycle |
//! | [`BehaviorSystem`] | Personality-driven AI behaviour that learns from events |
//! | [`EventManager`] | Random world events and their resource impact |
//! | [`ClimateSystem`] | Temperature, weather and disasters scaling regional output |
//! | [`DataTransformers`] | Normalises external feeds into game modifiers |
//!
//! ## AI
//!
//! - [`AdaptiveAi`]: deterministic, steered by the seat's behaviour pattern
//! - [`RandomAi`]: seeded random choices for exploration
//!
//! ## Events
//!
//! Everything observable leaves the session as a [`GameEvent`]. Sinks are
//! best effort: a failing sink is logged and skipped.

pub mod actions;
pub mod ai;
pub mod bounded;
pub mod climate;
pub mod config;
pub mod diplomacy;
pub mod events;
pub mod input;
pub mod metrics;
pub mod session;
pub mod state;
pub mod testing;
pub mod transform;
pub mod units;
pub mod world_events;

#[cfg(test)]
mod session_tests;

pub use actions::{ActionRegistry, RegistryError};
pub use ai::{AdaptiveAi, AiPlayer, BehaviorSystem, RandomAi, VisibleGameState};
pub use bounded::BoundedF64;
pub use climate::{ClimateConfig, ClimateDriver, ClimateSystem};
pub use config::GameConfig;
pub use diplomacy::DiplomaticSystem;
pub use events::{ChannelEventSink, EventDispatcher, EventSink, GameEvent, JsonlEventSink};
pub use input::{ActionParams, GameAction, GameActionResult};
pub use metrics::SessionMetrics;
pub use session::{GameSession, PlayerSummary, SessionError};
pub use state::{PlayerState, RegionState, Resources, Timestamp};
pub use transform::{DataTransformers, Domain};
pub use units::{UnitManager, UnitType};
pub use world_events::{EventManager, EventManagerConfig};
