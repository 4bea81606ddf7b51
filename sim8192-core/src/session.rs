//! A single game: the authoritative state plus every subsystem that acts on it.
//!
//! All mutation goes through [`GameSession`]. Handlers in the
//! [`ActionRegistry`] only see a snapshot of the acting player and return
//! [`PlayerChanges`](crate::input::PlayerChanges); the session applies those
//! and propagates their side effects to everyone else (the previous owner of
//! a captured territory, the counterpart of an alliance, the unit roster).
//!
//! A cycle looks like:
//!
//! ```text
//! submit()* / run_ai_turns()  ->  end_turn()
//!                                   ├─ units: cooldowns, status effects, wrecks
//!                                   ├─ diplomacy: expiry, trust decay
//!                                   ├─ world events: expire, roll, apply impacts
//!                                   ├─ climate: tick (or drain the driver)
//!                                   ├─ production credited to region owners
//!                                   └─ turn budgets reset
//! ```

use crate::actions::{ActionRegistry, RegistryError, VALIDATION_FAILED};
use crate::ai::{available_actions, AiPlayer, BehaviorSystem, TrustDirection, VisibleGameState};
use crate::climate::{ClimateConfig, ClimateDriver, ClimateSystem};
use crate::config::GameConfig;
use crate::diplomacy::{
    AgreementId, AgreementStatus, AgreementTerms, AgreementType, DiplomaticSystem,
};
use crate::events::{EventDispatcher, EventPayload, EventSink, GameEvent, Visibility};
use crate::input::{ActionParams, DiplomacyOp, GameAction, GameActionContext, GameActionResult};
use crate::metrics::SessionMetrics;
use crate::state::{
    Alliance, AllianceTerms, GameId, GamePhase, GameState, PendingAlliance, PlayerId,
    PlayerState, RegionId, RegionState, ResourceImpact, ResourceKind, Resources, TerritoryId,
    Timestamp, UnitId,
};
use crate::units::{AbilityUse, Position, UnitError, UnitManager, UnitType};
use crate::world_events::{EventManager, EventManagerConfig};
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// AI trust gained toward a player who offers an alliance.
const PROPOSAL_TRUST: f64 = 5.0;
const ALLIANCE_TRUST: f64 = 10.0;
const BETRAYAL_TRUST: f64 = 20.0;
const INVASION_TRUST: f64 = 15.0;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),
    #[error("Player already seated: {0}")]
    DuplicatePlayer(PlayerId),
    #[error("Player {0} has no AI seat")]
    NotAiControlled(PlayerId),
    #[error("Unit {unit} is not owned by {player}")]
    NotOwner { unit: UnitId, player: PlayerId },
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error("Cannot afford ability '{0}'")]
    AbilityCost(String),
    #[error("Game {0} is finished")]
    Finished(GameId),
}

struct AiSeat {
    behavior: BehaviorSystem,
    player: Box<dyn AiPlayer>,
}

/// End-of-game standing for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub territories: usize,
    pub units: usize,
    pub technology: f64,
    pub alliances: Vec<PlayerId>,
    pub resources: Resources,
}

pub struct GameSession {
    game_id: GameId,
    config: GameConfig,
    cycle: u32,
    phase: GamePhase,
    players: BTreeMap<PlayerId, PlayerState>,
    territory_owners: BTreeMap<TerritoryId, PlayerId>,
    regions: BTreeMap<RegionId, RegionState>,
    registry: ActionRegistry,
    units: UnitManager,
    diplomacy: DiplomaticSystem,
    ai: BTreeMap<PlayerId, AiSeat>,
    world_events: EventManager,
    climate: Arc<Mutex<ClimateSystem>>,
    climate_driver: Option<(ClimateDriver, Receiver<GameEvent>)>,
    dispatcher: EventDispatcher,
    published: Vec<GameEvent>,
    metrics: SessionMetrics,
}

impl GameSession {
    pub fn new(game_id: impl Into<GameId>, config: GameConfig) -> Result<Self, SessionError> {
        let registry = ActionRegistry::with_defaults(&config)?;
        Ok(Self {
            game_id: game_id.into(),
            diplomacy: DiplomaticSystem::new(config.diplomacy.clone()),
            registry,
            config,
            cycle: 1,
            phase: GamePhase::Action,
            players: BTreeMap::new(),
            territory_owners: BTreeMap::new(),
            regions: BTreeMap::new(),
            units: UnitManager::new(),
            ai: BTreeMap::new(),
            world_events: EventManager::default(),
            climate: Arc::new(Mutex::new(ClimateSystem::default())),
            climate_driver: None,
            dispatcher: EventDispatcher::new(),
            published: Vec::new(),
            metrics: SessionMetrics::default(),
        })
    }

    pub fn with_world_events(mut self, config: EventManagerConfig) -> Self {
        self.world_events = EventManager::new(config);
        self
    }

    /// Replace the climate model. Regions already added stay candidates.
    pub fn with_climate(mut self, config: ClimateConfig) -> Self {
        let mut climate = ClimateSystem::new(config);
        for region in self.regions.keys() {
            climate.add_region(region.clone());
        }
        self.climate = Arc::new(Mutex::new(climate));
        self
    }

    // --- setup ---

    pub fn add_player(
        &mut self,
        player_id: impl Into<PlayerId>,
        resources: Resources,
    ) -> Result<(), SessionError> {
        let player_id = player_id.into();
        if self.players.contains_key(&player_id) {
            return Err(SessionError::DuplicatePlayer(player_id));
        }
        let state = PlayerState {
            resources,
            turns_remaining: self.config.session.turns_per_cycle,
            ..Default::default()
        };
        log::debug!("Game {}: added player {}", self.game_id, player_id);
        self.players.insert(player_id, state);
        Ok(())
    }

    /// Add a region, optionally already owned.
    pub fn add_region(
        &mut self,
        region: impl Into<RegionId>,
        state: RegionState,
        owner: Option<&str>,
    ) -> Result<(), SessionError> {
        let region = region.into();
        if let Some(owner) = owner {
            let player = self
                .players
                .get_mut(owner)
                .ok_or_else(|| SessionError::UnknownPlayer(owner.to_string()))?;
            player.territories.insert(region.clone());
            self.territory_owners
                .insert(region.clone(), owner.to_string());
        }
        self.climate_lock().add_region(region.clone());
        self.regions.insert(region, state);
        Ok(())
    }

    pub fn spawn_unit(
        &mut self,
        owner: &str,
        unit_type: UnitType,
        position: Position,
    ) -> Result<UnitId, SessionError> {
        let player = self
            .players
            .get_mut(owner)
            .ok_or_else(|| SessionError::UnknownPlayer(owner.to_string()))?;
        let id = self.units.create_unit(unit_type, owner, position).id;
        player.units.insert(id);
        Ok(id)
    }

    /// Hand control of `player_id` to an AI with a freshly rolled personality.
    pub fn seat_ai(
        &mut self,
        player_id: &str,
        player: Box<dyn AiPlayer>,
        seed: u64,
    ) -> Result<(), SessionError> {
        self.seat_ai_with(BehaviorSystem::new(player_id, seed), player)
    }

    pub fn seat_ai_with(
        &mut self,
        behavior: BehaviorSystem,
        player: Box<dyn AiPlayer>,
    ) -> Result<(), SessionError> {
        let player_id = behavior.player_id().clone();
        if !self.players.contains_key(&player_id) {
            return Err(SessionError::UnknownPlayer(player_id));
        }
        log::info!(
            "Game {}: {} seated as {} AI ({:?} / {:?})",
            self.game_id,
            player_id,
            player.name(),
            behavior.current_pattern().primary_strategy,
            behavior.current_pattern().secondary_strategy
        );
        self.ai.insert(player_id, AiSeat { behavior, player });
        Ok(())
    }

    pub fn register_sink(&mut self, sink: Box<dyn EventSink>) {
        self.dispatcher.register(sink);
    }

    // --- accessors ---

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerState> {
        self.players.get(player_id)
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, PlayerState> {
        &self.players
    }

    pub fn territory_owners(&self) -> &BTreeMap<TerritoryId, PlayerId> {
        &self.territory_owners
    }

    pub fn regions(&self) -> &BTreeMap<RegionId, RegionState> {
        &self.regions
    }

    pub fn units(&self) -> &UnitManager {
        &self.units
    }

    pub fn diplomacy(&self) -> &DiplomaticSystem {
        &self.diplomacy
    }

    /// Direct access for scenario setup, e.g. seeding trust.
    pub fn diplomacy_mut(&mut self) -> &mut DiplomaticSystem {
        &mut self.diplomacy
    }

    pub fn behavior(&self, player_id: &str) -> Option<&BehaviorSystem> {
        self.ai.get(player_id).map(|seat| &seat.behavior)
    }

    pub fn world_events(&self) -> &EventManager {
        &self.world_events
    }

    pub fn climate(&self) -> Arc<Mutex<ClimateSystem>> {
        Arc::clone(&self.climate)
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    fn climate_lock(&self) -> MutexGuard<'_, ClimateSystem> {
        self.climate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot handed to action handlers.
    pub fn context(&self, player_id: &str) -> Result<GameActionContext, SessionError> {
        let player_state = self
            .players
            .get(player_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownPlayer(player_id.to_string()))?;
        Ok(GameActionContext {
            game_id: self.game_id.clone(),
            player_id: player_id.to_string(),
            current_cycle: self.cycle,
            player_state,
            game_state: GameState {
                current_phase: self.phase,
                players: self.players.keys().cloned().collect(),
                territory_owners: self.territory_owners.clone(),
            },
        })
    }

    // --- actions ---

    /// Validate and execute one action.
    ///
    /// Rejections come back as a failed result. `Err` is reserved for
    /// callers addressing a player or game that does not exist.
    #[tracing::instrument(skip_all, name = "submit")]
    pub fn submit(&mut self, action: GameAction) -> Result<GameActionResult, SessionError> {
        if self.phase == GamePhase::Finished {
            return Err(SessionError::Finished(self.game_id.clone()));
        }
        let started = Instant::now();
        let ctx = self.context(&action.player_id)?;
        self.metrics.actions_submitted += 1;

        let result = match self.check_cross_player(&action) {
            Err(reason) => {
                log::debug!(
                    "Rejected {} from {}: {}",
                    action.kind(),
                    action.player_id,
                    reason
                );
                GameActionResult::failure(VALIDATION_FAILED)
            }
            Ok(()) => self.registry.execute_action(&action, &ctx)?,
        };

        let mut events = Vec::new();
        if result.success {
            self.metrics.actions_succeeded += 1;
            self.apply_result(&action, &ctx.player_state, &result);
            events.extend(result.events.iter().cloned());
            events.extend(self.diplomacy.drain_events());
        } else {
            self.metrics.actions_rejected += 1;
        }
        events.push(GameEvent::new(
            action.timestamp,
            Visibility::Private,
            EventPayload::ActionResolved {
                action_id: action.id,
                player_id: action.player_id.clone(),
                action_type: action.kind(),
                success: result.success,
                message: result.message.clone().or_else(|| result.error.clone()),
            },
        ));

        self.metrics.action_time += started.elapsed();
        self.publish(events);
        Ok(result)
    }

    /// Checks that depend on state beyond the acting player's own snapshot.
    fn check_cross_player(&self, action: &GameAction) -> Result<(), String> {
        let me = action.player_id.as_str();
        match &action.params {
            ActionParams::Combat {
                target_territory_id,
                ..
            } if !self.regions.contains_key(target_territory_id) => {
                Err(format!("unknown territory {}", target_territory_id))
            }
            ActionParams::Diplomacy {
                op,
                target_player_id,
                ..
            } => {
                if !self.players.contains_key(target_player_id) {
                    return Err(format!("unknown player {}", target_player_id));
                }
                match op {
                    DiplomacyOp::ProposeAlliance => self
                        .diplomacy
                        .can_form_agreement(me, target_player_id, AgreementType::Alliance)
                        .map_err(|e| e.to_string()),
                    DiplomacyOp::AcceptAlliance => {
                        if self.open_proposal(target_player_id, me).is_none() {
                            return Err(format!("no open proposal from {}", target_player_id));
                        }
                        self.diplomacy
                            .check_alliance_capacity(target_player_id, me)
                            .map_err(|e| e.to_string())
                    }
                    DiplomacyOp::BreakAlliance => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Proposed alliance from `proposer` to `target`, if one is open.
    fn open_proposal(&self, proposer: &str, target: &str) -> Option<AgreementId> {
        let id = self.diplomacy.find_agreement(
            proposer,
            target,
            AgreementType::Alliance,
            AgreementStatus::Proposed,
        )?;
        let agreement = self.diplomacy.agreement(id)?;
        (agreement.parties[0] == proposer).then_some(id)
    }

    fn apply_result(&mut self, action: &GameAction, before: &PlayerState, result: &GameActionResult) {
        let me = action.player_id.as_str();
        let now = action.timestamp;
        if let Some(state) = self.players.get_mut(me) {
            result.changes.apply_to(state);
        }

        match &action.params {
            ActionParams::Combat {
                target_territory_id,
                ..
            } => {
                let (units_after, captured) = match self.players.get(me) {
                    Some(p) => (
                        p.units.clone(),
                        p.owns_territory(target_territory_id)
                            && !before.owns_territory(target_territory_id),
                    ),
                    None => (BTreeSet::new(), false),
                };
                for lost in before.units.difference(&units_after) {
                    self.units.delete_unit(*lost);
                }
                if captured {
                    self.transfer_territory(target_territory_id, me, now);
                }
            }
            ActionParams::Diplomacy {
                op,
                target_player_id,
                terms,
            } => self.mirror_diplomacy(*op, me, target_player_id, terms.as_ref(), now),
            _ => {}
        }
    }

    fn transfer_territory(&mut self, territory: &str, to: &str, now: Timestamp) {
        let previous = self
            .territory_owners
            .insert(territory.to_string(), to.to_string());
        let Some(previous) = previous.filter(|p| p != to) else {
            log::info!("{} claimed {}", to, territory);
            return;
        };
        if let Some(loser) = self.players.get_mut(&previous) {
            loser.territories.remove(territory);
        }
        self.diplomacy.record_conflict(to, &previous, now);
        if let Some(seat) = self.ai.get_mut(&previous) {
            seat.behavior
                .update_trust(to, TrustDirection::Negative, INVASION_TRUST);
        }
        log::info!("{} captured {} from {}", to, territory, previous);
    }

    /// Carry a diplomacy action over to the counterpart and the diplomatic
    /// ledger. The acting player's own state was already updated by the handler.
    fn mirror_diplomacy(
        &mut self,
        op: DiplomacyOp,
        me: &str,
        other: &str,
        terms: Option<&AllianceTerms>,
        now: Timestamp,
    ) {
        match op {
            DiplomacyOp::ProposeAlliance => {
                let bonus = self.config.diplomacy.resource_sharing_bonus;
                let agreement_terms = AgreementTerms {
                    resource_sharing: terms.filter(|t| t.resource_sharing).map(|_| {
                        [(ResourceKind::Energy, bonus), (ResourceKind::Materials, bonus)]
                            .into_iter()
                            .collect()
                    }),
                    military_support: terms.is_some_and(|t| t.mutual_defense),
                    ..Default::default()
                };
                if let Err(e) = self.diplomacy.propose_agreement(
                    me,
                    other,
                    AgreementType::Alliance,
                    agreement_terms,
                    now,
                ) {
                    log::warn!("Alliance proposal {} -> {} not recorded: {}", me, other, e);
                }
                if let Some(target) = self.players.get_mut(other) {
                    target.pending_alliances.push(PendingAlliance {
                        target_player_id: me.to_string(),
                        terms: terms.cloned(),
                        proposed_at: now,
                    });
                }
                self.nudge_ai_trust(other, me, TrustDirection::Positive, PROPOSAL_TRUST);
            }

            DiplomacyOp::AcceptAlliance => {
                if let Some(id) = self.open_proposal(other, me) {
                    if let Err(e) = self.diplomacy.accept_agreement(id, me, now) {
                        log::warn!("Alliance {} -> {} not activated: {}", other, me, e);
                    }
                }
                let formed_terms = self
                    .players
                    .get(me)
                    .and_then(|p| p.alliances.iter().find(|a| a.player_id == other))
                    .and_then(|a| a.terms.clone());
                if let Some(proposer) = self.players.get_mut(other) {
                    proposer.pending_alliances.retain(|p| p.target_player_id != me);
                    if !proposer.is_allied_with(me) {
                        proposer.alliances.push(Alliance {
                            player_id: me.to_string(),
                            terms: formed_terms,
                            formed_at: now,
                        });
                    }
                }
                self.nudge_ai_trust(other, me, TrustDirection::Positive, ALLIANCE_TRUST);
            }

            DiplomacyOp::BreakAlliance => {
                if let Some(id) = self.diplomacy.find_agreement(
                    me,
                    other,
                    AgreementType::Alliance,
                    AgreementStatus::Active,
                ) {
                    if let Err(e) = self.diplomacy.break_agreement(id, me, now) {
                        log::warn!("Alliance {} / {} not broken: {}", me, other, e);
                    }
                }
                if let Some(counterpart) = self.players.get_mut(other) {
                    counterpart.alliances.retain(|a| a.player_id != me);
                }
                self.nudge_ai_trust(other, me, TrustDirection::Negative, BETRAYAL_TRUST);
            }
        }
    }

    fn nudge_ai_trust(&mut self, seat: &str, toward: &str, direction: TrustDirection, amount: f64) {
        if let Some(seat) = self.ai.get_mut(seat) {
            seat.behavior.update_trust(toward, direction, amount);
        }
    }

    /// Fire a unit's special ability, charging its cost to the owner.
    pub fn use_ability(
        &mut self,
        player_id: &str,
        unit_id: UnitId,
        ability_id: &str,
        targets: &[UnitId],
    ) -> Result<AbilityUse, SessionError> {
        let player = self
            .players
            .get(player_id)
            .ok_or_else(|| SessionError::UnknownPlayer(player_id.to_string()))?;
        let unit = self
            .units
            .get_unit(unit_id)
            .ok_or(UnitError::UnknownUnit(unit_id))?;
        if unit.owner_id != player_id {
            return Err(SessionError::NotOwner {
                unit: unit_id,
                player: player_id.to_string(),
            });
        }
        let cost = self
            .units
            .ready_ability(unit_id, ability_id)?
            .resource_cost
            .clone();
        if !player.resources.covers(&cost) {
            return Err(SessionError::AbilityCost(ability_id.to_string()));
        }

        let used = self.units.use_special_ability(unit_id, ability_id, targets)?;
        let charge: ResourceImpact = cost.iter().map(|(k, v)| (*k, -v)).collect();
        let max_tech = self.config.technology.max_tech_level;
        if let Some(player) = self.players.get_mut(player_id) {
            player.resources.apply_deltas(&charge, max_tech);
        }
        self.metrics.abilities_used += 1;
        log::debug!(
            "{} used '{}' from {} on {} targets",
            player_id,
            ability_id,
            unit_id,
            used.affected.len()
        );
        Ok(used)
    }

    // --- turn loop ---

    /// Close the current cycle and open the next.
    #[tracing::instrument(skip_all, name = "end_turn")]
    pub fn end_turn(&mut self, now: Timestamp) {
        let turn_started = Instant::now();
        let mut events = Vec::new();

        let started = Instant::now();
        self.units.process_turn_end();
        let destroyed = self.units.remove_destroyed();
        if !destroyed.is_empty() {
            for player in self.players.values_mut() {
                for id in &destroyed {
                    player.units.remove(id);
                }
            }
            log::debug!("Removed {} destroyed units", destroyed.len());
        }
        self.metrics.unit_time += started.elapsed();

        let started = Instant::now();
        self.diplomacy.update(now);
        events.extend(self.diplomacy.drain_events());
        self.metrics.diplomacy_time += started.elapsed();

        let started = Instant::now();
        let update = self.world_events.update(self.cycle, &self.territory_owners);
        let max_tech = self.config.technology.max_tech_level;
        for event in update.started {
            for player_id in &event.affected_players {
                if let Some(player) = self.players.get_mut(player_id) {
                    player.resources.apply_deltas(&event.resource_impact, max_tech);
                }
            }
            log::info!(
                "Game {} cycle {}: {} hits {:?}",
                self.game_id,
                self.cycle,
                event.name,
                event.affected_regions
            );
            events.push(GameEvent::public(now, EventPayload::WorldEvent { event }));
        }
        self.metrics.world_event_time += started.elapsed();

        let started = Instant::now();
        events.extend(self.tick_climate(now));
        self.metrics.climate_time += started.elapsed();

        let started = Instant::now();
        self.credit_production();
        self.metrics.economy_time += started.elapsed();

        self.cycle += 1;
        let turns = self.config.session.turns_per_cycle;
        for player in self.players.values_mut() {
            player.turns_remaining = turns;
        }

        self.publish(events);
        self.metrics.turns += 1;
        self.metrics.turn_time += turn_started.elapsed();
        log::debug!("Game {} advanced to cycle {}", self.game_id, self.cycle);
    }

    fn tick_climate(&self, now: Timestamp) -> Vec<GameEvent> {
        match &self.climate_driver {
            Some((_, rx)) => rx.try_iter().collect(),
            None => self.climate_lock().update_climate(now),
        }
    }

    /// Credit each owned region's climate-adjusted output to its owner.
    /// Effects are applied to a copy so they never compound across cycles.
    fn credit_production(&mut self) {
        let mut effective = self.regions.clone();
        self.climate_lock().apply_climate_effects(&mut effective);
        let max_tech = self.config.technology.max_tech_level;

        for (region, state) in &effective {
            let Some(owner) = self.territory_owners.get(region) else {
                continue;
            };
            let Some(player) = self.players.get_mut(owner) else {
                continue;
            };
            let credit: ResourceImpact = ResourceKind::ALL
                .iter()
                .map(|k| (*k, state.production.get(*k) * state.production_capacity))
                .collect();
            player.resources.apply_deltas(&credit, max_tech);
        }
    }

    /// Hand events to every AI behaviour model, then to the sinks.
    fn publish(&mut self, events: Vec<GameEvent>) {
        if events.is_empty() {
            return;
        }
        let started = Instant::now();
        let mut follow_ups = Vec::new();
        for event in &events {
            for seat in self.ai.values_mut() {
                if let Some(update) = seat.behavior.handle_event(event) {
                    follow_ups.push(update);
                }
            }
        }
        self.metrics.behavior_time += started.elapsed();

        let mut all = events;
        all.extend(follow_ups);
        self.dispatcher.publish(&all);
        self.metrics.events_published += all.len() as u64;
        self.published.extend(all);
    }

    /// Events published since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.published)
    }

    // --- AI ---

    /// What an AI seat gets to see of the game.
    pub fn visible_state(&self, player_id: &str) -> Result<VisibleGameState, SessionError> {
        let player = self
            .players
            .get(player_id)
            .ok_or_else(|| SessionError::UnknownPlayer(player_id.to_string()))?;
        let seat = self
            .ai
            .get(player_id)
            .ok_or_else(|| SessionError::NotAiControlled(player_id.to_string()))?;
        let others: Vec<&PlayerId> = self.players.keys().filter(|p| *p != player_id).collect();

        Ok(VisibleGameState {
            player_id: player_id.to_string(),
            cycle: self.cycle,
            player: player.clone(),
            territory_owners: self.territory_owners.clone(),
            known_players: self.players.keys().cloned().collect(),
            diplomatic_trust: others
                .iter()
                .map(|o| ((*o).clone(), self.diplomacy.trust(player_id, o)))
                .collect(),
            ai_trust: seat.behavior.trust_levels(),
            personality: seat.behavior.personality(),
            pattern: seat.behavior.current_pattern().clone(),
            incoming_proposals: others
                .iter()
                .filter(|o| self.open_proposal(o, player_id).is_some())
                .map(|o| (*o).clone())
                .collect(),
        })
    }

    /// Let one AI act until it passes, runs out of turns, or stops making
    /// progress. Returns how many of its actions succeeded.
    #[tracing::instrument(skip_all, name = "ai_turn", fields(player = player_id))]
    pub fn take_ai_turn(&mut self, player_id: &str, now: Timestamp) -> Result<u32, SessionError> {
        let started = Instant::now();
        let mut succeeded = 0;

        for _ in 0..self.config.session.turns_per_cycle {
            let view = self.visible_state(player_id)?;
            let candidates = available_actions(&view, &self.config);
            let seat = self
                .ai
                .get_mut(player_id)
                .ok_or_else(|| SessionError::NotAiControlled(player_id.to_string()))?;
            let picks = seat.player.decide(&view, &candidates);
            if picks.is_empty() {
                break;
            }

            let mut progressed = false;
            for params in picks {
                let action =
                    GameAction::new(self.game_id.clone(), player_id, self.cycle, params, now);
                if self.submit(action)?.success {
                    succeeded += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        self.metrics.ai_time += started.elapsed();
        Ok(succeeded)
    }

    /// One turn for every AI seat, in player-id order.
    pub fn run_ai_turns(&mut self, now: Timestamp) -> Result<u32, SessionError> {
        let seated: Vec<PlayerId> = self.ai.keys().cloned().collect();
        let mut total = 0;
        for player_id in seated {
            total += self.take_ai_turn(&player_id, now)?;
        }
        Ok(total)
    }

    // --- climate driver ---

    /// Move climate updates onto a wall-clock thread. From now on
    /// [`end_turn`](Self::end_turn) collects what the driver produced instead
    /// of ticking the climate itself.
    pub fn start_climate_driver(&mut self) -> bool {
        if self.climate_driver.is_some() {
            return false;
        }
        let (mut driver, rx) = ClimateDriver::new(Arc::clone(&self.climate));
        driver.start();
        self.climate_driver = Some((driver, rx));
        true
    }

    pub fn stop_climate_driver(&mut self) -> bool {
        let Some((mut driver, rx)) = self.climate_driver.take() else {
            return false;
        };
        driver.stop();
        let leftovers: Vec<GameEvent> = rx.try_iter().collect();
        self.publish(leftovers);
        true
    }

    // --- end of game ---

    pub fn finish(&mut self) {
        if self.phase == GamePhase::Finished {
            return;
        }
        self.stop_climate_driver();
        self.phase = GamePhase::Finished;
        self.dispatcher.flush();
        log::info!(
            "Game {} finished after {} cycles",
            self.game_id,
            self.metrics.turns
        );
    }

    /// Standings ordered by territories, then technology, then id.
    pub fn summary(&self) -> Vec<PlayerSummary> {
        let mut standings: Vec<PlayerSummary> = self
            .players
            .iter()
            .map(|(id, p)| PlayerSummary {
                player_id: id.clone(),
                territories: p.territories.len(),
                units: p.units.len(),
                technology: p.resources.technology,
                alliances: p.alliances.iter().map(|a| a.player_id.clone()).collect(),
                resources: p.resources,
            })
            .collect();
        standings.sort_by(|a, b| {
            b.territories
                .cmp(&a.territories)
                .then(b.technology.total_cmp(&a.technology))
                .then(a.player_id.cmp(&b.player_id))
        });
        standings
    }
}
