//! Bilateral trust ledger and agreement lifecycle.
//!
//! ```text
//!  proposed ──accept──▶ active ──break──▶ broken
//!                          │
//!                          └──endTime passed (update)──▶ expired
//! ```
//!
//! One [`DiplomaticRelation`] exists per unordered pair of players, keyed
//! by the sorted pair and created on first mutation. Notifications are
//! buffered and collected with [`DiplomaticSystem::drain_events`].

use crate::bounded::{new_diplomatic_trust, BoundedF64};
use crate::config::DiplomacyConfig;
use crate::events::{DiplomaticStep, EventPayload, GameEvent};
use crate::state::{PlayerId, ResourceImpact, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

const RECENT_ACTIONS: usize = 10;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AgreementId(pub u64);

impl std::fmt::Display for AgreementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agreement-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgreementType {
    Alliance,
    Trade,
    NonAggression,
    Research,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Proposed,
    Active,
    Expired,
    Broken,
}

impl std::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgreementStatus::Proposed => "proposed",
            AgreementStatus::Active => "active",
            AgreementStatus::Expired => "expired",
            AgreementStatus::Broken => "broken",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgreementTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_sharing: Option<ResourceImpact>,
    #[serde(default)]
    pub military_support: bool,
    #[serde(default)]
    pub technology_sharing: bool,
    /// Lifetime once accepted; open-ended when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaticAgreement {
    pub id: AgreementId,
    pub agreement_type: AgreementType,
    /// `[proposer, counterpart]`.
    pub parties: [PlayerId; 2],
    pub terms: AgreementTerms,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub status: AgreementStatus,
}

impl DiplomaticAgreement {
    pub fn involves(&self, player: &str) -> bool {
        self.parties.iter().any(|p| p == player)
    }

    fn other_party(&self, player: &str) -> &PlayerId {
        if self.parties[0] == player {
            &self.parties[1]
        } else {
            &self.parties[0]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaticRelation {
    pub trust: BoundedF64,
    pub trade_count: u32,
    pub conflict_count: u32,
    /// Days the pair has spent in an active alliance.
    pub alliance_duration: f64,
    pub last_interaction: Timestamp,
}

impl DiplomaticRelation {
    fn new(now: Timestamp) -> Self {
        Self {
            trust: new_diplomatic_trust(),
            trade_count: 0,
            conflict_count: 0,
            alliance_duration: 0.0,
            last_interaction: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaticRecord {
    pub step: DiplomaticStep,
    pub source: PlayerId,
    pub target: PlayerId,
    pub agreement_id: AgreementId,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationStatus {
    pub trust: f64,
    /// Active agreements between the pair.
    pub agreements: Vec<DiplomaticAgreement>,
    /// Up to the last ten actions between the pair, oldest first.
    pub recent_actions: Vec<DiplomaticRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiplomaticMetrics {
    pub active_agreements: usize,
    pub active_alliances: usize,
    pub average_trust: f64,
    pub most_trusted: Option<([PlayerId; 2], f64)>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiplomacyError {
    #[error("A player cannot enter an agreement with themselves")]
    SelfAgreement,
    #[error("Insufficient trust: required {required}, actual {actual}")]
    InsufficientTrust { required: f64, actual: f64 },
    #[error("Alliance limit reached")]
    AllianceLimit,
    #[error("Unknown agreement: {0}")]
    UnknownAgreement(AgreementId),
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: AgreementStatus,
        to: AgreementStatus,
    },
    #[error("Player is not a party to the agreement")]
    NotAParty,
    #[error("The proposer cannot accept their own proposal")]
    AcceptorIsProposer,
}

fn relation_key(a: &str, b: &str) -> (PlayerId, PlayerId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct DiplomaticSystem {
    config: DiplomacyConfig,
    relations: BTreeMap<(PlayerId, PlayerId), DiplomaticRelation>,
    agreements: BTreeMap<AgreementId, DiplomaticAgreement>,
    history: Vec<DiplomaticRecord>,
    next_agreement: u64,
    outbox: Vec<GameEvent>,
}

impl DiplomaticSystem {
    pub fn new(config: DiplomacyConfig) -> Self {
        Self {
            config,
            relations: BTreeMap::new(),
            agreements: BTreeMap::new(),
            history: Vec::new(),
            next_agreement: 0,
            outbox: Vec::new(),
        }
    }

    fn relation_mut(&mut self, a: &str, b: &str, now: Timestamp) -> &mut DiplomaticRelation {
        self.relations
            .entry(relation_key(a, b))
            .or_insert_with(|| DiplomaticRelation::new(now))
    }

    pub fn relation(&self, a: &str, b: &str) -> Option<&DiplomaticRelation> {
        self.relations.get(&relation_key(a, b))
    }

    /// Pairwise trust; neutral (0) for players that never interacted.
    pub fn trust(&self, a: &str, b: &str) -> f64 {
        self.relation(a, b).map_or(0.0, |r| r.trust.get())
    }

    pub fn agreement(&self, id: AgreementId) -> Option<&DiplomaticAgreement> {
        self.agreements.get(&id)
    }

    /// Adjust trust, clamped to [-100, 100]. Counts as an interaction.
    pub fn modify_trust(&mut self, a: &str, b: &str, amount: f64, now: Timestamp) -> f64 {
        let relation = self.relation_mut(a, b, now);
        relation.trust.add(amount);
        relation.last_interaction = now;
        let trust = relation.trust.get();

        self.outbox.push(GameEvent::public(
            now,
            EventPayload::TrustChanged {
                player_a: a.to_string(),
                player_b: b.to_string(),
                delta: amount,
                trust,
            },
        ));
        trust
    }

    pub fn record_trade(&mut self, a: &str, b: &str, now: Timestamp) {
        let relation = self.relation_mut(a, b, now);
        relation.trade_count += 1;
        relation.last_interaction = now;
    }

    pub fn record_conflict(&mut self, a: &str, b: &str, now: Timestamp) {
        let relation = self.relation_mut(a, b, now);
        relation.conflict_count += 1;
        relation.last_interaction = now;
    }

    fn threshold(&self, agreement_type: AgreementType) -> Option<f64> {
        match agreement_type {
            AgreementType::Alliance => Some(self.config.alliance_trust_threshold),
            AgreementType::Trade => Some(self.config.trade_trust_threshold),
            AgreementType::NonAggression => Some(self.config.non_aggression_trust_threshold),
            AgreementType::Research => self.config.research_trust_threshold,
        }
    }

    fn active_alliance_count(&self, player: &str) -> usize {
        self.agreements
            .values()
            .filter(|a| {
                a.agreement_type == AgreementType::Alliance
                    && a.status == AgreementStatus::Active
                    && a.involves(player)
            })
            .count()
    }

    /// Both players are below the active-alliance limit.
    pub fn check_alliance_capacity(&self, a: &str, b: &str) -> Result<(), DiplomacyError> {
        let max = self.config.max_active_alliances;
        if self.active_alliance_count(a) >= max || self.active_alliance_count(b) >= max {
            return Err(DiplomacyError::AllianceLimit);
        }
        Ok(())
    }

    /// Whether `a` and `b` may enter a new agreement of this type.
    pub fn can_form_agreement(
        &self,
        a: &str,
        b: &str,
        agreement_type: AgreementType,
    ) -> Result<(), DiplomacyError> {
        if a == b {
            return Err(DiplomacyError::SelfAgreement);
        }
        if let Some(required) = self.threshold(agreement_type) {
            let actual = self.trust(a, b);
            if actual < required {
                return Err(DiplomacyError::InsufficientTrust { required, actual });
            }
        }
        if agreement_type == AgreementType::Alliance {
            self.check_alliance_capacity(a, b)?;
        }
        Ok(())
    }

    fn log_action(
        &mut self,
        step: DiplomaticStep,
        source: &str,
        agreement: &DiplomaticAgreement,
        now: Timestamp,
    ) {
        let target = agreement.other_party(source).clone();
        log::debug!(
            "{} {:?} {} -> {} ({:?})",
            agreement.id,
            step,
            source,
            target,
            agreement.agreement_type
        );
        self.history.push(DiplomaticRecord {
            step,
            source: source.to_string(),
            target,
            agreement_id: agreement.id,
            timestamp: now,
        });
        self.outbox.push(GameEvent::public(
            now,
            EventPayload::DiplomaticAction {
                agreement_id: agreement.id,
                agreement_type: agreement.agreement_type,
                step,
                parties: agreement.parties.clone(),
            },
        ));
    }

    pub fn propose_agreement(
        &mut self,
        source: &str,
        target: &str,
        agreement_type: AgreementType,
        terms: AgreementTerms,
        now: Timestamp,
    ) -> Result<&DiplomaticAgreement, DiplomacyError> {
        self.can_form_agreement(source, target, agreement_type)?;

        self.next_agreement += 1;
        let id = AgreementId(self.next_agreement);
        let agreement = DiplomaticAgreement {
            id,
            agreement_type,
            parties: [source.to_string(), target.to_string()],
            terms,
            start_time: now,
            end_time: None,
            status: AgreementStatus::Proposed,
        };
        self.log_action(DiplomaticStep::Proposed, source, &agreement, now);
        Ok(&*self.agreements.entry(id).or_insert(agreement))
    }

    /// `proposed -> active` by the counterpart.
    pub fn accept_agreement(
        &mut self,
        id: AgreementId,
        accepting: &str,
        now: Timestamp,
    ) -> Result<(), DiplomacyError> {
        let agreement = self
            .agreements
            .get(&id)
            .ok_or(DiplomacyError::UnknownAgreement(id))?;
        if agreement.status != AgreementStatus::Proposed {
            return Err(DiplomacyError::InvalidTransition {
                from: agreement.status,
                to: AgreementStatus::Active,
            });
        }
        if !agreement.involves(accepting) {
            return Err(DiplomacyError::NotAParty);
        }
        if agreement.parties[0] == accepting {
            return Err(DiplomacyError::AcceptorIsProposer);
        }
        let [a, b] = agreement.parties.clone();
        if agreement.agreement_type == AgreementType::Alliance {
            self.check_alliance_capacity(&a, &b)?;
        }

        let Some(agreement) = self.agreements.get_mut(&id) else {
            return Err(DiplomacyError::UnknownAgreement(id));
        };
        agreement.status = AgreementStatus::Active;
        agreement.start_time = now;
        agreement.end_time = agreement
            .terms
            .duration_secs
            .map(|secs| now.add(Duration::from_secs(secs)));
        let snapshot = agreement.clone();

        self.log_action(DiplomaticStep::Accepted, accepting, &snapshot, now);
        self.modify_trust(&a, &b, self.config.accept_trust_bonus, now);
        Ok(())
    }

    /// `active -> broken` by either party.
    pub fn break_agreement(
        &mut self,
        id: AgreementId,
        breaking: &str,
        now: Timestamp,
    ) -> Result<(), DiplomacyError> {
        let Some(agreement) = self.agreements.get_mut(&id) else {
            return Err(DiplomacyError::UnknownAgreement(id));
        };
        if agreement.status != AgreementStatus::Active {
            return Err(DiplomacyError::InvalidTransition {
                from: agreement.status,
                to: AgreementStatus::Broken,
            });
        }
        if !agreement.involves(breaking) {
            return Err(DiplomacyError::NotAParty);
        }
        agreement.status = AgreementStatus::Broken;
        agreement.end_time = Some(now);
        let snapshot = agreement.clone();
        let other = snapshot.other_party(breaking).clone();

        self.log_action(DiplomaticStep::Broken, breaking, &snapshot, now);
        self.modify_trust(breaking, &other, -self.config.break_trust_penalty, now);
        Ok(())
    }

    /// Most recent agreement of `agreement_type` between the pair in `status`.
    pub fn find_agreement(
        &self,
        a: &str,
        b: &str,
        agreement_type: AgreementType,
        status: AgreementStatus,
    ) -> Option<AgreementId> {
        self.agreements
            .values()
            .rev()
            .find(|ag| {
                ag.agreement_type == agreement_type
                    && ag.status == status
                    && ag.involves(a)
                    && ag.involves(b)
            })
            .map(|ag| ag.id)
    }

    pub fn active_agreements(&self, player: &str) -> Vec<&DiplomaticAgreement> {
        self.agreements
            .values()
            .filter(|a| a.status == AgreementStatus::Active && a.involves(player))
            .collect()
    }

    pub fn are_allies(&self, a: &str, b: &str) -> bool {
        self.find_agreement(a, b, AgreementType::Alliance, AgreementStatus::Active)
            .is_some()
    }

    /// `100 * |players|` plus positive pairwise trust plus up to 500 per
    /// active alliance covering every player, at 10 per day of age.
    pub fn calculate_alliance_strength(&self, players: &[PlayerId], now: Timestamp) -> f64 {
        let mut strength = players.len() as f64 * 100.0;

        for (i, a) in players.iter().enumerate() {
            for b in &players[i + 1..] {
                strength += self.trust(a, b).max(0.0);
            }
        }

        for alliance in self.agreements.values().filter(|ag| {
            ag.agreement_type == AgreementType::Alliance
                && ag.status == AgreementStatus::Active
                && players.iter().all(|p| ag.involves(p))
        }) {
            strength += (now.days_since(alliance.start_time) * 10.0).min(500.0);
        }

        strength
    }

    pub fn relation_status(&self, a: &str, b: &str) -> RelationStatus {
        let agreements = self
            .active_agreements(a)
            .into_iter()
            .filter(|ag| ag.involves(b))
            .cloned()
            .collect();
        let between: Vec<_> = self
            .history
            .iter()
            .filter(|r| (r.source == a && r.target == b) || (r.source == b && r.target == a))
            .collect();
        let recent_actions = between[between.len().saturating_sub(RECENT_ACTIONS)..]
            .iter()
            .map(|r| (*r).clone())
            .collect();

        RelationStatus {
            trust: self.trust(a, b),
            agreements,
            recent_actions,
        }
    }

    pub fn diplomatic_metrics(&self) -> DiplomaticMetrics {
        let active: Vec<_> = self
            .agreements
            .values()
            .filter(|a| a.status == AgreementStatus::Active)
            .collect();

        let average_trust = if self.relations.is_empty() {
            0.0
        } else {
            self.relations.values().map(|r| r.trust.get()).sum::<f64>()
                / self.relations.len() as f64
        };

        let most_trusted = self
            .relations
            .iter()
            .fold(None::<(&(PlayerId, PlayerId), f64)>, |best, (key, r)| {
                let trust = r.trust.get();
                match best {
                    Some((_, t)) if t >= trust => best,
                    _ => Some((key, trust)),
                }
            })
            .map(|((a, b), trust)| ([a.clone(), b.clone()], trust));

        DiplomaticMetrics {
            active_agreements: active.len(),
            active_alliances: active
                .iter()
                .filter(|a| a.agreement_type == AgreementType::Alliance)
                .count(),
            average_trust,
            most_trusted,
        }
    }

    /// Expire agreements past their end time, refresh alliance durations
    /// and decay trust between idle pairs.
    pub fn update(&mut self, now: Timestamp) {
        let mut expired = Vec::new();
        let mut allied = Vec::new();
        for agreement in self.agreements.values_mut() {
            if agreement.status != AgreementStatus::Active {
                continue;
            }
            match agreement.end_time {
                Some(end) if end <= now => {
                    agreement.status = AgreementStatus::Expired;
                    expired.push((agreement.id, agreement.parties.clone()));
                }
                _ if agreement.agreement_type == AgreementType::Alliance => {
                    allied.push((
                        agreement.parties.clone(),
                        now.days_since(agreement.start_time),
                    ));
                }
                _ => {}
            }
        }

        for (agreement_id, parties) in expired {
            log::debug!("{} expired", agreement_id);
            self.outbox.push(GameEvent::public(
                now,
                EventPayload::AgreementExpired {
                    agreement_id,
                    parties,
                },
            ));
        }

        for ([a, b], days) in allied {
            self.relation_mut(&a, &b, now).alliance_duration = days;
        }

        let period = self.config.decay_after_days.max(1) as f64;
        let decaying: Vec<_> = self
            .relations
            .iter()
            .filter_map(|(key, r)| {
                let idle = now.days_since(r.last_interaction);
                (idle > period).then(|| (key.clone(), (idle / period).floor()))
            })
            .collect();
        for ((a, b), steps) in decaying {
            self.modify_trust(&a, &b, -steps, now);
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }
}

impl Default for DiplomaticSystem {
    fn default() -> Self {
        Self::new(DiplomacyConfig::default())
    }
}
