//! Game notifications and their delivery.
//!
//! Systems never push to subscribers themselves: every operation returns
//! (or buffers) the [`GameEvent`]s it produced and the owner of the game
//! hands them to an [`EventDispatcher`]. Delivery is fire-and-forget; a sink
//! that fails is logged and skipped, never retried and never allowed to
//! stall the game.
//!
//! ```text
//! GameSession ──events──▶ EventDispatcher ──┬── JsonlEventSink (file/stdout)
//!                                           └── ChannelEventSink (crossbeam)
//! ```

use crate::ai::Strategy;
use crate::climate::ClimateEffect;
use crate::diplomacy::{AgreementId, AgreementType};
use crate::input::{ActionId, ActionKind};
use crate::state::{PlayerId, TerritoryId, Timestamp, UnitId};
use crate::world_events::WorldEvent;
use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl EventId {
    pub fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    /// Broadcast to every player.
    Public,
    /// Only the players named in the payload.
    Private,
    /// The acting player and their allies.
    Alliance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiplomaticStep {
    Proposed,
    Accepted,
    Broken,
}

/// Event body. Serialized with a `type` discriminant:
/// ```json
/// {"id":7,"timestamp":1700000000000,"visibility":"PUBLIC","type":"combat_result",...}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    CombatResult {
        player_id: PlayerId,
        target_territory_id: TerritoryId,
        success: bool,
        destroyed_units: Vec<UnitId>,
        /// Whether the territory changed hands.
        territory_changed: bool,
    },
    WorldEvent {
        event: WorldEvent,
    },
    ClimateEffect {
        effect: ClimateEffect,
    },
    ClimateExpired {
        effect_id: u64,
    },
    DiplomaticAction {
        agreement_id: AgreementId,
        agreement_type: AgreementType,
        step: DiplomaticStep,
        parties: [PlayerId; 2],
    },
    AgreementExpired {
        agreement_id: AgreementId,
        parties: [PlayerId; 2],
    },
    TrustChanged {
        player_a: PlayerId,
        player_b: PlayerId,
        delta: f64,
        trust: f64,
    },
    BehaviorUpdated {
        player_id: PlayerId,
        primary_strategy: Strategy,
        secondary_strategy: Strategy,
    },
    ActionResolved {
        action_id: ActionId,
        player_id: PlayerId,
        action_type: ActionKind,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl EventPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::CombatResult { .. } => "combat_result",
            EventPayload::WorldEvent { .. } => "world_event",
            EventPayload::ClimateEffect { .. } => "climate_effect",
            EventPayload::ClimateExpired { .. } => "climate_expired",
            EventPayload::DiplomaticAction { .. } => "diplomatic_action",
            EventPayload::AgreementExpired { .. } => "agreement_expired",
            EventPayload::TrustChanged { .. } => "trust_changed",
            EventPayload::BehaviorUpdated { .. } => "behavior_updated",
            EventPayload::ActionResolved { .. } => "action_resolved",
        }
    }
}

/// A transient notification. The core does not persist these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub visibility: Visibility,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl GameEvent {
    pub fn new(timestamp: Timestamp, visibility: Visibility, payload: EventPayload) -> Self {
        Self {
            id: EventId::next(),
            timestamp,
            visibility,
            payload,
        }
    }

    pub fn public(timestamp: Timestamp, payload: EventPayload) -> Self {
        Self::new(timestamp, Visibility::Public, payload)
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Bounded channel at capacity; the event was dropped.
    #[error("Sink full")]
    Full,
    #[error("Sink disconnected")]
    Disconnected,
    #[error("Sink lock poisoned")]
    Poisoned,
}

/// Receiver of published events.
///
/// Implementations must not block: a sink that cannot accept an event
/// returns an error and the event is dropped for that sink.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &GameEvent) -> Result<(), SinkError>;

    fn name(&self) -> &str;

    fn flush(&self) {}
}

/// Fan-out of events to every registered sink.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { sinks: vec![] }
    }

    pub fn register(&mut self, sink: Box<dyn EventSink>) {
        log::info!("Registered event sink: {}", sink.name());
        self.sinks.push(sink);
    }

    /// Errors are logged but do not propagate.
    pub fn publish(&self, events: &[GameEvent]) {
        for sink in &self.sinks {
            for event in events {
                if let Err(e) = sink.publish(event) {
                    log::warn!(
                        "Event sink '{}' dropped {} {:?}: {}",
                        sink.name(),
                        event.type_name(),
                        event.id,
                        e
                    );
                }
            }
        }
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Writes one JSON object per line to any `Write` destination.
pub struct JsonlEventSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlEventSink {
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl EventSink for JsonlEventSink {
    fn publish(&self, event: &GameEvent) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "JsonlEventSink"
    }

    fn flush(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

/// Forwards events into a crossbeam channel without blocking.
pub struct ChannelEventSink {
    tx: Sender<GameEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: Sender<GameEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: &GameEvent) -> Result<(), SinkError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Disconnected(_) => SinkError::Disconnected,
        })
    }

    fn name(&self) -> &str {
        "ChannelEventSink"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    struct OutputCapture(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl Write for OutputCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.0.lock().unwrap().flush()
        }
    }

    fn trust_event() -> GameEvent {
        GameEvent::public(
            Timestamp::from_millis(1000),
            EventPayload::TrustChanged {
                player_a: "a".into(),
                player_b: "b".into(),
                delta: 10.0,
                trust: 60.0,
            },
        )
    }

    #[test]
    fn test_event_json_is_flat() {
        let json = serde_json::to_value(trust_event()).unwrap();
        assert_eq!(json["type"], "trust_changed");
        assert_eq!(json["visibility"], "PUBLIC");
        assert_eq!(json["trust"], 60.0);
    }

    #[test]
    fn test_jsonl_sink_writes_lines() {
        let output = Arc::new(Mutex::new(Cursor::new(Vec::new())));
        let sink = JsonlEventSink::new(Box::new(OutputCapture(output.clone())));

        sink.publish(&trust_event()).unwrap();
        sink.publish(&trust_event()).unwrap();
        sink.flush();

        let data = output.lock().unwrap();
        let text = String::from_utf8(data.get_ref().clone()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: GameEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.type_name(), "trust_changed");
    }

    #[test]
    fn test_full_channel_does_not_block() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Box::new(ChannelEventSink::new(tx)));

        dispatcher.publish(&[trust_event(), trust_event(), trust_event()]);

        assert_eq!(rx.len(), 1);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_disconnected_sink_is_reported() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let sink = ChannelEventSink::new(tx);
        assert!(matches!(
            sink.publish(&trust_event()),
            Err(SinkError::Disconnected)
        ));
    }
}
