use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated counters and timings for one session.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub turns: u64,
    pub actions_submitted: u64,
    pub actions_succeeded: u64,
    pub actions_rejected: u64,
    pub abilities_used: u64,
    pub events_published: u64,
    pub action_time: Duration,
    pub unit_time: Duration,
    pub diplomacy_time: Duration,
    pub world_event_time: Duration,
    pub climate_time: Duration,
    pub economy_time: Duration,
    /// Time spent handing events to AI behaviour models
    pub behavior_time: Duration,
    pub ai_time: Duration,
    pub turn_time: Duration,
}

impl SessionMetrics {
    pub fn turn_avg_ms(&self) -> f64 {
        if self.turns == 0 {
            0.0
        } else {
            self.turn_time.as_secs_f64() * 1000.0 / self.turns as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.actions_submitted == 0 {
            0.0
        } else {
            self.actions_succeeded as f64 / self.actions_submitted as f64
        }
    }

    /// Fold another session's totals into this one.
    pub fn merge(&mut self, other: &SessionMetrics) {
        self.turns += other.turns;
        self.actions_submitted += other.actions_submitted;
        self.actions_succeeded += other.actions_succeeded;
        self.actions_rejected += other.actions_rejected;
        self.abilities_used += other.abilities_used;
        self.events_published += other.events_published;
        self.action_time += other.action_time;
        self.unit_time += other.unit_time;
        self.diplomacy_time += other.diplomacy_time;
        self.world_event_time += other.world_event_time;
        self.climate_time += other.climate_time;
        self.economy_time += other.economy_time;
        self.behavior_time += other.behavior_time;
        self.ai_time += other.ai_time;
        self.turn_time += other.turn_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_with_no_data() {
        let metrics = SessionMetrics::default();
        assert_eq!(metrics.turn_avg_ms(), 0.0);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_merge() {
        let mut a = SessionMetrics {
            turns: 2,
            actions_submitted: 4,
            actions_succeeded: 3,
            turn_time: Duration::from_millis(10),
            ..Default::default()
        };
        let b = SessionMetrics {
            turns: 2,
            actions_submitted: 4,
            actions_succeeded: 1,
            turn_time: Duration::from_millis(30),
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.turns, 4);
        assert_eq!(a.success_rate(), 0.5);
        assert_eq!(a.turn_avg_ms(), 10.0);
    }
}
