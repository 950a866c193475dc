use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// Every state change of the timer produces an Event.
/// The CLI prints them; the background service fans them out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        duration_secs: u64,
        completed_focus: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        mode: TimerMode,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero.
    TimerFinished {
        mode: TimerMode,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    ModeAdvanced {
        from: TimerMode,
        to: TimerMode,
        completed_focus: u32,
        at: DateTime<Utc>,
    },
    /// A focus interval was written to the history store.
    SessionRecorded {
        session_id: i64,
        duration_min: u64,
        at: DateTime<Utc>,
    },
    /// A notification passed the user's toggles and was handed to the sink.
    Notified {
        title: String,
        body: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// When the change happened. Replayed ticks carry the time of the
    /// second they stand for.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TimerStarted { at, .. }
            | Event::TimerPaused { at, .. }
            | Event::TimerResumed { at, .. }
            | Event::TimerStopped { at, .. }
            | Event::TimerFinished { at, .. }
            | Event::ModeAdvanced { at, .. }
            | Event::SessionRecorded { at, .. }
            | Event::Notified { at, .. } => *at,
        }
    }
}
