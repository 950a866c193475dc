//! Completed-session history: records, aggregate stats and streaks.
//!
//! Persistence lives in [`crate::storage::Database`]; this module only holds
//! the domain types and the pure calculations over them.

mod streak;

pub use streak::current_streak;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// A stored session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub duration_min: u64,
    /// Focus length configured when the session ran.
    pub focus_interval_min: u64,
    /// Local calendar day the session counts towards.
    pub date: NaiveDate,
    pub completed: bool,
    pub session_type: TimerMode,
}

/// A session about to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub started_at: DateTime<Utc>,
    pub duration_min: u64,
    pub focus_interval_min: u64,
    pub date: NaiveDate,
    pub completed: bool,
    pub session_type: TimerMode,
}

impl NewSession {
    /// A completed focus session.
    pub fn focus(started_at: DateTime<Utc>, duration_min: u64, focus_interval_min: u64, date: NaiveDate) -> Self {
        Self {
            started_at,
            duration_min,
            focus_interval_min,
            date,
            completed: true,
            session_type: TimerMode::Focus,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub total_focus_min: u64,
    /// Distinct days with at least one session.
    pub active_days: u64,
    pub streak_days: u32,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}
