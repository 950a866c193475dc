//! Timer engine implementation.
//!
//! The engine is a one-second countdown with no internal thread. Every call
//! to `tick()` consumes exactly one second; the caller decides when a second
//! has passed (the async service uses a tokio interval, the CLI replays the
//! wall-clock seconds that elapsed between invocations).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |
//!           v
//!        Finished -> (advance) -> Idle
//! ```
//!
//! `stop()` returns to Idle from any state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::{next_mode, Durations, TimerMode};
use crate::error::ValidationError;
use crate::events::Event;
use crate::format::{format_clock, progress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Read-only view of the engine, published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub mode: TimerMode,
    pub total_secs: u64,
    pub remaining_secs: u64,
    pub elapsed_secs: u64,
    /// 0.0 .. 1.0 progress within the current interval.
    pub progress: f64,
    /// Focus intervals finished in the current cycle.
    pub completed_focus: u32,
    pub cycle_length: u32,
    /// Remaining time as `MM:SS`.
    pub display: String,
}

/// Core timer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    mode: TimerMode,
    state: TimerState,
    total_secs: u64,
    remaining_secs: u64,
    completed_focus: u32,
    cycle_length: u32,
    /// Seconds spent in `Finished` since the countdown hit zero.
    #[serde(default)]
    finished_ticks: u64,
    /// Wall-clock anchor (ms since epoch) of the last whole second accounted
    /// for. Present only while the clock is live (running or finished).
    #[serde(default)]
    last_tick_epoch_ms: Option<u64>,
}

impl TimerEngine {
    /// Create an idle engine in focus mode with a full focus interval loaded.
    pub fn new(durations: &Durations, cycle_length: u32) -> Self {
        Self {
            mode: TimerMode::Focus,
            state: TimerState::Idle,
            total_secs: durations.focus_secs,
            remaining_secs: durations.focus_secs,
            completed_focus: 0,
            cycle_length: cycle_length.max(1),
            finished_ticks: 0,
            last_tick_epoch_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.total_secs.saturating_sub(self.remaining_secs)
    }

    pub fn progress(&self) -> f64 {
        progress(self.total_secs, self.remaining_secs)
    }

    pub fn completed_focus(&self) -> u32 {
        self.completed_focus
    }

    pub fn cycle_length(&self) -> u32 {
        self.cycle_length
    }

    pub fn finished_ticks(&self) -> u64 {
        self.finished_ticks
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.state,
            mode: self.mode,
            total_secs: self.total_secs,
            remaining_secs: self.remaining_secs,
            elapsed_secs: self.elapsed_secs(),
            progress: self.progress(),
            completed_focus: self.completed_focus,
            cycle_length: self.cycle_length,
            display: format_clock(self.remaining_secs),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Load `duration_secs` for `mode` and start counting down.
    ///
    /// Replaces whatever countdown was in progress. The cycle counter is kept.
    pub fn start(&mut self, mode: TimerMode, duration_secs: u64) -> Result<Event, ValidationError> {
        self.start_at(mode, duration_secs, Utc::now())
    }

    /// [`TimerEngine::start`] with the event stamped `at`.
    pub fn start_at(
        &mut self,
        mode: TimerMode,
        duration_secs: u64,
        at: DateTime<Utc>,
    ) -> Result<Event, ValidationError> {
        if duration_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "duration".into(),
                message: "must be at least one second".into(),
            });
        }
        self.mode = mode;
        self.total_secs = duration_secs;
        self.remaining_secs = duration_secs;
        self.state = TimerState::Running;
        self.finished_ticks = 0;
        self.last_tick_epoch_ms.get_or_insert_with(now_ms);
        Ok(Event::TimerStarted {
            mode,
            duration_secs,
            completed_focus: self.completed_focus,
            at,
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.state = TimerState::Paused;
                self.last_tick_epoch_ms = None;
                Some(Event::TimerPaused {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Paused => {
                self.state = TimerState::Running;
                self.last_tick_epoch_ms = Some(now_ms());
                Some(Event::TimerResumed {
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Abandon the current countdown and reload the configured duration.
    pub fn stop(&mut self, durations: &Durations) -> Event {
        self.state = TimerState::Idle;
        self.total_secs = durations.for_mode(self.mode);
        self.remaining_secs = self.total_secs;
        self.finished_ticks = 0;
        self.last_tick_epoch_ms = None;
        Event::TimerStopped {
            mode: self.mode,
            at: Utc::now(),
        }
    }

    /// Consume one second. Returns `Some(Event::TimerFinished)` on the tick
    /// that brings the countdown to zero.
    pub fn tick(&mut self) -> Option<Event> {
        self.tick_at(Utc::now())
    }

    /// One tick, with a finish event stamped `at`.
    pub fn tick_at(&mut self, at: DateTime<Utc>) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.remaining_secs = self.remaining_secs.saturating_sub(1);
                if self.remaining_secs == 0 {
                    self.state = TimerState::Finished;
                    self.finished_ticks = 0;
                    return Some(Event::TimerFinished {
                        mode: self.mode,
                        duration_secs: self.total_secs,
                        at,
                    });
                }
                None
            }
            TimerState::Finished => {
                self.finished_ticks = self.finished_ticks.saturating_add(1);
                None
            }
            TimerState::Idle | TimerState::Paused => None,
        }
    }

    /// Move to the next interval of the cycle and leave it idle.
    pub fn advance(&mut self, durations: &Durations) -> Event {
        self.advance_at(durations, Utc::now())
    }

    pub fn advance_at(&mut self, durations: &Durations, at: DateTime<Utc>) -> Event {
        let from = self.mode;
        let (to, completed) = next_mode(from, self.completed_focus, self.cycle_length);
        self.mode = to;
        self.completed_focus = completed;
        self.state = TimerState::Idle;
        self.total_secs = durations.for_mode(to);
        self.remaining_secs = self.total_secs;
        self.finished_ticks = 0;
        Event::ModeAdvanced {
            from,
            to,
            completed_focus: completed,
            at,
        }
    }

    /// Take new durations and cycle length into account.
    ///
    /// Only an idle engine reloads its countdown; a running, paused or
    /// finished interval keeps the length it was started with.
    pub fn apply_settings(&mut self, durations: &Durations, cycle_length: u32) {
        self.cycle_length = cycle_length.max(1);
        self.completed_focus = self.completed_focus.min(self.cycle_length - 1);
        if self.state == TimerState::Idle {
            self.total_secs = durations.for_mode(self.mode);
            self.remaining_secs = self.total_secs;
        }
    }

    /// Whole seconds of wall-clock time that passed since the last call.
    ///
    /// The anchor only moves by whole seconds so fractions carry over to the
    /// next call. A clock that went backwards moves the anchor back with it.
    pub fn take_due_ticks(&mut self, now_ms: u64) -> u64 {
        match self.last_tick_epoch_ms {
            Some(last) if now_ms >= last => {
                let secs = (now_ms - last) / 1000;
                self.last_tick_epoch_ms = Some(last + secs * 1000);
                secs
            }
            Some(last) => {
                tracing::warn!(last, now_ms, "wall clock moved backwards, re-anchoring timer");
                self.last_tick_epoch_ms = Some(now_ms);
                0
            }
            None => 0,
        }
    }

    /// Drop the wall-clock anchor. Used by drivers that tick on their own
    /// schedule (the async service).
    pub fn detach_clock(&mut self) {
        self.last_tick_epoch_ms = None;
    }

    /// Re-anchor the wall clock at `now_ms` if the countdown is live.
    pub fn reanchor(&mut self, now_ms: u64) {
        self.last_tick_epoch_ms = match self.state {
            TimerState::Running | TimerState::Finished => Some(now_ms),
            TimerState::Idle | TimerState::Paused => None,
        };
    }

    #[cfg(test)]
    pub(crate) fn set_anchor(&mut self, epoch_ms: Option<u64>) {
        self.last_tick_epoch_ms = epoch_ms;
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
