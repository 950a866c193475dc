//! Timer controller: the single writer of timer state.
//!
//! Wraps a [`TimerEngine`] and attaches the side effects of each transition:
//! notifications, session history rows and auto-advance between intervals.
//! Both drivers go through it: the async [`super::TimerService`] calls
//! [`TimerController::tick`] once per second, the CLI calls
//! [`TimerController::catch_up`] with the wall-clock time of each invocation.

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use super::driver;
use super::engine::{now_ms, TimerEngine, TimerSnapshot, TimerState};
use super::mode::{Durations, TimerMode};
use crate::error::Result;
use crate::events::Event;
use crate::history::NewSession;
use crate::notifications::{Dispatcher, LifecycleEvent};
use crate::storage::{Config, Database};

/// Runtime settings derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub durations: Durations,
    /// Focus intervals before a long break.
    pub cycle_length: u32,
    /// Start the next interval by itself after a finished one.
    pub auto_advance: bool,
    pub auto_advance_delay_secs: u64,
    /// Seconds between motivational notifications during focus. 0 disables.
    pub motivation_interval_secs: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            durations: Durations::default(),
            cycle_length: 4,
            auto_advance: true,
            auto_advance_delay_secs: 3,
            motivation_interval_secs: 60,
        }
    }
}

pub struct TimerController {
    engine: TimerEngine,
    db: Database,
    dispatcher: Dispatcher,
    settings: TimerSettings,
    /// Pid holding the driver lease while this controller owns the stored engine.
    driver_pid: Option<u32>,
}

impl TimerController {
    /// Controller around a fresh idle engine.
    pub fn new(settings: TimerSettings, db: Database, dispatcher: Dispatcher) -> Self {
        let engine = TimerEngine::new(&settings.durations, settings.cycle_length);
        Self::with_engine(engine, settings, db, dispatcher)
    }

    /// Controller around a restored engine. The settings are applied to it.
    pub fn with_engine(mut engine: TimerEngine, settings: TimerSettings, db: Database, dispatcher: Dispatcher) -> Self {
        engine.apply_settings(&settings.durations, settings.cycle_length);
        Self {
            engine,
            db,
            dispatcher,
            settings,
            driver_pid: None,
        }
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut TimerEngine {
        &mut self.engine
    }

    pub fn into_engine(self) -> TimerEngine {
        self.engine
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.engine.snapshot()
    }

    /// Refresh durations, cycle length and notification toggles.
    pub fn apply_config(&mut self, config: &Config) {
        self.settings = TimerSettings {
            auto_advance_delay_secs: self.settings.auto_advance_delay_secs,
            ..config.timer_settings()
        };
        self.dispatcher.set_config(config.notification_config());
        self.engine
            .apply_settings(&self.settings.durations, self.settings.cycle_length);
        tracing::debug!(settings = ?self.settings, "timer settings applied");
    }

    /// Reload custom messages from the database into the dispatcher.
    pub fn reload_messages(&mut self) -> Result<()> {
        self.dispatcher.set_catalog(self.db.message_catalog()?);
        Ok(())
    }

    // ── Persisted state ──────────────────────────────────────────────

    /// Take the driver lease for `pid` and persist the engine.
    ///
    /// From here on [`TimerController::checkpoint`] keeps the stored engine
    /// and the heartbeat current.
    ///
    /// # Errors
    /// [`crate::CoreError::TimerDriven`] when another process holds the lease.
    pub fn drive(&mut self, pid: u32, now_ms: u64) -> Result<()> {
        driver::claim_driver(&self.db, pid, now_ms)?;
        self.driver_pid = Some(pid);
        tracing::info!(pid, "driving timer");
        self.checkpoint(now_ms)
    }

    /// Refresh the lease and store the engine anchored at `now_ms`. A no-op
    /// unless [`TimerController::drive`] was called.
    pub fn checkpoint(&self, now_ms: u64) -> Result<()> {
        let Some(pid) = self.driver_pid else {
            return Ok(());
        };
        driver::claim_driver(&self.db, pid, now_ms)?;
        let mut engine = self.engine.clone();
        engine.reanchor(now_ms);
        driver::save_engine(&self.db, &engine)
    }

    /// Store the engine one last time and give up the lease.
    pub fn release(&mut self, now_ms: u64) -> Result<()> {
        let Some(pid) = self.driver_pid else {
            return Ok(());
        };
        self.checkpoint(now_ms)?;
        self.driver_pid = None;
        driver::release_driver(&self.db, pid)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start `mode` (default: the current mode) for `duration_secs`
    /// (default: its configured length).
    pub fn start(&mut self, mode: Option<TimerMode>, duration_secs: Option<u64>) -> Result<Vec<Event>> {
        let mode = mode.unwrap_or_else(|| self.engine.mode());
        let duration_secs = duration_secs.unwrap_or_else(|| self.settings.durations.for_mode(mode));
        let at = Utc::now();
        let mut events = vec![self.engine.start_at(mode, duration_secs, at)?];
        tracing::debug!(%mode, duration_secs, "timer started");
        self.notify_interval_start(at, &mut events);
        Ok(events)
    }

    pub fn pause(&mut self) -> Vec<Event> {
        self.engine.pause().into_iter().collect()
    }

    pub fn resume(&mut self) -> Vec<Event> {
        self.engine.resume().into_iter().collect()
    }

    pub fn stop(&mut self) -> Vec<Event> {
        vec![self.engine.stop(&self.settings.durations)]
    }

    /// End the current interval early and start the next one.
    ///
    /// A focus interval with time on the clock is recorded for the time
    /// actually spent.
    pub fn skip(&mut self) -> Result<Vec<Event>> {
        let at = Utc::now();
        let mut events = Vec::new();
        let elapsed = self.engine.elapsed_secs();
        if self.engine.mode() == TimerMode::Focus
            && elapsed > 0
            && matches!(self.engine.state(), TimerState::Running | TimerState::Paused)
        {
            self.record_focus(at, elapsed.div_ceil(60), &mut events)?;
        }
        self.advance_and_start(at, &mut events)?;
        Ok(events)
    }

    /// One second of the clock at the current time.
    pub fn tick(&mut self) -> Result<Vec<Event>> {
        self.tick_at(Utc::now())
    }

    /// One second of the clock, stamping side effects with `at`.
    pub fn tick_at(&mut self, at: DateTime<Utc>) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        match self.engine.tick_at(at) {
            Some(finished) => {
                events.push(finished);
                self.on_finished(at, &mut events)?;
            }
            None if self.engine.state() == TimerState::Running
                && self.engine.mode() == TimerMode::Focus =>
            {
                let elapsed = self.engine.elapsed_secs();
                let every = self.settings.motivation_interval_secs;
                if every > 0 && elapsed > 0 && elapsed % every == 0 {
                    self.notify(LifecycleEvent::Motivation, at, &mut events);
                }
            }
            None => {}
        }

        if self.engine.state() == TimerState::Finished
            && self.settings.auto_advance
            && self.engine.finished_ticks() >= self.settings.auto_advance_delay_secs
        {
            self.advance_and_start(at, &mut events)?;
        }
        Ok(events)
    }

    /// Replay the whole seconds that passed on the wall clock since the
    /// engine was last anchored. Returns every event produced on the way.
    pub fn catch_up(&mut self, now_ms: u64) -> Result<Vec<Event>> {
        let due = self.engine.take_due_ticks(now_ms);
        if due > 0 {
            tracing::debug!(due, "catching up with wall clock");
        }
        let mut events = Vec::new();
        for i in 0..due {
            let behind_ms = (due - 1 - i).saturating_mul(1000);
            let tick_ms = now_ms.saturating_sub(behind_ms);
            let at = DateTime::<Utc>::from_timestamp_millis(tick_ms as i64).unwrap_or_else(Utc::now);
            events.extend(self.tick_at(at)?);
        }
        Ok(events)
    }

    /// Catch up to the current wall-clock time.
    pub fn catch_up_now(&mut self) -> Result<Vec<Event>> {
        self.catch_up(now_ms())
    }

    // ── Side effects ─────────────────────────────────────────────────

    fn on_finished(&mut self, at: DateTime<Utc>, events: &mut Vec<Event>) -> Result<()> {
        match self.engine.mode() {
            TimerMode::Focus => {
                self.notify(LifecycleEvent::SessionCompleted, at, events);
                let duration_min = self.engine.total_secs() / 60;
                let date = at.with_timezone(&Local).date_naive();
                self.record_focus(at, duration_min, events)?;

                let stats = self.db.stats(date)?;
                if stats.today_sessions == 1 && stats.streak_days >= 2 {
                    self.notify(
                        LifecycleEvent::StreakAchieved {
                            days: stats.streak_days,
                        },
                        at,
                        events,
                    );
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => {
                self.notify(LifecycleEvent::BreakCompleted, at, events);
            }
        }
        Ok(())
    }

    fn record_focus(&mut self, at: DateTime<Utc>, duration_min: u64, events: &mut Vec<Event>) -> Result<()> {
        let elapsed = i64::try_from(self.engine.elapsed_secs()).unwrap_or(i64::MAX);
        let started_at = at - Duration::seconds(elapsed);
        let session = NewSession::focus(
            started_at,
            duration_min,
            self.settings.durations.focus_secs / 60,
            at.with_timezone(&Local).date_naive(),
        );
        let session_id = self.db.add_session(&session)?;
        events.push(Event::SessionRecorded {
            session_id,
            duration_min,
            at,
        });
        Ok(())
    }

    fn advance_and_start(&mut self, at: DateTime<Utc>, events: &mut Vec<Event>) -> Result<()> {
        events.push(self.engine.advance_at(&self.settings.durations, at));
        let mode = self.engine.mode();
        events.push(self.engine.start_at(mode, self.settings.durations.for_mode(mode), at)?);
        tracing::debug!(%mode, "advanced to next interval");
        self.notify_interval_start(at, events);
        Ok(())
    }

    fn notify_interval_start(&mut self, at: DateTime<Utc>, events: &mut Vec<Event>) {
        let minutes = self.engine.total_secs() / 60;
        let event = match self.engine.mode() {
            TimerMode::Focus => LifecycleEvent::SessionStarted { focus_min: minutes },
            mode => LifecycleEvent::BreakStarted {
                long: mode == TimerMode::LongBreak,
                minutes,
            },
        };
        self.notify(event, at, events);
    }

    fn notify(&mut self, event: LifecycleEvent, at: DateTime<Utc>, events: &mut Vec<Event>) {
        if let Some(n) = self.dispatcher.dispatch(event) {
            events.push(Event::Notified {
                title: n.title,
                body: n.body,
                at,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{MemorySink, MessageCatalog, NotificationConfig};
    use chrono::{Days, TimeZone};

    fn controller_with(settings: TimerSettings, db: Database) -> (TimerController, MemorySink) {
        let sink = MemorySink::default();
        let dispatcher = Dispatcher::new(
            NotificationConfig::default(),
            MessageCatalog::default(),
            Box::new(sink.clone()),
        )
        .with_seed(11);
        (TimerController::new(settings, db, dispatcher), sink)
    }

    fn controller(settings: TimerSettings) -> (TimerController, MemorySink) {
        controller_with(settings, Database::open_memory().unwrap())
    }

    fn run(ctrl: &mut TimerController, ticks: u64) -> Vec<Event> {
        let mut out = Vec::new();
        for _ in 0..ticks {
            out.extend(ctrl.tick().unwrap());
        }
        out
    }

    #[test]
    fn start_defaults_to_configured_focus() {
        let (mut ctrl, sink) = controller(TimerSettings::default());
        ctrl.start(None, None).unwrap();
        assert_eq!(ctrl.snapshot().total_secs, 25 * 60);
        assert_eq!(ctrl.snapshot().state, TimerState::Running);
        let delivered = sink.take();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].body, "Stay focused for the next 25 minutes");
    }

    #[test]
    fn finished_focus_is_recorded() {
        let settings = TimerSettings {
            auto_advance: false,
            ..TimerSettings::default()
        };
        let (mut ctrl, _) = controller(settings);
        ctrl.start(Some(TimerMode::Focus), Some(120)).unwrap();
        let events = run(&mut ctrl, 120);
        assert!(events.iter().any(|e| matches!(e, Event::TimerFinished { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionRecorded { duration_min: 2, .. })));

        let sessions = ctrl.database().all_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_min, 2);
        assert_eq!(sessions[0].focus_interval_min, 25);
        assert_eq!(sessions[0].session_type, TimerMode::Focus);

        run(&mut ctrl, 10);
        assert_eq!(ctrl.snapshot().state, TimerState::Finished);
    }

    #[test]
    fn motivation_fires_every_interval_during_focus() {
        let (mut ctrl, sink) = controller(TimerSettings::default());
        ctrl.start(Some(TimerMode::Focus), None).unwrap();
        sink.take();
        run(&mut ctrl, 181);
        let titles: Vec<String> = sink.take().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Stay focused!"; 3]);
    }

    #[test]
    fn breaks_have_no_motivation() {
        let settings = TimerSettings {
            durations: Durations::from_minutes(25, 5, 15),
            ..TimerSettings::default()
        };
        let (mut ctrl, sink) = controller(settings);
        ctrl.start(Some(TimerMode::ShortBreak), None).unwrap();
        run(&mut ctrl, 120);
        assert!(sink.notifications().is_empty());
    }

    #[test]
    fn auto_advance_starts_next_interval_after_delay() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        ctrl.start(Some(TimerMode::Focus), Some(5)).unwrap();
        run(&mut ctrl, 5);
        assert_eq!(ctrl.snapshot().state, TimerState::Finished);
        run(&mut ctrl, 2);
        assert_eq!(ctrl.snapshot().state, TimerState::Finished);
        let events = run(&mut ctrl, 1);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::ModeAdvanced {
                to: TimerMode::ShortBreak,
                ..
            }
        )));
        let snap = ctrl.snapshot();
        assert_eq!(snap.state, TimerState::Running);
        assert_eq!(snap.mode, TimerMode::ShortBreak);
        assert_eq!(snap.total_secs, 5 * 60);
        assert_eq!(snap.completed_focus, 1);
    }

    #[test]
    fn full_cycle_ends_in_long_break() {
        let settings = TimerSettings {
            durations: Durations {
                focus_secs: 3,
                short_break_secs: 2,
                long_break_secs: 4,
            },
            cycle_length: 2,
            auto_advance_delay_secs: 0,
            ..TimerSettings::default()
        };
        let (mut ctrl, _) = controller(settings);
        ctrl.start(None, None).unwrap();
        // focus 3 + short 2 + focus 3
        run(&mut ctrl, 8);
        assert_eq!(ctrl.snapshot().mode, TimerMode::LongBreak);
        assert_eq!(ctrl.snapshot().completed_focus, 0);
        assert_eq!(ctrl.database().session_count().unwrap(), 2);
    }

    #[test]
    fn skip_records_partial_focus_and_starts_break() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        ctrl.start(None, None).unwrap();
        run(&mut ctrl, 90);
        let events = ctrl.skip().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionRecorded { duration_min: 2, .. })));
        let snap = ctrl.snapshot();
        assert_eq!(snap.mode, TimerMode::ShortBreak);
        assert_eq!(snap.state, TimerState::Running);
        assert_eq!(snap.completed_focus, 1);
    }

    #[test]
    fn skip_without_elapsed_time_records_nothing() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        ctrl.skip().unwrap();
        assert_eq!(ctrl.database().session_count().unwrap(), 0);
        assert_eq!(ctrl.snapshot().mode, TimerMode::ShortBreak);
    }

    #[test]
    fn stop_keeps_mode_and_reloads_duration() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        ctrl.start(Some(TimerMode::LongBreak), None).unwrap();
        run(&mut ctrl, 30);
        ctrl.stop();
        let snap = ctrl.snapshot();
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.mode, TimerMode::LongBreak);
        assert_eq!(snap.remaining_secs, 15 * 60);
    }

    #[test]
    fn pause_and_resume_are_noops_in_wrong_state() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        assert!(ctrl.pause().is_empty());
        assert!(ctrl.resume().is_empty());
        ctrl.start(None, None).unwrap();
        assert_eq!(ctrl.pause().len(), 1);
        assert_eq!(ctrl.resume().len(), 1);
    }

    #[test]
    fn first_session_of_day_announces_streak() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let today = at.with_timezone(&Local).date_naive();
        let db = Database::open_memory().unwrap();
        for back in [1, 2] {
            let day = today.checked_sub_days(Days::new(back)).unwrap();
            db.add_session(&NewSession::focus(at - Duration::days(back as i64), 25, 25, day))
                .unwrap();
        }
        let settings = TimerSettings {
            auto_advance: false,
            ..TimerSettings::default()
        };
        let (mut ctrl, sink) = controller_with(settings, db);

        ctrl.start(None, Some(1)).unwrap();
        ctrl.tick_at(at).unwrap();
        let streaks: Vec<_> = sink
            .take()
            .into_iter()
            .filter(|n| matches!(n.event, LifecycleEvent::StreakAchieved { days: 3 }))
            .collect();
        assert_eq!(streaks.len(), 1);

        ctrl.start(None, Some(1)).unwrap();
        ctrl.tick_at(at + Duration::minutes(30)).unwrap();
        assert!(!sink
            .take()
            .iter()
            .any(|n| matches!(n.event, LifecycleEvent::StreakAchieved { .. })));
    }

    #[test]
    fn apply_config_updates_idle_engine_and_toggles() {
        let (mut ctrl, sink) = controller(TimerSettings::default());
        let mut config = Config::default();
        config.set("timer.focus_duration", "40").unwrap();
        config.set("notifications.on_session_start", "false").unwrap();
        ctrl.apply_config(&config);
        assert_eq!(ctrl.snapshot().total_secs, 40 * 60);
        assert_eq!(ctrl.settings().auto_advance_delay_secs, 3);
        ctrl.start(None, None).unwrap();
        assert!(sink.notifications().is_empty());
    }

    #[test]
    fn catch_up_replays_elapsed_wall_clock() {
        let settings = TimerSettings {
            auto_advance: false,
            ..TimerSettings::default()
        };
        let (mut ctrl, _) = controller(settings);
        ctrl.start(None, Some(10)).unwrap();
        ctrl.engine_mut().set_anchor(Some(1_000_000));
        ctrl.catch_up(1_004_500).unwrap();
        assert_eq!(ctrl.snapshot().remaining_secs, 6);
        let events = ctrl.catch_up(1_020_000).unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::TimerFinished { .. })));
        assert_eq!(ctrl.snapshot().state, TimerState::Finished);
        assert_eq!(ctrl.database().session_count().unwrap(), 1);
    }

    #[test]
    fn catch_up_stamps_every_event_with_its_second() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        ctrl.start(None, Some(10)).unwrap();
        ctrl.engine_mut().set_anchor(Some(1_000_000));
        let events = ctrl.catch_up(1_013_000).unwrap();

        let second = |ms: i64| DateTime::<Utc>::from_timestamp_millis(ms).unwrap();
        let finished_at = second(1_010_000);
        let advanced_at = second(1_013_000);
        for event in &events {
            let expected = match event {
                Event::TimerFinished { .. } | Event::SessionRecorded { .. } => finished_at,
                Event::ModeAdvanced { .. } | Event::TimerStarted { .. } => advanced_at,
                _ => continue,
            };
            assert_eq!(event.at(), expected, "{event:?}");
        }
        assert!(events.iter().any(|e| matches!(e, Event::ModeAdvanced { .. })));
        assert!(events.iter().any(|e| matches!(e, Event::SessionRecorded { .. })));
    }

    #[test]
    fn checkpoints_follow_the_driver_lease() {
        let (mut ctrl, _) = controller(TimerSettings::default());
        ctrl.checkpoint(1_000_000).unwrap();
        assert!(driver::load_engine(ctrl.database()).unwrap().is_none());

        ctrl.drive(42, 1_000_000).unwrap();
        ctrl.start(None, Some(60)).unwrap();
        run(&mut ctrl, 5);
        ctrl.checkpoint(1_005_000).unwrap();

        let stored = driver::load_engine(ctrl.database()).unwrap().unwrap();
        assert_eq!(stored.remaining_secs(), 55);
        assert_eq!(
            driver::active_driver(ctrl.database(), 1_005_000).unwrap().map(|l| l.heartbeat_ms),
            Some(1_005_000)
        );

        // A reader of the stored engine resumes from the checkpoint.
        let mut restored = stored;
        assert_eq!(restored.take_due_ticks(1_007_000), 2);

        ctrl.release(1_006_000).unwrap();
        assert!(driver::active_driver(ctrl.database(), 1_006_000).unwrap().is_none());
    }

    #[test]
    fn reload_messages_picks_up_custom_text() {
        let db = Database::open_memory().unwrap();
        for message_type in crate::notifications::MessageType::ALL {
            db.add_custom_message("mine", message_type).unwrap();
        }
        let settings = TimerSettings {
            motivation_interval_secs: 1,
            ..TimerSettings::default()
        };
        let (mut ctrl, sink) = controller_with(settings, db);
        ctrl.reload_messages().unwrap();
        ctrl.start(None, None).unwrap();
        run(&mut ctrl, 40);
        assert!(sink.notifications().iter().any(|n| n.body == "mine"));
    }
}
