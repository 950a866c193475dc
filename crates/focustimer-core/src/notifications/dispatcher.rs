//! Maps timer lifecycle events to notification texts and hands them to a sink.

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

use super::messages::{MessageCatalog, MessageType};
use crate::timer::{TimerMode, TimerSnapshot, TimerState};

/// Which notifications the user wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub on_session_start: bool,
    pub during_session: bool,
    pub on_session_end: bool,
    pub on_break_start: bool,
    pub sound: bool,
    pub vibration: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_session_start: true,
            during_session: true,
            on_session_end: true,
            on_break_start: false,
            sound: true,
            vibration: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    SessionStarted { focus_min: u64 },
    SessionCompleted,
    BreakStarted { long: bool, minutes: u64 },
    BreakCompleted,
    Motivation,
    StreakAchieved { days: u32 },
    /// Manually requested preview. Ignores every toggle.
    Test { message_type: MessageType },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: LifecycleEvent,
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub vibration: bool,
}

/// Destination for notifications: the OS, a log, a test buffer.
pub trait NotificationSink: Send {
    fn deliver(&mut self, notification: &Notification);
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&mut self, notification: &Notification) {
        tracing::info!(title = %notification.title, body = %notification.body, "notification");
    }
}

/// Collects notifications in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl MemorySink {
    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }
}

impl NotificationSink for MemorySink {
    fn deliver(&mut self, notification: &Notification) {
        if let Ok(mut guard) = self.delivered.lock() {
            guard.push(notification.clone());
        }
    }
}

/// Turns lifecycle events into notifications, honoring the user's toggles.
pub struct Dispatcher {
    config: NotificationConfig,
    catalog: MessageCatalog,
    rng: Mcg128Xsl64,
    sink: Box<dyn NotificationSink>,
}

impl Dispatcher {
    pub fn new(config: NotificationConfig, catalog: MessageCatalog, sink: Box<dyn NotificationSink>) -> Self {
        Self {
            config,
            catalog,
            rng: Mcg128Xsl64::from_entropy(),
            sink,
        }
    }

    /// Use a fixed seed for message selection.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mcg128Xsl64::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: NotificationConfig) {
        self.config = config;
    }

    pub fn set_catalog(&mut self, catalog: MessageCatalog) {
        self.catalog = catalog;
    }

    pub fn allows(&self, event: &LifecycleEvent) -> bool {
        let c = &self.config;
        match event {
            LifecycleEvent::Test { .. } => true,
            _ if !c.enabled => false,
            LifecycleEvent::SessionStarted { .. } => c.on_session_start,
            LifecycleEvent::Motivation => c.during_session,
            LifecycleEvent::SessionCompleted | LifecycleEvent::StreakAchieved { .. } => c.on_session_end,
            LifecycleEvent::BreakStarted { .. } | LifecycleEvent::BreakCompleted => c.on_break_start,
        }
    }

    /// Build the notification for `event`, or `None` when it is toggled off.
    pub fn notification_for(&mut self, event: LifecycleEvent) -> Option<Notification> {
        if !self.allows(&event) {
            return None;
        }
        let (title, body) = match event {
            LifecycleEvent::SessionStarted { focus_min } => (
                "Session started!".to_string(),
                format!("Stay focused for the next {focus_min} minutes"),
            ),
            LifecycleEvent::SessionCompleted => (
                "Session complete!".to_string(),
                self.pick(MessageType::EndSession, "Great work! Time for a break"),
            ),
            LifecycleEvent::BreakStarted { long, minutes } => (
                format!("{} break started!", if long { "Long" } else { "Short" }),
                format!("Use these {minutes} minutes to relax"),
            ),
            LifecycleEvent::BreakCompleted => (
                "Break is over!".to_string(),
                "Time to focus again. You can do it!".to_string(),
            ),
            LifecycleEvent::Motivation => (
                "Stay focused!".to_string(),
                self.pick(MessageType::DuringSession, "Keep going"),
            ),
            LifecycleEvent::StreakAchieved { days } => (
                "Achievement unlocked!".to_string(),
                format!("You have kept a {days}-day streak. Amazing consistency!"),
            ),
            LifecycleEvent::Test { message_type } => (
                format!("Test notification: {}", message_type.label()),
                self.pick(message_type, "Notifications are working."),
            ),
        };
        Some(Notification {
            event,
            title,
            body,
            sound: self.config.sound,
            vibration: self.config.vibration,
        })
    }

    /// Build and deliver. Returns what was delivered.
    pub fn dispatch(&mut self, event: LifecycleEvent) -> Option<Notification> {
        let notification = self.notification_for(event)?;
        self.sink.deliver(&notification);
        Some(notification)
    }

    fn pick(&mut self, message_type: MessageType, fallback: &str) -> String {
        self.catalog
            .random(message_type, &mut self.rng)
            .map(|m| m.text)
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Text of the ongoing status notification, e.g. `FocusTimer - Focus active · 12:34 left`.
pub fn status_line(snapshot: &TimerSnapshot) -> String {
    let label = match (snapshot.mode, snapshot.state) {
        (TimerMode::Focus, TimerState::Running) => "Focus active",
        (TimerMode::Focus, TimerState::Paused) => "Focus paused",
        (TimerMode::Focus, _) => "Focus",
        (TimerMode::ShortBreak, _) => "Short break",
        (TimerMode::LongBreak, _) => "Long break",
    };
    format!("FocusTimer - {label} · {} left", snapshot.display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Durations, TimerEngine};

    fn dispatcher(config: NotificationConfig) -> (Dispatcher, MemorySink) {
        let sink = MemorySink::default();
        let d = Dispatcher::new(config, MessageCatalog::default(), Box::new(sink.clone())).with_seed(42);
        (d, sink)
    }

    #[test]
    fn master_switch_silences_everything_but_tests() {
        let (mut d, sink) = dispatcher(NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        });
        assert!(d.dispatch(LifecycleEvent::SessionStarted { focus_min: 25 }).is_none());
        assert!(d.dispatch(LifecycleEvent::Motivation).is_none());
        assert!(d
            .dispatch(LifecycleEvent::Test { message_type: MessageType::General })
            .is_some());
        assert_eq!(sink.notifications().len(), 1);
    }

    #[test]
    fn break_start_is_off_by_default() {
        let (mut d, _) = dispatcher(NotificationConfig::default());
        assert!(d
            .notification_for(LifecycleEvent::BreakStarted { long: false, minutes: 5 })
            .is_none());
        assert!(d.notification_for(LifecycleEvent::SessionCompleted).is_some());
    }

    #[test]
    fn texts_carry_durations() {
        let (mut d, _) = dispatcher(NotificationConfig {
            on_break_start: true,
            ..NotificationConfig::default()
        });
        let start = d.notification_for(LifecycleEvent::SessionStarted { focus_min: 30 }).unwrap();
        assert_eq!(start.body, "Stay focused for the next 30 minutes");
        let long = d
            .notification_for(LifecycleEvent::BreakStarted { long: true, minutes: 15 })
            .unwrap();
        assert_eq!(long.title, "Long break started!");
        assert_eq!(long.body, "Use these 15 minutes to relax");
    }

    #[test]
    fn motivation_uses_during_session_messages() {
        let (mut d, _) = dispatcher(NotificationConfig::default());
        let during: Vec<String> = MessageCatalog::default()
            .by_type(MessageType::DuringSession)
            .into_iter()
            .map(|m| m.text)
            .collect();
        for _ in 0..20 {
            let n = d.notification_for(LifecycleEvent::Motivation).unwrap();
            assert!(during.contains(&n.body), "{}", n.body);
        }
    }

    #[test]
    fn sound_and_vibration_follow_config() {
        let (mut d, _) = dispatcher(NotificationConfig {
            sound: false,
            ..NotificationConfig::default()
        });
        let n = d.notification_for(LifecycleEvent::SessionCompleted).unwrap();
        assert!(!n.sound);
        assert!(n.vibration);
    }

    #[test]
    fn status_line_reflects_state() {
        let mut engine = TimerEngine::new(&Durations::default(), 4);
        assert_eq!(status_line(&engine.snapshot()), "FocusTimer - Focus · 25:00 left");
        engine.start(TimerMode::Focus, 90).unwrap();
        assert_eq!(status_line(&engine.snapshot()), "FocusTimer - Focus active · 01:30 left");
        engine.pause();
        assert_eq!(status_line(&engine.snapshot()), "FocusTimer - Focus paused · 01:30 left");
    }
}
