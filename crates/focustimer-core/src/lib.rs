//! # FocusTimer Core Library
//!
//! Core logic of the FocusTimer Pomodoro timer. Every operation is reachable
//! from the standalone `focustimer` CLI; the library can also be embedded in
//! a long-running process through the async [`TimerService`].
//!
//! ## Architecture
//!
//! - **Timer Engine**: a one-second countdown state machine. The caller
//!   decides when a second has passed by calling `tick()`
//! - **Timer Controller**: the single writer of timer state; records
//!   sessions, sends notifications and advances through the cycle
//! - **Timer Service**: tokio task that ticks the controller in the background
//! - **Storage**: SQLite session history and TOML preferences
//! - **Notifications**: toggle-aware dispatcher plus motivational messages
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerController`]: Engine plus side effects
//! - [`Database`]: Session history and custom messages
//! - [`Config`] / [`PreferenceStore`]: Application configuration

pub mod error;
pub mod events;
pub mod format;
pub mod history;
pub mod notifications;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use history::{current_streak, NewSession, Session, SessionStats};
pub use notifications::{Dispatcher, LifecycleEvent, MessageCatalog, MessageType, Notification, NotificationConfig};
pub use storage::{Config, Database, PreferenceChange, PreferenceStore};
pub use timer::{
    Durations, TimerCommand, TimerController, TimerEngine, TimerHandle, TimerMode, TimerService, TimerSettings,
    TimerSnapshot, TimerState,
};
