mod controller;
pub mod driver;
mod engine;
mod mode;
mod service;

pub use controller::{TimerController, TimerSettings};
pub use driver::DriverLease;
pub use engine::{now_ms, TimerEngine, TimerSnapshot, TimerState};
pub use mode::{next_mode, Durations, TimerMode};
pub use service::{TimerCommand, TimerHandle, TimerService};
