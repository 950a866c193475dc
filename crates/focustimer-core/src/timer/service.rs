//! Background timer service.
//!
//! [`TimerService::spawn`] moves a [`TimerController`] onto a tokio task that
//! ticks it once per second and keeps running whether or not anyone is
//! watching. Callers steer it through a [`TimerHandle`]:
//!
//! - commands go in over an `mpsc` channel,
//! - the latest [`TimerSnapshot`] is published on a `watch` channel, so a
//!   late subscriber sees the current state immediately,
//! - every [`Event`] is fanned out on a `broadcast` channel.
//!
//! Preference changes arrive on an optional `watch::Receiver<Config>` and are
//! applied between ticks. A controller that holds the driver lease is
//! checkpointed after every tick and command.
//!
//! ```rust,ignore
//! let (handle, task) = TimerService::spawn(controller, Some(prefs.subscribe()));
//! handle.start(None, None).await?;
//! let mut state = handle.subscribe();
//! while state.changed().await.is_ok() {
//!     println!("{}", state.borrow().display);
//! }
//! ```

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::controller::TimerController;
use super::engine::{now_ms, TimerSnapshot};
use super::mode::TimerMode;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::storage::Config;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Start {
        mode: Option<TimerMode>,
        duration_secs: Option<u64>,
    },
    Pause,
    Resume,
    Stop,
    Skip,
    Shutdown,
}

/// Cloneable remote control for a running service.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<TimerCommand>,
    state: watch::Receiver<TimerSnapshot>,
    events: broadcast::Sender<Event>,
}

impl TimerHandle {
    pub async fn start(&self, mode: Option<TimerMode>, duration_secs: Option<u64>) -> Result<()> {
        self.send(TimerCommand::Start { mode, duration_secs }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(TimerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(TimerCommand::Resume).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(TimerCommand::Stop).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.send(TimerCommand::Skip).await
    }

    /// Ask the service to exit. The task's join result carries the controller.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(TimerCommand::Shutdown).await
    }

    pub async fn send(&self, command: TimerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::ServiceStopped)
    }

    /// Receiver holding the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.state.clone()
    }

    /// Receiver for events produced after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn current(&self) -> TimerSnapshot {
        self.state.borrow().clone()
    }
}

pub struct TimerService {
    controller: TimerController,
    commands: mpsc::Receiver<TimerCommand>,
    state: watch::Sender<TimerSnapshot>,
    events: broadcast::Sender<Event>,
    prefs: Option<watch::Receiver<Config>>,
}

impl TimerService {
    /// Spawn the service on the current tokio runtime.
    pub fn spawn(
        controller: TimerController,
        prefs: Option<watch::Receiver<Config>>,
    ) -> (TimerHandle, JoinHandle<Result<TimerController>>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(controller.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

        let handle = TimerHandle {
            commands: cmd_tx,
            state: state_rx,
            events: event_tx.clone(),
        };
        let service = TimerService {
            controller,
            commands: cmd_rx,
            state: state_tx,
            events: event_tx,
            prefs,
        };
        (handle, tokio::spawn(service.run()))
    }

    async fn run(mut self) -> Result<TimerController> {
        // The interval drives the clock while the service owns the engine.
        self.controller.engine_mut().detach_clock();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        ticker.tick().await;
        info!("timer service started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.controller.tick() {
                        Ok(events) => self.publish(events),
                        Err(e) => warn!(error = %e, "timer tick failed"),
                    }
                    self.checkpoint();
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all timer handles dropped");
                        break;
                    };
                    if command == TimerCommand::Shutdown {
                        break;
                    }
                    // Keep whole seconds aligned with the moment of the command.
                    if matches!(command, TimerCommand::Start { .. } | TimerCommand::Resume | TimerCommand::Skip) {
                        ticker.reset();
                    }
                    match self.apply(command) {
                        Ok(events) => self.publish(events),
                        Err(e) => warn!(error = %e, "timer command rejected"),
                    }
                    self.checkpoint();
                }
                config = next_config(&mut self.prefs) => {
                    match config {
                        Some(config) => {
                            self.controller.apply_config(&config);
                            self.publish(Vec::new());
                        }
                        None => self.prefs = None,
                    }
                }
            }
        }

        self.controller.engine_mut().reanchor(now_ms());
        info!("timer service stopped");
        Ok(self.controller)
    }

    fn apply(&mut self, command: TimerCommand) -> Result<Vec<Event>> {
        debug!(?command, "timer command");
        match command {
            TimerCommand::Start { mode, duration_secs } => self.controller.start(mode, duration_secs),
            TimerCommand::Pause => Ok(self.controller.pause()),
            TimerCommand::Resume => Ok(self.controller.resume()),
            TimerCommand::Stop => Ok(self.controller.stop()),
            TimerCommand::Skip => self.controller.skip(),
            TimerCommand::Shutdown => Ok(Vec::new()),
        }
    }

    fn checkpoint(&self) {
        if let Err(e) = self.controller.checkpoint(now_ms()) {
            warn!(error = %e, "timer checkpoint failed");
        }
    }

    fn publish(&self, events: Vec<Event>) {
        let snapshot = self.controller.snapshot();
        self.state.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        for event in events {
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }
    }
}

/// Next published configuration, `None` once the sender is gone. Pending
/// forever when there is no preference channel.
async fn next_config(prefs: &mut Option<watch::Receiver<Config>>) -> Option<Config> {
    match prefs {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
