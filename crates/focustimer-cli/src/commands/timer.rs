use clap::Subcommand;
use focustimer_core::notifications::{status_line, LogSink};
use focustimer_core::storage::Database;
use focustimer_core::timer::{driver, now_ms, TimerController, TimerEngine, TimerMode, TimerService, TimerSnapshot};
use focustimer_core::{Config, CoreError, Dispatcher, Event};
use serde::Serialize;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start an interval (default: current mode, configured length)
    Start {
        /// focus, short_break or long_break
        #[arg(long, value_parser = super::parse_mode)]
        mode: Option<TimerMode>,
        /// Interval length in minutes
        #[arg(long, conflicts_with = "seconds")]
        minutes: Option<u64>,
        /// Interval length in seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Pause the running interval
    Pause,
    /// Resume a paused interval
    Resume,
    /// Abandon the interval and reset to idle
    Stop,
    /// End the interval now and start the next one
    Skip,
    /// Print current timer state as JSON
    Status,
    /// Keep ticking in the foreground until Ctrl-C, printing events
    Run,
}

#[derive(Serialize)]
struct TimerReport {
    timer: TimerSnapshot,
    status: String,
    events: Vec<Event>,
    /// Pid of the `timer run` process ticking the timer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    driven_by: Option<u32>,
}

impl TimerReport {
    fn new(snapshot: TimerSnapshot, events: Vec<Event>, driven_by: Option<u32>) -> Self {
        Self {
            status: status_line(&snapshot),
            timer: snapshot,
            events,
            driven_by,
        }
    }

    fn print(&self) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

fn open_controller() -> Result<TimerController, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let engine = driver::load_engine(&db)?
        .unwrap_or_else(|| TimerEngine::new(&config.durations(), config.timer.intervals_count));
    let dispatcher = Dispatcher::new(config.notification_config(), db.message_catalog()?, Box::new(LogSink));
    Ok(TimerController::with_engine(engine, config.timer_settings(), db, dispatcher))
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = open_controller()?;

    // A live `timer run` owns the stored engine. Only report what it saved.
    if let Some(lease) = driver::active_driver(controller.database(), now_ms())? {
        return match action {
            TimerAction::Status => TimerReport::new(controller.snapshot(), Vec::new(), Some(lease.pid)).print(),
            _ => Err(CoreError::TimerDriven { pid: lease.pid }.into()),
        };
    }
    if matches!(action, TimerAction::Run) {
        return drive(controller);
    }

    // Seconds that passed since the last invocation count first.
    let mut events = controller.catch_up_now()?;

    match action {
        TimerAction::Start { mode, minutes, seconds } => {
            let duration_secs = seconds.or(minutes.map(|m| m.saturating_mul(60)));
            events.extend(controller.start(mode, duration_secs)?);
        }
        TimerAction::Pause => events.extend(controller.pause()),
        TimerAction::Resume => events.extend(controller.resume()),
        TimerAction::Stop => events.extend(controller.stop()),
        TimerAction::Skip => events.extend(controller.skip()?),
        TimerAction::Status | TimerAction::Run => {}
    }

    driver::save_engine(controller.database(), controller.engine())?;
    TimerReport::new(controller.snapshot(), events, None).print()
}

/// Own the timer in this process until Ctrl-C.
fn drive(mut controller: TimerController) -> Result<(), Box<dyn std::error::Error>> {
    controller.drive(std::process::id(), now_ms())?;
    let caught_up = controller.catch_up_now()?;
    for event in &caught_up {
        println!("{}", serde_json::to_string(event)?);
    }
    controller.checkpoint(now_ms())?;

    let runtime = tokio::runtime::Runtime::new()?;
    // Without the controller back the lease expires on its own.
    let mut controller = runtime.block_on(run_foreground(controller))?;
    controller.release(now_ms())?;
    TimerReport::new(controller.snapshot(), Vec::new(), None).print()
}

async fn run_foreground(controller: TimerController) -> Result<TimerController, Box<dyn std::error::Error>> {
    let (handle, task) = TimerService::spawn(controller, None);
    let mut events = handle.events();
    let mut state = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    eprintln!("{}", status_line(&handle.current()));
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event output fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = status_line(&state.borrow_and_update());
                eprint!("\r{line}");
            }
        }
    }
    eprintln!();

    handle.shutdown().await?;
    Ok(task.await??)
}
