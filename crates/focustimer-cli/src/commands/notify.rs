use clap::Subcommand;
use focustimer_core::notifications::LogSink;
use focustimer_core::storage::Database;
use focustimer_core::{Config, Dispatcher, LifecycleEvent, MessageType};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Send a test notification with a random message of the given type
    Test {
        /// start_session, during_session, end_session, start_break or general
        #[arg(value_parser = super::parse_message_type, default_value = "general")]
        message_type: MessageType,
    },
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut dispatcher = Dispatcher::new(config.notification_config(), db.message_catalog()?, Box::new(LogSink));

    match action {
        NotifyAction::Test { message_type } => {
            let notification = dispatcher.dispatch(LifecycleEvent::Test { message_type });
            println!("{}", serde_json::to_string_pretty(&notification)?);
        }
    }
    Ok(())
}
