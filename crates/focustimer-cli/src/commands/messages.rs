use clap::Subcommand;
use focustimer_core::notifications::{ensure_custom_id, MotivationalMessage};
use focustimer_core::storage::Database;
use focustimer_core::{MessageType, ValidationError};
use serde_json::json;

#[derive(Subcommand)]
pub enum MessagesAction {
    /// List built-in and custom messages
    List {
        /// Only messages of this type
        #[arg(long = "type", value_parser = super::parse_message_type)]
        message_type: Option<MessageType>,
        /// Only custom messages
        #[arg(long)]
        custom: bool,
    },
    /// Add a custom message
    Add {
        text: String,
        #[arg(long = "type", value_parser = super::parse_message_type, default_value = "general")]
        message_type: MessageType,
    },
    /// Change text or type of a custom message
    Edit {
        id: i64,
        #[arg(long)]
        text: Option<String>,
        #[arg(long = "type", value_parser = super::parse_message_type)]
        message_type: Option<MessageType>,
    },
    /// Include a custom message in random selection
    Enable { id: i64 },
    /// Exclude a custom message from random selection
    Disable { id: i64 },
    /// Delete a custom message
    Delete { id: i64 },
    /// Pick a random message of a type
    Random {
        #[arg(value_parser = super::parse_message_type, default_value = "general")]
        message_type: MessageType,
    },
}

fn find_custom(db: &Database, id: i64) -> Result<MotivationalMessage, Box<dyn std::error::Error>> {
    ensure_custom_id(id)?;
    db.custom_messages()?
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| ValidationError::NotFound { kind: "message", id }.into())
}

fn set_enabled(db: &Database, id: i64, enabled: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut message = find_custom(db, id)?;
    message.enabled = enabled;
    db.update_custom_message(&message)?;
    println!("{}", json!({ "id": id, "enabled": enabled }));
    Ok(())
}

pub fn run(action: MessagesAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        MessagesAction::List { message_type, custom } => {
            let catalog = db.message_catalog()?;
            let messages: Vec<MotivationalMessage> = match message_type {
                Some(t) => catalog.by_type(t),
                None => catalog.all(),
            }
            .into_iter()
            .filter(|m| !custom || m.custom)
            .collect();
            println!("{}", serde_json::to_string_pretty(&messages)?);
        }
        MessagesAction::Add { text, message_type } => {
            let message = db.add_custom_message(&text, message_type)?;
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
        MessagesAction::Edit { id, text, message_type } => {
            let mut message = find_custom(&db, id)?;
            if let Some(text) = text {
                message.text = text;
            }
            if let Some(message_type) = message_type {
                message.message_type = message_type;
            }
            db.update_custom_message(&message)?;
            println!("{}", serde_json::to_string_pretty(&find_custom(&db, id)?)?);
        }
        MessagesAction::Enable { id } => set_enabled(&db, id, true)?,
        MessagesAction::Disable { id } => set_enabled(&db, id, false)?,
        MessagesAction::Delete { id } => {
            if !db.delete_custom_message(id)? {
                return Err(ValidationError::NotFound { kind: "message", id }.into());
            }
            println!("{}", json!({ "deleted": id }));
        }
        MessagesAction::Random { message_type } => {
            let catalog = db.message_catalog()?;
            let message = catalog.random(message_type, &mut rand::thread_rng());
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
    }
    Ok(())
}
