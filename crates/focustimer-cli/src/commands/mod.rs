pub mod config;
pub mod history;
pub mod messages;
pub mod notify;
pub mod stats;
pub mod timer;

use focustimer_core::{MessageType, TimerMode};

/// clap value parser for `--mode`.
pub fn parse_mode(s: &str) -> Result<TimerMode, String> {
    TimerMode::parse(s).ok_or_else(|| format!("unknown mode '{s}' (focus, short_break, long_break)"))
}

/// clap value parser for message types.
pub fn parse_message_type(s: &str) -> Result<MessageType, String> {
    MessageType::parse(s).ok_or_else(|| {
        let names: Vec<&str> = MessageType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown message type '{s}' ({})", names.join(", "))
    })
}
