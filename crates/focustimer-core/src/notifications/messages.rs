//! Motivational message catalog.
//!
//! Fifteen built-in messages (three per [`MessageType`]) are compiled in and
//! can never be edited. Custom messages live in the database and are merged
//! in when the catalog is loaded.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Custom message ids start above this value.
pub const BUILTIN_ID_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    StartSession,
    DuringSession,
    EndSession,
    StartBreak,
    General,
}

impl MessageType {
    pub const ALL: [MessageType; 5] = [
        MessageType::StartSession,
        MessageType::DuringSession,
        MessageType::EndSession,
        MessageType::StartBreak,
        MessageType::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::StartSession => "start_session",
            MessageType::DuringSession => "during_session",
            MessageType::EndSession => "end_session",
            MessageType::StartBreak => "start_break",
            MessageType::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }

    pub fn label(self) -> &'static str {
        match self {
            MessageType::StartSession => "Session start",
            MessageType::DuringSession => "During the session",
            MessageType::EndSession => "Session end",
            MessageType::StartBreak => "Break start",
            MessageType::General => "General",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotivationalMessage {
    pub id: i64,
    pub text: String,
    pub message_type: MessageType,
    pub custom: bool,
    pub enabled: bool,
}

const BUILTIN: [(i64, MessageType, &str); 15] = [
    (1, MessageType::StartSession, "Full concentration, let's go!"),
    (2, MessageType::StartSession, "Time to focus on what matters"),
    (3, MessageType::StartSession, "Space ready, mind ready"),
    (4, MessageType::DuringSession, "You're on the right track! Stay focused"),
    (5, MessageType::DuringSession, "Perseverance is the key to success"),
    (6, MessageType::DuringSession, "One step at a time gets you there"),
    (7, MessageType::EndSession, "Excellent work! You've earned a break"),
    (8, MessageType::EndSession, "One more win on your way"),
    (9, MessageType::EndSession, "You made good use of your time"),
    (10, MessageType::StartBreak, "Take a breather, your mind will thank you"),
    (11, MessageType::StartBreak, "Rest is part of the process"),
    (12, MessageType::StartBreak, "Recharge to keep going"),
    (13, MessageType::General, "Every effort brings you closer to your goals"),
    (14, MessageType::General, "Discipline beats talent"),
    (15, MessageType::General, "Success is the sum of small efforts"),
];

/// Built-in messages followed by custom ones.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    custom: Vec<MotivationalMessage>,
}

impl MessageCatalog {
    pub fn new(custom: Vec<MotivationalMessage>) -> Self {
        Self { custom }
    }

    pub fn builtin() -> Vec<MotivationalMessage> {
        BUILTIN
            .iter()
            .map(|&(id, message_type, text)| MotivationalMessage {
                id,
                text: text.to_string(),
                message_type,
                custom: false,
                enabled: true,
            })
            .collect()
    }

    pub fn custom(&self) -> &[MotivationalMessage] {
        &self.custom
    }

    pub fn all(&self) -> Vec<MotivationalMessage> {
        let mut all = Self::builtin();
        all.extend(self.custom.iter().cloned());
        all
    }

    pub fn by_type(&self, message_type: MessageType) -> Vec<MotivationalMessage> {
        self.all()
            .into_iter()
            .filter(|m| m.message_type == message_type)
            .collect()
    }

    /// Pick a random enabled message of `message_type`, falling back to
    /// general messages when the type has none.
    pub fn random<R: Rng + ?Sized>(&self, message_type: MessageType, rng: &mut R) -> Option<MotivationalMessage> {
        let pool: Vec<MotivationalMessage> = self
            .by_type(message_type)
            .into_iter()
            .filter(|m| m.enabled)
            .collect();
        if pool.is_empty() && message_type != MessageType::General {
            return self.random(MessageType::General, rng);
        }
        pool.choose(rng).cloned()
    }
}

/// Reject blank message text; returns the trimmed text.
pub fn validate_text(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "text".into(),
            message: "message must not be blank".into(),
        });
    }
    Ok(trimmed.to_string())
}

/// Built-in ids are read-only.
pub fn ensure_custom_id(id: i64) -> Result<(), ValidationError> {
    if id <= BUILTIN_ID_LIMIT {
        return Err(ValidationError::BuiltInMessage(id));
    }
    Ok(())
}
