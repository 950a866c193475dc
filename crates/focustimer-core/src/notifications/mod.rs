mod dispatcher;
mod messages;

pub use dispatcher::{
    status_line, Dispatcher, LifecycleEvent, LogSink, MemorySink, Notification, NotificationConfig,
    NotificationSink,
};
pub use messages::{
    ensure_custom_id, validate_text, MessageCatalog, MessageType, MotivationalMessage, BUILTIN_ID_LIMIT,
};
