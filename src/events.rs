//! Operation progress notifications
//!
//! A `DeviceSession` reports what it is doing through an [`EventSink`]. Sinks
//! are fire-and-forget: nothing in the session depends on whether a message
//! was delivered.

use std::sync::mpsc::Sender;

/// Severity of a progress message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLevel {
    /// Progress or device property
    Info,
    /// An operation completed
    Success,
    /// Something suspicious that did not stop the operation
    Warning,
    /// An operation failed
    Error,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventLevel::Info => "INFO",
            EventLevel::Success => "OK",
            EventLevel::Warning => "WARN",
            EventLevel::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// One progress message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub level: EventLevel,
    pub message: String,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Receiver of session progress messages
pub trait EventSink: Send + Sync {
    fn emit(&self, level: EventLevel, message: &str);
}

/// Forwards messages to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, level: EventLevel, message: &str) {
        match level {
            EventLevel::Info | EventLevel::Success => log::info!("{}", message),
            EventLevel::Warning => log::warn!("{}", message),
            EventLevel::Error => log::error!("{}", message),
        }
    }
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _level: EventLevel, _message: &str) {}
}

/// Publishes messages on a channel for a caller on another thread
///
/// A dropped receiver is not an error; messages are then discarded.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<Event>,
}

impl ChannelSink {
    /// Sink publishing on `sender`
    pub fn new(sender: Sender<Event>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, level: EventLevel, message: &str) {
        let event = Event {
            level,
            message: message.to_string(),
        };
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);

        sink.emit(EventLevel::Info, "reading");
        sink.emit(EventLevel::Success, "done");

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, EventLevel::Info);
        assert_eq!(events[1].to_string(), "[OK] done");
    }

    #[test]
    fn test_channel_sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelSink::new(tx).emit(EventLevel::Error, "nobody listening");
    }

    #[test]
    fn test_null_and_log_sinks() {
        NullSink.emit(EventLevel::Warning, "ignored");
        LogSink.emit(EventLevel::Info, "logged");
    }
}
