// Activity events emitted by the retry loop

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pricelens_core::{ApiError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    /// An attempt is about to be sent.
    Started,
    /// The call returned successfully.
    Succeeded,
    /// One attempt failed. Followed by `RetryScheduled` or nothing.
    AttemptFailed,
    /// A backoff wait begins before the next attempt.
    RetryScheduled,
    /// The call was refused before any request was made.
    Rejected,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Started => "request_started",
            ActivityAction::Succeeded => "request_succeeded",
            ActivityAction::AttemptFailed => "attempt_failed",
            ActivityAction::RetryScheduled => "retry_scheduled",
            ActivityAction::Rejected => "request_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    /// Logical operation, e.g. `"chat"` or `"upload"`.
    pub operation: String,
    pub action: ActivityAction,
    /// Zero-based attempt number.
    pub attempt: u32,
    pub kind: Option<ErrorKind>,
    pub message: Option<String>,
    pub level: ActivityLevel,
    /// Backoff chosen for the next attempt (`RetryScheduled` only).
    pub delay: Option<Duration>,
}

impl ActivityEvent {
    pub fn new(operation: &str, action: ActivityAction, attempt: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            action,
            attempt,
            kind: None,
            message: None,
            level: ActivityLevel::Info,
            delay: None,
        }
    }

    pub fn with_error(mut self, error: &ApiError, level: ActivityLevel) -> Self {
        self.kind = Some(error.kind);
        self.message = Some(error.message.clone());
        self.level = level;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self.level = ActivityLevel::Warn;
        self
    }
}

/// Receives client activity. Implementations must not block.
pub trait ActivityHook: Send + Sync {
    fn record(&self, event: &ActivityEvent);
}

/// Default hook: writes every event through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHook;

impl ActivityHook for LogHook {
    fn record(&self, event: &ActivityEvent) {
        let level = match event.level {
            ActivityLevel::Info => log::Level::Debug,
            ActivityLevel::Warn => log::Level::Warn,
            ActivityLevel::Error => log::Level::Error,
        };
        let kind = event.kind.map(|k| k.as_str()).unwrap_or("-");
        match (event.delay, &event.message) {
            (Some(delay), Some(msg)) => log::log!(
                level,
                "[{}] {} attempt={} kind={} delay={}ms: {}",
                event.operation,
                event.action.as_str(),
                event.attempt + 1,
                kind,
                delay.as_millis(),
                msg
            ),
            (None, Some(msg)) => log::log!(
                level,
                "[{}] {} attempt={} kind={}: {}",
                event.operation,
                event.action.as_str(),
                event.attempt + 1,
                kind,
                msg
            ),
            _ => log::log!(
                level,
                "[{}] {} attempt={}",
                event.operation,
                event.action.as_str(),
                event.attempt + 1
            ),
        }
    }
}

/// Keeps every event in memory; used to inspect a call after the fact.
#[derive(Debug, Default)]
pub struct RecordingHook {
    events: Mutex<Vec<ActivityEvent>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, action: ActivityAction) -> usize {
        self.events().iter().filter(|e| e.action == action).count()
    }
}

impl ActivityHook for RecordingHook {
    fn record(&self, event: &ActivityEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
