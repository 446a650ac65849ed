//! Worker → foreground messages
//!
//! The worker never calls into the foreground. It pushes [`RunEvent`]s onto
//! one unbounded channel, which keeps them in order and never blocks the
//! worker; the foreground drains it on its own schedule.

use crate::error::{ErrorCategory, RepeaterError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Title (and optional thumbnail image bytes) for the current video.
    Title {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        thumbnail: Option<Vec<u8>>,
    },
    IterationStarted {
        iteration: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
        pid: u32,
    },
    Countdown {
        remaining_secs: u64,
    },
    Error {
        category: ErrorCategory,
        message: String,
    },
    /// Non-fatal problem worth showing, e.g. a process that would not die.
    Diagnostic {
        message: String,
    },
    Finished {
        summary: RunSummary,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub iterations_completed: u32,
    pub launches: u32,
    pub stop_reason: StopReason,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Sending half held by the worker.
///
/// Sends after the foreground has gone away are dropped silently: the worker
/// still has to finish its cleanup.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: UnboundedSender<RunEvent>,
}

pub fn event_channel() -> (EventSender, UnboundedReceiver<RunEvent>) {
    let (tx, rx) = unbounded_channel();
    (EventSender { tx }, rx)
}

impl EventSender {
    pub fn send(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }

    pub fn countdown(&self, remaining_secs: u64) {
        self.send(RunEvent::Countdown { remaining_secs });
    }

    pub fn error(&self, err: &RepeaterError) {
        self.send(RunEvent::Error {
            category: err.category(),
            message: err.user_message(),
        });
    }

    pub fn diagnostic(&self, message: impl Into<String>) {
        self.send(RunEvent::Diagnostic {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LaunchError;
    use std::path::PathBuf;

    #[test]
    fn test_events_keep_order() {
        let (tx, mut rx) = event_channel();
        tx.countdown(3);
        tx.countdown(2);
        tx.diagnostic("hello");
        assert_eq!(rx.try_recv().unwrap(), RunEvent::Countdown { remaining_secs: 3 });
        assert_eq!(rx.try_recv().unwrap(), RunEvent::Countdown { remaining_secs: 2 });
        assert!(matches!(rx.try_recv().unwrap(), RunEvent::Diagnostic { .. }));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = event_channel();
        drop(rx);
        tx.countdown(1);
    }

    #[test]
    fn test_error_event_json_shape() {
        let (tx, mut rx) = event_channel();
        tx.error(&RepeaterError::from(LaunchError::NotFound(PathBuf::from("/x/chrome"))));
        let json = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["category"], "launch");
    }
}
