//! Library events published to UI listeners
//!
//! The reconciler, the organizer and the task pools publish structural changes
//! and user-visible messages on a broadcast channel; any number of listeners
//! may subscribe.

use std::path::PathBuf;

use tokio::sync::broadcast;
use tracing::{error, warn};
use uuid::Uuid;

/// Severity of a user-visible message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Warning,
    Error,
}

/// Event emitted by the engine
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    /// Progress of a task pool: `done` out of `total` units
    Progress {
        task: String,
        message: String,
        done: usize,
        total: usize,
    },
    /// User-visible message
    Message {
        level: MessageLevel,
        text: String,
    },
    ItemAdded {
        item_id: Uuid,
        path: PathBuf,
    },
    ItemUpdated {
        item_id: Uuid,
    },
    ItemRemoved {
        item_id: Uuid,
        path: PathBuf,
    },
    /// A scan or rename operation finished (possibly cancelled)
    Done {
        task: String,
        cancelled: bool,
    },
}

/// Cloneable handle publishing [`LibraryEvent`]s
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<LibraryEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscriber is not an error
    pub fn emit(&self, event: LibraryEvent) {
        let _ = self.tx.send(event);
    }

    pub fn warning(&self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.emit(LibraryEvent::Message {
            level: MessageLevel::Warning,
            text,
        });
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        error!("{}", text);
        self.emit(LibraryEvent::Message {
            level: MessageLevel::Error,
            text,
        });
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}
