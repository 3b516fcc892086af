//! Structured events emitted while mirroring
//!
//! Operations report what they do as an ordered stream of [`MirrorEvent`]s
//! instead of printing. Callers choose the rendering by picking the sink:
//! [`crate::logging::Logger`] for the console, [`EventLog`] to keep them.

use crate::registry::auth::Scope;
use crate::registry::operations::blob_operations::MountOutcome;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    TokenIssued {
        repository: String,
        scope: Scope,
    },
    FetchStarted {
        repository: String,
        reference: String,
    },
    FetchDone {
        repository: String,
        reference: String,
        digest: String,
        bytes: usize,
    },
    FetchFailed {
        repository: String,
        reference: String,
        error: String,
        /// Registry answered 404
        not_found: bool,
    },
    IndexDetected {
        reference: String,
        entries: usize,
    },
    SingleDetected {
        reference: String,
        layers: usize,
    },
    SubManifestStarted {
        platform: String,
        digest: String,
    },
    SubManifestFailed {
        platform: String,
        digest: String,
        error: String,
    },
    MountAttempted {
        repository: String,
        from: String,
        digest: String,
        outcome: MountOutcome,
    },
    PublishDone {
        repository: String,
        reference: String,
        status: u16,
    },
    PublishFailed {
        repository: String,
        reference: String,
        error: String,
    },
    TagInSync {
        tag: String,
    },
    TagOutOfSync {
        tag: String,
        missing: usize,
        unexpected: usize,
    },
    TagSkipped {
        tag: String,
        error: String,
    },
}

/// Receiver of the event stream
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MirrorEvent);
}

/// Sink that keeps every event in emission order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<MirrorEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<MirrorEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: MirrorEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_keeps_order() {
        let log = EventLog::new();
        log.emit(MirrorEvent::TagInSync { tag: "a".into() });
        log.emit(MirrorEvent::TagSkipped {
            tag: "b".into(),
            error: "boom".into(),
        });

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], MirrorEvent::TagInSync { tag: "a".into() });
    }
}
