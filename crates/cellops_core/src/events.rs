//! In-process report event hub.
//!
//! # Responsibility
//! - Let external collaborators (notification fan-out, exporters) observe
//!   report lifecycle changes.
//!
//! # Invariants
//! - Emission is fire-and-forget: a panicking or failing listener never
//!   blocks or fails the triggering core operation.
//! - Subscriber ids are unique; duplicate registration is rejected.

use crate::model::{CellGroupId, ReportId};
use chrono::NaiveDate;
use log::{error, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Report lifecycle notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEvent {
    Created {
        report_id: ReportId,
        cell_group_id: CellGroupId,
        meeting_date: NaiveDate,
    },
    Updated {
        report_id: ReportId,
        cell_group_id: CellGroupId,
        meeting_date: NaiveDate,
    },
    Deleted {
        report_id: ReportId,
    },
}

/// Observer contract for report lifecycle events.
pub trait ReportEventListener: Send + Sync {
    fn on_report_event(&self, event: &ReportEvent);
}

/// Subscription errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventHubError {
    InvalidSubscriberId(String),
    DuplicateSubscriberId(String),
}

impl Display for EventHubError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSubscriberId(value) => write!(f, "subscriber id is invalid: {value}"),
            Self::DuplicateSubscriberId(value) => {
                write!(f, "subscriber id already registered: {value}")
            }
        }
    }
}

impl Error for EventHubError {}

/// Listener registry keyed by subscriber id.
#[derive(Default)]
pub struct ReportEventHub {
    listeners: BTreeMap<String, Arc<dyn ReportEventListener>>,
}

impl ReportEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one listener under a stable subscriber id.
    pub fn subscribe(
        &mut self,
        subscriber_id: &str,
        listener: Arc<dyn ReportEventListener>,
    ) -> Result<(), EventHubError> {
        let normalized = subscriber_id.trim();
        if normalized.is_empty() {
            return Err(EventHubError::InvalidSubscriberId(subscriber_id.to_string()));
        }
        if self.listeners.contains_key(normalized) {
            return Err(EventHubError::DuplicateSubscriberId(normalized.to_string()));
        }
        self.listeners.insert(normalized.to_string(), listener);
        Ok(())
    }

    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        self.listeners.remove(subscriber_id.trim()).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers the event to every listener, best effort.
    pub fn emit(&self, event: &ReportEvent) {
        for (subscriber_id, listener) in &self.listeners {
            let delivery = catch_unwind(AssertUnwindSafe(|| listener.on_report_event(event)));
            if delivery.is_err() {
                error!(
                    "event=report_event_delivery module=events status=error subscriber={subscriber_id}"
                );
            }
        }
        if !self.listeners.is_empty() {
            info!(
                "event=report_event_emitted module=events status=ok subscribers={}",
                self.listeners.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Counting(AtomicUsize);

    impl ReportEventListener for Counting {
        fn on_report_event(&self, _event: &ReportEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    impl ReportEventListener for Panicking {
        fn on_report_event(&self, _event: &ReportEvent) {
            panic!("listener failure");
        }
    }

    fn deleted_event() -> ReportEvent {
        ReportEvent::Deleted {
            report_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn duplicate_subscriber_id_is_rejected() {
        let mut hub = ReportEventHub::new();
        hub.subscribe("fanout", Arc::new(Counting(AtomicUsize::new(0))))
            .unwrap();
        let err = hub
            .subscribe("fanout", Arc::new(Counting(AtomicUsize::new(0))))
            .unwrap_err();
        assert_eq!(err, EventHubError::DuplicateSubscriberId("fanout".to_string()));
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let mut hub = ReportEventHub::new();
        hub.subscribe("a-panics", Arc::new(Panicking)).unwrap();
        hub.subscribe("b-counts", counter.clone()).unwrap();

        hub.emit(&deleted_event());

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let mut hub = ReportEventHub::new();
        hub.subscribe("fanout", counter.clone()).unwrap();
        assert!(hub.unsubscribe("fanout"));
        assert!(!hub.unsubscribe("fanout"));

        hub.emit(&deleted_event());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }
}
