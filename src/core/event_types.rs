// src/core/event_types.rs
//! Common types and traits for monitored UI events

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::core::ui_node::{NodeGuard, UiNode};

/// Timestamp layout used for persisted history entries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of UI-state change reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A window came up or changed state (app switch, dialog, ...)
    StateChanged,
    /// Content inside the current window changed
    ContentChanged,
    /// Anything else the host reports
    #[default]
    Other,
}

impl EventKind {
    /// Only meaningful UI transitions are worth a tree scan.
    pub fn is_scannable(self) -> bool {
        matches!(self, EventKind::StateChanged | EventKind::ContentChanged)
    }
}

/// One host callback's worth of input.
///
/// The root handle, if any, is held in a [`NodeGuard`] so it is released
/// exactly once when the event is dropped, whichever way handling ends.
#[derive(Debug)]
pub struct MonitoredEvent<N: UiNode> {
    pub source_application_id: String,
    pub kind: EventKind,
    pub root_node: Option<NodeGuard<N>>,
}

impl<N: UiNode> MonitoredEvent<N> {
    pub fn new(source_application_id: impl Into<String>, kind: EventKind, root_node: Option<N>) -> Self {
        Self {
            source_application_id: source_application_id.into(),
            kind,
            root_node: root_node.map(NodeGuard::new),
        }
    }

    pub fn root(&self) -> Option<&N> {
        self.root_node.as_deref()
    }
}

/// A validated, de-duplicated address observation ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedSignal {
    pub address: String,
    pub icon_reference: String,
    pub observed_at: DateTime<Local>,
}

impl ExtractedSignal {
    pub fn timestamp(&self) -> String {
        self.observed_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for ExtractedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.address, self.timestamp())
    }
}

/// What the monitor did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The session is not accepting events
    Ignored,
    /// The source application is blocked; no scan was attempted
    Blocked { application_id: String },
    /// A new address was extracted and queued for the history store
    Logged(ExtractedSignal),
    /// Nothing to record for this event
    NoSignal,
}

/// Trait for monitor event listeners
///
/// Listeners run synchronously on the event-delivery thread and must
/// return quickly.
pub trait MonitorListener: Send {
    /// Called when a new address signal was accepted
    fn on_signal(&mut self, signal: &ExtractedSignal);

    /// Called when an event from a blocked application was enforced
    fn on_block(&mut self, _application_id: &str, _display_name: &str) {}

    /// Called when monitoring starts
    fn on_monitoring_started(&mut self) {}

    /// Called when monitoring stops
    fn on_monitoring_stopped(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn only_window_changes_are_scannable() {
        assert!(EventKind::StateChanged.is_scannable());
        assert!(EventKind::ContentChanged.is_scannable());
        assert!(!EventKind::Other.is_scannable());
    }

    #[test]
    fn signal_timestamp_uses_history_layout() {
        let signal = ExtractedSignal {
            address: "a.com".into(),
            icon_reference: String::new(),
            observed_at: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        };
        assert_eq!(signal.timestamp(), "2024-03-09 14:05:07");
    }

    #[test]
    fn kind_deserializes_snake_case() {
        let kind: EventKind = serde_json::from_str("\"content_changed\"").unwrap();
        assert_eq!(kind, EventKind::ContentChanged);
    }
}
