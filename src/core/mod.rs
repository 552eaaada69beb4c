// src/core/mod.rs
pub mod enforcer;
pub mod event_types;
pub mod monitor;
pub mod policy;
pub mod time_tracker;
pub mod tree_scanner;
pub mod ui_node;

pub use event_types::{EventKind, EventOutcome, ExtractedSignal, MonitorListener, MonitoredEvent};
pub use monitor::{Monitor, SessionState, SessionSummary};
pub use policy::{Action, PolicyChannel, PolicySnapshot};
pub use ui_node::{NodeGuard, ScanHint, UiNode};
