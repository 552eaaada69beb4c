//! Usage Guard Library
//!
//! Watches host UI events for browser address-bar changes, keeps a
//! de-duplicated browsing history and enforces a block-list of
//! applications.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod extractors;
pub mod host;
pub mod storage;

pub use api::ControlSurface;
pub use config::MonitorConfig;
pub use error::{GuardError, HostError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::ControlSurface;
    pub use crate::config::{MonitorConfig, MonitoredSurface};
    pub use crate::core::{
        EventKind, EventOutcome, ExtractedSignal, Monitor, MonitorListener, MonitoredEvent,
        PolicyChannel, ScanHint, UiNode,
    };
    pub use crate::host::HostBindings;
    pub use crate::storage::{HistoryStore, PolicyStore};
}
