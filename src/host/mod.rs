// src/host/mod.rs
//! Host collaborators: process control, notifications, app directory
//!
//! The pipeline only talks to the host through these traits. The CLI binds
//! them to the implementations in [`system`]; an embedding host supplies
//! its own.

pub mod json_tree;
pub mod system;

use std::sync::Arc;
use std::time::Duration;

use crate::error::HostError;

/// Best-effort foreground and process control.
pub trait ProcessControl: Send + Sync {
    /// Move the user to the home/idle surface.
    fn go_home(&self) -> Result<(), HostError>;

    /// Terminate `application_id`. May silently no-op on protected targets.
    fn terminate(&self, application_id: &str) -> Result<(), HostError>;
}

/// User-visible notification surface. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn display(&self, message: &str, duration: Duration) -> Result<(), HostError>;

    /// Called once the duration hint elapsed.
    fn dismiss(&self) {}
}

/// Resolves application ids to human-readable names.
pub trait AppDirectory: Send + Sync {
    fn display_name(&self, application_id: &str) -> Option<String>;
}

/// The set of host services the enforcer needs.
#[derive(Clone)]
pub struct HostBindings {
    pub process: Arc<dyn ProcessControl>,
    pub notifier: Arc<dyn Notifier>,
    pub directory: Arc<dyn AppDirectory>,
}

impl HostBindings {
    pub fn new(
        process: Arc<dyn ProcessControl>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn AppDirectory>,
    ) -> Self {
        Self {
            process,
            notifier,
            directory,
        }
    }

    /// Display name for `application_id`, or the id itself.
    pub fn display_name(&self, application_id: &str) -> String {
        self.directory
            .display_name(application_id)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| application_id.to_string())
    }
}
