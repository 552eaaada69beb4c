// src/core/enforcer.rs
//! Side effects of a Block decision
//!
//! Leaving the app is requested synchronously since the host expects it
//! inside the callback. The notice and the optional termination are handed
//! to the runtime and never awaited.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::host::HostBindings;

/// What the enforcer did for one blocked event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub application_id: String,
    pub display_name: String,
    /// Whether the host accepted the home-surface request
    pub sent_home: bool,
    pub termination_requested: bool,
}

pub fn blocked_message(display_name: &str) -> String {
    format!(
        "Access to {} has been restricted due to excessive usage.",
        display_name
    )
}

pub struct PolicyEnforcer {
    host: HostBindings,
    terminate_blocked: bool,
    notice_duration: Duration,
}

impl PolicyEnforcer {
    pub fn new(host: HostBindings, terminate_blocked: bool, notice_duration: Duration) -> Self {
        Self {
            host,
            terminate_blocked,
            notice_duration,
        }
    }

    pub fn from_config(host: HostBindings, config: &MonitorConfig) -> Self {
        Self::new(host, config.terminate_blocked, config.notice_duration())
    }

    /// Evict `application_id` from the foreground and tell the user why.
    pub fn block(&self, application_id: &str, runtime: &Handle) -> BlockReport {
        let display_name = self.host.display_name(application_id);
        warn!("🚨 Blocking: {}", display_name);

        let sent_home = match self.host.process.go_home() {
            Ok(()) => true,
            Err(e) => {
                warn!(application_id, "Home request failed: {}", e);
                false
            }
        };

        self.dispatch_notice(blocked_message(&display_name), runtime);

        if self.terminate_blocked {
            self.dispatch_termination(application_id.to_string(), runtime);
        }

        BlockReport {
            application_id: application_id.to_string(),
            display_name,
            sent_home,
            termination_requested: self.terminate_blocked,
        }
    }

    fn dispatch_notice(&self, message: String, runtime: &Handle) {
        let notifier = Arc::clone(&self.host.notifier);
        let duration = self.notice_duration;
        runtime.spawn(async move {
            if let Err(e) = notifier.display(&message, duration) {
                warn!("Error showing notice: {}", e);
                return;
            }
            tokio::time::sleep(duration).await;
            notifier.dismiss();
        });
    }

    fn dispatch_termination(&self, application_id: String, runtime: &Handle) {
        let process = Arc::clone(&self.host.process);
        runtime.spawn_blocking(move || match process.terminate(&application_id) {
            Ok(()) => debug!(application_id = %application_id, "termination accepted"),
            Err(e) => warn!(application_id = %application_id, "Termination failed: {}", e),
        });
    }
}
