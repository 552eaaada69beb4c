// src/config.rs
//! Monitor configuration
//!
//! Every field has a default, so a config file only needs to name what it
//! changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ui_node::ScanHint;
use crate::error::{GuardError, Result};
use crate::extractors::address::DEFAULT_ICON_SERVICE;

/// A browser surface whose address bar is scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredSurface {
    pub application_id: String,
    /// Tried in order at every node; earlier hints win.
    pub hints: Vec<ScanHint>,
}

impl MonitoredSurface {
    pub fn chrome() -> Self {
        Self {
            application_id: "com.android.chrome".to_string(),
            hints: vec![
                ScanHint::view_id("com.android.chrome:id/url_bar"),
                ScanHint::view_id("com.android.chrome:id/omnibox_text_field"),
            ],
        }
    }
}

/// Foreground time tracking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    /// Sessions shorter than this are left out of the session history
    pub min_session_ms: u64,
    /// Maximum number of sessions kept (0 = unlimited)
    pub history_limit: usize,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            min_session_ms: 1000,
            history_limit: 10000,
        }
    }
}

impl UsageConfig {
    pub fn min_session_duration(&self) -> Duration {
        Duration::from_millis(self.min_session_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub surfaces: Vec<MonitoredSurface>,
    pub icon_service: String,
    /// Also ask the host to kill a blocked application, not just hide it
    pub terminate_blocked: bool,
    pub notice_duration_ms: u64,
    pub database_path: PathBuf,
    pub policy_path: PathBuf,
    /// Display names used when the host has none for an application id
    pub app_names: BTreeMap<String, String>,
    pub usage: UsageConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            surfaces: vec![MonitoredSurface::chrome()],
            icon_service: DEFAULT_ICON_SERVICE.to_string(),
            terminate_blocked: false,
            notice_duration_ms: 4000,
            database_path: PathBuf::from("guard_data/history.db"),
            policy_path: PathBuf::from("guard_data/policy.json"),
            app_names: BTreeMap::new(),
            usage: UsageConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load a JSON config file, filling unset fields with defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GuardError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for surface in &self.surfaces {
            if surface.application_id.is_empty() {
                return Err(GuardError::Config("surface with empty application_id".into()));
            }
            if surface.hints.is_empty() {
                return Err(GuardError::Config(format!(
                    "surface {} has no scan hints",
                    surface.application_id
                )));
            }
        }
        Ok(())
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}
