// src/extractors/classifier.rs
//! Event classification and address de-duplication
//!
//! Decides whether an event is worth a tree scan and whether the scanned
//! value is a new, loggable address.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tracing::{debug, trace};

use crate::config::{MonitorConfig, MonitoredSurface};
use crate::core::event_types::{ExtractedSignal, MonitoredEvent};
use crate::core::tree_scanner::scan;
use crate::core::ui_node::{ScanHint, UiNode};
use crate::extractors::address::{derive_icon_reference, is_valid_address};

/// The last address written during this session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupState {
    last_logged_address: String,
}

impl DedupState {
    pub fn last_logged_address(&self) -> &str {
        &self.last_logged_address
    }

    pub fn reset(&mut self) {
        self.last_logged_address.clear();
    }
}

/// Turns raw events into [`ExtractedSignal`]s.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    surfaces: HashMap<String, Vec<ScanHint>>,
    icon_service: String,
    dedup: DedupState,
}

impl EventClassifier {
    pub fn new(surfaces: &[MonitoredSurface], icon_service: impl Into<String>) -> Self {
        Self {
            surfaces: surfaces
                .iter()
                .map(|s| (s.application_id.clone(), s.hints.clone()))
                .collect(),
            icon_service: icon_service.into(),
            dedup: DedupState::default(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.surfaces, config.icon_service.clone())
    }

    /// Whether events from `application_id` are scanned at all.
    pub fn monitors(&self, application_id: &str) -> bool {
        self.surfaces.contains_key(application_id)
    }

    pub fn dedup(&self) -> &DedupState {
        &self.dedup
    }

    pub fn reset(&mut self) {
        self.dedup.reset();
    }

    pub fn classify<N: UiNode>(&mut self, event: &MonitoredEvent<N>) -> Option<ExtractedSignal> {
        self.classify_at(event, Local::now())
    }

    pub fn classify_at<N: UiNode>(
        &mut self,
        event: &MonitoredEvent<N>,
        observed_at: DateTime<Local>,
    ) -> Option<ExtractedSignal> {
        if !event.kind.is_scannable() {
            return None;
        }
        let hints = self.surfaces.get(&event.source_application_id)?;
        let Some(root) = event.root() else {
            trace!(app = %event.source_application_id, "event carried no root node");
            return None;
        };

        let candidate = scan(root, hints)?;
        self.accept(candidate, observed_at)
    }

    /// Validate and de-duplicate a scanned value.
    pub fn accept(&mut self, candidate: String, observed_at: DateTime<Local>) -> Option<ExtractedSignal> {
        if candidate == self.dedup.last_logged_address || !is_valid_address(&candidate) {
            return None;
        }

        let icon_reference = derive_icon_reference(&candidate, &self.icon_service);
        debug!(address = %candidate, icon = %icon_reference, "🔗 address detected");

        self.dedup.last_logged_address = candidate.clone();
        Some(ExtractedSignal {
            address: candidate,
            icon_reference,
            observed_at,
        })
    }
}
