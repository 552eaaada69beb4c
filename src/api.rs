// src/api.rs
//! Control surface for the embedding host
//!
//! The host's settings screen runs on its own thread and talks to the
//! monitor only through this handle: block-list edits go through the policy
//! channel, history reads go straight to the store.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::info;

use crate::core::policy::PolicyChannel;
use crate::core::time_tracker::{SharedUsage, UsageReport};
use crate::error::Result;
use crate::storage::history::{HistoryEntry, HistoryStore};

/// Cloneable handle onto a running (or stopped) monitor.
#[derive(Clone)]
pub struct ControlSurface {
    policy: PolicyChannel,
    history: Arc<dyn HistoryStore>,
    usage: SharedUsage,
    active: Arc<AtomicBool>,
}

impl ControlSurface {
    pub fn new(
        policy: PolicyChannel,
        history: Arc<dyn HistoryStore>,
        usage: SharedUsage,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            policy,
            history,
            usage,
            active,
        }
    }

    /// Whether the monitor is currently accepting events
    pub fn is_monitoring(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn blocked_apps(&self) -> BTreeSet<String> {
        self.policy.snapshot().blocked_application_ids().clone()
    }

    /// Replace the block-list; effective for the next event.
    pub fn update_blocked_apps(&self, application_ids: Vec<String>) -> Result<()> {
        let snapshot = self.policy.update_policy(application_ids)?;
        info!(count = snapshot.len(), "Block-list updated from control surface");
        Ok(())
    }

    /// Pick up block-list changes written to the store by someone else.
    pub fn reload_blocked_apps(&self) -> Result<BTreeSet<String>> {
        Ok(self.policy.reload()?.blocked_application_ids().clone())
    }

    /// Full browsing history, newest first
    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.history.list_all().await
    }

    pub async fn clear_history(&self) -> Result<u64> {
        self.history.clear().await
    }

    pub fn total_usage_today(&self) -> Duration {
        self.usage.lock().total_usage_today(Local::now())
    }

    pub fn last_active_time(&self) -> Option<DateTime<Local>> {
        self.usage.lock().last_active_time()
    }

    pub fn usage_report(&self) -> UsageReport {
        self.usage.lock().report(Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UsageConfig;
    use crate::storage::history::MemoryHistoryStore;
    use crate::storage::policy_store::{MemoryPolicyStore, PolicyStore};
    use pretty_assertions::assert_eq;

    fn surface(store: Arc<MemoryPolicyStore>) -> (ControlSurface, Arc<MemoryHistoryStore>) {
        let history = Arc::new(MemoryHistoryStore::new());
        let surface = ControlSurface::new(
            PolicyChannel::load(store).unwrap(),
            history.clone(),
            SharedUsage::new(UsageConfig::default()),
            Arc::new(AtomicBool::new(false)),
        );
        (surface, history)
    }

    #[test]
    fn block_list_edits_are_persisted() {
        let store = Arc::new(MemoryPolicyStore::default());
        let (surface, _) = surface(store.clone());

        surface
            .update_blocked_apps(vec!["b.app".into(), "a.app".into()])
            .unwrap();
        assert_eq!(
            surface.blocked_apps().into_iter().collect::<Vec<_>>(),
            vec!["a.app", "b.app"]
        );
        assert_eq!(store.load().unwrap().len(), 2);

        surface.update_blocked_apps(Vec::new()).unwrap();
        assert!(surface.blocked_apps().is_empty());
    }

    #[test]
    fn reload_reads_the_store() {
        let store = Arc::new(MemoryPolicyStore::default());
        let (surface, _) = surface(store.clone());
        store
            .replace(&["x.app".to_string()].into_iter().collect())
            .unwrap();

        let reloaded = surface.reload_blocked_apps().unwrap();
        assert!(reloaded.contains("x.app"));
        assert_eq!(surface.blocked_apps(), reloaded);
    }

    #[tokio::test]
    async fn history_reads_and_clears() {
        let (surface, history) = surface(Arc::new(MemoryPolicyStore::default()));
        history.append("a.com", "", "2024-01-01 00:00:00").await.unwrap();

        assert_eq!(surface.history().await.unwrap().len(), 1);
        assert_eq!(surface.clear_history().await.unwrap(), 1);
        assert!(surface.history().await.unwrap().is_empty());
    }

    #[test]
    fn idle_usage_is_zero() {
        let (surface, _) = surface(Arc::new(MemoryPolicyStore::default()));
        assert!(!surface.is_monitoring());
        assert_eq!(surface.total_usage_today(), Duration::ZERO);
        assert_eq!(surface.last_active_time(), None);
        assert!(surface.usage_report().top_apps_by_usage.is_empty());
    }
}
