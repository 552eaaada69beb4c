// src/core/policy.rs
//! Block-list snapshots and the policy update channel
//!
//! A [`PolicySnapshot`] is immutable. Updates build a whole new snapshot
//! and publish it with a single atomic pointer swap, so an evaluation in
//! flight always sees one complete list, old or new.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;
use crate::storage::policy_store::PolicyStore;

/// Decision for one application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Block,
}

/// Set of blocked application identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicySnapshot {
    blocked_application_ids: BTreeSet<String>,
}

impl PolicySnapshot {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked_application_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_blocked(&self, application_id: &str) -> bool {
        self.blocked_application_ids.contains(application_id)
    }

    pub fn blocked_application_ids(&self) -> &BTreeSet<String> {
        &self.blocked_application_ids
    }

    pub fn len(&self) -> usize {
        self.blocked_application_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked_application_ids.is_empty()
    }
}

/// Block or allow `application_id` under `snapshot`. Pure; the caller
/// performs any side effects.
pub fn enforce(application_id: &str, snapshot: &PolicySnapshot) -> Action {
    if snapshot.is_blocked(application_id) {
        Action::Block
    } else {
        Action::Allow
    }
}

/// The only mutation path for the block-list.
///
/// Cheap to clone; every clone reads and publishes the same snapshot.
/// Writers are serialized so the published snapshot always matches what
/// was last persisted.
#[derive(Clone)]
pub struct PolicyChannel {
    current: Arc<ArcSwap<PolicySnapshot>>,
    store: Arc<dyn PolicyStore>,
    update_lock: Arc<Mutex<()>>,
}

impl PolicyChannel {
    /// Load the persisted block-list and start publishing it.
    pub fn load(store: Arc<dyn PolicyStore>) -> Result<Self> {
        let snapshot = PolicySnapshot::new(store.load()?);
        info!(blocked = ?snapshot.blocked_application_ids(), "🔄 Blocked apps loaded");
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(snapshot)),
            store,
            update_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Held across persist and publish. Readers never take it.
    fn writer(&self) -> MutexGuard<'_, ()> {
        self.update_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    pub fn evaluate(&self, application_id: &str) -> Action {
        enforce(application_id, &self.current.load())
    }

    /// Replace the block-list. Order is irrelevant and duplicates collapse.
    ///
    /// The new snapshot is published even when persisting it fails, in
    /// which case the store error is returned.
    pub fn update_policy<I, S>(&self, new_blocked_ids: I) -> Result<Arc<PolicySnapshot>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let snapshot = Arc::new(PolicySnapshot::new(new_blocked_ids));
        let _writer = self.writer();
        let persisted = self.store.replace(snapshot.blocked_application_ids());
        self.current.store(Arc::clone(&snapshot));

        match persisted {
            Ok(()) => {
                info!(blocked = ?snapshot.blocked_application_ids(), "✅ Blocked apps saved");
                Ok(snapshot)
            }
            Err(e) => {
                error!("Blocked apps applied but not saved: {}", e);
                Err(e)
            }
        }
    }

    /// Re-read the store, for writers that changed it directly.
    pub fn reload(&self) -> Result<Arc<PolicySnapshot>> {
        let _writer = self.writer();
        let snapshot = Arc::new(PolicySnapshot::new(self.store.load()?));
        self.current.store(Arc::clone(&snapshot));
        info!(blocked = ?snapshot.blocked_application_ids(), "🔄 Blocked apps reloaded");
        Ok(snapshot)
    }
}
