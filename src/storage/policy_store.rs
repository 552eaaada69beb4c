// src/storage/policy_store.rs
//! Durable block-list storage
//!
//! The block-list lives under a fixed namespace/key inside a small JSON
//! preferences file. Other namespaces in the same file are preserved.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{GuardError, HostError, Result};

/// Preferences namespace holding the block-list.
pub const POLICY_NAMESPACE: &str = "blocked_apps_prefs";

/// Key of the block-list within [`POLICY_NAMESPACE`].
pub const BLOCKED_APPS_KEY: &str = "blocked_apps";

/// Durable home of the block-list.
pub trait PolicyStore: Send + Sync {
    fn load(&self) -> Result<BTreeSet<String>>;

    /// Replace the whole stored set.
    fn replace(&self, ids: &BTreeSet<String>) -> Result<()>;
}

/// JSON-file backed preferences store.
#[derive(Debug, Clone)]
pub struct JsonPolicyStore {
    path: PathBuf,
}

impl JsonPolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> GuardError {
        GuardError::PolicyIo {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        // Readers only ever see a complete file.
        let staging = self.path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(document)?;
        std::fs::write(&staging, raw).map_err(|e| self.io_error(e))?;
        std::fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))
    }
}

impl PolicyStore for JsonPolicyStore {
    fn load(&self) -> Result<BTreeSet<String>> {
        let document = self.read_document()?;
        let ids = document
            .get(POLICY_NAMESPACE)
            .and_then(|ns| ns.get(BLOCKED_APPS_KEY))
            .cloned()
            .map(serde_json::from_value::<BTreeSet<String>>)
            .transpose()?
            .unwrap_or_default();
        Ok(ids)
    }

    fn replace(&self, ids: &BTreeSet<String>) -> Result<()> {
        let mut document = self.read_document()?;
        let namespace = document
            .entry(POLICY_NAMESPACE)
            .or_insert_with(|| Value::Object(Map::new()));
        if !namespace.is_object() {
            *namespace = Value::Object(Map::new());
        }
        if let Value::Object(entries) = namespace {
            entries.insert(BLOCKED_APPS_KEY.to_string(), serde_json::to_value(ids)?);
        }
        self.write_document(&document)?;
        debug!(path = %self.path.display(), count = ids.len(), "policy store written");
        Ok(())
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    ids: Mutex<BTreeSet<String>>,
    fail_writes: AtomicBool,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent writes fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn load(&self) -> Result<BTreeSet<String>> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| HostError::Unavailable("policy store lock poisoned".into()))?;
        Ok(ids.clone())
    }

    fn replace(&self, ids: &BTreeSet<String>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("policy store is read-only".into()).into());
        }
        let mut current = self
            .ids
            .lock()
            .map_err(|_| HostError::Unavailable("policy store lock poisoned".into()))?;
        *current = ids.clone();
        Ok(())
    }
}
