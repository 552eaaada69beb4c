// src/host/json_tree.rs
//! A host node tree described in JSON
//!
//! The CLI's `run` mode plays the host: each event line carries a snapshot
//! of the UI tree, and every handle it hands out is booked in a shared
//! [`HandleLedger`] so leaks show up as a non-zero balance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::ui_node::{HintMatcher, ScanHint, UiNode};

/// Serializable description of one view node and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Acquire/release bookkeeping for handles handed out by the JSON host.
#[derive(Debug, Default)]
pub struct HandleLedger {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl HandleLedger {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Handles currently held by the core.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    fn acquire(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A handle into a shared [`NodeSpec`] tree.
#[derive(Debug)]
pub struct JsonNode {
    tree: Arc<NodeSpec>,
    path: Vec<usize>,
    ledger: Arc<HandleLedger>,
    indexed: bool,
    released: bool,
}

impl JsonNode {
    /// Acquire the root of `spec`. View-id lookups are served from the
    /// subtree, the way accessibility hosts answer them.
    pub fn root(spec: NodeSpec, ledger: Arc<HandleLedger>) -> Self {
        Self::acquire(Arc::new(spec), Vec::new(), ledger, true)
    }

    /// Acquire the root of `spec` on a host that offers no lookups, so
    /// matches are only found by traversal.
    pub fn unindexed_root(spec: NodeSpec, ledger: Arc<HandleLedger>) -> Self {
        Self::acquire(Arc::new(spec), Vec::new(), ledger, false)
    }

    fn acquire(
        tree: Arc<NodeSpec>,
        path: Vec<usize>,
        ledger: Arc<HandleLedger>,
        indexed: bool,
    ) -> Self {
        ledger.acquire();
        Self {
            tree,
            path,
            ledger,
            indexed,
            released: false,
        }
    }

    fn spec(&self) -> &NodeSpec {
        let mut node = &*self.tree;
        for &index in &self.path {
            match node.children.get(index) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    fn collect_view_id_matches(&self, spec: &NodeSpec, path: &mut Vec<usize>, value: &str, out: &mut Vec<JsonNode>) {
        for (index, child) in spec.children.iter().enumerate() {
            path.push(index);
            if child.view_id.as_deref() == Some(value) {
                out.push(Self::acquire(
                    Arc::clone(&self.tree),
                    path.clone(),
                    Arc::clone(&self.ledger),
                    self.indexed,
                ));
            }
            self.collect_view_id_matches(child, path, value, out);
            path.pop();
        }
    }
}

impl UiNode for JsonNode {
    fn view_id(&self) -> Option<String> {
        self.spec().view_id.clone()
    }

    fn role(&self) -> Option<String> {
        self.spec().role.clone()
    }

    fn text(&self) -> Option<String> {
        self.spec().text.clone()
    }

    fn child_count(&self) -> usize {
        self.spec().children.len()
    }

    fn child(&self, index: usize) -> Option<Self> {
        if index >= self.child_count() {
            return None;
        }
        let mut path = self.path.clone();
        path.push(index);
        Some(Self::acquire(
            Arc::clone(&self.tree),
            path,
            Arc::clone(&self.ledger),
            self.indexed,
        ))
    }

    fn find_by_hint(&self, hint: &ScanHint) -> Vec<Self> {
        // Only view ids are indexed.
        if !self.indexed || hint.matcher != HintMatcher::ViewId {
            return Vec::new();
        }
        let mut found = Vec::new();
        let mut path = self.path.clone();
        self.collect_view_id_matches(self.spec(), &mut path, &hint.value, &mut found);
        found
    }

    fn release(&mut self) {
        if self.released {
            warn!(path = ?self.path, "node handle released twice");
            return;
        }
        self.released = true;
        self.ledger.release();
    }
}
