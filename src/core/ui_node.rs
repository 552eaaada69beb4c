// src/core/ui_node.rs
//! Host-owned UI node handles and scoped acquisition
//!
//! The host renders a tree of view nodes and hands out reference-counted
//! handles to them. Every handle obtained from the host must be released
//! exactly once. [`NodeGuard`] ties that release to scope exit, so early
//! returns and error paths cannot leak a handle.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

/// How a [`ScanHint`] is matched against a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintMatcher {
    /// Exact match on the host's view identifier (e.g. `pkg:id/url_bar`)
    ViewId,
    /// Exact match on the node's role or class name
    Role,
}

/// A known UI-role hint for an address-bar-like field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanHint {
    pub matcher: HintMatcher,
    pub value: String,
}

impl ScanHint {
    pub fn view_id(value: impl Into<String>) -> Self {
        Self {
            matcher: HintMatcher::ViewId,
            value: value.into(),
        }
    }

    pub fn role(value: impl Into<String>) -> Self {
        Self {
            matcher: HintMatcher::Role,
            value: value.into(),
        }
    }
}

/// A handle to a host-rendered view node.
///
/// Implementations are owned handles: `child` and `find_by_hint` each
/// acquire new handles which the caller must release. Wrap them in a
/// [`NodeGuard`] rather than calling [`UiNode::release`] by hand.
pub trait UiNode: Sized {
    fn view_id(&self) -> Option<String>;

    fn role(&self) -> Option<String>;

    fn text(&self) -> Option<String>;

    fn child_count(&self) -> usize;

    /// Acquire the child at `index`. The host may return `None` for a
    /// child that disappeared between the count and the lookup.
    fn child(&self, index: usize) -> Option<Self>;

    /// Host-accelerated lookup of nodes matching `hint`. Hosts without an
    /// index return nothing and rely on the scanner's traversal.
    fn find_by_hint(&self, _hint: &ScanHint) -> Vec<Self> {
        Vec::new()
    }

    /// Return the handle to the host. Called exactly once per handle.
    fn release(&mut self);

    fn matches(&self, hint: &ScanHint) -> bool {
        let attribute = match hint.matcher {
            HintMatcher::ViewId => self.view_id(),
            HintMatcher::Role => self.role(),
        };
        attribute.as_deref() == Some(hint.value.as_str())
    }
}

/// Scoped ownership of a host node handle; releases it on drop.
#[derive(Debug)]
pub struct NodeGuard<N: UiNode> {
    node: N,
}

impl<N: UiNode> NodeGuard<N> {
    pub fn new(node: N) -> Self {
        Self { node }
    }
}

impl<N: UiNode> Deref for NodeGuard<N> {
    type Target = N;

    fn deref(&self) -> &N {
        &self.node
    }
}

impl<N: UiNode> DerefMut for NodeGuard<N> {
    fn deref_mut(&mut self) -> &mut N {
        &mut self.node
    }
}

impl<N: UiNode> Drop for NodeGuard<N> {
    fn drop(&mut self) {
        self.node.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::json_tree::{HandleLedger, JsonNode, NodeSpec};
    use std::sync::Arc;

    #[test]
    fn guard_releases_on_drop() {
        let ledger = Arc::new(HandleLedger::default());
        let spec = NodeSpec::new().with_child(NodeSpec::new().with_text("hello"));
        let root = JsonNode::root(spec, ledger.clone());

        {
            let child = NodeGuard::new(root.child(0).unwrap());
            assert_eq!(child.text().as_deref(), Some("hello"));
            assert_eq!(ledger.outstanding(), 2);
        }
        assert_eq!(ledger.outstanding(), 1);

        drop(NodeGuard::new(root));
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn hint_matching_uses_exact_attribute() {
        let ledger = Arc::new(HandleLedger::default());
        let spec = NodeSpec::new()
            .with_view_id("com.android.chrome:id/url_bar")
            .with_role("android.widget.EditText");
        let node = NodeGuard::new(JsonNode::root(spec, ledger));

        assert!(node.matches(&ScanHint::view_id("com.android.chrome:id/url_bar")));
        assert!(node.matches(&ScanHint::role("android.widget.EditText")));
        assert!(!node.matches(&ScanHint::view_id("com.android.chrome:id/url")));
        assert!(!node.matches(&ScanHint::role("com.android.chrome:id/url_bar")));
    }
}
