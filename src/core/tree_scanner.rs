// src/core/tree_scanner.rs
//! Depth-first search for an address-bar value in a host UI tree
//!
//! The walk is pre-order: a node's own hints (and the host's direct lookups
//! from that node) are tried before any of its children, and the first
//! child subtree that yields text wins over its later siblings.
//!
//! Traversal keeps an explicit stack of [`NodeGuard`]s instead of
//! recursing, so a pathologically deep host tree cannot exhaust the call
//! stack. Every child handle lives in exactly one guard; returning from any
//! point drops the stack and releases everything acquired so far. The root
//! belongs to the caller and is never released here.

use tracing::trace;

use crate::core::ui_node::{NodeGuard, ScanHint, UiNode};

struct Frame<N: UiNode> {
    node: NodeGuard<N>,
    next_child: usize,
}

/// Return the first non-empty text matching `hints` under `root`.
///
/// `None` means "no signal in this tree", which is the common case.
pub fn scan<N: UiNode>(root: &N, hints: &[ScanHint]) -> Option<String> {
    if hints.is_empty() {
        return None;
    }
    if let Some(text) = match_hints(root, hints) {
        return Some(text);
    }

    let mut root_next = 0usize;
    let mut stack: Vec<Frame<N>> = Vec::new();

    loop {
        let (parent, next_child) = match stack.last_mut() {
            Some(frame) => (&*frame.node, &mut frame.next_child),
            None => (root, &mut root_next),
        };

        if *next_child >= parent.child_count() {
            if stack.pop().is_none() {
                return None;
            }
            continue;
        }

        let index = *next_child;
        *next_child += 1;

        let Some(child) = parent.child(index) else {
            trace!(index, depth = stack.len(), "host returned no child");
            continue;
        };
        let child = NodeGuard::new(child);

        if let Some(text) = match_hints(&*child, hints) {
            trace!(depth = stack.len() + 1, "address field matched");
            return Some(text);
        }

        stack.push(Frame {
            node: child,
            next_child: 0,
        });
    }
}

/// Try each hint, in priority order, against `node` and its direct lookups.
fn match_hints<N: UiNode>(node: &N, hints: &[ScanHint]) -> Option<String> {
    hints.iter().find_map(|hint| match_hint(node, hint))
}

fn match_hint<N: UiNode>(node: &N, hint: &ScanHint) -> Option<String> {
    if node.matches(hint) {
        if let Some(text) = non_empty(node.text()) {
            return Some(text);
        }
    }

    // Guard every result before reading any, so the ones after the match
    // are released too.
    let found: Vec<NodeGuard<N>> = node
        .find_by_hint(hint)
        .into_iter()
        .map(NodeGuard::new)
        .collect();
    found.iter().find_map(|candidate| non_empty(candidate.text()))
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::json_tree::{HandleLedger, JsonNode, NodeSpec};
    use std::sync::Arc;

    const URL_BAR: &str = "com.android.chrome:id/url_bar";
    const OMNIBOX: &str = "com.android.chrome:id/omnibox_text_field";

    fn chrome_hints() -> Vec<ScanHint> {
        vec![ScanHint::view_id(URL_BAR), ScanHint::view_id(OMNIBOX)]
    }

    fn deep_chain(depth: usize, leaf: NodeSpec) -> NodeSpec {
        (0..depth).fold(leaf, |child, _| NodeSpec::new().with_child(child))
    }

    /// Scan and assert the handle budget balanced out for this call.
    fn scan_balanced(root: &JsonNode, ledger: &HandleLedger, hints: &[ScanHint]) -> Option<String> {
        let (acquired, released) = (ledger.acquired(), ledger.released());
        let result = scan(root, hints);
        assert_eq!(
            ledger.acquired() - acquired,
            ledger.released() - released,
            "scan leaked node handles"
        );
        result
    }

    fn both_hosts(spec: NodeSpec, check: impl Fn(&JsonNode, &HandleLedger)) {
        for indexed in [true, false] {
            let ledger = Arc::new(HandleLedger::default());
            let root = if indexed {
                JsonNode::root(spec.clone(), ledger.clone())
            } else {
                JsonNode::unindexed_root(spec.clone(), ledger.clone())
            };
            let root = NodeGuard::new(root);
            check(&*root, &*ledger);
            drop(root);
            assert_eq!(ledger.outstanding(), 0);
        }
    }

    #[test]
    fn finds_url_bar_deep_in_tree() {
        let tree = NodeSpec::new()
            .with_child(NodeSpec::new().with_role("Toolbar"))
            .with_child(deep_chain(
                6,
                NodeSpec::new().with_view_id(URL_BAR).with_text("https://a.com"),
            ));

        both_hosts(tree, |root, ledger| {
            assert_eq!(
                scan_balanced(root, ledger, &chrome_hints()).as_deref(),
                Some("https://a.com")
            );
        });
    }

    #[test]
    fn earlier_hint_wins_at_same_node() {
        let tree = NodeSpec::new()
            .with_view_id(OMNIBOX)
            .with_role("EditText")
            .with_text("omnibox.com");
        let hints = vec![ScanHint::role("EditText"), ScanHint::view_id(OMNIBOX)];

        both_hosts(tree, |root, ledger| {
            assert_eq!(scan_balanced(root, ledger, &hints).as_deref(), Some("omnibox.com"));
        });
    }

    #[test]
    fn first_subtree_short_circuits_siblings() {
        let tree = NodeSpec::new()
            .with_child(NodeSpec::new().with_child(
                NodeSpec::new().with_view_id(OMNIBOX).with_text("first.com"),
            ))
            .with_child(NodeSpec::new().with_view_id(URL_BAR).with_text("second.com"));

        let ledger = Arc::new(HandleLedger::default());
        let root = NodeGuard::new(JsonNode::unindexed_root(tree, ledger.clone()));
        assert_eq!(
            scan_balanced(&root, &ledger, &chrome_hints()).as_deref(),
            Some("first.com")
        );
    }

    #[test]
    fn indexed_lookup_prefers_higher_priority_hint() {
        let tree = NodeSpec::new()
            .with_child(NodeSpec::new().with_view_id(OMNIBOX).with_text("omni.com"))
            .with_child(deep_chain(3, NodeSpec::new().with_view_id(URL_BAR).with_text("bar.com")));

        let ledger = Arc::new(HandleLedger::default());
        let root = NodeGuard::new(JsonNode::root(tree, ledger.clone()));
        assert_eq!(
            scan_balanced(&root, &ledger, &chrome_hints()).as_deref(),
            Some("bar.com")
        );
    }

    #[test]
    fn empty_text_is_not_a_match() {
        let tree = NodeSpec::new()
            .with_child(NodeSpec::new().with_view_id(URL_BAR).with_text(""))
            .with_child(NodeSpec::new().with_view_id(OMNIBOX).with_text("b.org"));

        both_hosts(tree, |root, ledger| {
            assert_eq!(scan_balanced(root, ledger, &chrome_hints()).as_deref(), Some("b.org"));
        });
    }

    #[test]
    fn no_match_is_none_and_releases_everything() {
        let tree = NodeSpec::new()
            .with_child(deep_chain(4, NodeSpec::new().with_text("not a field")))
            .with_child(NodeSpec::new().with_role("Button").with_text("Go"));

        both_hosts(tree, |root, ledger| {
            assert_eq!(scan_balanced(root, ledger, &chrome_hints()), None);
            assert_eq!(ledger.outstanding(), 1);
        });
    }

    #[test]
    fn no_hints_touches_nothing() {
        let ledger = Arc::new(HandleLedger::default());
        let root = NodeGuard::new(JsonNode::root(
            NodeSpec::new().with_child(NodeSpec::new().with_text("x")),
            ledger.clone(),
        ));
        assert_eq!(scan(&*root, &[]), None);
        assert_eq!(ledger.acquired(), 1);
    }

    #[test]
    fn deep_tree_is_walked_without_recursion() {
        let tree = deep_chain(2_000, NodeSpec::new().with_view_id(URL_BAR).with_text("deep.io"));
        let ledger = Arc::new(HandleLedger::default());
        let root = NodeGuard::new(JsonNode::unindexed_root(tree, ledger.clone()));
        assert_eq!(
            scan_balanced(&root, &ledger, &chrome_hints()).as_deref(),
            Some("deep.io")
        );
    }

    #[test]
    fn release_balance_holds_across_shapes() {
        // Wide, deep and mixed trees, with the match at varying positions.
        let shapes = vec![
            NodeSpec::new(),
            (0..20).fold(NodeSpec::new(), |n, i| {
                n.with_child(NodeSpec::new().with_text(format!("item {i}")))
            }),
            NodeSpec::new()
                .with_child(deep_chain(5, NodeSpec::new()))
                .with_child((0..5).fold(NodeSpec::new(), |n, _| n.with_child(NodeSpec::new())))
                .with_child(NodeSpec::new().with_view_id(OMNIBOX).with_text("late.net")),
            NodeSpec::new().with_child(
                NodeSpec::new()
                    .with_child(NodeSpec::new().with_view_id(URL_BAR))
                    .with_child(NodeSpec::new().with_view_id(URL_BAR).with_text("x.y")),
            ),
        ];

        for shape in shapes {
            both_hosts(shape, |root, ledger| {
                scan_balanced(root, ledger, &chrome_hints());
            });
        }
    }
}
