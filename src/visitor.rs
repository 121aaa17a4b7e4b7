//! Structural visitor for [`TwoThreeTree`](crate::TwoThreeTree).
//!
//! The visitor exposes every stored leaf and every internal split key, in
//! traversal order, without exposing the node representation itself.
//! Consumers use it for traversals and analyses the tree does not provide
//! directly, such as invariant checks.
//!
//! # Callback order
//!
//! - Empty tree: [`visit_empty`](TreeVisitor::visit_empty), once.
//! - Leaf: [`visit_leaf`](TreeVisitor::visit_leaf) with the stored pair.
//! - Two-child node: [`enter_binary`](TreeVisitor::enter_binary), the left
//!   subtree, the right subtree, [`exit_binary`](TreeVisitor::exit_binary).
//! - Three-child node: [`enter_ternary`](TreeVisitor::enter_ternary), the
//!   left subtree, [`visit_internal_key`](TreeVisitor::visit_internal_key)
//!   with the first split key, the middle subtree, `visit_internal_key`
//!   with the second split key, the right subtree, and finally
//!   [`exit_ternary`](TreeVisitor::exit_ternary).
//!
//! # Examples
//!
//! Counting leaves and tracking the depth they sit at:
//!
//! ```rust
//! use twothree::{TreeVisitor, TwoThreeTree};
//!
//! #[derive(Default)]
//! struct LeafCounter {
//!     leaves: usize,
//! }
//!
//! impl<K, V> TreeVisitor<K, V> for LeafCounter {
//!     fn visit_leaf(&mut self, _key: &K, _value: &V) {
//!         self.leaves += 1;
//!     }
//! }
//!
//! let tree: TwoThreeTree<i32, i32> = (0..10).map(|key| (key, key)).collect();
//! let mut counter = LeafCounter::default();
//! tree.accept(&mut counter);
//! assert_eq!(counter.leaves, 10);
//! ```

use crate::tree::{Node, NodeRef};

/// Callbacks for a pre/in/post-order walk over a tree's structure.
///
/// Every method has a no-op default, so implementors override only the
/// events they care about.
pub trait TreeVisitor<K, V> {
    /// Called once when the visited tree is empty.
    fn visit_empty(&mut self) {}

    /// Called for every stored key-value pair, in ascending key order.
    fn visit_leaf(&mut self, _key: &K, _value: &V) {}

    /// Called before descending into a two-child node, with its split key.
    fn enter_binary(&mut self, _key: &K) {}

    /// Called after both children of a two-child node were visited.
    fn exit_binary(&mut self, _key: &K) {}

    /// Called before descending into a three-child node, with both split
    /// keys.
    fn enter_ternary(&mut self, _first_key: &K, _second_key: &K) {}

    /// Called after all three children of a three-child node were visited.
    fn exit_ternary(&mut self, _first_key: &K, _second_key: &K) {}

    /// Called in traversal position for each split key of a three-child
    /// node, between the visits of the children it separates.
    fn visit_internal_key(&mut self, _key: &K) {}
}

/// Drives `visitor` over `node` in the order documented on [`TreeVisitor`].
pub(crate) fn accept_node<K, V, Vis>(node: &NodeRef<K, V>, visitor: &mut Vis)
where
    Vis: TreeVisitor<K, V> + ?Sized,
{
    match &**node {
        Node::Empty => visitor.visit_empty(),
        Node::Leaf { key, value } => visitor.visit_leaf(key, value),
        Node::Binary {
            left, key, right, ..
        } => {
            visitor.enter_binary(key);
            accept_node(left, visitor);
            accept_node(right, visitor);
            visitor.exit_binary(key);
        }
        Node::Ternary {
            left,
            first_key,
            middle,
            second_key,
            right,
            ..
        } => {
            visitor.enter_ternary(first_key, second_key);
            accept_node(left, visitor);
            visitor.visit_internal_key(first_key);
            accept_node(middle, visitor);
            visitor.visit_internal_key(second_key);
            accept_node(right, visitor);
            visitor.exit_ternary(first_key, second_key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TwoThreeTree;
    use rstest::rstest;
    use std::collections::BTreeSet;

    /// Records every callback as a compact event string.
    #[derive(Default)]
    struct EventRecorder {
        events: Vec<String>,
    }

    impl TreeVisitor<i32, &'static str> for EventRecorder {
        fn visit_empty(&mut self) {
            self.events.push("empty".to_string());
        }

        fn visit_leaf(&mut self, key: &i32, value: &&'static str) {
            self.events.push(format!("leaf({key}={value})"));
        }

        fn enter_binary(&mut self, key: &i32) {
            self.events.push(format!("enter2({key})"));
        }

        fn exit_binary(&mut self, key: &i32) {
            self.events.push(format!("exit2({key})"));
        }

        fn enter_ternary(&mut self, first_key: &i32, second_key: &i32) {
            self.events.push(format!("enter3({first_key},{second_key})"));
        }

        fn exit_ternary(&mut self, first_key: &i32, second_key: &i32) {
            self.events.push(format!("exit3({first_key},{second_key})"));
        }

        fn visit_internal_key(&mut self, key: &i32) {
            self.events.push(format!("key({key})"));
        }
    }

    fn record(tree: &TwoThreeTree<i32, &'static str>) -> Vec<String> {
        let mut recorder = EventRecorder::default();
        tree.accept(&mut recorder);
        recorder.events
    }

    #[rstest]
    fn test_empty_tree_visits_empty_exactly_once() {
        let tree: TwoThreeTree<i32, &'static str> = TwoThreeTree::new();
        assert_eq!(record(&tree), vec!["empty"]);
    }

    #[rstest]
    fn test_leaf_visit_carries_the_pair() {
        let tree = TwoThreeTree::new().put(7, "seven");
        assert_eq!(record(&tree), vec!["leaf(7=seven)"]);
    }

    #[rstest]
    fn test_binary_node_event_order() {
        // Two entries form a single binary node over two leaves.
        let tree = TwoThreeTree::new().put(1, "a").put(2, "b");
        assert_eq!(
            record(&tree),
            vec!["enter2(1)", "leaf(1=a)", "leaf(2=b)", "exit2(1)"]
        );
    }

    #[rstest]
    fn test_ternary_node_event_order() {
        // Three entries form a single ternary node over three leaves, with
        // the split keys reported in traversal position.
        let tree = TwoThreeTree::new().put(2, "b").put(1, "a").put(3, "c");
        assert_eq!(
            record(&tree),
            vec![
                "enter3(1,2)",
                "leaf(1=a)",
                "key(1)",
                "leaf(2=b)",
                "key(2)",
                "leaf(3=c)",
                "exit3(1,2)",
            ]
        );
    }

    #[rstest]
    fn test_leaves_are_visited_in_ascending_order() {
        let keys = [42, 17, 99, 3, 56, 71, 28, 8, 64];
        let mut tree = TwoThreeTree::new();
        for key in keys {
            tree = tree.put(key, "x");
        }

        let events = record(&tree);
        let visited: Vec<i32> = events
            .iter()
            .filter_map(|event| {
                event
                    .strip_prefix("leaf(")
                    .and_then(|rest| rest.split('=').next())
                    .and_then(|key| key.parse().ok())
            })
            .collect();
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        assert_eq!(visited, sorted);
    }

    /// The redundant-key analysis from the original interactive tooling:
    /// every internal split key of a ternary node should also exist as a
    /// leaf key somewhere in the tree, otherwise it holds memory for a key
    /// that was deleted.
    #[derive(Default)]
    struct RedundantKeyChecker {
        internal_keys: BTreeSet<i32>,
        leaf_keys: BTreeSet<i32>,
    }

    impl<V> TreeVisitor<i32, V> for RedundantKeyChecker {
        fn visit_leaf(&mut self, key: &i32, _value: &V) {
            self.leaf_keys.insert(*key);
        }

        fn visit_internal_key(&mut self, key: &i32) {
            self.internal_keys.insert(*key);
        }
    }

    #[rstest]
    fn test_internal_keys_are_backed_by_leaves_after_inserts() {
        let mut tree = TwoThreeTree::new();
        for key in 0..64 {
            tree = tree.put(key, key);
        }

        let mut checker = RedundantKeyChecker::default();
        tree.accept(&mut checker);
        assert!(
            checker.internal_keys.is_subset(&checker.leaf_keys),
            "dangling internal keys: {:?}",
            checker
                .internal_keys
                .difference(&checker.leaf_keys)
                .collect::<Vec<_>>()
        );
    }
}
