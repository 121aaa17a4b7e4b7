//! Persistent 2-3 search tree.
//!
//! This module provides [`TwoThreeTree`], an immutable ordered key-value
//! tree that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! A 2-3 tree keeps every leaf at the same depth: internal nodes hold either
//! two children and one split key, or three children and two split keys.
//! Insertion grows the tree by splitting overfull nodes bottom-up; deletion
//! shrinks it by borrowing from or merging with siblings bottom-up.
//!
//! - O(log N) get
//! - O(log N) put
//! - O(log N) remove
//! - O(N) size (uncached; the map/set adapters cache it)
//!
//! All operations return new trees without modifying the original, and
//! unchanged subtrees are shared between versions rather than copied.
//!
//! # Change detection
//!
//! An operation that would not change the key/value contents returns a tree
//! sharing its root with the input. [`TwoThreeTree::ptr_eq`] makes that
//! observable, so callers can detect no-ops without comparing contents:
//!
//! ```rust
//! use twothree::TwoThreeTree;
//!
//! let tree = TwoThreeTree::new().put("a", 1).put("b", 2);
//! assert!(tree.remove("missing").ptr_eq(&tree));
//! assert!(!tree.remove("a").ptr_eq(&tree));
//! ```

use crate::ReferenceCounter;
use crate::visitor::{self, TreeVisitor};
use smallvec::SmallVec;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;

/// Panic message for the equal-rank construction invariant.
const RANK_MISMATCH_PANIC_MESSAGE: &str =
    "invariant violation: children of an internal node must have equal rank";

/// Panic message for the no-empty-children construction invariant.
const EMPTY_CHILD_PANIC_MESSAGE: &str =
    "invariant violation: an internal node cannot hold an empty child";

/// Panic message for the grow-propagation contract of `put`.
const GROWN_NOT_BINARY_PANIC_MESSAGE: &str =
    "invariant violation: a subtree that grew a rank must be a binary node";

/// Panic message for the shrink-propagation contract of `remove`.
const UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE: &str =
    "invariant violation: an underflowed subtree cannot sit beside a leaf";

/// In-order iteration keeps at most a few pending nodes per level, so this
/// covers trees of several thousand entries without a heap allocation.
const ITERATOR_STACK_CAPACITY: usize = 16;

// =============================================================================
// Node Definition
// =============================================================================

pub(crate) type NodeRef<K, V> = ReferenceCounter<Node<K, V>>;

/// Internal node of the 2-3 tree.
///
/// `Empty` and `Leaf` both have rank 0; `Binary` and `Ternary` cache their
/// rank (one more than their children's shared rank) so that grow/shrink
/// propagation can be decided without walking to a leaf.
pub(crate) enum Node<K, V> {
    Empty,
    Leaf {
        key: K,
        value: V,
    },
    Binary {
        left: NodeRef<K, V>,
        key: K,
        right: NodeRef<K, V>,
        rank: usize,
    },
    Ternary {
        left: NodeRef<K, V>,
        first_key: K,
        middle: NodeRef<K, V>,
        second_key: K,
        right: NodeRef<K, V>,
        rank: usize,
    },
}

impl<K, V> Node<K, V> {
    /// The number of internal levels between this node and its leaves.
    pub(crate) fn rank(&self) -> usize {
        match self {
            Self::Empty | Self::Leaf { .. } => 0,
            Self::Binary { rank, .. } | Self::Ternary { rank, .. } => *rank,
        }
    }

    pub(crate) const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Builds a two-child node. All keys in `left` must be `<= key`, all
    /// keys in `right` must be `> key`.
    fn binary(left: NodeRef<K, V>, key: K, right: NodeRef<K, V>) -> NodeRef<K, V> {
        debug_assert!(
            !left.is_empty() && !right.is_empty(),
            "{}",
            EMPTY_CHILD_PANIC_MESSAGE
        );
        debug_assert!(
            left.rank() == right.rank(),
            "{}",
            RANK_MISMATCH_PANIC_MESSAGE
        );
        let rank = left.rank() + 1;
        ReferenceCounter::new(Self::Binary {
            left,
            key,
            right,
            rank,
        })
    }

    /// Builds a three-child node. Keys in `left` are `<= first_key`, keys in
    /// `middle` are in `(first_key, second_key]`, keys in `right` are
    /// `> second_key`.
    fn ternary(
        left: NodeRef<K, V>,
        first_key: K,
        middle: NodeRef<K, V>,
        second_key: K,
        right: NodeRef<K, V>,
    ) -> NodeRef<K, V> {
        debug_assert!(
            !left.is_empty() && !middle.is_empty() && !right.is_empty(),
            "{}",
            EMPTY_CHILD_PANIC_MESSAGE
        );
        debug_assert!(
            left.rank() == middle.rank() && left.rank() == right.rank(),
            "{}",
            RANK_MISMATCH_PANIC_MESSAGE
        );
        let rank = left.rank() + 1;
        ReferenceCounter::new(Self::Ternary {
            left,
            first_key,
            middle,
            second_key,
            right,
            rank,
        })
    }
}

// =============================================================================
// TwoThreeTree Definition
// =============================================================================

/// A persistent ordered key-value tree with all leaves at equal depth.
///
/// Every mutating operation returns a new tree; the receiver is never
/// modified. Subtrees off the modified path are shared between the old and
/// new version, so `put` and `remove` allocate O(log N) nodes.
///
/// Cloning is O(1): it copies one reference-counted root pointer.
///
/// # Examples
///
/// ```rust
/// use twothree::TwoThreeTree;
///
/// let tree = TwoThreeTree::new()
///     .put(2, "two")
///     .put(1, "one")
///     .put(3, "three");
///
/// assert_eq!(tree.get(&2), Some(&"two"));
/// assert_eq!(tree.size(), 3);
///
/// // Iteration is in ascending key order.
/// let keys: Vec<&i32> = tree.keys().collect();
/// assert_eq!(keys, vec![&1, &2, &3]);
/// ```
pub struct TwoThreeTree<K, V> {
    pub(crate) root: NodeRef<K, V>,
}

impl<K, V> Clone for TwoThreeTree<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for TwoThreeTree<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TwoThreeTree<K, V> {
    /// Creates the empty tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let tree: TwoThreeTree<i32, String> = TwoThreeTree::new();
    /// assert!(tree.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: ReferenceCounter::new(Node::Empty),
        }
    }

    /// Returns `true` if the tree holds no entries.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Counts the entries in the tree.
    ///
    /// The count is not cached, so this walks the whole tree. Callers that
    /// query the size repeatedly should cache it themselves; that is exactly
    /// what [`PersistentTreeMap`](crate::PersistentTreeMap) and
    /// [`PersistentTreeSet`](crate::PersistentTreeSet) do.
    ///
    /// # Complexity
    ///
    /// O(N)
    #[must_use]
    pub fn size(&self) -> usize {
        Self::size_of_node(&self.root)
    }

    fn size_of_node(node: &Node<K, V>) -> usize {
        match node {
            Node::Empty => 0,
            Node::Leaf { .. } => 1,
            Node::Binary { left, right, .. } => {
                Self::size_of_node(left) + Self::size_of_node(right)
            }
            Node::Ternary {
                left,
                middle,
                right,
                ..
            } => {
                Self::size_of_node(left)
                    + Self::size_of_node(middle)
                    + Self::size_of_node(right)
            }
        }
    }

    /// Returns `true` if both trees share the same root node.
    ///
    /// [`put`](Self::put) and [`remove`](Self::remove) guarantee that a
    /// no-op returns a tree sharing its root with the input, so this is an
    /// O(1) "did anything change?" test.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let tree = TwoThreeTree::new().put(1, "one");
    /// let unchanged = tree.put(1, "one");
    /// assert!(unchanged.ptr_eq(&tree));
    /// ```
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ReferenceCounter::ptr_eq(&self.root, &other.root)
    }

    /// Returns an iterator over entries in ascending key order.
    ///
    /// The iterator holds its own stack of pending subtrees, so any number
    /// of iterators can walk the same tree independently.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let tree = TwoThreeTree::new().put(2, "two").put(1, "one");
    /// let entries: Vec<(&i32, &&str)> = tree.iter().collect();
    /// assert_eq!(entries, vec![(&1, &"one"), (&2, &"two")]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> TwoThreeTreeIterator<'_, K, V> {
        let mut stack = SmallVec::new();
        if !self.root.is_empty() {
            stack.push(&*self.root);
        }
        TwoThreeTreeIterator { stack }
    }

    /// Returns a lazy view of the keys in ascending order.
    ///
    /// Besides iterating, the view answers membership tests by delegating
    /// to [`contains_key`](Self::contains_key):
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let tree = TwoThreeTree::new().put("Hello", "World");
    /// assert!(tree.keys().contains("Hello"));
    /// assert_eq!(tree.keys().collect::<Vec<_>>(), vec![&"Hello"]);
    /// ```
    #[must_use]
    pub fn keys(&self) -> TwoThreeTreeKeys<'_, K, V> {
        TwoThreeTreeKeys {
            tree: self,
            entries: self.iter(),
        }
    }

    /// Drives `visitor` over the tree structure.
    ///
    /// See [`TreeVisitor`] for the callback order. The visitor observes
    /// every leaf and every internal split key without depending on the
    /// node representation.
    pub fn accept<Vis>(&self, visitor: &mut Vis)
    where
        Vis: TreeVisitor<K, V> + ?Sized,
    {
        visitor::accept_node(&self.root, visitor);
    }

    /// Renders the tree structure as an indented multi-line string.
    ///
    /// Children are indented one level deeper than their parent's split
    /// keys; leaves render as `key = value`. Only meant for debugging;
    /// the exact format carries no contract.
    #[must_use]
    pub fn dump(&self) -> String
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        let mut output = String::new();
        Self::dump_node(&self.root, 0, &mut output);
        output
    }

    fn dump_node(node: &Node<K, V>, indent: usize, output: &mut String)
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        let pad = "  ".repeat(indent);
        match node {
            Node::Empty => {
                output.push_str(&pad);
                output.push_str("EMPTY\n");
            }
            Node::Leaf { key, value } => {
                output.push_str(&format!("{pad}{key} = {value}\n"));
            }
            Node::Binary {
                left, key, right, ..
            } => {
                Self::dump_node(left, indent + 1, output);
                output.push_str(&format!("{pad}{key}\n"));
                Self::dump_node(right, indent + 1, output);
            }
            Node::Ternary {
                left,
                first_key,
                middle,
                second_key,
                right,
                ..
            } => {
                Self::dump_node(left, indent + 1, output);
                output.push_str(&format!("{pad}{first_key}\n"));
                Self::dump_node(middle, indent + 1, output);
                output.push_str(&format!("{pad}{second_key}\n"));
                Self::dump_node(right, indent + 1, output);
            }
        }
    }
}

// =============================================================================
// Lookup
// =============================================================================

impl<K: Ord, V> TwoThreeTree<K, V> {
    /// Returns a reference to the value associated with `key`.
    ///
    /// The key may be any borrowed form of the tree's key type, as long as
    /// the ordering on the borrowed form matches the ordering on the key
    /// type. Absence is a normal outcome, not an error.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let tree = TwoThreeTree::new().put("hello".to_string(), 42);
    ///
    /// assert_eq!(tree.get("hello"), Some(&42));
    /// assert_eq!(tree.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self::get_from_node(&self.root, key)
    }

    fn get_from_node<'a, Q>(node: &'a Node<K, V>, key: &Q) -> Option<&'a V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match node {
            Node::Empty => None,
            Node::Leaf {
                key: existing_key,
                value,
            } => (key == existing_key.borrow()).then_some(value),
            Node::Binary {
                left,
                key: split_key,
                right,
                ..
            } => {
                if key > split_key.borrow() {
                    Self::get_from_node(right, key)
                } else {
                    Self::get_from_node(left, key)
                }
            }
            Node::Ternary {
                left,
                first_key,
                middle,
                second_key,
                right,
                ..
            } => {
                if key > second_key.borrow() {
                    Self::get_from_node(right, key)
                } else if key > first_key.borrow() {
                    Self::get_from_node(middle, key)
                } else {
                    Self::get_from_node(left, key)
                }
            }
        }
    }

    /// Returns `true` if the tree contains an entry for `key`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }
}

// =============================================================================
// Insertion
// =============================================================================

impl<K: Clone + Ord, V: PartialEq> TwoThreeTree<K, V> {
    /// Returns a tree with `key` associated to `value`.
    ///
    /// Overwrites any existing association. If the key is already mapped to
    /// an equal value, the returned tree shares its root with `self`
    /// (see [`ptr_eq`](Self::ptr_eq)).
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let version1 = TwoThreeTree::new().put(1, "one");
    /// let version2 = version1.put(1, "ONE");
    ///
    /// assert_eq!(version1.get(&1), Some(&"one")); // original unchanged
    /// assert_eq!(version2.get(&1), Some(&"ONE"));
    /// ```
    #[must_use]
    pub fn put(&self, key: K, value: V) -> Self {
        Self {
            root: Self::put_into_node(&self.root, key, value),
        }
    }

    /// Recursive helper for `put`. The returned subtree's rank is either
    /// unchanged or exactly one greater; when it grew, the result is always
    /// a `Binary` so the parent can absorb the extra fan-out.
    fn put_into_node(node: &NodeRef<K, V>, key: K, value: V) -> NodeRef<K, V> {
        match &**node {
            Node::Empty => ReferenceCounter::new(Node::Leaf { key, value }),
            Node::Leaf {
                key: existing_key,
                value: existing_value,
            } => match key.cmp(existing_key) {
                Ordering::Equal => {
                    if value == *existing_value {
                        node.clone()
                    } else {
                        ReferenceCounter::new(Node::Leaf { key, value })
                    }
                }
                Ordering::Less => {
                    let split_key = key.clone();
                    Node::binary(
                        ReferenceCounter::new(Node::Leaf { key, value }),
                        split_key,
                        node.clone(),
                    )
                }
                Ordering::Greater => Node::binary(
                    node.clone(),
                    existing_key.clone(),
                    ReferenceCounter::new(Node::Leaf { key, value }),
                ),
            },
            Node::Binary {
                left,
                key: split_key,
                right,
                ..
            } => {
                if key > *split_key {
                    let updated = Self::put_into_node(right, key, value);
                    if ReferenceCounter::ptr_eq(&updated, right) {
                        node.clone()
                    } else if updated.rank() == right.rank() {
                        Node::binary(left.clone(), split_key.clone(), updated)
                    } else {
                        let Node::Binary {
                            left: grown_left,
                            key: grown_key,
                            right: grown_right,
                            ..
                        } = &*updated
                        else {
                            unreachable!("{}", GROWN_NOT_BINARY_PANIC_MESSAGE)
                        };
                        Node::ternary(
                            left.clone(),
                            split_key.clone(),
                            grown_left.clone(),
                            grown_key.clone(),
                            grown_right.clone(),
                        )
                    }
                } else {
                    let updated = Self::put_into_node(left, key, value);
                    if ReferenceCounter::ptr_eq(&updated, left) {
                        node.clone()
                    } else if updated.rank() == left.rank() {
                        Node::binary(updated, split_key.clone(), right.clone())
                    } else {
                        let Node::Binary {
                            left: grown_left,
                            key: grown_key,
                            right: grown_right,
                            ..
                        } = &*updated
                        else {
                            unreachable!("{}", GROWN_NOT_BINARY_PANIC_MESSAGE)
                        };
                        Node::ternary(
                            grown_left.clone(),
                            grown_key.clone(),
                            grown_right.clone(),
                            split_key.clone(),
                            right.clone(),
                        )
                    }
                }
            }
            Node::Ternary {
                left,
                first_key,
                middle,
                second_key,
                right,
                ..
            } => {
                if key > *second_key {
                    let updated = Self::put_into_node(right, key, value);
                    if ReferenceCounter::ptr_eq(&updated, right) {
                        node.clone()
                    } else if updated.rank() == right.rank() {
                        Node::ternary(
                            left.clone(),
                            first_key.clone(),
                            middle.clone(),
                            second_key.clone(),
                            updated,
                        )
                    } else {
                        // No room for a fourth child: split into a binary
                        // node of binary nodes, growing our own rank.
                        Node::binary(
                            Node::binary(left.clone(), first_key.clone(), middle.clone()),
                            second_key.clone(),
                            updated,
                        )
                    }
                } else if key > *first_key {
                    let updated = Self::put_into_node(middle, key, value);
                    if ReferenceCounter::ptr_eq(&updated, middle) {
                        node.clone()
                    } else if updated.rank() == middle.rank() {
                        Node::ternary(
                            left.clone(),
                            first_key.clone(),
                            updated,
                            second_key.clone(),
                            right.clone(),
                        )
                    } else {
                        let Node::Binary {
                            left: grown_left,
                            key: grown_key,
                            right: grown_right,
                            ..
                        } = &*updated
                        else {
                            unreachable!("{}", GROWN_NOT_BINARY_PANIC_MESSAGE)
                        };
                        Node::binary(
                            Node::binary(left.clone(), first_key.clone(), grown_left.clone()),
                            grown_key.clone(),
                            Node::binary(grown_right.clone(), second_key.clone(), right.clone()),
                        )
                    }
                } else {
                    let updated = Self::put_into_node(left, key, value);
                    if ReferenceCounter::ptr_eq(&updated, left) {
                        node.clone()
                    } else if updated.rank() == left.rank() {
                        Node::ternary(
                            updated,
                            first_key.clone(),
                            middle.clone(),
                            second_key.clone(),
                            right.clone(),
                        )
                    } else {
                        Node::binary(
                            updated,
                            first_key.clone(),
                            Node::binary(middle.clone(), second_key.clone(), right.clone()),
                        )
                    }
                }
            }
        }
    }
}

// =============================================================================
// Deletion
// =============================================================================

impl<K: Clone + Ord, V> TwoThreeTree<K, V> {
    /// Returns a tree without any association for `key`.
    ///
    /// If the key is absent the returned tree shares its root with `self`
    /// (see [`ptr_eq`](Self::ptr_eq)).
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::TwoThreeTree;
    ///
    /// let tree = TwoThreeTree::new().put(1, "one").put(2, "two");
    /// let removed = tree.remove(&1);
    ///
    /// assert_eq!(removed.get(&1), None);
    /// assert_eq!(tree.get(&1), Some(&"one")); // original unchanged
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Self {
            root: Self::remove_from_node(&self.root, key),
        }
    }

    /// Recursive helper for `remove`. The returned subtree's rank is either
    /// unchanged or exactly one less. A leaf that loses its key comes back
    /// as `Empty` at rank 0, which is what triggers the collapse cases in
    /// the parent.
    fn remove_from_node<Q>(node: &NodeRef<K, V>, key: &Q) -> NodeRef<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match &**node {
            Node::Empty => node.clone(),
            Node::Leaf {
                key: existing_key, ..
            } => {
                if key == existing_key.borrow() {
                    ReferenceCounter::new(Node::Empty)
                } else {
                    node.clone()
                }
            }
            Node::Binary {
                left,
                key: split_key,
                right,
                ..
            } => {
                if key > split_key.borrow() {
                    let updated = Self::remove_from_node(right, key);
                    if ReferenceCounter::ptr_eq(&updated, right) {
                        node.clone()
                    } else if updated.is_empty() {
                        // Both children were leaves; only the sibling is left.
                        debug_assert!(
                            matches!(&**left, Node::Leaf { .. }),
                            "{}",
                            UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE
                        );
                        left.clone()
                    } else if updated.rank() == right.rank() {
                        Node::binary(left.clone(), split_key.clone(), updated)
                    } else {
                        match &**left {
                            Node::Binary {
                                left: sibling_left,
                                key: sibling_key,
                                right: sibling_right,
                                ..
                            } => Node::ternary(
                                sibling_left.clone(),
                                sibling_key.clone(),
                                sibling_right.clone(),
                                split_key.clone(),
                                updated,
                            ),
                            Node::Ternary {
                                left: sibling_left,
                                first_key: sibling_first,
                                middle: sibling_middle,
                                second_key: sibling_second,
                                right: sibling_right,
                                ..
                            } => Node::binary(
                                Node::binary(
                                    sibling_left.clone(),
                                    sibling_first.clone(),
                                    sibling_middle.clone(),
                                ),
                                sibling_second.clone(),
                                Node::binary(sibling_right.clone(), split_key.clone(), updated),
                            ),
                            _ => unreachable!("{}", UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE),
                        }
                    }
                } else {
                    let updated = Self::remove_from_node(left, key);
                    if ReferenceCounter::ptr_eq(&updated, left) {
                        node.clone()
                    } else if updated.is_empty() {
                        debug_assert!(
                            matches!(&**right, Node::Leaf { .. }),
                            "{}",
                            UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE
                        );
                        right.clone()
                    } else if updated.rank() == left.rank() {
                        Node::binary(updated, split_key.clone(), right.clone())
                    } else {
                        match &**right {
                            Node::Binary {
                                left: sibling_left,
                                key: sibling_key,
                                right: sibling_right,
                                ..
                            } => Node::ternary(
                                updated,
                                split_key.clone(),
                                sibling_left.clone(),
                                sibling_key.clone(),
                                sibling_right.clone(),
                            ),
                            Node::Ternary {
                                left: sibling_left,
                                first_key: sibling_first,
                                middle: sibling_middle,
                                second_key: sibling_second,
                                right: sibling_right,
                                ..
                            } => Node::binary(
                                Node::binary(updated, split_key.clone(), sibling_left.clone()),
                                sibling_first.clone(),
                                Node::binary(
                                    sibling_middle.clone(),
                                    sibling_second.clone(),
                                    sibling_right.clone(),
                                ),
                            ),
                            _ => unreachable!("{}", UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE),
                        }
                    }
                }
            }
            Node::Ternary {
                left,
                first_key,
                middle,
                second_key,
                right,
                ..
            } => {
                if key > second_key.borrow() {
                    let updated = Self::remove_from_node(right, key);
                    if ReferenceCounter::ptr_eq(&updated, right) {
                        node.clone()
                    } else if updated.is_empty() {
                        Node::binary(left.clone(), first_key.clone(), middle.clone())
                    } else if updated.rank() == right.rank() {
                        Node::ternary(
                            left.clone(),
                            first_key.clone(),
                            middle.clone(),
                            second_key.clone(),
                            updated,
                        )
                    } else {
                        match &**middle {
                            Node::Binary {
                                left: sibling_left,
                                key: sibling_key,
                                right: sibling_right,
                                ..
                            } => Node::binary(
                                left.clone(),
                                first_key.clone(),
                                Node::ternary(
                                    sibling_left.clone(),
                                    sibling_key.clone(),
                                    sibling_right.clone(),
                                    second_key.clone(),
                                    updated,
                                ),
                            ),
                            Node::Ternary {
                                left: sibling_left,
                                first_key: sibling_first,
                                middle: sibling_middle,
                                second_key: sibling_second,
                                right: sibling_right,
                                ..
                            } => Node::ternary(
                                left.clone(),
                                first_key.clone(),
                                Node::binary(
                                    sibling_left.clone(),
                                    sibling_first.clone(),
                                    sibling_middle.clone(),
                                ),
                                sibling_second.clone(),
                                Node::binary(sibling_right.clone(), second_key.clone(), updated),
                            ),
                            _ => unreachable!("{}", UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE),
                        }
                    }
                } else if key > first_key.borrow() {
                    let updated = Self::remove_from_node(middle, key);
                    if ReferenceCounter::ptr_eq(&updated, middle) {
                        node.clone()
                    } else if updated.is_empty() {
                        Node::binary(left.clone(), first_key.clone(), right.clone())
                    } else if updated.rank() == middle.rank() {
                        Node::ternary(
                            left.clone(),
                            first_key.clone(),
                            updated,
                            second_key.clone(),
                            right.clone(),
                        )
                    } else {
                        match &**left {
                            Node::Binary {
                                left: sibling_left,
                                key: sibling_key,
                                right: sibling_right,
                                ..
                            } => Node::binary(
                                Node::ternary(
                                    sibling_left.clone(),
                                    sibling_key.clone(),
                                    sibling_right.clone(),
                                    first_key.clone(),
                                    updated,
                                ),
                                second_key.clone(),
                                right.clone(),
                            ),
                            Node::Ternary {
                                left: sibling_left,
                                first_key: sibling_first,
                                middle: sibling_middle,
                                second_key: sibling_second,
                                right: sibling_right,
                                ..
                            } => Node::ternary(
                                Node::binary(
                                    sibling_left.clone(),
                                    sibling_first.clone(),
                                    sibling_middle.clone(),
                                ),
                                sibling_second.clone(),
                                Node::binary(sibling_right.clone(), first_key.clone(), updated),
                                second_key.clone(),
                                right.clone(),
                            ),
                            _ => unreachable!("{}", UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE),
                        }
                    }
                } else {
                    let updated = Self::remove_from_node(left, key);
                    if ReferenceCounter::ptr_eq(&updated, left) {
                        node.clone()
                    } else if updated.is_empty() {
                        Node::binary(middle.clone(), second_key.clone(), right.clone())
                    } else if updated.rank() == left.rank() {
                        Node::ternary(
                            updated,
                            first_key.clone(),
                            middle.clone(),
                            second_key.clone(),
                            right.clone(),
                        )
                    } else {
                        match &**middle {
                            Node::Binary {
                                left: sibling_left,
                                key: sibling_key,
                                right: sibling_right,
                                ..
                            } => Node::binary(
                                Node::ternary(
                                    updated,
                                    first_key.clone(),
                                    sibling_left.clone(),
                                    sibling_key.clone(),
                                    sibling_right.clone(),
                                ),
                                second_key.clone(),
                                right.clone(),
                            ),
                            Node::Ternary {
                                left: sibling_left,
                                first_key: sibling_first,
                                middle: sibling_middle,
                                second_key: sibling_second,
                                right: sibling_right,
                                ..
                            } => Node::ternary(
                                Node::binary(updated, first_key.clone(), sibling_left.clone()),
                                sibling_first.clone(),
                                Node::binary(
                                    sibling_middle.clone(),
                                    sibling_second.clone(),
                                    sibling_right.clone(),
                                ),
                                second_key.clone(),
                                right.clone(),
                            ),
                            _ => unreachable!("{}", UNDERFLOW_BESIDE_LEAF_PANIC_MESSAGE),
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// An iterator over the entries of a [`TwoThreeTree`] in ascending key
/// order.
///
/// Maintains an explicit stack of pending subtrees; expanding the most
/// recently pushed node left-to-right guarantees the leftmost unvisited
/// leaf is produced next.
pub struct TwoThreeTreeIterator<'a, K, V> {
    stack: SmallVec<[&'a Node<K, V>; ITERATOR_STACK_CAPACITY]>,
}

impl<'a, K, V> Iterator for TwoThreeTreeIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Node::Empty => {}
                Node::Leaf { key, value } => return Some((key, value)),
                Node::Binary { left, right, .. } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
                Node::Ternary {
                    left,
                    middle,
                    right,
                    ..
                } => {
                    self.stack.push(right);
                    self.stack.push(middle);
                    self.stack.push(left);
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.stack.is_empty() {
            (0, Some(0))
        } else {
            // Every pending subtree holds at least one leaf.
            (self.stack.len(), None)
        }
    }
}

impl<K, V> FusedIterator for TwoThreeTreeIterator<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a TwoThreeTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = TwoThreeTreeIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A lazy view over the keys of a [`TwoThreeTree`] in ascending order.
///
/// Also answers membership tests via [`contains`](Self::contains) without
/// consuming the iteration.
pub struct TwoThreeTreeKeys<'a, K, V> {
    tree: &'a TwoThreeTree<K, V>,
    entries: TwoThreeTreeIterator<'a, K, V>,
}

impl<K: Ord, V> TwoThreeTreeKeys<'_, K, V> {
    /// Returns `true` if `key` is one of the tree's keys.
    ///
    /// Delegates to [`TwoThreeTree::contains_key`]; O(log N) regardless of
    /// how far the iteration has advanced.
    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }
}

impl<'a, K, V> Iterator for TwoThreeTreeKeys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> FusedIterator for TwoThreeTreeKeys<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TwoThreeTree<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Clone + Ord, V: PartialEq> FromIterator<(K, V)> for TwoThreeTree<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Self::new();
        for (key, value) in iter {
            tree = tree.put(key, value);
        }
        tree
    }
}

// =============================================================================
// Tests
// =============================================================================
