//! Persistent ordered map adapter over [`TwoThreeTree`].
//!
//! This module provides [`PersistentTreeMap`], which pairs a tree with a
//! lazily computed, cached entry count and exposes the standard collection
//! trait surface.
//!
//! # Overview
//!
//! [`TwoThreeTree::size`] deliberately counts on every call; a map wrapper
//! is the natural place to cache that count without spending a size field
//! in every tree node. The count is only computed when first asked for, and
//! each modified copy starts with an unfilled cache.
//!
//! # Examples
//!
//! ```rust
//! use twothree::PersistentTreeMap;
//!
//! let map = PersistentTreeMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! assert_eq!(map.len(), 3);
//! assert_eq!(map.get(&2), Some(&"two"));
//!
//! // Entries iterate in ascending key order.
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//! ```

use crate::tree::{TwoThreeTree, TwoThreeTreeIterator, TwoThreeTreeKeys};
use crate::{LazySizeCell, visitor::TreeVisitor};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;

// =============================================================================
// PersistentTreeMap Definition
// =============================================================================

/// A persistent (immutable) ordered map.
///
/// `PersistentTreeMap` wraps a [`TwoThreeTree`] and caches its entry count
/// the first time [`len`](Self::len) is called. All modifying operations
/// return a new map; the receiver is never changed.
///
/// # Change detection
///
/// [`insert`](Self::insert) and [`remove`](Self::remove) return a map that
/// is [`ptr_eq`](Self::ptr_eq) to the receiver when the operation was a
/// no-op: inserting an already-present key-value pair, or removing an
/// absent key. Callers can use this to skip change notifications:
///
/// ```rust
/// use twothree::PersistentTreeMap;
///
/// let map = PersistentTreeMap::new().insert("theme", "dark");
/// let copy = map.insert("theme", "dark");
/// if !copy.ptr_eq(&map) {
///     // notify listeners... (not reached here)
/// }
/// # assert!(copy.ptr_eq(&map));
/// ```
///
/// # Time Complexity
///
/// | Operation      | Complexity              |
/// |----------------|-------------------------|
/// | `new`          | O(1)                    |
/// | `get`          | O(log N)                |
/// | `insert`       | O(log N)                |
/// | `remove`       | O(log N)                |
/// | `contains_key` | O(log N)                |
/// | `len`          | O(N) once, then O(1)    |
/// | `is_empty`     | O(1)                    |
pub struct PersistentTreeMap<K, V> {
    tree: TwoThreeTree<K, V>,
    /// Entry count, computed the first time it is used.
    size: LazySizeCell<usize>,
}

impl<K, V> Clone for PersistentTreeMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            size: self.size.clone(),
        }
    }
}

impl<K, V> Default for PersistentTreeMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> PersistentTreeMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::from_tree(TwoThreeTree::new())
    }

    fn from_tree(tree: TwoThreeTree<K, V>) -> Self {
        Self {
            tree,
            size: LazySizeCell::new(),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// The first call counts the tree in O(N); the result is cached, so
    /// repeated calls on the same map are O(1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        *self.size.get_or_init(|| self.tree.size())
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// O(1); never forces the entry count.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns `true` if both maps share the same tree root.
    ///
    /// See the type-level documentation for how this enables O(1) change
    /// detection.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }

    /// Returns a reference to the underlying tree.
    ///
    /// The tree offers the structure-level API: [`TwoThreeTree::accept`]
    /// for visitors, [`TwoThreeTree::dump`] for debugging output.
    #[inline]
    #[must_use]
    pub const fn as_tree(&self) -> &TwoThreeTree<K, V> {
        &self.tree
    }

    /// Returns an iterator over entries in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(2, "two")
    ///     .insert(1, "one");
    ///
    /// let entries: Vec<(&i32, &&str)> = map.iter().collect();
    /// assert_eq!(entries, vec![(&1, &"one"), (&2, &"two")]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> TwoThreeTreeIterator<'_, K, V> {
        self.tree.iter()
    }

    /// Returns a lazy view over the keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> TwoThreeTreeKeys<'_, K, V> {
        self.tree.keys()
    }

    /// Returns an iterator over the values in ascending key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert(1, 10).insert(2, 20);
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 30);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Drives `visitor` over the underlying tree structure.
    pub fn accept<Vis>(&self, visitor: &mut Vis)
    where
        Vis: TreeVisitor<K, V> + ?Sized,
    {
        self.tree.accept(visitor);
    }

    /// Renders the underlying tree as an indented multi-line string.
    /// Debug aid only; see [`TwoThreeTree::dump`].
    #[must_use]
    pub fn dump(&self) -> String
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        self.tree.dump()
    }
}

impl<K: Ord, V> PersistentTreeMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, as long as
    /// the ordering on the borrowed form matches the ordering on the key
    /// type.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert("hello".to_string(), 42);
    ///
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Returns `true` if the map contains a value for the specified key.
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
        self.tree.contains_key(key)
    }
}

impl<K: Clone + Ord, V: PartialEq> PersistentTreeMap<K, V> {
    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Makes a copy of this map with `key` associated to `value`.
    ///
    /// If the association already exists with an equal value, no copy is
    /// made: the returned map is [`ptr_eq`](Self::ptr_eq) to the receiver.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE"));
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let updated = self.tree.put(key, value);
        if updated.ptr_eq(&self.tree) {
            self.clone()
        } else {
            Self::from_tree(updated)
        }
    }
}

impl<K: Clone + Ord, V> PersistentTreeMap<K, V> {
    /// Makes a copy of this map without any association for `key`.
    ///
    /// If the key is not present, no copy is made: the returned map is
    /// [`ptr_eq`](Self::ptr_eq) to the receiver.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use twothree::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert(1, "one").insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(map.len(), 2); // original unchanged
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let updated = self.tree.remove(key);
        if updated.ptr_eq(&self.tree) {
            self.clone()
        } else {
            Self::from_tree(updated)
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An owning iterator over the entries of a [`PersistentTreeMap`].
pub struct PersistentTreeMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentTreeMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentTreeMapIntoIterator<K, V> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K: Clone + Ord, V: PartialEq> FromIterator<(K, V)> for PersistentTreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map = map.insert(key, value);
        }
        map
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentTreeMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentTreeMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentTreeMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentTreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = TwoThreeTreeIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for PersistentTreeMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        // Both iterate in ascending key order, so a pairwise walk suffices.
        self.iter()
            .zip(other.iter())
            .all(|((self_key, self_value), (other_key, other_value))| {
                self_key == other_key && self_value == other_value
            })
    }
}

impl<K: Eq, V: Eq> Eq for PersistentTreeMap<K, V> {}

/// Hashes the length, then every entry in key order, so equal maps hash
/// equally regardless of insertion order.
impl<K: Hash, V: Hash> Hash for PersistentTreeMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for (key, value) in self {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentTreeMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for PersistentTreeMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_new_creates_empty() {
        let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[rstest]
    fn test_singleton() {
        let map = PersistentTreeMap::singleton(42, "answer".to_string());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&42), Some(&"answer".to_string()));
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = PersistentTreeMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&"one".to_string()));
        assert_eq!(map.get(&2), Some(&"two".to_string()));
        assert_eq!(map.get(&3), None);
        assert!(map.contains_key(&1));
        assert!(!map.contains_key(&3));
    }

    #[rstest]
    fn test_insert_overwrite_keeps_original_version() {
        let map1 = PersistentTreeMap::new().insert(1, "one".to_string());
        let map2 = map1.insert(1, "ONE".to_string());

        assert_eq!(map1.get(&1), Some(&"one".to_string()));
        assert_eq!(map2.get(&1), Some(&"ONE".to_string()));
        assert_eq!(map1.len(), 1);
        assert_eq!(map2.len(), 1);
    }

    #[rstest]
    fn test_insert_existing_pair_is_identity() {
        let map = PersistentTreeMap::new()
            .insert(1, "one")
            .insert(2, "two")
            .insert(3, "three");
        let copy = map.insert(2, "two");
        assert!(copy.ptr_eq(&map));
    }

    #[rstest]
    fn test_remove_absent_key_is_identity() {
        let map = PersistentTreeMap::new().insert(1, "one").insert(2, "two");
        let copy = map.remove(&99);
        assert!(copy.ptr_eq(&map));
    }

    #[rstest]
    fn test_remove_existing_key() {
        let map = PersistentTreeMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        let removed = map.remove(&1);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed.get(&1), None);
        assert_eq!(removed.get(&2), Some(&"two".to_string()));
        assert_eq!(map.len(), 2);
    }

    #[rstest]
    fn test_len_is_cached_per_version() {
        let map: PersistentTreeMap<i32, i32> = (0..100).map(|key| (key, key)).collect();
        assert_eq!(map.len(), 100);
        assert_eq!(map.len(), 100);

        let smaller = map.remove(&0);
        assert_eq!(smaller.len(), 99);
        assert_eq!(map.len(), 100);
    }

    #[rstest]
    fn test_borrowed_key_lookup() {
        let map = PersistentTreeMap::new().insert("hello".to_string(), 1);
        assert_eq!(map.get("hello"), Some(&1));
        assert!(map.contains_key("hello"));
        assert!(!map.contains_key("world"));
    }

    #[rstest]
    fn test_keys_and_values_in_order() {
        let map = PersistentTreeMap::new()
            .insert(3, "three")
            .insert(1, "one")
            .insert(2, "two");

        let keys: Vec<&i32> = map.keys().collect();
        assert_eq!(keys, vec![&1, &2, &3]);

        let values: Vec<&&str> = map.values().collect();
        assert_eq!(values, vec![&"one", &"two", &"three"]);
    }

    #[rstest]
    fn test_from_iterator_and_into_iterator_round_trip() {
        let source = vec![(3, "c"), (1, "a"), (2, "b")];
        let map: PersistentTreeMap<i32, &str> = source.into_iter().collect();

        let collected: Vec<(i32, &str)> = map.clone().into_iter().collect();
        assert_eq!(collected, vec![(1, "a"), (2, "b"), (3, "c")]);
    }

    #[rstest]
    fn test_equality_ignores_insertion_order() {
        let forward: PersistentTreeMap<i32, i32> = (0..10).map(|key| (key, key)).collect();
        let backward: PersistentTreeMap<i32, i32> = (0..10).rev().map(|key| (key, key)).collect();
        assert_eq!(forward, backward);

        let different = forward.insert(5, 999);
        assert_ne!(forward, different);
    }

    #[rstest]
    fn test_map_usable_as_hash_key() {
        use std::collections::HashMap;

        let mut outer: HashMap<PersistentTreeMap<i32, String>, &str> = HashMap::new();
        let key = PersistentTreeMap::new()
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        outer.insert(key.clone(), "value");
        assert_eq!(outer.get(&key), Some(&"value"));
    }

    #[rstest]
    fn test_display_sorted() {
        let map = PersistentTreeMap::new()
            .insert(3, "three".to_string())
            .insert(1, "one".to_string())
            .insert(2, "two".to_string());
        assert_eq!(format!("{map}"), "{1: one, 2: two, 3: three}");
    }

    #[rstest]
    fn test_display_empty() {
        let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
        assert_eq!(format!("{map}"), "{}");
    }

    #[rstest]
    fn test_debug_format() {
        let map = PersistentTreeMap::new().insert(1, "one");
        assert_eq!(format!("{map:?}"), r#"{1: "one"}"#);
    }

    #[rstest]
    fn test_dump_delegates_to_tree() {
        let map = PersistentTreeMap::new().insert(1, "one");
        assert_eq!(map.dump(), "1 = one\n");
    }
}
