//! # twothree
//!
//! Persistent (immutable) ordered collections backed by a 2-3 search tree
//! with structural sharing.
//!
//! ## Overview
//!
//! Every mutating operation returns a new collection and leaves the old one
//! untouched. Versions share all unchanged subtrees, so a modification
//! allocates only along the path from the root to the affected leaf:
//!
//! - [`TwoThreeTree`]: the core tree with `put`/`remove`/`get`, ordered
//!   iteration and a structural visitor
//! - [`PersistentTreeMap`]: an ordered map adapter with a lazily cached size
//! - [`PersistentTreeSet`]: an ordered set adapter over the same tree
//!
//! All leaves of the tree sit at equal depth; internal nodes have either two
//! or three children, which keeps every operation at O(log N).
//!
//! ## Change detection
//!
//! Operations that would not change the observable contents return a value
//! that shares its root with the input, so callers can detect no-ops in O(1):
//!
//! ```rust
//! use twothree::TwoThreeTree;
//!
//! let tree = TwoThreeTree::new().put(1, "one");
//! let same = tree.put(1, "one");
//! assert!(same.ptr_eq(&tree));
//!
//! let changed = tree.put(1, "ONE");
//! assert!(!changed.ptr_eq(&tree));
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: share nodes with `Arc` instead of `Rc`, making the collections
//!   `Send`/`Sync` when their contents are

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// =============================================================================
// Shared Pointer Type Aliases
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

/// Write-once cell used by the adapters to cache their lazily counted size.
///
/// Follows the same feature split as [`ReferenceCounter`]: `OnceLock` when
/// trees are shared across threads, `OnceCell` otherwise.
#[cfg(feature = "arc")]
pub(crate) type LazySizeCell<T> = std::sync::OnceLock<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type LazySizeCell<T> = std::cell::OnceCell<T>;

mod map;
mod set;
mod tree;
mod visitor;

pub use map::PersistentTreeMap;
pub use map::PersistentTreeMapIntoIterator;
pub use set::PersistentTreeSet;
pub use set::PersistentTreeSetIntoIterator;
pub use set::PersistentTreeSetIterator;
pub use tree::TwoThreeTree;
pub use tree::TwoThreeTreeIterator;
pub use tree::TwoThreeTreeKeys;
pub use visitor::TreeVisitor;
