//! Revision chain storage.
//!
//! A `RevisionTable` holds one chain of entries per key and exposes the
//! primitives the store needs. Every compound check-then-write is a single
//! call, so a backend can make it atomic.
//!
//! # Invariants
//! - A chain that exists is never empty.
//! - `compare_and_append` is atomic with respect to every other call on the
//!   same key, including the optional purge of older revisions.
//! - `remove_chain` removes the whole chain or reports an error.

pub mod file;
pub mod memory;

pub use file::FileTable;
pub use memory::MemoryTable;

use revkv_common::{CREATE, Entry, Key, Revision, StoreError};

/// Result of `RevisionTable::compare_and_append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// The body was stored under this revision.
    Written(Revision),
    /// Nothing was written. `actual` is the current revision, `None` if the key is absent.
    Mismatch { actual: Option<Revision> },
}

/// Whether a write expecting `expected` may proceed on a chain whose newest
/// revision is `current`.
pub fn expectation_holds(expected: Revision, current: Option<Revision>) -> bool {
    match current {
        None => expected == CREATE,
        Some(current) => expected != CREATE && expected == current,
    }
}

/// Storage backend for revision chains.
///
/// Implementations decide their own thread safety: a `Sync` table can be
/// shared by several threads directly, a table that is only `Send` has to be
/// driven from one thread (see the serializing proxy).
pub trait RevisionTable {
    /// Newest revision of `key`, `None` when no chain exists.
    fn current_revision(&self, key: &Key) -> Result<Option<Revision>, StoreError>;

    /// Append `body` as revision `expected + 1` if `expected` still describes
    /// the chain (`CREATE` for an absent key). With `purge`, every older entry
    /// is dropped inside the same atomic step.
    fn compare_and_append(
        &self,
        key: &Key,
        expected: Revision,
        body: &[u8],
        purge: bool,
    ) -> Result<Append, StoreError>;

    /// Newest entry of `key`.
    fn latest(&self, key: &Key) -> Result<Option<Entry>, StoreError>;

    /// Every stored entry of `key`, ascending by revision. Empty when absent.
    fn chain(&self, key: &Key) -> Result<Vec<Entry>, StoreError>;

    /// Remove the whole chain, returning its newest entry.
    fn remove_chain(&self, key: &Key) -> Result<Option<Entry>, StoreError>;

    /// Newest entry of every live key, ascending by key.
    fn latest_all(&self) -> Result<Vec<Entry>, StoreError>;
}

impl<T: RevisionTable + ?Sized> RevisionTable for Box<T> {
    fn current_revision(&self, key: &Key) -> Result<Option<Revision>, StoreError> {
        (**self).current_revision(key)
    }

    fn compare_and_append(
        &self,
        key: &Key,
        expected: Revision,
        body: &[u8],
        purge: bool,
    ) -> Result<Append, StoreError> {
        (**self).compare_and_append(key, expected, body, purge)
    }

    fn latest(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        (**self).latest(key)
    }

    fn chain(&self, key: &Key) -> Result<Vec<Entry>, StoreError> {
        (**self).chain(key)
    }

    fn remove_chain(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        (**self).remove_chain(key)
    }

    fn latest_all(&self) -> Result<Vec<Entry>, StoreError> {
        (**self).latest_all()
    }
}
