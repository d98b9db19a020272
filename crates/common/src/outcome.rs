//! One result type per operation.
//!
//! Conflicts and missing keys are ordinary variants so callers can match on
//! them next to success; only `Failure` carries a `StoreError`.

use crate::error::StoreError;
use crate::types::{Entry, Key, Revision};

/// Result of a revision-checked write.
#[derive(Debug)]
pub enum PutOutcome {
    /// A new chain was started at revision 1.
    Created { key: Key, revision: Revision },
    /// The chain was extended to `revision`.
    Updated { key: Key, revision: Revision },
    /// `expected` did not match. `actual` is `None` when the key does not exist.
    Conflict {
        key: Key,
        expected: Revision,
        actual: Option<Revision>,
    },
    Failure { key: String, error: StoreError },
}

impl PutOutcome {
    /// Revision written by this put, if it succeeded.
    pub fn revision(&self) -> Option<Revision> {
        match self {
            Self::Created { revision, .. } | Self::Updated { revision, .. } => Some(*revision),
            _ => None,
        }
    }

    pub fn is_written(&self) -> bool {
        self.revision().is_some()
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of reading the newest entry of a key.
#[derive(Debug)]
pub enum GetOutcome {
    Found(Entry),
    NotFound { key: Key },
    Failure { key: String, error: StoreError },
}

impl GetOutcome {
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            Self::Found(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn into_entry(self) -> Option<Entry> {
        match self {
            Self::Found(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of reading a whole chain.
#[derive(Debug)]
pub enum RevisionsOutcome {
    /// Entries ascending by revision; never empty.
    Found { key: Key, entries: Vec<Entry> },
    NotFound { key: Key },
    Failure { key: String, error: StoreError },
}

impl RevisionsOutcome {
    pub fn entries(&self) -> Option<&[Entry]> {
        match self {
            Self::Found { entries, .. } => Some(entries),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of removing a chain.
#[derive(Debug)]
pub enum DeleteOutcome {
    /// The chain is gone; `body` is what its newest entry held.
    Deleted { key: Key, body: Vec<u8> },
    NotFound { key: Key },
    Failure { key: String, error: StoreError },
}

impl DeleteOutcome {
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            Self::Deleted { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of enumerating the newest entry of every live key.
#[derive(Debug)]
pub enum ListOutcome {
    /// Ascending by key. Empty when nothing is stored.
    Entries(Vec<Entry>),
    Failure { error: StoreError },
}

impl ListOutcome {
    pub fn entries(&self) -> Option<&[Entry]> {
        match self {
            Self::Entries(entries) => Some(entries),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&StoreError> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Entries(_) => None,
        }
    }
}
