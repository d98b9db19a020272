use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Per-key version number. Stored revisions start at 1.
pub type Revision = u64;

/// Expected revision for a put that creates a new chain.
pub const CREATE: Revision = 0;

/// Whether `name` is usable as a key or a file prefix: `[A-Za-z0-9]+`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Identifier of one revision chain.
///
/// Keys end up in file names, so anything outside `[A-Za-z0-9]+` is rejected
/// at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

impl Key {
    /// Validate and wrap a raw key.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if is_valid_name(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ValidationError::InvalidKey(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Key {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        if is_valid_name(&raw) {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidKey(raw))
        }
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One immutable `(key, revision, body)` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub revision: Revision,
    pub body: Vec<u8>,
}

impl Entry {
    pub fn new(key: Key, revision: Revision, body: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            revision,
            body: body.into(),
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.revision)
    }
}
