//! Shared types for the revisioned key-value store.
//!
//! # Invariants
//! - A `Key` always matches `[A-Za-z0-9]+`; construction validates it.
//! - Revisions start at 1 and grow by exactly 1 per successful write.
//! - Every operation resolves to exactly one outcome value.

pub mod config;
pub mod error;
pub mod outcome;
pub mod types;

pub use config::{Backend, StoreConfig};
pub use error::{ConfigError, StoreError, ValidationError};
pub use outcome::{DeleteOutcome, GetOutcome, ListOutcome, PutOutcome, RevisionsOutcome};
pub use types::{CREATE, Entry, Key, Revision, is_valid_name};
