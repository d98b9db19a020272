//! Serialized access to a revision store.
//!
//! A `SerializingProxy` owns a `RevisionStore` and a single worker thread.
//! Producers enqueue requests together with their handlers; the worker runs
//! them one at a time in arrival order.
//!
//! # Invariants
//! - Requests from one producer execute in submission order.
//! - Every accepted request resolves exactly once, including requests still
//!   queued when the worker stops.

pub mod proxy;
mod request;

pub use proxy::{ProxyConfig, SerializingProxy};
