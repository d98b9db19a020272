//! Revision store engine: optimistic concurrency over a `RevisionTable`,
//! retention policy, and safe delivery of outcomes to caller handlers.
//!
//! # Invariants
//! - Every operation resolves to exactly one outcome; backend errors and
//!   panics become `Failure` outcomes.
//! - The revision check and the write are one table call.
//! - A failing handler is reported through its own `application_error`,
//!   never as a storage failure.

pub mod dispatch;
pub mod store;

pub use dispatch::{BoxError, FnHandler, Handler, HandlerFailure, Reply, dispatch, from_fn, reply};
pub use store::{DynStore, RevisionStore};
