//! In-memory backend for the calendar store.
//!
//! Items are partitioned per account, each partition behind its own lock, so
//! writers to one account never block readers of another. Audit versions are
//! handed to a pluggable [`AuditSink`] after the primary write; a failing sink
//! is logged and otherwise ignored.

mod sort;
mod store;

pub mod audit;
pub mod error;

pub use audit::{AuditError, AuditSink, MemoryAuditLog};
pub use error::{Error, Result};
pub use store::MemoryStore;

#[cfg(test)]
mod tests;
