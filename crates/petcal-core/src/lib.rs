//! Core types and trait definitions for the pet-marketing editorial calendar.
//!
//! This crate is deliberately free of HTTP and runtime dependencies.
//! Storage backends, the read API and the realtime sync server all depend on
//! it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod item;
pub mod query;
pub mod status;
pub mod store;
pub mod version;

pub use error::{Error, Result};
