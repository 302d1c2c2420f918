//! # pit-core
//!
//! Shared error taxonomy and caching primitives for plotit.
//!
//! The aggregation engine is single-threaded: lazily materialized values live
//! in [`Memo`] cells and are released explicitly by their owners.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod memo;

pub use error::{Error, Result};
pub use memo::Memo;

/// plotit version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
