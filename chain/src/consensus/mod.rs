//! Chain management: longest-chain store, orphan buffering, and
//! reorganization.
//!
//! This module provides:
//!
//! - the error taxonomy for block application ([`error::ChainError`]),
//! - the [`manager::ChainManager`], which owns the height-indexed main
//!   chain, the hash index, and the orphan pool under a single mutex.

pub mod error;
pub mod manager;

pub use error::ChainError;
pub use manager::{BlockDisposition, ChainManager};
