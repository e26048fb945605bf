//! Database Backend Abstractions
//!
//! Driver-facing traits and the dialect switch used by the grammar.

pub mod core;

// Re-export core traits and types
pub use core::*;
