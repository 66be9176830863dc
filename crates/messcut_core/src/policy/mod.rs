//! Time-based rules for when attendance may be marked.
//!
//! # Responsibility
//! - Compute the per-day submission deadline and the advance window.
//!
//! # Invariants
//! - All comparisons use UTC; "now" is always an explicit argument.

pub mod window;
