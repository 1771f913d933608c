//! Input/output helpers.
//!
//! - per-detector CSV export and read-back (`export`)

pub mod export;

pub use export::*;
