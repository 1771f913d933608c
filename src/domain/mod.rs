//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - catalog types (`Detector`, `Event`, `EventMetadata`)
//! - the uniformly sampled `StrainSeries`
//! - user-facing plot parameters (`DisplayParams`, `BandPass`)
//! - GPS time helpers (`gps`)

pub mod gps;
pub mod types;

pub use types::*;
