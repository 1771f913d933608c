//! Data access: the event catalog and strain archive seams.
//!
//! - `gwosc`: the public open-data archive over HTTP
//! - `synthetic`: a deterministic offline archive (demo mode and tests)
//! - `cache`: bounded LRU used by the pipeline stage caches

use std::collections::BTreeSet;

use thiserror::Error;

use crate::domain::{Detector, EventMetadata, StrainSeries};
use crate::error::PipelineError;

pub mod cache;
pub mod gwosc;
pub mod synthetic;

pub use cache::LruCache;
pub use gwosc::GwoscClient;
pub use synthetic::SyntheticArchive;

/// Why strain for one detector could not be retrieved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("archive returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("no archive file covers GPS {start:.1}..{end:.1}")]
    NotCovered { start: f64, end: f64 },

    #[error("detector offline: {0}")]
    Unavailable(String),

    #[error("malformed strain data: {0}")]
    Malformed(String),

    #[error("canceled")]
    Cancelled,
}

/// Event catalog: names, trigger times, detector sets and metadata.
pub trait Catalog: Send + Sync {
    /// Event names (`GW...`), version suffix stripped, deduplicated, sorted ascending.
    fn list_events(&self) -> Result<Vec<String>, PipelineError>;

    /// GPS trigger time. Unknown names yield `PipelineError::CatalogResolution`.
    fn event_gps(&self, name: &str) -> Result<f64, PipelineError>;

    /// Detectors with published strain for this event.
    fn event_detectors(&self, name: &str) -> Result<BTreeSet<Detector>, PipelineError>;

    /// Source parameters for display.
    ///
    /// Absence is legitimate for some events: implementations log the reason and
    /// return `None` rather than failing the render.
    fn fetch_event_json(&self, name: &str) -> Option<EventMetadata>;

    /// Human-facing page for the event, if the catalog has one.
    fn event_page_url(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Strain archive: raw samples for one detector over `[start, end)` GPS seconds.
pub trait StrainSource: Send + Sync {
    fn fetch_strain(&self, detector: &Detector, start: f64, end: f64) -> Result<StrainSeries, FetchError>;
}
