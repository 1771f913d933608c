//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between the pipeline worker and the TUI
//! - exported to CSV / debug bundles
//! - constructed by hand in tests without touching the network

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Strain is fetched for `[gps - 14, gps + 14)` seconds.
///
/// The window must stay wider than both the conditioning edge effects and the
/// largest plot window.
pub const FETCH_HALF_WINDOW: f64 = 14.0;

/// Allowed plot half-width (seconds). The control shows the full range `[0.1, 2.0]`.
pub const HALF_WIDTH_MIN: f64 = 0.05;
pub const HALF_WIDTH_MAX: f64 = 1.0;
pub const DEFAULT_HALF_WIDTH: f64 = 0.1;

/// Band-pass control limits (Hz).
pub const BAND_MIN_HZ: f64 = 10.0;
pub const BAND_MAX_HZ: f64 = 2000.0;
pub const DEFAULT_BAND: BandPass = BandPass {
    low: 30.0,
    high: 400.0,
};

/// Per-detector time offset limit (milliseconds, symmetric).
pub const OFFSET_LIMIT_MS: f64 = 20.0;
pub const OFFSET_STEP_MS: f64 = 0.1;

pub const DEFAULT_BASE_URL: &str = "https://gwosc.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Short code naming an observatory (`H1`, `L1`, `V1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Detector(String);

impl Detector {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Single-letter site prefix used in archive file names (`H-H1_...`).
    pub fn site(&self) -> &str {
        self.0.get(..1).unwrap_or("")
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Detector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let valid = trimmed.len() == 2
            && trimmed.as_bytes()[0].is_ascii_uppercase()
            && trimmed.as_bytes()[1].is_ascii_digit();
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(format!("Invalid detector id '{s}' (expected e.g. H1, L1, V1)."))
        }
    }
}

/// Event metadata from the catalog.
///
/// Any field may be missing for a given catalog release.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMetadata {
    pub catalog: Option<String>,
    pub version: Option<u32>,
    /// Source-frame primary mass (solar masses).
    pub mass_1_source: Option<f64>,
    /// Source-frame secondary mass (solar masses).
    pub mass_2_source: Option<f64>,
    pub network_snr: Option<f64>,
    /// Luminosity distance (Mpc).
    pub luminosity_distance: Option<f64>,
}

impl EventMetadata {
    pub fn is_empty(&self) -> bool {
        self.mass_1_source.is_none()
            && self.mass_2_source.is_none()
            && self.network_snr.is_none()
            && self.luminosity_distance.is_none()
    }
}

/// A resolved catalog event. Immutable once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    /// GPS trigger time (seconds).
    pub gps: f64,
    pub detectors: BTreeSet<Detector>,
    pub metadata: Option<EventMetadata>,
}

impl Event {
    pub fn fetch_start(&self) -> f64 {
        self.gps - FETCH_HALF_WINDOW
    }

    pub fn fetch_end(&self) -> f64 {
        self.gps + FETCH_HALF_WINDOW
    }
}

/// Uniformly sampled strain for one detector.
///
/// Sample `i` lies at `t0 + i / sample_rate` (GPS seconds). The same type carries
/// raw, conditioned and cropped data; the pipeline stage decides which one it is.
#[derive(Debug, Clone, PartialEq)]
pub struct StrainSeries {
    pub detector: Detector,
    pub t0: f64,
    pub sample_rate: f64,
    pub values: Vec<f64>,
}

impl StrainSeries {
    pub fn new(detector: Detector, t0: f64, sample_rate: f64, values: Vec<f64>) -> Self {
        Self {
            detector,
            t0,
            sample_rate,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sample spacing (seconds).
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.values.len() as f64 / self.sample_rate
    }

    /// Exclusive end time (time of the sample after the last one).
    pub fn end(&self) -> f64 {
        self.t0 + self.duration()
    }

    pub fn time_at(&self, index: usize) -> f64 {
        self.t0 + index as f64 / self.sample_rate
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.values.len()).map(|i| self.time_at(i))
    }

    /// Population variance of the amplitudes (0 for an empty series).
    pub fn variance(&self) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.values.iter().sum::<f64>() / n as f64;
        self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64
    }

    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }
}

/// Band-pass frequency bounds (Hz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPass {
    pub low: f64,
    pub high: f64,
}

impl BandPass {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl Default for BandPass {
    fn default() -> Self {
        DEFAULT_BAND
    }
}

/// Per-detector display adjustments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectorParams {
    /// Time shift applied before cropping (milliseconds).
    pub offset_ms: f64,
    /// Multiply the amplitude by -1.
    pub invert: bool,
}

/// All user-adjustable plot parameters for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayParams {
    /// Half of the plotted time range (seconds).
    pub half_width: f64,
    pub whiten: bool,
    pub band: BandPass,
    pub detectors: BTreeMap<Detector, DetectorParams>,
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            half_width: DEFAULT_HALF_WIDTH,
            whiten: true,
            band: DEFAULT_BAND,
            detectors: BTreeMap::new(),
        }
    }
}

impl DisplayParams {
    /// Parameters for `detector`, defaulting to no offset and no inversion.
    pub fn for_detector(&self, detector: &Detector) -> DetectorParams {
        self.detectors.get(detector).copied().unwrap_or_default()
    }

    pub fn detector_mut(&mut self, detector: &Detector) -> &mut DetectorParams {
        self.detectors.entry(detector.clone()).or_default()
    }
}

/// Where and how to reach the open-data archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Maximum number of events kept per pipeline cache stage.
    pub cache_capacity: usize,
    /// Use the built-in synthetic archive instead of the network.
    pub offline: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            offline: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_parse_and_site() {
        let det: Detector = "H1".parse().unwrap();
        assert_eq!(det.as_str(), "H1");
        assert_eq!(det.site(), "H");
        assert!("h1".parse::<Detector>().is_err());
        assert!("HH1".parse::<Detector>().is_err());
    }

    #[test]
    fn series_times_and_variance() {
        let s = StrainSeries::new(Detector::new("L1"), 100.0, 4.0, vec![1.0, -1.0, 1.0, -1.0]);
        assert_eq!(s.len(), 4);
        assert!((s.duration() - 1.0).abs() < 1e-12);
        assert!((s.end() - 101.0).abs() < 1e-12);
        assert!((s.time_at(2) - 100.5).abs() < 1e-12);
        assert!((s.variance() - 1.0).abs() < 1e-12);
        assert!((s.max_abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn display_params_default_per_detector() {
        let mut params = DisplayParams::default();
        let h1 = Detector::new("H1");
        assert_eq!(params.for_detector(&h1), DetectorParams::default());
        params.detector_mut(&h1).invert = true;
        assert!(params.for_detector(&h1).invert);
        assert_eq!(params.band, DEFAULT_BAND);
        assert!(params.whiten);
    }
}
