//! GWOSC (Gravitational Wave Open Science Center) event API and strain files.
//!
//! Endpoints used:
//! - `{base}/eventapi/json/allevents/`: every catalog release of every event
//! - `{base}/eventapi/json/event/{name}/`: one event, including its strain file list
//!
//! Strain is downloaded as the `.txt.gz` release file (one sample per line), which
//! keeps us clear of HDF5 system libraries.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::sync::{Mutex, OnceLock};

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Catalog, FetchError, StrainSource};
use crate::domain::{ArchiveConfig, Detector, EventMetadata, StrainSeries};
use crate::error::{AppError, PipelineError};
use crate::signal;

const PREFERRED_SAMPLE_RATE: f64 = 4096.0;
const STRAIN_FORMAT: &str = "txt";

pub struct GwoscClient {
    client: Client,
    base_url: String,
    /// `allevents` listing, fetched once per process.
    listing: OnceLock<BTreeMap<String, EventEntry>>,
    /// Per-event detail (highest version), keyed by event name.
    details: Mutex<HashMap<String, EventEntry>>,
}

impl GwoscClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("gwq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            listing: OnceLock::new(),
            details: Mutex::new(HashMap::new()),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        log::debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }
        resp.json()
            .map_err(|e| FetchError::Malformed(format!("{url}: {e}")))
    }

    fn listing(&self) -> Result<&BTreeMap<String, EventEntry>, PipelineError> {
        if let Some(listing) = self.listing.get() {
            return Ok(listing);
        }
        let url = format!("{}/eventapi/json/allevents/", self.base_url);
        let body: EventsResponse = self
            .get_json(&url)
            .map_err(|e| PipelineError::Catalog(e.to_string()))?;
        log::info!("catalog listing: {} releases", body.events.len());
        Ok(self.listing.get_or_init(|| body.events))
    }

    /// Highest-version detail record for `name` (cached).
    fn event_detail(&self, name: &str) -> Result<EventEntry, PipelineError> {
        if let Some(entry) = self.lock_details().get(name) {
            return Ok(entry.clone());
        }

        let url = format!("{}/eventapi/json/event/{name}/", self.base_url);
        let body: EventsResponse = match self.get_json(&url) {
            Ok(body) => body,
            Err(FetchError::Status { status: 404, .. }) => {
                return Err(PipelineError::CatalogResolution {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(PipelineError::Catalog(e.to_string())),
        };

        let entry = latest_release(&body.events, name).ok_or_else(|| PipelineError::CatalogResolution {
            name: name.to_string(),
        })?;
        self.lock_details().insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    fn lock_details(&self) -> std::sync::MutexGuard<'_, HashMap<String, EventEntry>> {
        // A poisoned map only ever holds complete entries, so keep using it.
        self.details.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Strain files known from resolved events, for `detector`, covering `[start, end)`.
    fn covering_file(&self, detector: &Detector, start: f64, end: f64) -> Option<StrainFile> {
        let details = self.lock_details();
        let files = details.values().flat_map(|entry| entry.strain.iter());
        pick_strain_file(files, detector, start, end)
    }

    fn download_strain(&self, file: &StrainFile) -> Result<Vec<u8>, FetchError> {
        log::info!("downloading {} strain: {}", file.detector, file.url);
        let resp = self
            .client
            .get(&file.url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                url: file.url.clone(),
            });
        }
        let bytes = resp.bytes().map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl Catalog for GwoscClient {
    fn list_events(&self) -> Result<Vec<String>, PipelineError> {
        Ok(event_names(self.listing()?))
    }

    fn event_gps(&self, name: &str) -> Result<f64, PipelineError> {
        let entry = self.event_detail(name)?;
        entry
            .gps
            .filter(|gps| gps.is_finite() && *gps > 0.0)
            .ok_or_else(|| PipelineError::Catalog(format!("{name} has no valid GPS time")))
    }

    fn event_detectors(&self, name: &str) -> Result<BTreeSet<Detector>, PipelineError> {
        let entry = self.event_detail(name)?;
        Ok(entry
            .strain
            .iter()
            .filter_map(|f| f.detector.parse::<Detector>().ok())
            .collect())
    }

    fn fetch_event_json(&self, name: &str) -> Option<EventMetadata> {
        match self.event_detail(name) {
            Ok(entry) => {
                let meta = entry.metadata();
                if meta.is_empty() {
                    log::warn!("metadata unavailable for {name}: release publishes no source parameters");
                    None
                } else {
                    Some(meta)
                }
            }
            Err(e) => {
                log::warn!("metadata unavailable for {name}: {e}");
                None
            }
        }
    }

    fn event_page_url(&self, name: &str) -> Option<String> {
        Some(format!("{}/eventapi/html/event/{name}/", self.base_url))
    }
}

impl StrainSource for GwoscClient {
    fn fetch_strain(&self, detector: &Detector, start: f64, end: f64) -> Result<StrainSeries, FetchError> {
        let file = self
            .covering_file(detector, start, end)
            .ok_or(FetchError::NotCovered { start, end })?;
        let bytes = self.download_strain(&file)?;
        decode_strain(&bytes, &file, start, end)
    }
}

/// Gunzip and parse a downloaded strain file, then crop it to `[start, end)`.
///
/// Samples sit on the file's grid (`gps_start + i / sampling_rate`). A file with
/// fewer samples than `duration * sampling_rate` is truncated and rejected.
fn decode_strain(bytes: &[u8], file: &StrainFile, start: f64, end: f64) -> Result<StrainSeries, FetchError> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|e| FetchError::Malformed(format!("{}: {e}", file.url)))?;
    let values = parse_strain_text(&text)?;

    let expected = (file.duration * file.sampling_rate).round() as usize;
    if values.len() < expected {
        return Err(FetchError::Malformed(format!(
            "{}: expected {expected} samples, got {}",
            file.url,
            values.len()
        )));
    }

    let full = StrainSeries::new(file.detector.clone(), file.gps_start, file.sampling_rate, values);
    Ok(signal::crop(&full, start, end))
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: BTreeMap<String, EventEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventEntry {
    #[serde(rename = "commonName")]
    common_name: Option<String>,
    #[serde(rename = "GPS")]
    gps: Option<f64>,
    version: Option<u32>,
    #[serde(rename = "catalog.shortName")]
    catalog: Option<String>,
    mass_1_source: Option<f64>,
    mass_2_source: Option<f64>,
    network_matched_filter_snr: Option<f64>,
    luminosity_distance: Option<f64>,
    #[serde(default)]
    strain: Vec<StrainFileEntry>,
}

impl EventEntry {
    fn metadata(&self) -> EventMetadata {
        EventMetadata {
            catalog: self.catalog.clone(),
            version: self.version,
            mass_1_source: self.mass_1_source,
            mass_2_source: self.mass_2_source,
            network_snr: self.network_matched_filter_snr,
            luminosity_distance: self.luminosity_distance,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct StrainFileEntry {
    detector: String,
    #[serde(rename = "GPSstart")]
    gps_start: Option<f64>,
    duration: Option<f64>,
    sampling_rate: Option<f64>,
    format: Option<String>,
    url: Option<String>,
}

/// A strain release file with every field we need present.
#[derive(Debug, Clone, PartialEq)]
struct StrainFile {
    detector: Detector,
    gps_start: f64,
    duration: f64,
    sampling_rate: f64,
    url: String,
}

impl StrainFileEntry {
    fn complete(&self) -> Option<StrainFile> {
        Some(StrainFile {
            detector: self.detector.parse().ok()?,
            gps_start: self.gps_start?,
            duration: self.duration?,
            sampling_rate: self.sampling_rate?,
            url: self.url.clone()?,
        })
    }
}

/// `GW150914-v3` → `GW150914`; other prefixes are not gravitational-wave events.
fn event_names(listing: &BTreeMap<String, EventEntry>) -> Vec<String> {
    let names: BTreeSet<String> = listing
        .keys()
        .filter(|key| key.starts_with("GW"))
        .filter_map(|key| key.split('-').next())
        .map(str::to_string)
        .collect();
    names.into_iter().collect()
}

fn latest_release(events: &BTreeMap<String, EventEntry>, name: &str) -> Option<EventEntry> {
    events
        .iter()
        .filter(|(key, entry)| {
            entry.common_name.as_deref() == Some(name) || key.split('-').next() == Some(name)
        })
        .max_by_key(|(_, entry)| entry.version.unwrap_or(0))
        .map(|(_, entry)| entry.clone())
}

/// Choose the text-format file for `detector` covering `[start, end)`.
///
/// Prefers 4 kHz data, then the shortest file (fewest bytes to download).
fn pick_strain_file<'a>(
    files: impl Iterator<Item = &'a StrainFileEntry>,
    detector: &Detector,
    start: f64,
    end: f64,
) -> Option<StrainFile> {
    files
        .filter(|f| f.format.as_deref() == Some(STRAIN_FORMAT))
        .filter_map(StrainFileEntry::complete)
        .filter(|f| &f.detector == detector)
        .filter(|f| f.gps_start <= start && f.gps_start + f.duration >= end)
        .min_by(|a, b| {
            let rank = |f: &StrainFile| (f.sampling_rate != PREFERRED_SAMPLE_RATE, f.duration);
            let (ra, rb) = (rank(a), rank(b));
            ra.0.cmp(&rb.0)
                .then(ra.1.partial_cmp(&rb.1).unwrap_or(std::cmp::Ordering::Equal))
        })
}

/// Parse a GWOSC strain text file: `#` header lines, then one value per line.
fn parse_strain_text(text: &str) -> Result<Vec<f64>, FetchError> {
    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value: f64 = line
            .parse()
            .map_err(|e| FetchError::Malformed(format!("line {}: '{line}': {e}", lineno + 1)))?;
        out.push(value);
    }
    if out.is_empty() {
        return Err(FetchError::Malformed("strain file has no samples".to_string()));
    }
    Ok(out)
}
