//! Shared render pipeline used by both CLI and TUI front-ends.
//!
//! One render cycle is:
//! catalog resolve -> strain fetch (per detector, concurrent) -> condition
//! (whiten, band-pass) -> offset / invert / crop.
//!
//! The two expensive stages are cached: raw strain per `(gps, detector set)`
//! and conditioned strain per `(gps, detector, whiten, band)`. Offset, inversion
//! and half-width only touch the cheap last step, so dragging those controls
//! never refetches or reconditions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::data::cache::CacheStats;
use crate::data::{Catalog, FetchError, GwoscClient, LruCache, StrainSource, SyntheticArchive};
use crate::domain::{ArchiveConfig, BandPass, Detector, DetectorParams, DisplayParams, Event, FETCH_HALF_WINDOW, StrainSeries};
use crate::error::{AppError, PipelineError};
use crate::signal::{self, SignalError};

/// Conditioned entries are per detector; leave room for a few detectors per event.
const CONDITIONED_ENTRIES_PER_EVENT: usize = 4;

/// Shared cancellation flag for an in-flight render.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregated result of fetching every detector of an event.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Complete(BTreeMap<Detector, StrainSeries>),
    /// At least one detector failed. `succeeded` lists the ones that did not.
    Failed {
        succeeded: Vec<Detector>,
        failures: Vec<(Detector, FetchError)>,
    },
}

impl FetchOutcome {
    /// Some detectors succeeded while others failed.
    pub fn is_partial(&self) -> bool {
        matches!(self, FetchOutcome::Failed { succeeded, .. } if !succeeded.is_empty())
    }

    pub fn into_result(self, event: &str) -> Result<BTreeMap<Detector, StrainSeries>, PipelineError> {
        match self {
            FetchOutcome::Complete(map) => Ok(map),
            FetchOutcome::Failed { succeeded, failures } => Err(PipelineError::Fetch {
                event: event.to_string(),
                succeeded,
                failures,
            }),
        }
    }
}

/// One detector's contribution to a render.
#[derive(Debug, Clone)]
pub struct DetectorTrace {
    /// Conditioned, shifted, possibly inverted and cropped strain.
    pub series: StrainSeries,
    pub params: DetectorParams,
    pub raw_variance: f64,
    pub raw_len: usize,
    /// Variance of `series` (the plotted window).
    pub conditioned_variance: f64,
}

/// Everything the presentation layer needs for one event.
#[derive(Debug, Clone)]
pub struct PreparedEvent {
    pub event: Event,
    pub params: DisplayParams,
    /// Ordered by detector id.
    pub traces: Vec<DetectorTrace>,
    /// Plotted GPS window `[start, end)`.
    pub window: (f64, f64),
}

impl PreparedEvent {
    pub fn trace(&self, detector: &Detector) -> Option<&DetectorTrace> {
        self.traces.iter().find(|t| &t.series.detector == detector)
    }
}

/// Hit/miss counters of both stage caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCacheStats {
    pub raw: CacheStats,
    pub conditioned: CacheStats,
}

type RawKey = (u64, Vec<Detector>);
type RawStrain = Arc<BTreeMap<Detector, StrainSeries>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConditionedKey {
    gps_bits: u64,
    detector: Detector,
    whiten: bool,
    low_bits: u64,
    high_bits: u64,
}

pub struct Pipeline {
    catalog: Arc<dyn Catalog>,
    source: Arc<dyn StrainSource>,
    raw_cache: LruCache<RawKey, RawStrain>,
    conditioned_cache: LruCache<ConditionedKey, Arc<StrainSeries>>,
}

impl Pipeline {
    pub fn new(catalog: Arc<dyn Catalog>, source: Arc<dyn StrainSource>, cache_capacity: usize) -> Self {
        Self {
            catalog,
            source,
            raw_cache: LruCache::new(cache_capacity),
            conditioned_cache: LruCache::new(cache_capacity.max(1) * CONDITIONED_ENTRIES_PER_EVENT),
        }
    }

    /// Build a pipeline backed by GWOSC, or by the synthetic archive in offline mode.
    pub fn from_config(config: &ArchiveConfig) -> Result<Self, AppError> {
        if config.offline {
            log::info!("using the built-in synthetic archive");
            let archive = Arc::new(SyntheticArchive::default());
            return Ok(Self::new(archive.clone(), archive, config.cache_capacity));
        }
        let client = Arc::new(GwoscClient::new(config)?);
        Ok(Self::new(client.clone(), client, config.cache_capacity))
    }

    pub fn list_events(&self) -> Result<Vec<String>, PipelineError> {
        self.catalog.list_events()
    }

    pub fn event_page_url(&self, name: &str) -> Option<String> {
        self.catalog.event_page_url(name)
    }

    /// Resolve `name` to GPS time, detector set and (optional) metadata.
    ///
    /// Never touches the strain archive.
    pub fn resolve_event(&self, name: &str) -> Result<Event, PipelineError> {
        let name = name.trim();
        let gps = self.catalog.event_gps(name)?;
        if !(gps.is_finite() && gps > 0.0) {
            return Err(PipelineError::Catalog(format!("{name} has invalid GPS time {gps}")));
        }
        let detectors = self.catalog.event_detectors(name)?;
        if detectors.is_empty() {
            return Err(PipelineError::Catalog(format!("{name} lists no detector strain")));
        }
        let metadata = self.catalog.fetch_event_json(name);

        Ok(Event {
            name: name.to_string(),
            gps,
            detectors,
            metadata,
        })
    }

    /// Fetch `[gps - 14, gps + 14)` for every detector, concurrently.
    ///
    /// The cancel flag is checked before and after each detector's request.
    pub fn fetch_outcome(&self, event: &Event, detectors: &BTreeSet<Detector>, cancel: &CancelToken) -> FetchOutcome {
        let (start, end) = (event.fetch_start(), event.fetch_end());
        let source = &self.source;
        let started = Instant::now();
        log::info!("fetching {} for {} detector(s)", event.name, detectors.len());

        let results: Vec<(Detector, Result<StrainSeries, FetchError>)> = detectors
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|det| {
                let det = (*det).clone();
                if cancel.is_cancelled() {
                    return (det, Err(FetchError::Cancelled));
                }
                let result = source.fetch_strain(&det, start, end);
                if cancel.is_cancelled() {
                    return (det, Err(FetchError::Cancelled));
                }
                (det, result)
            })
            .collect();

        let mut series = BTreeMap::new();
        let mut failures = Vec::new();
        for (det, result) in results {
            match result {
                Ok(s) => {
                    series.insert(det, s);
                }
                Err(e) => {
                    log::warn!("{}: {det} fetch failed: {e}", event.name);
                    failures.push((det, e));
                }
            }
        }

        log::info!(
            "fetched {} in {:.2?} ({} ok, {} failed)",
            event.name,
            started.elapsed(),
            series.len(),
            failures.len()
        );

        if failures.is_empty() {
            FetchOutcome::Complete(series)
        } else {
            FetchOutcome::Failed {
                succeeded: series.into_keys().collect(),
                failures,
            }
        }
    }

    /// All-or-nothing raw fetch, served from the raw cache when possible.
    pub fn fetch_window(
        &mut self,
        event: &Event,
        detectors: &BTreeSet<Detector>,
        cancel: &CancelToken,
    ) -> Result<RawStrain, PipelineError> {
        let key: RawKey = (event.gps.to_bits(), detectors.iter().cloned().collect());
        if let Some(hit) = self.raw_cache.get(&key) {
            log::debug!("raw cache hit for {}", event.name);
            return Ok(hit);
        }

        let map = Arc::new(self.fetch_outcome(event, detectors, cancel).into_result(&event.name)?);
        self.raw_cache.insert(key, map.clone());
        Ok(map)
    }

    /// Conditioned strain for one detector, served from the conditioned cache when possible.
    fn conditioned(
        &mut self,
        event: &Event,
        raw: &StrainSeries,
        whiten: bool,
        band: BandPass,
    ) -> Result<Arc<StrainSeries>, PipelineError> {
        let key = ConditionedKey {
            gps_bits: event.gps.to_bits(),
            detector: raw.detector.clone(),
            whiten,
            low_bits: band.low.to_bits(),
            high_bits: band.high.to_bits(),
        };
        if let Some(hit) = self.conditioned_cache.get(&key) {
            log::debug!("conditioned cache hit for {} {}", event.name, raw.detector);
            return Ok(hit);
        }

        let conditioned = Arc::new(condition(raw, whiten, band.low, band.high)?);
        self.conditioned_cache.insert(key, conditioned.clone());
        Ok(conditioned)
    }

    /// Run one full render cycle for `event` with `params`.
    ///
    /// Window and band are validated before any network access.
    pub fn prepare(
        &mut self,
        event: &Event,
        params: &DisplayParams,
        cancel: &CancelToken,
    ) -> Result<PreparedEvent, PipelineError> {
        validate_half_width(params.half_width)?;
        check_band_order(params.band)?;

        let raw = self.fetch_window(event, &event.detectors, cancel)?;

        let mut traces = Vec::with_capacity(raw.len());
        for (det, series) in raw.iter() {
            let conditioned = self.conditioned(event, series, params.whiten, params.band)?;
            let det_params = params.for_detector(det);
            let cropped = apply_offset_and_crop(
                &conditioned,
                det_params.offset_ms,
                det_params.invert,
                params.half_width,
                event.gps,
            )?;
            traces.push(DetectorTrace {
                conditioned_variance: cropped.variance(),
                raw_variance: series.variance(),
                raw_len: series.len(),
                params: det_params,
                series: cropped,
            });
        }

        Ok(PreparedEvent {
            event: event.clone(),
            params: params.clone(),
            traces,
            window: (event.gps - params.half_width, event.gps + params.half_width),
        })
    }

    pub fn cache_stats(&self) -> PipelineCacheStats {
        PipelineCacheStats {
            raw: self.raw_cache.stats(),
            conditioned: self.conditioned_cache.stats(),
        }
    }
}

/// Whiten (optionally) and band-pass a raw series.
///
/// Requires `0 < low < high < Nyquist`.
pub fn condition(raw: &StrainSeries, whiten: bool, low: f64, high: f64) -> Result<StrainSeries, PipelineError> {
    let precondition = |e: SignalError| PipelineError::ConditioningPrecondition {
        low,
        high,
        reason: e.to_string(),
    };

    signal::filter::validate_band(low, high, raw.sample_rate).map_err(precondition)?;
    if whiten {
        let whitened = signal::whiten(raw).map_err(precondition)?;
        signal::bandpass(&whitened, low, high).map_err(precondition)
    } else {
        signal::bandpass(raw, low, high).map_err(precondition)
    }
}

/// Shift by `offset_ms`, then invert if asked, then crop to `[gps - half_width, gps + half_width)`.
///
/// Samples shifted out of the window are dropped, not wrapped.
pub fn apply_offset_and_crop(
    conditioned: &StrainSeries,
    offset_ms: f64,
    invert: bool,
    half_width: f64,
    gps: f64,
) -> Result<StrainSeries, PipelineError> {
    validate_half_width(half_width)?;

    let shifted = signal::shift(conditioned, offset_ms / 1000.0);
    let oriented = if invert { signal::invert(&shifted) } else { shifted };
    Ok(signal::crop(&oriented, gps - half_width, gps + half_width))
}

fn validate_half_width(half_width: f64) -> Result<(), PipelineError> {
    if half_width.is_finite() && half_width > 0.0 && half_width < FETCH_HALF_WINDOW {
        Ok(())
    } else {
        Err(PipelineError::InvalidWindow {
            half_width,
            max: FETCH_HALF_WINDOW,
        })
    }
}

/// Sample-rate independent part of the band check, done before fetching.
fn check_band_order(band: BandPass) -> Result<(), PipelineError> {
    if band.low.is_finite() && band.high.is_finite() && band.low > 0.0 && band.low < band.high {
        Ok(())
    } else {
        Err(PipelineError::ConditioningPrecondition {
            low: band.low,
            high: band.high,
            reason: "low cutoff must be positive and below the high cutoff".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GW150914: &str = "GW150914";

    fn pipeline_with(archive: SyntheticArchive) -> (Pipeline, Arc<SyntheticArchive>) {
        let archive = Arc::new(archive);
        let pipeline = Pipeline::new(archive.clone(), archive.clone(), 8);
        (pipeline, archive)
    }

    fn det(id: &str) -> Detector {
        Detector::new(id)
    }

    #[test]
    fn resolved_events_have_valid_gps_and_detectors() {
        let (pipeline, archive) = pipeline_with(SyntheticArchive::default());
        for name in pipeline.list_events().unwrap() {
            let event = pipeline.resolve_event(&name).unwrap();
            assert!(event.gps.is_finite() && event.gps > 0.0);
            assert!(!event.detectors.is_empty());
        }
        assert_eq!(archive.fetch_count(), 0);
    }

    #[test]
    fn gw150914_default_render() {
        let (mut pipeline, _) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let params = DisplayParams::default();
        let prepared = pipeline.prepare(&event, &params, &CancelToken::new()).unwrap();

        assert_eq!(prepared.traces.len(), 2);
        let h1 = prepared.trace(&det("H1")).unwrap();
        let l1 = prepared.trace(&det("L1")).unwrap();
        assert_eq!(h1.series.len(), l1.series.len());
        assert!(!h1.series.is_empty());

        let (start, end) = (event.gps - 0.1, event.gps + 0.1);
        assert_eq!(prepared.window, (start, end));
        for trace in &prepared.traces {
            let s = &trace.series;
            assert!(s.t0 >= start - 0.1 * s.dt() && s.t0 < start + s.dt());
            assert!(s.time_at(s.len() - 1) < end);
            assert!(s.end() >= end - s.dt());
            assert!(
                trace.conditioned_variance < 0.1 * trace.raw_variance,
                "{}: {} vs raw {}",
                s.detector,
                trace.conditioned_variance,
                trace.raw_variance
            );
        }
    }

    #[test]
    fn unknown_event_is_rejected_without_fetching() {
        let (pipeline, archive) = pipeline_with(SyntheticArchive::default());
        let err = pipeline.resolve_event("GW000000").unwrap_err();
        assert!(matches!(err, PipelineError::CatalogResolution { ref name } if name == "GW000000"));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(archive.fetch_count(), 0);
    }

    #[test]
    fn reversed_band_is_rejected_before_fetching() {
        let (mut pipeline, archive) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let params = DisplayParams {
            band: BandPass::new(400.0, 30.0),
            ..DisplayParams::default()
        };
        let err = pipeline.prepare(&event, &params, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, PipelineError::ConditioningPrecondition { .. }));
        assert_eq!(archive.fetch_count(), 0);
    }

    #[test]
    fn condition_rejects_band_above_nyquist() {
        let raw = StrainSeries::new(det("H1"), 0.0, 1024.0, vec![0.0; 4096]);
        let err = condition(&raw, false, 30.0, 600.0).unwrap_err();
        assert!(matches!(err, PipelineError::ConditioningPrecondition { .. }));
    }

    #[test]
    fn inversion_negates_cropped_series() {
        let (mut pipeline, _) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let plain = pipeline
            .prepare(&event, &DisplayParams::default(), &CancelToken::new())
            .unwrap();

        let mut params = DisplayParams::default();
        params.detector_mut(&det("H1")).invert = true;
        let inverted = pipeline.prepare(&event, &params, &CancelToken::new()).unwrap();

        let a = &plain.trace(&det("H1")).unwrap().series;
        let b = &inverted.trace(&det("H1")).unwrap().series;
        assert_eq!(a.len(), b.len());
        for (x, y) in a.values.iter().zip(&b.values) {
            assert_eq!(*y, -*x);
        }
        assert_eq!(plain.trace(&det("L1")).unwrap().series, inverted.trace(&det("L1")).unwrap().series);
    }

    #[test]
    fn half_width_must_stay_inside_fetch_window() {
        let s = StrainSeries::new(det("H1"), 0.0, 16.0, vec![1.0; 16 * 30]);
        for hw in [14.0, 20.0, 0.0, -1.0, f64::NAN] {
            assert!(matches!(
                apply_offset_and_crop(&s, 0.0, false, hw, 15.0),
                Err(PipelineError::InvalidWindow { .. })
            ));
        }
        assert!(apply_offset_and_crop(&s, 0.0, false, 13.9, 15.0).is_ok());
    }

    #[test]
    fn crop_with_zero_offset_is_idempotent() {
        let (mut pipeline, _) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let prepared = pipeline
            .prepare(&event, &DisplayParams::default(), &CancelToken::new())
            .unwrap();
        let once = &prepared.traces[0].series;
        let twice = apply_offset_and_crop(once, 0.0, false, 0.1, event.gps).unwrap();
        assert_eq!(*once, twice);
    }

    #[test]
    fn offset_moves_samples_later() {
        let s = StrainSeries::new(det("H1"), 0.0, 1000.0, (0..2000).map(|i| i as f64).collect());
        let plain = apply_offset_and_crop(&s, 0.0, false, 0.1, 1.0).unwrap();
        let shifted = apply_offset_and_crop(&s, 5.0, false, 0.1, 1.0).unwrap();
        assert_eq!(plain.len(), shifted.len());
        // 5 ms at 1 kHz: the sample plotted at each time came from 5 samples earlier.
        assert_eq!(shifted.values[0], plain.values[0] - 5.0);
    }

    #[test]
    fn repeated_render_hits_raw_cache() {
        let (mut pipeline, archive) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let cancel = CancelToken::new();

        let first = pipeline.fetch_window(&event, &event.detectors, &cancel).unwrap();
        assert_eq!(archive.fetch_count(), 2);
        let second = pipeline.fetch_window(&event, &event.detectors, &cancel).unwrap();
        assert_eq!(archive.fetch_count(), 2);
        assert_eq!(first, second);

        let fresh = archive
            .fetch_strain(&det("H1"), event.fetch_start(), event.fetch_end())
            .unwrap();
        assert_eq!(second[&det("H1")], fresh);
        assert_eq!(pipeline.cache_stats().raw.hits, 1);
    }

    #[test]
    fn display_only_change_reuses_conditioned_stage() {
        let (mut pipeline, archive) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let cancel = CancelToken::new();

        pipeline.prepare(&event, &DisplayParams::default(), &cancel).unwrap();
        let after_first = pipeline.cache_stats().conditioned;
        assert_eq!(after_first.misses, 2);

        let mut params = DisplayParams {
            half_width: 0.5,
            ..DisplayParams::default()
        };
        params.detector_mut(&det("L1")).offset_ms = 7.0;
        params.detector_mut(&det("L1")).invert = true;
        pipeline.prepare(&event, &params, &cancel).unwrap();

        let after_second = pipeline.cache_stats().conditioned;
        assert_eq!(after_second.misses, 2);
        assert_eq!(after_second.hits, 2);
        assert_eq!(archive.fetch_count(), 2);

        // A band change reconditions but still does not refetch.
        params.band = BandPass::new(35.0, 350.0);
        pipeline.prepare(&event, &params, &cancel).unwrap();
        assert_eq!(pipeline.cache_stats().conditioned.misses, 4);
        assert_eq!(archive.fetch_count(), 2);
    }

    #[test]
    fn partial_failure_lists_successful_detectors() {
        let (mut pipeline, _) = pipeline_with(SyntheticArchive::default().with_offline_detector("L1"));
        let event = pipeline.resolve_event(GW150914).unwrap();
        let outcome = pipeline.fetch_outcome(&event, &event.detectors, &CancelToken::new());

        assert!(outcome.is_partial());
        match &outcome {
            FetchOutcome::Failed { succeeded, failures } => {
                assert_eq!(succeeded, &vec![det("H1")]);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, det("L1"));
            }
            FetchOutcome::Complete(_) => panic!("expected a failed outcome"),
        }

        let err = pipeline
            .fetch_window(&event, &event.detectors, &CancelToken::new())
            .unwrap_err();
        match &err {
            PipelineError::Fetch { succeeded, failures, .. } => {
                assert_eq!(succeeded, &vec![det("H1")]);
                assert_eq!(failures[0].0, det("L1"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("L1"));
        assert!(err.to_string().contains("loaded: H1"));
        // Failures are not cached.
        assert_eq!(pipeline.cache_stats().raw.len, 0);
    }

    #[test]
    fn cancelled_fetch_reports_cancelled() {
        let (pipeline, archive) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event(GW150914).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        match pipeline.fetch_outcome(&event, &event.detectors, &cancel) {
            FetchOutcome::Failed { succeeded, failures } => {
                assert!(succeeded.is_empty());
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().all(|(_, e)| *e == FetchError::Cancelled));
            }
            FetchOutcome::Complete(_) => panic!("cancelled fetch completed"),
        }
        assert_eq!(archive.fetch_count(), 0);
    }

    #[test]
    fn unwhitened_render_keeps_band_limited_raw_scale() {
        let (mut pipeline, _) = pipeline_with(SyntheticArchive::default());
        let event = pipeline.resolve_event("GW170814").unwrap();
        let params = DisplayParams {
            whiten: false,
            ..DisplayParams::default()
        };
        let prepared = pipeline.prepare(&event, &params, &CancelToken::new()).unwrap();
        assert_eq!(prepared.traces.len(), 3);
        for trace in &prepared.traces {
            assert!(trace.series.values.iter().all(|v| v.is_finite()));
        }
    }
}
