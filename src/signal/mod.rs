//! Signal conditioning on `StrainSeries`.
//!
//! - `whiten`: flatten the noise spectrum (FFT based, `realfft`)
//! - `bandpass`: zero-phase Butterworth band-pass (biquad sections)
//! - `shift` / `invert` / `crop`: display adjustments
//!
//! All operations return new series; inputs are never modified, so cached
//! pipeline stages stay valid.

use thiserror::Error;

use crate::domain::StrainSeries;

pub mod filter;
pub mod whiten;

pub use filter::bandpass;
pub use whiten::whiten;

/// Fraction of a sample used as tolerance when comparing sample times to crop bounds.
///
/// GPS times near 1e9 s carry ~1e-7 s of rounding, a small fraction of a 4 kHz sample.
const CROP_TOLERANCE_SAMPLES: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("band-pass requires 0 < low < high < Nyquist ({nyquist} Hz)")]
    InvalidBand { low: f64, high: f64, nyquist: f64 },

    #[error("series too short: {len} samples, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("FFT failed: {0}")]
    Fft(String),
}

/// Move the series in time by `seconds`. Samples are untouched.
pub fn shift(series: &StrainSeries, seconds: f64) -> StrainSeries {
    let mut out = series.clone();
    out.t0 += seconds;
    out
}

/// Multiply every sample by -1.
pub fn invert(series: &StrainSeries) -> StrainSeries {
    let mut out = series.clone();
    for v in &mut out.values {
        *v = -*v;
    }
    out
}

/// Keep the samples with `start <= t < end`.
///
/// Samples outside the series are simply absent from the result; a window that
/// misses the data entirely yields an empty series starting at `start`.
pub fn crop(series: &StrainSeries, start: f64, end: f64) -> StrainSeries {
    let n = series.len();
    let first = sample_index_at_or_after(series, start).min(n);
    let last = sample_index_at_or_after(series, end).clamp(first, n);

    let t0 = if first < last { series.time_at(first) } else { start };

    StrainSeries {
        detector: series.detector.clone(),
        t0,
        sample_rate: series.sample_rate,
        values: series.values[first..last].to_vec(),
    }
}

/// Index of the first sample whose time is `>= t` (within tolerance), clamped at 0.
fn sample_index_at_or_after(series: &StrainSeries, t: f64) -> usize {
    let pos = (t - series.t0) * series.sample_rate - CROP_TOLERANCE_SAMPLES;
    if !pos.is_finite() || pos <= 0.0 {
        return 0;
    }
    pos.ceil() as usize
}
