//! Spectral whitening.
//!
//! The amplitude spectral density (ASD) is estimated with Welch's method, then the
//! full-length spectrum is divided by the ASD interpolated at each frequency bin.
//! The output is scaled so stationary white noise of any level comes out with
//! unit variance.

use std::f64::consts::PI;

use realfft::RealFftPlanner;
use realfft::num_complex::Complex;

use super::SignalError;
use crate::domain::StrainSeries;

/// Welch segment length (seconds).
const SEGMENT_SECONDS: f64 = 4.0;
/// Taper applied to each end of the series before the full FFT (seconds).
const TAPER_SECONDS: f64 = 1.0;
const MIN_SAMPLES: usize = 64;

/// Whiten `series`. Assumes the background noise is stationary over the series.
pub fn whiten(series: &StrainSeries) -> Result<StrainSeries, SignalError> {
    let n = series.len();
    if n < MIN_SAMPLES {
        return Err(SignalError::TooShort {
            len: n,
            min: MIN_SAMPLES,
        });
    }

    let rate = series.sample_rate;
    let mean = series.values.iter().sum::<f64>() / n as f64;
    let detrended: Vec<f64> = series.values.iter().map(|v| v - mean).collect();

    let segment = welch_segment_len(n, rate);
    let (asd_df, asd) = welch_asd(&detrended, segment, rate)?;

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let c2r = planner.plan_fft_inverse(n);

    let taper = tukey(n, ((TAPER_SECONDS * rate) as usize).min(n / 8));
    let mut input: Vec<f64> = detrended.iter().zip(&taper).map(|(x, w)| x * w).collect();
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut input, &mut spectrum)
        .map_err(|e| SignalError::Fft(e.to_string()))?;

    let df = rate / n as f64;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let level = interpolate(&asd, asd_df, k as f64 * df);
        if k == 0 || !(level.is_finite() && level > 0.0) {
            *bin = Complex::new(0.0, 0.0);
        } else {
            *bin /= level;
        }
    }
    // The inverse real transform requires a purely real Nyquist bin.
    if n % 2 == 0 {
        if let Some(last) = spectrum.last_mut() {
            last.im = 0.0;
        }
    }

    let mut output = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut output)
        .map_err(|e| SignalError::Fft(e.to_string()))?;

    // realfft's inverse is unnormalized; `sqrt(2 dt)` undoes the one-sided PSD scaling.
    let scale = (2.0 / rate).sqrt() / n as f64;
    for v in &mut output {
        *v *= scale;
    }

    Ok(StrainSeries {
        detector: series.detector.clone(),
        t0: series.t0,
        sample_rate: rate,
        values: output,
    })
}

fn welch_segment_len(n: usize, rate: f64) -> usize {
    let wanted = (SEGMENT_SECONDS * rate).round() as usize;
    let segment = wanted.min(n).max(MIN_SAMPLES);
    segment - segment % 2
}

/// One-sided ASD via Welch (Hann window, 50% overlap). Returns `(bin spacing, asd)`.
fn welch_asd(signal: &[f64], segment: usize, rate: f64) -> Result<(f64, Vec<f64>), SignalError> {
    let window = hann(segment);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let step = (segment / 2).max(1);

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(segment);
    let mut spectrum = r2c.make_output_vec();
    let mut psd = vec![0.0; spectrum.len()];
    let mut segments = 0usize;

    let mut pos = 0;
    while pos + segment <= signal.len() {
        let mut frame: Vec<f64> = signal[pos..pos + segment]
            .iter()
            .zip(&window)
            .map(|(x, w)| x * w)
            .collect();
        r2c.process(&mut frame, &mut spectrum)
            .map_err(|e| SignalError::Fft(e.to_string()))?;

        let last = spectrum.len() - 1;
        for (k, val) in spectrum.iter().enumerate() {
            let one_sided = if k == 0 || k == last { 1.0 } else { 2.0 };
            psd[k] += one_sided * val.norm_sqr() / (rate * window_power);
        }
        segments += 1;
        pos += step;
    }

    if segments == 0 {
        return Err(SignalError::TooShort {
            len: signal.len(),
            min: segment,
        });
    }

    let asd = psd.into_iter().map(|p| (p / segments as f64).sqrt()).collect();
    Ok((rate / segment as f64, asd))
}

/// Linear interpolation on a uniform grid starting at 0 Hz.
fn interpolate(values: &[f64], spacing: f64, freq: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let pos = freq / spacing;
    let i = pos.floor() as usize;
    if i + 1 >= values.len() {
        return values[values.len() - 1];
    }
    let frac = pos - i as f64;
    values[i] * (1.0 - frac) + values[i + 1] * frac
}

fn hann(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Flat window with cosine ramps of `ramp` samples at each end.
fn tukey(n: usize, ramp: usize) -> Vec<f64> {
    let mut w = vec![1.0; n];
    if ramp == 0 {
        return w;
    }
    for i in 0..ramp.min(n) {
        let v = 0.5 - 0.5 * (PI * i as f64 / ramp as f64).cos();
        w[i] = v;
        w[n - 1 - i] = v;
    }
    w
}
