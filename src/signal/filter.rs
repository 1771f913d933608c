//! Zero-phase Butterworth band-pass.
//!
//! A 4th-order high-pass at `low` and a 4th-order low-pass at `high`, each made of
//! two biquad sections (RBJ cookbook coefficients), run forward then backward so
//! the result has no phase shift. Zero phase matters here: the per-detector time
//! offsets are read off the plot.

use std::f64::consts::PI;

use super::SignalError;
use crate::domain::StrainSeries;

/// Section quality factors of a 4th-order Butterworth response.
const BUTTERWORTH_Q4: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_376_6];

#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn lowpass(cutoff: f64, q: f64, rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            (1.0 - cos) / 2.0,
            1.0 - cos,
            (1.0 - cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    fn highpass(cutoff: f64, q: f64, rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        Self::normalized(
            (1.0 + cos) / 2.0,
            -(1.0 + cos),
            (1.0 + cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Filter in place (transposed direct form II, zero initial state).
    fn run<'a>(&self, samples: impl Iterator<Item = &'a mut f64>) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for x in samples {
            let input = *x;
            let y = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * y + z2;
            z2 = self.b2 * input - self.a2 * y;
            *x = y;
        }
    }
}

/// Check `0 < low < high < Nyquist` for the given sample rate.
pub fn validate_band(low: f64, high: f64, sample_rate: f64) -> Result<(), SignalError> {
    let nyquist = sample_rate / 2.0;
    let ok = low.is_finite() && high.is_finite() && low > 0.0 && low < high && high < nyquist;
    if ok {
        Ok(())
    } else {
        Err(SignalError::InvalidBand { low, high, nyquist })
    }
}

/// Suppress content outside `[low, high]` Hz.
pub fn bandpass(series: &StrainSeries, low: f64, high: f64) -> Result<StrainSeries, SignalError> {
    validate_band(low, high, series.sample_rate)?;

    let rate = series.sample_rate;
    let mut sections = Vec::with_capacity(4);
    for q in BUTTERWORTH_Q4 {
        sections.push(Biquad::highpass(low, q, rate));
    }
    for q in BUTTERWORTH_Q4 {
        sections.push(Biquad::lowpass(high, q, rate));
    }

    let mut values = series.values.clone();
    for section in &sections {
        section.run(values.iter_mut());
    }
    for section in &sections {
        section.run(values.iter_mut().rev());
    }

    Ok(StrainSeries {
        detector: series.detector.clone(),
        t0: series.t0,
        sample_rate: rate,
        values,
    })
}
