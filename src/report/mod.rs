//! Reporting utilities: per-detector statistics and formatted terminal output.

use crate::app::pipeline::PreparedEvent;
use crate::domain::Detector;

pub mod format;

pub use format::*;

/// Summary numbers for one plotted detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorStats {
    pub detector: Detector,
    pub samples: usize,
    pub sample_rate: f64,
    pub raw_variance: f64,
    pub plotted_variance: f64,
    /// Largest absolute amplitude in the plotted window.
    pub peak_abs: f64,
    /// Peak time relative to the trigger (seconds).
    pub peak_offset: f64,
}

/// Compute stats for every trace of `prepared`, in detector order.
pub fn detector_stats(prepared: &PreparedEvent) -> Vec<DetectorStats> {
    let gps = prepared.event.gps;
    prepared
        .traces
        .iter()
        .map(|trace| {
            let s = &trace.series;
            let peak = s
                .values
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
            let (peak_abs, peak_offset) = match peak {
                Some((i, v)) => (v.abs(), s.time_at(i) - gps),
                None => (0.0, 0.0),
            };
            DetectorStats {
                detector: s.detector.clone(),
                samples: s.len(),
                sample_rate: s.sample_rate,
                raw_variance: trace.raw_variance,
                plotted_variance: trace.conditioned_variance,
                peak_abs,
                peak_offset,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::DetectorTrace;
    use crate::domain::{DetectorParams, DisplayParams, Event, StrainSeries};
    use std::collections::BTreeSet;

    #[test]
    fn peak_is_reported_relative_to_trigger() {
        let gps = 1000.0;
        let series = StrainSeries::new(Detector::new("H1"), 999.9, 10.0, vec![0.0, 1.0, -3.0, 2.0]);
        let prepared = PreparedEvent {
            event: Event {
                name: "GW000001".to_string(),
                gps,
                detectors: BTreeSet::from([Detector::new("H1")]),
                metadata: None,
            },
            params: DisplayParams::default(),
            traces: vec![DetectorTrace {
                conditioned_variance: series.variance(),
                series,
                params: DetectorParams::default(),
                raw_variance: 10.0,
                raw_len: 100,
            }],
            window: (999.9, 1000.1),
        };

        let stats = detector_stats(&prepared);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].samples, 4);
        assert!((stats[0].peak_abs - 3.0).abs() < 1e-12);
        assert!((stats[0].peak_offset - 0.1).abs() < 1e-9);
    }
}
