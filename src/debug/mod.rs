//! Debug bundle writer for inspecting one render: event, parameters, per-detector
//! statistics, cache counters and the samples around the trigger.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::app::pipeline::{PipelineCacheStats, PreparedEvent};
use crate::data::cache::CacheStats;
use crate::domain::gps::format_utc;
use crate::error::AppError;
use crate::report::detector_stats;

/// Samples listed on each side of the trigger.
const SAMPLES_AROUND_TRIGGER: usize = 8;

pub fn write_debug_bundle(
    dir: &Path,
    prepared: &PreparedEvent,
    cache: PipelineCacheStats,
    page_url: Option<&str>,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let event = &prepared.event;
    let params = &prepared.params;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("gwq_debug_{}_{}.md", event.name, ts));

    let mut file = File::create(&path)
        .map_err(|e| AppError::new(4, format!("Failed to create debug file: {e}")))?;
    let io_err = |e: std::io::Error| AppError::new(4, format!("Failed to write debug: {e}"));

    writeln!(file, "# gwq debug bundle").map_err(io_err)?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339()).map_err(io_err)?;
    writeln!(file, "- event: {}", event.name).map_err(io_err)?;
    writeln!(file, "- gps: {:.4} ({})", event.gps, format_utc(event.gps)).map_err(io_err)?;
    let detectors: Vec<&str> = event.detectors.iter().map(|d| d.as_str()).collect();
    writeln!(file, "- detectors: {}", detectors.join(", ")).map_err(io_err)?;
    if let Some(url) = page_url {
        writeln!(file, "- page: {url}").map_err(io_err)?;
    }
    match &event.metadata {
        Some(meta) => {
            writeln!(
                file,
                "- metadata: catalog={} version={} m1={} m2={} snr={} distance={}",
                meta.catalog.as_deref().unwrap_or("-"),
                meta.version.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                fmt_opt(meta.mass_1_source),
                fmt_opt(meta.mass_2_source),
                fmt_opt(meta.network_snr),
                fmt_opt(meta.luminosity_distance),
            )
            .map_err(io_err)?;
        }
        None => writeln!(file, "- metadata: unavailable").map_err(io_err)?,
    }

    writeln!(file, "\n## Parameters").map_err(io_err)?;
    writeln!(file, "- half_width: {:.3} s", params.half_width).map_err(io_err)?;
    writeln!(file, "- whiten: {}", params.whiten).map_err(io_err)?;
    writeln!(file, "- band: {:.1}..{:.1} Hz", params.band.low, params.band.high).map_err(io_err)?;
    writeln!(file, "- window: {:.4}..{:.4}", prepared.window.0, prepared.window.1).map_err(io_err)?;

    writeln!(file, "\n## Detectors").map_err(io_err)?;
    writeln!(
        file,
        "| det | offset_ms | invert | raw_len | samples | rate | raw_var | plot_var | peak | peak_t |"
    )
    .map_err(io_err)?;
    writeln!(file, "| - | - | - | - | - | - | - | - | - | - |").map_err(io_err)?;
    for (stats, trace) in detector_stats(prepared).iter().zip(&prepared.traces) {
        writeln!(
            file,
            "| {} | {:.1} | {} | {} | {} | {:.0} | {:.6e} | {:.6e} | {:.4} | {:+.5} |",
            stats.detector,
            trace.params.offset_ms,
            trace.params.invert,
            trace.raw_len,
            stats.samples,
            stats.sample_rate,
            stats.raw_variance,
            stats.plotted_variance,
            stats.peak_abs,
            stats.peak_offset,
        )
        .map_err(io_err)?;
    }

    writeln!(file, "\n## Caches").map_err(io_err)?;
    writeln!(file, "| stage | len | capacity | hits | misses | evictions |").map_err(io_err)?;
    writeln!(file, "| - | - | - | - | - | - |").map_err(io_err)?;
    for (stage, stats) in [("raw", cache.raw), ("conditioned", cache.conditioned)] {
        writeln!(file, "{}", cache_row(stage, &stats)).map_err(io_err)?;
    }

    writeln!(file, "\n## Samples around trigger").map_err(io_err)?;
    for trace in &prepared.traces {
        let s = &trace.series;
        writeln!(file, "\n### {}", s.detector).map_err(io_err)?;
        writeln!(file, "| t - gps | value |").map_err(io_err)?;
        writeln!(file, "| - | - |").map_err(io_err)?;
        let centre = s
            .times()
            .position(|t| t >= event.gps)
            .unwrap_or(s.len() / 2);
        let from = centre.saturating_sub(SAMPLES_AROUND_TRIGGER);
        let to = (centre + SAMPLES_AROUND_TRIGGER).min(s.len());
        for i in from..to {
            writeln!(file, "| {:+.6} | {:.6} |", s.time_at(i) - event.gps, s.values[i]).map_err(io_err)?;
        }
    }

    Ok(path)
}

fn cache_row(stage: &str, stats: &CacheStats) -> String {
    format!(
        "| {stage} | {} | {} | {} | {} | {} |",
        stats.len, stats.capacity, stats.hits, stats.misses, stats.evictions
    )
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.3}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::{CancelToken, Pipeline};
    use crate::data::SyntheticArchive;
    use crate::domain::DisplayParams;
    use std::sync::Arc;

    #[test]
    fn bundle_describes_render() {
        let archive = Arc::new(SyntheticArchive::default());
        let mut pipeline = Pipeline::new(archive.clone(), archive, 2);
        let event = pipeline.resolve_event("GW170814").unwrap();
        let prepared = pipeline
            .prepare(&event, &DisplayParams::default(), &CancelToken::new())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = write_debug_bundle(dir.path(), &prepared, pipeline.cache_stats(), None).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("# gwq debug bundle\n"));
        assert!(text.contains("- event: GW170814"));
        assert!(text.contains("- detectors: H1, L1, V1"));
        assert!(text.contains("| raw | 1 | 2 | 0 | 1 | 0 |"));
        assert!(text.contains("### V1"));
        assert_eq!(text.matches("\n| H1 |").count(), 1);
    }
}
