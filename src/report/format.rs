//! Formatted terminal output for `gwq show` and `gwq events`.
//!
//! Formatting lives in one place so the pipeline stays presentation-free and
//! output changes stay localized.

use crate::app::pipeline::PreparedEvent;
use crate::domain::EventMetadata;
use crate::domain::gps::format_utc;

use super::detector_stats;

/// Event header, optional metadata block, conditioning settings and per-detector table.
pub fn format_event_summary(prepared: &PreparedEvent, page_url: Option<&str>) -> String {
    let event = &prepared.event;
    let params = &prepared.params;
    let mut out = String::new();

    out.push_str(&format!("=== {} ===\n", event.name));
    out.push_str(&format!("GPS: {:.3} ({})\n", event.gps, format_utc(event.gps)));
    let detectors: Vec<&str> = event.detectors.iter().map(|d| d.as_str()).collect();
    out.push_str(&format!("Detectors: {}\n", detectors.join(", ")));

    if let Some(meta) = &event.metadata {
        out.push_str(&format_metadata(meta));
    }
    if let Some(url) = page_url {
        out.push_str(&format!("Details: {url}\n"));
    }

    out.push_str(&format!(
        "\nWindow: {:.3}s around trigger | whiten: {} | band-pass: {:.0}-{:.0} Hz\n",
        2.0 * params.half_width,
        if params.whiten { "on" } else { "off" },
        params.band.low,
        params.band.high,
    ));

    out.push('\n');
    out.push_str(
        format!(
            "{:<4} {:>8} {:>8} {:>10} {:>6} {:>12} {:>12} {:>10} {:>10}\n",
            "det", "samples", "rate", "offset_ms", "inv", "raw_var", "plot_var", "peak", "peak_t"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<4} {:-<8} {:-<8} {:-<10} {:-<6} {:-<12} {:-<12} {:-<10} {:-<10}\n",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (stats, trace) in detector_stats(prepared).iter().zip(&prepared.traces) {
        out.push_str(
            format!(
                "{:<4} {:>8} {:>8.0} {:>10.1} {:>6} {:>12.4e} {:>12.4e} {:>10.3} {:>+10.4}\n",
                stats.detector.as_str(),
                stats.samples,
                stats.sample_rate,
                trace.params.offset_ms,
                if trace.params.invert { "yes" } else { "no" },
                stats.raw_variance,
                stats.plotted_variance,
                stats.peak_abs,
                stats.peak_offset,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Source parameters, one line per known value. Empty when nothing is known.
pub fn format_metadata(meta: &EventMetadata) -> String {
    let mut out = String::new();
    if let Some(catalog) = &meta.catalog {
        match meta.version {
            Some(v) => out.push_str(&format!("Catalog: {catalog} (v{v})\n")),
            None => out.push_str(&format!("Catalog: {catalog}\n")),
        }
    }
    if meta.is_empty() {
        return out;
    }
    if let (Some(m1), Some(m2)) = (meta.mass_1_source, meta.mass_2_source) {
        out.push_str(&format!("Source masses: {m1:.1} + {m2:.1} Msun\n"));
    } else {
        if let Some(m1) = meta.mass_1_source {
            out.push_str(&format!("Primary mass: {m1:.1} Msun\n"));
        }
        if let Some(m2) = meta.mass_2_source {
            out.push_str(&format!("Secondary mass: {m2:.1} Msun\n"));
        }
    }
    if let Some(snr) = meta.network_snr {
        out.push_str(&format!("Network SNR: {snr:.1}\n"));
    }
    if let Some(d) = meta.luminosity_distance {
        out.push_str(&format!("Luminosity distance: {d:.0} Mpc\n"));
    }
    out
}

/// Event names, several per line.
pub fn format_event_list(names: &[String], columns: usize) -> String {
    let columns = columns.max(1);
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    let mut out = String::new();
    for row in names.chunks(columns) {
        let cells: Vec<String> = row.iter().map(|n| format!("{n:<width$}")).collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out.push_str(&format!("({} events)\n", names.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::{CancelToken, Pipeline};
    use crate::data::SyntheticArchive;
    use crate::domain::DisplayParams;
    use std::sync::Arc;

    #[test]
    fn summary_lists_metadata_and_detectors() {
        let archive = Arc::new(SyntheticArchive::default());
        let mut pipeline = Pipeline::new(archive.clone(), archive, 2);
        let event = pipeline.resolve_event("GW150914").unwrap();
        let prepared = pipeline
            .prepare(&event, &DisplayParams::default(), &CancelToken::new())
            .unwrap();

        let txt = format_event_summary(&prepared, Some("https://example.org/GW150914"));
        assert!(txt.starts_with("=== GW150914 ===\n"));
        assert!(txt.contains("2015-09-14 09:50:45.400 UTC"));
        assert!(txt.contains("Detectors: H1, L1"));
        assert!(txt.contains("Source masses: 35.6 + 30.6 Msun"));
        assert!(txt.contains("Details: https://example.org/GW150914"));
        assert!(txt.contains("band-pass: 30-400 Hz"));
        assert!(txt.lines().any(|l| l.starts_with("H1 ")));
        assert!(txt.lines().any(|l| l.starts_with("L1 ")));
    }

    #[test]
    fn metadata_block_skips_missing_values() {
        let meta = EventMetadata {
            network_snr: Some(12.34),
            ..EventMetadata::default()
        };
        assert_eq!(format_metadata(&meta), "Network SNR: 12.3\n");
        assert_eq!(format_metadata(&EventMetadata::default()), "");
    }

    #[test]
    fn event_list_wraps_into_columns() {
        let names: Vec<String> = ["GW150914", "GW151012", "GW151226"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let txt = format_event_list(&names, 2);
        assert_eq!(txt, "GW150914  GW151012\nGW151226\n(3 events)\n");
    }
}
