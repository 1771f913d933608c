//! Export cropped strain to CSV, one file per detector.
//!
//! Columns are `Time,<detector>`: absolute GPS seconds and the plotted
//! (conditioned, shifted, possibly inverted) amplitude. Values use Rust's
//! shortest round-trip float formatting, so reading a file back is lossless.

use std::fs::{File, create_dir_all};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::app::pipeline::PreparedEvent;
use crate::domain::{Detector, StrainSeries};
use crate::error::AppError;

/// File name for one detector of one event, e.g. `GW150914_H1.csv`.
pub fn csv_file_name(event: &str, detector: &Detector) -> String {
    format!("{event}_{detector}.csv")
}

/// Write `series` as CSV to any writer.
pub fn write_detector_csv<W: Write>(writer: W, series: &StrainSeries) -> Result<(), AppError> {
    let mut csv = WriterBuilder::new().from_writer(writer);
    csv.write_record(["Time", series.detector.as_str()])
        .map_err(|e| AppError::new(4, format!("Failed to write CSV header: {e}")))?;
    for (t, v) in series.times().zip(&series.values) {
        csv.write_record([t.to_string(), v.to_string()])
            .map_err(|e| AppError::new(4, format!("Failed to write CSV row: {e}")))?;
    }
    csv.flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// CSV text for `series` (the content a download link would offer).
pub fn csv_string(series: &StrainSeries) -> Result<String, AppError> {
    let mut buf = Vec::new();
    write_detector_csv(&mut buf, series)?;
    String::from_utf8(buf).map_err(|e| AppError::new(4, format!("CSV is not UTF-8: {e}")))
}

/// Write one CSV per detector of `prepared` into `dir`, creating it if needed.
pub fn write_all_csv(dir: &Path, prepared: &PreparedEvent) -> Result<Vec<PathBuf>, AppError> {
    create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create export dir '{}': {e}", dir.display())))?;

    let mut paths = Vec::with_capacity(prepared.traces.len());
    for trace in &prepared.traces {
        let path = dir.join(csv_file_name(&prepared.event.name, &trace.series.detector));
        let file = File::create(&path)
            .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
        write_detector_csv(file, &trace.series)?;
        log::info!("wrote {} ({} samples)", path.display(), trace.series.len());
        paths.push(path);
    }
    Ok(paths)
}

/// Read a `Time,<detector>` CSV back into a series.
///
/// The sample rate is recovered from the timestamps.
pub fn read_detector_csv<R: Read>(reader: R) -> Result<StrainSeries, AppError> {
    let mut csv = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    if headers.len() != 2 || headers.get(0) != Some("Time") {
        return Err(AppError::new(2, "Expected CSV columns `Time,<detector>`."));
    }
    let detector: Detector = headers
        .get(1)
        .unwrap_or_default()
        .parse()
        .map_err(|e: String| AppError::new(2, e))?;

    let mut times = Vec::new();
    let mut values = Vec::new();
    for (idx, record) in csv.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| AppError::new(2, format!("CSV line {line}: {e}")))?;
        let parse = |col: usize| -> Result<f64, AppError> {
            record
                .get(col)
                .unwrap_or_default()
                .parse::<f64>()
                .map_err(|e| AppError::new(2, format!("CSV line {line}: {e}")))
        };
        times.push(parse(0)?);
        values.push(parse(1)?);
    }

    let (t0, last) = match (times.first(), times.last()) {
        (Some(&first), Some(&last)) if times.len() >= 2 && last > first => (first, last),
        _ => return Err(AppError::new(2, "CSV needs at least two increasing timestamps.")),
    };
    // Over the whole span: GPS-scale timestamps lose precision in single steps.
    let sample_rate = (times.len() - 1) as f64 / (last - t0);

    // Every row must sit on the uniform grid, within a quarter sample.
    let tolerance = 0.25 / sample_rate;
    for (i, &t) in times.iter().enumerate() {
        let expected = t0 + i as f64 / sample_rate;
        if (t - expected).abs() > tolerance {
            return Err(AppError::new(
                2,
                format!("CSV line {}: time {t} is off the uniform grid (expected {expected}).", i + 2),
            ));
        }
    }

    Ok(StrainSeries::new(detector, t0, sample_rate, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::{CancelToken, Pipeline};
    use crate::data::SyntheticArchive;
    use crate::domain::DisplayParams;
    use std::sync::Arc;

    #[test]
    fn csv_has_time_and_detector_columns() {
        let s = StrainSeries::new(Detector::new("L1"), 100.0, 4.0, vec![0.5, -0.25]);
        let text = csv_string(&s).unwrap();
        assert_eq!(text, "Time,L1\n100,0.5\n100.25,-0.25\n");
    }

    #[test]
    fn export_round_trips_through_files() {
        let archive = Arc::new(SyntheticArchive::default());
        let mut pipeline = Pipeline::new(archive.clone(), archive, 2);
        let event = pipeline.resolve_event("GW150914").unwrap();
        let prepared = pipeline
            .prepare(&event, &DisplayParams::default(), &CancelToken::new())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let paths = write_all_csv(dir.path(), &prepared).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("GW150914_H1.csv"));

        for (path, trace) in paths.iter().zip(&prepared.traces) {
            let back = read_detector_csv(File::open(path).unwrap()).unwrap();
            let original = &trace.series;
            assert_eq!(back.detector, original.detector);
            assert_eq!(back.len(), original.len());
            for (a, b) in back.values.iter().zip(&original.values) {
                assert!((a - b).abs() <= 1e-12 * b.abs().max(1.0));
            }
            let mut rows = ReaderBuilder::new().from_path(path).unwrap();
            let written: Vec<f64> = rows
                .records()
                .map(|r| r.unwrap()[0].parse().unwrap())
                .collect();
            assert_eq!(written.len(), original.len());
            for (i, t) in written.iter().enumerate() {
                assert!((t - original.time_at(i)).abs() < 1e-5);
                assert!((back.time_at(i) - t).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn malformed_csv_is_rejected() {
        let bad_header = "t,H1\n0,1\n1,2\n";
        assert!(read_detector_csv(bad_header.as_bytes()).is_err());
        let bad_value = "Time,H1\n0,1\n1,abc\n";
        assert!(read_detector_csv(bad_value.as_bytes()).is_err());
        let single_row = "Time,H1\n0,1\n";
        assert!(read_detector_csv(single_row.as_bytes()).is_err());
    }

    #[test]
    fn timestamps_off_the_grid_are_rejected() {
        let good = "Time,H1\n10,1\n10.25,2\n10.5,3\n10.75,4\n";
        let series = read_detector_csv(good.as_bytes()).unwrap();
        assert_eq!(series.sample_rate, 4.0);
        assert_eq!(series.values, vec![1.0, 2.0, 3.0, 4.0]);

        let corrupted_middle = "Time,H1\n10,1\n10.6,2\n10.5,3\n10.75,4\n";
        let err = read_detector_csv(corrupted_middle.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 3"));
    }
}
