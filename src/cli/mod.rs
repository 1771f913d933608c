//! Command-line parsing for the gravitational-wave quick-view tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline and presentation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_BAND, DEFAULT_HALF_WIDTH, Detector};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gwq", version, about = "Gravitational-wave event quick-view (GWOSC open data)")]
pub struct Cli {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the catalog's event names.
    Events(EventsArgs),
    /// Fetch, condition and print one event: summary, ASCII plot, optional CSV export.
    Show(ShowArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying pipeline as `gwq show`, but renders results
    /// in a terminal UI using Ratatui.
    Tui(TuiArgs),
}

/// Where the data comes from. Flags win over `GWOSC_URL` / `GWQ_TIMEOUT_SECS`.
#[derive(Debug, Args, Clone, Default)]
pub struct ArchiveArgs {
    /// Use the built-in synthetic archive (no network).
    #[arg(long, global = true)]
    pub offline: bool,

    /// Archive base URL (default: https://gwosc.org).
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// HTTP timeout per request (seconds).
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct EventsArgs {
    /// Names per output line.
    #[arg(long, default_value_t = 6)]
    pub columns: usize,
}

/// Plot window and conditioning options shared by `show` and `tui`.
#[derive(Debug, Args, Clone)]
pub struct ConditioningArgs {
    /// Total plotted time range around the trigger (seconds, 0.1-2.0).
    #[arg(short = 't', long, default_value_t = 2.0 * DEFAULT_HALF_WIDTH)]
    pub time_range: f64,

    /// Skip whitening (band-pass only).
    #[arg(long)]
    pub no_whiten: bool,

    /// Band-pass low cutoff (Hz).
    #[arg(long, default_value_t = DEFAULT_BAND.low)]
    pub freq_low: f64,

    /// Band-pass high cutoff (Hz).
    #[arg(long, default_value_t = DEFAULT_BAND.high)]
    pub freq_high: f64,

    /// Per-detector time offset, e.g. `--offset L1=7.0` (milliseconds, repeatable).
    #[arg(long = "offset", value_name = "DET=MS", value_parser = parse_offset)]
    pub offsets: Vec<(Detector, f64)>,

    /// Invert a detector's amplitude (repeatable).
    #[arg(long = "invert", value_name = "DET")]
    pub invert: Vec<Detector>,
}

impl Default for ConditioningArgs {
    fn default() -> Self {
        Self {
            time_range: 2.0 * DEFAULT_HALF_WIDTH,
            no_whiten: false,
            freq_low: DEFAULT_BAND.low,
            freq_high: DEFAULT_BAND.high,
            offsets: Vec::new(),
            invert: Vec::new(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Event name (see `gwq events`).
    #[arg(short = 'e', long, default_value = "GW150914")]
    pub event: String,

    #[command(flatten)]
    pub conditioning: ConditioningArgs,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Write one `<event>_<det>.csv` per detector into this directory.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct TuiArgs {
    /// Event selected at startup.
    #[arg(short = 'e', long)]
    pub event: Option<String>,

    #[command(flatten)]
    pub conditioning: ConditioningArgs,
}

fn parse_offset(s: &str) -> Result<(Detector, f64), String> {
    let (det, ms) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid offset '{s}' (expected DET=MS, e.g. L1=7.0)."))?;
    let det: Detector = det.parse()?;
    let ms: f64 = ms
        .trim()
        .parse()
        .map_err(|e| format!("Invalid offset milliseconds '{ms}': {e}"))?;
    if !ms.is_finite() {
        return Err(format!("Invalid offset milliseconds '{ms}'."));
    }
    Ok((det, ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_show_with_offsets_and_inversions() {
        let cli = Cli::parse_from([
            "gwq", "show", "--event", "GW170814", "--offset", "L1=7.5", "--offset", "V1=-3",
            "--invert", "L1", "--no-whiten", "-t", "0.5", "--offline",
        ]);
        assert!(cli.archive.offline);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.event, "GW170814");
        let c = &args.conditioning;
        assert_eq!(c.offsets, vec![(Detector::new("L1"), 7.5), (Detector::new("V1"), -3.0)]);
        assert_eq!(c.invert, vec![Detector::new("L1")]);
        assert!(c.no_whiten);
        assert!((c.time_range - 0.5).abs() < 1e-12);
    }

    #[test]
    fn show_defaults_match_display_defaults() {
        let cli = Cli::parse_from(["gwq", "show"]);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.event, "GW150914");
        assert!((args.conditioning.time_range - 0.2).abs() < 1e-12);
        assert_eq!(args.conditioning.freq_low, 30.0);
        assert_eq!(args.conditioning.freq_high, 400.0);
    }

    #[test]
    fn rejects_bad_offsets() {
        assert!(parse_offset("L1").is_err());
        assert!(parse_offset("l1=3").is_err());
        assert!(parse_offset("L1=abc").is_err());
        assert!(parse_offset("L1=NaN").is_err());
        assert_eq!(parse_offset("H1= 0.5").unwrap(), (Detector::new("H1"), 0.5));
    }
}
