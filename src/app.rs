//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - resolves the archive configuration (flags, environment, defaults)
//! - dispatches to `events`, `show` or the TUI

use std::fs::File;
use std::time::Duration;

use clap::Parser;
use env_logger::{Env, Target};

use crate::cli::{ArchiveArgs, Command, ConditioningArgs, EventsArgs, ShowArgs, TuiArgs};
use crate::domain::{
    ArchiveConfig, BAND_MAX_HZ, BAND_MIN_HZ, BandPass, DisplayParams, HALF_WIDTH_MAX, HALF_WIDTH_MIN, OFFSET_LIMIT_MS,
};
use crate::error::AppError;

pub mod pipeline;

use pipeline::{CancelToken, Pipeline};

/// Log file used while the TUI owns the terminal.
const TUI_LOG_FILE: &str = "gwq.log";

/// Entry point for the `gwq` binary.
pub fn run() -> Result<(), AppError> {
    // We want `gwq` and `gwq --offline` to behave like `gwq tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    init_logging(matches!(cli.command, Command::Tui(_)));
    let config = archive_config(&cli.archive)?;

    match cli.command {
        Command::Events(args) => handle_events(&config, args),
        Command::Show(args) => handle_show(&config, args),
        Command::Tui(args) => handle_tui(config, args),
    }
}

fn handle_events(config: &ArchiveConfig, args: EventsArgs) -> Result<(), AppError> {
    let pipeline = Pipeline::from_config(config)?;
    let names = pipeline.list_events()?;
    print!("{}", crate::report::format_event_list(&names, args.columns));
    Ok(())
}

fn handle_show(config: &ArchiveConfig, args: ShowArgs) -> Result<(), AppError> {
    let params = display_params_from_args(&args.conditioning)?;
    let mut pipeline = Pipeline::from_config(config)?;

    let event = pipeline.resolve_event(&args.event)?;
    let prepared = pipeline.prepare(&event, &params, &CancelToken::new())?;
    let page_url = pipeline.event_page_url(&event.name);

    println!(
        "{}",
        crate::report::format_event_summary(&prepared, page_url.as_deref())
    );

    if !args.no_plot {
        let plot = crate::plot::render_overlay_plot(&prepared, args.width, args.height);
        println!("{plot}");
    }

    // Optional exports.
    if let Some(dir) = &args.export_dir {
        for path in crate::io::export::write_all_csv(dir, &prepared)? {
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn handle_tui(config: ArchiveConfig, args: TuiArgs) -> Result<(), AppError> {
    let params = display_params_from_args(&args.conditioning)?;
    crate::tui::run(config, args.event, params)
}

/// Logging goes to stderr, or to a file in the temp dir while the TUI is active.
fn init_logging(tui: bool) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    if tui {
        let path = std::env::temp_dir().join(TUI_LOG_FILE);
        match File::create(&path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    // A logger may already be installed (tests, embedding); keep it.
    let _ = builder.try_init();
}

/// Resolve the archive configuration: CLI flag, then environment (`.env` via dotenvy), then default.
pub fn archive_config(args: &ArchiveArgs) -> Result<ArchiveConfig, AppError> {
    dotenvy::dotenv().ok();
    resolve_archive_config(args, |key| std::env::var(key).ok())
}

fn resolve_archive_config(
    args: &ArchiveArgs,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ArchiveConfig, AppError> {
    let mut config = ArchiveConfig {
        offline: args.offline,
        ..ArchiveConfig::default()
    };

    if let Some(url) = args.base_url.clone().or_else(|| env("GWOSC_URL")) {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(AppError::new(2, "Archive base URL must not be empty."));
        }
        config.base_url = url.to_string();
    }

    let timeout_secs = match args.timeout_secs {
        Some(secs) => Some(secs),
        None => parse_env(&env, "GWQ_TIMEOUT_SECS")?,
    };
    if let Some(secs) = timeout_secs {
        if secs == 0 {
            return Err(AppError::new(2, "Timeout must be at least 1 second."));
        }
        config.timeout = Duration::from_secs(secs);
    }

    if let Some(capacity) = parse_env::<usize>(&env, "GWQ_CACHE_CAPACITY")? {
        config.cache_capacity = capacity.max(1);
    }

    Ok(config)
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T::Err: std::fmt::Display,
{
    match env(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::new(2, format!("Invalid {key}='{raw}': {e}"))),
    }
}

/// Build display parameters from flags, enforcing the same ranges as the TUI controls.
pub fn display_params_from_args(args: &ConditioningArgs) -> Result<DisplayParams, AppError> {
    let half_width = args.time_range / 2.0;
    if !(HALF_WIDTH_MIN..=HALF_WIDTH_MAX).contains(&half_width) {
        return Err(AppError::new(
            2,
            format!(
                "Time range {} s is outside [{}, {}] s.",
                args.time_range,
                2.0 * HALF_WIDTH_MIN,
                2.0 * HALF_WIDTH_MAX
            ),
        ));
    }

    for freq in [args.freq_low, args.freq_high] {
        if !(BAND_MIN_HZ..=BAND_MAX_HZ).contains(&freq) {
            return Err(AppError::new(
                2,
                format!("Band-pass cutoff {freq} Hz is outside [{BAND_MIN_HZ}, {BAND_MAX_HZ}] Hz."),
            ));
        }
    }

    let mut params = DisplayParams {
        half_width,
        whiten: !args.no_whiten,
        band: BandPass::new(args.freq_low, args.freq_high),
        ..DisplayParams::default()
    };

    for (det, ms) in &args.offsets {
        if ms.abs() > OFFSET_LIMIT_MS {
            return Err(AppError::new(
                2,
                format!("Offset for {det} ({ms} ms) exceeds ±{OFFSET_LIMIT_MS} ms."),
            ));
        }
        params.detector_mut(det).offset_ms = *ms;
    }
    for det in &args.invert {
        params.detector_mut(det).invert = true;
    }

    Ok(params)
}

/// Subcommand names `gwq` understands (plus clap's `help`).
const SUBCOMMANDS: [&str; 4] = ["events", "show", "tui", "help"];

/// Flags that consume the following token as their value.
const VALUE_FLAGS: [&str; 14] = [
    "--base-url",
    "--timeout-secs",
    "-e",
    "--event",
    "-t",
    "--time-range",
    "--freq-low",
    "--freq-high",
    "--offset",
    "--invert",
    "--width",
    "--height",
    "--export-dir",
    "--columns",
];

/// Rewrite argv so `gwq` defaults to `gwq tui`.
///
/// Rules:
/// - `gwq`                           -> `gwq tui`
/// - `gwq --offline ...`             -> `gwq tui --offline ...`
/// - `gwq --offline events`          -> unchanged (global flag before a subcommand)
/// - `gwq --help/--version/-h`       -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    // A leading positional is either a subcommand or something for clap to reject.
    if !arg1.starts_with('-') {
        return argv;
    }

    // Leading flags: look past them (and their values) for a subcommand.
    if first_positional(&argv[1..]).is_some_and(|arg| SUBCOMMANDS.contains(&arg)) {
        return argv;
    }

    argv.insert(1, "tui".to_string());
    argv
}

/// First token that is neither a flag nor a flag's value.
fn first_positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if !arg.starts_with('-') {
            return Some(arg);
        }
        if arg == "--" {
            return iter.next().map(String::as_str);
        }
        if !arg.contains('=') && VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, Detector};
    use std::collections::HashMap;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_and_flags_go_to_tui() {
        assert_eq!(rewrite_args(args(&["gwq"])), args(&["gwq", "tui"]));
        assert_eq!(
            rewrite_args(args(&["gwq", "--offline"])),
            args(&["gwq", "tui", "--offline"])
        );
        assert_eq!(rewrite_args(args(&["gwq", "show"])), args(&["gwq", "show"]));
        assert_eq!(rewrite_args(args(&["gwq", "--help"])), args(&["gwq", "--help"]));
        assert_eq!(
            rewrite_args(args(&["gwq", "--offline", "--event", "GW170814"])),
            args(&["gwq", "tui", "--offline", "--event", "GW170814"])
        );
    }

    #[test]
    fn global_flags_before_a_subcommand_are_left_alone() {
        assert_eq!(
            rewrite_args(args(&["gwq", "--offline", "events"])),
            args(&["gwq", "--offline", "events"])
        );
        assert_eq!(
            rewrite_args(args(&["gwq", "--base-url", "http://x", "show", "-e", "GW150914"])),
            args(&["gwq", "--base-url", "http://x", "show", "-e", "GW150914"])
        );
        assert_eq!(
            rewrite_args(args(&["gwq", "--timeout-secs=5", "tui"])),
            args(&["gwq", "--timeout-secs=5", "tui"])
        );

        // The rewritten argv parses into the intended subcommand.
        let cli = crate::cli::Cli::parse_from(rewrite_args(args(&["gwq", "--offline", "events"])));
        assert!(cli.archive.offline);
        assert!(matches!(cli.command, Command::Events(_)));

        let cli = crate::cli::Cli::parse_from(rewrite_args(args(&[
            "gwq", "--base-url", "http://x", "show",
        ])));
        assert_eq!(cli.archive.base_url.as_deref(), Some("http://x"));
        assert!(matches!(cli.command, Command::Show(_)));

        let cli = crate::cli::Cli::parse_from(rewrite_args(args(&["gwq", "--offline", "-t", "0.5"])));
        assert!(matches!(cli.command, Command::Tui(_)));
    }

    #[test]
    fn flags_beat_environment_which_beats_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GWOSC_URL", "https://mirror.example/"),
            ("GWQ_TIMEOUT_SECS", "5"),
            ("GWQ_CACHE_CAPACITY", "3"),
        ]);
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let from_env = resolve_archive_config(&ArchiveArgs::default(), lookup).unwrap();
        assert_eq!(from_env.base_url, "https://mirror.example");
        assert_eq!(from_env.timeout, Duration::from_secs(5));
        assert_eq!(from_env.cache_capacity, 3);

        let flags = ArchiveArgs {
            offline: true,
            base_url: Some("http://localhost:8000".to_string()),
            timeout_secs: Some(9),
        };
        let from_flags = resolve_archive_config(&flags, lookup).unwrap();
        assert_eq!(from_flags.base_url, "http://localhost:8000");
        assert_eq!(from_flags.timeout, Duration::from_secs(9));
        assert!(from_flags.offline);

        let defaults = resolve_archive_config(&ArchiveArgs::default(), |_| None).unwrap();
        assert_eq!(defaults.base_url, DEFAULT_BASE_URL);
        assert_eq!(defaults.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn invalid_environment_values_are_user_errors() {
        let err = resolve_archive_config(&ArchiveArgs::default(), |k| {
            (k == "GWQ_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn conditioning_flags_map_to_display_params() {
        let c = ConditioningArgs {
            time_range: 0.5,
            no_whiten: true,
            offsets: vec![(Detector::new("L1"), 7.0)],
            invert: vec![Detector::new("L1")],
            ..ConditioningArgs::default()
        };
        let params = display_params_from_args(&c).unwrap();
        assert!((params.half_width - 0.25).abs() < 1e-12);
        assert!(!params.whiten);
        let l1 = params.for_detector(&Detector::new("L1"));
        assert_eq!(l1.offset_ms, 7.0);
        assert!(l1.invert);
        assert!(!params.for_detector(&Detector::new("H1")).invert);
    }

    #[test]
    fn out_of_range_controls_are_rejected() {
        let too_wide = ConditioningArgs {
            time_range: 5.0,
            ..ConditioningArgs::default()
        };
        assert_eq!(display_params_from_args(&too_wide).unwrap_err().exit_code(), 2);

        let big_offset = ConditioningArgs {
            offsets: vec![(Detector::new("H1"), 25.0)],
            ..ConditioningArgs::default()
        };
        assert!(display_params_from_args(&big_offset).is_err());

        let low_band = ConditioningArgs {
            freq_low: 1.0,
            ..ConditioningArgs::default()
        };
        assert!(display_params_from_args(&low_band).is_err());
    }
}
