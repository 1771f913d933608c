use thiserror::Error;

use crate::data::FetchError;
use crate::domain::Detector;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures of a single render cycle.
///
/// Catalog and fetch failures end the cycle; the caller reports them and
/// waits for the user to change inputs. Missing metadata is not an error
/// (see `Catalog::fetch_event_json`).
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Unknown event '{name}'. Pick one from `gwq events`.")]
    CatalogResolution { name: String },

    #[error("Event catalog unavailable: {0}")]
    Catalog(String),

    #[error(
        "Data load failed for {event} ({}{}). Try a different event or retry later.",
        format_failures(.failures),
        format_loaded(.succeeded)
    )]
    Fetch {
        event: String,
        /// Detectors that did load; nothing is kept when any detector fails.
        succeeded: Vec<Detector>,
        failures: Vec<(Detector, FetchError)>,
    },

    #[error("Invalid band-pass {low} Hz..{high} Hz: {reason}")]
    ConditioningPrecondition { low: f64, high: f64, reason: String },

    #[error("Plot half-width {half_width} s must be in (0, {max}) s")]
    InvalidWindow { half_width: f64, max: f64 },
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::CatalogResolution { .. }
            | PipelineError::ConditioningPrecondition { .. }
            | PipelineError::InvalidWindow { .. } => 2,
            PipelineError::Catalog(_) => 3,
            PipelineError::Fetch { .. } => 4,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

fn format_failures(failures: &[(Detector, FetchError)]) -> String {
    failures
        .iter()
        .map(|(det, err)| format!("{det}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_loaded(succeeded: &[Detector]) -> String {
    if succeeded.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = succeeded.iter().map(Detector::as_str).collect();
    format!("; loaded: {}", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_names_loaded_and_failed_detectors() {
        let err = PipelineError::Fetch {
            event: "GW150914".to_string(),
            succeeded: vec![Detector::new("H1")],
            failures: vec![(Detector::new("L1"), FetchError::Unavailable("L1".to_string()))],
        };
        assert_eq!(
            err.to_string(),
            "Data load failed for GW150914 (L1: detector offline: L1; loaded: H1). \
             Try a different event or retry later."
        );

        let none_loaded = PipelineError::Fetch {
            event: "GW150914".to_string(),
            succeeded: Vec::new(),
            failures: vec![(Detector::new("H1"), FetchError::Cancelled)],
        };
        assert!(!none_loaded.to_string().contains("loaded"));
        assert_eq!(AppError::from(none_loaded).exit_code(), 4);
    }
}
