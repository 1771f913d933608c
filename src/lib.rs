//! `gw-quickview` library crate.
//!
//! The binary (`gwq`) is a thin wrapper around this library so that:
//!
//! - the fetch and conditioning pipeline is testable without a terminal or network
//! - the CLI and the TUI share one pipeline implementation

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod io;
pub mod plot;
pub mod report;
pub mod signal;
pub mod tui;
