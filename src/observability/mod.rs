//! File-based tracing for labeling sessions.
//!
//! Every session transition runs inside a `tracing` span and emits structured
//! events (saved/ignored counts, advisory conditions, persistence failures).
//! This module installs the subscriber that writes them to disk.
//!
//! # Architecture
//!
//! ```text
//! tracing macros → EnvFilter → fmt layer → RotatingFileWriter → log file
//! ```
//!
//! # Features
//!
//! - **Plain-text Log**: one line per event, no ANSI escapes
//! - **Automatic Rotation**: files rotate at 10MB with 3-backup retention
//! - **Optional**: sessions work the same with no subscriber installed
//!
//! # Configuration
//!
//! Trace level is controlled via:
//! 1. `trace_level` config option
//! 2. Default: `"info"`
//!
//! # Modules
//!
//! - [`init`]: Subscriber setup
//! - [`file_writer`]: Rotating file writer with size-based rotation

pub mod file_writer;
mod init;

pub use file_writer::RotatingFileWriter;
pub use init::init_tracing;
