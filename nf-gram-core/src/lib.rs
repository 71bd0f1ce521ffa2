//! Next-file prediction from file-open history.
//!
//! This crate provides an online, bounded-memory n-gram model over the
//! sequence of files a user opens:
//! - Vocabulary of files bounded by LRU eviction
//! - Sliding window of recent events with exact incremental n-gram counts
//! - Jelinek-Mercer interpolated probabilities for candidate files
//! - A compact binary snapshot with an exact round-trip guarantee

/// Error type and result alias.
pub mod error;

/// Model components and the runner that ties them together.
pub mod model;

/// Snapshot encoding and file persistence.
pub mod persistence;

/// File helpers (history files, output paths, atomic writes).
pub mod io;

pub use error::{ModelError, Result};
pub use model::{FileOpenListener, ModelConfig, NextFileModelRunner, NextFileProbability, RunnerPhase};
