//! Top-level module for the next-file model.
//!
//! The model is assembled from leaves up:
//! - Token <-> id mapping with LRU eviction (`Vocabulary`)
//! - Sliding window of recent events (`BoundedEventSequence`)
//! - Exact n-gram counts over that window (`NGramCounter`)
//! - Jelinek-Mercer scoring (`InterpolatedScorer`)
//! - The orchestrating state machine (`NextFileModelRunner`)

/// Model parameters and their validation.
pub mod config;

/// Arena trie of n-gram counts.
///
/// Supports exact increment on append and decrement on eviction.
pub mod counter;

/// Online learning and scoring entry point.
pub mod runner;

/// Interpolated probabilities and the per-candidate prediction record.
pub mod scorer;

/// Bounded window of file-open events.
pub mod sequence;

/// Bounded token vocabulary doubling as the recency tracker.
pub mod vocabulary;

pub use config::{ModelConfig, NEXT_FILE_PROBABILITY_FLOOR};
pub use runner::{FileOpenListener, NextFileModelRunner, RunnerPhase};
pub use scorer::NextFileProbability;
