//! Binary snapshot of a [`NextFileModelRunner`].
//!
//! Layout: a `postcard` varint format version, followed by the `postcard`
//! encoding of [`ModelSnapshot`]. Nothing may follow the snapshot.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::io;
use crate::model::config::ModelConfig;
use crate::model::counter::NGramCounter;
use crate::model::runner::NextFileModelRunner;
use crate::model::sequence::BoundedEventSequence;
use crate::model::vocabulary::{TokenId, UNKNOWN_TOKEN_ID, Vocabulary, VocabularyEntry};

/// Version written by [`save`]; the only one [`load`] accepts.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Debug)]
struct ModelSnapshot {
	order: usize,
	lambda: f64,
	vocabulary_limit: usize,
	sequence_limit: usize,
	position: u64,
	vocabulary: Vec<VocabularyEntry>,
	sequence: Vec<TokenId>,
	counts: Vec<(Vec<TokenId>, u64)>,
}

impl ModelSnapshot {
	fn capture(runner: &NextFileModelRunner) -> Self {
		let config = runner.config();
		Self {
			order: config.order(),
			lambda: config.lambda(),
			vocabulary_limit: config.vocabulary_limit(),
			sequence_limit: config.sequence_limit(),
			position: runner.position,
			vocabulary: runner.vocabulary.entries(),
			sequence: runner.sequence.iter().collect(),
			counts: runner.counter.counts().into_iter().collect(),
		}
	}

	/// Rebuilds the runner, checking every cross-structure invariant.
	fn restore(self) -> Result<NextFileModelRunner> {
		let config = ModelConfig::with_limits(self.order, self.lambda, self.vocabulary_limit, self.sequence_limit)
			.map_err(|e| ModelError::CorruptModelState(e.to_string()))?;

		let vocabulary = Vocabulary::from_entries(config.vocabulary_limit(), self.vocabulary)?;
		if let Some(last_seen) = vocabulary.max_last_seen() {
			if last_seen > self.position {
				return Err(ModelError::CorruptModelState(format!(
					"token last seen at {last_seen} after the sequence counter {}",
					self.position
				)));
			}
		}

		if self.sequence.len() > config.sequence_limit() || self.sequence.len() as u64 > self.position {
			return Err(ModelError::CorruptModelState(format!("impossible window length {}", self.sequence.len())));
		}
		let mut sequence = BoundedEventSequence::new(config.sequence_limit());
		for id in self.sequence {
			if id != UNKNOWN_TOKEN_ID && vocabulary.token_of(id).is_none() {
				return Err(ModelError::CorruptModelState(format!("window refers to unknown id {id}")));
			}
			sequence.append(id);
		}

		let counter = NGramCounter::from_counts(config.order(), self.counts)?;
		if counter.counts() != NGramCounter::from_sequence(config.order(), &sequence).counts() {
			return Err(ModelError::CorruptModelState("n-gram counts do not match the window".to_owned()));
		}

		Ok(NextFileModelRunner { config, vocabulary, sequence, counter, position: self.position })
	}
}

/// Serializes the whole state of `runner`.
pub fn save(runner: &NextFileModelRunner) -> Result<Vec<u8>> {
	let mut bytes = postcard::to_stdvec(&FORMAT_VERSION)?;
	bytes.extend(postcard::to_stdvec(&ModelSnapshot::capture(runner))?);
	Ok(bytes)
}

fn decode(bytes: &[u8]) -> Result<ModelSnapshot> {
	let (version, rest) = postcard::take_from_bytes::<u32>(bytes)?;
	if version != FORMAT_VERSION {
		return Err(ModelError::incompatible("format version", FORMAT_VERSION, version));
	}
	let (snapshot, rest) = postcard::take_from_bytes::<ModelSnapshot>(rest)?;
	if !rest.is_empty() {
		return Err(ModelError::CorruptModelState(format!("{} trailing bytes", rest.len())));
	}
	Ok(snapshot)
}

/// Rebuilds a runner from bytes produced by [`save`].
///
/// # Errors
/// - `IncompatibleModelConfiguration` if the blob has another format version
///   or another n-gram order than `order`
/// - `CorruptModelState` if the bytes cannot be decoded or describe an
///   inconsistent model
pub fn load(bytes: &[u8], order: usize) -> Result<NextFileModelRunner> {
	let snapshot = decode(bytes).inspect_err(|e| log::warn!("rejecting persisted model: {e}"))?;
	if snapshot.order != order {
		let err = ModelError::incompatible("order", order, snapshot.order);
		log::warn!("rejecting persisted model: {err}");
		return Err(err);
	}
	let runner = snapshot.restore().inspect_err(|e| log::warn!("rejecting persisted model: {e}"))?;
	log::info!(
		"loaded model: order {}, {} files, {} events",
		runner.order(),
		runner.vocabulary_len(),
		runner.sequence_len()
	);
	Ok(runner)
}

/// Like [`load`], but every parameter of `config` must match the blob.
pub fn load_with_config(bytes: &[u8], config: &ModelConfig) -> Result<NextFileModelRunner> {
	let runner = load(bytes, config.order())?;
	let found = runner.config();
	if found.lambda().to_bits() != config.lambda().to_bits() {
		return Err(ModelError::incompatible("lambda", config.lambda(), found.lambda()));
	}
	if found.vocabulary_limit() != config.vocabulary_limit() {
		return Err(ModelError::incompatible("vocabulary limit", config.vocabulary_limit(), found.vocabulary_limit()));
	}
	if found.sequence_limit() != config.sequence_limit() {
		return Err(ModelError::incompatible("sequence limit", config.sequence_limit(), found.sequence_limit()));
	}
	Ok(runner)
}

/// Writes `runner` to `path`, replacing any previous file atomically.
pub fn save_to_path<P: AsRef<Path>>(runner: &NextFileModelRunner, path: P) -> Result<()> {
	let bytes = save(runner)?;
	io::write_atomic(&path, &bytes)?;
	log::info!("saved model ({} bytes) to {}", bytes.len(), path.as_ref().display());
	Ok(())
}

/// Reads a model written by [`save_to_path`].
pub fn load_from_path<P: AsRef<Path>>(path: P, order: usize) -> Result<NextFileModelRunner> {
	let bytes = std::fs::read(path)?;
	load(&bytes, order)
}

impl NextFileModelRunner {
	/// See [`save`].
	pub fn save(&self) -> Result<Vec<u8>> {
		save(self)
	}

	/// See [`load`].
	pub fn load(bytes: &[u8], order: usize) -> Result<Self> {
		load(bytes, order)
	}
}
