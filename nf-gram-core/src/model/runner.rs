use std::collections::HashMap;

use crate::error::Result;

use super::config::ModelConfig;
use super::counter::NGramCounter;
use super::scorer::{InterpolatedScorer, NextFileProbability};
use super::sequence::BoundedEventSequence;
use super::vocabulary::{TokenId, UNKNOWN_TOKEN_ID, Vocabulary};

/// Typed callback through which an editor reports opened files.
pub trait FileOpenListener {
	fn on_file_opened(&mut self, path: &str);
}

/// Lifecycle of a runner, derived from how much history it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerPhase {
	/// Nothing learned yet.
	Empty,
	/// Fewer than `order - 1` events: only lower orders contribute.
	Warming,
	/// The full context is available.
	Steady,
}

/// Online next-file model.
///
/// Owns the vocabulary, the event window and the n-gram counts, and keeps
/// them consistent as file-open events arrive.
///
/// # Responsibilities
/// - Learn one event at a time, evicting old files and old events as the
///   configured bounds require
/// - Score candidate files against the current context without mutating state
/// - Expose enough state for persistence (see [`crate::persistence`])
///
/// # Invariants
/// - Every id in the window is either live in the vocabulary or the unknown sentinel
/// - `counter` always equals the counts recomputed from `sequence`
#[derive(Clone, Debug)]
pub struct NextFileModelRunner {
	pub(crate) config: ModelConfig,
	pub(crate) vocabulary: Vocabulary,
	pub(crate) sequence: BoundedEventSequence,
	pub(crate) counter: NGramCounter,
	/// 1-based position of the most recent event.
	pub(crate) position: u64,
}

impl NextFileModelRunner {
	/// Creates an empty runner.
	///
	/// # Errors
	/// Returns an error if `config` does not validate.
	pub fn new(config: ModelConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			vocabulary: Vocabulary::new(config.vocabulary_limit()),
			sequence: BoundedEventSequence::new(config.sequence_limit()),
			counter: NGramCounter::new(config.order()),
			position: 0,
		})
	}

	/// Learns that `token` was opened right after everything learned so far.
	///
	/// # Behavior
	/// 1. Advances the sequence counter.
	/// 2. Observes the token in the vocabulary. If another file is evicted, its
	///    n-grams are forgotten and its events in the window become unknown.
	/// 3. Appends the id to the window, forgetting the n-grams of the event
	///    that slid out, if any.
	/// 4. Counts the n-grams ending at the new event.
	///
	/// Eviction is resolved before appending so that the recycled id is never
	/// present in the window under two meanings.
	pub fn learn_next_file(&mut self, token: &str) {
		self.position += 1;
		log::trace!("learning '{}' at position {}", token, self.position);

		let observation = self.vocabulary.observe(token, self.position);
		if observation.evicted.is_some() {
			self.forget_id(observation.id);
		}

		if let Some(popped) = self.sequence.append(observation.id) {
			// the new event is last and was never counted with `popped`
			let survivors = self.order().saturating_sub(1).min(self.sequence.len() - 1);
			let mut head = vec![popped];
			head.extend(self.sequence.window(0, survivors).unwrap_or_default());
			self.counter.remove_prefixes(&head);
			log::debug!("window full, dropped event with id {}", popped);
		}

		let tail = self.sequence.trailing(self.order());
		self.counter.add_suffixes(&tail);
	}

	/// Feeds every token of `tokens` to [`Self::learn_next_file`] in order.
	pub fn learn_all<I, S>(&mut self, tokens: I)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		for token in tokens {
			self.learn_next_file(token.as_ref());
		}
	}

	/// Rewrites an evicted id to the unknown sentinel everywhere in the window.
	fn forget_id(&mut self, id: TokenId) {
		if !self.sequence.contains(id) {
			return;
		}
		self.counter.remove_containing(&self.sequence, id);
		let positions = self.sequence.replace_all(id, UNKNOWN_TOKEN_ID);
		for _ in &positions {
			self.counter.add(&[UNKNOWN_TOKEN_ID]);
		}
		log::debug!("{} window events now unknown after eviction of id {}", positions.len(), id);
	}

	/// Context used for scoring: the trailing `order - 1` ids of the window.
	fn context(&self) -> Vec<TokenId> {
		self.sequence.trailing(self.order().saturating_sub(1))
	}

	fn scorer(&self) -> InterpolatedScorer<'_> {
		InterpolatedScorer::new(&self.counter, self.config.lambda())
	}

	/// Smoothed probability that `token` is opened next.
	///
	/// Files that are not live are scored as the unknown sentinel.
	pub fn probability(&self, token: &str) -> f64 {
		let id = self.vocabulary.resolve(token);
		self.scorer().probability(&self.context(), id)
	}

	/// Scores `candidates` together against the current context.
	///
	/// `max_probability` and `relative_probability` are relative to this batch.
	/// Unknown candidates are never an error; they simply score like the
	/// unknown sentinel. Duplicate candidates collapse to one entry.
	pub fn score<S: AsRef<str>>(&self, candidates: &[S]) -> HashMap<String, NextFileProbability> {
		let context = self.context();
		let scorer = self.scorer();
		let probabilities: Vec<(&str, f64)> = candidates
			.iter()
			.map(|candidate| {
				let candidate = candidate.as_ref();
				(candidate, scorer.probability(&context, self.vocabulary.resolve(candidate)))
			})
			.collect();

		let max_probability = probabilities.iter().map(|(_, p)| *p).fold(0.0, f64::max);
		probabilities
			.into_iter()
			.map(|(candidate, p)| (candidate.to_owned(), NextFileProbability::new(p, max_probability)))
			.collect()
	}

	/// Ranks every live file by how likely it is to be opened next.
	///
	/// Returns at most `limit` entries, most probable first; ties are broken by
	/// token so the output is deterministic.
	pub fn predict_next(&self, limit: usize) -> Vec<(String, NextFileProbability)> {
		let tokens = self.vocabulary.live_tokens_by_recency();
		let scores = self.score(&tokens);
		let mut ranked: Vec<(String, NextFileProbability)> = scores.into_iter().collect();
		ranked.sort_by(|a, b| b.1.probability.total_cmp(&a.1.probability).then_with(|| a.0.cmp(&b.0)));
		ranked.truncate(limit);
		ranked
	}

	pub fn phase(&self) -> RunnerPhase {
		match self.sequence.len() {
			0 => RunnerPhase::Empty,
			len if len < self.order().saturating_sub(1) => RunnerPhase::Warming,
			_ => RunnerPhase::Steady,
		}
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	pub fn order(&self) -> usize {
		self.config.order()
	}

	/// Current value of the sequence counter.
	pub fn position(&self) -> u64 {
		self.position
	}

	pub fn sequence_len(&self) -> usize {
		self.sequence.len()
	}

	pub fn vocabulary_len(&self) -> usize {
		self.vocabulary.len()
	}

	pub fn is_live(&self, token: &str) -> bool {
		self.vocabulary.is_live(token)
	}

	/// Live files from least to most recently opened.
	pub fn live_tokens_by_recency(&self) -> Vec<&str> {
		self.vocabulary.live_tokens_by_recency()
	}

	/// Probability of every live file plus the unknown sentinel, in that order.
	///
	/// Mostly useful to check that the model is a distribution.
	pub fn distribution(&self) -> Vec<f64> {
		let context = self.context();
		let scorer = self.scorer();
		self.vocabulary
			.live_ids()
			.chain(std::iter::once(UNKNOWN_TOKEN_ID))
			.map(|id| scorer.probability(&context, id))
			.collect()
	}
}

impl FileOpenListener for NextFileModelRunner {
	fn on_file_opened(&mut self, path: &str) {
		self.learn_next_file(path);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn runner(order: usize, lambda: f64, vocabulary_limit: usize, sequence_limit: usize) -> NextFileModelRunner {
		NextFileModelRunner::new(ModelConfig::with_limits(order, lambda, vocabulary_limit, sequence_limit).unwrap()).unwrap()
	}

	fn assert_consistent(runner: &NextFileModelRunner) {
		let recount = NGramCounter::from_sequence(runner.order(), &runner.sequence);
		assert_eq!(runner.counter.counts(), recount.counts());
		assert_eq!(runner.counter.total(), runner.sequence.len() as u64);
		for id in runner.sequence.iter() {
			assert!(id == UNKNOWN_TOKEN_ID || runner.vocabulary.token_of(id).is_some());
		}
	}

	#[test]
	fn phases() {
		let mut model = runner(3, 1.0, 10, 10);
		assert_eq!(model.phase(), RunnerPhase::Empty);
		model.learn_next_file("a");
		assert_eq!(model.phase(), RunnerPhase::Warming);
		model.learn_next_file("b");
		assert_eq!(model.phase(), RunnerPhase::Steady);
	}

	#[test]
	fn window_slide_keeps_counts_exact() {
		let mut model = runner(3, 0.7, 10, 4);
		for token in ["a", "b", "c", "a", "b", "d", "a", "c", "c", "b"] {
			model.learn_next_file(token);
			assert!(model.sequence_len() <= 4);
			assert_consistent(&model);
		}
	}

	#[test]
	fn window_shorter_than_order() {
		let mut model = runner(3, 0.5, 10, 1);
		model.learn_all(["a", "b", "a", "c"]);
		assert_eq!(model.sequence_len(), 1);
		assert_consistent(&model);
		assert_eq!(model.probability("c"), 1.0);
	}

	#[test]
	fn eviction_turns_window_events_unknown() {
		let mut model = runner(2, 0.5, 2, 100);
		model.learn_all(["a", "b", "a", "c"]);
		assert!(!model.is_live("b"));
		assert_eq!(model.vocabulary_len(), 2);
		assert_consistent(&model);
		assert_eq!(model.counter.count(&[UNKNOWN_TOKEN_ID]), 1);
	}

	#[test]
	fn scoring_does_not_mutate() {
		let mut model = runner(2, 0.5, 10, 10);
		model.learn_all(["a", "b", "a"]);
		let before = model.counter.counts();
		let _ = model.score(&["a", "b", "zzz"]);
		let _ = model.predict_next(5);
		assert_eq!(model.counter.counts(), before);
		assert_eq!(model.position(), 3);
	}

	#[test]
	fn predict_next_ranks_live_files() {
		let mut model = runner(2, 1.0, 10, 100);
		model.learn_all(["a", "b", "a", "b", "a", "c", "a"]);
		let ranked = model.predict_next(2);
		assert_eq!(ranked.len(), 2);
		assert_eq!(ranked[0].0, "b");
		assert!((ranked[0].1.probability - 2.0 / 3.0).abs() < 1e-12);
		assert_eq!(ranked[1].0, "c");
		assert_eq!(ranked[0].1.relative_probability, 1.0);
	}

	#[test]
	fn listener_learns() {
		let mut model = runner(1, 1.0, 10, 10);
		let listener: &mut dyn FileOpenListener = &mut model;
		listener.on_file_opened("src/main.rs");
		assert!(model.is_live("src/main.rs"));
		assert_eq!(model.probability("src/main.rs"), 1.0);
	}
}
