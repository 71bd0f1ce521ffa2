use serde::{Deserialize, Serialize};

use super::config::NEXT_FILE_PROBABILITY_FLOOR;
use super::counter::NGramCounter;
use super::vocabulary::TokenId;

/// Model output for one candidate file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct NextFileProbability {
	/// Smoothed probability `P_N(candidate | context)`.
	pub probability: f64,
	/// Fixed minimum-interest threshold.
	pub floor: f64,
	/// Highest probability among the candidates scored together.
	pub max_probability: f64,
	/// `probability / floor`.
	pub floor_ratio: f64,
	/// `probability / max_probability`; 1 for the best candidate, including
	/// when every candidate scored 0.
	pub relative_probability: f64,
}

impl NextFileProbability {
	/// Derives the reported fields from a probability and the batch maximum.
	pub fn new(probability: f64, max_probability: f64) -> Self {
		let relative_probability = if max_probability > 0.0 { probability / max_probability } else { 1.0 };
		Self {
			probability,
			floor: NEXT_FILE_PROBABILITY_FLOOR,
			max_probability,
			floor_ratio: probability / NEXT_FILE_PROBABILITY_FLOOR,
			relative_probability,
		}
	}
}

/// Jelinek-Mercer interpolation over the counts of an [`NGramCounter`].
///
/// ```text
/// P_1(w)       = C(w) / |window|
/// P_k(w | c_k) = λ · C(c_k w) / C(c_k) + (1 - λ) · P_{k-1}(w | c_{k-1})
/// ```
///
/// `c_k` is the trailing `k - 1` ids of the context. A level whose context was
/// never followed by anything (`C(c_k) = 0`) is skipped, so the estimate stays
/// a proper distribution over the live ids plus the unknown sentinel while the
/// model warms up.
#[derive(Clone, Copy, Debug)]
pub struct InterpolatedScorer<'a> {
	counter: &'a NGramCounter,
	lambda: f64,
}

impl<'a> InterpolatedScorer<'a> {
	pub fn new(counter: &'a NGramCounter, lambda: f64) -> Self {
		Self { counter, lambda }
	}

	/// Smoothed probability of `id` following `context`.
	///
	/// Only the last `order - 1` ids of `context` are looked at.
	pub fn probability(&self, context: &[TokenId], id: TokenId) -> f64 {
		let total = self.counter.total();
		if total == 0 {
			return 0.0;
		}

		let mut probability = self.counter.count(&[id]) as f64 / total as f64;
		let mut gram = Vec::with_capacity(self.counter.order());
		for k in 2..=self.counter.order() {
			if context.len() < k - 1 {
				break;
			}
			let ctx = &context[context.len() - (k - 1)..];
			let marginal = self.counter.successors(ctx);
			if marginal == 0 {
				// longer contexts ending the same way cannot have been seen either
				break;
			}
			gram.clear();
			gram.extend_from_slice(ctx);
			gram.push(id);
			let mle = self.counter.count(&gram) as f64 / marginal as f64;
			probability = self.lambda * mle + (1.0 - self.lambda) * probability;
		}
		probability
	}
}
