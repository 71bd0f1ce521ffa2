use std::collections::VecDeque;

use super::vocabulary::TokenId;

/// Sliding window over the most recent file-open events.
///
/// This is the corpus the n-gram counts are computed over. Its bound is
/// independent of the vocabulary limit.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundedEventSequence {
	events: VecDeque<TokenId>,
	limit: usize,
}

impl BoundedEventSequence {
	pub fn new(limit: usize) -> Self {
		Self { events: VecDeque::new(), limit }
	}

	/// Pushes `id` to the back and returns the id dropped from the front, if
	/// the window overflowed.
	pub fn append(&mut self, id: TokenId) -> Option<TokenId> {
		self.events.push_back(id);
		if self.events.len() > self.limit {
			return self.events.pop_front();
		}
		None
	}

	/// Rewrites every occurrence of `from` to `to` and returns the positions touched.
	pub fn replace_all(&mut self, from: TokenId, to: TokenId) -> Vec<usize> {
		let mut positions = Vec::new();
		for (i, event) in self.events.iter_mut().enumerate() {
			if *event == from {
				*event = to;
				positions.push(i);
			}
		}
		positions
	}

	/// The `len` ids starting at `start`, or `None` past the end.
	pub fn window(&self, start: usize, len: usize) -> Option<Vec<TokenId>> {
		if start + len > self.events.len() {
			return None;
		}
		Some(self.events.range(start..start + len).copied().collect())
	}

	/// The last `n` ids (fewer if the window is shorter), oldest first.
	pub fn trailing(&self, n: usize) -> Vec<TokenId> {
		let start = self.events.len().saturating_sub(n);
		self.events.range(start..).copied().collect()
	}

	pub fn contains(&self, id: TokenId) -> bool {
		self.events.contains(&id)
	}

	pub fn iter(&self) -> impl Iterator<Item = TokenId> + '_ {
		self.events.iter().copied()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn limit(&self) -> usize {
		self.limit
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pops_front_once_full() {
		let mut sequence = BoundedEventSequence::new(3);
		assert_eq!(sequence.append(1), None);
		assert_eq!(sequence.append(2), None);
		assert_eq!(sequence.append(3), None);
		assert_eq!(sequence.append(4), Some(1));
		assert_eq!(sequence.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
		assert_eq!(sequence.len(), 3);
	}

	#[test]
	fn windows_and_trailing() {
		let mut sequence = BoundedEventSequence::new(10);
		for id in [5, 6, 7, 8] {
			sequence.append(id);
		}
		assert_eq!(sequence.window(1, 2), Some(vec![6, 7]));
		assert_eq!(sequence.window(3, 2), None);
		assert_eq!(sequence.trailing(2), vec![7, 8]);
		assert_eq!(sequence.trailing(9), vec![5, 6, 7, 8]);
	}

	#[test]
	fn replace_reports_positions() {
		let mut sequence = BoundedEventSequence::new(10);
		for id in [1, 2, 1, 3] {
			sequence.append(id);
		}
		assert_eq!(sequence.replace_all(1, 0), vec![0, 2]);
		assert!(!sequence.contains(1));
		assert_eq!(sequence.iter().collect::<Vec<_>>(), vec![0, 2, 0, 3]);
	}
}
