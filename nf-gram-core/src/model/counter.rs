use std::collections::{BTreeMap, HashMap};

use crate::error::{ModelError, Result};

use super::sequence::BoundedEventSequence;
use super::vocabulary::{TokenId, UNKNOWN_TOKEN_ID};

const ROOT: usize = 0;

/// One node of the count trie.
///
/// The path from the root to a node spells an n-gram `w1..wk`.
/// `count` is the number of times that exact n-gram occurs in the window and
/// `successors` is the sum of the children's counts, i.e. how many times
/// `w1..wk` was followed by something.
#[derive(Clone, Debug)]
struct CountNode {
	key: TokenId,
	parent: usize,
	count: u64,
	successors: u64,
	children: HashMap<TokenId, usize>,
}

impl CountNode {
	fn new(key: TokenId, parent: usize) -> Self {
		Self { key, parent, count: 0, successors: 0, children: HashMap::new() }
	}

	fn is_unused(&self) -> bool {
		self.count == 0 && self.successors == 0 && self.children.is_empty()
	}
}

/// Exact counts of every n-gram of order `1..=order` in the event window.
///
/// Stored as a trie laid out in an arena (`Vec` of nodes addressed by index)
/// with a free list, so nodes whose counts drop to zero are recycled.
///
/// # Invariants
/// - Unigrams are counted for every id, [`UNKNOWN_TOKEN_ID`] included
/// - N-grams of order >= 2 containing [`UNKNOWN_TOKEN_ID`] are never counted
/// - Every stored count is strictly positive, or the node has children
/// - The root's `successors` equals the number of counted unigrams
#[derive(Clone, Debug)]
pub struct NGramCounter {
	order: usize,
	nodes: Vec<CountNode>,
	free: Vec<usize>,
}

impl NGramCounter {
	pub fn new(order: usize) -> Self {
		Self { order, nodes: vec![CountNode::new(UNKNOWN_TOKEN_ID, ROOT)], free: Vec::new() }
	}

	/// Recounts a whole window from scratch.
	pub fn from_sequence(order: usize, sequence: &BoundedEventSequence) -> Self {
		let mut counter = Self::new(order);
		let events: Vec<TokenId> = sequence.iter().collect();
		for end in 1..=events.len() {
			let start = end.saturating_sub(order);
			counter.add_suffixes(&events[start..end]);
		}
		counter
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Whether `gram` takes part in the counts at all.
	pub fn is_counted(gram: &[TokenId]) -> bool {
		gram.len() == 1 || !gram.contains(&UNKNOWN_TOKEN_ID)
	}

	/// Number of unigrams, which is the window length.
	pub fn total(&self) -> u64 {
		self.nodes[ROOT].successors
	}

	/// Joint count `C(gram)`.
	pub fn count(&self, gram: &[TokenId]) -> u64 {
		if gram.is_empty() {
			return 0;
		}
		self.find(gram).map_or(0, |node| self.nodes[node].count)
	}

	/// Marginal count `C(context)`: how often `context` was followed by any token.
	pub fn successors(&self, context: &[TokenId]) -> u64 {
		self.find(context).map_or(0, |node| self.nodes[node].successors)
	}

	fn find(&self, gram: &[TokenId]) -> Option<usize> {
		let mut node = ROOT;
		for id in gram {
			node = *self.nodes[node].children.get(id)?;
		}
		Some(node)
	}

	fn find_or_create(&mut self, gram: &[TokenId]) -> usize {
		let mut node = ROOT;
		for &id in gram {
			node = match self.nodes[node].children.get(&id) {
				Some(&child) => child,
				None => {
					let child = self.alloc(CountNode::new(id, node));
					self.nodes[node].children.insert(id, child);
					child
				}
			};
		}
		node
	}

	fn alloc(&mut self, node: CountNode) -> usize {
		match self.free.pop() {
			Some(index) => {
				self.nodes[index] = node;
				index
			}
			None => {
				self.nodes.push(node);
				self.nodes.len() - 1
			}
		}
	}

	/// Counts one occurrence of `gram`. Uncounted grams are ignored.
	pub fn add(&mut self, gram: &[TokenId]) {
		if gram.is_empty() || gram.len() > self.order || !Self::is_counted(gram) {
			return;
		}
		let node = self.find_or_create(gram);
		self.nodes[node].count += 1;
		let parent = self.nodes[node].parent;
		self.nodes[parent].successors += 1;
	}

	/// Forgets one occurrence of `gram`.
	///
	/// # Panics
	/// Panics if `gram` is counted but currently has a zero count: the window
	/// and the counts disagree, which is a bookkeeping bug.
	pub fn remove(&mut self, gram: &[TokenId]) {
		if gram.is_empty() || gram.len() > self.order || !Self::is_counted(gram) {
			return;
		}
		let node = match self.find(gram) {
			Some(node) if self.nodes[node].count > 0 => node,
			_ => panic!("n-gram {gram:?} removed more often than it was added"),
		};
		self.nodes[node].count -= 1;
		let parent = self.nodes[node].parent;
		self.nodes[parent].successors -= 1;
		self.prune(node);
	}

	/// Releases `node` and its now empty ancestors.
	fn prune(&mut self, mut node: usize) {
		while node != ROOT && self.nodes[node].is_unused() {
			let parent = self.nodes[node].parent;
			let key = self.nodes[node].key;
			self.nodes[parent].children.remove(&key);
			self.free.push(node);
			node = parent;
		}
	}

	/// Counts every n-gram ending at the last id of `tail`.
	///
	/// `tail` holds the trailing `order` ids of the window (fewer early on).
	pub fn add_suffixes(&mut self, tail: &[TokenId]) {
		for k in 1..=tail.len().min(self.order) {
			self.add(&tail[tail.len() - k..]);
		}
	}

	/// Forgets every n-gram starting at the first id of `head`.
	///
	/// `head` holds the id leaving the window followed by its surviving successors.
	pub fn remove_prefixes(&mut self, head: &[TokenId]) {
		for k in 1..=head.len().min(self.order) {
			self.remove(&head[..k]);
		}
	}

	/// Forgets every counted n-gram of `sequence` that contains `id`.
	pub fn remove_containing(&mut self, sequence: &BoundedEventSequence, id: TokenId) {
		let events: Vec<TokenId> = sequence.iter().collect();
		for start in 0..events.len() {
			let end = (start + self.order).min(events.len());
			// grams starting at `start` contain `id` from its first occurrence on
			let Some(first) = events[start..end].iter().position(|&event| event == id) else {
				continue;
			};
			for len in first + 1..=end - start {
				self.remove(&events[start..start + len]);
			}
		}
	}

	/// Every stored n-gram with its positive count, in lexicographic order.
	pub fn counts(&self) -> BTreeMap<Vec<TokenId>, u64> {
		let mut counts = BTreeMap::new();
		let mut stack: Vec<(usize, Vec<TokenId>)> = vec![(ROOT, Vec::new())];
		while let Some((node, path)) = stack.pop() {
			for (&id, &child) in &self.nodes[node].children {
				let mut gram = path.clone();
				gram.push(id);
				if self.nodes[child].count > 0 {
					counts.insert(gram.clone(), self.nodes[child].count);
				}
				stack.push((child, gram));
			}
		}
		counts
	}

	/// Rebuilds a counter from persisted `(gram, count)` pairs.
	///
	/// # Errors
	/// Returns `CorruptModelState` for empty, too long, zero-count or uncounted
	/// grams, for duplicates, and for counts whose sums overflow.
	pub(crate) fn from_counts(order: usize, counts: Vec<(Vec<TokenId>, u64)>) -> Result<Self> {
		let mut counter = Self::new(order);
		for (gram, count) in counts {
			if gram.is_empty() || gram.len() > order || count == 0 || !Self::is_counted(&gram) {
				return Err(ModelError::CorruptModelState(format!("invalid n-gram count {gram:?} = {count}")));
			}
			if counter.count(&gram) != 0 {
				return Err(ModelError::CorruptModelState(format!("duplicate n-gram {gram:?}")));
			}
			let node = counter.find_or_create(&gram);
			let parent = counter.nodes[node].parent;
			counter.nodes[parent].successors = counter.nodes[parent]
				.successors
				.checked_add(count)
				.ok_or_else(|| ModelError::CorruptModelState(format!("counts following {:?} overflow", &gram[..gram.len() - 1])))?;
			counter.nodes[node].count = count;
		}
		Ok(counter)
	}

	/// Number of arena slots holding live nodes, root included.
	pub fn node_count(&self) -> usize {
		self.nodes.len() - self.free.len()
	}
}
