use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Integer handle of a live file inside the n-gram structures.
pub type TokenId = u32;

/// Reserved id standing for every file that is not (or no longer) live.
///
/// It is never assigned to a real token and never evicted.
pub const UNKNOWN_TOKEN_ID: TokenId = 0;

/// LRU ordering key: last position first, then the insertion stamp for ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct RecencyKey {
	last_seen: u64,
	inserted: u64,
}

/// Persisted form of one live token.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct VocabularyEntry {
	pub(crate) token: String,
	pub(crate) id: TokenId,
	pub(crate) last_seen: u64,
	pub(crate) inserted: u64,
}

/// Outcome of [`Vocabulary::observe`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
	/// Id now bound to the observed token.
	pub id: TokenId,
	/// Token that had to leave the vocabulary to make room. Its id is `id`.
	pub evicted: Option<String>,
}

/// Bijective token <-> id mapping bounded by an LRU policy.
///
/// The vocabulary doubles as the recency tracker: every live token carries
/// the 1-based position at which it was last observed, and the token with the
/// smallest position is the eviction candidate.
///
/// # Invariants
/// - `token_to_id`, `id_to_token` and `recency` hold exactly the same live set
/// - `len() <= limit`
/// - live ids are exactly `1..=len()`: evictions hand the freed id straight
///   to the newcomer, so ids never have gaps
#[derive(Clone, Debug)]
pub struct Vocabulary {
	limit: usize,
	token_to_id: HashMap<String, TokenId>,
	id_to_token: HashMap<TokenId, String>,
	recency: HashMap<TokenId, RecencyKey>,
	lru: BTreeMap<RecencyKey, TokenId>,
	next_id: TokenId,
	insertions: u64,
}

impl Vocabulary {
	pub fn new(limit: usize) -> Self {
		Self {
			limit,
			token_to_id: HashMap::new(),
			id_to_token: HashMap::new(),
			recency: HashMap::new(),
			lru: BTreeMap::new(),
			next_id: UNKNOWN_TOKEN_ID + 1,
			insertions: 0,
		}
	}

	/// Records that `token` was seen at `position` and returns its id.
	///
	/// - A live token keeps its id; only its recency is refreshed.
	/// - A new token takes the next id while there is room.
	/// - Otherwise the least recently seen token is evicted and the new token
	///   inherits its id. The caller is responsible for scrubbing the evicted
	///   id out of anything still referring to it.
	pub fn observe(&mut self, token: &str, position: u64) -> Observation {
		if let Some(&id) = self.token_to_id.get(token) {
			self.touch(id, position);
			return Observation { id, evicted: None };
		}

		let mut evicted = None;
		let id = if self.token_to_id.len() >= self.limit {
			let (id, old_token) = self.evict_oldest();
			evicted = Some(old_token);
			id
		} else {
			self.allocate_id()
		};

		let key = RecencyKey { last_seen: position, inserted: self.insertions };
		self.insertions += 1;
		self.token_to_id.insert(token.to_owned(), id);
		self.id_to_token.insert(id, token.to_owned());
		self.recency.insert(id, key);
		self.lru.insert(key, id);

		Observation { id, evicted }
	}

	fn touch(&mut self, id: TokenId, position: u64) {
		if let Some(key) = self.recency.get_mut(&id) {
			self.lru.remove(key);
			key.last_seen = position;
			self.lru.insert(*key, id);
		}
	}

	fn allocate_id(&mut self) -> TokenId {
		let id = self.next_id;
		self.next_id += 1;
		id
	}

	/// Removes the least recently seen token and returns its freed id.
	fn evict_oldest(&mut self) -> (TokenId, String) {
		let (key, id) = self.lru.pop_first().expect("vocabulary at its limit has at least one live token");
		self.recency.remove(&id);
		let token = self.id_to_token.remove(&id).expect("recency entry without a token");
		self.token_to_id.remove(&token);
		log::debug!("evicting '{}' (id {}, last seen at {})", token, id, key.last_seen);
		(id, token)
	}

	/// Id of a live token, if any.
	pub fn id_of(&self, token: &str) -> Option<TokenId> {
		self.token_to_id.get(token).copied()
	}

	/// Id used when scoring: the live id, or [`UNKNOWN_TOKEN_ID`].
	pub fn resolve(&self, token: &str) -> TokenId {
		self.id_of(token).unwrap_or(UNKNOWN_TOKEN_ID)
	}

	pub fn token_of(&self, id: TokenId) -> Option<&str> {
		self.id_to_token.get(&id).map(String::as_str)
	}

	pub fn is_live(&self, token: &str) -> bool {
		self.token_to_id.contains_key(token)
	}

	pub fn len(&self) -> usize {
		self.token_to_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.token_to_id.is_empty()
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Position at which a live token was last observed.
	pub fn last_seen(&self, token: &str) -> Option<u64> {
		let id = self.id_of(token)?;
		self.recency.get(&id).map(|key| key.last_seen)
	}

	/// Live tokens from least to most recently seen.
	pub fn live_tokens_by_recency(&self) -> Vec<&str> {
		self.lru.values().filter_map(|id| self.token_of(*id)).collect()
	}

	/// Live ids in ascending order.
	pub fn live_ids(&self) -> impl Iterator<Item = TokenId> + '_ {
		let ids: BTreeSet<TokenId> = self.id_to_token.keys().copied().collect();
		ids.into_iter()
	}

	pub(crate) fn entries(&self) -> Vec<VocabularyEntry> {
		self.lru
			.iter()
			.filter_map(|(key, id)| {
				Some(VocabularyEntry {
					token: self.id_to_token.get(id)?.clone(),
					id: *id,
					last_seen: key.last_seen,
					inserted: key.inserted,
				})
			})
			.collect()
	}

	/// Rebuilds a vocabulary from persisted entries.
	///
	/// # Errors
	/// Returns `CorruptModelState` on duplicate tokens, ids or recency keys, on
	/// ids outside `1..=entries.len()`, on an insertion stamp that cannot be
	/// followed, or when the entries exceed `limit`.
	pub(crate) fn from_entries(limit: usize, entries: Vec<VocabularyEntry>) -> Result<Self> {
		if entries.len() > limit {
			return Err(ModelError::CorruptModelState(format!(
				"{} live tokens exceed the vocabulary limit {}",
				entries.len(),
				limit
			)));
		}

		let live = entries.len();
		let mut vocabulary = Self::new(limit);
		for entry in entries {
			if entry.id == UNKNOWN_TOKEN_ID {
				return Err(ModelError::CorruptModelState(format!("token '{}' uses the reserved id", entry.token)));
			}
			if entry.id as usize > live {
				return Err(ModelError::CorruptModelState(format!(
					"token '{}' has id {} but only {} tokens are live",
					entry.token, entry.id, live
				)));
			}
			if vocabulary.token_to_id.contains_key(&entry.token) || vocabulary.id_to_token.contains_key(&entry.id) {
				return Err(ModelError::CorruptModelState(format!("duplicate vocabulary entry '{}' ({})", entry.token, entry.id)));
			}
			let key = RecencyKey { last_seen: entry.last_seen, inserted: entry.inserted };
			if vocabulary.lru.contains_key(&key) {
				return Err(ModelError::CorruptModelState(format!("duplicate recency key for '{}'", entry.token)));
			}
			let next_stamp = entry.inserted.checked_add(1).ok_or_else(|| {
				ModelError::CorruptModelState(format!("insertion stamp of '{}' overflows", entry.token))
			})?;
			vocabulary.insertions = vocabulary.insertions.max(next_stamp);
			vocabulary.token_to_id.insert(entry.token.clone(), entry.id);
			vocabulary.id_to_token.insert(entry.id, entry.token);
			vocabulary.recency.insert(entry.id, key);
			vocabulary.lru.insert(key, entry.id);
		}

		// unique ids within 1..=live leave no gaps
		vocabulary.next_id = UNKNOWN_TOKEN_ID + vocabulary.id_to_token.len() as TokenId + 1;
		Ok(vocabulary)
	}

	/// Largest `last_seen` among live tokens.
	pub(crate) fn max_last_seen(&self) -> Option<u64> {
		self.lru.keys().next_back().map(|key| key.last_seen)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn observe_all(vocabulary: &mut Vocabulary, tokens: &[&str]) -> Vec<Observation> {
		tokens.iter().enumerate().map(|(i, t)| vocabulary.observe(t, i as u64 + 1)).collect()
	}

	#[test]
	fn ids_are_stable_while_live() {
		let mut vocabulary = Vocabulary::new(10);
		let observations = observe_all(&mut vocabulary, &["a", "b", "a", "c", "b"]);
		let ids: Vec<TokenId> = observations.iter().map(|o| o.id).collect();
		assert_eq!(ids, vec![1, 2, 1, 3, 2]);
		assert!(observations.iter().all(|o| o.evicted.is_none()));
		assert_eq!(vocabulary.len(), 3);
	}

	#[test]
	fn evicts_least_recently_seen_and_reuses_its_id() {
		let mut vocabulary = Vocabulary::new(2);
		observe_all(&mut vocabulary, &["a", "b", "a"]);
		let observation = vocabulary.observe("c", 4);
		assert_eq!(observation.evicted.as_deref(), Some("b"));
		assert_eq!(observation.id, 2);
		assert!(!vocabulary.is_live("b"));
		assert_eq!(vocabulary.live_tokens_by_recency(), vec!["a", "c"]);
	}

	#[test]
	fn recency_is_refreshed_on_reuse() {
		let mut vocabulary = Vocabulary::new(3);
		observe_all(&mut vocabulary, &["a", "b", "c", "a"]);
		assert_eq!(vocabulary.live_tokens_by_recency(), vec!["b", "c", "a"]);
		assert_eq!(vocabulary.last_seen("a"), Some(4));
		assert_eq!(vocabulary.last_seen("z"), None);
	}

	#[test]
	fn unknown_tokens_resolve_to_sentinel() {
		let mut vocabulary = Vocabulary::new(1);
		vocabulary.observe("a", 1);
		assert_eq!(vocabulary.resolve("a"), 1);
		assert_eq!(vocabulary.resolve("nope"), UNKNOWN_TOKEN_ID);
	}

	#[test]
	fn rebuilds_from_entries() {
		let mut vocabulary = Vocabulary::new(3);
		observe_all(&mut vocabulary, &["a", "b", "c", "d", "b"]);
		let restored = Vocabulary::from_entries(3, vocabulary.entries()).unwrap();
		assert_eq!(restored.live_tokens_by_recency(), vocabulary.live_tokens_by_recency());
		assert_eq!(restored.id_of("d"), vocabulary.id_of("d"));

		let mut original = vocabulary.clone();
		let mut copy = restored;
		assert_eq!(original.observe("e", 6), copy.observe("e", 6));
		assert_eq!(original.observe("f", 7), copy.observe("f", 7));
	}

	#[test]
	fn rejects_duplicate_and_reserved_entries() {
		let entry = |token: &str, id| VocabularyEntry { token: token.to_owned(), id, last_seen: id as u64, inserted: id as u64 };
		assert!(Vocabulary::from_entries(5, vec![entry("a", 1), entry("a", 2)]).is_err());
		assert!(Vocabulary::from_entries(5, vec![entry("a", 1), entry("b", 1)]).is_err());
		assert!(Vocabulary::from_entries(5, vec![entry("a", UNKNOWN_TOKEN_ID)]).is_err());
		assert!(Vocabulary::from_entries(1, vec![entry("a", 1), entry("b", 2)]).is_err());
	}

	#[test]
	fn rejects_ids_beyond_the_live_count() {
		let entry = |token: &str, id| VocabularyEntry { token: token.to_owned(), id, last_seen: id as u64, inserted: id as u64 };
		assert!(Vocabulary::from_entries(5, vec![entry("a", 1), entry("c", 3)]).is_err());
		assert!(Vocabulary::from_entries(5, vec![entry("a", TokenId::MAX)]).is_err());
		let mut vocabulary = Vocabulary::from_entries(5, vec![entry("b", 2), entry("a", 1)]).unwrap();
		assert_eq!(vocabulary.observe("x", 10).id, 3);
	}

	#[test]
	fn rejects_overflowing_insertion_stamp() {
		let entry = VocabularyEntry { token: "a".to_owned(), id: 1, last_seen: 1, inserted: u64::MAX };
		assert!(matches!(Vocabulary::from_entries(5, vec![entry]), Err(ModelError::CorruptModelState(_))));
	}
}
