use nf_gram_core::persistence::{load, load_from_path, save, save_to_path};
use nf_gram_core::{ModelConfig, NextFileModelRunner};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOLERANCE: f64 = 1e-10;

fn random_history(rng: &mut StdRng, alphabet: usize, len: usize) -> Vec<String> {
	(0..len).map(|_| format!("src/file_{}.rs", rng.random_range(0..alphabet))).collect()
}

fn configs() -> Vec<ModelConfig> {
	vec![
		ModelConfig::with_limits(1, 1.0, 4, 10).unwrap(),
		ModelConfig::with_limits(2, 1.0, 3, 7).unwrap(),
		ModelConfig::with_limits(2, 0.4, 5, 50).unwrap(),
		ModelConfig::with_limits(3, 0.9, 6, 12).unwrap(),
		ModelConfig::with_limits(3, 0.15, 20, 3).unwrap(),
		ModelConfig::with_limits(5, 0.6, 4, 30).unwrap(),
		ModelConfig::unbounded(3, 0.5).unwrap(),
	]
}

#[test]
fn probability_mass_and_bounds_hold_after_every_event() {
	let mut rng = StdRng::seed_from_u64(0x5eed);
	for config in configs() {
		let mut runner = NextFileModelRunner::new(config).unwrap();
		for token in random_history(&mut rng, 9, 200) {
			runner.learn_next_file(&token);
			assert!(runner.vocabulary_len() <= config.vocabulary_limit());
			assert!(runner.sequence_len() <= config.sequence_limit());
			let sum: f64 = runner.distribution().iter().sum();
			assert!((sum - 1.0).abs() < TOLERANCE, "{config:?}: mass {sum}");
		}
	}
}

#[test]
fn reloaded_model_scores_identically_while_learning_continues() {
	let mut rng = StdRng::seed_from_u64(42);
	for config in configs() {
		let mut original = NextFileModelRunner::new(config).unwrap();
		let history = random_history(&mut rng, 8, 60);
		original.learn_all(&history);

		let mut reloaded = load(&save(&original).unwrap(), config.order()).unwrap();
		let mut seen: Vec<String> = history.clone();
		seen.push("never/opened.rs".to_owned());

		let future = random_history(&mut rng, 11, 60);
		for token in std::iter::once(None).chain(future.iter().map(Some)) {
			if let Some(token) = token {
				original.learn_next_file(token);
				reloaded.learn_next_file(token);
				seen.push(token.clone());
			}
			let expected = original.score(&seen);
			let actual = reloaded.score(&seen);
			for (token, p) in &expected {
				assert!((actual[token].probability - p.probability).abs() < TOLERANCE, "{config:?}: {token}");
			}
			assert_eq!(original.live_tokens_by_recency(), reloaded.live_tokens_by_recency());
		}
		assert_eq!(save(&original).unwrap(), save(&reloaded).unwrap());
	}
}

#[test]
fn file_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("models").join("next_file.bin");

	let config = ModelConfig::with_limits(3, 0.7, 16, 64).unwrap();
	let mut runner = NextFileModelRunner::new(config).unwrap();
	let mut rng = StdRng::seed_from_u64(7);
	runner.learn_all(random_history(&mut rng, 20, 100));

	save_to_path(&runner, &path).unwrap();
	let restored = load_from_path(&path, 3).unwrap();
	assert_eq!(restored.predict_next(5), runner.predict_next(5));
	assert!(load_from_path(dir.path().join("missing.bin"), 3).is_err());
}
