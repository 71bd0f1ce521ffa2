use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Nominal minimum-interest threshold reported with every prediction.
pub const NEXT_FILE_PROBABILITY_FLOOR: f64 = 1e-4;

/// Parameters of a next-file model.
///
/// `ModelConfig` holds both the **shape** of the model (n-gram `order`) and its
/// **memory bounds** (vocabulary and sequence limits), plus the fixed
/// interpolation weight `lambda`.
///
/// # Invariants
/// - `order >= 1`
/// - `0 < lambda <= 1`
/// - `vocabulary_limit >= 1` and `sequence_limit >= 1`
///
/// A limit of `usize::MAX` means "unbounded".
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ModelConfig {
	/// Maximum n-gram order (context of `order - 1` files).
	order: usize,

	/// Weight of the higher-order estimate at each interpolation step.
	lambda: f64,

	/// Maximum number of distinct live files.
	vocabulary_limit: usize,

	/// Maximum number of file-open events kept in the sliding window.
	sequence_limit: usize,
}

impl ModelConfig {
	pub const DEFAULT_LAMBDA: f64 = 1.0;
	pub const DEFAULT_VOCABULARY_LIMIT: usize = 1000;
	pub const DEFAULT_SEQUENCE_LIMIT: usize = 5000;

	/// Creates a configuration of order `order` with default limits and lambda.
	///
	/// # Errors
	/// Returns an error if `order < 1`.
	pub fn new(order: usize) -> Result<Self> {
		let config = Self {
			order,
			lambda: Self::DEFAULT_LAMBDA,
			vocabulary_limit: Self::DEFAULT_VOCABULARY_LIMIT,
			sequence_limit: Self::DEFAULT_SEQUENCE_LIMIT,
		};
		config.validate()?;
		Ok(config)
	}

	/// Creates a configuration with neither a vocabulary nor a sequence limit.
	pub fn unbounded(order: usize, lambda: f64) -> Result<Self> {
		let config = Self { order, lambda, vocabulary_limit: usize::MAX, sequence_limit: usize::MAX };
		config.validate()?;
		Ok(config)
	}

	/// Builds a configuration from all four parameters at once.
	pub fn with_limits(order: usize, lambda: f64, vocabulary_limit: usize, sequence_limit: usize) -> Result<Self> {
		let config = Self { order, lambda, vocabulary_limit, sequence_limit };
		config.validate()?;
		Ok(config)
	}

	/// Checks every invariant listed on the type.
	pub fn validate(&self) -> Result<()> {
		if self.order < 1 {
			return Err(ModelError::InvalidConfiguration("order must be >= 1".to_owned()));
		}
		Self::check_lambda(self.lambda)?;
		Self::check_limit("vocabulary", self.vocabulary_limit)?;
		Self::check_limit("sequence", self.sequence_limit)?;
		Ok(())
	}

	fn check_lambda(lambda: f64) -> Result<()> {
		if !lambda.is_finite() || lambda <= 0.0 || lambda > 1.0 {
			return Err(ModelError::InvalidConfiguration(format!("lambda must be in (0, 1], got {lambda}")));
		}
		Ok(())
	}

	fn check_limit(name: &str, limit: usize) -> Result<()> {
		if limit < 1 {
			return Err(ModelError::InvalidConfiguration(format!("{name} limit must be >= 1")));
		}
		Ok(())
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn lambda(&self) -> f64 {
		self.lambda
	}

	pub fn vocabulary_limit(&self) -> usize {
		self.vocabulary_limit
	}

	pub fn sequence_limit(&self) -> usize {
		self.sequence_limit
	}

	/// Sets the interpolation weight.
	///
	/// # Errors
	/// Returns an error if the value is outside `(0, 1]`.
	pub fn set_lambda(&mut self, lambda: f64) -> Result<()> {
		Self::check_lambda(lambda)?;
		self.lambda = lambda;
		Ok(())
	}

	/// Sets the maximum number of live files.
	pub fn set_vocabulary_limit(&mut self, limit: usize) -> Result<()> {
		Self::check_limit("vocabulary", limit)?;
		self.vocabulary_limit = limit;
		Ok(())
	}

	/// Sets the length of the sliding event window.
	pub fn set_sequence_limit(&mut self, limit: usize) -> Result<()> {
		Self::check_limit("sequence", limit)?;
		self.sequence_limit = limit;
		Ok(())
	}
}
