//! Error type shared by every fallible operation of the crate.

use thiserror::Error;

/// Errors surfaced by configuration, persistence and file I/O.
///
/// Internal bookkeeping failures (a count going negative, a decrement of an
/// n-gram that was never counted) are bugs and panic instead.
#[derive(Error, Debug)]
pub enum ModelError {
	/// Persisted bytes could not be decoded or describe an impossible state.
	#[error("corrupt model state: {0}")]
	CorruptModelState(String),

	/// A persisted model was built with parameters the caller does not accept.
	#[error("incompatible model configuration: expected {expected}, found {found}")]
	IncompatibleModelConfiguration { expected: String, found: String },

	/// A `ModelConfig` value was rejected.
	#[error("invalid configuration: {0}")]
	InvalidConfiguration(String),

	/// File persistence failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl ModelError {
	pub(crate) fn incompatible(what: &str, expected: impl std::fmt::Display, found: impl std::fmt::Display) -> Self {
		Self::IncompatibleModelConfiguration {
			expected: format!("{what} {expected}"),
			found: format!("{what} {found}"),
		}
	}
}

impl From<postcard::Error> for ModelError {
	fn from(e: postcard::Error) -> Self {
		Self::CorruptModelState(e.to_string())
	}
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn incompatible_message_names_both_sides() {
		let err = ModelError::incompatible("order", 3, 2);
		assert_eq!(err.to_string(), "incompatible model configuration: expected order 3, found order 2");
	}

	#[test]
	fn io_errors_convert() {
		let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
		let err: ModelError = io.into();
		assert!(matches!(err, ModelError::Io(_)));
	}
}
