use serde::{Deserialize, Serialize};

use super::token_mode::TokenMode;

/// Default cap on the number of tokens a single reply may contain.
pub const DEFAULT_RESPONSE_LIMIT: usize = 1000;

/// Maximum number of preceding tokens used as context.
///
/// Serialized as a plain number, with `null` standing for `Unbounded`.
/// A count of `0` (from a form field or an older export) also reads as
/// `Unbounded`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum BacktrackLimit {
	/// At most this many tokens (always >= 1).
	Limited(usize),
	/// As many tokens as are available.
	#[default]
	Unbounded,
}

impl BacktrackLimit {
	/// Builds a limit from a raw count, `0` meaning unbounded.
	pub fn from_count(count: usize) -> Self {
		if count == 0 {
			BacktrackLimit::Unbounded
		} else {
			BacktrackLimit::Limited(count)
		}
	}

	/// The limit as a count, `None` when unbounded.
	pub fn get(self) -> Option<usize> {
		match self {
			BacktrackLimit::Limited(limit) => Some(limit),
			BacktrackLimit::Unbounded => None,
		}
	}

	/// Largest usable lookbehind when `available` tokens precede the position.
	pub fn clamp(self, available: usize) -> usize {
		match self {
			BacktrackLimit::Limited(limit) => limit.max(1).min(available),
			BacktrackLimit::Unbounded => available,
		}
	}
}

impl From<Option<usize>> for BacktrackLimit {
	fn from(value: Option<usize>) -> Self {
		value.map_or(BacktrackLimit::Unbounded, BacktrackLimit::from_count)
	}
}

impl From<BacktrackLimit> for Option<usize> {
	fn from(value: BacktrackLimit) -> Self {
		value.get()
	}
}

/// Tunable parameters of a [`Markov`](super::markov::Markov) model.
///
/// Deserializable from configuration files; every field has a default, so a
/// partial section is accepted.
///
/// # Fields
/// - `mode`: tokenization mode (`"words"` or `"letters"`).
/// - `backtrack_limit`: maximum lookbehind, absent or `0` for unbounded.
/// - `response_limit`: maximum number of generated tokens per reply,
///   `0` for unbounded.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MarkovConfig {
	pub mode: TokenMode,
	pub backtrack_limit: BacktrackLimit,
	pub response_limit: usize,
}

impl Default for MarkovConfig {
	fn default() -> Self {
		Self {
			mode: TokenMode::default(),
			backtrack_limit: BacktrackLimit::default(),
			response_limit: DEFAULT_RESPONSE_LIMIT,
		}
	}
}

impl MarkovConfig {
	/// Reply length cap, `None` when unbounded.
	pub fn response_limit(&self) -> Option<usize> {
		if self.response_limit == 0 { None } else { Some(self.response_limit) }
	}
}
