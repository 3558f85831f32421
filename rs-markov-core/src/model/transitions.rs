use std::collections::BTreeMap;

use rand::Rng;

use serde::{Deserialize, Serialize};

/// Observed continuations of a single context.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Invariants
/// - Each observation count is strictly positive
/// - Candidates are enumerated in a stable (sorted) order, so a seeded
///   random source always picks the same continuation
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transitions {
	/// Next token => number of times it followed the context.
	/// Example: { "hello" => 2, "world" => 1 }
	counts: BTreeMap<String, u64>,
}

impl Transitions {
	/// Records one more occurrence of `next` after this context.
	pub fn observe(&mut self, next: &str) {
		match self.counts.get_mut(next) {
			Some(count) => *count += 1,
			None => {
				self.counts.insert(next.to_owned(), 1);
			}
		}
	}

	/// Observation count of `next`, 0 if never seen.
	pub fn count(&self, next: &str) -> u64 {
		self.counts.get(next).copied().unwrap_or(0)
	}

	/// Sum of all observation counts.
	pub fn total(&self) -> u64 {
		self.counts.values().sum()
	}

	pub fn len(&self) -> usize {
		self.counts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Candidates and their counts, in enumeration order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
		self.counts.iter().map(|(token, count)| (token.as_str(), *count))
	}

	/// Picks a continuation by roulette-wheel selection.
	///
	/// Draws `r` in `[0, W)` where `W` is the total weight, then walks the
	/// candidates subtracting each count from the remaining weight until the
	/// remainder is `<= r`. The probability of a candidate is proportional to
	/// its count.
	///
	/// Returns `None` if there are no candidates.
	pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
		let total = self.total();
		if total == 0 {
			return None;
		}

		let selection = rng.random_range(0..total);
		let mut remaining = total;
		for (token, count) in &self.counts {
			remaining -= count;
			if remaining <= selection {
				return Some(token.as_str());
			}
		}

		// Unreachable: `remaining` reaches 0 on the last candidate.
		None
	}

	/// Checks the positive-count invariant on data coming from outside.
	pub(crate) fn validate(&self, context: &str) -> Result<(), String> {
		if self.counts.is_empty() {
			return Err(format!("context {context:?} has no continuations"));
		}
		match self.counts.iter().find(|(_, count)| **count == 0) {
			Some((token, _)) => Err(format!("context {context:?} has a zero count for {token:?}")),
			None => Ok(()),
		}
	}
}
