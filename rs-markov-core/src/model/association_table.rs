use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::transitions::Transitions;

/// Context string => observed continuations.
///
/// A context is a detokenized run of consecutive tokens (for example
/// `"^ | hello"` in word mode). The table only grows: counts are incremented,
/// entries are never removed individually.
///
/// # Invariants
/// - A context is present iff at least one continuation was observed after it
/// - All continuation counts are >= 1
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct AssociationTable {
	contexts: HashMap<String, Transitions>,
}

impl AssociationTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records that `next` followed `context` once more.
	pub fn observe(&mut self, context: &str, next: &str) {
		match self.contexts.get_mut(context) {
			Some(transitions) => transitions.observe(next),
			None => {
				let mut transitions = Transitions::default();
				transitions.observe(next);
				self.contexts.insert(context.to_owned(), transitions);
			}
		}
	}

	/// Continuations observed after `context`.
	pub fn get(&self, context: &str) -> Option<&Transitions> {
		self.contexts.get(context)
	}

	pub fn contains(&self, context: &str) -> bool {
		self.contexts.contains_key(context)
	}

	/// Number of distinct contexts.
	pub fn len(&self) -> usize {
		self.contexts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.contexts.is_empty()
	}

	/// Sum of every observation count in the table.
	///
	/// Each learning increment adds exactly one to this value.
	pub fn total_mass(&self) -> u64 {
		self.contexts.values().map(Transitions::total).sum()
	}

	/// All contexts and their continuations, in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Transitions)> {
		self.contexts.iter().map(|(context, transitions)| (context.as_str(), transitions))
	}

	/// Checks the table invariants on data coming from outside.
	pub(crate) fn validate(&self) -> Result<(), String> {
		self.contexts
			.iter()
			.try_for_each(|(context, transitions)| transitions.validate(context))
	}
}
