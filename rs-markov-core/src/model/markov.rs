use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::association_table::AssociationTable;
use super::config::{BacktrackLimit, MarkovConfig};
use super::token_mode::{END_TOKEN, SEPARATOR_TOKEN, START_TOKEN, TokenMode};
use super::transitions::Transitions;
use crate::coroutine::Coroutine;
use crate::error::{Error, Result};

/// Serializable snapshot of a model: configuration plus association table.
///
/// Field names match the portable export format:
/// `{"tokenMode": "words", "maxLookbehind": null, "associations": {...}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarkovState {
	#[serde(rename = "tokenMode")]
	pub mode: TokenMode,
	#[serde(rename = "maxLookbehind")]
	pub backtrack_limit: BacktrackLimit,
	pub associations: AssociationTable,
}

impl MarkovState {
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	/// Parses a JSON export. Missing fields or wrong types are an error.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	/// Compact binary encoding (`postcard`).
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(postcard::to_stdvec(self)?)
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Ok(postcard::from_bytes(bytes)?)
	}
}

/// A Markov-chain language model over prompt/response pairs.
///
/// The model learns, for every position of a response, which token followed
/// each run of preceding tokens (its *context*), up to the backtrack limit.
/// It replies by a weighted random walk: at each step it picks a random
/// lookbehind, falls back to shorter contexts until one is known, and draws
/// the next token proportionally to the observed counts.
///
/// Both [`learn`](Self::learn) and [`respond`](Self::respond) return a
/// [`Coroutine`] so the caller decides how fast they run and can stop them at
/// any suspension point.
///
/// # Invariants
/// - The table only grows between an explicit `reset` / `import_state`
/// - A stopped `learn` leaves exactly the increments it reported
pub struct Markov {
	config: MarkovConfig,
	table: AssociationTable,
	rng: StdRng,
}

impl Default for Markov {
	fn default() -> Self {
		Self::new(MarkovConfig::default())
	}
}

impl Markov {
	/// Creates an empty model with an OS-seeded random source.
	pub fn new(config: MarkovConfig) -> Self {
		Self {
			config,
			table: AssociationTable::new(),
			rng: StdRng::from_rng(&mut rand::rng()),
		}
	}

	/// Replaces the random source with a seeded one (reproducible replies).
	pub fn with_seed(mut self, seed: u64) -> Self {
		self.rng = StdRng::seed_from_u64(seed);
		self
	}

	/// Sets the tokenization mode and backtrack limit.
	///
	/// The table is kept as is: contexts learned under another mode simply
	/// stop matching.
	pub fn configure(&mut self, mode: TokenMode, backtrack_limit: BacktrackLimit) {
		self.config.mode = mode;
		self.config.backtrack_limit = backtrack_limit;
	}

	/// Sets the reply length cap, `0` for unbounded.
	pub fn set_response_limit(&mut self, limit: usize) {
		self.config.response_limit = limit;
	}

	pub fn config(&self) -> &MarkovConfig {
		&self.config
	}

	pub fn mode(&self) -> TokenMode {
		self.config.mode
	}

	pub fn backtrack_limit(&self) -> BacktrackLimit {
		self.config.backtrack_limit
	}

	pub fn tokenize(&self, text: &str) -> Vec<String> {
		self.config.mode.tokenize(text)
	}

	pub fn detokenize<S: AsRef<str>>(&self, tokens: &[S]) -> String {
		self.config.mode.detokenize(tokens)
	}

	/// Read-only access to everything learned so far.
	pub fn associations(&self) -> &AssociationTable {
		&self.table
	}

	/// Forgets everything learned. Configuration is kept.
	pub fn reset(&mut self) {
		self.table = AssociationTable::new();
	}

	/// Records a single `context -> next` observation.
	pub fn learn_single(&mut self, context: &str, next: &str) {
		self.table.observe(context, next);
	}

	/// Continuations known after a token path, detokenized with the current mode.
	pub fn continuations<S: AsRef<str>>(&self, path: &[S]) -> Option<&Transitions> {
		self.table.get(&self.detokenize(path))
	}

	/// Longest known context ending a prompt's seed stream.
	///
	/// Starts from `["^", tokens..., "|"]` (or `["|"]` for an empty prompt)
	/// and drops leading tokens until the path is a known context. Returns an
	/// empty path if nothing matches.
	pub fn focus_path(&self, prompt: &str) -> Vec<String> {
		let prompt_tokens = self.tokenize(prompt);
		if prompt_tokens.is_empty() {
			return vec![SEPARATOR_TOKEN.to_owned()];
		}

		let mut path = Self::seed_stream(prompt_tokens);
		let mut skip = 0;
		while skip < path.len() && !self.table.contains(&self.detokenize(&path[skip..])) {
			skip += 1;
		}
		path.split_off(skip)
	}

	/// Number of increments a `learn` call performs for a stream whose first
	/// response token sits at `start`.
	fn expected_steps(limit: BacktrackLimit, start: usize, stream_len: usize) -> usize {
		(start..stream_len).map(|i| limit.clamp(i)).sum()
	}

	/// `["^", prompt..., "|"]`
	fn seed_stream(prompt_tokens: Vec<String>) -> Vec<String> {
		let mut tokens = Vec::with_capacity(prompt_tokens.len() + 2);
		tokens.push(START_TOKEN.to_owned());
		tokens.extend(prompt_tokens);
		tokens.push(SEPARATOR_TOKEN.to_owned());
		tokens
	}

	/// Learns a prompt/response pair.
	///
	/// The token stream is `["^", prompt..., "|", response..., "$"]`. For each
	/// position from the first response token to the end, and for each
	/// lookbehind from 1 up to the backtrack limit, the preceding context is
	/// associated with the token at that position.
	///
	/// # Suspensions
	/// - First the total number of increments (`expected`).
	/// - Then `0`, and the running count after every increment, up to `expected`.
	/// - An empty response yields `0` once and learns nothing.
	///
	/// Dropping the coroutine early keeps the increments already reported.
	pub fn learn(&mut self, prompt: &str, response: &str) -> Coroutine<'_, usize> {
		let mode = self.config.mode;
		let limit = self.config.backtrack_limit;
		let response_tokens = mode.tokenize(response);
		let has_response = !response_tokens.is_empty();

		let mut tokens = Self::seed_stream(mode.tokenize(prompt));
		let start = tokens.len();
		tokens.extend(response_tokens);
		tokens.push(END_TOKEN.to_owned());

		Coroutine::new(move |co, ()| async move {
			if !has_response {
				debug!("Empty response, nothing to learn");
				co.suspend(0).await;
				return Ok(());
			}

			let expected = Self::expected_steps(limit, start, tokens.len());
			debug!("Learning {} positions in {} increments", tokens.len() - start, expected);
			co.suspend(expected).await;
			co.suspend(0).await;

			let mut done = 0;
			for i in start..tokens.len() {
				let next = &tokens[i];
				for lookbehind in 1..=limit.clamp(i) {
					let context = mode.detokenize(&tokens[i - lookbehind..i]);
					self.table.observe(&context, next);
					done += 1;
					co.suspend(done).await;
				}
			}
			Ok(())
		})
	}

	/// Generates a reply to `prompt`, one token per suspension.
	///
	/// Stops silently when the walk draws `|` or `$`, or when the configured
	/// response limit is reached.
	///
	/// # Errors
	/// [`Error::Exhausted`] if no context is known even at lookbehind 1, which
	/// happens on a model that never learned a non-empty response.
	pub fn respond(&mut self, prompt: &str) -> Coroutine<'_, String> {
		let mode = self.config.mode;
		let limit = self.config.backtrack_limit;
		let response_limit = self.config.response_limit();
		let mut tokens = Self::seed_stream(mode.tokenize(prompt));

		Coroutine::new(move |co, ()| async move {
			let mut generated = 0;
			loop {
				if response_limit.is_some_and(|max| generated >= max) {
					warn!("Reply reached the limit of {generated} tokens, stopping");
					break;
				}

				let next = Self::next_token(&self.table, &mut self.rng, mode, limit, &tokens)?;
				let terminal = next == SEPARATOR_TOKEN || next == END_TOKEN;
				tokens.push(next.clone());
				if terminal {
					break;
				}
				generated += 1;
				co.suspend(next).await;
			}
			debug!("Reply finished after {generated} tokens");
			Ok(())
		})
	}

	/// One step of the random walk.
	///
	/// Draws a lookbehind uniformly in `1..=max`, then shortens it until the
	/// trailing context is known.
	fn next_token(
		table: &AssociationTable,
		rng: &mut StdRng,
		mode: TokenMode,
		limit: BacktrackLimit,
		tokens: &[String],
	) -> Result<String> {
		let max_lookbehind = limit.clamp(tokens.len());
		let mut lookbehind = rng.random_range(1..=max_lookbehind);
		loop {
			let context = mode.detokenize(&tokens[tokens.len() - lookbehind..]);
			if let Some(transitions) = table.get(&context) {
				trace!("Context {context:?} (lookbehind {lookbehind}) has {} candidates", transitions.len());
				return match transitions.pick(rng) {
					Some(next) => Ok(next.to_owned()),
					None => Err(Error::Exhausted { context }),
				};
			}
			lookbehind -= 1;
			if lookbehind == 0 {
				return Err(Error::Exhausted { context });
			}
		}
	}

	/// Snapshot of mode, backtrack limit and table.
	pub fn export_state(&self) -> MarkovState {
		MarkovState {
			mode: self.config.mode,
			backtrack_limit: self.config.backtrack_limit,
			associations: self.table.clone(),
		}
	}

	/// Replaces mode, backtrack limit and table wholesale.
	///
	/// # Errors
	/// [`Error::InvalidState`] if the table breaks its invariants (zero counts,
	/// contexts without continuations). The model is left untouched.
	pub fn import_state(&mut self, state: MarkovState) -> Result<()> {
		state.associations.validate().map_err(Error::InvalidState)?;
		debug!("Importing {} contexts", state.associations.len());
		self.config.mode = state.mode;
		self.config.backtrack_limit = state.backtrack_limit;
		self.table = state.associations;
		Ok(())
	}
}
