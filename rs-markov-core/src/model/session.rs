use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::coroutine::Coroutine;
use crate::error::Result;
use crate::io;
use crate::model::config::MarkovConfig;
use crate::model::markov::{Markov, MarkovState};

/// What a session learns from each incoming prompt before replying.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LearningMode {
	/// The prompt is learned as a response to the session's previous reply.
	#[default]
	Conversational,
	/// The prompt is learned as a response to the session's previous prompt.
	Instructive,
	/// Nothing is learned; the model only replies.
	Disabled,
}

/// Progress of a [`Session::turn`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEvent {
	/// Number of learning increments this turn will perform (always first).
	Planned(usize),
	/// Learning increments done so far.
	Learned(usize),
	/// Next token of the reply.
	Token(String),
}

/// Serializable snapshot of a session.
///
/// The model fields sit next to `lastPrompt` in one flat object:
/// `{"lastPrompt": "...", "tokenMode": "words", "maxLookbehind": null, "associations": {...}}`.
/// Meant for JSON; the flattened layout is not supported by `postcard`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
	#[serde(rename = "lastPrompt")]
	pub last_prompt: String,
	#[serde(flatten)]
	pub model: MarkovState,
}

/// A conversation with a [`Markov`] model.
///
/// # Responsibilities
/// - Decide what to learn from each prompt (`LearningMode`)
/// - Chain learning and replying into a single steppable turn
/// - Remember the previous prompt and reply
pub struct Session {
	markov: Markov,
	learning_mode: LearningMode,
	last_prompt: String,
	last_response: String,
}

impl Session {
	pub fn new(markov: Markov, learning_mode: LearningMode) -> Self {
		Self {
			markov,
			learning_mode,
			last_prompt: String::new(),
			last_response: String::new(),
		}
	}

	/// Builds a session from a transcript file, one utterance per line.
	///
	/// # Behavior
	/// - Each non-empty line is learned as a reply to the previous one.
	/// - The learned state is cached next to the corpus (`corpus.bin`).
	/// - A cache built with the same mode and backtrack limit is loaded instead
	///   of relearning.
	///
	/// # Errors
	/// Returns an error if the corpus cannot be read or the cache cannot be
	/// read or written.
	pub fn from_corpus<P: AsRef<Path>>(filepath: P, config: MarkovConfig) -> Result<Self> {
		let binary_data_path = io::build_output_path(&filepath, "bin")?;
		let mut session = Self::new(Markov::new(config), LearningMode::Conversational);

		if binary_data_path.exists() {
			let state: MarkovState = io::load_state(&binary_data_path)?;
			if state.mode == config.mode && state.backtrack_limit == config.backtrack_limit {
				info!("Loading cached model {}", binary_data_path.display());
				session.markov.import_state(state)?;
				return Ok(session);
			}
			info!("Cached model {} was built with other settings, relearning", binary_data_path.display());
		}

		let lines = io::read_file(&filepath)?;
		let increments = session.learn_transcript(&lines)?;
		info!("Learned {} from {} lines ({increments} increments)", filepath.as_ref().display(), lines.len());
		io::save_state(&binary_data_path, &session.markov.export_state())?;

		Ok(session)
	}

	pub fn markov(&self) -> &Markov {
		&self.markov
	}

	pub fn markov_mut(&mut self) -> &mut Markov {
		&mut self.markov
	}

	pub fn learning_mode(&self) -> LearningMode {
		self.learning_mode
	}

	pub fn set_learning_mode(&mut self, learning_mode: LearningMode) {
		self.learning_mode = learning_mode;
	}

	pub fn last_prompt(&self) -> &str {
		&self.last_prompt
	}

	pub fn last_response(&self) -> &str {
		&self.last_response
	}

	/// Learns a transcript where every line answers the previous one.
	///
	/// Blank lines are skipped. Returns the number of increments performed.
	pub fn learn_transcript<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<usize> {
		let mut previous = "";
		let mut increments = 0;
		for line in lines.iter().map(AsRef::as_ref).filter(|l| !l.trim().is_empty()) {
			let mut learning = self.markov.learn(previous, line);
			increments += learning.step(())?.unwrap_or(0);
			learning.run()?;
			previous = line;
		}
		Ok(increments)
	}

	/// Handles one prompt: learn according to the learning mode, then reply.
	///
	/// # Suspensions
	/// - `Planned(total)` once (0 when learning is disabled or empty).
	/// - `Learned(n)` for each learning progress report.
	/// - `Token(t)` for each generated token.
	///
	/// Completes with the detokenized reply. The prompt and reply are
	/// remembered only if the turn completes.
	pub fn turn(&mut self, prompt: &str) -> Coroutine<'_, TurnEvent, (), String> {
		let prompt = prompt.to_owned();
		let lesson = match self.learning_mode {
			LearningMode::Conversational => Some(self.last_response.clone()),
			LearningMode::Instructive => Some(self.last_prompt.clone()),
			LearningMode::Disabled => None,
		};

		Coroutine::new(move |co, ()| async move {
			match lesson {
				Some(previous) => {
					let mut learning = self.markov.learn(&previous, &prompt);
					if let Some(total) = learning.step(())? {
						co.suspend(TurnEvent::Planned(total)).await;
					}
					while let Some(done) = learning.step(())? {
						co.suspend(TurnEvent::Learned(done)).await;
					}
				}
				None => {
					co.suspend(TurnEvent::Planned(0)).await;
				}
			}

			let mut reply = Vec::new();
			let mut responding = self.markov.respond(&prompt);
			while let Some(token) = responding.step(())? {
				reply.push(token.clone());
				co.suspend(TurnEvent::Token(token)).await;
			}
			drop(responding);

			let response = self.markov.detokenize(&reply);
			debug!("Turn complete: {prompt:?} -> {response:?}");
			self.last_prompt = prompt;
			self.last_response = response.clone();
			Ok(response)
		})
	}

	/// Snapshot of the model and the last prompt.
	pub fn export_state(&self) -> SessionState {
		SessionState {
			last_prompt: self.last_prompt.clone(),
			model: self.markov.export_state(),
		}
	}

	/// Replaces the model wholesale and restores the last prompt.
	///
	/// Learning is switched off so the first exchanges with a loaded model do
	/// not retrain it. Nothing changes if the state is invalid.
	pub fn import_state(&mut self, state: SessionState) -> Result<()> {
		self.markov.import_state(state.model)?;
		self.last_prompt = state.last_prompt;
		self.last_response.clear();
		self.learning_mode = LearningMode::Disabled;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::error::Error;
	use crate::model::config::BacktrackLimit;
	use crate::model::token_mode::TokenMode;

	fn session(mode: LearningMode) -> Session {
		Session::new(Markov::default().with_seed(5), mode)
	}

	fn drive(session: &mut Session, prompt: &str) -> (Vec<TurnEvent>, String) {
		let mut turn = session.turn(prompt);
		let events: Vec<TurnEvent> = turn.by_ref().map(Result::unwrap).collect();
		let reply = turn.into_result().unwrap();
		(events, reply)
	}

	#[test]
	fn conversational_turn_learns_then_replies() {
		let mut session = session(LearningMode::Conversational);
		let (events, reply) = drive(&mut session, "hello there");

		// ^ | hello there $ : 2 + 3 + 4 increments
		assert_eq!(events[0], TurnEvent::Planned(9));
		assert_eq!(events[1], TurnEvent::Learned(0));
		assert_eq!(events[10], TurnEvent::Learned(9));
		let tokens: Vec<&TurnEvent> = events[11..].iter().collect();
		assert!(tokens.iter().all(|e| matches!(e, TurnEvent::Token(_))));
		assert_eq!(reply, "hello there");
		assert_eq!(session.last_prompt(), "hello there");
		assert_eq!(session.last_response(), "hello there");
	}

	#[test]
	fn conversational_mode_answers_previous_reply() {
		let mut session = session(LearningMode::Conversational);
		drive(&mut session, "ping");
		drive(&mut session, "pong");
		// "pong" was learned as the answer to the previous reply "ping".
		let path = session.markov().continuations(&["^", "ping", "|"]).unwrap();
		assert_eq!(path.count("pong"), 1);
	}

	#[test]
	fn instructive_mode_answers_previous_prompt() {
		let mut session = session(LearningMode::Instructive);
		drive(&mut session, "question");
		drive(&mut session, "answer");
		let after = session.markov().continuations(&["^", "question", "|"]).unwrap();
		assert_eq!(after.count("answer"), 1);
	}

	#[test]
	fn disabled_mode_only_replies() {
		let mut session = session(LearningMode::Disabled);
		session.markov_mut().learn("", "hi").run().unwrap();
		let mass = session.markov().associations().total_mass();

		let (events, reply) = drive(&mut session, "whatever");
		assert_eq!(events[0], TurnEvent::Planned(0));
		assert_eq!(reply, "hi");
		assert_eq!(session.markov().associations().total_mass(), mass);
	}

	#[test]
	fn failed_turn_is_not_remembered() {
		let mut session = session(LearningMode::Disabled);
		let mut turn = session.turn("anyone?");
		assert_eq!(turn.step(()).unwrap(), Some(TurnEvent::Planned(0)));
		assert!(matches!(turn.step(()), Err(Error::Exhausted { .. })));
		drop(turn);
		assert_eq!(session.last_prompt(), "");
	}

	#[test]
	fn import_disables_learning() {
		let mut source = session(LearningMode::Conversational);
		drive(&mut source, "first words");

		let mut target = session(LearningMode::Instructive);
		target.import_state(source.export_state()).unwrap();
		assert_eq!(target.learning_mode(), LearningMode::Disabled);
		assert_eq!(target.last_prompt(), "first words");
		assert_eq!(target.last_response(), "");
		assert_eq!(target.markov().associations(), source.markov().associations());
	}

	#[test]
	fn transcript_chains_lines() {
		let mut session = session(LearningMode::Disabled);
		session.markov_mut().configure(TokenMode::Word, BacktrackLimit::Limited(1));
		let increments = session.learn_transcript(&["hi", "", "hello"]).unwrap();
		// "hi": | hi $ -> 2 ; "hello" after "hi": | hello $ -> 2
		assert_eq!(increments, 4);
		assert_eq!(session.markov().continuations(&["|"]).unwrap().count("hello"), 1);
	}

	#[test]
	fn corpus_is_cached_next_to_transcript() {
		let dir = tempfile::tempdir().unwrap();
		let corpus = dir.path().join("dialogue.txt");
		std::fs::write(&corpus, "hi\nhello\n\nhow are you\n").unwrap();

		let first = Session::from_corpus(&corpus, MarkovConfig::default()).unwrap();
		let cache = dir.path().join("dialogue.bin");
		assert!(cache.is_file());

		// The cache wins over the (now different) transcript.
		std::fs::write(&corpus, "something else entirely\n").unwrap();
		let second = Session::from_corpus(&corpus, MarkovConfig::default()).unwrap();
		assert_eq!(second.markov().associations(), first.markov().associations());

		// Other settings invalidate it.
		let letters = MarkovConfig { mode: TokenMode::Letter, ..MarkovConfig::default() };
		let third = Session::from_corpus(&corpus, letters).unwrap();
		assert_ne!(third.markov().associations(), first.markov().associations());
		assert_eq!(third.markov().mode(), TokenMode::Letter);
	}

	#[test]
	fn flat_session_json_imports() {
		let state: SessionState = serde_json::from_str(
			r#"{"lastPrompt":"hi","tokenMode":"words","maxLookbehind":null,"associations":{"|":{"hello":1},"hello":{"$":1}}}"#,
		)
		.unwrap();
		assert_eq!(state.last_prompt, "hi");
		assert_eq!(state.model.backtrack_limit, BacktrackLimit::Unbounded);

		let mut target = session(LearningMode::Conversational);
		target.import_state(state).unwrap();
		assert_eq!(target.last_prompt(), "hi");
		let (_, reply) = drive(&mut target, "anything");
		assert_eq!(reply, "hello");
	}

	#[test]
	fn session_state_serializes_flat() {
		let mut source = session(LearningMode::Conversational);
		drive(&mut source, "good day");
		let json = serde_json::to_value(source.export_state()).unwrap();
		assert_eq!(json["lastPrompt"], "good day");
		assert_eq!(json["tokenMode"], "words");
		assert!(json["maxLookbehind"].is_null());
		assert_eq!(json["associations"]["|"]["good"], 1);
		assert!(json.get("model").is_none());

		let back: SessionState = serde_json::from_value(json).unwrap();
		assert_eq!(back, source.export_state());
	}

	#[test]
	fn learning_mode_names() {
		assert_eq!(serde_json::to_string(&LearningMode::Instructive).unwrap(), "\"instructive\"");
	}
}
