//! Behavioural properties of learning and replying.

use proptest::prelude::*;

use rs_markov_core::{BacktrackLimit, Error, Markov, MarkovConfig, Status, TokenMode};

fn word_model(limit: BacktrackLimit) -> Markov {
	let mut markov = Markov::new(MarkovConfig::default()).with_seed(1234);
	markov.configure(TokenMode::Word, limit);
	markov
}

#[test]
fn hello_world_learns_nine_contexts() {
	let mut markov = word_model(BacktrackLimit::Unbounded);
	let mut learning = markov.learn("", "hello world");
	assert_eq!(learning.step(()).unwrap(), Some(9));
	learning.run().unwrap();

	let table = markov.associations();
	let expected = [
		("|", "hello"),
		("^ |", "hello"),
		("hello", "world"),
		("| hello", "world"),
		("^ | hello", "world"),
		("world", "$"),
		("hello world", "$"),
		("| hello world", "$"),
		("^ | hello world", "$"),
	];
	for (context, next) in expected {
		assert_eq!(table.get(context).map(|t| t.count(next)), Some(1), "{context:?} -> {next:?}");
	}
	assert_eq!(table.len(), expected.len());
	assert_eq!(table.total_mass(), 9);
}

#[test]
fn full_learn_adds_one_to_separator_context() {
	let mut markov = word_model(BacktrackLimit::Limited(3));
	markov.learn("who are you", "a bot").run().unwrap();
	let before = markov.continuations(&["|"]).map_or(0, |t| t.count("a"));

	markov.learn("what are you", "a program").run().unwrap();
	let after = markov.continuations(&["|"]).map_or(0, |t| t.count("a"));
	assert_eq!(after, before + 1);
}

#[test]
fn first_reply_token_follows_separator_counts() {
	let mut markov = word_model(BacktrackLimit::Limited(1));
	markov.learn("", "hello").run().unwrap();
	markov.learn("", "world").run().unwrap();

	let trials = 4000;
	let mut hello = 0;
	for _ in 0..trials {
		let mut reply = markov.respond("");
		match reply.step(()).unwrap() {
			Some(token) if token == "hello" => hello += 1,
			Some(token) => assert_eq!(token, "world"),
			None => panic!("reply ended before its first token"),
		}
	}
	let ratio = f64::from(hello) / f64::from(trials);
	assert!((ratio - 0.5).abs() < 0.05, "hello ratio was {ratio}");
}

#[test]
fn pacing_does_not_change_the_table() {
	let pairs = [("hi", "hello there"), ("how are you", "fine and you"), ("bye", "see you soon")];

	let mut stepped = word_model(BacktrackLimit::Limited(4));
	for (prompt, response) in pairs {
		let mut learning = stepped.learn(prompt, response);
		// Pause between every step, interleaving unrelated work.
		let mut scratch = Vec::new();
		while let Some(progress) = learning.step(()).unwrap() {
			scratch.push(progress);
		}
		assert_eq!(learning.status(), Status::Finished);
	}

	let mut batched = word_model(BacktrackLimit::Limited(4));
	for (prompt, response) in pairs {
		batched.learn(prompt, response).run().unwrap();
	}

	assert_eq!(stepped.associations(), batched.associations());
}

#[test]
fn cancelled_learn_keeps_exactly_reported_increments() {
	let mut markov = word_model(BacktrackLimit::Unbounded);
	markov.learn("", "some earlier text").run().unwrap();
	let before = markov.associations().total_mass();

	let k = 7;
	{
		let mut learning = markov.learn("tell me a story", "once upon a time there was a model");
		let expected = learning.step(()).unwrap().unwrap();
		assert!(k < expected);
		loop {
			let progress = learning.step(()).unwrap().unwrap();
			if progress == k {
				break;
			}
		}
		// Dropped here, mid-learning.
	}

	assert_eq!(markov.associations().total_mass(), before + k as u64);
}

#[test]
fn untrained_model_reports_exhaustion() {
	let mut markov = word_model(BacktrackLimit::Unbounded);
	let result: Result<Vec<String>, Error> = markov.respond("hello?").collect();
	assert!(matches!(result, Err(Error::Exhausted { .. })));
}

#[test]
fn letter_mode_learns_characters() {
	let mut markov = word_model(BacktrackLimit::Limited(2));
	markov.configure(TokenMode::Letter, BacktrackLimit::Limited(2));
	markov.learn("", "ab").run().unwrap();

	let table = markov.associations();
	assert_eq!(table.get("|").map(|t| t.count("a")), Some(1));
	assert_eq!(table.get("^|").map(|t| t.count("a")), Some(1));
	assert_eq!(table.get("|a").map(|t| t.count("b")), Some(1));
	assert_eq!(table.get("ab").map(|t| t.count("$")), Some(1));

	let reply: Vec<String> = markov.respond("").map(Result::unwrap).collect();
	assert_eq!(markov.detokenize(&reply), "ab");
}

fn clean_text() -> impl Strategy<Value = String> {
	prop::collection::vec("[a-z0-9]{1,8}", 1..8).prop_map(|words| words.join(" "))
}

proptest! {
	#[test]
	fn word_mode_round_trips_clean_text(text in clean_text()) {
		let tokens = TokenMode::Word.tokenize(&text);
		prop_assert_eq!(TokenMode::Word.detokenize(&tokens), text);
	}

	#[test]
	fn tokens_never_collide_with_markers(text in ".{0,40}") {
		for mode in [TokenMode::Word, TokenMode::Letter] {
			for token in mode.tokenize(&text) {
				prop_assert!(token != "^" && token != "|" && token != "$");
				prop_assert!(!token.is_empty());
			}
		}
	}

	#[test]
	fn counts_stay_positive(
		pairs in prop::collection::vec((".{0,30}", ".{0,30}"), 1..6),
		limit in 0usize..5,
	) {
		let mut markov = word_model(BacktrackLimit::from_count(limit));
		let mut planned = 0;
		for (prompt, response) in &pairs {
			let mut learning = markov.learn(prompt, response);
			planned += learning.step(()).unwrap().unwrap_or(0);
			learning.run().unwrap();
		}

		let table = markov.associations();
		prop_assert_eq!(table.total_mass(), planned as u64);
		for (_, transitions) in table.iter() {
			prop_assert!(!transitions.is_empty());
			for (_, count) in transitions.iter() {
				prop_assert!(count >= 1);
			}
		}
	}
}
