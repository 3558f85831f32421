use serde::{Deserialize, Serialize};

/// Marks the start of a token stream.
pub const START_TOKEN: &str = "^";
/// Separates the prompt from the response.
pub const SEPARATOR_TOKEN: &str = "|";
/// Marks the end of a token stream.
pub const END_TOKEN: &str = "$";

/// How text is split into tokens and tokens are joined back into contexts.
///
/// Both modes share the same cleaning step: lowercase, keep only ASCII
/// letters, digits and whitespace, then split on whitespace. The reserved
/// markers (`^`, `|`, `$`) never survive cleaning.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenMode {
	/// One token per word, joined with a single space.
	#[default]
	#[serde(rename = "words", alias = "word")]
	Word,
	/// One token per character (inter-word spaces included), joined with nothing.
	#[serde(rename = "letters", alias = "letter")]
	Letter,
}

impl TokenMode {
	/// Splits `text` into tokens.
	///
	/// # Notes
	/// - Deterministic, pure function of the mode and the input.
	/// - Never produces an empty token.
	pub fn tokenize(self, text: &str) -> Vec<String> {
		let words = clean_words(text);
		match self {
			TokenMode::Word => words,
			TokenMode::Letter => words.join(" ").chars().map(String::from).collect(),
		}
	}

	/// Joins tokens into a single string.
	///
	/// Letter mode concatenates, so it is not an exact inverse of
	/// [`tokenize`](Self::tokenize) for arbitrary input.
	pub fn detokenize<S: AsRef<str>>(self, tokens: &[S]) -> String {
		let separator = match self {
			TokenMode::Word => " ",
			TokenMode::Letter => "",
		};
		let mut joined = String::new();
		for (i, token) in tokens.iter().enumerate() {
			if i > 0 {
				joined.push_str(separator);
			}
			joined.push_str(token.as_ref());
		}
		joined
	}
}

/// Lowercases, strips everything but ASCII alphanumerics and whitespace,
/// and splits on whitespace.
fn clean_words(text: &str) -> Vec<String> {
	let cleaned: String = text
		.chars()
		.flat_map(char::to_lowercase)
		.filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
		.collect();
	cleaned.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn word_mode_cleans_and_splits() {
		let tokens = TokenMode::Word.tokenize("  Hello, World!\tIt's   42 ");
		assert_eq!(tokens, vec!["hello", "world", "its", "42"]);
	}

	#[test]
	fn letter_mode_keeps_single_spaces() {
		let tokens = TokenMode::Letter.tokenize("Hi  there!");
		assert_eq!(tokens, vec!["h", "i", " ", "t", "h", "e", "r", "e"]);
	}

	#[test]
	fn markers_never_survive_cleaning() {
		for mode in [TokenMode::Word, TokenMode::Letter] {
			let tokens = mode.tokenize("^ | $ a|b");
			assert!(!tokens.iter().any(|t| t == START_TOKEN || t == SEPARATOR_TOKEN || t == END_TOKEN));
		}
	}

	#[test]
	fn empty_text_has_no_tokens() {
		assert!(TokenMode::Word.tokenize("").is_empty());
		assert!(TokenMode::Letter.tokenize(" ?! ").is_empty());
	}

	#[test]
	fn detokenize_by_mode() {
		assert_eq!(TokenMode::Word.detokenize(&["^", "|", "hello"]), "^ | hello");
		assert_eq!(TokenMode::Letter.detokenize(&["|", "h", "i"]), "|hi");
		assert_eq!(TokenMode::Word.detokenize::<&str>(&[]), "");
	}

	#[test]
	fn serializes_with_portable_names() {
		assert_eq!(serde_json::to_string(&TokenMode::Word).unwrap(), "\"words\"");
		assert_eq!(serde_json::to_string(&TokenMode::Letter).unwrap(), "\"letters\"");
		let mode: TokenMode = serde_json::from_str("\"letter\"").unwrap();
		assert_eq!(mode, TokenMode::Letter);
	}
}
