//! Server configuration.
//!
//! Read from the TOML file named by `RS_MARKOV_CONFIG` (default
//! `./markov.toml`). Every key is optional; a missing default file means
//! default settings.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use rs_markov_core::{LearningMode, MarkovConfig};

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV_VAR: &str = "RS_MARKOV_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./markov.toml";

/// Example:
/// ```toml
/// bind = "0.0.0.0"
/// port = 8080
/// data_dir = "./data"
/// corpus_path = "./data/dialogue.txt"
/// learning_mode = "instructive"
///
/// [model]
/// mode = "letters"
/// backtrack_limit = 6
/// response_limit = 400
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
	/// Address to bind to.
	pub bind: String,
	pub port: u16,
	/// Directory holding saved states (`.json` / `.bin`).
	pub data_dir: PathBuf,
	/// Optional transcript learned (or loaded from its cache) at startup.
	pub corpus_path: Option<PathBuf>,
	pub learning_mode: LearningMode,
	/// Maximum accepted JSON body size, in bytes (state imports).
	pub json_limit: usize,
	pub model: MarkovConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind: "127.0.0.1".to_owned(),
			port: 5000,
			data_dir: PathBuf::from("./data"),
			corpus_path: None,
			learning_mode: LearningMode::default(),
			json_limit: 64 * 1024 * 1024,
			model: MarkovConfig::default(),
		}
	}
}

impl ServerConfig {
	/// Loads the configuration file named by `RS_MARKOV_CONFIG`.
	///
	/// # Errors
	/// - The file named by the variable does not exist.
	/// - The file cannot be read or parsed.
	pub fn load() -> Result<Self, String> {
		match env::var(CONFIG_ENV_VAR) {
			Ok(path) => Self::from_file(&path),
			Err(_) if Path::new(DEFAULT_CONFIG_PATH).is_file() => Self::from_file(DEFAULT_CONFIG_PATH),
			Err(_) => Ok(Self::default()),
		}
	}

	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
		let path = path.as_ref();
		let text = fs::read_to_string(path)
			.map_err(|e| format!("cannot read {}: {e}", path.display()))?;
		Self::from_toml(&text).map_err(|e| format!("invalid {}: {e}", path.display()))
	}

	pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(text)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use rs_markov_core::{BacktrackLimit, TokenMode};

	#[test]
	fn empty_file_is_default() {
		assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
	}

	#[test]
	fn full_file_parses() {
		let config = ServerConfig::from_toml(
			r#"
			bind = "0.0.0.0"
			port = 8080
			corpus_path = "corpus.txt"
			learning_mode = "instructive"

			[model]
			mode = "letters"
			backtrack_limit = 6
			response_limit = 0
			"#,
		)
		.unwrap();

		assert_eq!(config.bind, "0.0.0.0");
		assert_eq!(config.port, 8080);
		assert_eq!(config.corpus_path, Some(PathBuf::from("corpus.txt")));
		assert_eq!(config.learning_mode, LearningMode::Instructive);
		assert_eq!(config.model.mode, TokenMode::Letter);
		assert_eq!(config.model.backtrack_limit, BacktrackLimit::Limited(6));
		assert_eq!(config.model.response_limit(), None);
		assert_eq!(config.data_dir, PathBuf::from("./data"));
	}

	#[test]
	fn unknown_mode_is_rejected() {
		assert!(ServerConfig::from_toml("[model]\nmode = \"sentences\"").is_err());
	}

	#[test]
	fn missing_explicit_file_is_an_error() {
		assert!(ServerConfig::from_file("/definitely/not/here.toml").is_err());
	}
}
