//! Error types shared by the step engine and the model.

use thiserror::Error;

/// Everything that can go wrong while driving or persisting a model.
#[derive(Debug, Error)]
pub enum Error {
	/// No learned continuation exists for the context, even at lookbehind 1.
	///
	/// This is the "nothing to say" condition: the model was never trained,
	/// or was imported from an empty state.
	#[error("model exhausted: no learned continuation for context {context:?}")]
	Exhausted { context: String },

	/// `step` was called on a procedure that already completed.
	#[error("coroutine already finished")]
	CoroutineFinished,

	/// `step` was called on a procedure whose failure was already reported.
	/// Carries the message of that failure.
	#[error("coroutine failed and cannot be resumed: {0}")]
	CoroutineFailed(String),

	/// The procedure suspended on something other than its yield handle.
	#[error("procedure suspended without yielding a value")]
	ForeignSuspension,

	/// An imported state is malformed.
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// A configuration value is out of range.
	#[error("config error: {0}")]
	Config(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("binary encoding error: {0}")]
	Binary(#[from] postcard::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exhausted_names_the_context() {
		let e = Error::Exhausted { context: "|".into() };
		assert!(e.to_string().contains("\"|\""));
	}

	#[test]
	fn io_error_converts() {
		let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
		let e: Error = io_err.into();
		assert!(e.to_string().contains("io error"));
		let _: &dyn std::error::Error = &e;
	}

	#[test]
	fn json_error_converts() {
		let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
		let e: Error = json_err.into();
		assert!(matches!(e, Error::Json(_)));
	}
}
