//! Incremental Markov-chain text generation library.
//!
//! This crate provides a prompt/response Markov model whose learning and
//! generation run as steppable procedures:
//! - A cooperative step engine (`coroutine`) turning sequential code with
//!   explicit suspension points into a pausable procedure
//! - Word- and letter-level Markov models with variable lookbehind
//! - A conversation session layered on top of the model
//! - Persistence helpers (JSON and compact binary)
//!
//! The crate is single-threaded by construction: a procedure borrows its
//! model mutably for as long as it lives.

/// Cooperative step engine.
pub mod coroutine;

/// Error type shared by the whole crate.
pub mod error;

/// Markov models and conversation sessions.
pub mod model;

/// I/O utilities (corpus loading, state files, path helpers).
pub mod io;

pub use coroutine::{Coroutine, Status, Yielder};
pub use error::{Error, Result};
pub use model::config::{BacktrackLimit, MarkovConfig};
pub use model::markov::{Markov, MarkovState};
pub use model::session::{LearningMode, Session, SessionState, TurnEvent};
pub use model::token_mode::TokenMode;
