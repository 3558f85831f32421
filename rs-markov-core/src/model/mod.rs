//! Markov-chain conversation model.
//!
//! This module provides an incremental prompt/response language model, including:
//! - Tokenization rules (`TokenMode`)
//! - Context => continuation statistics (`AssociationTable`, `Transitions`)
//! - The steppable learning and reply procedures (`Markov`)
//! - A conversation wrapper deciding what to learn from each prompt (`Session`)

/// High-level conversation interface.
///
/// Chains learning and replying into one steppable turn and remembers
/// the previous exchange.
pub mod session;

/// The model itself: learning, replying, export and import.
pub mod markov;

/// Context => continuations table, the whole learned state.
pub mod association_table;

/// Observed continuations of a single context, with weighted sampling.
pub mod transitions;

/// Tokenization modes and the reserved stream markers.
pub mod token_mode;

/// Model configuration: tokenization mode, backtrack limit, reply cap.
pub mod config;
