//! Core traits and types for the search engine's game interface.
//!
//! This crate provides the narrow contract the engine consumes from a game:
//! - `Game`: snapshot-in, snapshot-out transitions with chance keys
//! - `Transition`: the new snapshot plus the realized chance outcome
//! - `GameError`: rejected actions and malformed snapshots

pub mod typed;

pub use typed::{Game, GameError, Transition};
