//! Monte Carlo Tree Search (MCTS) for multi-player games with chance.
//!
//! This crate provides a game-agnostic MCTS implementation that works with any
//! game implementing the `engine-core` [`Game`](engine_core::Game) trait.
//!
//! # Overview
//!
//! Each simulation consists of four phases:
//!
//! 1. **Selection**: Traverse the tree with a pluggable [`SelectionRule`]
//!    (PUCT by default). Every action taken is re-applied to sample its chance
//!    outcome, so an action edge can lead to several children.
//! 2. **Expansion**: When reaching a leaf, add one edge per legal action
//! 3. **Evaluation**: Model value, random-playout value, or a weighted blend
//! 4. **Backpropagation**: Update per-player running averages along the path
//!
//! Values are vectors indexed by seat, so the search needs no notion of
//! "opponent" and works for any number of players.
//!
//! # Batching
//!
//! A [`Search`] never calls the model itself. It suspends with the snapshot
//! it needs evaluated; the [`Scheduler`] resumes many suspended searches (or
//! whole [`SelfPlayEpisode`]s) per round and issues one backend call for all
//! of their requests. [`BatchingEvaluator`] offers the same coalescing to
//! callers that only hold a future.
//!
//! # Usage
//!
//! ```rust
//! use games_tictactoe::{State, TicTacToe};
//! use mcts::{run_mcts, MctsConfig, UniformEvaluator};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let game = TicTacToe;
//! let evaluator = UniformEvaluator::new(game);
//! let config = MctsConfig::for_testing();
//!
//! let rng = ChaCha20Rng::seed_from_u64(42);
//! let result = run_mcts(&game, &evaluator, config, State::new(), rng).unwrap();
//!
//! assert!(result.action < 9);
//! assert_eq!(result.policy.len(), 9);
//! ```
//!
//! # Architecture
//!
//! ```text
//!  SelfPlayEpisode --owns--> Search --owns--> MctsTree (arena)
//!         |                    |
//!         +------ resume ------+----> Step::Pending(snapshots)
//!                                          |
//!                       Scheduler: one evaluate_batch per round
//! ```

pub mod agent;
pub mod batching;
pub mod config;
pub mod decision;
pub mod evaluator;
pub mod node;
pub mod scheduler;
pub mod search;
pub mod selection;
pub mod selfplay;
pub mod tree;

#[cfg(test)]
mod test_games;

// Re-export main types
pub use agent::{rollout, Agent, MctsAgent, RandomAgent};
pub use batching::{BatchingEvaluator, PendingEvaluation};
pub use config::{ChanceOverflow, MctsConfig};
pub use decision::{DecisionRule, Greedy, Refinement, VisitProportional};
pub use evaluator::{EvalResult, Evaluator, EvaluatorError, UniformEvaluator};
pub use node::{ActionEdge, ChanceOutcome, MctsNode, NodeId};
pub use scheduler::{drive, Computation, Scheduler, SchedulerStats, Step};
pub use search::{run_mcts, Search, SearchError, SearchResult, SearchStats, SearchTree};
pub use selection::{EdgeStats, NodeStats, Puct, SelectionRule};
pub use selfplay::{Episode, SelfPlayConfig, SelfPlayEpisode, TrainingSample};
pub use tree::{MctsTree, TreeStats};
