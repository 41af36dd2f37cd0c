//! Evaluator trait for position evaluation.
//!
//! The evaluator provides policy (action probabilities) and value estimates
//! for game states. In AlphaZero, this is a neural network. For testing,
//! we provide a uniform evaluator that returns equal priors.

use std::sync::Arc;

use engine_core::Game;
use thiserror::Error;

/// Errors that can occur during evaluation.
///
/// Cloneable so one backend failure can be delivered to every caller that
/// shared the failed batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Evaluation cancelled before a result was delivered")]
    Cancelled,
}

/// Result of evaluating a game state.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    /// Value estimate for every player, indexed by seat.
    pub values: Vec<f32>,

    /// Prior over the state's legal actions, aligned with
    /// `Game::legal_actions` order. Need not be normalized.
    pub policy: Vec<f32>,
}

/// Trait for position evaluators.
///
/// Implementations could be:
/// - UniformEvaluator: Returns uniform policy (for testing)
/// - a neural network behind an inference server
pub trait Evaluator<S>: Send + Sync {
    /// Evaluate a single game state.
    fn evaluate(&self, state: &S) -> Result<EvalResult, EvaluatorError>;

    /// Evaluate many states in one call, results in input order.
    /// Default implementation calls evaluate() in a loop.
    fn evaluate_batch(&self, states: &[S]) -> Result<Vec<EvalResult>, EvaluatorError> {
        states.iter().map(|s| self.evaluate(s)).collect()
    }
}

impl<S, E: Evaluator<S> + ?Sized> Evaluator<S> for Arc<E> {
    fn evaluate(&self, state: &S) -> Result<EvalResult, EvaluatorError> {
        (**self).evaluate(state)
    }

    fn evaluate_batch(&self, states: &[S]) -> Result<Vec<EvalResult>, EvaluatorError> {
        (**self).evaluate_batch(states)
    }
}

/// Uniform evaluator that assigns equal probability to all legal moves.
/// Value is always 0.0 (neutral). Useful for testing MCTS without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator<G> {
    game: G,
}

impl<G: Game> UniformEvaluator<G> {
    pub fn new(game: G) -> Self {
        Self { game }
    }
}

impl<G: Game> Evaluator<G::State> for UniformEvaluator<G> {
    fn evaluate(&self, state: &G::State) -> Result<EvalResult, EvaluatorError> {
        let num_legal = self.game.legal_actions(state).len();
        let num_players = self.game.num_players(state);

        let policy = if num_legal == 0 {
            Vec::new()
        } else {
            vec![1.0 / num_legal as f32; num_legal]
        };

        Ok(EvalResult {
            values: vec![0.0; num_players],
            policy,
        })
    }
}
