//! Typed game interface consumed by the search engine.
//!
//! A game is a pure transition system over immutable snapshots. The engine
//! never mutates a `State`; every `apply` returns a fresh snapshot together
//! with a chance key identifying which non-deterministic outcome occurred.

use rand_chacha::ChaCha20Rng;
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// Errors reported by game implementations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GameError {
    #[error("Illegal action: {0}")]
    IllegalAction(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result of applying an action to a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, K> {
    /// Snapshot after the action (and any chance event) resolved.
    pub state: S,
    /// Which chance outcome was realized. Deterministic games use a single key.
    pub chance: K,
}

/// Multi-player, turn-based game with optional chance events.
///
/// Value vectors are indexed by seat, `0..num_players(state)`. Games are not
/// assumed to be zero-sum, so every seat carries its own value.
///
/// # Example
///
/// ```rust,ignore
/// let game = TicTacToe::new();
/// let mut rng = ChaCha20Rng::seed_from_u64(7);
/// let state = game.initial_state(&mut rng);
/// let action = game.legal_actions(&state)[0];
/// let next = game.apply(&state, &action, &mut rng)?;
/// assert!(game.terminal_values(&next.state).is_none());
/// ```
pub trait Game: Send + Sync + Debug {
    /// Immutable snapshot: episode setup, game configuration and current state.
    type State: Clone + Debug + Send + Sync;

    /// Action identifier. Legal actions are listed in a stable order.
    type Action: Clone + PartialEq + Debug + Send + Sync;

    /// Key distinguishing the outcomes of one action applied to one snapshot.
    type ChanceKey: Clone + Eq + Hash + Debug + Send + Sync;

    /// Produce the opening snapshot of a new episode.
    fn initial_state(&self, rng: &mut ChaCha20Rng) -> Self::State;

    /// Number of participating seats in this snapshot's episode.
    fn num_players(&self, state: &Self::State) -> usize;

    /// Seat that acts in `state`. Only meaningful for non-terminal snapshots.
    fn current_player(&self, state: &Self::State) -> usize;

    /// Legal actions in `state`, in a stable order. Empty when terminal.
    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Apply `action`, resolving any chance event with `rng`.
    fn apply(
        &self,
        state: &Self::State,
        action: &Self::Action,
        rng: &mut ChaCha20Rng,
    ) -> Result<Transition<Self::State, Self::ChanceKey>, GameError>;

    /// Final per-seat values, or `None` while the game is still running.
    fn terminal_values(&self, state: &Self::State) -> Option<Vec<f32>>;

    /// Whether `state` ends the episode.
    fn is_terminal(&self, state: &Self::State) -> bool {
        self.terminal_values(state).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    /// Two seats take turns flipping a coin; the first head wins.
    #[derive(Debug)]
    struct CoinRace;

    #[derive(Debug, Clone, PartialEq)]
    struct CoinState {
        to_play: usize,
        winner: Option<usize>,
    }

    impl Game for CoinRace {
        type State = CoinState;
        type Action = ();
        type ChanceKey = bool;

        fn initial_state(&self, _rng: &mut ChaCha20Rng) -> CoinState {
            CoinState {
                to_play: 0,
                winner: None,
            }
        }

        fn num_players(&self, _state: &CoinState) -> usize {
            2
        }

        fn current_player(&self, state: &CoinState) -> usize {
            state.to_play
        }

        fn legal_actions(&self, state: &CoinState) -> Vec<()> {
            if state.winner.is_some() {
                Vec::new()
            } else {
                vec![()]
            }
        }

        fn apply(
            &self,
            state: &CoinState,
            _action: &(),
            rng: &mut ChaCha20Rng,
        ) -> Result<Transition<CoinState, bool>, GameError> {
            if state.winner.is_some() {
                return Err(GameError::IllegalAction("game is over".into()));
            }
            let heads = rng.gen_bool(0.5);
            let next = CoinState {
                to_play: 1 - state.to_play,
                winner: heads.then_some(state.to_play),
            };
            Ok(Transition {
                state: next,
                chance: heads,
            })
        }

        fn terminal_values(&self, state: &CoinState) -> Option<Vec<f32>> {
            state.winner.map(|w| {
                let mut values = vec![0.0; 2];
                values[w] = 1.0;
                values
            })
        }
    }

    #[test]
    fn test_play_until_terminal() {
        let game = CoinRace;
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut state = game.initial_state(&mut rng);
        let mut keys = Vec::new();

        while !game.is_terminal(&state) {
            let t = game.apply(&state, &(), &mut rng).unwrap();
            keys.push(t.chance);
            state = t.state;
        }

        // Only the final flip came up heads
        assert_eq!(keys.iter().filter(|k| **k).count(), 1);
        assert!(*keys.last().unwrap());
        let values = game.terminal_values(&state).unwrap();
        assert_eq!(values.iter().sum::<f32>(), 1.0);
        assert!(game.legal_actions(&state).is_empty());
    }

    #[test]
    fn test_apply_after_terminal_is_rejected() {
        let game = CoinRace;
        let state = CoinState {
            to_play: 0,
            winner: Some(1),
        };
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let err = game.apply(&state, &(), &mut rng).unwrap_err();
        assert!(matches!(err, GameError::IllegalAction(_)));
    }
}
