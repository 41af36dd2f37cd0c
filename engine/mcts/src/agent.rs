//! Move-choosing agents and random playouts.

use engine_core::Game;
use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::config::MctsConfig;
use crate::evaluator::Evaluator;
use crate::search::{fork_rng, run_mcts, SearchError};

/// Anything that can pick an action for the player to act in a snapshot.
pub trait Agent<G: Game> {
    fn select_action(
        &mut self,
        game: &G,
        state: &G::State,
        rng: &mut ChaCha20Rng,
    ) -> Result<G::Action, SearchError>;
}

/// Picks uniformly among the legal actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAgent;

impl<G: Game> Agent<G> for RandomAgent {
    fn select_action(
        &mut self,
        game: &G,
        state: &G::State,
        rng: &mut ChaCha20Rng,
    ) -> Result<G::Action, SearchError> {
        let mut legal = game.legal_actions(state);
        if legal.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        let index = rng.gen_range(0..legal.len());
        Ok(legal.swap_remove(index))
    }
}

/// Runs a fresh search from every snapshot it is asked about and plays the
/// search's decision.
pub struct MctsAgent<'e, E: ?Sized> {
    config: MctsConfig,
    evaluator: &'e E,
}

impl<'e, E: ?Sized> MctsAgent<'e, E> {
    pub fn new(config: MctsConfig, evaluator: &'e E) -> Self {
        Self { config, evaluator }
    }
}

impl<'e, G, E> Agent<G> for MctsAgent<'e, E>
where
    G: Game,
    E: Evaluator<G::State> + ?Sized,
{
    fn select_action(
        &mut self,
        game: &G,
        state: &G::State,
        rng: &mut ChaCha20Rng,
    ) -> Result<G::Action, SearchError> {
        let result = run_mcts(
            game,
            self.evaluator,
            self.config.clone(),
            state.clone(),
            fork_rng(rng),
        )?;
        Ok(result.action)
    }
}

/// Play `agent` for every seat from `state` until the game ends and return
/// the terminal values.
pub fn rollout<G, A>(
    game: &G,
    state: &G::State,
    agent: &mut A,
    rng: &mut ChaCha20Rng,
    max_moves: u32,
) -> Result<Vec<f32>, SearchError>
where
    G: Game,
    A: Agent<G> + ?Sized,
{
    let mut current = state.clone();
    let mut moves = 0;
    loop {
        if let Some(values) = game.terminal_values(&current) {
            return Ok(values);
        }
        if moves >= max_moves {
            return Err(SearchError::EpisodeLimit { moves });
        }
        let action = agent.select_action(game, &current, rng)?;
        current = game.apply(&current, &action, rng)?.state;
        moves += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;
    use games_tictactoe::{State, TicTacToe};
    use rand::SeedableRng;

    #[test]
    fn test_random_agent_picks_legal() {
        let game = TicTacToe;
        let state = State::from_board([1, 2, 1, 2, 1, 2, 0, 0, 0]).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..50 {
            let action = RandomAgent.select_action(&game, &state, &mut rng).unwrap();
            assert!([6, 7, 8].contains(&action));
        }
    }

    #[test]
    fn test_random_agent_no_moves() {
        let game = TicTacToe;
        // X wins on the top row
        let state = State::from_board([1, 1, 1, 2, 2, 0, 0, 0, 0]).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert!(matches!(
            RandomAgent.select_action(&game, &state, &mut rng),
            Err(SearchError::NoLegalMoves)
        ));
    }

    #[test]
    fn test_rollout_reaches_terminal() {
        let game = TicTacToe;
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        for _ in 0..20 {
            let values = rollout(&game, &State::new(), &mut RandomAgent, &mut rng, 9).unwrap();
            assert_eq!(values.len(), 2);
            assert!((values[0] + values[1]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rollout_move_limit() {
        let game = TicTacToe;
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let result = rollout(&game, &State::new(), &mut RandomAgent, &mut rng, 2);
        assert!(matches!(
            result,
            Err(SearchError::EpisodeLimit { moves: 2 })
        ));
    }

    #[test]
    fn test_mcts_agent_takes_win() {
        let game = TicTacToe;
        let evaluator = UniformEvaluator::new(game);
        let config = MctsConfig::for_testing().with_simulations(200);
        let mut agent = MctsAgent::new(config, &evaluator);

        // X | X | _
        // O | O | _
        // _ | _ | _
        let state = State::from_board([1, 1, 0, 2, 2, 0, 0, 0, 0]).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let action = agent.select_action(&game, &state, &mut rng).unwrap();
        assert_eq!(action, 2);
    }
}
