//! Self-play episode driver.
//!
//! [`SelfPlayEpisode`] plays one game from the opening snapshot to the end,
//! running a search before every move and keeping the searched subtree
//! below the move actually played. It is itself a [`Computation`], so a
//! batch of episodes can be driven together by one scheduler.

use std::sync::Arc;

use engine_core::Game;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tracing::debug;

use crate::config::MctsConfig;
use crate::decision::{DecisionRule, VisitProportional};
use crate::evaluator::EvalResult;
use crate::scheduler::{Computation, Step};
use crate::search::{fork_rng, Search, SearchError, SearchResult, SearchStats, SearchTree};

/// Settings for self-play that sit on top of the search configuration.
#[derive(Debug, Clone)]
pub struct SelfPlayConfig {
    /// Moves played with visit-proportional sampling before switching to
    /// the configured decision rule.
    pub exploration_moves: u32,

    /// Temperature used during the exploration moves.
    pub exploration_temperature: f32,

    /// Episodes longer than this fail with `EpisodeLimit`.
    pub max_moves: u32,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            exploration_moves: 4,
            exploration_temperature: 1.0,
            max_moves: 512,
        }
    }
}

/// One position seen during self-play, with its training targets.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSample<S> {
    pub state: S,
    /// Seat that acted in `state`.
    pub player: usize,
    /// Root visit distribution over the legal actions.
    pub policy: Vec<f32>,
    /// Root per-player values after the search.
    pub search_values: Vec<f32>,
    /// Final per-player values of the episode.
    pub outcome: Vec<f32>,
}

/// A finished self-play game.
#[derive(Debug, Clone, Serialize)]
pub struct Episode<S> {
    pub samples: Vec<TrainingSample<S>>,
    pub outcome: Vec<f32>,
    pub moves: u32,
    pub stats: SearchStats,
}

struct Recorded<S> {
    state: S,
    player: usize,
    policy: Vec<f32>,
    search_values: Vec<f32>,
}

pub struct SelfPlayEpisode<'a, G: Game> {
    game: &'a G,
    config: MctsConfig,
    selfplay: SelfPlayConfig,
    rng: ChaCha20Rng,
    state: G::State,
    reused: Option<SearchTree<G>>,
    search: Option<Search<'a, G>>,
    explore: Arc<dyn DecisionRule>,
    recorded: Vec<Recorded<G::State>>,
    moves: u32,
    stats: SearchStats,
}

impl<'a, G: Game> SelfPlayEpisode<'a, G> {
    pub fn new(
        game: &'a G,
        config: MctsConfig,
        selfplay: SelfPlayConfig,
        mut rng: ChaCha20Rng,
    ) -> Self {
        let state = game.initial_state(&mut rng);
        Self::from_state(game, config, selfplay, state, rng)
    }

    /// Start from an arbitrary snapshot instead of the opening one.
    pub fn from_state(
        game: &'a G,
        config: MctsConfig,
        selfplay: SelfPlayConfig,
        state: G::State,
        rng: ChaCha20Rng,
    ) -> Self {
        let explore = Arc::new(VisitProportional::new(selfplay.exploration_temperature));
        Self {
            game,
            config,
            selfplay,
            rng,
            state,
            reused: None,
            search: None,
            explore,
            recorded: Vec::new(),
            moves: 0,
            stats: SearchStats::default(),
        }
    }

    /// Moves played so far.
    pub fn moves(&self) -> u32 {
        self.moves
    }

    fn start_search(&mut self) -> Result<Search<'a, G>, SearchError> {
        let rng = fork_rng(&mut self.rng);
        let search = match self.reused.take() {
            Some(tree) => Search::from_tree(self.game, self.config.clone(), tree, rng)?,
            None => Search::new(self.game, self.config.clone(), self.state.clone(), rng)?,
        };
        Ok(if self.moves < self.selfplay.exploration_moves {
            search.with_decision(self.explore.clone())
        } else {
            search
        })
    }

    /// Record the searched position, play the chosen action for real and
    /// keep the matching subtree if the realized chance outcome was expanded.
    fn play(
        &mut self,
        result: SearchResult<G::Action>,
        mut tree: SearchTree<G>,
    ) -> Result<(), SearchError> {
        self.stats.add(&result.stats);
        self.recorded.push(Recorded {
            state: self.state.clone(),
            player: self.game.current_player(&self.state),
            policy: result.policy,
            search_values: result.values,
        });

        let transition = self.game.apply(&self.state, &result.action, &mut self.rng)?;
        self.reused = if tree.advance(result.action_index, &transition.chance) {
            Some(tree)
        } else {
            None
        };
        self.state = transition.state;
        self.moves += 1;
        Ok(())
    }

    fn finish(&mut self, outcome: Vec<f32>) -> Episode<G::State> {
        debug!(
            moves = self.moves,
            outcome = ?outcome,
            simulations = self.stats.simulations,
            "Self-play episode complete"
        );
        let samples = std::mem::take(&mut self.recorded)
            .into_iter()
            .map(|r| TrainingSample {
                state: r.state,
                player: r.player,
                policy: r.policy,
                search_values: r.search_values,
                outcome: outcome.clone(),
            })
            .collect();

        Episode {
            samples,
            outcome,
            moves: self.moves,
            stats: self.stats.clone(),
        }
    }
}

impl<'a, G: Game> Computation for SelfPlayEpisode<'a, G> {
    type Snapshot = G::State;
    type Output = Episode<G::State>;

    fn resume(
        &mut self,
        results: Vec<EvalResult>,
    ) -> Result<Step<Self::Output, Self::Snapshot>, SearchError> {
        let mut results = Some(results);

        loop {
            if self.search.is_none() {
                if let Some(outcome) = self.game.terminal_values(&self.state) {
                    return Ok(Step::Done(self.finish(outcome)));
                }
                if self.moves >= self.selfplay.max_moves {
                    return Err(SearchError::EpisodeLimit { moves: self.moves });
                }
                self.search = Some(self.start_search()?);
            }

            let step = match self.search.as_mut() {
                Some(search) => search.resume(results.take().unwrap_or_default())?,
                None => continue,
            };

            match step {
                Step::Pending(requests) => return Ok(Step::Pending(requests)),
                Step::Done(result) => {
                    if let Some(search) = self.search.take() {
                        self.play(result, search.into_tree())?;
                    }
                }
            }
        }
    }
}
