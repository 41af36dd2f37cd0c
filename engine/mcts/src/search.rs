//! MCTS search implementation.
//!
//! Implements the core MCTS algorithm:
//! 1. Selection: Traverse tree using the selection rule to find a leaf,
//!    sampling a chance outcome for every action taken
//! 2. Expansion: Add one edge per legal action using the policy prior
//! 3. Evaluation: Model value, playout value, or a weighted blend
//! 4. Backpropagation: Update per-player running averages along the path
//!
//! A [`Search`] is a resumable [`Computation`]: whenever a leaf needs the
//! model it suspends with that leaf's snapshot, so many searches can share
//! one batched inference call through the [`Scheduler`](crate::Scheduler).

use std::sync::Arc;

use engine_core::{Game, GameError};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::agent::{rollout, Agent, RandomAgent};
use crate::config::{ChanceOverflow, MctsConfig};
use crate::decision::{top_by_visits, DecisionRule};
use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};
use crate::node::{ActionEdge, ChanceOutcome, MctsNode, NodeId};
use crate::scheduler::{drive, Computation, Step};
use crate::selection::{EdgeStats, NodeStats};
use crate::tree::{MctsTree, PathStep};

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Backend returned {actual} results for {expected} requests")]
    BatchMismatch { expected: usize, actual: usize },

    #[error("Game did not finish within {moves} moves")]
    EpisodeLimit { moves: u32 },

    #[error("Protocol violation: {0}")]
    Protocol(String),
}

/// Arena tree specialised to a game's associated types.
pub type SearchTree<G> = MctsTree<<G as Game>::State, <G as Game>::Action, <G as Game>::ChanceKey>;

type SearchNode<G> = MctsNode<<G as Game>::State, <G as Game>::Action, <G as Game>::ChanceKey>;

/// Counters for one search, or summed over many.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub simulations: u64,
    pub evaluations: u64,
    pub rollouts: u64,
    pub terminal_hits: u64,
    pub chance_nodes: u64,
    pub folded_outcomes: u64,
    pub reused_nodes: u64,
}

impl SearchStats {
    pub fn add(&mut self, other: &SearchStats) {
        self.simulations += other.simulations;
        self.evaluations += other.evaluations;
        self.rollouts += other.rollouts;
        self.terminal_hits += other.terminal_hits;
        self.chance_nodes += other.chance_nodes;
        self.folded_outcomes += other.folded_outcomes;
        self.reused_nodes += other.reused_nodes;
    }
}

/// Result of an MCTS search.
#[derive(Debug, Clone)]
pub struct SearchResult<A> {
    /// Action chosen by the decision rule
    pub action: A,

    /// Position of `action` in the root's legal-action order
    pub action_index: usize,

    /// Visit distribution over the root's legal actions
    pub policy: Vec<f32>,

    /// Per-player value estimate at root
    pub values: Vec<f32>,

    /// Number of simulations performed
    pub simulations: u32,

    pub stats: SearchStats,
}

struct PendingLeaf {
    path: Vec<PathStep>,
    leaf: NodeId,
}

enum Leaf {
    Ready {
        path: Vec<PathStep>,
        leaf: NodeId,
        values: Vec<f32>,
    },
    NeedsEval {
        path: Vec<PathStep>,
        leaf: NodeId,
    },
}

/// MCTS search state.
pub struct Search<'a, G: Game> {
    game: &'a G,
    config: MctsConfig,
    tree: SearchTree<G>,
    rng: ChaCha20Rng,
    rollout_agent: Box<dyn Agent<G> + 'a>,
    decision: Arc<dyn DecisionRule>,
    /// Root-edge visits still to perform in the current phase.
    remaining: u32,
    /// Root edges the refinement pass is restricted to.
    candidates: Option<Vec<usize>>,
    refined: bool,
    noise_applied: bool,
    pending: Option<PendingLeaf>,
    finished: bool,
    stats: SearchStats,
}

impl<'a, G: Game> Search<'a, G> {
    /// Create a new MCTS search rooted at `state`.
    pub fn new(
        game: &'a G,
        config: MctsConfig,
        state: G::State,
        rng: ChaCha20Rng,
    ) -> Result<Self, SearchError> {
        let root = new_node(game, state);
        Self::from_tree(game, config, MctsTree::new(root), rng)
    }

    /// Continue searching in a tree kept from an earlier search.
    pub fn from_tree(
        game: &'a G,
        config: MctsConfig,
        tree: SearchTree<G>,
        rng: ChaCha20Rng,
    ) -> Result<Self, SearchError> {
        config.validate()?;

        let root = tree.get(tree.root());
        if root.is_terminal() {
            return Err(SearchError::NoLegalMoves);
        }
        let num_legal = game.legal_actions(&root.state).len();
        if num_legal == 0 {
            return Err(SearchError::NoLegalMoves);
        }

        let stats = SearchStats {
            reused_nodes: tree.len().saturating_sub(1) as u64,
            ..SearchStats::default()
        };

        Ok(Self {
            game,
            remaining: config.num_simulations.max(num_legal as u32),
            decision: config.decision.clone(),
            config,
            tree,
            rng,
            rollout_agent: Box::new(RandomAgent),
            candidates: None,
            refined: false,
            noise_applied: false,
            pending: None,
            finished: false,
            stats,
        })
    }

    /// Use `agent` instead of uniform random play for playouts.
    pub fn with_rollout_agent(mut self, agent: Box<dyn Agent<G> + 'a>) -> Self {
        self.rollout_agent = agent;
        self
    }

    /// Override the configured decision rule for this search only.
    pub fn with_decision(mut self, rule: Arc<dyn DecisionRule>) -> Self {
        self.decision = rule;
        self
    }

    /// Get the search tree (for inspection/debugging).
    pub fn tree(&self) -> &SearchTree<G> {
        &self.tree
    }

    /// Give up the search and keep its tree for reuse.
    pub fn into_tree(self) -> SearchTree<G> {
        self.tree
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn run_until_blocked(
        &mut self,
    ) -> Result<Step<SearchResult<G::Action>, G::State>, SearchError> {
        loop {
            self.maybe_apply_root_noise();

            if self.remaining == 0 {
                if self.begin_refinement() {
                    continue;
                }
                return Ok(Step::Done(self.finish()?));
            }

            match self.descend()? {
                Leaf::Ready { path, leaf, values } => self.finish_simulation(&path, leaf, &values),
                Leaf::NeedsEval { path, leaf } => {
                    let state = self.tree.get(leaf).state.clone();
                    self.stats.evaluations += 1;
                    self.pending = Some(PendingLeaf { path, leaf });
                    return Ok(Step::Pending(vec![state]));
                }
            }
        }
    }

    /// Walk from the root to a leaf. Leaves that can be valued without the
    /// model are expanded on the spot.
    fn descend(&mut self) -> Result<Leaf, SearchError> {
        let mut path = Vec::new();
        let mut current = self.tree.root();

        loop {
            let node = self.tree.get(current);

            if let Some(values) = &node.terminal {
                let values = values.clone();
                self.stats.terminal_hits += 1;
                return Ok(Leaf::Ready {
                    path,
                    leaf: current,
                    values,
                });
            }

            if !node.is_expanded() {
                if self.config.uses_model() {
                    return Ok(Leaf::NeedsEval {
                        path,
                        leaf: current,
                    });
                }
                let values = self.expand(current, None)?;
                return Ok(Leaf::Ready {
                    path,
                    leaf: current,
                    values,
                });
            }

            let edge_index = self.select_edge(current)?;
            path.push((current, edge_index));
            current = self.step_through(current, edge_index)?;
        }
    }

    fn select_edge(&self, node_id: NodeId) -> Result<usize, SearchError> {
        let is_root = node_id == self.tree.root();
        let edges = self.edge_stats(node_id, is_root);

        // Every root action gets one visit before the selection rule decides
        if is_root {
            if let Some(edge) = edges.iter().find(|e| e.visit_count == 0) {
                return Ok(edge.index);
            }
        }

        let node = self.tree.get(node_id);
        let stats = NodeStats {
            visit_count: node.visit_count,
            to_play: node.to_play,
            is_root,
        };
        let rule = match (&self.config.root_selection, is_root) {
            (Some(root_rule), true) => root_rule,
            _ => &self.config.selection,
        };

        let pos = rule
            .select(&stats, &edges, self.config.exploration_bias)
            .ok_or(SearchError::NoLegalMoves)?;
        edges.get(pos).map(|e| e.index).ok_or_else(|| {
            SearchError::Protocol(format!(
                "selection rule picked position {} of {} edges",
                pos,
                edges.len()
            ))
        })
    }

    /// Edge views of `node_id`, restricted to the refinement candidates when
    /// `restrict` is set and a refinement pass is active.
    fn edge_stats(&self, node_id: NodeId, restrict: bool) -> Vec<EdgeStats> {
        let node = self.tree.get(node_id);
        let candidates = if restrict { self.candidates.as_ref() } else { None };

        node.edges
            .iter()
            .enumerate()
            .filter(|(i, _)| candidates.map_or(true, |c| c.contains(i)))
            .map(|(index, edge)| EdgeStats {
                index,
                prior: edge.prior,
                visit_count: edge.visit_count,
                value: edge.mean_value(node.to_play),
            })
            .collect()
    }

    /// Apply the edge's action, sample its chance outcome and return the
    /// child for that outcome, creating or folding as configured.
    fn step_through(&mut self, node_id: NodeId, edge_index: usize) -> Result<NodeId, SearchError> {
        let transition = {
            let node = self.tree.get(node_id);
            self.game
                .apply(&node.state, &node.edges[edge_index].action, &mut self.rng)?
        };

        let existing = {
            let outcomes = &self.tree.get(node_id).edges[edge_index].outcomes;
            match outcomes.iter().position(|o| o.key == transition.chance) {
                Some(pos) => Some(pos),
                None if outcomes.len() >= self.config.max_chance_branches => {
                    self.stats.folded_outcomes += 1;
                    Some(fold_bucket(outcomes, self.config.chance_overflow))
                }
                None => None,
            }
        };

        if let Some(pos) = existing {
            let outcome = &mut self.tree.get_mut(node_id).edges[edge_index].outcomes[pos];
            outcome.count += 1;
            return Ok(outcome.child);
        }

        let child = self.tree.allocate(new_node(self.game, transition.state));
        self.stats.chance_nodes += 1;
        self.tree.get_mut(node_id).edges[edge_index]
            .outcomes
            .push(ChanceOutcome {
                key: transition.chance,
                child,
                count: 1,
            });
        Ok(child)
    }

    /// Create the node's edges and compute its initial value.
    fn expand(
        &mut self,
        node_id: NodeId,
        eval: Option<EvalResult>,
    ) -> Result<Vec<f32>, SearchError> {
        let state = self.tree.get(node_id).state.clone();
        let legal = self.game.legal_actions(&state);
        if legal.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        let num_players = self.game.num_players(&state);

        let (priors, model_values) = match eval {
            Some(eval) => {
                if eval.policy.len() != legal.len() {
                    return Err(EvaluatorError::InvalidOutput(format!(
                        "policy has {} entries for {} legal actions",
                        eval.policy.len(),
                        legal.len()
                    ))
                    .into());
                }
                if eval.values.len() != num_players {
                    return Err(EvaluatorError::InvalidOutput(format!(
                        "value vector has {} entries for {} players",
                        eval.values.len(),
                        num_players
                    ))
                    .into());
                }
                (normalize_priors(&eval.policy), Some(eval.values))
            }
            None => (vec![self.config.default_prior; legal.len()], None),
        };

        let rollout_values = if self.config.rollout_weight > 0.0 {
            self.stats.rollouts += 1;
            Some(rollout(
                self.game,
                &state,
                &mut *self.rollout_agent,
                &mut self.rng,
                self.config.rollout_max_moves,
            )?)
        } else {
            None
        };

        let values = blend_values(
            model_values.as_deref(),
            self.config.model_value_weight,
            rollout_values.as_deref(),
            self.config.rollout_weight,
        );

        let edges = legal
            .into_iter()
            .zip(priors)
            .map(|(action, prior)| ActionEdge::new(action, prior))
            .collect();
        self.tree.get_mut(node_id).expand(edges);
        Ok(values)
    }

    fn finish_simulation(&mut self, path: &[PathStep], leaf: NodeId, values: &[f32]) {
        self.tree.backup(path, leaf, values, 1);
        self.stats.simulations += 1;
        // Expanding a fresh root is not charged to the budget
        if !path.is_empty() {
            self.remaining = self.remaining.saturating_sub(1);
        }

        trace!(
            leaf = leaf.0,
            depth = path.len(),
            values = ?values,
            "MCTS simulation complete"
        );
    }

    /// Add Dirichlet noise to root priors once the root has edges.
    fn maybe_apply_root_noise(&mut self) {
        if self.noise_applied {
            return;
        }
        let root_id = self.tree.root();
        if !self.tree.get(root_id).is_expanded() {
            return;
        }
        self.noise_applied = true;

        let alpha = self.config.dirichlet_alpha;
        let eps = self.config.dirichlet_epsilon;
        if alpha <= 0.0 || eps <= 0.0 {
            return;
        }

        let num_edges = self.tree.get(root_id).edges.len();
        let noise = dirichlet_noise(num_edges, alpha, &mut self.rng);
        for (edge, eta) in self.tree.get_mut(root_id).edges.iter_mut().zip(noise) {
            edge.prior = (1.0 - eps) * edge.prior + eps * eta;
        }
    }

    /// Start the reduced-candidate-set pass if one is configured and has
    /// not run yet.
    fn begin_refinement(&mut self) -> bool {
        if self.refined {
            return false;
        }
        self.refined = true;

        let Some(refinement) = self.config.refinement else {
            return false;
        };
        if refinement.simulations == 0 {
            return false;
        }

        let edges = self.edge_stats(self.tree.root(), false);
        let candidates = top_by_visits(&edges, refinement.candidates);
        debug!(
            candidates = ?candidates,
            simulations = refinement.simulations,
            "Starting refinement pass"
        );
        self.candidates = Some(candidates);
        self.remaining = refinement.simulations;
        true
    }

    fn finish(&mut self) -> Result<SearchResult<G::Action>, SearchError> {
        self.finished = true;

        let root_id = self.tree.root();
        let edges = self.edge_stats(root_id, true);
        let pos = self
            .decision
            .decide(&edges, &mut self.rng)
            .ok_or(SearchError::NoLegalMoves)?;
        let action_index = edges.get(pos).map(|e| e.index).ok_or_else(|| {
            SearchError::Protocol(format!(
                "decision rule picked position {} of {} edges",
                pos,
                edges.len()
            ))
        })?;

        let root = self.tree.get(root_id);
        debug!(
            simulations = self.stats.simulations,
            nodes = self.tree.len(),
            action_index,
            "MCTS search complete"
        );

        Ok(SearchResult {
            action: root.edges[action_index].action.clone(),
            action_index,
            policy: root.visit_distribution(),
            values: root.values.clone(),
            simulations: self.stats.simulations as u32,
            stats: self.stats.clone(),
        })
    }
}

impl<'a, G: Game> Computation for Search<'a, G> {
    type Snapshot = G::State;
    type Output = SearchResult<G::Action>;

    fn resume(
        &mut self,
        results: Vec<EvalResult>,
    ) -> Result<Step<Self::Output, Self::Snapshot>, SearchError> {
        if self.finished {
            return Err(SearchError::Protocol("search already finished".into()));
        }

        match self.pending.take() {
            Some(pending) => {
                if results.len() != 1 {
                    let got = results.len();
                    self.pending = Some(pending);
                    return Err(SearchError::Protocol(format!(
                        "expected 1 evaluation for the pending leaf, got {}",
                        got
                    )));
                }
                let eval = results.into_iter().next();
                let values = self.expand(pending.leaf, eval)?;
                self.finish_simulation(&pending.path, pending.leaf, &values);
            }
            None if !results.is_empty() => {
                return Err(SearchError::Protocol(format!(
                    "received {} evaluations with nothing pending",
                    results.len()
                )));
            }
            None => {}
        }

        self.run_until_blocked()
    }
}

fn new_node<G: Game>(game: &G, state: G::State) -> SearchNode<G> {
    let terminal = game.terminal_values(&state);
    let to_play = if terminal.is_some() {
        0
    } else {
        game.current_player(&state)
    };
    MctsNode::new(state, to_play, terminal)
}

fn fold_bucket<K>(outcomes: &[ChanceOutcome<K>], overflow: ChanceOverflow) -> usize {
    match overflow {
        ChanceOverflow::FirstSeen => 0,
        ChanceOverflow::MostVisited => {
            let mut best = 0;
            for (i, outcome) in outcomes.iter().enumerate() {
                if outcome.count > outcomes[best].count {
                    best = i;
                }
            }
            best
        }
    }
}

/// Normalize policy weights; non-positive or non-finite weights count as
/// zero, and an all-zero policy becomes uniform.
fn normalize_priors(policy: &[f32]) -> Vec<f32> {
    let valid = |p: f32| p.is_finite() && p > 0.0;
    let sum: f32 = policy.iter().copied().filter(|p| valid(*p)).sum();
    if sum > 0.0 {
        policy
            .iter()
            .map(|&p| if valid(p) { p / sum } else { 0.0 })
            .collect()
    } else {
        vec![1.0 / policy.len().max(1) as f32; policy.len()]
    }
}

/// Weighted average of the value sources that are present.
fn blend_values(
    model: Option<&[f32]>,
    model_weight: f32,
    rollout: Option<&[f32]>,
    rollout_weight: f32,
) -> Vec<f32> {
    match (model, rollout) {
        (Some(m), Some(r)) => {
            let total = model_weight + rollout_weight;
            m.iter()
                .zip(r)
                .map(|(a, b)| (model_weight * a + rollout_weight * b) / total)
                .collect()
        }
        (Some(m), None) => m.to_vec(),
        (None, Some(r)) => r.to_vec(),
        (None, None) => Vec::new(),
    }
}

/// Generate Dirichlet-distributed noise using Gamma variates.
fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Vec<f32> {
    use rand_distr::{Distribution, Gamma};

    let Ok(gamma) = Gamma::new(alpha as f64, 1.0) else {
        return vec![1.0 / n.max(1) as f32; n];
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    }

    samples
}

/// Convenience function to run a single MCTS search, calling the
/// evaluator directly for every leaf.
pub fn run_mcts<G, E>(
    game: &G,
    evaluator: &E,
    config: MctsConfig,
    state: G::State,
    rng: ChaCha20Rng,
) -> Result<SearchResult<G::Action>, SearchError>
where
    G: Game,
    E: Evaluator<G::State> + ?Sized,
{
    let mut search = Search::new(game, config, state, rng)?;
    drive(&mut search, evaluator)
}

/// Seed a child generator from `rng`.
pub(crate) fn fork_rng(rng: &mut ChaCha20Rng) -> ChaCha20Rng {
    use rand::SeedableRng;
    ChaCha20Rng::seed_from_u64(rng.gen())
}
