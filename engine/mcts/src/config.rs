//! MCTS configuration parameters.

use std::sync::Arc;

use crate::decision::{DecisionRule, Greedy, Refinement};
use crate::search::SearchError;
use crate::selection::{Puct, SelectionRule};

/// What to do with a chance outcome once an edge already tracks
/// `max_chance_branches` distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChanceOverflow {
    /// Fold every overflow key into the first outcome ever observed.
    #[default]
    FirstSeen,
    /// Fold into the outcome observed most often so far (ties: first seen).
    MostVisited,
}

/// Configuration for Monte Carlo Tree Search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Number of simulations to run per search. A search always performs at
    /// least one simulation per legal root action.
    pub num_simulations: u32,

    /// Exploration constant for the selection rule (c_puct in AlphaZero).
    /// Higher values encourage exploration, lower values favor exploitation.
    pub exploration_bias: f32,

    /// Cap on distinct chance outcomes tracked under one action edge.
    pub max_chance_branches: usize,

    /// How outcomes beyond `max_chance_branches` are folded.
    pub chance_overflow: ChanceOverflow,

    /// Weight of the model's value estimate when a leaf is expanded.
    /// Zero means leaves are never sent to the inference backend.
    pub model_value_weight: f32,

    /// Weight of a random playout's result when a leaf is expanded.
    /// Zero disables playouts.
    pub rollout_weight: f32,

    /// Upper bound on moves in one playout.
    pub rollout_max_moves: u32,

    /// Prior assigned to every action when the model is not consulted.
    pub default_prior: f32,

    /// Dirichlet noise alpha for root node exploration.
    /// Set to 0.0 to disable noise (for evaluation/inference).
    pub dirichlet_alpha: f32,

    /// Fraction of each root prior replaced by Dirichlet noise.
    pub dirichlet_epsilon: f32,

    /// Rule used to descend from interior nodes.
    pub selection: Arc<dyn SelectionRule>,

    /// Rule used at the root; falls back to `selection` when unset.
    pub root_selection: Option<Arc<dyn SelectionRule>>,

    /// Rule that turns a searched root into the action actually played.
    pub decision: Arc<dyn DecisionRule>,

    /// Optional reduced-candidate-set pass run after the main simulations.
    pub refinement: Option<Refinement>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 800,
            exploration_bias: 1.25,
            max_chance_branches: 16,
            chance_overflow: ChanceOverflow::FirstSeen,
            model_value_weight: 1.0,
            rollout_weight: 0.0,
            rollout_max_moves: 1000,
            default_prior: 1.0,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            selection: Arc::new(Puct),
            root_selection: None,
            decision: Arc::new(Greedy),
            refinement: None,
        }
    }
}

impl MctsConfig {
    /// Create config for training (with exploration noise).
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Create config for evaluation/inference (no noise, greedy decision).
    pub fn for_evaluation() -> Self {
        Self {
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            ..Self::default()
        }
    }

    /// Create a fast config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_simulations: 50,
            dirichlet_alpha: 0.0,
            dirichlet_epsilon: 0.0,
            ..Self::default()
        }
    }

    /// Builder pattern: set number of simulations.
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    /// Builder pattern: set the exploration constant.
    pub fn with_exploration_bias(mut self, c: f32) -> Self {
        self.exploration_bias = c;
        self
    }

    /// Builder pattern: cap chance branches per action edge.
    pub fn with_max_chance_branches(mut self, n: usize) -> Self {
        self.max_chance_branches = n;
        self
    }

    /// Builder pattern: choose how overflow chance outcomes are folded.
    pub fn with_chance_overflow(mut self, overflow: ChanceOverflow) -> Self {
        self.chance_overflow = overflow;
        self
    }

    /// Builder pattern: set the model vs. playout value mix.
    pub fn with_value_weights(mut self, model: f32, rollout: f32) -> Self {
        self.model_value_weight = model;
        self.rollout_weight = rollout;
        self
    }

    /// Builder pattern: set root Dirichlet noise.
    pub fn with_dirichlet(mut self, alpha: f32, epsilon: f32) -> Self {
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Builder pattern: replace the interior selection rule.
    pub fn with_selection(mut self, rule: Arc<dyn SelectionRule>) -> Self {
        self.selection = rule;
        self
    }

    /// Builder pattern: use a different selection rule at the root.
    pub fn with_root_selection(mut self, rule: Arc<dyn SelectionRule>) -> Self {
        self.root_selection = Some(rule);
        self
    }

    /// Builder pattern: replace the decision rule.
    pub fn with_decision(mut self, rule: Arc<dyn DecisionRule>) -> Self {
        self.decision = rule;
        self
    }

    /// Builder pattern: enable the reduced-candidate-set pass.
    pub fn with_refinement(mut self, refinement: Refinement) -> Self {
        self.refinement = Some(refinement);
        self
    }

    /// Whether leaves need an inference result before they can be expanded.
    pub fn uses_model(&self) -> bool {
        self.model_value_weight > 0.0
    }

    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        let invalid = |msg: &str| Err(SearchError::InvalidConfig(msg.to_string()));

        if self.num_simulations == 0 {
            return invalid("num_simulations must be > 0");
        }
        if !(self.exploration_bias.is_finite() && self.exploration_bias >= 0.0) {
            return invalid("exploration_bias must be finite and >= 0");
        }
        if self.max_chance_branches == 0 {
            return invalid("max_chance_branches must be >= 1");
        }
        for (name, w) in [
            ("model_value_weight", self.model_value_weight),
            ("rollout_weight", self.rollout_weight),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(SearchError::InvalidConfig(format!(
                    "{} must be finite and >= 0",
                    name
                )));
            }
        }
        if self.model_value_weight + self.rollout_weight <= 0.0 {
            return invalid(
                "at least one of model_value_weight and rollout_weight must be > 0",
            );
        }
        if self.rollout_weight > 0.0 && self.rollout_max_moves == 0 {
            return invalid("rollout_max_moves must be > 0 when playouts are enabled");
        }
        if !(self.default_prior.is_finite() && self.default_prior > 0.0) {
            return invalid("default_prior must be finite and > 0");
        }
        if !(self.dirichlet_alpha.is_finite() && self.dirichlet_alpha >= 0.0) {
            return invalid("dirichlet_alpha must be finite and >= 0");
        }
        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return invalid("dirichlet_epsilon must be within [0, 1]");
        }
        if let Some(r) = &self.refinement {
            if r.candidates == 0 {
                return invalid("refinement.candidates must be >= 1");
            }
        }
        Ok(())
    }
}
