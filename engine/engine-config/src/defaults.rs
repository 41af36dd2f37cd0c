//! Default configuration values loaded from config.defaults.toml.
//!
//! The workspace-level TOML file is embedded at compile time so every binary
//! agrees on the same defaults.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    mcts: MctsDefaults,
    actor: ActorDefaults,
    storage: StorageDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    data_dir: String,
    env_id: String,
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct MctsDefaults {
    num_simulations: u32,
    exploration_bias: f64,
    max_chance_branches: usize,
    chance_overflow: String,
    model_value_weight: f64,
    rollout_weight: f64,
    rollout_max_moves: u32,
    dirichlet_alpha: f64,
    dirichlet_epsilon: f64,
}

#[derive(Debug, Deserialize)]
struct ActorDefaults {
    actor_id: String,
    max_episodes: i32,
    games_per_round: usize,
    max_moves: u32,
    log_interval: u32,
    exploration_moves: u32,
    exploration_temperature: f64,
}

#[derive(Debug, Deserialize)]
struct StorageDefaults {
    target_samples: usize,
    sample_log: String,
    sample_log_max_cost: f64,
    episode_dir: String,
    episode_dir_max_bytes: u64,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn data_dir() -> &'static str {
    &DEFAULTS.common.data_dir
}
pub fn env_id() -> &'static str {
    &DEFAULTS.common.env_id
}
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// MCTS
pub fn num_simulations() -> u32 {
    DEFAULTS.mcts.num_simulations
}
pub fn exploration_bias() -> f64 {
    DEFAULTS.mcts.exploration_bias
}
pub fn max_chance_branches() -> usize {
    DEFAULTS.mcts.max_chance_branches
}
pub fn chance_overflow() -> &'static str {
    &DEFAULTS.mcts.chance_overflow
}
pub fn model_value_weight() -> f64 {
    DEFAULTS.mcts.model_value_weight
}
pub fn rollout_weight() -> f64 {
    DEFAULTS.mcts.rollout_weight
}
pub fn rollout_max_moves() -> u32 {
    DEFAULTS.mcts.rollout_max_moves
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.mcts.dirichlet_alpha
}
pub fn dirichlet_epsilon() -> f64 {
    DEFAULTS.mcts.dirichlet_epsilon
}

// Actor
pub fn actor_id() -> &'static str {
    &DEFAULTS.actor.actor_id
}
pub fn max_episodes() -> i32 {
    DEFAULTS.actor.max_episodes
}
pub fn games_per_round() -> usize {
    DEFAULTS.actor.games_per_round
}
pub fn max_moves() -> u32 {
    DEFAULTS.actor.max_moves
}
pub fn log_interval() -> u32 {
    DEFAULTS.actor.log_interval
}
pub fn exploration_moves() -> u32 {
    DEFAULTS.actor.exploration_moves
}
pub fn exploration_temperature() -> f64 {
    DEFAULTS.actor.exploration_temperature
}

// Storage
pub fn target_samples() -> usize {
    DEFAULTS.storage.target_samples
}
pub fn sample_log() -> &'static str {
    &DEFAULTS.storage.sample_log
}
pub fn sample_log_max_cost() -> f64 {
    DEFAULTS.storage.sample_log_max_cost
}
pub fn episode_dir() -> &'static str {
    &DEFAULTS.storage.episode_dir
}
pub fn episode_dir_max_bytes() -> u64 {
    DEFAULTS.storage.episode_dir_max_bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        // Just accessing these will verify the TOML parses correctly
        assert_eq!(data_dir(), "./data");
        assert_eq!(env_id(), "tictactoe");
        assert_eq!(log_level(), "info");
    }

    #[test]
    fn test_mcts_defaults() {
        assert_eq!(num_simulations(), 800);
        assert!((exploration_bias() - 1.25).abs() < f64::EPSILON);
        assert_eq!(max_chance_branches(), 16);
        assert_eq!(chance_overflow(), "first_seen");
        assert_eq!(rollout_max_moves(), 1000);
    }

    #[test]
    fn test_actor_defaults() {
        assert_eq!(max_episodes(), -1);
        assert_eq!(games_per_round(), 32);
        assert_eq!(exploration_moves(), 4);
    }

    #[test]
    fn test_storage_defaults() {
        assert_eq!(target_samples(), 100_000);
        assert_eq!(sample_log(), "samples.db");
        assert_eq!(episode_dir_max_bytes(), 1 << 30);
    }
}
