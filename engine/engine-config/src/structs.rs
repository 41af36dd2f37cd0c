//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_env_id() -> String {
    defaults::env_id().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_num_sims() -> u32 {
    defaults::num_simulations()
}
fn d_exploration_bias() -> f64 {
    defaults::exploration_bias()
}
fn d_max_chance_branches() -> usize {
    defaults::max_chance_branches()
}
fn d_chance_overflow() -> String {
    defaults::chance_overflow().into()
}
fn d_model_value_weight() -> f64 {
    defaults::model_value_weight()
}
fn d_rollout_weight() -> f64 {
    defaults::rollout_weight()
}
fn d_rollout_max_moves() -> u32 {
    defaults::rollout_max_moves()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_epsilon() -> f64 {
    defaults::dirichlet_epsilon()
}
fn d_actor_id() -> String {
    defaults::actor_id().into()
}
fn d_max_episodes() -> i32 {
    defaults::max_episodes()
}
fn d_games_per_round() -> usize {
    defaults::games_per_round()
}
fn d_max_moves() -> u32 {
    defaults::max_moves()
}
fn d_log_interval() -> u32 {
    defaults::log_interval()
}
fn d_exploration_moves() -> u32 {
    defaults::exploration_moves()
}
fn d_exploration_temperature() -> f64 {
    defaults::exploration_temperature()
}
fn d_target_samples() -> usize {
    defaults::target_samples()
}
fn d_sample_log() -> String {
    defaults::sample_log().into()
}
fn d_sample_log_max_cost() -> f64 {
    defaults::sample_log_max_cost()
}
fn d_episode_dir() -> String {
    defaults::episode_dir().into()
}
fn d_episode_dir_max_bytes() -> u64 {
    defaults::episode_dir_max_bytes()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub actor: ActorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_env_id")]
    pub env_id: String,
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir().into(),
            env_id: defaults::env_id().into(),
            log_level: defaults::log_level().into(),
        }
    }
}

/// MCTS (Monte Carlo Tree Search) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MctsConfig {
    #[serde(default = "d_num_sims")]
    pub num_simulations: u32,
    #[serde(default = "d_exploration_bias")]
    pub exploration_bias: f64,
    #[serde(default = "d_max_chance_branches")]
    pub max_chance_branches: usize,
    /// `first_seen` or `most_visited`
    #[serde(default = "d_chance_overflow")]
    pub chance_overflow: String,
    #[serde(default = "d_model_value_weight")]
    pub model_value_weight: f64,
    #[serde(default = "d_rollout_weight")]
    pub rollout_weight: f64,
    #[serde(default = "d_rollout_max_moves")]
    pub rollout_max_moves: u32,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_dirichlet_epsilon")]
    pub dirichlet_epsilon: f64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: defaults::num_simulations(),
            exploration_bias: defaults::exploration_bias(),
            max_chance_branches: defaults::max_chance_branches(),
            chance_overflow: defaults::chance_overflow().into(),
            model_value_weight: defaults::model_value_weight(),
            rollout_weight: defaults::rollout_weight(),
            rollout_max_moves: defaults::rollout_max_moves(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_epsilon: defaults::dirichlet_epsilon(),
        }
    }
}

/// Actor (self-play) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActorConfig {
    #[serde(default = "d_actor_id")]
    pub actor_id: String,
    /// Negative means unlimited
    #[serde(default = "d_max_episodes")]
    pub max_episodes: i32,
    /// Episodes searched together in one scheduler run
    #[serde(default = "d_games_per_round")]
    pub games_per_round: usize,
    #[serde(default = "d_max_moves")]
    pub max_moves: u32,
    #[serde(default = "d_log_interval")]
    pub log_interval: u32,
    #[serde(default = "d_exploration_moves")]
    pub exploration_moves: u32,
    #[serde(default = "d_exploration_temperature")]
    pub exploration_temperature: f64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            actor_id: defaults::actor_id().into(),
            max_episodes: defaults::max_episodes(),
            games_per_round: defaults::games_per_round(),
            max_moves: defaults::max_moves(),
            log_interval: defaults::log_interval(),
            exploration_moves: defaults::exploration_moves(),
            exploration_temperature: defaults::exploration_temperature(),
        }
    }
}

/// Capacities and locations of the self-play data stores
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default = "d_target_samples")]
    pub target_samples: usize,
    /// SQLite file for the cost-capped sample log, relative to data_dir
    #[serde(default = "d_sample_log")]
    pub sample_log: String,
    #[serde(default = "d_sample_log_max_cost")]
    pub sample_log_max_cost: f64,
    /// Directory of serialized episodes, relative to data_dir
    #[serde(default = "d_episode_dir")]
    pub episode_dir: String,
    #[serde(default = "d_episode_dir_max_bytes")]
    pub episode_dir_max_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            target_samples: defaults::target_samples(),
            sample_log: defaults::sample_log().into(),
            sample_log_max_cost: defaults::sample_log_max_cost(),
            episode_dir: defaults::episode_dir().into(),
            episode_dir_max_bytes: defaults::episode_dir_max_bytes(),
        }
    }
}
