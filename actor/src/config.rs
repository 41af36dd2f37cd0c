//! Configuration for the Actor service
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by env vars, then config.toml.

use anyhow::{anyhow, Result};
use clap::Parser;
use engine_config::{load_config, CentralConfig};
use mcts::{ChanceOverflow, MctsConfig, SelfPlayConfig};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

// Default value functions that read from central config
fn default_actor_id() -> String {
    CENTRAL_CONFIG.actor.actor_id.clone()
}
fn default_env_id() -> String {
    CENTRAL_CONFIG.common.env_id.clone()
}
fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}
fn default_data_dir() -> String {
    CENTRAL_CONFIG.common.data_dir.clone()
}
fn default_max_episodes() -> i32 {
    CENTRAL_CONFIG.actor.max_episodes
}
fn default_games_per_round() -> usize {
    CENTRAL_CONFIG.actor.games_per_round
}
fn default_max_moves() -> u32 {
    CENTRAL_CONFIG.actor.max_moves
}
fn default_log_interval() -> u32 {
    CENTRAL_CONFIG.actor.log_interval
}
fn default_exploration_moves() -> u32 {
    CENTRAL_CONFIG.actor.exploration_moves
}
fn default_exploration_temperature() -> f64 {
    CENTRAL_CONFIG.actor.exploration_temperature
}
fn default_num_simulations() -> u32 {
    CENTRAL_CONFIG.mcts.num_simulations
}
fn default_exploration_bias() -> f64 {
    CENTRAL_CONFIG.mcts.exploration_bias
}
fn default_max_chance_branches() -> usize {
    CENTRAL_CONFIG.mcts.max_chance_branches
}
fn default_chance_overflow() -> String {
    CENTRAL_CONFIG.mcts.chance_overflow.clone()
}
fn default_model_value_weight() -> f64 {
    CENTRAL_CONFIG.mcts.model_value_weight
}
fn default_rollout_weight() -> f64 {
    CENTRAL_CONFIG.mcts.rollout_weight
}
fn default_rollout_max_moves() -> u32 {
    CENTRAL_CONFIG.mcts.rollout_max_moves
}
fn default_dirichlet_alpha() -> f64 {
    CENTRAL_CONFIG.mcts.dirichlet_alpha
}
fn default_dirichlet_epsilon() -> f64 {
    CENTRAL_CONFIG.mcts.dirichlet_epsilon
}
fn default_target_samples() -> usize {
    CENTRAL_CONFIG.storage.target_samples
}
fn default_sample_log() -> String {
    CENTRAL_CONFIG.storage.sample_log.clone()
}
fn default_sample_log_max_cost() -> f64 {
    CENTRAL_CONFIG.storage.sample_log_max_cost
}
fn default_episode_dir() -> String {
    CENTRAL_CONFIG.storage.episode_dir.clone()
}
fn default_episode_dir_max_bytes() -> u64 {
    CENTRAL_CONFIG.storage.episode_dir_max_bytes
}

#[derive(Parser, Debug, Clone)]
#[command(name = "actor")]
#[command(about = "Cartridge2 Actor - Batched self-play episode runner")]
#[command(
    long_about = "Actor that plays batches of self-play episodes with MCTS, driving every
search in a round through one inference scheduler, and keeps the results in
an in-memory replay buffer, a cost-capped SQLite sample log and a size-capped
episode directory.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Unique actor identifier
    #[arg(long, default_value_t = default_actor_id())]
    pub actor_id: String,

    /// Environment ID to run (e.g., tictactoe)
    #[arg(long, default_value_t = default_env_id())]
    pub env_id: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Data directory; relative storage paths are resolved against it
    #[arg(long, default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Maximum episodes to run (-1 for unlimited)
    #[arg(long, default_value_t = default_max_episodes(), allow_hyphen_values = true)]
    pub max_episodes: i32,

    /// Episodes searched together per scheduler run
    #[arg(long, default_value_t = default_games_per_round())]
    pub games_per_round: usize,

    /// Moves after which an unfinished episode is abandoned
    #[arg(long, default_value_t = default_max_moves())]
    pub max_moves: u32,

    /// Log progress every N episodes (0 to disable)
    #[arg(long, default_value_t = default_log_interval())]
    pub log_interval: u32,

    /// Opening moves sampled in proportion to visit counts
    #[arg(long, default_value_t = default_exploration_moves())]
    pub exploration_moves: u32,

    /// Sampling temperature for the opening moves
    #[arg(long, default_value_t = default_exploration_temperature())]
    pub exploration_temperature: f64,

    /// Number of MCTS simulations per move
    #[arg(long, default_value_t = default_num_simulations())]
    pub num_simulations: u32,

    /// Exploration constant of the PUCT rule
    #[arg(long, default_value_t = default_exploration_bias())]
    pub exploration_bias: f64,

    /// Distinct chance outcomes tracked per action
    #[arg(long, default_value_t = default_max_chance_branches())]
    pub max_chance_branches: usize,

    /// Where overflow chance outcomes are folded (first_seen, most_visited)
    #[arg(long, default_value_t = default_chance_overflow())]
    pub chance_overflow: String,

    /// Weight of the model value at expanded leaves
    #[arg(long, default_value_t = default_model_value_weight())]
    pub model_value_weight: f64,

    /// Weight of the random playout value at expanded leaves
    #[arg(long, default_value_t = default_rollout_weight())]
    pub rollout_weight: f64,

    /// Move limit for one random playout
    #[arg(long, default_value_t = default_rollout_max_moves())]
    pub rollout_max_moves: u32,

    /// Dirichlet noise alpha at the root (0 to disable)
    #[arg(long, default_value_t = default_dirichlet_alpha())]
    pub dirichlet_alpha: f64,

    /// Fraction of each root prior replaced by noise
    #[arg(long, default_value_t = default_dirichlet_epsilon())]
    pub dirichlet_epsilon: f64,

    /// Samples the in-memory replay buffer keeps
    #[arg(long, default_value_t = default_target_samples())]
    pub target_samples: usize,

    /// SQLite sample log file
    #[arg(long, default_value_t = default_sample_log())]
    pub sample_log: String,

    /// Total cost the sample log retains (one unit per sample)
    #[arg(long, default_value_t = default_sample_log_max_cost())]
    pub sample_log_max_cost: f64,

    /// Directory of serialized episodes
    #[arg(long, default_value_t = default_episode_dir())]
    pub episode_dir: String,

    /// Byte budget of the episode directory
    #[arg(long, default_value_t = default_episode_dir_max_bytes())]
    pub episode_dir_max_bytes: u64,

    /// Seed for episode randomness (time-based when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.actor_id.is_empty() {
            return Err(anyhow!("actor_id cannot be empty"));
        }

        if self.env_id.is_empty() {
            return Err(anyhow!("env_id cannot be empty"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        if self.games_per_round == 0 {
            return Err(anyhow!("games_per_round must be greater than 0"));
        }

        if self.max_moves == 0 {
            return Err(anyhow!("max_moves must be greater than 0"));
        }

        if self.target_samples == 0 {
            return Err(anyhow!("target_samples must be greater than 0"));
        }

        if !(self.sample_log_max_cost.is_finite() && self.sample_log_max_cost >= 0.0) {
            return Err(anyhow!("sample_log_max_cost must be finite and >= 0"));
        }

        if !(self.exploration_temperature.is_finite() && self.exploration_temperature >= 0.0) {
            return Err(anyhow!("exploration_temperature must be finite and >= 0"));
        }

        self.chance_overflow()?;
        self.mcts_config()
            .validate()
            .map_err(|e| anyhow!("invalid search settings: {}", e))?;

        Ok(())
    }

    pub fn chance_overflow(&self) -> Result<ChanceOverflow> {
        match self.chance_overflow.as_str() {
            "first_seen" => Ok(ChanceOverflow::FirstSeen),
            "most_visited" => Ok(ChanceOverflow::MostVisited),
            other => Err(anyhow!(
                "invalid chance_overflow '{}', expected first_seen or most_visited",
                other
            )),
        }
    }

    /// Search settings for self-play. Call after `validate`.
    pub fn mcts_config(&self) -> MctsConfig {
        let mut config = MctsConfig::for_training()
            .with_simulations(self.num_simulations)
            .with_exploration_bias(self.exploration_bias as f32)
            .with_max_chance_branches(self.max_chance_branches)
            .with_chance_overflow(self.chance_overflow().unwrap_or_default())
            .with_value_weights(self.model_value_weight as f32, self.rollout_weight as f32)
            .with_dirichlet(self.dirichlet_alpha as f32, self.dirichlet_epsilon as f32);
        config.rollout_max_moves = self.rollout_max_moves;
        config
    }

    pub fn selfplay_config(&self) -> SelfPlayConfig {
        SelfPlayConfig {
            exploration_moves: self.exploration_moves,
            exploration_temperature: self.exploration_temperature as f32,
            max_moves: self.max_moves,
        }
    }

    pub fn sample_log_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.sample_log)
    }

    pub fn episode_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.episode_dir)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_episodes < 0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn base_config() -> Config {
        Config {
            actor_id: "actor".into(),
            env_id: "tictactoe".into(),
            log_level: "info".into(),
            data_dir: "../data".into(),
            max_episodes: 1,
            games_per_round: 4,
            max_moves: 20,
            log_interval: 10,
            exploration_moves: 2,
            exploration_temperature: 1.0,
            num_simulations: 30,
            exploration_bias: 1.25,
            max_chance_branches: 16,
            chance_overflow: "first_seen".into(),
            model_value_weight: 1.0,
            rollout_weight: 0.0,
            rollout_max_moves: 100,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            target_samples: 100,
            sample_log: "samples.db".into(),
            sample_log_max_cost: 50.0,
            episode_dir: "episodes".into(),
            episode_dir_max_bytes: 1 << 20,
            seed: Some(7),
        }
    }

    #[test]
    fn validate_accepts_valid_configuration() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_actor_id() {
        let mut cfg = base_config();
        cfg.actor_id.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("actor_id"));
    }

    #[test]
    fn validate_rejects_empty_env_id() {
        let mut cfg = base_config();
        cfg.env_id.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("env_id"));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "nope".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn validate_rejects_zero_games_per_round() {
        let mut cfg = base_config();
        cfg.games_per_round = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("games_per_round"));
    }

    #[test]
    fn validate_rejects_unknown_chance_overflow() {
        let mut cfg = base_config();
        cfg.chance_overflow = "random".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("chance_overflow"));
    }

    #[test]
    fn validate_rejects_search_without_value_source() {
        let mut cfg = base_config();
        cfg.model_value_weight = 0.0;
        cfg.rollout_weight = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid search settings"));
    }

    #[test]
    fn validate_rejects_negative_log_cost() {
        let mut cfg = base_config();
        cfg.sample_log_max_cost = -1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("sample_log_max_cost"));
    }

    #[test]
    fn validate_accepts_negative_max_episodes() {
        let mut cfg = base_config();
        cfg.max_episodes = -1; // Unlimited mode
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_unlimited());
    }

    #[test]
    fn mcts_config_carries_overrides() {
        let mut cfg = base_config();
        cfg.chance_overflow = "most_visited".into();
        cfg.rollout_weight = 0.5;
        let mcts = cfg.mcts_config();
        assert_eq!(mcts.num_simulations, 30);
        assert_eq!(mcts.chance_overflow, ChanceOverflow::MostVisited);
        assert!((mcts.rollout_weight - 0.5).abs() < f32::EPSILON);
        assert_eq!(mcts.rollout_max_moves, 100);
    }

    #[test]
    fn storage_paths_are_under_data_dir() {
        let cfg = base_config();
        assert_eq!(cfg.sample_log_path(), PathBuf::from("../data/samples.db"));
        assert_eq!(cfg.episode_dir_path(), PathBuf::from("../data/episodes"));
    }

    #[test]
    fn cli_overrides_defaults() {
        let cfg = Config::try_parse_from([
            "actor",
            "--num-simulations",
            "64",
            "--max-episodes",
            "-1",
            "--chance-overflow",
            "most_visited",
        ])
        .unwrap();
        assert_eq!(cfg.num_simulations, 64);
        assert_eq!(cfg.max_episodes, -1);
        assert!(cfg.validate().is_ok());
    }
}
