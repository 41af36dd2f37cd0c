//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",      // Current directory
    "../config.toml",   // Parent directory (when running from subdirectory)
    "/app/config.toml", // Docker container
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by CARTRIDGE_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
/// 4. Docker container path (/app/config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var("CARTRIDGE_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from CARTRIDGE_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "CARTRIDGE_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (i32, u64, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = v,
            Ok(Err(_)) => warn!("Ignoring unparseable {}", $key),
            Err(_) => {}
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: CARTRIDGE_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.env_id, "CARTRIDGE_COMMON_ENV_ID");
    env_override!(config, common.data_dir, "CARTRIDGE_COMMON_DATA_DIR");
    env_override!(config, common.log_level, "CARTRIDGE_COMMON_LOG_LEVEL");

    // MCTS
    env_override!(
        config,
        mcts.num_simulations,
        "CARTRIDGE_MCTS_NUM_SIMULATIONS",
        parse
    );
    env_override!(
        config,
        mcts.exploration_bias,
        "CARTRIDGE_MCTS_EXPLORATION_BIAS",
        parse
    );
    env_override!(
        config,
        mcts.max_chance_branches,
        "CARTRIDGE_MCTS_MAX_CHANCE_BRANCHES",
        parse
    );
    env_override!(
        config,
        mcts.chance_overflow,
        "CARTRIDGE_MCTS_CHANCE_OVERFLOW"
    );
    env_override!(
        config,
        mcts.model_value_weight,
        "CARTRIDGE_MCTS_MODEL_VALUE_WEIGHT",
        parse
    );
    env_override!(
        config,
        mcts.rollout_weight,
        "CARTRIDGE_MCTS_ROLLOUT_WEIGHT",
        parse
    );
    env_override!(
        config,
        mcts.rollout_max_moves,
        "CARTRIDGE_MCTS_ROLLOUT_MAX_MOVES",
        parse
    );
    env_override!(
        config,
        mcts.dirichlet_alpha,
        "CARTRIDGE_MCTS_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        mcts.dirichlet_epsilon,
        "CARTRIDGE_MCTS_DIRICHLET_EPSILON",
        parse
    );

    // Actor
    env_override!(config, actor.actor_id, "CARTRIDGE_ACTOR_ACTOR_ID");
    env_override!(
        config,
        actor.max_episodes,
        "CARTRIDGE_ACTOR_MAX_EPISODES",
        parse
    );
    env_override!(
        config,
        actor.games_per_round,
        "CARTRIDGE_ACTOR_GAMES_PER_ROUND",
        parse
    );
    env_override!(config, actor.max_moves, "CARTRIDGE_ACTOR_MAX_MOVES", parse);
    env_override!(
        config,
        actor.log_interval,
        "CARTRIDGE_ACTOR_LOG_INTERVAL",
        parse
    );
    env_override!(
        config,
        actor.exploration_moves,
        "CARTRIDGE_ACTOR_EXPLORATION_MOVES",
        parse
    );
    env_override!(
        config,
        actor.exploration_temperature,
        "CARTRIDGE_ACTOR_EXPLORATION_TEMPERATURE",
        parse
    );

    // Storage
    env_override!(
        config,
        storage.target_samples,
        "CARTRIDGE_STORAGE_TARGET_SAMPLES",
        parse
    );
    env_override!(config, storage.sample_log, "CARTRIDGE_STORAGE_SAMPLE_LOG");
    env_override!(
        config,
        storage.sample_log_max_cost,
        "CARTRIDGE_STORAGE_SAMPLE_LOG_MAX_COST",
        parse
    );
    env_override!(config, storage.episode_dir, "CARTRIDGE_STORAGE_EPISODE_DIR");
    env_override!(
        config,
        storage.episode_dir_max_bytes,
        "CARTRIDGE_STORAGE_EPISODE_DIR_MAX_BYTES",
        parse
    );

    config
}
