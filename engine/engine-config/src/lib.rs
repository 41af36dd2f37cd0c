//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared by the
//! self-play binaries.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`CARTRIDGE_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! CARTRIDGE_<SECTION>_<KEY>=value
//!
//! Examples:
//!     CARTRIDGE_COMMON_DATA_DIR=/data
//!     CARTRIDGE_MCTS_NUM_SIMULATIONS=200
//!     CARTRIDGE_MCTS_CHANCE_OVERFLOW=most_visited
//!     CARTRIDGE_ACTOR_GAMES_PER_ROUND=64
//!     CARTRIDGE_STORAGE_EPISODE_DIR_MAX_BYTES=1048576
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;
