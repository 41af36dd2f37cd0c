//! Actor - Batched self-play worker for Cartridge2
//!
//! A long-running process that:
//! 1. Plays rounds of self-play episodes, every search in a round sharing
//!    one inference scheduler
//! 2. Keeps the newest samples in an in-memory replay buffer
//! 3. Appends each sample to a cost-capped SQLite log
//! 4. Writes each episode to a size-capped directory

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod actor;
mod config;

use crate::actor::Actor;
use crate::config::Config;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Validate configuration
    config.validate()?;

    // Initialize tracing
    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    let max_episode_description = if config.is_unlimited() {
        "unlimited".to_string()
    } else {
        config.max_episodes.to_string()
    };
    info!(
        max_episodes = config.max_episodes,
        "Actor will run {} episodes", max_episode_description
    );

    info!(
        "Starting actor {} for environment {}",
        config.actor_id, config.env_id
    );

    let actor = Arc::new(Actor::new(config)?);

    // Setup graceful shutdown
    let shutdown_actor = Arc::clone(&actor);
    let shutdown_handle = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping actor...");
                shutdown_actor.shutdown();
            }
            Err(e) => error!("Failed to listen for ctrl+c: {}", e),
        }
    });

    // Run the actor
    let run_result = actor.run().await;

    shutdown_handle.abort();

    match run_result {
        Ok(_) => {
            info!("Actor completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Actor failed: {}", e);
            Err(e)
        }
    }
}
