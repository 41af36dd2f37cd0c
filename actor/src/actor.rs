//! Self-play worker: batches of episodes in, capped stores out.

use anyhow::{anyhow, Result};
use games_tictactoe::{State, TicTacToe};
use mcts::{
    Episode, MctsConfig, Scheduler, SelfPlayConfig, SelfPlayEpisode, TrainingSample,
    UniformEvaluator,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Mutex, MutexGuard,
};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use storage::{EpisodeBuffer, LogDir, SqliteLog};
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Cost charged against the sample log for one training sample.
const SAMPLE_COST: f64 = 1.0;

/// Totals for one scheduler run.
#[derive(Debug, Default)]
struct RoundSummary {
    episodes: u32,
    moves: u32,
    samples: usize,
    evaluations: u64,
    batches: u64,
    max_batch: usize,
    /// Summed final values per seat
    outcome_totals: Vec<f32>,
}

impl RoundSummary {
    fn add_outcome(&mut self, outcome: &[f32]) {
        if self.outcome_totals.len() < outcome.len() {
            self.outcome_totals.resize(outcome.len(), 0.0);
        }
        for (total, v) in self.outcome_totals.iter_mut().zip(outcome) {
            *total += v;
        }
    }
}

pub struct Actor {
    config: Config,
    game: TicTacToe,
    evaluator: UniformEvaluator<TicTacToe>,
    mcts: MctsConfig,
    selfplay: SelfPlayConfig,
    rng: Mutex<ChaCha20Rng>,
    buffer: Mutex<EpisodeBuffer<TrainingSample<State>>>,
    sample_log: SqliteLog,
    episode_dir: Mutex<LogDir>,
    episode_count: AtomicU32,
    shutdown_signal: AtomicBool,
}

impl Actor {
    pub fn new(config: Config) -> Result<Self> {
        if config.env_id != "tictactoe" {
            return Err(anyhow!("Unknown game '{}'", config.env_id));
        }
        let game = TicTacToe::new();

        let mcts = config.mcts_config();
        mcts.validate()?;
        let selfplay = config.selfplay_config();
        info!(
            simulations = mcts.num_simulations,
            exploration_bias = mcts.exploration_bias,
            max_chance_branches = mcts.max_chance_branches,
            chance_overflow = ?mcts.chance_overflow,
            model_value_weight = mcts.model_value_weight,
            rollout_weight = mcts.rollout_weight,
            exploration_moves = selfplay.exploration_moves,
            "MCTS config"
        );

        let seed = match config.seed {
            Some(seed) => seed,
            None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos() as u64,
        };

        let buffer = EpisodeBuffer::new(config.target_samples)?;

        let sample_log_path = config.sample_log_path();
        let sample_log = SqliteLog::open(&sample_log_path, config.sample_log_max_cost)?;
        info!(
            path = %sample_log_path.display(),
            max_cost = config.sample_log_max_cost,
            retained = sample_log.len()?,
            "Sample log opened"
        );

        let episode_dir_path = config.episode_dir_path();
        let episode_dir = LogDir::open(&episode_dir_path, config.episode_dir_max_bytes)?;
        info!(
            path = %episode_dir_path.display(),
            max_bytes = config.episode_dir_max_bytes,
            current_bytes = episode_dir.total_size()?,
            "Episode directory opened"
        );

        Ok(Self {
            evaluator: UniformEvaluator::new(game),
            game,
            mcts,
            selfplay,
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            buffer: Mutex::new(buffer),
            sample_log,
            episode_dir: Mutex::new(episode_dir),
            episode_count: AtomicU32::new(0),
            shutdown_signal: AtomicBool::new(false),
            config,
        })
    }

    pub async fn run(&self) -> Result<()> {
        info!(
            actor_id = %self.config.actor_id,
            max_episodes = self.config.max_episodes,
            games_per_round = self.config.games_per_round,
            "Actor starting main loop"
        );

        loop {
            // Check shutdown signal
            if self.shutdown_signal.load(Ordering::Relaxed) {
                info!("Shutdown signal received, stopping actor");
                break;
            }

            let round_size = match self.remaining_episodes() {
                Some(0) => {
                    info!(
                        "Reached maximum episodes ({}), stopping",
                        self.config.max_episodes
                    );
                    break;
                }
                Some(n) => n.min(self.config.games_per_round),
                None => self.config.games_per_round,
            };

            // Searches are CPU-bound; keep them off the async workers
            let round_start = Instant::now();
            match tokio::task::block_in_place(|| self.run_round(round_size)) {
                Ok(summary) => {
                    let duration = round_start.elapsed().as_secs_f64();
                    let avg_batch = if summary.batches > 0 {
                        summary.evaluations as f64 / summary.batches as f64
                    } else {
                        0.0
                    };
                    info!(
                        episodes = summary.episodes,
                        moves = summary.moves,
                        samples = summary.samples,
                        evaluations = summary.evaluations,
                        batches = summary.batches,
                        avg_batch = format!("{:.1}", avg_batch),
                        max_batch = summary.max_batch,
                        outcome_totals = ?summary.outcome_totals,
                        duration = format!("{:.2}s", duration),
                        "Round complete"
                    );
                }
                Err(e) => {
                    let count = self.episode_count.load(Ordering::Relaxed);
                    error!("Round after episode {} failed: {:#}", count, e);
                    // Continue with next round rather than stopping
                }
            }

            tokio::task::yield_now().await;
        }

        info!(
            episodes = self.episode_count(),
            buffered_samples = self.buffered_samples()?,
            "Actor stopped gracefully"
        );
        Ok(())
    }

    pub fn shutdown(&self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
        info!("Shutdown signal set");
    }

    /// Episodes still to run, or `None` when unlimited.
    fn remaining_episodes(&self) -> Option<usize> {
        if self.config.is_unlimited() {
            return None;
        }
        let done = self.episode_count.load(Ordering::Relaxed) as usize;
        Some((self.config.max_episodes as usize).saturating_sub(done))
    }

    /// Play `count` episodes through one scheduler and store every one.
    fn run_round(&self, count: usize) -> Result<RoundSummary> {
        let seeds: Vec<u64> = {
            let mut rng = self.lock_rng()?;
            (0..count).map(|_| rng.gen()).collect()
        };

        let tasks: Vec<_> = seeds
            .into_iter()
            .map(|seed| {
                SelfPlayEpisode::new(
                    &self.game,
                    self.mcts.clone(),
                    self.selfplay.clone(),
                    ChaCha20Rng::seed_from_u64(seed),
                )
            })
            .collect();

        let mut scheduler = Scheduler::new();
        let episodes = scheduler.run(tasks, &self.evaluator)?;
        let stats = scheduler.stats();
        debug!(
            rounds = stats.rounds,
            batches = stats.batches,
            evaluations = stats.evaluations,
            max_batch = stats.max_batch,
            "Scheduler finished"
        );

        let mut summary = RoundSummary {
            evaluations: stats.evaluations,
            batches: stats.batches,
            max_batch: stats.max_batch,
            ..RoundSummary::default()
        };
        for episode in episodes {
            summary.episodes += 1;
            summary.moves += episode.moves;
            summary.samples += episode.samples.len();
            summary.add_outcome(&episode.outcome);
            self.store_episode(episode)?;
        }
        Ok(summary)
    }

    /// Append one finished episode to all three stores.
    fn store_episode(&self, episode: Episode<State>) -> Result<PathBuf> {
        let payload = serde_json::to_vec(&episode)?;
        let items = episode
            .samples
            .iter()
            .map(|sample| Ok((SAMPLE_COST, serde_json::to_vec(sample)?)))
            .collect::<Result<Vec<_>>>()?;

        let rowids = self.sample_log.insert(&items)?;
        let path = self.lock_episode_dir()?.write_data(&payload)?;

        let samples = episode.samples.len();
        let evicted = if samples == 0 {
            warn!(path = %path.display(), "Episode produced no samples, not buffered");
            0
        } else {
            self.lock_buffer()?.add_episode(episode.samples)?
        };

        let count = self.episode_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            episode = count,
            moves = episode.moves,
            samples,
            evicted_episodes = evicted,
            first_rowid = ?rowids.first(),
            path = %path.display(),
            outcome = ?episode.outcome,
            "Episode stored"
        );

        if self.config.log_interval > 0 && count % self.config.log_interval == 0 {
            self.log_progress(count)?;
        }
        Ok(path)
    }

    fn log_progress(&self, count: u32) -> Result<()> {
        let (buffered_episodes, buffered_samples) = {
            let buffer = self.lock_buffer()?;
            (buffer.len(), buffer.sample_count())
        };
        let episode_bytes = self.lock_episode_dir()?.total_size()?;
        info!(
            episodes = count,
            buffered_episodes,
            buffered_samples,
            logged_samples = self.sample_log.len()?,
            episode_bytes,
            "Completed {} episodes",
            count
        );
        Ok(())
    }

    /// Acquire buffer lock with consistent error handling
    fn lock_buffer(&self) -> Result<MutexGuard<'_, EpisodeBuffer<TrainingSample<State>>>> {
        self.buffer
            .lock()
            .map_err(|e| anyhow!("Replay buffer lock poisoned: {}", e))
    }

    fn lock_episode_dir(&self) -> Result<MutexGuard<'_, LogDir>> {
        self.episode_dir
            .lock()
            .map_err(|e| anyhow!("Episode directory lock poisoned: {}", e))
    }

    fn lock_rng(&self) -> Result<MutexGuard<'_, ChaCha20Rng>> {
        self.rng
            .lock()
            .map_err(|e| anyhow!("RNG lock poisoned: {}", e))
    }

    pub fn episode_count(&self) -> u32 {
        self.episode_count.load(Ordering::Relaxed)
    }

    pub fn buffered_samples(&self) -> Result<usize> {
        Ok(self.lock_buffer()?.sample_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::base_config;
    use tempfile::{tempdir, TempDir};

    fn test_config(dir: &TempDir) -> Config {
        let mut config = base_config();
        config.data_dir = dir.path().to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_actor_nonexistent_game() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.env_id = "nonexistent_game".into();

        let err = Actor::new(config).err().unwrap();
        assert!(err.to_string().contains("Unknown game"));
    }

    #[test]
    fn test_actor_creates_stores() {
        let dir = tempdir().unwrap();
        let actor = Actor::new(test_config(&dir)).unwrap();
        assert!(dir.path().join("samples.db").exists());
        assert!(dir.path().join("episodes").is_dir());
        assert_eq!(actor.episode_count(), 0);
    }

    #[test]
    fn test_run_round_stores_every_episode() {
        let dir = tempdir().unwrap();
        let actor = Actor::new(test_config(&dir)).unwrap();

        let summary = actor.run_round(3).unwrap();

        assert_eq!(summary.episodes, 3);
        assert_eq!(actor.episode_count(), 3);
        // Tic-tac-toe needs at least five moves to finish
        assert!(summary.moves >= 15);
        assert_eq!(summary.samples, summary.moves as usize);
        assert!(summary.batches > 0);

        let episodes = actor.lock_episode_dir().unwrap().entries().unwrap();
        assert_eq!(episodes.len(), 3);
        let first: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&episodes[0].path).unwrap()).unwrap();
        assert!(first["samples"].as_array().is_some());

        assert_eq!(actor.buffered_samples().unwrap(), summary.samples);
        let logged = actor.sample_log.all().unwrap();
        assert_eq!(logged.len(), summary.samples.min(50));
        let sample: serde_json::Value = serde_json::from_slice(&logged[0].data).unwrap();
        let policy = sample["policy"].as_array().unwrap();
        assert!(!policy.is_empty());
    }

    #[test]
    fn test_sample_log_stays_within_cost() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.sample_log_max_cost = 12.0;
        let actor = Actor::new(config).unwrap();

        actor.run_round(4).unwrap();

        assert!(actor.sample_log.total_cost().unwrap() <= 12.0);
    }

    #[test]
    fn test_episode_limit_fails_round() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.max_moves = 3;
        let actor = Actor::new(config).unwrap();

        assert!(actor.run_round(2).is_err());
        assert_eq!(actor.episode_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_stops_at_max_episodes() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.max_episodes = 5;
        config.games_per_round = 4;
        config.log_interval = 2;
        let actor = Actor::new(config).unwrap();

        actor.run().await.unwrap();

        assert_eq!(actor.episode_count(), 5);
        let entries = actor.lock_episode_dir().unwrap().entries().unwrap();
        assert_eq!(entries.len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_before_run() {
        let dir = tempdir().unwrap();
        let mut config = test_config(&dir);
        config.max_episodes = -1;
        let actor = Actor::new(config).unwrap();

        actor.shutdown();
        actor.run().await.unwrap();

        assert_eq!(actor.episode_count(), 0);
    }

    #[test]
    fn test_same_seed_same_games() {
        let first_dir = tempdir().unwrap();
        let second_dir = tempdir().unwrap();
        let first = Actor::new(test_config(&first_dir)).unwrap();
        let second = Actor::new(test_config(&second_dir)).unwrap();

        first.run_round(2).unwrap();
        second.run_round(2).unwrap();

        let payloads = |actor: &Actor| -> Vec<Vec<u8>> {
            let items = actor.sample_log.all().unwrap();
            items.into_iter().map(|i| i.data).collect()
        };
        assert_eq!(payloads(&first), payloads(&second));
    }
}
