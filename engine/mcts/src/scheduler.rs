//! Poll-based scheduler that merges the inference requests of many
//! suspended computations into one backend call per round.
//!
//! A computation is resumed with the results for the snapshots it asked for
//! last time (an empty vec on the very first resume) and either finishes or
//! suspends again with a new, possibly empty, list of snapshots.

use serde::Serialize;
use tracing::{debug, trace};

use crate::evaluator::{EvalResult, Evaluator};
use crate::search::SearchError;

/// Outcome of resuming a computation.
#[derive(Debug)]
pub enum Step<T, S> {
    /// The computation finished with this output.
    Done(T),
    /// The computation needs these snapshots evaluated, in this order,
    /// before it can continue.
    Pending(Vec<S>),
}

/// A resumable computation that needs inference to make progress.
pub trait Computation {
    type Snapshot;
    type Output;

    /// Continue with the results for the previously requested snapshots.
    fn resume(
        &mut self,
        results: Vec<EvalResult>,
    ) -> Result<Step<Self::Output, Self::Snapshot>, SearchError>;
}

/// Counters accumulated over every `run` of a scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Rounds in which at least one computation was resumed.
    pub rounds: u64,
    /// Backend calls made.
    pub batches: u64,
    /// Snapshots sent to the backend.
    pub evaluations: u64,
    /// Largest single backend call.
    pub max_batch: usize,
    /// Computations that finished.
    pub completed: u64,
}

/// Drives a set of computations to completion in rounds.
///
/// Each round resumes every unfinished computation once, concatenates all
/// requested snapshots in computation order, and issues exactly one backend
/// call for them (none if nothing was requested). If the backend fails the
/// whole run fails and no computation sees a partial result.
#[derive(Debug, Default)]
pub struct Scheduler {
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Run `tasks` to completion. Outputs are returned in input order.
    pub fn run<C, E>(&mut self, tasks: Vec<C>, evaluator: &E) -> Result<Vec<C::Output>, SearchError>
    where
        C: Computation,
        E: Evaluator<C::Snapshot> + ?Sized,
    {
        let mut tasks = tasks;
        let mut inboxes: Vec<Vec<EvalResult>> = tasks.iter().map(|_| Vec::new()).collect();
        let mut outputs: Vec<Option<C::Output>> = tasks.iter().map(|_| None).collect();
        let mut remaining = tasks.len();

        while remaining > 0 {
            self.stats.rounds += 1;

            let mut batch: Vec<C::Snapshot> = Vec::new();
            let mut owners: Vec<(usize, usize)> = Vec::new();

            for (i, task) in tasks.iter_mut().enumerate() {
                if outputs[i].is_some() {
                    continue;
                }
                let results = std::mem::take(&mut inboxes[i]);
                match task.resume(results)? {
                    Step::Done(output) => {
                        outputs[i] = Some(output);
                        remaining -= 1;
                        self.stats.completed += 1;
                    }
                    Step::Pending(requests) => {
                        owners.push((i, requests.len()));
                        batch.extend(requests);
                    }
                }
            }

            if batch.is_empty() {
                trace!(
                    round = self.stats.rounds,
                    "No inference requested this round"
                );
                continue;
            }

            let results = evaluator.evaluate_batch(&batch)?;
            if results.len() != batch.len() {
                return Err(SearchError::BatchMismatch {
                    expected: batch.len(),
                    actual: results.len(),
                });
            }

            self.stats.batches += 1;
            self.stats.evaluations += batch.len() as u64;
            self.stats.max_batch = self.stats.max_batch.max(batch.len());
            debug!(
                round = self.stats.rounds,
                batch_size = batch.len(),
                waiting = owners.len(),
                "Dispatched inference batch"
            );

            let mut results = results.into_iter();
            for (i, count) in owners {
                inboxes[i] = results.by_ref().take(count).collect();
            }
        }

        outputs
            .into_iter()
            .map(|o| {
                o.ok_or_else(|| SearchError::Protocol("computation never finished".into()))
            })
            .collect()
    }
}

/// Drive a single computation, calling the backend directly whenever it
/// suspends.
pub fn drive<C, E>(computation: &mut C, evaluator: &E) -> Result<C::Output, SearchError>
where
    C: Computation,
    E: Evaluator<C::Snapshot> + ?Sized,
{
    let mut results = Vec::new();
    loop {
        match computation.resume(results)? {
            Step::Done(output) => return Ok(output),
            Step::Pending(requests) => {
                results = if requests.is_empty() {
                    Vec::new()
                } else {
                    let evaluated = evaluator.evaluate_batch(&requests)?;
                    if evaluated.len() != requests.len() {
                        return Err(SearchError::BatchMismatch {
                            expected: requests.len(),
                            actual: evaluated.len(),
                        });
                    }
                    evaluated
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluatorError;
    use std::sync::Mutex;

    /// Echoes each snapshot back as its value and records batch sizes.
    #[derive(Default)]
    struct EchoEvaluator {
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl Evaluator<u32> for EchoEvaluator {
        fn evaluate(&self, state: &u32) -> Result<EvalResult, EvaluatorError> {
            Ok(EvalResult {
                values: vec![*state as f32],
                policy: Vec::new(),
            })
        }

        fn evaluate_batch(&self, states: &[u32]) -> Result<Vec<EvalResult>, EvaluatorError> {
            self.batches.lock().unwrap().push(states.len());
            if self.fail {
                return Err(EvaluatorError::EvaluationFailed("backend down".into()));
            }
            states.iter().map(|s| self.evaluate(s)).collect()
        }
    }

    /// Requests `script[k]` snapshots on its k-th suspension, then finishes
    /// with every value it received.
    struct Scripted {
        id: u32,
        script: Vec<usize>,
        round: usize,
        expecting: usize,
        received: Vec<f32>,
        resumes: usize,
    }

    impl Scripted {
        fn new(id: u32, script: Vec<usize>) -> Self {
            Self {
                id,
                script,
                round: 0,
                expecting: 0,
                received: Vec::new(),
                resumes: 0,
            }
        }
    }

    impl Computation for Scripted {
        type Snapshot = u32;
        type Output = (u32, Vec<f32>, usize);

        fn resume(
            &mut self,
            results: Vec<EvalResult>,
        ) -> Result<Step<Self::Output, u32>, SearchError> {
            self.resumes += 1;
            if results.len() != self.expecting {
                return Err(SearchError::Protocol(format!(
                    "task {} expected {} results, got {}",
                    self.id,
                    self.expecting,
                    results.len()
                )));
            }
            self.received.extend(results.iter().map(|r| r.values[0]));

            match self.script.get(self.round) {
                Some(&count) => {
                    self.round += 1;
                    self.expecting = count;
                    let requests = (0..count as u32).map(|k| self.id * 100 + k).collect();
                    Ok(Step::Pending(requests))
                }
                None => Ok(Step::Done((
                    self.id,
                    std::mem::take(&mut self.received),
                    self.resumes,
                ))),
            }
        }
    }

    #[test]
    fn test_results_routed_to_requesters() {
        let evaluator = EchoEvaluator::default();
        let tasks = vec![
            Scripted::new(1, vec![2, 1]),
            Scripted::new(2, vec![0, 3]),
            Scripted::new(3, vec![]),
        ];

        let mut scheduler = Scheduler::new();
        let outputs = scheduler.run(tasks, &evaluator).unwrap();

        assert_eq!(outputs[0].0, 1);
        assert_eq!(outputs[0].1, vec![100.0, 101.0, 100.0]);
        assert_eq!(outputs[1].0, 2);
        assert_eq!(outputs[1].1, vec![200.0, 201.0, 202.0]);
        assert_eq!(outputs[2], (3, vec![], 1));
    }

    #[test]
    fn test_one_backend_call_per_round() {
        let evaluator = EchoEvaluator::default();
        let tasks = vec![
            Scripted::new(1, vec![1, 1, 1]),
            Scripted::new(2, vec![2, 2]),
        ];

        let mut scheduler = Scheduler::new();
        scheduler.run(tasks, &evaluator).unwrap();

        assert_eq!(*evaluator.batches.lock().unwrap(), vec![3, 3, 1]);
        let stats = scheduler.stats();
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.evaluations, 7);
        assert_eq!(stats.max_batch, 3);
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn test_empty_round_skips_backend() {
        let evaluator = EchoEvaluator::default();
        let tasks = vec![Scripted::new(1, vec![0, 0]), Scripted::new(2, vec![0])];

        let mut scheduler = Scheduler::new();
        let outputs = scheduler.run(tasks, &evaluator).unwrap();

        assert!(evaluator.batches.lock().unwrap().is_empty());
        assert_eq!(outputs[0].2, 3);
        assert_eq!(outputs[1].2, 2);
        assert_eq!(scheduler.stats().rounds, 3);
    }

    #[test]
    fn test_no_tasks() {
        let evaluator = EchoEvaluator::default();
        let outputs = Scheduler::new()
            .run(Vec::<Scripted>::new(), &evaluator)
            .unwrap();
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_backend_failure_fails_run() {
        let evaluator = EchoEvaluator {
            fail: true,
            ..Default::default()
        };
        let tasks = vec![Scripted::new(1, vec![1]), Scripted::new(2, vec![1])];

        let result = Scheduler::new().run(tasks, &evaluator);
        assert!(matches!(
            result,
            Err(SearchError::Evaluator(EvaluatorError::EvaluationFailed(_)))
        ));
        assert_eq!(*evaluator.batches.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_drive_single_computation() {
        let evaluator = EchoEvaluator::default();
        let mut task = Scripted::new(4, vec![1, 0, 2]);
        let (id, values, resumes) = drive(&mut task, &evaluator).unwrap();
        assert_eq!(id, 4);
        assert_eq!(values, vec![400.0, 400.0, 401.0]);
        assert_eq!(resumes, 4);
        assert_eq!(*evaluator.batches.lock().unwrap(), vec![1, 2]);
    }
}
