//! Batching model adapter.
//!
//! Callers submit snapshots and get back a future; nothing reaches the
//! backend until [`BatchingEvaluator::flush`] concatenates every queued
//! request into one backend call and routes each slice of the results to
//! the request that asked for it.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};

type Reply = Result<Vec<EvalResult>, EvaluatorError>;

struct QueuedRequest<S> {
    states: Vec<S>,
    reply: oneshot::Sender<Reply>,
}

/// Results for one submitted request, delivered after the next flush.
///
/// Resolves to [`EvaluatorError::Cancelled`] if the adapter is dropped
/// before the request is flushed.
#[derive(Debug)]
pub struct PendingEvaluation {
    rx: oneshot::Receiver<Reply>,
}

impl PendingEvaluation {
    /// Take the result if it has been delivered, without waiting.
    pub fn try_take(&mut self) -> Option<Reply> {
        match self.rx.try_recv() {
            Ok(reply) => Some(reply),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EvaluatorError::Cancelled)),
        }
    }
}

impl Future for PendingEvaluation {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Reply> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or_else(|_| Err(EvaluatorError::Cancelled)))
    }
}

/// Wraps a backend and coalesces concurrent requests into single calls.
pub struct BatchingEvaluator<S, E> {
    inner: E,
    queue: Mutex<Vec<QueuedRequest<S>>>,
}

impl<S, E> BatchingEvaluator<S, E>
where
    E: Evaluator<S>,
{
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Queue `states` for the next flush. An empty request resolves
    /// immediately to an empty result.
    pub fn submit(&self, states: Vec<S>) -> PendingEvaluation {
        let (tx, rx) = oneshot::channel();
        if states.is_empty() {
            let _ = tx.send(Ok(Vec::new()));
            return PendingEvaluation { rx };
        }

        match self.lock_queue() {
            Ok(mut queue) => queue.push(QueuedRequest { states, reply: tx }),
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }
        PendingEvaluation { rx }
    }

    /// Same call shape as [`Evaluator::evaluate_batch`], but the states join
    /// the shared queue and the future resolves after the next [`flush`].
    ///
    /// [`flush`]: BatchingEvaluator::flush
    pub async fn evaluate_batch(&self, states: Vec<S>) -> Reply {
        self.submit(states).await
    }

    /// Number of requests waiting for a flush.
    pub fn pending(&self) -> usize {
        self.lock_queue().map(|q| q.len()).unwrap_or(0)
    }

    /// Send every queued request to the backend in one call.
    ///
    /// Returns the number of requests answered. On failure every queued
    /// caller receives the same error, which is also returned.
    pub fn flush(&self) -> Result<usize, EvaluatorError> {
        let queued = std::mem::take(&mut *self.lock_queue()?);
        if queued.is_empty() {
            return Ok(0);
        }

        let mut states = Vec::new();
        let mut slots = Vec::with_capacity(queued.len());
        for request in queued {
            slots.push((request.states.len(), request.reply));
            states.extend(request.states);
        }

        let outcome = match self.inner.evaluate_batch(&states) {
            Ok(results) if results.len() == states.len() => Ok(results),
            Ok(results) => Err(EvaluatorError::InvalidOutput(format!(
                "backend returned {} results for {} states",
                results.len(),
                states.len()
            ))),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(results) => {
                debug!(
                    requests = slots.len(),
                    batch_size = states.len(),
                    "Flushed inference batch"
                );
                let answered = slots.len();
                let mut results = results.into_iter();
                for (count, reply) in slots {
                    // Receiver may have been dropped; nothing to deliver then
                    let _ = reply.send(Ok(results.by_ref().take(count).collect()));
                }
                Ok(answered)
            }
            Err(e) => {
                for (_, reply) in slots {
                    let _ = reply.send(Err(e.clone()));
                }
                Err(e)
            }
        }
    }

    fn lock_queue(&self) -> Result<MutexGuard<'_, Vec<QueuedRequest<S>>>, EvaluatorError> {
        self.queue
            .lock()
            .map_err(|_| EvaluatorError::EvaluationFailed("request queue lock poisoned".into()))
    }
}
