//! Fallback controller: walks a plan one method at a time until an answer is
//! accepted, the plan runs out, or the caller cancels.
//!
//! ```text
//! Pending(i) ──▶ Attempting(i, m) ──▶ Attempted(i, record) ──▶ Accepted
//!     ▲                 │                      │
//!     └──── i + 1 ◀─────┼──────── rejected ────┘
//!                       ▼
//!                   Cancelled          Pending(len) ──▶ Exhausted
//! ```
//!
//! A method is only invoked after the evaluator has rejected the one before it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use graphqna_shared::{AttemptRecord, MethodId, Outcome, Question, RejectReason, RetrievalPlan};

use crate::cancel::CancellationToken;
use crate::evaluator::AnswerEvaluator;
use crate::progress::ProgressReporter;
use crate::registry::MethodRegistry;

/// Terminal result of walking a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOutcome {
    pub outcome: Outcome,
    /// Every attempt, in plan order.
    pub attempts: Vec<AttemptRecord>,
    /// The accepted method, if any.
    pub selected: Option<MethodId>,
    /// Accepted answer, the last attempt's raw answer when exhausted, or empty when cancelled.
    pub answer: String,
}

enum State {
    Pending { index: usize },
    Attempting { index: usize, method: MethodId },
    Attempted { index: usize, record: AttemptRecord },
    Accepted,
    Exhausted,
    Cancelled,
}

/// Result of a single attempt before it enters the trace.
enum Step {
    Evaluated(AttemptRecord),
    Aborted(AttemptRecord),
}

/// Drives a [`RetrievalPlan`] through the registry, evaluating each attempt.
#[derive(Debug, Clone)]
pub struct FallbackController {
    registry: Arc<MethodRegistry>,
    evaluator: Arc<AnswerEvaluator>,
    attempt_timeout: Duration,
}

impl FallbackController {
    pub fn new(
        registry: Arc<MethodRegistry>,
        evaluator: Arc<AnswerEvaluator>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            evaluator,
            attempt_timeout,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Try each planned method in order. Never fails: every upstream problem
    /// becomes a rejected attempt, and cancellation is a distinct outcome.
    pub async fn run(
        &self,
        plan: &RetrievalPlan,
        question: &Question,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> ControllerOutcome {
        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(plan.len());
        let mut state = State::Pending { index: 0 };

        loop {
            state = match state {
                State::Pending { index } => {
                    if cancel.is_cancelled() {
                        State::Cancelled
                    } else {
                        match plan.methods().get(index) {
                            Some(&method) => State::Attempting { index, method },
                            None => State::Exhausted,
                        }
                    }
                }
                State::Attempting { index, method } => {
                    progress.attempt_started(method, index + 1, plan.len());
                    match self.attempt(method, question, cancel).await {
                        Step::Evaluated(record) => State::Attempted { index, record },
                        Step::Aborted(record) => {
                            progress.attempt_finished(&record);
                            attempts.push(record);
                            State::Cancelled
                        }
                    }
                }
                State::Attempted { index, record } => {
                    progress.attempt_finished(&record);
                    let accepted = record.acceptable;
                    attempts.push(record);
                    if accepted {
                        State::Accepted
                    } else {
                        State::Pending { index: index + 1 }
                    }
                }
                State::Accepted => {
                    let last = attempts.last();
                    let selected = last.map(|r| r.method);
                    let answer = last.and_then(|r| r.answer.clone()).unwrap_or_default();
                    return ControllerOutcome {
                        outcome: Outcome::Accepted,
                        attempts,
                        selected,
                        answer,
                    };
                }
                State::Exhausted => {
                    let answer = attempts
                        .last()
                        .and_then(|r| r.answer.clone())
                        .unwrap_or_default();
                    warn!(attempts = attempts.len(), "every planned method was rejected");
                    return ControllerOutcome {
                        outcome: Outcome::Exhausted,
                        attempts,
                        selected: None,
                        answer,
                    };
                }
                State::Cancelled => {
                    info!(attempts = attempts.len(), "orchestration cancelled");
                    return ControllerOutcome {
                        outcome: Outcome::Cancelled,
                        attempts,
                        selected: None,
                        answer: String::new(),
                    };
                }
            };
        }
    }

    #[instrument(skip_all, fields(method = %method))]
    async fn attempt(
        &self,
        method: MethodId,
        question: &Question,
        cancel: &CancellationToken,
    ) -> Step {
        let started = Instant::now();
        let invoke = tokio::time::timeout(self.attempt_timeout, self.registry.invoke(method, question));

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = invoke => Some(result),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let Some(raw) = raw else {
            return Step::Aborted(AttemptRecord {
                method,
                answer: None,
                context: Vec::new(),
                acceptable: false,
                reason: Some(RejectReason::Cancelled),
                diagnostic: Some("cancelled by caller".into()),
                elapsed_ms,
            });
        };

        let record = match raw {
            Err(_) => {
                warn!(timeout_ms = self.attempt_timeout.as_millis() as u64, "attempt timed out");
                AttemptRecord {
                    method,
                    answer: None,
                    context: Vec::new(),
                    acceptable: false,
                    reason: Some(RejectReason::Timeout),
                    diagnostic: Some(format!(
                        "no response within {} ms",
                        self.attempt_timeout.as_millis()
                    )),
                    elapsed_ms,
                }
            }
            Ok(Err(failure)) => {
                warn!(error = %failure, "attempt failed");
                let verdict = self.evaluator.evaluate(None, &[], method);
                AttemptRecord {
                    method,
                    answer: None,
                    context: Vec::new(),
                    acceptable: verdict.acceptable,
                    reason: verdict.reason,
                    diagnostic: Some(failure.reason),
                    elapsed_ms,
                }
            }
            Ok(Ok(found)) => {
                let verdict = self
                    .evaluator
                    .evaluate(Some(&found.answer), &found.context, method);
                AttemptRecord {
                    method,
                    answer: Some(found.answer),
                    context: found.context,
                    acceptable: verdict.acceptable,
                    reason: verdict.reason,
                    diagnostic: None,
                    elapsed_ms,
                }
            }
        };

        match record.reason {
            None => info!(elapsed_ms, "answer accepted"),
            Some(reason) => debug!(%reason, elapsed_ms, "answer rejected"),
        }
        Step::Evaluated(record)
    }
}
