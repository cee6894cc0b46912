//! Progress callbacks for front ends that want to show what a run is doing.

use graphqna_shared::{AttemptRecord, Category, MethodId, RetrievalPlan};

/// Observer for orchestration progress.
pub trait ProgressReporter: Send + Sync {
    /// Called once the category is known (`None` when an override skipped classification).
    fn planned(&self, category: Option<Category>, plan: &RetrievalPlan);
    /// Called before each attempt; `position` is 1-based.
    fn attempt_started(&self, method: MethodId, position: usize, total: usize);
    /// Called after each attempt has been evaluated.
    fn attempt_finished(&self, record: &AttemptRecord);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn planned(&self, _category: Option<Category>, _plan: &RetrievalPlan) {}
    fn attempt_started(&self, _method: MethodId, _position: usize, _total: usize) {}
    fn attempt_finished(&self, _record: &AttemptRecord) {}
}
