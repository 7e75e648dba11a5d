// Collecting listener - accumulates every run of an invocation in memory

use std::sync::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;

use super::{TestInvocationListener, lock, read, write};
use crate::state::{
    InvocationContext, Metrics, StatusCounts, TestIdentifier, TestRunResult, TestStatus,
};

#[derive(Debug, Default)]
struct RunTable {
    runs: IndexMap<String, TestRunResult>,
    current: Option<usize>,
    // Receives events that arrive before any run was started
    detached: TestRunResult,
    counts: StatusCounts,
    counts_dirty: bool,
}

impl RunTable {
    fn current_mut(&mut self) -> &mut TestRunResult {
        match self.current.and_then(|i| self.runs.get_index_mut(i)) {
            Some((_, run)) => run,
            None => &mut self.detached,
        }
    }

    fn counts(&mut self) -> StatusCounts {
        if self.counts_dirty {
            let mut counts = StatusCounts::default();
            for run in self.runs.values() {
                for status in TestStatus::ALL {
                    counts.add(status, run.num_tests_in_state(status));
                }
            }
            self.counts = counts;
            self.counts_dirty = false;
        }
        self.counts
    }
}

/// A listener that collects all test results.
///
/// Results for a run name seen twice are merged into the first run's entry.
/// The run table is safe to read from other threads while events arrive,
/// but the callbacks themselves must be delivered in order.
#[derive(Debug, Default)]
pub struct CollectingListener {
    table: Mutex<RunTable>,
    aggregate_metrics: AtomicBool,
    build_info: RwLock<Option<InvocationContext>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum numeric run metrics of re-executed runs instead of overwriting them
    pub fn with_aggregate_metrics(self, aggregate: bool) -> Self {
        self.set_aggregate_metrics(aggregate);
        self
    }

    /// Applies to runs started after the call
    pub fn set_aggregate_metrics(&self, aggregate: bool) {
        self.aggregate_metrics.store(aggregate, Ordering::SeqCst);
    }

    /// Build info reported through `invocation_started`
    pub fn build_info(&self) -> Option<InvocationContext> {
        read(&self.build_info).clone()
    }

    pub fn set_build_info(&self, context: InvocationContext) {
        *write(&self.build_info) = Some(context);
    }

    /// Results of the most recently started run.
    ///
    /// The run may still be in progress; check
    /// [`TestRunResult::is_run_complete`] before relying on it.
    pub fn current_run_results(&self) -> TestRunResult {
        lock(&self.table).current_mut().clone()
    }

    /// Results for all runs, in the order they were first started
    pub fn run_results(&self) -> Vec<TestRunResult> {
        lock(&self.table).runs.values().cloned().collect()
    }

    /// Borrow the run table without cloning it
    pub fn with_run_results<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = &TestRunResult>) -> R,
    ) -> R {
        let table = lock(&self.table);
        f(&mut table.runs.values())
    }

    pub fn status_counts(&self) -> StatusCounts {
        lock(&self.table).counts()
    }

    /// Total number of tests across all runs
    pub fn num_total_tests(&self) -> usize {
        self.status_counts().total()
    }

    pub fn num_tests_in_state(&self, status: TestStatus) -> usize {
        self.status_counts().get(status)
    }

    /// Failed plus assumption-failed tests
    pub fn num_all_failed_tests(&self) -> usize {
        let counts = self.status_counts();
        counts.get(TestStatus::Failure) + counts.get(TestStatus::AssumptionFailure)
    }

    pub fn has_failed_tests(&self) -> bool {
        self.num_all_failed_tests() > 0
    }

    fn update(&self, f: impl FnOnce(&mut TestRunResult)) {
        let mut table = lock(&self.table);
        f(table.current_mut());
        table.counts_dirty = true;
    }
}

impl TestInvocationListener for CollectingListener {
    fn invocation_started(&self, context: &InvocationContext) {
        self.set_build_info(context.clone());
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        let aggregate = self.aggregate_metrics.load(Ordering::SeqCst);
        let mut table = lock(&self.table);
        let index = match table.runs.get_index_of(run_name) {
            Some(index) => {
                tracing::debug!("re-run of '{}', merging results", run_name);
                index
            }
            None => {
                table
                    .runs
                    .insert_full(run_name.to_string(), TestRunResult::new(aggregate))
                    .0
            }
        };
        table.current = Some(index);
        table.current_mut().test_run_started(run_name, test_count);
        table.counts_dirty = true;
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.update(|run| run.test_started(test));
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.update(|run| run.test_failed(test, trace));
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.update(|run| run.test_assumption_failure(test, trace));
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.update(|run| run.test_ignored(test));
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.update(|run| run.test_ended(test, metrics));
    }

    fn test_run_failed(&self, message: &str) {
        self.update(|run| run.test_run_failed(message));
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.update(|run| run.test_run_stopped(elapsed_ms));
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.update(|run| run.test_run_ended(elapsed_ms, run_metrics));
    }
}
