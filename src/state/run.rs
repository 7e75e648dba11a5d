// Per-run result accumulation

use crate::state::{Metrics, StatusCounts, TestIdentifier, TestResult, TestStatus, merge_metrics};
use indexmap::IndexMap;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

/// Results of one named test run, possibly spread over several re-runs
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestRunResult {
    name: String,
    expected_test_count: usize,
    #[serde(rename = "tests", serialize_with = "serialize_tests")]
    test_results: IndexMap<TestIdentifier, TestResult>,
    run_metrics: Metrics,
    is_run_complete: bool,
    run_failure_message: Option<String>,
    elapsed_ms: u64,
    #[serde(skip)]
    aggregate_metrics: bool,
}

impl TestRunResult {
    pub fn new(aggregate_metrics: bool) -> Self {
        Self {
            aggregate_metrics,
            ..Self::default()
        }
    }

    pub fn test_run_started(&mut self, name: &str, test_count: usize) {
        self.name = name.to_string();
        self.expected_test_count += test_count;
        self.is_run_complete = false;
        self.run_failure_message = None;
    }

    pub fn test_started(&mut self, test: &TestIdentifier) {
        // A re-run of the same test replaces its previous result in place
        self.test_results.insert(test.clone(), TestResult::new());
    }

    pub fn test_failed(&mut self, test: &TestIdentifier, trace: &str) {
        self.result_mut(test).fail(TestStatus::Failure, trace);
    }

    pub fn test_assumption_failure(&mut self, test: &TestIdentifier, trace: &str) {
        self.result_mut(test).fail(TestStatus::AssumptionFailure, trace);
    }

    pub fn test_ignored(&mut self, test: &TestIdentifier) {
        self.result_mut(test).status = TestStatus::Ignored;
    }

    pub fn test_ended(&mut self, test: &TestIdentifier, metrics: &Metrics) {
        self.result_mut(test).end(metrics);
    }

    pub fn test_run_failed(&mut self, message: &str) {
        self.run_failure_message = Some(message.to_string());
    }

    pub fn test_run_stopped(&mut self, elapsed_ms: u64) {
        self.elapsed_ms += elapsed_ms;
        self.is_run_complete = true;
    }

    pub fn test_run_ended(&mut self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.elapsed_ms += elapsed_ms;
        self.is_run_complete = true;
        merge_metrics(&mut self.run_metrics, run_metrics, self.aggregate_metrics);
    }

    fn result_mut(&mut self, test: &TestIdentifier) -> &mut TestResult {
        if !self.test_results.contains_key(test) {
            tracing::debug!("received event for unknown test {}, creating result", test);
        }
        self.test_results.entry(test.clone()).or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test_results(&self) -> &IndexMap<TestIdentifier, TestResult> {
        &self.test_results
    }

    pub fn run_metrics(&self) -> &Metrics {
        &self.run_metrics
    }

    /// Number of distinct tests seen
    pub fn num_tests(&self) -> usize {
        self.test_results.len()
    }

    /// Sum of the counts announced by every start of this run
    pub fn expected_test_count(&self) -> usize {
        self.expected_test_count
    }

    pub fn num_tests_in_state(&self, status: TestStatus) -> usize {
        self.test_results
            .values()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for result in self.test_results.values() {
            counts.add(result.status, 1);
        }
        counts
    }

    /// Tests that reached a final status
    pub fn completed_tests(&self) -> Vec<&TestIdentifier> {
        self.test_results
            .iter()
            .filter(|(_, r)| r.is_complete())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn is_run_complete(&self) -> bool {
        self.is_run_complete
    }

    pub fn is_run_failure(&self) -> bool {
        self.run_failure_message.is_some()
    }

    pub fn run_failure_message(&self) -> Option<&str> {
        self.run_failure_message.as_deref()
    }

    pub fn num_all_failed_tests(&self) -> usize {
        self.test_results
            .values()
            .filter(|r| r.status.is_failure())
            .count()
    }

    pub fn has_failed_tests(&self) -> bool {
        self.num_all_failed_tests() > 0
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

#[derive(Serialize)]
struct TestEntry<'a> {
    #[serde(flatten)]
    test: &'a TestIdentifier,
    #[serde(flatten)]
    result: &'a TestResult,
}

fn serialize_tests<S: Serializer>(
    tests: &IndexMap<TestIdentifier, TestResult>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(tests.len()))?;
    for (test, result) in tests {
        seq.serialize_element(&TestEntry { test, result })?;
    }
    seq.end()
}
