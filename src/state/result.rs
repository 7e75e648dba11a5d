// Test result structures

use crate::state::{Metrics, TestStatus};
use crate::time::now_unix_millis;
use serde::Serialize;

/// Outcome of a single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub status: TestStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub metrics: Metrics,
    pub stack_trace: Option<String>,
}

impl Default for TestResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TestResult {
    /// Create a result for a test that has just started
    pub fn new() -> Self {
        Self {
            status: TestStatus::Incomplete,
            start_time: now_unix_millis(),
            end_time: None,
            metrics: Metrics::new(),
            stack_trace: None,
        }
    }

    /// Record a failure without closing the result
    pub fn fail(&mut self, status: TestStatus, trace: &str) {
        self.status = status;
        self.stack_trace = Some(trace.to_string());
    }

    /// Close the result; a test with no reported outcome passes
    pub fn end(&mut self, metrics: &Metrics) {
        if self.status == TestStatus::Incomplete {
            self.status = TestStatus::Passed;
        }
        self.metrics.extend(metrics.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.end_time = Some(now_unix_millis().max(self.start_time));
    }

    /// Elapsed wall time, zero while the test is still running
    pub fn duration_ms(&self) -> i64 {
        self.end_time.map_or(0, |end| end - self.start_time)
    }

    pub fn is_complete(&self) -> bool {
        self.status != TestStatus::Incomplete
    }
}
