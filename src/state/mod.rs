// State module - Invocation data model
// Everything a listener observes or accumulates during one invocation

pub mod context;
pub mod identifier;
pub mod log;
pub mod metrics;
pub mod result;
pub mod run;

pub use context::{FailureKind, InvocationContext, InvocationFailure};
pub use identifier::TestIdentifier;
pub use log::{ByteSource, InputStreamSource, LogDataType, LogFile, TestSummary};
pub use metrics::{Metrics, merge_metrics};
pub use result::TestResult;
pub use run::TestRunResult;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Test status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Passed,
    Failure,
    AssumptionFailure,
    Ignored,
    Incomplete,
}

impl TestStatus {
    pub const ALL: [TestStatus; 5] = [
        TestStatus::Passed,
        TestStatus::Failure,
        TestStatus::AssumptionFailure,
        TestStatus::Ignored,
        TestStatus::Incomplete,
    ];

    /// Position in [`TestStatus::ALL`], used to index counters
    pub fn index(self) -> usize {
        match self {
            TestStatus::Passed => 0,
            TestStatus::Failure => 1,
            TestStatus::AssumptionFailure => 2,
            TestStatus::Ignored => 3,
            TestStatus::Incomplete => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Failure => "FAILURE",
            TestStatus::AssumptionFailure => "ASSUMPTION_FAILURE",
            TestStatus::Ignored => "IGNORED",
            TestStatus::Incomplete => "INCOMPLETE",
        }
    }

    /// True for the statuses counted as failed in summaries
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Failure | TestStatus::AssumptionFailure)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-status counters, indexed by [`TestStatus::index`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts([usize; 5]);

impl StatusCounts {
    pub fn get(&self, status: TestStatus) -> usize {
        self.0[status.index()]
    }

    pub fn add(&mut self, status: TestStatus, count: usize) {
        self.0[status.index()] += count;
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_index_matches_all_order() {
        for (i, status) in TestStatus::ALL.iter().enumerate() {
            assert_eq!(status.index(), i);
        }
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TestStatus::AssumptionFailure.to_string(), "ASSUMPTION_FAILURE");
        assert_eq!(TestStatus::Passed.to_string(), "PASSED");
    }

    #[test]
    fn test_status_counts_total() {
        let mut counts = StatusCounts::default();
        counts.add(TestStatus::Passed, 2);
        counts.add(TestStatus::Ignored, 1);
        assert_eq!(counts.get(TestStatus::Passed), 2);
        assert_eq!(counts.total(), 3);
    }
}
