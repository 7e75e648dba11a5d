// JSON reporter - writes collected invocation results to a JSON file

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::Serialize;

use super::collecting::CollectingListener;
use super::{TestInvocationListener, read, write};
use crate::state::{
    InvocationContext, InvocationFailure, Metrics, TestIdentifier, TestRunResult, TestStatus,
    TestSummary,
};
use crate::time::now_rfc3339;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    build: Option<InvocationContext>,
    invocation_failure: Option<InvocationFailure>,
    elapsed_ms: u64,
    counts: BTreeMap<&'static str, usize>,
    runs: &'a [TestRunResult],
}

/// Collects results and writes one pretty-printed JSON document on
/// `invocation_ended`
pub struct JsonResultReporter {
    output_path: PathBuf,
    collector: CollectingListener,
    failure: RwLock<Option<InvocationFailure>>,
}

impl JsonResultReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            collector: CollectingListener::new(),
            failure: RwLock::new(None),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Sum numeric run metrics of re-executed runs instead of overwriting them
    pub fn with_aggregate_metrics(self, aggregate: bool) -> Self {
        self.collector.set_aggregate_metrics(aggregate);
        self
    }

    pub fn collector(&self) -> &CollectingListener {
        &self.collector
    }

    /// Write the report for everything collected so far
    pub fn write_report(&self, elapsed_ms: u64) -> Result<()> {
        let status_counts = self.collector.status_counts();
        let counts = TestStatus::ALL
            .iter()
            .map(|status| (status.as_str(), status_counts.get(*status)))
            .collect();
        let runs = self.collector.run_results();
        let report = JsonReport {
            generated_at: now_rfc3339(),
            build: self.collector.build_info(),
            invocation_failure: read(&self.failure).clone(),
            elapsed_ms,
            counts,
            runs: &runs,
        };

        let file = File::create(&self.output_path).with_context(|| {
            format!(
                "Failed to create JSON report file: {}",
                self.output_path.display()
            )
        })?;

        serde_json::to_writer_pretty(file, &report)
            .context("Failed to serialize test results to JSON")?;

        Ok(())
    }
}

impl TestInvocationListener for JsonResultReporter {
    fn invocation_started(&self, context: &InvocationContext) {
        *write(&self.failure) = None;
        self.collector.invocation_started(context);
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        self.collector.test_run_started(run_name, test_count);
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.collector.test_started(test);
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.collector.test_failed(test, trace);
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.collector.test_assumption_failure(test, trace);
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.collector.test_ignored(test);
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.collector.test_ended(test, metrics);
    }

    fn test_run_failed(&self, message: &str) {
        self.collector.test_run_failed(message);
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.collector.test_run_stopped(elapsed_ms);
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.collector.test_run_ended(elapsed_ms, run_metrics);
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
        *write(&self.failure) = Some(cause.clone());
    }

    fn invocation_ended(&self, elapsed_ms: u64) {
        match self.write_report(elapsed_ms) {
            Ok(()) => tracing::info!("wrote JSON report to {}", self.output_path.display()),
            Err(e) => tracing::error!("{:#}", e),
        }
    }

    fn summary(&self) -> Option<TestSummary> {
        Some(TestSummary::new(format!(
            "JSON report: {}",
            self.output_path.display()
        )))
    }

    fn listener_name(&self) -> &str {
        "JsonResultReporter"
    }
}
