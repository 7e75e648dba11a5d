// Console reporter - prints a per-run summary when the invocation ends

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

use super::collecting::CollectingListener;
use super::{TestInvocationListener, lock};
use crate::state::{
    InputStreamSource, InvocationContext, LogDataType, LogFile, Metrics, TestIdentifier,
    TestRunResult, TestStatus,
};

/// Collects results and prints a plain-text summary of every run, its tests
/// and the saved log files.
pub struct ConsoleResultReporter {
    collector: CollectingListener,
    log_files: Mutex<Vec<LogFile>>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleResultReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleResultReporter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            collector: CollectingListener::new(),
            log_files: Mutex::new(Vec::new()),
            out: Mutex::new(out),
        }
    }

    /// Sum numeric run metrics of re-executed runs instead of overwriting them
    pub fn with_aggregate_metrics(self, aggregate: bool) -> Self {
        self.collector.set_aggregate_metrics(aggregate);
        self
    }

    pub fn collector(&self) -> &CollectingListener {
        &self.collector
    }

    /// Render the summary printed on `invocation_ended`
    pub fn invocation_summary(&self) -> String {
        let runs = self.collector.run_results();
        let log_files = lock(&self.log_files);
        if runs.is_empty() && log_files.is_empty() {
            return "No test results\n".to_string();
        }

        let mut sections: Vec<String> = runs.iter().map(run_summary).collect();
        if !log_files.is_empty() {
            let mut section = String::from("Log Files:\n");
            for log_file in log_files.iter() {
                let _ = writeln!(section, "  {}", log_file.location());
            }
            sections.push(section);
        }
        format!("Test results:\n{}", sections.join("\n"))
    }
}

fn run_summary(run: &TestRunResult) -> String {
    let mut out = String::new();
    if run.num_tests() == 0 {
        if run.run_metrics().is_empty() {
            let _ = writeln!(out, "{}: No results", run.name());
            return out;
        }
        let _ = writeln!(out, "{}:", run.name());
    } else {
        let total = run.num_tests();
        let _ = writeln!(
            out,
            "{}: {} {}, {} Passed, {} Failed, {} Ignored",
            run.name(),
            total,
            if total == 1 { "Test" } else { "Tests" },
            run.num_tests_in_state(TestStatus::Passed),
            run.num_tests_in_state(TestStatus::Failure),
            run.num_tests_in_state(TestStatus::Ignored)
        );
        for (test, result) in run.test_results() {
            let _ = writeln!(
                out,
                "  {}: {} ({}ms)",
                test,
                result.status,
                result.duration_ms()
            );
            if let Some(trace) = &result.stack_trace {
                out.push_str("  stack=\n");
                for line in trace.lines() {
                    let _ = writeln!(out, "    {}", line);
                }
            }
            push_metrics(&mut out, &result.metrics, "    ");
        }
    }
    push_metrics(&mut out, run.run_metrics(), "  ");
    out
}

fn push_metrics(out: &mut String, metrics: &Metrics, indent: &str) {
    // Metrics is a BTreeMap so keys come out sorted
    for (key, value) in metrics {
        let _ = writeln!(out, "{}{}: {}", indent, key, value);
    }
}

impl TestInvocationListener for ConsoleResultReporter {
    fn invocation_started(&self, context: &InvocationContext) {
        lock(&self.log_files).clear();
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

    fn test_log_saved(
        &self,
        _data_name: &str,
        _data_type: LogDataType,
        _source: &dyn InputStreamSource,
        log_file: &LogFile,
    ) {
        lock(&self.log_files).push(log_file.clone());
    }

    fn invocation_ended(&self, _elapsed_ms: u64) {
        let summary = self.invocation_summary();
        let mut out = lock(&self.out);
        if let Err(e) = out.write_all(summary.as_bytes()).and_then(|()| out.flush()) {
            tracing::error!("failed to print invocation summary: {}", e);
        }
    }

    fn listener_name(&self) -> &str {
        "ConsoleResultReporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_invocation() {
        let reporter = ConsoleResultReporter::with_writer(Box::new(io::sink()));
        reporter.invocation_started(&InvocationContext::new("1"));
        assert_eq!(reporter.invocation_summary(), "No test results\n");
    }

    #[test]
    fn test_run_metrics_sorted() {
        let reporter = ConsoleResultReporter::with_writer(Box::new(io::sink()));
        reporter.test_run_started("Test Run", 0);
        let mut metrics = Metrics::new();
        metrics.insert("key2".to_string(), "value2".to_string());
        metrics.insert("key1".to_string(), "value1".to_string());
        reporter.test_run_ended(0, &metrics);
        assert_eq!(
            reporter.invocation_summary(),
            "Test results:\nTest Run:\n  key1: value1\n  key2: value2\n"
        );
    }

    #[test]
    fn test_logs_favour_url() {
        let reporter = ConsoleResultReporter::with_writer(Box::new(io::sink()));
        let source = crate::state::ByteSource::new("");
        reporter.test_log_saved(
            "a",
            LogDataType::Text,
            &source,
            &LogFile::new("/path/to/log1", Some("http://log1".to_string())),
        );
        reporter.test_log_saved("b", LogDataType::Text, &source, &LogFile::new("/path/to/log2", None));
        assert_eq!(
            reporter.invocation_summary(),
            "Test results:\nLog Files:\n  http://log1\n  /path/to/log2\n"
        );
    }

    #[test]
    fn test_run_without_results() {
        let reporter = ConsoleResultReporter::with_writer(Box::new(io::sink()));
        reporter.test_run_started("Test Run 4", 0);
        reporter.test_run_ended(0, &Metrics::new());
        assert_eq!(reporter.invocation_summary(), "Test results:\nTest Run 4: No results\n");
    }
}
