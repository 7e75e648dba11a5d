// JUnit reporter - outputs collected results in JUnit XML format

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::TestInvocationListener;
use super::collecting::CollectingListener;
use crate::state::{
    InvocationContext, Metrics, TestIdentifier, TestRunResult, TestStatus, TestSummary,
};

/// Collects results and writes one `testsuite` element per run on
/// `invocation_ended`
pub struct JunitResultReporter {
    output_path: PathBuf,
    collector: CollectingListener,
}

impl JunitResultReporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            collector: CollectingListener::new(),
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

    pub fn render(&self, elapsed_ms: u64) -> String {
        let runs = self.collector.run_results();
        let failures: usize = runs
            .iter()
            .map(|run| run.num_tests_in_state(TestStatus::Failure))
            .sum();
        let skipped: usize = runs.iter().map(skipped_count).sum();
        let name = self
            .collector
            .build_info()
            .and_then(|build| build.test_tag)
            .unwrap_or_else(|| "tradefed".to_string());

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            "<testsuites name=\"{}\" time=\"{:.3}\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\">",
            escape(&name),
            seconds(elapsed_ms as i64),
            self.collector.num_total_tests(),
            failures,
            skipped
        );
        for run in &runs {
            render_suite(&mut xml, run);
        }
        xml.push_str("</testsuites>\n");
        xml
    }

    pub fn write_report(&self, elapsed_ms: u64) -> Result<()> {
        let mut file = File::create(&self.output_path).with_context(|| {
            format!(
                "Failed to create JUnit report file: {}",
                self.output_path.display()
            )
        })?;

        file.write_all(self.render(elapsed_ms).as_bytes())
            .context("Failed to write JUnit XML content")?;

        Ok(())
    }
}

fn skipped_count(run: &TestRunResult) -> usize {
    run.num_tests_in_state(TestStatus::Ignored)
        + run.num_tests_in_state(TestStatus::AssumptionFailure)
}

fn seconds(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

fn render_suite(xml: &mut String, run: &TestRunResult) {
    let errors = usize::from(run.is_run_failure());
    let _ = writeln!(
        xml,
        "  <testsuite name=\"{}\" time=\"{:.3}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">",
        escape(run.name()),
        seconds(run.elapsed_ms() as i64),
        run.num_tests(),
        run.num_tests_in_state(TestStatus::Failure),
        errors,
        skipped_count(run)
    );

    if !run.run_metrics().is_empty() {
        xml.push_str("    <properties>\n");
        for (key, value) in run.run_metrics() {
            let _ = writeln!(
                xml,
                "      <property name=\"{}\" value=\"{}\" />",
                escape(key),
                escape(value)
            );
        }
        xml.push_str("    </properties>\n");
    }

    for (test, result) in run.test_results() {
        let _ = writeln!(
            xml,
            "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\">",
            escape(&test.test_name),
            escape(&test.class_name),
            seconds(result.duration_ms())
        );
        let trace = result.stack_trace.as_deref().unwrap_or_default();
        match result.status {
            TestStatus::Failure => {
                let message = trace.lines().next().unwrap_or("Test failed");
                let _ = writeln!(
                    xml,
                    "      <failure message=\"{}\">{}</failure>",
                    escape(message),
                    escape(trace)
                );
            }
            TestStatus::AssumptionFailure => {
                let message = trace.lines().next().unwrap_or("Assumption failed");
                let _ = writeln!(xml, "      <skipped message=\"{}\" />", escape(message));
            }
            TestStatus::Ignored => xml.push_str("      <skipped />\n"),
            TestStatus::Incomplete => {
                xml.push_str("      <error message=\"Test did not complete\" />\n")
            }
            TestStatus::Passed => {}
        }
        xml.push_str("    </testcase>\n");
    }

    if let Some(message) = run.run_failure_message() {
        let _ = writeln!(xml, "    <system-err>{}</system-err>", escape(message));
    }
    xml.push_str("  </testsuite>\n");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

impl TestInvocationListener for JunitResultReporter {
    fn invocation_started(&self, context: &InvocationContext) {
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

    fn invocation_ended(&self, elapsed_ms: u64) {
        match self.write_report(elapsed_ms) {
            Ok(()) => tracing::info!("wrote JUnit report to {}", self.output_path.display()),
            Err(e) => tracing::error!("{:#}", e),
        }
    }

    fn summary(&self) -> Option<TestSummary> {
        Some(TestSummary::new(format!(
            "JUnit report: {}",
            self.output_path.display()
        )))
    }

    fn listener_name(&self) -> &str {
        "JunitResultReporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }

    #[test]
    fn test_render_one_suite_per_run() {
        let reporter = JunitResultReporter::new("unused.xml");
        for run in ["first", "second"] {
            let test = TestIdentifier::new("com.example.FooTest", "testA");
            reporter.test_run_started(run, 1);
            reporter.test_started(&test);
            reporter.test_failed(&test, "expected <1>\n  at Foo");
            reporter.test_ended(&test, &Metrics::new());
            reporter.test_run_ended(0, &Metrics::new());
        }

        let xml = reporter.render(0);
        assert_eq!(xml.matches("<testsuite ").count(), 2);
        assert!(xml.contains("<testsuite name=\"first\""));
        assert!(xml.contains("classname=\"com.example.FooTest\""));
        assert!(xml.contains("<failure message=\"expected &lt;1&gt;\">"));
        assert!(xml.contains("tests=\"2\" failures=\"2\""));
    }
}
