// Tests for report generators - public API only

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tradefed_report::replay::{read_events, replay};
use tradefed_report::report::{
    CollectingListener, ConsoleResultReporter, JsonResultReporter, JunitResultReporter,
    ResultForwarder, StreamingJsonReporter, TestInvocationListener,
};
use tradefed_report::state::{
    ByteSource, InvocationContext, InvocationFailure, LogDataType, LogFile, Metrics,
    TestIdentifier, TestStatus,
};

/// Writer whose bytes stay readable after it is handed to a reporter
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn metrics(entries: &[(&str, &str)]) -> Metrics {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// Wall-clock durations vary between runs
fn zero_durations(text: &str) -> String {
    text.lines()
        .map(|line| match (line.rfind(" ("), line.ends_with("ms)")) {
            (Some(start), true) => format!("{} (0ms)\n", &line[..start]),
            _ => format!("{}\n", line),
        })
        .collect()
}

fn drive_full_invocation(reporter: &dyn TestInvocationListener) {
    reporter.invocation_started(&InvocationContext::new("1"));

    reporter.test_run_started("Test Run 1", 3);
    let run1_test1 = TestIdentifier::new("class1", "method1");
    reporter.test_started(&run1_test1);
    reporter.test_failed(&run1_test1, "trace");
    reporter.test_ended(
        &run1_test1,
        &metrics(&[
            ("run1_test1_key1", "run1_test1_value1"),
            ("run1_test1_key2", "run1_test1_value2"),
        ]),
    );
    let run1_test2 = TestIdentifier::new("class1", "method2");
    reporter.test_started(&run1_test2);
    reporter.test_ended(
        &run1_test2,
        &metrics(&[
            ("run1_test2_key1", "run1_test2_value1"),
            ("run1_test2_key2", "run1_test2_value2"),
        ]),
    );
    let run1_test3 = TestIdentifier::new("class1", "method3");
    reporter.test_started(&run1_test3);
    reporter.test_assumption_failure(&run1_test3, "trace");
    reporter.test_ended(
        &run1_test3,
        &metrics(&[
            ("run1_test3_key1", "run1_test3_value1"),
            ("run1_test3_key2", "run1_test3_value2"),
        ]),
    );
    let run1_test4 = TestIdentifier::new("class1", "method4");
    reporter.test_started(&run1_test4);
    reporter.test_ignored(&run1_test4);
    reporter.test_ended(&run1_test4, &Metrics::new());
    reporter.test_run_ended(
        0,
        &metrics(&[("run1_key1", "run1_value2"), ("run1_key2", "run1_value1")]),
    );

    reporter.test_run_started("Test Run 2", 4);
    let run2_test1 = TestIdentifier::new("class2", "method1");
    reporter.test_started(&run2_test1);
    reporter.test_failed(&run2_test1, "trace");
    reporter.test_ended(&run2_test1, &Metrics::new());
    let run2_test2 = TestIdentifier::new("class2", "method2");
    reporter.test_started(&run2_test2);
    reporter.test_ended(&run2_test2, &Metrics::new());
    let run2_test3 = TestIdentifier::new("class2", "method3");
    reporter.test_started(&run2_test3);
    reporter.test_assumption_failure(&run2_test3, "trace");
    reporter.test_ended(&run2_test3, &Metrics::new());
    let run2_test4 = TestIdentifier::new("class2", "method4");
    reporter.test_started(&run2_test4);
    reporter.test_ignored(&run2_test4);
    reporter.test_ended(&run2_test4, &Metrics::new());
    reporter.test_run_ended(0, &Metrics::new());

    reporter.test_run_started("Test Run 3", 0);
    reporter.test_run_ended(
        0,
        &metrics(&[("run3_key1", "run3_value1"), ("run3_key2", "run3_value2")]),
    );

    reporter.test_run_started("Test Run 4", 0);
    reporter.test_run_ended(0, &Metrics::new());

    let source = ByteSource::new("");
    reporter.test_log_saved(
        "log1",
        LogDataType::Text,
        &source,
        &LogFile::new("/path/to/log1", Some("http://log1".to_string())),
    );
    reporter.test_log_saved(
        "log2",
        LogDataType::Text,
        &source,
        &LogFile::new("/path/to/log2", None),
    );
    reporter.invocation_ended(0);
}

#[test]
fn test_console_summary_all() {
    // Arrange
    let out = SharedBuffer::default();
    let reporter = ConsoleResultReporter::with_writer(Box::new(out.clone()));

    // Act
    drive_full_invocation(&reporter);

    // Assert
    let expected = "Test results:\n\
        Test Run 1: 4 Tests, 1 Passed, 1 Failed, 1 Ignored\n\
        \x20 class1#method1: FAILURE (0ms)\n\
        \x20 stack=\n\
        \x20   trace\n\
        \x20   run1_test1_key1: run1_test1_value1\n\
        \x20   run1_test1_key2: run1_test1_value2\n\
        \x20 class1#method2: PASSED (0ms)\n\
        \x20   run1_test2_key1: run1_test2_value1\n\
        \x20   run1_test2_key2: run1_test2_value2\n\
        \x20 class1#method3: ASSUMPTION_FAILURE (0ms)\n\
        \x20 stack=\n\
        \x20   trace\n\
        \x20   run1_test3_key1: run1_test3_value1\n\
        \x20   run1_test3_key2: run1_test3_value2\n\
        \x20 class1#method4: IGNORED (0ms)\n\
        \x20 run1_key1: run1_value2\n\
        \x20 run1_key2: run1_value1\n\
        \n\
        Test Run 2: 4 Tests, 1 Passed, 1 Failed, 1 Ignored\n\
        \x20 class2#method1: FAILURE (0ms)\n\
        \x20 stack=\n\
        \x20   trace\n\
        \x20 class2#method2: PASSED (0ms)\n\
        \x20 class2#method3: ASSUMPTION_FAILURE (0ms)\n\
        \x20 stack=\n\
        \x20   trace\n\
        \x20 class2#method4: IGNORED (0ms)\n\
        \n\
        Test Run 3:\n\
        \x20 run3_key1: run3_value1\n\
        \x20 run3_key2: run3_value2\n\
        \n\
        Test Run 4: No results\n\
        \n\
        Log Files:\n\
        \x20 http://log1\n\
        \x20 /path/to/log2\n";
    assert_eq!(zero_durations(&reporter.invocation_summary()), expected);
    assert_eq!(zero_durations(&out.contents()), expected);
}

#[test]
fn test_console_single_test_metrics() {
    // Arrange
    let reporter = ConsoleResultReporter::with_writer(Box::new(io::sink()));
    let test = TestIdentifier::new("class", "method");

    // Act
    reporter.test_run_started("Test Run", 1);
    reporter.test_started(&test);
    reporter.test_ended(&test, &metrics(&[("key2", "value2"), ("key1", "value1")]));
    reporter.test_run_ended(0, &Metrics::new());

    // Assert
    assert_eq!(
        zero_durations(&reporter.invocation_summary()),
        "Test results:\n\
         Test Run: 1 Test, 1 Passed, 0 Failed, 0 Ignored\n\
         \x20 class#method: PASSED (0ms)\n\
         \x20   key1: value1\n\
         \x20   key2: value2\n"
    );
}

#[test]
fn test_json_report_written() {
    // Arrange
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let reporter = JsonResultReporter::new(&path);

    // Act
    drive_full_invocation(&reporter);

    // Assert
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["build"]["build_id"], "1");
    assert_eq!(json["counts"]["PASSED"], 2);
    assert_eq!(json["counts"]["FAILURE"], 2);
    assert_eq!(json["runs"].as_array().unwrap().len(), 4);
    assert_eq!(json["runs"][0]["name"], "Test Run 1");
    assert_eq!(json["runs"][0]["tests"][0]["class"], "class1");
    assert_eq!(json["runs"][0]["tests"][0]["status"], "FAILURE");
    assert!(json["invocation_failure"].is_null());
}

#[test]
fn test_json_report_records_invocation_failure() {
    // Arrange
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let reporter = JsonResultReporter::new(&path);

    // Act
    reporter.invocation_started(&InvocationContext::new("1"));
    reporter.invocation_failed(&InvocationFailure::build_error("flash failed"));
    reporter.invocation_ended(5);

    // Assert
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["invocation_failure"]["kind"], "build_error");
    assert_eq!(json["elapsed_ms"], 5);
}

#[test]
fn test_junit_report_written() {
    // Arrange
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("junit.xml");
    let reporter = JunitResultReporter::new(&path);

    // Act
    drive_full_invocation(&reporter);

    // Assert
    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert_eq!(xml.matches("<testsuite ").count(), 4);
    assert_eq!(xml.matches("<failure ").count(), 2);
    assert!(xml.contains("<property name=\"run1_key1\" value=\"run1_value2\" />"));
    assert!(xml.ends_with("</testsuites>\n"));
}

#[test]
fn test_json_report_sums_rerun_metrics_when_aggregating() {
    // Arrange
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    let reporter = JsonResultReporter::new(&path).with_aggregate_metrics(true);

    // Act
    for _ in 0..2 {
        reporter.test_run_started("r", 0);
        reporter.test_run_ended(1, &metrics(&[("iterations", "1")]));
    }
    reporter.invocation_ended(2);

    // Assert
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["runs"].as_array().unwrap().len(), 1);
    assert_eq!(json["runs"][0]["run_metrics"]["iterations"], "2");
}

#[test]
fn test_unwritable_report_is_logged_not_raised() {
    // Arrange
    let dir = tempfile::TempDir::new().unwrap();
    let reporter = JsonResultReporter::new(dir.path().join("missing").join("report.json"));

    // Act
    reporter.invocation_ended(0);

    // Assert
    assert!(!dir.path().join("missing").exists());
}

#[test]
fn test_summaries_name_report_files() {
    // Arrange
    let json = JsonResultReporter::new("/tmp/out.json");

    // Act
    let summary = json.summary().unwrap();

    // Assert
    assert_eq!(summary.summary, "JSON report: /tmp/out.json");
}

#[test]
fn test_streamed_events_replay_to_same_results() {
    // Arrange
    let out = SharedBuffer::default();
    let direct = Arc::new(CollectingListener::new());
    let forwarder = ResultForwarder::new(vec![
        direct.clone(),
        Arc::new(StreamingJsonReporter::with_writer(Box::new(out.clone()))),
    ]);

    // Act
    drive_full_invocation(&forwarder);
    let events = read_events(out.contents().as_bytes()).unwrap();
    let replayed = CollectingListener::new();
    replay(&events, &replayed);

    // Assert
    assert_eq!(replayed.run_results().len(), direct.run_results().len());
    for status in TestStatus::ALL {
        assert_eq!(
            replayed.num_tests_in_state(status),
            direct.num_tests_in_state(status)
        );
    }
    assert_eq!(
        replayed.run_results()[2].run_metrics(),
        direct.run_results()[2].run_metrics()
    );
}
