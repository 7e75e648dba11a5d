// Tests for the collecting listener - public API only

use tradefed_report::report::{CollectingListener, TestInvocationListener};
use tradefed_report::state::{InvocationContext, Metrics, TestIdentifier, TestStatus};

const RUN_KEY: &str = "key";
const METRIC_VALUE: &str = "value";

fn metrics(key: &str, value: &str) -> Metrics {
    let mut metrics = Metrics::new();
    metrics.insert(key.to_string(), value.to_string());
    metrics
}

/// One run with one passing test
fn inject_run(listener: &CollectingListener, run_name: &str, test_name: &str, run_value: &str) {
    listener.test_run_started(run_name, 1);
    let test = TestIdentifier::new("FooTest", test_name);
    listener.test_started(&test);
    listener.test_ended(&test, &metrics("test_key", METRIC_VALUE));
    listener.test_run_ended(0, &metrics(RUN_KEY, run_value));
}

fn aggregate_run_metric(first: &str, second: &str) -> String {
    let listener = CollectingListener::new().with_aggregate_metrics(true);
    inject_run(&listener, "run", "test1", first);
    inject_run(&listener, "run", "test1", second);
    listener.current_run_results().run_metrics()[RUN_KEY].clone()
}

#[test]
fn test_single_run() {
    // Arrange
    let listener = CollectingListener::new();
    listener.invocation_started(&InvocationContext::new("1"));

    // Act
    inject_run(&listener, "run", "test1", METRIC_VALUE);

    // Assert
    let run = listener.current_run_results();
    assert!(run.is_run_complete());
    assert!(!run.is_run_failure());
    assert_eq!(listener.num_total_tests(), 1);
    let result = &run.test_results()[&TestIdentifier::new("FooTest", "test1")];
    assert_eq!(result.status, TestStatus::Passed);
    assert!(result.start_time > 0);
    assert!(result.end_time.unwrap() >= result.start_time);
    assert_eq!(result.metrics["test_key"], METRIC_VALUE);
}

#[test]
fn test_run_failed() {
    // Arrange
    let listener = CollectingListener::new();
    listener.test_run_started("run", 1);

    // Act
    listener.test_run_failed("error");
    listener.test_run_ended(0, &Metrics::new());

    // Assert
    let run = listener.current_run_results();
    assert!(run.is_run_complete());
    assert!(run.is_run_failure());
    assert_eq!(run.run_failure_message(), Some("error"));
}

#[test]
fn test_two_runs() {
    // Arrange
    let listener = CollectingListener::new();

    // Act
    inject_run(&listener, "run1", "test1", METRIC_VALUE);
    inject_run(&listener, "run2", "test2", "value2");

    // Assert
    assert_eq!(listener.num_total_tests(), 2);
    assert_eq!(listener.num_tests_in_state(TestStatus::Passed), 2);
    let runs = listener.run_results();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].name(), "run1");
    assert_eq!(runs[1].name(), "run2");
    assert_eq!(runs[0].run_metrics()[RUN_KEY], METRIC_VALUE);
    assert_eq!(runs[1].run_metrics()[RUN_KEY], "value2");
}

#[test]
fn test_re_run_merges_into_one_result() {
    // Arrange
    let listener = CollectingListener::new();

    // Act
    inject_run(&listener, "run", "test1", METRIC_VALUE);
    inject_run(&listener, "run", "test2", METRIC_VALUE);

    // Assert
    assert_eq!(listener.num_total_tests(), 2);
    assert_eq!(listener.num_tests_in_state(TestStatus::Passed), 2);
    let runs = listener.run_results();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].expected_test_count(), 2);
    let completed = runs[0].completed_tests();
    assert!(completed.contains(&&TestIdentifier::new("FooTest", "test1")));
    assert!(completed.contains(&&TestIdentifier::new("FooTest", "test2")));
}

#[test]
fn test_re_run_expected_count_sums_every_start() {
    // Arrange
    let listener = CollectingListener::new();

    // Act
    for count in [3, 4, 5] {
        listener.test_run_started("suite", count);
        listener.test_run_ended(0, &Metrics::new());
    }
    listener.test_run_started("other", 1);

    // Assert
    let runs = listener.run_results();
    assert_eq!(runs.iter().filter(|r| r.name() == "suite").count(), 1);
    assert_eq!(runs[0].expected_test_count(), 12);
}

#[test]
fn test_re_run_overlap_replaces_result() {
    // Arrange
    let listener = CollectingListener::new();
    let test = TestIdentifier::new("FooTest", "test1");
    inject_run(&listener, "run", "test1", METRIC_VALUE);

    // Act
    listener.test_run_started("run", 1);
    listener.test_started(&test);
    listener.test_failed(&test, "trace");
    listener.test_ended(&test, &Metrics::new());
    listener.test_run_ended(0, &Metrics::new());

    // Assert
    assert_eq!(listener.num_total_tests(), 1);
    assert_eq!(listener.num_tests_in_state(TestStatus::Passed), 0);
    assert_eq!(listener.num_tests_in_state(TestStatus::Failure), 1);
    assert_eq!(listener.run_results().len(), 1);
    assert_eq!(listener.current_run_results().num_tests(), 1);
}

#[test]
fn test_incomplete_test() {
    // Arrange
    let listener = CollectingListener::new();

    // Act
    listener.test_run_started("run", 1);
    listener.test_started(&TestIdentifier::new("FooTest", "test1"));

    // Assert
    assert_eq!(listener.num_tests_in_state(TestStatus::Incomplete), 1);
    assert!(!listener.current_run_results().is_run_complete());
}

#[test]
fn test_status_counts_sum_to_total() {
    // Arrange
    let listener = CollectingListener::new();
    let tests: Vec<TestIdentifier> = (0..5)
        .map(|i| TestIdentifier::new("FooTest", format!("test{}", i)))
        .collect();

    // Act
    listener.test_run_started("run", 5);
    for test in &tests {
        listener.test_started(test);
    }
    listener.test_failed(&tests[0], "trace");
    listener.test_assumption_failure(&tests[1], "assume");
    listener.test_ignored(&tests[2]);
    for test in &tests[..4] {
        listener.test_ended(test, &Metrics::new());
    }

    // Assert
    let sum: usize = TestStatus::ALL
        .iter()
        .map(|status| listener.num_tests_in_state(*status))
        .sum();
    assert_eq!(sum, listener.num_total_tests());
    assert_eq!(listener.num_all_failed_tests(), 2);
    assert!(listener.has_failed_tests());
    assert_eq!(listener.num_tests_in_state(TestStatus::Incomplete), 1);
}

#[test]
fn test_aggregate_long_metrics() {
    assert_eq!(aggregate_run_metric("1", "1"), "2");
}

#[test]
fn test_aggregate_double_metrics() {
    assert_eq!(aggregate_run_metric("1.1", "1.1"), "2.2");
}

#[test]
fn test_aggregate_mixed_metrics() {
    assert_eq!(aggregate_run_metric("1", "1.1"), "2.1");
}

#[test]
fn test_aggregate_new_string_metrics() {
    assert_eq!(aggregate_run_metric("1", "bar"), "bar");
}

#[test]
fn test_aggregate_existing_string_metrics() {
    assert_eq!(aggregate_run_metric("bar", "1"), "1");
}

#[test]
fn test_without_aggregation_new_value_wins() {
    // Arrange
    let listener = CollectingListener::new();

    // Act
    inject_run(&listener, "run", "test1", "1");
    inject_run(&listener, "run", "test1", "1");

    // Assert
    assert_eq!(listener.current_run_results().run_metrics()[RUN_KEY], "1");
}

#[test]
fn test_end_to_end_failure() {
    // Arrange
    let listener = CollectingListener::new();
    let test = TestIdentifier::new("FooTest", "testA");

    // Act
    listener.invocation_started(&InvocationContext::new("1"));
    listener.test_run_started("run", 1);
    listener.test_started(&test);
    listener.test_failed(&test, "trace");
    listener.test_ended(&test, &Metrics::new());
    listener.test_run_ended(0, &Metrics::new());
    listener.invocation_ended(0);

    // Assert
    let runs = listener.run_results();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].name(), "run");
    assert_eq!(runs[0].num_tests(), 1);
    assert_eq!(runs[0].test_results()[&test].status, TestStatus::Failure);
    assert_eq!(runs[0].test_results()[&test].stack_trace.as_deref(), Some("trace"));
    assert_eq!(listener.num_tests_in_state(TestStatus::Passed), 0);
}

#[test]
fn test_with_run_results_borrows() {
    // Arrange
    let listener = CollectingListener::new();
    inject_run(&listener, "run1", "test1", METRIC_VALUE);
    inject_run(&listener, "run2", "test2", METRIC_VALUE);

    // Act
    let names: Vec<String> =
        listener.with_run_results(|runs| runs.map(|r| r.name().to_string()).collect());

    // Assert
    assert_eq!(names, vec!["run1", "run2"]);
}
