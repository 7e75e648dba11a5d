// Bugreport collector - captures device bugreports when predicates fire

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use super::predicate::{Filter, Freq, Noun, Predicate, Relation, Scope};
use super::{TestInvocationListener, lock, read, write};
use crate::config::BugreportConfig;
use crate::device::BugreportDevice;
use crate::error::PredicateError;
use crate::state::{
    InputStreamSource, InvocationContext, InvocationFailure, LogDataType, LogFile, Metrics,
    TestIdentifier, TestSummary,
};

/// How long to wait for the device before capturing
pub const DEFAULT_DEVICE_WAIT_TIME: Duration = Duration::from_secs(30);

const DEFAULT_TAG: &str = "bug";

/// Number of items seen in a scope and how many of them failed
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    total: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, failed: bool) {
        self.total += 1;
        if failed {
            self.failed += 1;
        }
    }

    fn satisfies(self, filter: Filter) -> bool {
        match filter {
            Filter::WithFailing => self.failed > 0,
            Filter::WithPassing => self.total > self.failed,
            Filter::WithAny => self.total > 0,
        }
    }
}

/// One lifecycle transition, described in predicate terms
#[derive(Debug, Clone, Copy)]
struct Subject {
    relation: Relation,
    scope: Scope,
    failed: bool,
    first: bool,
    first_failed: bool,
    testcases: Tally,
    testruns: Tally,
}

impl Subject {
    fn new(relation: Relation, scope: Scope) -> Self {
        Self {
            relation,
            scope,
            failed: false,
            first: false,
            first_failed: false,
            testcases: Tally::default(),
            testruns: Tally::default(),
        }
    }

    fn is_matched_by(&self, predicate: &Predicate) -> bool {
        if predicate.relation() != self.relation || predicate.noun().scope() != self.scope {
            return false;
        }
        if predicate.noun().is_failed() && !self.failed {
            return false;
        }
        let first = if predicate.noun().is_failed() {
            self.first_failed
        } else {
            self.first
        };
        if predicate.freq() == Freq::First && !first {
            return false;
        }
        match predicate.filter() {
            None => true,
            Some((filter, Noun::Testcase)) => self.testcases.satisfies(filter),
            Some((filter, _)) => self.testruns.satisfies(filter),
        }
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    run_tests_started: usize,
    run_tests: Tally,
    run_failed: bool,
    failed_tests: HashSet<TestIdentifier>,
    runs_started: usize,
    runs: Tally,
    invocation_tests: Tally,
    invocation_failed: bool,
}

impl CaptureState {
    fn start_run(&mut self) -> Subject {
        let mut subject = Subject::new(Relation::AtStartOf, Scope::Testrun);
        subject.first = self.runs_started == 0;
        self.runs_started += 1;
        self.run_tests_started = 0;
        self.run_tests = Tally::default();
        self.run_failed = false;
        self.failed_tests.clear();
        subject
    }

    fn start_test(&mut self, test: &TestIdentifier) -> Subject {
        // A restarted test is judged by its latest attempt only
        self.failed_tests.remove(test);
        let mut subject = Subject::new(Relation::AtStartOf, Scope::Testcase);
        subject.first = self.run_tests_started == 0;
        self.run_tests_started += 1;
        subject
    }

    fn end_test(&mut self, test: &TestIdentifier) -> Subject {
        let failed = self.failed_tests.contains(test);
        let mut subject = Subject::new(Relation::After, Scope::Testcase);
        subject.failed = failed;
        subject.first = self.run_tests.total == 0;
        subject.first_failed = failed && self.run_tests.failed == 0;
        self.run_tests.record(failed);
        self.invocation_tests.record(failed);
        subject
    }

    fn end_run(&mut self) -> Subject {
        let failed = self.run_failed || self.run_tests.failed > 0;
        let mut subject = Subject::new(Relation::After, Scope::Testrun);
        subject.failed = failed;
        subject.first = self.runs.total == 0;
        subject.first_failed = failed && self.runs.failed == 0;
        subject.testcases = self.run_tests;
        self.runs.record(failed);
        subject
    }

    fn end_invocation(&self) -> Subject {
        let mut subject = Subject::new(Relation::After, Scope::Invocation);
        subject.failed = self.invocation_failed;
        subject.testcases = self.invocation_tests;
        subject.testruns = self.runs;
        subject
    }
}

/// Wraps a listener and attaches device bugreports at chosen points of the
/// invocation lifecycle.
///
/// Captures are selected by [`Predicate`]s. At most one bugreport is taken per
/// transition, using the first predicate that matches. Test and run captures
/// that fire `AFTER` a transition are logged before the closing event is
/// forwarded, so downstream listeners attribute them to the item that just
/// finished. Captures `AT_START_OF` are logged after the opening event.
pub struct BugreportCollector {
    listener: Arc<dyn TestInvocationListener>,
    device: Arc<dyn BugreportDevice>,
    predicates: RwLock<Vec<Predicate>>,
    device_wait_time: RwLock<Duration>,
    descriptive_name: RwLock<Option<String>>,
    state: Mutex<CaptureState>,
}

impl BugreportCollector {
    pub fn new(listener: Arc<dyn TestInvocationListener>, device: Arc<dyn BugreportDevice>) -> Self {
        Self {
            listener,
            device,
            predicates: RwLock::new(Vec::new()),
            device_wait_time: RwLock::new(DEFAULT_DEVICE_WAIT_TIME),
            descriptive_name: RwLock::new(None),
            state: Mutex::new(CaptureState::default()),
        }
    }

    /// Register a capture rule. A rule identical to a registered one is ignored.
    pub fn add_predicate(&self, predicate: Predicate) {
        let mut predicates = write(&self.predicates);
        if predicates.iter().any(|p| p.full_match(&predicate)) {
            tracing::debug!("predicate {} already registered", predicate);
            return;
        }
        predicates.push(predicate);
    }

    pub fn predicates(&self) -> Vec<Predicate> {
        read(&self.predicates).clone()
    }

    pub fn set_device_wait_time(&self, wait: Duration) {
        *write(&self.device_wait_time) = wait;
    }

    /// Name used for every later capture instead of the generated one
    pub fn set_descriptive_name(&self, name: Option<String>) {
        *write(&self.descriptive_name) = name;
    }

    /// Apply the `[bugreport]` section of the configuration
    pub fn configure(&self, config: &BugreportConfig) -> Result<(), PredicateError> {
        let predicates = config
            .predicates
            .iter()
            .map(|text| text.parse::<Predicate>())
            .collect::<Result<Vec<_>, _>>()?;
        for predicate in predicates {
            self.add_predicate(predicate);
        }
        self.set_device_wait_time(Duration::from_secs(config.device_wait_secs));
        self.set_descriptive_name(config.descriptive_name.clone());
        Ok(())
    }

    /// Capture a bugreport right now, named after `reason` unless a
    /// descriptive name is set
    pub fn grab_bugreport(&self, reason: &str) {
        let name = read(&self.descriptive_name)
            .clone()
            .unwrap_or_else(|| reason.to_string());
        self.capture(&name);
    }

    fn matching_predicate(&self, subject: &Subject) -> Option<Predicate> {
        read(&self.predicates)
            .iter()
            .find(|p| subject.is_matched_by(p))
            .copied()
    }

    fn capture_for_test(&self, subject: &Subject, test: &TestIdentifier) {
        if self.matching_predicate(subject).is_none() {
            return;
        }
        let tag = read(&self.descriptive_name)
            .clone()
            .unwrap_or_else(|| DEFAULT_TAG.to_string());
        let failed = if subject.failed { "FAILED-" } else { "" };
        let name = format!(
            "{}-{}{}__{}.{}",
            tag,
            failed,
            test.class_simple_name(),
            test.test_name,
            LogDataType::Bugreport.file_ext()
        );
        self.capture(&name);
    }

    fn capture_for_scope(&self, subject: &Subject) {
        let Some(predicate) = self.matching_predicate(subject) else {
            return;
        };
        let name = read(&self.descriptive_name)
            .clone()
            .unwrap_or_else(|| predicate.to_string());
        self.capture(&name);
    }

    fn capture(&self, name: &str) {
        let wait = *read(&self.device_wait_time);
        if let Err(e) = self.device.wait_for_device_online(wait) {
            tracing::warn!("{}; capturing bugreport anyway", e);
        }

        match self.device.bugreport() {
            Ok(source) => {
                tracing::info!(
                    "captured bugreport '{}' from {} ({} bytes)",
                    name,
                    self.device.serial(),
                    source.size()
                );
                self.listener
                    .test_log(name, LogDataType::Bugreport, source.as_ref());
                source.cancel();
            }
            Err(e) => tracing::error!("failed to capture bugreport '{}': {}", name, e),
        }
    }
}

impl TestInvocationListener for BugreportCollector {
    fn invocation_started(&self, context: &InvocationContext) {
        *lock(&self.state) = CaptureState::default();
        self.listener.invocation_started(context);
        self.capture_for_scope(&Subject::new(Relation::AtStartOf, Scope::Invocation));
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        let subject = lock(&self.state).start_run();
        self.listener.test_run_started(run_name, test_count);
        self.capture_for_scope(&subject);
    }

    fn test_started(&self, test: &TestIdentifier) {
        let subject = lock(&self.state).start_test(test);
        self.listener.test_started(test);
        self.capture_for_test(&subject, test);
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        lock(&self.state).failed_tests.insert(test.clone());
        self.listener.test_failed(test, trace);
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.listener.test_assumption_failure(test, trace);
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.listener.test_ignored(test);
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        let subject = lock(&self.state).end_test(test);
        self.capture_for_test(&subject, test);
        self.listener.test_ended(test, metrics);
    }

    fn test_run_failed(&self, message: &str) {
        lock(&self.state).run_failed = true;
        self.listener.test_run_failed(message);
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.listener.test_run_stopped(elapsed_ms);
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        let subject = lock(&self.state).end_run();
        self.capture_for_scope(&subject);
        self.listener.test_run_ended(elapsed_ms, run_metrics);
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
        lock(&self.state).invocation_failed = true;
        self.listener.invocation_failed(cause);
    }

    fn test_log(&self, data_name: &str, data_type: LogDataType, source: &dyn InputStreamSource) {
        self.listener.test_log(data_name, data_type, source);
    }

    fn test_log_saved(
        &self,
        data_name: &str,
        data_type: LogDataType,
        source: &dyn InputStreamSource,
        log_file: &LogFile,
    ) {
        self.listener
            .test_log_saved(data_name, data_type, source, log_file);
    }

    fn invocation_ended(&self, elapsed_ms: u64) {
        let subject = lock(&self.state).end_invocation();
        self.capture_for_scope(&subject);
        self.listener.invocation_ended(elapsed_ms);
    }

    fn summary(&self) -> Option<TestSummary> {
        self.listener.summary()
    }

    fn put_summary(&self, summaries: &[TestSummary]) {
        self.listener.put_summary(summaries);
    }

    fn listener_name(&self) -> &str {
        "BugreportCollector"
    }
}
