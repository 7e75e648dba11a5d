// Name-mangling proxy - rewrites identifiers before they reach a listener

use std::sync::Arc;

use super::TestInvocationListener;
use crate::state::{
    InputStreamSource, InvocationContext, InvocationFailure, LogDataType, LogFile, Metrics,
    TestIdentifier, TestSummary,
};

/// Rewrite hooks applied by [`NameMangleListener`].
///
/// Every hook receives a borrow and returns a fresh value; the caller's data
/// is never modified. The defaults return an unchanged copy.
pub trait NameMangler: Send + Sync {
    fn mangle_test_id(&self, test: &TestIdentifier) -> TestIdentifier {
        test.clone()
    }

    fn mangle_test_run_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn mangle_build_info(&self, context: &InvocationContext) -> InvocationContext {
        context.clone()
    }
}

/// Mangler that leaves every name untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMangler;

impl NameMangler for IdentityMangler {}

/// Forwards events to one downstream listener after renaming tests, runs and
/// builds through a [`NameMangler`].
pub struct NameMangleListener<M> {
    listener: Arc<dyn TestInvocationListener>,
    mangler: M,
}

impl<M: NameMangler> NameMangleListener<M> {
    pub fn new(listener: Arc<dyn TestInvocationListener>, mangler: M) -> Self {
        Self { listener, mangler }
    }

    pub fn mangler(&self) -> &M {
        &self.mangler
    }
}

impl<M: NameMangler> TestInvocationListener for NameMangleListener<M> {
    fn invocation_started(&self, context: &InvocationContext) {
        let context = self.mangler.mangle_build_info(context);
        self.listener.invocation_started(&context);
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        let run_name = self.mangler.mangle_test_run_name(run_name);
        self.listener.test_run_started(&run_name, test_count);
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.listener.test_started(&self.mangler.mangle_test_id(test));
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.listener
            .test_failed(&self.mangler.mangle_test_id(test), trace);
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.listener
            .test_assumption_failure(&self.mangler.mangle_test_id(test), trace);
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.listener.test_ignored(&self.mangler.mangle_test_id(test));
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.listener
            .test_ended(&self.mangler.mangle_test_id(test), metrics);
    }

    fn test_run_failed(&self, message: &str) {
        self.listener.test_run_failed(message);
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.listener.test_run_stopped(elapsed_ms);
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.listener.test_run_ended(elapsed_ms, run_metrics);
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
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
        self.listener.invocation_ended(elapsed_ms);
    }

    fn summary(&self) -> Option<TestSummary> {
        self.listener.summary()
    }

    fn put_summary(&self, summaries: &[TestSummary]) {
        self.listener.put_summary(summaries);
    }

    fn listener_name(&self) -> &str {
        self.listener.listener_name()
    }
}
