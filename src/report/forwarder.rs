// Result forwarders - fan one event stream out to many listeners

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use super::log_saver::FileSystemLogSaver;
use super::summary::report_invocation_ended;
use super::{TestInvocationListener, read, write};
use crate::state::{
    InputStreamSource, InvocationContext, InvocationFailure, LogDataType, LogFile, Metrics,
    TestIdentifier, TestSummary,
};

/// Run one callback on one listener, containing any panic it raises.
///
/// Returns `None` when the listener panicked.
pub(crate) fn dispatch<R>(
    listener: &dyn TestInvocationListener,
    method: &str,
    f: impl FnOnce(&dyn TestInvocationListener) -> R,
) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(|| f(listener))) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::error!(
                "fault while invoking {}#{}: {}",
                listener.listener_name(),
                method,
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Forwards invocation events to a list of listeners.
///
/// Listeners are called in registration order. A listener that panics is
/// logged and skipped; the remaining listeners still receive the event.
#[derive(Default)]
pub struct ResultForwarder {
    listeners: RwLock<Vec<Arc<dyn TestInvocationListener>>>,
}

impl ResultForwarder {
    pub fn new(listeners: Vec<Arc<dyn TestInvocationListener>>) -> Self {
        Self {
            listeners: RwLock::new(listeners),
        }
    }

    pub fn set_listeners(&self, listeners: Vec<Arc<dyn TestInvocationListener>>) {
        *write(&self.listeners) = listeners;
    }

    pub fn listeners(&self) -> Vec<Arc<dyn TestInvocationListener>> {
        read(&self.listeners).clone()
    }

    fn for_each(&self, method: &str, f: impl Fn(&dyn TestInvocationListener)) {
        for listener in read(&self.listeners).iter() {
            dispatch(listener.as_ref(), method, &f);
        }
    }
}

impl TestInvocationListener for ResultForwarder {
    fn invocation_started(&self, context: &InvocationContext) {
        self.for_each("invocation_started", |l| l.invocation_started(context));
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        self.for_each("test_run_started", |l| l.test_run_started(run_name, test_count));
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.for_each("test_started", |l| l.test_started(test));
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.for_each("test_failed", |l| l.test_failed(test, trace));
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.for_each("test_assumption_failure", |l| {
            l.test_assumption_failure(test, trace)
        });
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.for_each("test_ignored", |l| l.test_ignored(test));
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.for_each("test_ended", |l| l.test_ended(test, metrics));
    }

    fn test_run_failed(&self, message: &str) {
        self.for_each("test_run_failed", |l| l.test_run_failed(message));
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.for_each("test_run_stopped", |l| l.test_run_stopped(elapsed_ms));
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.for_each("test_run_ended", |l| l.test_run_ended(elapsed_ms, run_metrics));
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
        self.for_each("invocation_failed", |l| l.invocation_failed(cause));
    }

    fn test_log(&self, data_name: &str, data_type: LogDataType, source: &dyn InputStreamSource) {
        self.for_each("test_log", |l| l.test_log(data_name, data_type, source));
    }

    fn test_log_saved(
        &self,
        data_name: &str,
        data_type: LogDataType,
        source: &dyn InputStreamSource,
        log_file: &LogFile,
    ) {
        self.for_each("test_log_saved", |l| {
            l.test_log_saved(data_name, data_type, source, log_file)
        });
    }

    fn invocation_ended(&self, elapsed_ms: u64) {
        report_invocation_ended(&self.listeners(), elapsed_ms);
    }

    // Several listeners may each produce a summary; there is no single one
    // to return here.
    fn summary(&self) -> Option<TestSummary> {
        None
    }

    fn listener_name(&self) -> &str {
        "ResultForwarder"
    }
}

/// A forwarder that persists every `test_log` stream before passing it on.
///
/// Listeners receive the original `test_log` call followed by
/// `test_log_saved` with the location of the stored copy.
pub struct LogSaverResultForwarder {
    forwarder: ResultForwarder,
    log_saver: FileSystemLogSaver,
}

impl LogSaverResultForwarder {
    pub fn new(
        log_saver: FileSystemLogSaver,
        listeners: Vec<Arc<dyn TestInvocationListener>>,
    ) -> Self {
        Self {
            forwarder: ResultForwarder::new(listeners),
            log_saver,
        }
    }

    pub fn log_saver(&self) -> &FileSystemLogSaver {
        &self.log_saver
    }
}

impl TestInvocationListener for LogSaverResultForwarder {
    fn invocation_started(&self, context: &InvocationContext) {
        if let Err(e) = self.log_saver.invocation_started(context) {
            tracing::error!("failed to create log directory: {}", e);
        }
        self.forwarder.invocation_started(context);
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        self.forwarder.test_run_started(run_name, test_count);
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.forwarder.test_started(test);
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.forwarder.test_failed(test, trace);
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.forwarder.test_assumption_failure(test, trace);
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.forwarder.test_ignored(test);
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.forwarder.test_ended(test, metrics);
    }

    fn test_run_failed(&self, message: &str) {
        self.forwarder.test_run_failed(message);
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.forwarder.test_run_stopped(elapsed_ms);
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.forwarder.test_run_ended(elapsed_ms, run_metrics);
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
        self.forwarder.invocation_failed(cause);
    }

    fn test_log(&self, data_name: &str, data_type: LogDataType, source: &dyn InputStreamSource) {
        let saved = match self.log_saver.save_log_data(data_name, data_type, source) {
            Ok(log_file) => Some(log_file),
            Err(e) => {
                tracing::error!("failed to save log data '{}': {}", data_name, e);
                None
            }
        };
        self.forwarder.test_log(data_name, data_type, source);
        if let Some(log_file) = saved {
            self.forwarder
                .test_log_saved(data_name, data_type, source, &log_file);
        }
    }

    fn invocation_ended(&self, elapsed_ms: u64) {
        report_invocation_ended(&self.forwarder.listeners(), elapsed_ms);
        self.log_saver.invocation_ended();
    }

    fn listener_name(&self) -> &str {
        "LogSaverResultForwarder"
    }
}
