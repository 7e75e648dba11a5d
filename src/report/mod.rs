// Report module - Invocation listeners and result reporting

pub mod bugreport;
pub mod collecting;
pub mod console;
pub mod email;
pub mod forwarder;
pub mod json;
pub mod junit;
pub mod log_saver;
pub mod mangle;
pub mod predicate;
pub mod streaming;
pub mod summary;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::state::{
    InputStreamSource, InvocationContext, InvocationFailure, LogDataType, LogFile, Metrics,
    TestIdentifier, TestSummary,
};

pub use bugreport::BugreportCollector;
pub use collecting::CollectingListener;
pub use console::ConsoleResultReporter;
pub use email::{
    AlwaysSend, DeviceUnavailableOnly, EmailResultReporter, FailuresOnly, InvocationStatus, Mailer,
    Message, OutboxMailer, SendPolicy,
};
pub use forwarder::{LogSaverResultForwarder, ResultForwarder};
pub use json::JsonResultReporter;
pub use junit::JunitResultReporter;
pub use log_saver::FileSystemLogSaver;
pub use mangle::{IdentityMangler, NameMangleListener, NameMangler};
pub use predicate::{Filter, Freq, Noun, Predicate, Relation, Scope};
pub use streaming::StreamingJsonReporter;
pub use summary::report_invocation_ended;

/// Receives the events of one test invocation.
///
/// A harness calls these in order: `invocation_started`, then for each run
/// `test_run_started`, per test `test_started` / optional failure or ignore /
/// `test_ended`, `test_run_ended`; finally `invocation_ended`. A run name may
/// be started again, in which case its results accumulate. Every method
/// defaults to a no-op so listeners only implement what they observe.
pub trait TestInvocationListener: Send + Sync {
    fn invocation_started(&self, _context: &InvocationContext) {}

    fn test_run_started(&self, _run_name: &str, _test_count: usize) {}

    fn test_started(&self, _test: &TestIdentifier) {}

    fn test_failed(&self, _test: &TestIdentifier, _trace: &str) {}

    fn test_assumption_failure(&self, _test: &TestIdentifier, _trace: &str) {}

    fn test_ignored(&self, _test: &TestIdentifier) {}

    fn test_ended(&self, _test: &TestIdentifier, _metrics: &Metrics) {}

    fn test_run_failed(&self, _message: &str) {}

    fn test_run_stopped(&self, _elapsed_ms: u64) {}

    fn test_run_ended(&self, _elapsed_ms: u64, _run_metrics: &Metrics) {}

    fn invocation_failed(&self, _cause: &InvocationFailure) {}

    /// Attach a data stream (log, bugreport, screenshot) to the invocation
    fn test_log(&self, _data_name: &str, _data_type: LogDataType, _source: &dyn InputStreamSource) {
    }

    /// A stream passed to `test_log` has been persisted as `log_file`
    fn test_log_saved(
        &self,
        _data_name: &str,
        _data_type: LogDataType,
        _source: &dyn InputStreamSource,
        _log_file: &LogFile,
    ) {
    }

    fn invocation_ended(&self, _elapsed_ms: u64) {}

    /// Summary of this listener's output, collected before `invocation_ended`
    fn summary(&self) -> Option<TestSummary> {
        None
    }

    /// Receives the summaries of all sibling listeners
    fn put_summary(&self, _summaries: &[TestSummary]) {}

    /// Identity used when logging faults raised by this listener
    fn listener_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// A listener that panicked must not wedge the listeners sharing its state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
