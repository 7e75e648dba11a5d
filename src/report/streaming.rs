// Streaming reporter - one JSON line per listener event

use std::io::{self, Read, Write};
use std::sync::Mutex;

use super::{TestInvocationListener, lock};
use crate::replay::InvocationEvent;
use crate::state::{
    InputStreamSource, InvocationContext, InvocationFailure, LogDataType, Metrics, TestIdentifier,
};

// Larger text logs are announced without their content
const MAX_INLINE_LOG_BYTES: u64 = 1024 * 1024;

/// Writes every event as it arrives, in the format `replay` reads back
pub struct StreamingJsonReporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for StreamingJsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingJsonReporter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, event: &InvocationEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("failed to serialize event: {}", e);
                return;
            }
        };
        let mut out = lock(&self.out);
        if let Err(e) = writeln!(out, "{}", line).and_then(|()| out.flush()) {
            tracing::error!("failed to write event: {}", e);
        }
    }
}

fn inline_content(data_type: LogDataType, source: &dyn InputStreamSource) -> Option<String> {
    let textual = matches!(
        data_type,
        LogDataType::Text
            | LogDataType::Logcat
            | LogDataType::Bugreport
            | LogDataType::Xml
            | LogDataType::Json
    );
    if !textual || source.size() > MAX_INLINE_LOG_BYTES {
        return None;
    }
    let mut content = String::new();
    match source
        .create_input_stream()
        .and_then(|mut reader| reader.read_to_string(&mut content))
    {
        Ok(_) => Some(content),
        Err(e) => {
            tracing::warn!("log content not inlined: {}", e);
            None
        }
    }
}

impl TestInvocationListener for StreamingJsonReporter {
    fn invocation_started(&self, context: &InvocationContext) {
        self.emit(&InvocationEvent::InvocationStarted {
            context: context.clone(),
        });
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        self.emit(&InvocationEvent::TestRunStarted {
            run_name: run_name.to_string(),
            test_count,
        });
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.emit(&InvocationEvent::TestStarted { test: test.clone() });
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.emit(&InvocationEvent::TestFailed {
            test: test.clone(),
            trace: trace.to_string(),
        });
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.emit(&InvocationEvent::TestAssumptionFailure {
            test: test.clone(),
            trace: trace.to_string(),
        });
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.emit(&InvocationEvent::TestIgnored { test: test.clone() });
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.emit(&InvocationEvent::TestEnded {
            test: test.clone(),
            metrics: metrics.clone(),
        });
    }

    fn test_run_failed(&self, message: &str) {
        self.emit(&InvocationEvent::TestRunFailed {
            message: message.to_string(),
        });
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.emit(&InvocationEvent::TestRunStopped { elapsed_ms });
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.emit(&InvocationEvent::TestRunEnded {
            elapsed_ms,
            metrics: run_metrics.clone(),
        });
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
        self.emit(&InvocationEvent::InvocationFailed {
            cause: cause.clone(),
        });
    }

    fn test_log(&self, data_name: &str, data_type: LogDataType, source: &dyn InputStreamSource) {
        self.emit(&InvocationEvent::TestLog {
            name: data_name.to_string(),
            data_type,
            content: inline_content(data_type, source),
            path: None,
        });
    }

    fn invocation_ended(&self, elapsed_ms: u64) {
        self.emit(&InvocationEvent::InvocationEnded { elapsed_ms });
    }

    fn listener_name(&self) -> &str {
        "StreamingJsonReporter"
    }
}
