// Event replay - recorded invocation events fed back through a listener

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::TestInvocationListener;
use crate::state::{
    ByteSource, InputStreamSource, InvocationContext, InvocationFailure, LogDataType, Metrics,
    TestIdentifier,
};

/// One listener callback, as stored in a JSON-lines event log.
///
/// ```json
/// {"event":"test_run_started","run_name":"suite","test_count":2}
/// {"event":"test_started","test":{"class":"com.example.FooTest","method":"testA"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InvocationEvent {
    InvocationStarted {
        context: InvocationContext,
    },
    TestRunStarted {
        run_name: String,
        #[serde(default)]
        test_count: usize,
    },
    TestStarted {
        test: TestIdentifier,
    },
    TestFailed {
        test: TestIdentifier,
        trace: String,
    },
    TestAssumptionFailure {
        test: TestIdentifier,
        trace: String,
    },
    TestIgnored {
        test: TestIdentifier,
    },
    TestEnded {
        test: TestIdentifier,
        #[serde(default)]
        metrics: Metrics,
    },
    TestRunFailed {
        message: String,
    },
    TestRunStopped {
        elapsed_ms: u64,
    },
    TestRunEnded {
        #[serde(default)]
        elapsed_ms: u64,
        #[serde(default)]
        metrics: Metrics,
    },
    InvocationFailed {
        cause: InvocationFailure,
    },
    /// Log data, either inline or read from a file next to the event log
    TestLog {
        name: String,
        data_type: LogDataType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    InvocationEnded {
        #[serde(default)]
        elapsed_ms: u64,
    },
}

impl InvocationEvent {
    /// Deliver this event to `listener`
    pub fn dispatch(&self, listener: &dyn TestInvocationListener) {
        match self {
            InvocationEvent::InvocationStarted { context } => listener.invocation_started(context),
            InvocationEvent::TestRunStarted {
                run_name,
                test_count,
            } => listener.test_run_started(run_name, *test_count),
            InvocationEvent::TestStarted { test } => listener.test_started(test),
            InvocationEvent::TestFailed { test, trace } => listener.test_failed(test, trace),
            InvocationEvent::TestAssumptionFailure { test, trace } => {
                listener.test_assumption_failure(test, trace)
            }
            InvocationEvent::TestIgnored { test } => listener.test_ignored(test),
            InvocationEvent::TestEnded { test, metrics } => listener.test_ended(test, metrics),
            InvocationEvent::TestRunFailed { message } => listener.test_run_failed(message),
            InvocationEvent::TestRunStopped { elapsed_ms } => listener.test_run_stopped(*elapsed_ms),
            InvocationEvent::TestRunEnded {
                elapsed_ms,
                metrics,
            } => listener.test_run_ended(*elapsed_ms, metrics),
            InvocationEvent::InvocationFailed { cause } => listener.invocation_failed(cause),
            InvocationEvent::TestLog {
                name,
                data_type,
                content,
                path,
            } => match (content, path) {
                (_, Some(path)) => listener.test_log(name, *data_type, &FileSource::new(path)),
                (Some(content), None) => {
                    listener.test_log(name, *data_type, &ByteSource::new(content.as_bytes()))
                }
                (None, None) => listener.test_log(name, *data_type, &ByteSource::new(Vec::new())),
            },
            InvocationEvent::InvocationEnded { elapsed_ms } => listener.invocation_ended(*elapsed_ms),
        }
    }
}

/// Stream source backed by a file that is opened on demand
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    cancelled: AtomicBool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cancelled: AtomicBool::new(false),
        }
    }
}

impl InputStreamSource for FileSource {
    fn create_input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(io::Error::other("stream source was cancelled"));
        }
        Ok(Box::new(File::open(&self.path)?))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map_or(0, |m| m.len())
    }
}

/// Parse JSON-lines events; blank lines are skipped
pub fn read_events(reader: impl BufRead) -> Result<Vec<InvocationEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", line_no))?;
        events.push(event);
    }
    Ok(events)
}

/// Read an event log from disk.
///
/// Relative `path`s of `test_log` events are resolved against the log's
/// directory.
pub fn read_events_from_file(path: &Path) -> Result<Vec<InvocationEvent>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open event log: {}", path.display()))?;
    let mut events = read_events(BufReader::new(file))
        .with_context(|| format!("Failed to parse event log: {}", path.display()))?;

    let base = path.parent().unwrap_or(Path::new("."));
    for event in &mut events {
        if let InvocationEvent::TestLog {
            path: Some(log_path),
            ..
        } = event
            && log_path.is_relative()
        {
            *log_path = base.join(&*log_path);
        }
    }
    Ok(events)
}

/// Deliver `events` to `listener` in order, returning how many were sent
pub fn replay<'a>(
    events: impl IntoIterator<Item = &'a InvocationEvent>,
    listener: &dyn TestInvocationListener,
) -> usize {
    let mut count = 0;
    for event in events {
        event.dispatch(listener);
        count += 1;
    }
    tracing::debug!("replayed {} events", count);
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape() {
        let event = InvocationEvent::TestStarted {
            test: TestIdentifier::new("FooTest", "testA"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"test_started","test":{"class":"FooTest","method":"testA"}}"#
        );
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let event: InvocationEvent =
            serde_json::from_str(r#"{"event":"test_run_ended"}"#).unwrap();
        assert_eq!(
            event,
            InvocationEvent::TestRunEnded {
                elapsed_ms: 0,
                metrics: Metrics::new()
            }
        );
    }

    #[test]
    fn test_file_source_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "hello").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.size(), 5);
        let mut text = String::new();
        source
            .create_input_stream()
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "hello");

        source.cancel();
        assert!(source.create_input_stream().is_err());
    }
}
