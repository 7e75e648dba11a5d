// Log artifacts and summaries passed between listeners

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Kind of data carried by a `test_log` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDataType {
    Text,
    Bugreport,
    Logcat,
    Xml,
    Png,
    Zip,
    Json,
    Unknown,
}

impl LogDataType {
    pub fn file_ext(self) -> &'static str {
        match self {
            LogDataType::Text | LogDataType::Bugreport | LogDataType::Logcat => "txt",
            LogDataType::Xml => "xml",
            LogDataType::Png => "png",
            LogDataType::Zip => "zip",
            LogDataType::Json => "json",
            LogDataType::Unknown => "dat",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            LogDataType::Text | LogDataType::Bugreport | LogDataType::Logcat => "text/plain",
            LogDataType::Xml => "text/xml",
            LogDataType::Png => "image/png",
            LogDataType::Zip => "application/zip",
            LogDataType::Json => "application/json",
            LogDataType::Unknown => "application/octet-stream",
        }
    }
}

/// A sized byte stream that can be opened any number of times
pub trait InputStreamSource: Send + Sync {
    /// Open a fresh reader positioned at the start of the data
    fn create_input_stream(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Release the underlying data; later opens fail
    fn cancel(&self);

    /// Size of the data in bytes
    fn size(&self) -> u64;
}

/// In-memory stream source
#[derive(Debug, Clone)]
pub struct ByteSource {
    data: Arc<[u8]>,
    cancelled: Arc<AtomicBool>,
}

impl ByteSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            data: data.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl InputStreamSource for ByteSource {
    fn create_input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        if self.is_cancelled() {
            return Err(io::Error::other("stream source was cancelled"));
        }
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Location of a saved log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl LogFile {
    pub fn new(path: impl Into<String>, url: Option<String>) -> Self {
        Self {
            path: path.into(),
            url,
        }
    }

    /// URL when the log was uploaded somewhere, otherwise the local path
    pub fn location(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.path)
    }
}

/// Summary produced by a listener at the end of an invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub summary: String,
    #[serde(default)]
    pub kv_entries: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl TestSummary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kv_entries.insert(key.into(), value.into());
        self
    }
}
