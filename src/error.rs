// Error taxonomy for the reporting pipeline

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A capture rule that can never fire sensibly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid predicate [{predicate}]: {reason}")]
pub struct PredicateError {
    pub predicate: String,
    pub reason: &'static str,
}

/// Mail reporter configuration problems.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid destination address '{0}'")]
    InvalidDestination(String),

    #[error("invalid sender address '{0}'")]
    InvalidSender(String),
}

/// Failures raised by a mail transport.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("message has no recipients")]
    NoRecipients,

    #[error("transport rejected message: {0}")]
    Rejected(String),

    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by the device collaborator.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {serial} not available after {waited:?}")]
    NotAvailable { serial: String, waited: Duration },

    #[error("bugreport capture failed on {serial}: {message}")]
    Capture { serial: String, message: String },
}

/// Failures while persisting log streams.
#[derive(Debug, Error)]
pub enum LogSaverError {
    #[error("log saver has no open invocation directory")]
    NotStarted,

    #[error("failed to save log to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
