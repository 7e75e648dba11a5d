// Email reporter - mails an invocation summary when the invocation ends

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use email_address::EmailAddress;

use super::collecting::CollectingListener;
use super::{TestInvocationListener, lock, read, write};
use crate::config::{EmailConfig, PolicyKind, default_subject_tag};
use crate::error::{EmailError, MailError};
use crate::state::{
    FailureKind, InvocationContext, InvocationFailure, Metrics, TestIdentifier, TestStatus,
    TestSummary,
};
use crate::utils::hostname;

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub sender: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

impl Message {
    /// Headers, a blank line, then the body
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(sender) = &self.sender {
            out.push_str(&format!("From: {}\n", sender));
        }
        out.push_str(&format!("To: {}\n", self.to.join(", ")));
        out.push_str(&format!("Subject: {}\n", self.subject));
        let content_type = if self.html { "text/html" } else { "text/plain" };
        out.push_str(&format!("Content-Type: {}; charset=utf-8\n\n", content_type));
        out.push_str(&self.body);
        out
    }
}

/// Transport for notifications
pub trait Mailer: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// Appends every message to a local mailbox file
#[derive(Debug)]
pub struct OutboxMailer {
    path: PathBuf,
    guard: Mutex<()>,
}

impl OutboxMailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, message: &Message) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        let _guard = lock(&self.guard);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", message.render())?;
        tracing::info!("queued '{}' in {}", message.subject, self.path.display());
        Ok(())
    }
}

/// Overall outcome named in the subject line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Success,
    BuildError,
    Failed,
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvocationStatus::Success => "SUCCESS",
            InvocationStatus::BuildError => "BUILD_ERROR",
            InvocationStatus::Failed => "FAILED",
        })
    }
}

/// Decides whether a finished invocation is worth a message
pub trait SendPolicy: Send + Sync {
    fn should_send(&self, reporter: &EmailResultReporter) -> bool;
}

/// Send after every invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSend;

impl SendPolicy for AlwaysSend {
    fn should_send(&self, _reporter: &EmailResultReporter) -> bool {
        true
    }
}

/// Send only when the invocation lost its device
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceUnavailableOnly;

impl SendPolicy for DeviceUnavailableOnly {
    fn should_send(&self, reporter: &EmailResultReporter) -> bool {
        reporter
            .invocation_failure()
            .is_some_and(|failure| failure.kind == FailureKind::DeviceNotAvailable)
    }
}

/// Send when any test or the invocation itself failed
#[derive(Debug, Clone, Copy, Default)]
pub struct FailuresOnly;

impl SendPolicy for FailuresOnly {
    fn should_send(&self, reporter: &EmailResultReporter) -> bool {
        reporter.invocation_failure().is_some() || reporter.collector().has_failed_tests()
    }
}

fn policy_for(kind: PolicyKind) -> Box<dyn SendPolicy> {
    match kind {
        PolicyKind::Always => Box::new(AlwaysSend),
        PolicyKind::DeviceUnavailable => Box::new(DeviceUnavailableOnly),
        PolicyKind::Failures => Box::new(FailuresOnly),
    }
}

/// Collects results and mails a summary to a fixed list of destinations on
/// `invocation_ended`.
///
/// Mail failures are logged and never reach the caller.
pub struct EmailResultReporter {
    collector: CollectingListener,
    mailer: Box<dyn Mailer>,
    sender: Option<String>,
    destinations: BTreeSet<String>,
    subject_tag: String,
    html: bool,
    policy: Box<dyn SendPolicy>,
    host: String,
    failure: RwLock<Option<InvocationFailure>>,
    summaries: RwLock<Vec<TestSummary>>,
}

impl EmailResultReporter {
    pub fn new(mailer: Box<dyn Mailer>) -> Self {
        Self {
            collector: CollectingListener::new(),
            mailer,
            sender: None,
            destinations: BTreeSet::new(),
            subject_tag: default_subject_tag(),
            html: false,
            policy: Box::new(AlwaysSend),
            host: hostname(),
            failure: RwLock::new(None),
            summaries: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &EmailConfig, mailer: Box<dyn Mailer>) -> Result<Self, EmailError> {
        let mut reporter = Self::new(mailer);
        reporter.set_sender(config.sender.clone())?;
        for destination in &config.destinations {
            reporter.add_destination(destination)?;
        }
        reporter.set_subject_tag(&config.subject_tag);
        reporter.set_html(config.html);
        reporter.set_policy(policy_for(config.policy));
        Ok(reporter)
    }

    pub fn add_destination(&mut self, destination: &str) -> Result<(), EmailError> {
        if !EmailAddress::is_valid(destination) {
            return Err(EmailError::InvalidDestination(destination.to_string()));
        }
        self.destinations.insert(destination.to_string());
        Ok(())
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.destinations.iter().map(String::as_str)
    }

    pub fn set_sender(&mut self, sender: Option<String>) -> Result<(), EmailError> {
        if let Some(address) = &sender
            && !EmailAddress::is_valid(address)
        {
            return Err(EmailError::InvalidSender(address.clone()));
        }
        self.sender = sender;
        Ok(())
    }

    pub fn set_subject_tag(&mut self, tag: &str) {
        self.subject_tag = tag.to_string();
    }

    pub fn set_html(&mut self, html: bool) {
        self.html = html;
    }

    pub fn set_policy(&mut self, policy: Box<dyn SendPolicy>) {
        self.policy = policy;
    }

    /// Host name written into the body
    pub fn set_hostname(&mut self, host: &str) {
        self.host = host.to_string();
    }

    /// Sum numeric run metrics of re-executed runs instead of overwriting them
    pub fn with_aggregate_metrics(self, aggregate: bool) -> Self {
        self.collector.set_aggregate_metrics(aggregate);
        self
    }

    pub fn collector(&self) -> &CollectingListener {
        &self.collector
    }

    pub fn invocation_failure(&self) -> Option<InvocationFailure> {
        read(&self.failure).clone()
    }

    pub fn invocation_status(&self) -> InvocationStatus {
        match read(&self.failure).as_ref() {
            None => InvocationStatus::Success,
            Some(failure) if failure.kind == FailureKind::BuildError => {
                InvocationStatus::BuildError
            }
            Some(_) => InvocationStatus::Failed,
        }
    }

    fn build_info(&self) -> InvocationContext {
        self.collector
            .build_info()
            .unwrap_or_else(|| InvocationContext::new("unknown"))
    }

    pub fn generate_subject(&self) -> String {
        let build = self.build_info();
        let mut words = vec![self.subject_tag.clone(), "result for".to_string()];
        words.push(
            build
                .test_tag
                .clone()
                .unwrap_or_else(|| "(unknown suite)".to_string()),
        );
        words.push("on".to_string());
        words.extend(build.build_flavor.clone());
        words.extend(build.build_branch.clone());
        match build.attribute("build_alias") {
            Some(alias) => words.push(alias.to_string()),
            None => words.push(format!("build {}", build.build_id)),
        }
        format!("{}: {}", words.join(" "), self.invocation_status())
    }

    pub fn generate_body(&self) -> String {
        let build = self.build_info();
        let mut body = String::new();
        for (key, value) in &build.attributes {
            body.push_str(&format!("{}: {}\n", key, value));
        }
        body.push_str(&format!("host: {}\n\n", self.host));

        if let Some(failure) = read(&self.failure).as_ref() {
            body.push_str(&format!("Invocation failed: {}\n", failure.trace()));
        }
        body.push_str(&format!(
            "Test results:  {} passed, {} failed\n\n",
            self.collector.num_tests_in_state(TestStatus::Passed),
            self.collector.num_all_failed_tests()
        ));
        self.collector.with_run_results(|runs| {
            for run in runs.filter(|run| !run.run_metrics().is_empty()) {
                body.push_str(&format!(
                    "'{}' test run metrics: {}\n",
                    run.name(),
                    format_map(run.run_metrics())
                ));
            }
        });
        body.push('\n');

        for summary in read(&self.summaries).iter() {
            body.push_str(&format!("Invocation summary report: {}\n", summary.summary));
            if !summary.kv_entries.is_empty() {
                body.push_str(&format!(
                    "Summary key-value dump:\n{}\n",
                    format_map(&summary.kv_entries)
                ));
            }
        }
        body
    }

    fn send_message(&self) {
        if self.destinations.is_empty() {
            tracing::error!("failed to send email because no destination addresses were set");
            return;
        }
        let message = Message {
            sender: self.sender.clone(),
            to: self.destinations.iter().cloned().collect(),
            subject: self.generate_subject(),
            body: self.generate_body(),
            html: self.html,
        };
        if let Err(e) = self.mailer.send(&message) {
            tracing::error!("failed to send email: {}", e);
        }
    }
}

fn format_map(map: &BTreeMap<String, String>) -> String {
    let entries: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{{{}}}", entries.join(", "))
}

impl TestInvocationListener for EmailResultReporter {
    fn invocation_started(&self, context: &InvocationContext) {
        *write(&self.failure) = None;
        self.collector.invocation_started(context);
    }

    fn test_run_started(&self, run_name: &str, test_count: usize) {
        self.collector.test_run_started(run_name, test_count);
    }

    fn test_started(&self, test: &TestIdentifier) {
        self.collector.test_started(test);
    }

    fn test_failed(&self, test: &TestIdentifier, trace: &str) {
        self.collector.test_failed(test, trace);
    }

    fn test_assumption_failure(&self, test: &TestIdentifier, trace: &str) {
        self.collector.test_assumption_failure(test, trace);
    }

    fn test_ignored(&self, test: &TestIdentifier) {
        self.collector.test_ignored(test);
    }

    fn test_ended(&self, test: &TestIdentifier, metrics: &Metrics) {
        self.collector.test_ended(test, metrics);
    }

    fn test_run_failed(&self, message: &str) {
        self.collector.test_run_failed(message);
    }

    fn test_run_stopped(&self, elapsed_ms: u64) {
        self.collector.test_run_stopped(elapsed_ms);
    }

    fn test_run_ended(&self, elapsed_ms: u64, run_metrics: &Metrics) {
        self.collector.test_run_ended(elapsed_ms, run_metrics);
    }

    fn invocation_failed(&self, cause: &InvocationFailure) {
        *write(&self.failure) = Some(cause.clone());
    }

    fn invocation_ended(&self, elapsed_ms: u64) {
        self.collector.invocation_ended(elapsed_ms);
        if !self.policy.should_send(self) {
            tracing::debug!("send policy declined notification");
            return;
        }
        self.send_message();
    }

    fn put_summary(&self, summaries: &[TestSummary]) {
        *write(&self.summaries) = summaries.to_vec();
    }

    fn listener_name(&self) -> &str {
        "EmailResultReporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_map() {
        let mut map = BTreeMap::new();
        assert_eq!(format_map(&map), "{}");
        map.insert("b".to_string(), "2".to_string());
        map.insert("a".to_string(), "1".to_string());
        assert_eq!(format_map(&map), "{a=1, b=2}");
    }

    #[test]
    fn test_render_message() {
        let message = Message {
            sender: Some("lab@example.com".to_string()),
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            subject: "hi".to_string(),
            body: "body".to_string(),
            html: false,
        };
        assert_eq!(
            message.render(),
            "From: lab@example.com\nTo: a@example.com, b@example.com\nSubject: hi\n\
             Content-Type: text/plain; charset=utf-8\n\nbody"
        );
    }

    #[test]
    fn test_outbox_requires_recipients() {
        let dir = tempfile::TempDir::new().unwrap();
        let mailer = OutboxMailer::new(dir.path().join("outbox"));
        let err = mailer.send(&Message::default()).unwrap_err();
        assert!(matches!(err, MailError::NoRecipients));
    }

    #[test]
    fn test_invalid_addresses_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut reporter =
            EmailResultReporter::new(Box::new(OutboxMailer::new(dir.path().join("outbox"))));
        assert!(reporter.add_destination("not an address").is_err());
        assert!(reporter.set_sender(Some("nope".to_string())).is_err());
        assert!(reporter.add_destination("dev@example.com").is_ok());
        assert_eq!(reporter.destinations().collect::<Vec<_>>(), vec!["dev@example.com"]);
    }
}
