// Invocation metadata and terminal failure causes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Build and device metadata for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    pub build_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_flavor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_serial: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl InvocationContext {
    pub fn new(build_id: impl Into<String>) -> Self {
        Self {
            build_id: build_id.into(),
            ..Self::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.build_branch = Some(branch.into());
        self
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.build_flavor = Some(flavor.into());
        self
    }

    pub fn with_test_tag(mut self, tag: impl Into<String>) -> Self {
        self.test_tag = Some(tag.into());
        self
    }

    pub fn with_device_serial(mut self, serial: impl Into<String>) -> Self {
        self.device_serial = Some(serial.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Classification of an invocation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BuildError,
    DeviceNotAvailable,
    Other,
}

/// Cause reported through `invocation_failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl InvocationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn build_error(message: impl Into<String>) -> Self {
        Self::new(FailureKind::BuildError, message)
    }

    pub fn device_not_available(message: impl Into<String>) -> Self {
        Self::new(FailureKind::DeviceNotAvailable, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// Stack trace if one was captured, otherwise the message
    pub fn trace(&self) -> &str {
        self.stack_trace.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FailureKind::BuildError => "build error",
            FailureKind::DeviceNotAvailable => "device not available",
            FailureKind::Other => "invocation error",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = InvocationContext::new("1234")
            .with_branch("main")
            .with_flavor("walleye-userdebug")
            .with_test_tag("smoke")
            .with_attribute("build_alias", "QP1A");
        assert_eq!(ctx.build_id, "1234");
        assert_eq!(ctx.build_branch.as_deref(), Some("main"));
        assert_eq!(ctx.attribute("build_alias"), Some("QP1A"));
        assert_eq!(ctx.attribute("missing"), None);
    }

    #[test]
    fn test_failure_trace_falls_back_to_message() {
        let failure = InvocationFailure::other("boom");
        assert_eq!(failure.trace(), "boom");
        let failure = failure.with_stack_trace("at Foo.bar()");
        assert_eq!(failure.trace(), "at Foo.bar()");
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let ctx: InvocationContext = serde_json::from_str(r#"{"build_id":"42"}"#).unwrap();
        assert_eq!(ctx, InvocationContext::new("42"));
    }
}
