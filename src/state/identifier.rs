use serde::{Deserialize, Serialize};
use std::fmt;

/// Names one test case within a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestIdentifier {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(rename = "method")]
    pub test_name: String,
}

impl TestIdentifier {
    pub fn new(class_name: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            test_name: test_name.into(),
        }
    }

    /// Class name without its package prefix
    pub fn class_simple_name(&self) -> &str {
        self.class_name
            .rsplit_once('.')
            .map_or(self.class_name.as_str(), |(_, simple)| simple)
    }
}

impl fmt::Display for TestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.test_name)
    }
}
