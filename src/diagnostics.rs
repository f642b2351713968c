//! Issue records produced by the analyzers

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Severity level for issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational / cleanup
    #[default]
    Info,
    /// Style or robustness risk
    Warning,
    /// Correctness risk
    Error,
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" | "hint" => Ok(Severity::Info),
            _ => Err(()),
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    /// Rule name that produced this issue (e.g. "Hardcoded Value Detection")
    pub rule: String,
    /// Short classification label (e.g. "Missing TXN_ Prefix")
    pub issue_type: String,
    /// Where the issue was found, as an effective ancestor path
    pub location: String,
    pub description: String,
    /// Enclosing logical container name
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        rule: impl Into<String>,
        issue_type: impl Into<String>,
        location: impl Into<String>,
        description: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            rule: rule.into(),
            issue_type: issue_type.into(),
            location: location.into(),
            description: description.into(),
            container: container.into(),
            element: None,
            key: None,
            value: None,
        }
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Attach an element name only when one is known
    pub fn with_element_opt(mut self, element: Option<&str>) -> Self {
        self.element = element.map(str::to_string);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Append a one-line note to the description
    pub fn append_note(&mut self, note: &str) {
        self.description.push('\n');
        self.description.push_str(note);
    }
}
