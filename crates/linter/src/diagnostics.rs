use std::sync::Arc;

use bsl_types::{DiagnosticSeverity, Range};

/// Stable, human-readable rule identifier such as `"MissingSpace"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(Arc<str>);

impl RuleId {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RuleId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl std::borrow::Borrow<str> for RuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Whether a diagnostic is a finding or the record of a rule that broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DiagnosticKind {
    #[default]
    Finding,
    /// The rule failed, panicked or ran past its deadline; its findings
    /// for this version are missing.
    InternalError,
}

/// One rule's finding: a located, severity-tagged message.
///
/// Created by a rule's evaluation and never mutated afterwards, apart from
/// the engine stamping [`anchor`](Self::anchor) before publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Rule identifier (e.g., `"UsingThisForm"`)
    pub rule: RuleId,
    /// Severity (from rule default or config override)
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub range: Range,
    pub kind: DiagnosticKind,
    /// Machine-readable data a quick fix can rebuild its edit from
    pub payload: Option<serde_json::Value>,
    /// Source text under `range` when the diagnostic was computed
    pub anchor: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        rule: RuleId,
        severity: DiagnosticSeverity,
        range: Range,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule,
            severity,
            message: message.into(),
            range,
            kind: DiagnosticKind::Finding,
            payload: None,
            anchor: None,
        }
    }

    /// The diagnostic that stands in for a rule which failed to evaluate.
    #[must_use]
    pub fn internal_error(rule: RuleId, reason: impl std::fmt::Display) -> Self {
        let message = format!("Rule '{rule}' failed: {reason}");
        Self {
            rule,
            severity: DiagnosticSeverity::Error,
            message,
            range: Range::default(),
            kind: DiagnosticKind::InternalError,
            payload: None,
            anchor: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        self.kind == DiagnosticKind::InternalError
    }
}
