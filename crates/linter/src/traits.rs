//! The rule plugin contract.

use bsl_syntax::{Parse, SyntaxError, SyntaxTree, Token};
use bsl_types::{CodeFix, DiagnosticSeverity, FileScope, OffsetRange};

use crate::descriptor::{RuleDescriptor, RuleParams};
use crate::diagnostics::{Diagnostic, RuleId};

/// Expected failure of a rule.
///
/// Panics are contained by the engine as well; returning an error is the
/// polite way to give up.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("{0}")]
    Failed(String),
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },
    #[error("malformed diagnostic payload: {0}")]
    Payload(String),
}

/// A self-contained analysis unit.
///
/// Rules must be reentrant: the engine evaluates the same rule instance
/// concurrently against different documents. Rules must not perform I/O or
/// keep state between calls.
pub trait Rule: Send + Sync {
    /// Declared metadata. Read once, at registration.
    fn descriptor(&self) -> RuleDescriptor;

    /// Check one document.
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError>;

    /// Propose edits resolving `diagnostic`.
    ///
    /// Only called for rules whose descriptor is marked fixable, lazily,
    /// when a user asks for a fix.
    fn fix(
        &self,
        _diagnostic: &Diagnostic,
        _ctx: &FixContext<'_>,
    ) -> Result<Vec<CodeFix>, RuleError> {
        Ok(Vec::new())
    }
}

/// Read-only view handed to [`Rule::evaluate`].
pub struct RuleContext<'a> {
    rule: &'a RuleId,
    severity: DiagnosticSeverity,
    params: &'a RuleParams,
    parse: &'a Parse,
    file: FileScope,
}

impl<'a> RuleContext<'a> {
    #[must_use]
    pub fn new(
        rule: &'a RuleId,
        severity: DiagnosticSeverity,
        params: &'a RuleParams,
        parse: &'a Parse,
        file: FileScope,
    ) -> Self {
        Self {
            rule,
            severity,
            params,
            parse,
            file,
        }
    }

    #[must_use]
    pub fn tree(&self) -> &'a SyntaxTree {
        self.parse.tree()
    }

    #[must_use]
    pub fn tokens(&self) -> &'a [Token] {
        self.parse.tokens()
    }

    #[must_use]
    pub fn text(&self) -> &'a str {
        self.parse.text()
    }

    #[must_use]
    pub fn syntax_errors(&self) -> &'a [SyntaxError] {
        self.parse.errors()
    }

    #[must_use]
    pub fn params(&self) -> &'a RuleParams {
        self.params
    }

    #[must_use]
    pub fn file_scope(&self) -> FileScope {
        self.file
    }

    #[must_use]
    pub fn rule_id(&self) -> &'a RuleId {
        self.rule
    }

    /// A diagnostic for this rule at its configured severity.
    #[must_use]
    pub fn diagnostic(&self, range: OffsetRange, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(
            self.rule.clone(),
            self.severity,
            self.tree().line_index().range(range),
            message,
        )
    }
}

/// Read-only view handed to [`Rule::fix`].
///
/// `range` is the diagnostic's range resolved against the current text.
pub struct FixContext<'a> {
    parse: &'a Parse,
    range: OffsetRange,
    params: &'a RuleParams,
}

impl<'a> FixContext<'a> {
    #[must_use]
    pub fn new(parse: &'a Parse, range: OffsetRange, params: &'a RuleParams) -> Self {
        Self {
            parse,
            range,
            params,
        }
    }

    #[must_use]
    pub fn tree(&self) -> &'a SyntaxTree {
        self.parse.tree()
    }

    #[must_use]
    pub fn text(&self) -> &'a str {
        self.parse.text()
    }

    #[must_use]
    pub fn range(&self) -> OffsetRange {
        self.range
    }

    #[must_use]
    pub fn params(&self) -> &'a RuleParams {
        self.params
    }
}
