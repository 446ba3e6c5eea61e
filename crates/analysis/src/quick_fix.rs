//! On-demand quick fixes.
//!
//! Fixes are never computed during analysis. When one is requested, the
//! diagnostic is checked against the document's current text first: its
//! range must still exist and still cover the text it was reported on.
//! Anything else is refused as stale instead of producing a misaligned edit.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bsl_linter::{Diagnostic, FixContext, RuleId, RuleRegistry, RuleSet};
use bsl_syntax::{Parse, SyntaxProvider};
use bsl_types::{CodeFix, DocumentUri, OffsetRange};

use crate::document::DocumentStore;
use crate::task::{panic_message, parse_contained};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixError {
    #[error("unknown rule '{0}'")]
    UnknownRule(RuleId),
    #[error("document '{0}' is not open")]
    DocumentNotFound(DocumentUri),
    /// The diagnostic no longer matches the document text.
    #[error("diagnostic from '{rule}' no longer matches the current text")]
    Stale { rule: RuleId },
    #[error("rule '{rule}' failed to produce a fix: {reason}")]
    RuleFailed { rule: RuleId, reason: String },
}

pub(crate) struct QuickFixes<'a> {
    pub(crate) store: &'a DocumentStore,
    pub(crate) registry: &'a RuleRegistry,
    pub(crate) rules: &'a RuleSet,
    pub(crate) provider: &'a dyn SyntaxProvider,
}

impl QuickFixes<'_> {
    #[tracing::instrument(skip(self, diagnostic), fields(rule = %diagnostic.rule))]
    pub(crate) fn fixes_for(
        &self,
        uri: &DocumentUri,
        diagnostic: &Diagnostic,
    ) -> Result<Vec<CodeFix>, FixError> {
        let rule_id = &diagnostic.rule;
        let registered = self
            .registry
            .get(rule_id.as_str())
            .ok_or_else(|| FixError::UnknownRule(rule_id.clone()))?;
        if !registered.descriptor.fixable || diagnostic.is_internal_error() {
            return Ok(Vec::new());
        }

        let snapshot = self
            .store
            .get(uri)
            .ok_or_else(|| FixError::DocumentNotFound(uri.clone()))?;
        let parse = snapshot
            .parse
            .unwrap_or_else(|| parse_contained(self.provider, &snapshot.text));

        let range = resolve_range(&parse, diagnostic)?;

        let params = self.rules.get(rule_id.as_str()).map_or_else(
            || Arc::new(registered.descriptor.default_params()),
            |active| Arc::clone(&active.params),
        );
        let ctx = FixContext::new(&parse, range, &params);

        let fixes = catch_unwind(AssertUnwindSafe(|| registered.rule.fix(diagnostic, &ctx)))
            .map_err(|payload| FixError::RuleFailed {
                rule: rule_id.clone(),
                reason: format!("panicked: {}", panic_message(payload.as_ref())),
            })?
            .map_err(|error| FixError::RuleFailed {
                rule: rule_id.clone(),
                reason: error.to_string(),
            })?;

        if let Some(invalid) = fixes.iter().find(|fix| fix.apply(parse.text()).is_none()) {
            return Err(FixError::RuleFailed {
                rule: rule_id.clone(),
                reason: format!("fix '{}' has an edit outside the document", invalid.label),
            });
        }

        tracing::debug!(count = fixes.len(), "computed fixes");
        Ok(fixes)
    }
}

/// Map the diagnostic's range onto the current text and check the anchor.
fn resolve_range(parse: &Parse, diagnostic: &Diagnostic) -> Result<OffsetRange, FixError> {
    let stale = || FixError::Stale {
        rule: diagnostic.rule.clone(),
    };
    let range = parse
        .tree()
        .line_index()
        .offset_range(diagnostic.range)
        .ok_or_else(stale)?;
    let current = parse.text().get(range.start..range.end).ok_or_else(stale)?;
    match &diagnostic.anchor {
        Some(anchor) if anchor == current => Ok(range),
        _ => Err(stale()),
    }
}
