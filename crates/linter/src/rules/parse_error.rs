use bsl_types::DiagnosticSeverity;

use crate::descriptor::{RuleDescriptor, RuleKind};
use crate::diagnostics::Diagnostic;
use crate::traits::{Rule, RuleContext, RuleError};

/// Reports the syntax errors of a module as diagnostics.
///
/// The parser recovers from errors, so the other rules still run on a
/// partial tree; this rule makes the errors themselves visible.
pub struct ParseErrorRuleImpl;

impl Rule for ParseErrorRuleImpl {
    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor::new(
            "ParseError",
            "Source code parse error",
            DiagnosticSeverity::Error,
        )
        .kind(RuleKind::Error)
        .tags(&["error"])
        .minutes_to_fix(5)
        .always_applicable()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        Ok(ctx
            .syntax_errors()
            .iter()
            .map(|error| ctx.diagnostic(error.range, format!("Syntax error: {}", error.message)))
            .collect())
    }
}
