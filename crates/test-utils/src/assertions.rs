//! Snapshot-friendly rendering of diagnostics.
//!
//! Diagnostics are formatted one per line, with 1-based positions, so insta
//! snapshots stay readable:
//!
//! ```ignore
//! use bsl_test_utils::format_diagnostics;
//!
//! let publication = await_version(&host, &uri, version);
//! insta::assert_snapshot!(format_diagnostics(&publication.diagnostics), @"...");
//! ```

use bsl_linter::Diagnostic;

/// Format diagnostics as `line:col-line:col severity Rule: message`.
#[must_use]
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::from("(no diagnostics)");
    }

    diagnostics
        .iter()
        .map(|d| {
            format!(
                "{}-{} {} {}: {}",
                d.range.start, d.range.end, d.severity, d.rule, d.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format messages only (without position info).
#[must_use]
pub fn format_diagnostic_messages(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::from("(no diagnostics)");
    }

    diagnostics
        .iter()
        .enumerate()
        .map(|(i, d)| format!("[{}] {}", i + 1, d.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rule ids of `diagnostics`, in order.
#[must_use]
pub fn rule_ids(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.rule.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsl_types::{DiagnosticSeverity, Position, Range};

    fn diagnostic(message: &str) -> Diagnostic {
        Diagnostic::new(
            "MissingSpace".into(),
            DiagnosticSeverity::Information,
            Range::new(Position::new(0, 1), Position::new(0, 2)),
            message,
        )
    }

    #[test]
    fn test_format_diagnostics_empty() {
        assert_eq!(format_diagnostics(&[]), "(no diagnostics)");
    }

    #[test]
    fn test_format_diagnostics_single() {
        let formatted = format_diagnostics(&[diagnostic("Missing space to the left of '='")]);
        assert_eq!(
            formatted,
            "1:2-1:3 info MissingSpace: Missing space to the left of '='"
        );
    }

    #[test]
    fn test_format_diagnostic_messages() {
        let formatted = format_diagnostic_messages(&[diagnostic("Error 1"), diagnostic("Error 2")]);
        assert_eq!(formatted, "[1] Error 1\n[2] Error 2");
    }
}
