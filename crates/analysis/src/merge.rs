//! Combining per-rule results into one diagnostic set.
//!
//! The merged set depends only on the multiset of inputs, never on the order
//! rules finished in: diagnostics are sorted by a total order over all of
//! their fields, then entries with the same rule, range and message are
//! collapsed. Two different rules reporting the same range and message are
//! both kept.

use std::cmp::Ordering;

use bsl_linter::Diagnostic;
use bsl_syntax::Parse;

/// Merge diagnostics from any number of rules.
#[must_use]
pub fn merge(diagnostics: impl IntoIterator<Item = Diagnostic>) -> Vec<Diagnostic> {
    let mut merged: Vec<Diagnostic> = diagnostics.into_iter().collect();
    merged.sort_by(compare);
    merged.dedup_by(|later, earlier| {
        later.rule == earlier.rule && later.range == earlier.range && later.message == earlier.message
    });
    merged
}

/// Total order used by [`merge`].
#[must_use]
pub fn compare(a: &Diagnostic, b: &Diagnostic) -> Ordering {
    a.range
        .cmp(&b.range)
        .then_with(|| a.rule.cmp(&b.rule))
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.severity.cmp(&b.severity))
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| payload_key(a).cmp(&payload_key(b)))
        .then_with(|| a.anchor.cmp(&b.anchor))
}

fn payload_key(diagnostic: &Diagnostic) -> Option<String> {
    diagnostic
        .payload
        .as_ref()
        .map(serde_json::Value::to_string)
}

/// Record the source text under each finding's range.
///
/// Internal errors carry no location and get no anchor.
pub(crate) fn stamp_anchors(diagnostics: &mut [Diagnostic], parse: &Parse) {
    let line_index = parse.tree().line_index();
    let text = parse.text();
    for diagnostic in diagnostics.iter_mut().filter(|d| !d.is_internal_error()) {
        let anchor = line_index
            .offset_range(diagnostic.range)
            .and_then(|range| text.get(range.start..range.end));
        if let Some(anchor) = anchor {
            diagnostic.anchor = Some(anchor.to_string());
        }
    }
}
