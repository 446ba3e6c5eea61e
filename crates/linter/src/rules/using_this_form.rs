use bsl_syntax::{Node, NodeKind, SyntaxTree, TokenKind};
use bsl_types::{CodeFix, DiagnosticSeverity, FileScope, OffsetRange};
use serde_json::json;

use crate::descriptor::{RuleDescriptor, RuleKind};
use crate::diagnostics::Diagnostic;
use crate::traits::{FixContext, Rule, RuleContext, RuleError};

const THIS_OBJECT: &str = "ЭтотОбъект";
const THIS_OBJECT_EN: &str = "ThisObject";

/// Compilation directives that only exist in managed form modules.
const FORM_ANNOTATIONS: &[&str] = &[
    "наклиенте",
    "atclient",
    "насервере",
    "atserver",
    "насерверебезконтекста",
    "atservernocontext",
    "наклиентенасервере",
    "atclientatserver",
    "наклиентенасерверебезконтекста",
    "atclientatservernocontext",
];

/// Whole-token match. Identifiers that merely start with the property name,
/// such as `ЭтаФормаВладелец`, are different variables and are not reported.
fn is_this_form(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower == "этаформа" || lower == "thisform"
}

fn replacement_for(text: &str) -> &'static str {
    if text.to_lowercase() == "этаформа" {
        THIS_OBJECT
    } else {
        THIS_OBJECT_EN
    }
}

fn is_form_module(ctx: &RuleContext<'_>) -> bool {
    let text = ctx.text();
    ctx.tokens()
        .iter()
        .filter(|token| token.kind == TokenKind::Annotation)
        .any(|token| {
            let name = token.text(text).trim_start_matches('&').to_lowercase();
            FORM_ANNOTATIONS.contains(&name.as_str())
        })
}

/// Methods that take `ЭтаФорма` as a parameter refer to it legitimately.
fn shadowed_by_parameter(node: Node<'_>) -> bool {
    let Some(method) = node.enclosing_method() else {
        return false;
    };
    method
        .children()
        .filter(|child| child.kind() == NodeKind::ParamList)
        .flat_map(Node::children)
        .any(|param| param.name().is_some_and(is_this_form))
}

/// Ranges of `ЭтаФорма` references the rule reports, in source order.
fn references(tree: &SyntaxTree) -> Vec<OffsetRange> {
    let text = tree.text();
    let mut ranges = Vec::new();
    for node in tree.nodes() {
        let candidates: Vec<OffsetRange> = match node.kind() {
            NodeKind::CallStatement => node
                .first_token()
                .filter(|token| is_this_form(token.text(text)))
                .map(|token| token.range)
                .into_iter()
                .collect(),
            NodeKind::Expression => node
                .significant_tokens()
                .filter(|(_, token)| token.kind == TokenKind::Identifier)
                .filter(|(_, token)| is_this_form(token.text(text)))
                .map(|(_, token)| token.range)
                .collect(),
            _ => continue,
        };
        if !candidates.is_empty() && !shadowed_by_parameter(node) {
            ranges.extend(candidates);
        }
    }
    ranges.sort();
    ranges
}

/// Flags the deprecated `ЭтаФорма` / `ThisForm` property in form modules.
pub struct UsingThisFormRuleImpl;

impl Rule for UsingThisFormRuleImpl {
    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor::new(
            "UsingThisForm",
            "Using deprecated property \"ThisForm\"",
            DiagnosticSeverity::Warning,
        )
        .kind(RuleKind::CodeSmell)
        .scope(FileScope::Bsl)
        .tags(&["standard", "deprecated"])
        .fixable()
        .applies_to(&[NodeKind::CallStatement, NodeKind::Expression])
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        if !is_form_module(ctx) {
            return Ok(Vec::new());
        }
        let text = ctx.text();
        Ok(references(ctx.tree())
            .into_iter()
            .map(|range| {
                let found = &text[range.start..range.end];
                let replacement = replacement_for(found);
                ctx.diagnostic(range, format!("Replace '{found}' with '{replacement}'"))
                    .with_payload(json!({ "replacement": replacement }))
            })
            .collect())
    }

    fn fix(&self, diagnostic: &Diagnostic, ctx: &FixContext<'_>) -> Result<Vec<CodeFix>, RuleError> {
        let range = ctx.range();
        let replacement = match diagnostic
            .payload
            .as_ref()
            .and_then(|payload| payload.get("replacement"))
        {
            Some(value) => value
                .as_str()
                .ok_or_else(|| RuleError::Payload("'replacement' must be a string".to_string()))?
                .to_string(),
            None => {
                let current = ctx
                    .text()
                    .get(range.start..range.end)
                    .ok_or_else(|| RuleError::Payload("range outside of text".to_string()))?;
                replacement_for(current).to_string()
            }
        };
        Ok(vec![CodeFix::replace(
            format!("Replace with '{replacement}'"),
            range.start,
            range.end,
            replacement,
        )])
    }
}
