use std::sync::LazyLock;

use bsl_syntax::TokenKind;
use bsl_types::DiagnosticSeverity;
use regex::Regex;

use crate::descriptor::{ParameterSpec, RuleDescriptor};
use crate::diagnostics::Diagnostic;
use crate::rules::compile_param;
use crate::traits::{Rule, RuleContext, RuleError};

const DEFAULT_SERVICE_TAGS: &str = r"todo|fixme|!!|mrg|@|отладка|debug|для\s*отладки|(\{\{|\}\})КОНСТРУКТОР_|(\{\{|\}\})MRG";

fn tag_pattern(tags: &str) -> String {
    format!(r"//\s*({tags})")
}

#[allow(clippy::expect_used)]
static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile_param("serviceTags", &tag_pattern(DEFAULT_SERVICE_TAGS))
        .expect("default service tag pattern is valid")
});

/// Flags comments that carry service tags such as `TODO` or `FIXME`.
pub struct UsingServiceTagRuleImpl;

impl Rule for UsingServiceTagRuleImpl {
    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor::new(
            "UsingServiceTag",
            "Using service tags in comments",
            DiagnosticSeverity::Information,
        )
        .tags(&["badpractice"])
        .param(
            ParameterSpec::string("serviceTags", DEFAULT_SERVICE_TAGS)
                .describe("Service tags, as a regular expression alternation"),
        )
        .always_applicable()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        let tags = ctx
            .params()
            .string("serviceTags")
            .unwrap_or(DEFAULT_SERVICE_TAGS);
        let configured;
        let pattern = if tags == DEFAULT_SERVICE_TAGS {
            &*DEFAULT_PATTERN
        } else {
            configured = compile_param("serviceTags", &tag_pattern(tags))?;
            &configured
        };

        let text = ctx.text();
        Ok(ctx
            .tokens()
            .iter()
            .filter(|token| token.kind == TokenKind::Comment)
            .filter_map(|token| {
                let captures = pattern.captures(token.text(text))?;
                let tag = captures.get(1)?.as_str();
                Some(ctx.diagnostic(token.range, format!("Service tag '{tag}' found")))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{run, run_with, texts};
    use serde_json::json;

    const SOURCE: &str = "\
// TODO: переписать
А = 1; // fixme later
// обычный комментарий
//Отладка
Б = \"// todo в строке\";
";

    #[test]
    fn test_default_pattern_compiles() {
        assert!(DEFAULT_PATTERN.is_match("// TODO"));
    }

    #[test]
    fn test_default_tags() {
        let diagnostics = run(&UsingServiceTagRuleImpl, SOURCE);
        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Service tag 'TODO' found",
                "Service tag 'fixme' found",
                "Service tag 'Отладка' found",
            ]
        );
        assert_eq!(
            texts(SOURCE, &diagnostics),
            vec!["// TODO: переписать", "// fixme later", "//Отладка"]
        );
        assert!(diagnostics
            .iter()
            .all(|d| d.severity == DiagnosticSeverity::Information));
    }

    #[test]
    fn test_custom_tags() {
        let diagnostics = run_with(
            &UsingServiceTagRuleImpl,
            SOURCE,
            Some(json!({ "serviceTags": "обычный" })),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Service tag 'обычный' found");
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let descriptor = UsingServiceTagRuleImpl.descriptor();
        let (params, _) = descriptor.resolve_params(Some(&json!({ "serviceTags": "(" })));
        let parse = bsl_syntax::parse("// todo");
        let ctx = RuleContext::new(
            &descriptor.id,
            descriptor.default_severity,
            &params,
            &parse,
            bsl_types::FileScope::Bsl,
        );
        assert!(matches!(
            UsingServiceTagRuleImpl.evaluate(&ctx),
            Err(RuleError::InvalidParameter { .. })
        ));
    }
}
