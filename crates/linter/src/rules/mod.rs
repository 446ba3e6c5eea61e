//! Built-in rule implementations.
//!
//! Each rule lives in its own file and implements [`Rule`](crate::Rule).
//! Token based rules opt into running on every tree; the rest declare the
//! node kinds they look at so the scheduler can skip them.

use regex::{Regex, RegexBuilder};

use crate::traits::RuleError;

mod commented_code;
mod missing_space;
mod parse_error;
mod using_hardcode_path;
mod using_service_tag;
mod using_this_form;

pub use commented_code::CommentedCodeRuleImpl;
pub use missing_space::MissingSpaceRuleImpl;
pub use parse_error::ParseErrorRuleImpl;
pub use using_hardcode_path::UsingHardcodePathRuleImpl;
pub use using_service_tag::UsingServiceTagRuleImpl;
pub use using_this_form::UsingThisFormRuleImpl;

/// Compile a user supplied pattern, case-insensitively.
fn compile_param(name: &str, pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| RuleError::InvalidParameter {
            name: name.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use bsl_types::FileScope;

    use crate::diagnostics::Diagnostic;
    use crate::traits::{FixContext, Rule, RuleContext};

    pub fn run(rule: &dyn Rule, text: &str) -> Vec<Diagnostic> {
        run_with(rule, text, None)
    }

    pub fn run_with(
        rule: &dyn Rule,
        text: &str,
        options: Option<serde_json::Value>,
    ) -> Vec<Diagnostic> {
        let descriptor = rule.descriptor();
        let (params, problems) = descriptor.resolve_params(options.as_ref());
        assert!(problems.is_empty(), "{problems:?}");
        let parse = bsl_syntax::parse(text);
        let ctx = RuleContext::new(
            &descriptor.id,
            descriptor.default_severity,
            &params,
            &parse,
            FileScope::Bsl,
        );
        rule.evaluate(&ctx).unwrap()
    }

    /// Apply the first fix offered for `diagnostic`.
    pub fn fix(rule: &dyn Rule, text: &str, diagnostic: &Diagnostic) -> String {
        let descriptor = rule.descriptor();
        let params = descriptor.default_params();
        let parse = bsl_syntax::parse(text);
        let range = parse
            .tree()
            .line_index()
            .offset_range(diagnostic.range)
            .unwrap();
        let ctx = FixContext::new(&parse, range, &params);
        let fixes = rule.fix(diagnostic, &ctx).unwrap();
        fixes[0].apply(text).unwrap()
    }

    /// Source text under each diagnostic.
    pub fn texts<'a>(text: &'a str, diagnostics: &[Diagnostic]) -> Vec<&'a str> {
        let index = bsl_syntax::LineIndex::new(text);
        diagnostics
            .iter()
            .map(|d| {
                let range = index.offset_range(d.range).unwrap();
                &text[range.start..range.end]
            })
            .collect()
    }
}
