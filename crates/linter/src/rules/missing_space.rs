use bsl_syntax::{Keyword, Token, TokenKind};
use bsl_types::{CodeFix, DiagnosticSeverity, TextEdit};
use serde_json::json;

use crate::descriptor::{ParameterSpec, RuleDescriptor};
use crate::diagnostics::Diagnostic;
use crate::traits::{FixContext, Rule, RuleContext, RuleError};

const DEFAULT_LIST_FOR_CHECK_LEFT: &str = "";
const DEFAULT_LIST_FOR_CHECK_RIGHT: &str = ", ;";
const DEFAULT_LIST_FOR_CHECK_LEFT_AND_RIGHT: &str = "+ - * / = % < > <> <= >=";

/// Tokens after which a `+` or `-` is unary.
const UNARY_CONTEXT: &[&str] = &[
    "+", "-", "*", "/", "=", "%", "<", ">", "(", "[", ",", "<>", "<=", ">=",
];

/// Requires whitespace around operators and after separators.
///
/// Each parameter is a space separated list of token texts. Unary `+` and
/// `-` are only checked on the right if `checkSpaceToRightOfUnary` is set.
pub struct MissingSpaceRuleImpl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Both,
}

impl Side {
    fn from_flags(left: bool, right: bool) -> Option<Self> {
        match (left, right) {
            (true, true) => Some(Self::Both),
            (true, false) => Some(Self::Left),
            (false, true) => Some(Self::Right),
            (false, false) => None,
        }
    }

    fn message(self, token: &str) -> String {
        match self {
            Self::Left => format!("Missing space to the left of '{token}'"),
            Self::Right => format!("Missing space to the right of '{token}'"),
            Self::Both => format!("Missing spaces to the left and right of '{token}'"),
        }
    }
}

struct Checker<'a> {
    text: &'a str,
    tokens: &'a [Token],
    check_unary: bool,
    allow_multiple_commas: bool,
}

impl Checker<'_> {
    fn token_text(&self, index: usize) -> &str {
        self.tokens[index].text(self.text)
    }

    fn no_space_left(&self, index: usize) -> bool {
        index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .is_some_and(|prev| !prev.kind.is_whitespace())
    }

    fn no_space_right(&self, index: usize) -> bool {
        let token = &self.tokens[index];
        if matches!(token.kind, TokenKind::Plus | TokenKind::Minus)
            && !self.check_unary
            && self.is_unary(index)
        {
            return false;
        }
        let Some(next) = self.tokens.get(index + 1) else {
            return false;
        };
        if self.allow_multiple_commas
            && token.kind == TokenKind::Comma
            && next.kind == TokenKind::Comma
        {
            return false;
        }
        !next.kind.is_whitespace()
    }

    fn is_unary(&self, index: usize) -> bool {
        let previous = self.tokens[..index]
            .iter()
            .rposition(|token| !token.kind.is_whitespace());
        match previous {
            None => true,
            Some(i) => {
                let token = &self.tokens[i];
                token.is_keyword(Keyword::Return) || UNARY_CONTEXT.contains(&self.token_text(i))
            }
        }
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_lowercase).collect()
}

fn is_checkable(kind: TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::Whitespace
            | TokenKind::Newline
            | TokenKind::Comment
            | TokenKind::String
            | TokenKind::Date
            | TokenKind::Preprocessor
            | TokenKind::Annotation
    )
}

impl Rule for MissingSpaceRuleImpl {
    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor::new(
            "MissingSpace",
            "Missing spaces to the left or right of operators",
            DiagnosticSeverity::Information,
        )
        .tags(&["badpractice"])
        .fixable()
        .param(
            ParameterSpec::string("listForCheckLeft", DEFAULT_LIST_FOR_CHECK_LEFT)
                .describe("Tokens that need a space on the left"),
        )
        .param(
            ParameterSpec::string("listForCheckRight", DEFAULT_LIST_FOR_CHECK_RIGHT)
                .describe("Tokens that need a space on the right"),
        )
        .param(
            ParameterSpec::string(
                "listForCheckLeftAndRight",
                DEFAULT_LIST_FOR_CHECK_LEFT_AND_RIGHT,
            )
            .describe("Tokens that need spaces on both sides"),
        )
        .param(
            ParameterSpec::bool("checkSpaceToRightOfUnary", false)
                .describe("Check for a space to the right of unary + and -"),
        )
        .param(
            ParameterSpec::bool("allowMultipleCommas", false)
                .describe("Allow several commas in a row"),
        )
        .always_applicable()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        let params = ctx.params();
        let left = parse_list(params.string("listForCheckLeft").unwrap_or_default());
        let right = parse_list(params.string("listForCheckRight").unwrap_or_default());
        let both = parse_list(params.string("listForCheckLeftAndRight").unwrap_or_default());

        let checker = Checker {
            text: ctx.text(),
            tokens: ctx.tokens(),
            check_unary: params.bool("checkSpaceToRightOfUnary").unwrap_or(false),
            allow_multiple_commas: params.bool("allowMultipleCommas").unwrap_or(false),
        };

        let mut diagnostics = Vec::new();
        for (index, token) in checker.tokens.iter().enumerate() {
            if !is_checkable(token.kind) {
                continue;
            }
            let text = checker.token_text(index);
            let lower = text.to_lowercase();

            let mut missing = Vec::new();
            if left.contains(&lower) && checker.no_space_left(index) {
                missing.push(Side::Left);
            }
            if right.contains(&lower) && checker.no_space_right(index) {
                missing.push(Side::Right);
            }
            if both.contains(&lower) {
                missing.extend(Side::from_flags(
                    checker.no_space_left(index),
                    checker.no_space_right(index),
                ));
            }

            for side in missing {
                let payload = json!({
                    "left": side != Side::Right,
                    "right": side != Side::Left,
                });
                diagnostics.push(
                    ctx.diagnostic(token.range, side.message(text))
                        .with_payload(payload),
                );
            }
        }
        Ok(diagnostics)
    }

    fn fix(&self, diagnostic: &Diagnostic, ctx: &FixContext<'_>) -> Result<Vec<CodeFix>, RuleError> {
        let payload = diagnostic
            .payload
            .as_ref()
            .ok_or_else(|| RuleError::Payload("missing payload".to_string()))?;
        let flag = |name: &str| {
            payload
                .get(name)
                .and_then(serde_json::Value::as_bool)
                .ok_or_else(|| RuleError::Payload(format!("'{name}' must be a boolean")))
        };
        let (left, right) = (flag("left")?, flag("right")?);

        let range = ctx.range();
        let mut edits = Vec::new();
        if left {
            edits.push(TextEdit::insert(range.start, " "));
        }
        if right {
            edits.push(TextEdit::insert(range.end, " "));
        }
        if edits.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![CodeFix::new("Add missing spaces", edits)])
    }
}
