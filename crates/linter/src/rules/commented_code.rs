use std::collections::HashSet;

use bsl_syntax::{tokenize, Keyword, Token, TokenKind};
use bsl_types::{DiagnosticSeverity, OffsetRange};

use crate::descriptor::{ParameterSpec, RuleDescriptor, RuleKind};
use crate::diagnostics::Diagnostic;
use crate::traits::{Rule, RuleContext, RuleError};

const DEFAULT_THRESHOLD: f64 = 0.9;

const BLOCK_ENDS: &[Keyword] = &[
    Keyword::EndIf,
    Keyword::EndDo,
    Keyword::EndProcedure,
    Keyword::EndFunction,
    Keyword::EndTry,
];

const STATEMENT_KEYWORDS: &[Keyword] = &[
    Keyword::Return,
    Keyword::Else,
    Keyword::Try,
    Keyword::Except,
    Keyword::Var,
    Keyword::New,
    Keyword::Raise,
    Keyword::Break,
    Keyword::Continue,
];

/// Something a line of code tends to have and prose tends not to.
#[derive(Debug, Clone, Copy)]
enum Evidence {
    /// Ends with `;`
    Terminator,
    BlockEnd,
    /// `Если ... Тогда`, `Пока ... Цикл`, `Для ... Цикл`
    Header,
    /// `А = ...`, `А.Б = ...`
    Assignment,
    /// `Имя(` with nothing between the name and the parenthesis
    Call,
    StatementKeyword,
    /// `ИмяВСмешанномРегистре`
    CamelCase,
}

/// How strongly one occurrence of each kind of evidence points at code.
const FOOTPRINT: &[(Evidence, f64)] = &[
    (Evidence::Terminator, 0.95),
    (Evidence::BlockEnd, 0.95),
    (Evidence::Header, 0.95),
    (Evidence::Assignment, 0.7),
    (Evidence::Call, 0.7),
    (Evidence::StatementKeyword, 0.3),
    (Evidence::CamelCase, 0.3),
];

fn is_camel_case(word: &str) -> bool {
    word.chars()
        .zip(word.chars().skip(1))
        .any(|(a, b)| a.is_lowercase() && b.is_uppercase())
}

/// The text of one comment without its `//` markers, tokenized.
struct CommentLine<'a> {
    text: &'a str,
    /// Significant tokens only
    tokens: Vec<Token>,
}

impl<'a> CommentLine<'a> {
    fn new(comment: &'a str) -> Self {
        let mut text = comment;
        while let Some(rest) = text.strip_prefix("//") {
            text = rest;
        }
        let text = text.trim();
        let (tokens, _) = tokenize(text);
        Self {
            text,
            tokens: tokens.into_iter().filter(|t| !t.kind.is_trivia()).collect(),
        }
    }

    fn kinds(&self) -> impl Iterator<Item = TokenKind> + '_ {
        self.tokens.iter().map(|token| token.kind)
    }

    fn count(&self, evidence: Evidence) -> usize {
        match evidence {
            Evidence::Terminator => usize::from(self.text.ends_with(';')),
            Evidence::BlockEnd => self.keywords(BLOCK_ENDS),
            Evidence::Header => usize::from(self.is_header()),
            Evidence::Assignment => usize::from(self.is_assignment()),
            Evidence::Call => self
                .tokens
                .windows(2)
                .filter(|pair| {
                    pair[0].kind == TokenKind::Identifier
                        && pair[1].kind == TokenKind::LParen
                        && pair[0].range.end == pair[1].range.start
                })
                .count(),
            Evidence::StatementKeyword => self.keywords(STATEMENT_KEYWORDS),
            Evidence::CamelCase => self
                .tokens
                .iter()
                .filter(|token| token.kind == TokenKind::Identifier)
                .filter(|token| is_camel_case(token.text(self.text)))
                .count(),
        }
    }

    fn keywords(&self, set: &[Keyword]) -> usize {
        self.kinds()
            .filter(|kind| matches!(kind, TokenKind::Keyword(kw) if set.contains(kw)))
            .count()
    }

    fn is_header(&self) -> bool {
        let [first, .., last] = self.tokens.as_slice() else {
            return false;
        };
        match first.kind {
            TokenKind::Keyword(Keyword::If | Keyword::ElsIf) => last.is_keyword(Keyword::Then),
            TokenKind::Keyword(Keyword::While | Keyword::For) => last.is_keyword(Keyword::Do),
            _ => false,
        }
    }

    fn is_assignment(&self) -> bool {
        let mut kinds = self.kinds();
        if kinds.next() != Some(TokenKind::Identifier) {
            return false;
        }
        loop {
            match kinds.next() {
                Some(TokenKind::Dot) if kinds.next() == Some(TokenKind::Identifier) => {}
                Some(TokenKind::Eq) => return kinds.next().is_some(),
                _ => return false,
            }
        }
    }

    /// Each occurrence of evidence independently makes the line code with
    /// its weight.
    fn probability(&self) -> f64 {
        let prose: f64 = FOOTPRINT
            .iter()
            .map(|&(evidence, weight)| {
                let count = i32::try_from(self.count(evidence)).unwrap_or(i32::MAX);
                (1.0 - weight).powi(count)
            })
            .product();
        1.0 - prose
    }

    /// Two identifiers in a row read as words, not code.
    fn has_adjacent_identifiers(&self) -> bool {
        self.tokens.windows(2).any(|pair| {
            pair[0].kind == TokenKind::Identifier && pair[1].kind == TokenKind::Identifier
        })
    }

    fn is_code(&self, threshold: f64) -> bool {
        self.probability() > threshold && !self.has_adjacent_identifiers()
    }
}

/// Comments on consecutive lines with only whitespace between them, as
/// token indices.
fn comment_blocks(ctx: &RuleContext<'_>) -> Vec<Vec<usize>> {
    let tokens = ctx.tokens();
    let index = ctx.tree().line_index();
    let mut blocks: Vec<Vec<usize>> = Vec::new();
    let mut previous: Option<(usize, u32)> = None;

    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Comment {
            continue;
        }
        let line = index.position(token.range.start).line;
        let adjacent = previous.is_some_and(|(prev, prev_line)| {
            prev_line + 1 == line && tokens[prev + 1..i].iter().all(|t| t.kind.is_whitespace())
        });
        match blocks.last_mut() {
            Some(block) if adjacent => block.push(i),
            _ => blocks.push(vec![i]),
        }
        previous = Some((i, line));
    }
    blocks
}

/// A block that ends on the line right above a method describes it.
fn describes_method(tokens: &[Token], last: usize, method_starts: &HashSet<usize>) -> bool {
    let mut newlines = 0;
    for (i, token) in tokens.iter().enumerate().skip(last + 1) {
        match token.kind {
            TokenKind::Newline => newlines += 1,
            TokenKind::Whitespace => {}
            _ => return newlines == 1 && method_starts.contains(&i),
        }
    }
    false
}

/// Flags blocks of comments that contain commented-out code.
///
/// Adjacent comment lines form one block, reported once over its whole
/// range. Method descriptions are never reported.
pub struct CommentedCodeRuleImpl;

impl Rule for CommentedCodeRuleImpl {
    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor::new(
            "CommentedCode",
            "Commented-out code",
            DiagnosticSeverity::Warning,
        )
        .kind(RuleKind::CodeSmell)
        .tags(&["standard", "badpractice"])
        .minutes_to_fix(1)
        .param(
            ParameterSpec::float("threshold", DEFAULT_THRESHOLD)
                .describe("How sure the rule must be that a comment line is code"),
        )
        .always_applicable()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        let threshold = ctx.params().float("threshold").unwrap_or(DEFAULT_THRESHOLD);
        let tokens = ctx.tokens();
        let text = ctx.text();
        let method_starts: HashSet<usize> = ctx
            .tree()
            .methods()
            .map(|method| method.token_indices().start)
            .collect();

        Ok(comment_blocks(ctx)
            .into_iter()
            .filter_map(|block| {
                let first = tokens.get(*block.first()?)?;
                let last_index = *block.last()?;
                let last = tokens.get(last_index)?;
                if describes_method(tokens, last_index, &method_starts) {
                    return None;
                }
                block
                    .iter()
                    .any(|&i| CommentLine::new(tokens[i].text(text)).is_code(threshold))
                    .then(|| {
                        ctx.diagnostic(
                            OffsetRange::new(first.range.start, last.range.end),
                            "Remove commented-out code",
                        )
                    })
            })
            .collect())
    }
}
