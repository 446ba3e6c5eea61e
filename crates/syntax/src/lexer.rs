//! Lossless tokenizer for BSL source text.
//!
//! Every byte of the input belongs to exactly one token, so the token stream
//! can be used both by the parser (which skips trivia) and by rules that
//! inspect whitespace and comments.

use bsl_types::OffsetRange;

use crate::SyntaxError;

/// Reserved words. Matching is case-insensitive in both the English and the
/// Russian spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Procedure,
    EndProcedure,
    Function,
    EndFunction,
    Var,
    Export,
    Val,
    If,
    Then,
    ElsIf,
    Else,
    EndIf,
    For,
    Each,
    In,
    To,
    Do,
    EndDo,
    While,
    Break,
    Continue,
    Return,
    Try,
    Except,
    EndTry,
    Raise,
    New,
    And,
    Or,
    Not,
    True,
    False,
    Undefined,
    Null,
}

const KEYWORDS: &[(&str, &str, Keyword)] = &[
    ("procedure", "процедура", Keyword::Procedure),
    ("endprocedure", "конецпроцедуры", Keyword::EndProcedure),
    ("function", "функция", Keyword::Function),
    ("endfunction", "конецфункции", Keyword::EndFunction),
    ("var", "перем", Keyword::Var),
    ("export", "экспорт", Keyword::Export),
    ("val", "знач", Keyword::Val),
    ("if", "если", Keyword::If),
    ("then", "тогда", Keyword::Then),
    ("elsif", "иначеесли", Keyword::ElsIf),
    ("else", "иначе", Keyword::Else),
    ("endif", "конецесли", Keyword::EndIf),
    ("for", "для", Keyword::For),
    ("each", "каждого", Keyword::Each),
    ("in", "из", Keyword::In),
    ("to", "по", Keyword::To),
    ("do", "цикл", Keyword::Do),
    ("enddo", "конеццикла", Keyword::EndDo),
    ("while", "пока", Keyword::While),
    ("break", "прервать", Keyword::Break),
    ("continue", "продолжить", Keyword::Continue),
    ("return", "возврат", Keyword::Return),
    ("try", "попытка", Keyword::Try),
    ("except", "исключение", Keyword::Except),
    ("endtry", "конецпопытки", Keyword::EndTry),
    ("raise", "вызватьисключение", Keyword::Raise),
    ("new", "новый", Keyword::New),
    ("and", "и", Keyword::And),
    ("or", "или", Keyword::Or),
    ("not", "не", Keyword::Not),
    ("true", "истина", Keyword::True),
    ("false", "ложь", Keyword::False),
    ("undefined", "неопределено", Keyword::Undefined),
    ("null", "null", Keyword::Null),
];

impl Keyword {
    /// Look up an identifier in the keyword table.
    #[must_use]
    pub fn from_ident(ident: &str) -> Option<Self> {
        let lower = ident.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(en, ru, _)| *en == lower || *ru == lower)
            .map(|(_, _, kw)| *kw)
    }

    /// English spelling, used in syntax error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Procedure => "Procedure",
            Self::EndProcedure => "EndProcedure",
            Self::Function => "Function",
            Self::EndFunction => "EndFunction",
            Self::Var => "Var",
            Self::Export => "Export",
            Self::Val => "Val",
            Self::If => "If",
            Self::Then => "Then",
            Self::ElsIf => "ElsIf",
            Self::Else => "Else",
            Self::EndIf => "EndIf",
            Self::For => "For",
            Self::Each => "Each",
            Self::In => "In",
            Self::To => "To",
            Self::Do => "Do",
            Self::EndDo => "EndDo",
            Self::While => "While",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::Return => "Return",
            Self::Try => "Try",
            Self::Except => "Except",
            Self::EndTry => "EndTry",
            Self::Raise => "Raise",
            Self::New => "New",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::True => "True",
            Self::False => "False",
            Self::Undefined => "Undefined",
            Self::Null => "Null",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Newline,
    /// `// ...` up to the end of the line
    Comment,
    /// `#Region`, `#If Server Then` and friends, up to the end of the line
    Preprocessor,
    /// `&AtServer`
    Annotation,
    Identifier,
    Keyword(Keyword),
    Number,
    String,
    /// `'20240101'`
    Date,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    Colon,
    Question,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Unknown,
}

impl TokenKind {
    /// Trivia is skipped by the parser.
    #[must_use]
    pub const fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::Newline | Self::Comment)
    }

    #[must_use]
    pub const fn is_whitespace(self) -> bool {
        matches!(self, Self::Whitespace | Self::Newline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: OffsetRange,
}

impl Token {
    /// The source text of this token.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.range.start..self.range.end).unwrap_or("")
    }

    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<SyntaxError>,
}

/// Tokenize `text`. Never fails; malformed input yields `Unknown` tokens and
/// syntax errors.
#[must_use]
pub fn tokenize(text: &str) -> (Vec<Token>, Vec<SyntaxError>) {
    let mut lexer = Lexer {
        text,
        pos: 0,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.errors)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.text[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            range: OffsetRange::new(start, self.pos),
        });
    }

    fn previous_significant(&self) -> Option<TokenKind> {
        self.tokens
            .iter()
            .rev()
            .map(|t| t.kind)
            .find(|kind| !kind.is_trivia())
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            let kind = match c {
                '\n' => {
                    self.bump();
                    TokenKind::Newline
                }
                c if c.is_whitespace() => {
                    self.eat_while(|c| c.is_whitespace() && c != '\n');
                    TokenKind::Whitespace
                }
                '/' if self.peek_second() == Some('/') => {
                    self.eat_while(|c| c != '\n');
                    TokenKind::Comment
                }
                '#' => {
                    self.eat_while(|c| c != '\n');
                    TokenKind::Preprocessor
                }
                '&' => {
                    self.bump();
                    self.eat_while(is_ident_continue);
                    TokenKind::Annotation
                }
                '"' => self.string(),
                '\'' => self.date(),
                c if c.is_ascii_digit() => {
                    self.eat_while(|c| c.is_ascii_digit());
                    if self.peek() == Some('.')
                        && self.peek_second().is_some_and(|c| c.is_ascii_digit())
                    {
                        self.bump();
                        self.eat_while(|c| c.is_ascii_digit());
                    }
                    TokenKind::Number
                }
                c if is_ident_start(c) => {
                    self.eat_while(is_ident_continue);
                    let ident = &self.text[start..self.pos];
                    // after a dot every word is a member name
                    match Keyword::from_ident(ident) {
                        Some(kw) if self.previous_significant() != Some(TokenKind::Dot) => {
                            TokenKind::Keyword(kw)
                        }
                        _ => TokenKind::Identifier,
                    }
                }
                _ => self.punctuation(),
            };
            self.push(kind, start);
        }
    }

    fn string(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                Some('"') => {
                    if self.peek() == Some('"') {
                        self.bump();
                    } else {
                        return TokenKind::String;
                    }
                }
                Some('\n') => {
                    // multi-line literal: the next line must start with `|`
                    let rest = &self.text[self.pos..];
                    let trimmed =
                        rest.trim_start_matches(|c: char| c.is_whitespace() && c != '\n');
                    if trimmed.starts_with('|') {
                        self.pos += rest.len() - trimmed.len() + 1;
                    } else {
                        // leave the newline out of the token
                        self.pos -= 1;
                        self.unterminated(start, "Unterminated string literal");
                        return TokenKind::String;
                    }
                }
                Some(_) => {}
                None => {
                    self.unterminated(start, "Unterminated string literal");
                    return TokenKind::String;
                }
            }
        }
    }

    fn date(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump();
        self.eat_while(|c| c != '\'' && c != '\n');
        if self.peek() == Some('\'') {
            self.bump();
        } else {
            self.unterminated(start, "Unterminated date literal");
        }
        TokenKind::Date
    }

    fn unterminated(&mut self, start: usize, message: &str) {
        self.errors.push(SyntaxError::new(
            message,
            OffsetRange::new(start, self.pos),
        ));
    }

    fn punctuation(&mut self) -> TokenKind {
        let start = self.pos;
        let Some(c) = self.bump() else {
            return TokenKind::Unknown;
        };
        match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '~' => TokenKind::Tilde,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Eq,
            '<' => match self.peek() {
                Some('>') => {
                    self.bump();
                    TokenKind::NotEq
                }
                Some('=') => {
                    self.bump();
                    TokenKind::LessEq
                }
                _ => TokenKind::Less,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            _ => {
                self.errors.push(SyntaxError::new(
                    format!("Unexpected character '{c}'"),
                    OffsetRange::new(start, self.pos),
                ));
                TokenKind::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text)
            .0
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn test_tokens_cover_input_losslessly() {
        let text = "Процедура Тест() // комментарий\n\tА = \"x\";\nКонецПроцедуры";
        let (tokens, errors) = tokenize(text);
        assert!(errors.is_empty());
        let rebuilt: String = tokens.iter().map(|t| t.text(text)).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_keywords_are_bilingual_and_case_insensitive() {
        assert_eq!(
            kinds("ЕСЛИ if Тогда THEN"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Then),
                TokenKind::Keyword(Keyword::Then),
            ]
        );
    }

    #[test]
    fn test_keyword_after_dot_is_identifier() {
        assert_eq!(
            kinds("Запрос.Новый"),
            vec![TokenKind::Identifier, TokenKind::Dot, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a<>b<=c>=d<e"),
            vec![
                TokenKind::Identifier,
                TokenKind::NotEq,
                TokenKind::Identifier,
                TokenKind::LessEq,
                TokenKind::Identifier,
                TokenKind::GreaterEq,
                TokenKind::Identifier,
                TokenKind::Less,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_string_with_escaped_quote() {
        let text = r#"А = "say ""hi""";"#;
        let (tokens, errors) = tokenize(text);
        assert!(errors.is_empty());
        let string = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(string.text(text), r#""say ""hi""""#);
    }

    #[test]
    fn test_multiline_string_continuation() {
        let text = "А = \"первая\n\t|вторая\";";
        let (tokens, errors) = tokenize(text);
        assert!(errors.is_empty());
        let string = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(string.text(text), "\"первая\n\t|вторая\"");
    }

    #[test]
    fn test_unterminated_string_stops_at_line_end() {
        let text = "А = \"открыта\nБ = 1;";
        let (tokens, errors) = tokenize(text);
        assert_eq!(errors.len(), 1);
        let string = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(string.text(text), "\"открыта");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Number));
    }

    #[test]
    fn test_comment_preprocessor_annotation() {
        let text = "#Область Тест\n&НаКлиенте\n// TODO: later";
        let (tokens, _) = tokenize(text);
        let significant: Vec<_> = tokens
            .iter()
            .filter(|t| !t.kind.is_whitespace())
            .map(|t| (t.kind, t.text(text)))
            .collect();
        assert_eq!(
            significant,
            vec![
                (TokenKind::Preprocessor, "#Область Тест"),
                (TokenKind::Annotation, "&НаКлиенте"),
                (TokenKind::Comment, "// TODO: later"),
            ]
        );
    }

    #[test]
    fn test_numbers_and_dates() {
        assert_eq!(
            kinds("1.5 + '20240101'"),
            vec![TokenKind::Number, TokenKind::Plus, TokenKind::Date]
        );
    }

    #[test]
    fn test_unknown_character_is_reported() {
        let (tokens, errors) = tokenize("a $ b");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Unknown));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unexpected character '$'");
    }
}
