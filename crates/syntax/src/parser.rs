//! Recursive descent parser with error recovery.
//!
//! The parser walks the significant (non-trivia) tokens and never gives up:
//! on unexpected input it records a [`SyntaxError`], wraps the offending
//! tokens in an `Error` node and resynchronises at the next `;` or block
//! keyword, so every input produces a tree.

use std::sync::Arc;

use bsl_types::OffsetRange;

use crate::lexer::{Keyword, Token, TokenKind};
use crate::tree::{NodeData, NodeId, NodeKind, SyntaxTree};
use crate::SyntaxError;

/// Keywords that close a block.
const BLOCK_END: &[Keyword] = &[
    Keyword::EndProcedure,
    Keyword::EndFunction,
    Keyword::EndIf,
    Keyword::ElsIf,
    Keyword::Else,
    Keyword::EndDo,
    Keyword::Except,
    Keyword::EndTry,
];

/// Keywords that can only start a statement.
const STATEMENT_START: &[Keyword] = &[
    Keyword::If,
    Keyword::While,
    Keyword::For,
    Keyword::Try,
    Keyword::Return,
    Keyword::Raise,
    Keyword::Var,
    Keyword::Break,
    Keyword::Continue,
    Keyword::Procedure,
    Keyword::Function,
];

fn is_statement_boundary(kind: TokenKind) -> bool {
    match kind {
        TokenKind::Semicolon | TokenKind::Annotation | TokenKind::Preprocessor => true,
        TokenKind::Keyword(kw) => BLOCK_END.contains(&kw) || STATEMENT_START.contains(&kw),
        _ => false,
    }
}

pub(crate) struct Parser<'t> {
    text: &'t str,
    tokens: &'t [Token],
    /// Indices of significant tokens
    sig: Vec<usize>,
    pos: usize,
    nodes: Vec<NodeData>,
    errors: Vec<SyntaxError>,
}

pub(crate) fn parse_module(
    text: Arc<str>,
    tokens: Arc<[Token]>,
) -> (SyntaxTree, Vec<SyntaxError>) {
    let mut parser = Parser {
        text: &text,
        tokens: &tokens,
        sig: tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.kind.is_trivia())
            .map(|(i, _)| i)
            .collect(),
        pos: 0,
        nodes: Vec::new(),
        errors: Vec::new(),
    };
    parser.module();
    let Parser { nodes, errors, .. } = parser;
    (SyntaxTree::new(text, tokens, nodes), errors)
}

impl Parser<'_> {
    // ---- cursor ----

    fn kind_at(&self, pos: usize) -> Option<TokenKind> {
        self.sig.get(pos).map(|&i| self.tokens[i].kind)
    }

    fn current_kind(&self) -> Option<TokenKind> {
        self.kind_at(self.pos)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.at(TokenKind::Keyword(keyword))
    }

    fn at_block_end(&self) -> bool {
        matches!(self.current_kind(), Some(TokenKind::Keyword(kw)) if BLOCK_END.contains(&kw))
    }

    /// Index of the current token in the full stream.
    fn tok_index(&self) -> usize {
        self.sig.get(self.pos).copied().unwrap_or(self.tokens.len())
    }

    /// One past the last consumed token in the full stream.
    fn consumed_end(&self) -> usize {
        match self.pos {
            0 => 0,
            pos => self.sig[pos - 1] + 1,
        }
    }

    /// Consume the current token and return its stream index.
    fn bump(&mut self) -> usize {
        let index = self.tok_index();
        if self.pos < self.sig.len() {
            self.pos += 1;
        }
        index
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenKind::Keyword(keyword))
    }

    // ---- diagnostics ----

    fn current_range(&self) -> OffsetRange {
        self.sig
            .get(self.pos)
            .map_or(OffsetRange::at(self.text.len()), |&i| self.tokens[i].range)
    }

    fn error(&mut self, message: impl Into<String>, range: OffsetRange) {
        self.errors.push(SyntaxError::new(message, range));
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let range = self.current_range();
        self.error(message, range);
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error_here(format!("Expected {what}"));
        false
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> bool {
        self.expect(TokenKind::Keyword(keyword), keyword.name())
    }

    /// Optional `;` after a statement.
    fn end_statement(&mut self) {
        if self.eat(TokenKind::Semicolon) || self.current_kind().is_none() || self.at_block_end() {
            return;
        }
        self.error_here("Expected ';'");
    }

    // ---- tree building ----

    fn alloc(&mut self, kind: NodeKind, first: usize, children: Vec<NodeId>) -> NodeId {
        let end = self.consumed_end().max(first);
        let range = if end > first {
            OffsetRange::new(self.tokens[first].range.start, self.tokens[end - 1].range.end)
        } else {
            OffsetRange::at(
                self.tokens
                    .get(first)
                    .map_or(self.text.len(), |t| t.range.start),
            )
        };
        let id = NodeId::new(self.nodes.len());
        for child in &children {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(NodeData {
            kind,
            tokens: first..end,
            range,
            parent: None,
            children,
            name: None,
            exported: false,
        });
        id
    }

    fn set_name(&mut self, id: NodeId, name: Option<usize>, exported: bool) {
        let node = &mut self.nodes[id.index()];
        node.name = name;
        node.exported = exported;
    }

    /// Find where an expression or statement starting at the cursor ends:
    /// the first position at nesting depth zero where `stop` holds.
    fn scan(&self, limit: usize, stop: impl Fn(TokenKind) -> bool) -> usize {
        let mut depth = 0usize;
        let mut pos = self.pos;
        while pos < limit {
            let Some(kind) = self.kind_at(pos) else { break };
            if depth == 0 && stop(kind) {
                break;
            }
            match kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            pos += 1;
        }
        pos
    }

    /// Consume tokens up to `end` as one flat expression.
    fn expression_to(&mut self, end: usize) -> Option<NodeId> {
        if self.pos >= end {
            return None;
        }
        let first = self.tok_index();
        let mut strings = Vec::new();
        while self.pos < end {
            if self.at(TokenKind::String) {
                let index = self.bump();
                strings.push(self.alloc(NodeKind::StringLiteral, index, Vec::new()));
            } else {
                self.bump();
            }
        }
        Some(self.alloc(NodeKind::Expression, first, strings))
    }

    fn expression(&mut self, stop: impl Fn(TokenKind) -> bool) -> Option<NodeId> {
        let end = self.scan(self.sig.len(), |kind| stop(kind) || is_statement_boundary(kind));
        let expr = self.expression_to(end);
        if expr.is_none() {
            self.error_here("Expected expression");
        }
        expr
    }

    // ---- grammar ----

    fn module(&mut self) {
        let mut items = Vec::new();
        while let Some(kind) = self.current_kind() {
            match kind {
                TokenKind::Semicolon => {
                    self.bump();
                }
                TokenKind::Annotation
                | TokenKind::Keyword(Keyword::Procedure | Keyword::Function) => {
                    items.push(self.method());
                }
                TokenKind::Keyword(kw) if BLOCK_END.contains(&kw) => {
                    items.push(self.unexpected(kw));
                }
                _ => items.push(self.statement()),
            }
        }

        let id = NodeId::new(self.nodes.len());
        for child in &items {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(NodeData {
            kind: NodeKind::Module,
            tokens: 0..self.tokens.len(),
            range: OffsetRange::new(0, self.text.len()),
            parent: None,
            children: items,
            name: None,
            exported: false,
        });
    }

    fn unexpected(&mut self, keyword: Keyword) -> NodeId {
        self.error_here(format!("Unexpected {}", keyword.name()));
        let first = self.bump();
        self.eat(TokenKind::Semicolon);
        self.alloc(NodeKind::Error, first, Vec::new())
    }

    fn block(&mut self, terminators: &[Keyword]) -> Vec<NodeId> {
        let mut statements = Vec::new();
        while let Some(kind) = self.current_kind() {
            match kind {
                TokenKind::Semicolon => {
                    self.bump();
                }
                // missing end of the enclosing method
                TokenKind::Annotation
                | TokenKind::Keyword(
                    Keyword::Procedure
                    | Keyword::Function
                    | Keyword::EndProcedure
                    | Keyword::EndFunction,
                ) => break,
                TokenKind::Keyword(kw) if terminators.contains(&kw) => break,
                TokenKind::Keyword(kw) if BLOCK_END.contains(&kw) => {
                    statements.push(self.unexpected(kw));
                }
                _ => statements.push(self.statement()),
            }
        }
        statements
    }

    fn method(&mut self) -> NodeId {
        let first = self.tok_index();
        let mut children = Vec::new();
        while self.at(TokenKind::Annotation) {
            children.push(self.annotation());
        }

        let is_function = self.at_keyword(Keyword::Function);
        if !is_function && !self.at_keyword(Keyword::Procedure) {
            self.error_here("Expected Procedure or Function after annotation");
            return self.alloc(NodeKind::Error, first, children);
        }
        self.bump();

        let name = if self.at(TokenKind::Identifier) {
            Some(self.bump())
        } else {
            self.error_here("Expected method name");
            None
        };
        if let Some(params) = self.param_list() {
            children.push(params);
        }
        let exported = self.eat_keyword(Keyword::Export);

        children.extend(self.block(&[Keyword::EndProcedure, Keyword::EndFunction]));

        let (expected, other) = if is_function {
            (Keyword::EndFunction, Keyword::EndProcedure)
        } else {
            (Keyword::EndProcedure, Keyword::EndFunction)
        };
        if !self.eat_keyword(expected) {
            self.error_here(format!("Expected {}", expected.name()));
            self.eat_keyword(other);
        }
        self.eat(TokenKind::Semicolon);

        let kind = if is_function {
            NodeKind::Function
        } else {
            NodeKind::Procedure
        };
        let id = self.alloc(kind, first, children);
        self.set_name(id, name, exported);
        id
    }

    fn annotation(&mut self) -> NodeId {
        let first = self.bump();
        if self.at(TokenKind::LParen) {
            self.bump();
            let end = self.scan(self.sig.len(), |kind| {
                kind == TokenKind::RParen || is_statement_boundary(kind)
            });
            self.pos = end;
            self.expect(TokenKind::RParen, "')'");
        }
        self.alloc(NodeKind::Annotation, first, Vec::new())
    }

    fn param_list(&mut self) -> Option<NodeId> {
        let first = self.tok_index();
        if !self.expect(TokenKind::LParen, "'('") {
            return None;
        }
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            match self.current_kind() {
                None | Some(TokenKind::Semicolon) => break,
                Some(TokenKind::Keyword(kw)) if kw != Keyword::Val => break,
                _ => {}
            }
            let param_first = self.tok_index();
            self.eat_keyword(Keyword::Val);
            let name = if self.at(TokenKind::Identifier) {
                Some(self.bump())
            } else {
                self.error_here("Expected parameter name");
                None
            };
            if self.eat(TokenKind::Eq) {
                let end = self.scan(self.sig.len(), |kind| {
                    matches!(
                        kind,
                        TokenKind::Comma | TokenKind::RParen | TokenKind::Semicolon
                    )
                });
                self.pos = end;
            }
            if name.is_none() && !self.at(TokenKind::Comma) && !self.at(TokenKind::RParen) {
                self.bump();
            }
            let param = self.alloc(NodeKind::Param, param_first, Vec::new());
            self.set_name(param, name, false);
            params.push(param);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'");
        Some(self.alloc(NodeKind::ParamList, first, params))
    }

    fn var_declaration(&mut self) -> NodeId {
        let first = self.bump();
        let mut variables = Vec::new();
        loop {
            if !self.at(TokenKind::Identifier) {
                self.error_here("Expected variable name");
                break;
            }
            let name = self.bump();
            let exported = self.eat_keyword(Keyword::Export);
            let variable = self.alloc(NodeKind::Variable, name, Vec::new());
            self.set_name(variable, Some(name), exported);
            variables.push(variable);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.end_statement();
        self.alloc(NodeKind::VarDeclaration, first, variables)
    }

    fn statement(&mut self) -> NodeId {
        match self.current_kind() {
            Some(TokenKind::Preprocessor) => {
                let first = self.bump();
                self.alloc(NodeKind::Preprocessor, first, Vec::new())
            }
            Some(TokenKind::Tilde) => self.label(),
            Some(TokenKind::Keyword(Keyword::Var)) => self.var_declaration(),
            Some(TokenKind::Keyword(Keyword::If)) => self.if_statement(),
            Some(TokenKind::Keyword(Keyword::While)) => self.while_statement(),
            Some(TokenKind::Keyword(Keyword::For)) => self.for_statement(),
            Some(TokenKind::Keyword(Keyword::Try)) => self.try_statement(),
            Some(TokenKind::Keyword(Keyword::Return)) => {
                self.jump_statement(NodeKind::ReturnStatement, true)
            }
            Some(TokenKind::Keyword(Keyword::Raise)) => {
                self.jump_statement(NodeKind::RaiseStatement, true)
            }
            Some(TokenKind::Keyword(Keyword::Break)) => {
                self.jump_statement(NodeKind::BreakStatement, false)
            }
            Some(TokenKind::Keyword(Keyword::Continue)) => {
                self.jump_statement(NodeKind::ContinueStatement, false)
            }
            _ => self.simple_statement(),
        }
    }

    fn label(&mut self) -> NodeId {
        let first = self.bump();
        self.expect(TokenKind::Identifier, "label name");
        self.expect(TokenKind::Colon, "':'");
        self.alloc(NodeKind::LabelStatement, first, Vec::new())
    }

    fn jump_statement(&mut self, kind: NodeKind, with_value: bool) -> NodeId {
        let first = self.bump();
        let mut children = Vec::new();
        if with_value {
            let end = self.scan(self.sig.len(), is_statement_boundary);
            children.extend(self.expression_to(end));
        }
        self.end_statement();
        self.alloc(kind, first, children)
    }

    fn condition(&mut self, keyword: Keyword) -> Option<NodeId> {
        let expr = self.expression(|kind| kind == TokenKind::Keyword(keyword));
        self.expect_keyword(keyword);
        expr
    }

    fn if_statement(&mut self) -> NodeId {
        const BRANCH_END: &[Keyword] = &[Keyword::ElsIf, Keyword::Else, Keyword::EndIf];

        let first = self.bump();
        let mut children = Vec::new();
        children.extend(self.condition(Keyword::Then));
        children.extend(self.block(BRANCH_END));
        while self.eat_keyword(Keyword::ElsIf) {
            children.extend(self.condition(Keyword::Then));
            children.extend(self.block(BRANCH_END));
        }
        if self.eat_keyword(Keyword::Else) {
            children.extend(self.block(&[Keyword::EndIf]));
        }
        self.expect_keyword(Keyword::EndIf);
        self.end_statement();
        self.alloc(NodeKind::IfStatement, first, children)
    }

    fn loop_body(&mut self, children: &mut Vec<NodeId>) {
        children.extend(self.block(&[Keyword::EndDo]));
        self.expect_keyword(Keyword::EndDo);
        self.end_statement();
    }

    fn while_statement(&mut self) -> NodeId {
        let first = self.bump();
        let mut children = Vec::new();
        children.extend(self.condition(Keyword::Do));
        self.loop_body(&mut children);
        self.alloc(NodeKind::WhileStatement, first, children)
    }

    fn for_statement(&mut self) -> NodeId {
        let first = self.bump();
        let mut children = Vec::new();
        let kind = if self.eat_keyword(Keyword::Each) {
            self.expect(TokenKind::Identifier, "loop variable");
            self.expect_keyword(Keyword::In);
            children.extend(self.condition(Keyword::Do));
            NodeKind::ForEachStatement
        } else {
            self.expect(TokenKind::Identifier, "loop variable");
            self.expect(TokenKind::Eq, "'='");
            children.extend(self.condition(Keyword::To));
            children.extend(self.condition(Keyword::Do));
            NodeKind::ForStatement
        };
        self.loop_body(&mut children);
        self.alloc(kind, first, children)
    }

    fn try_statement(&mut self) -> NodeId {
        let first = self.bump();
        let mut children = self.block(&[Keyword::Except]);
        self.expect_keyword(Keyword::Except);
        children.extend(self.block(&[Keyword::EndTry]));
        self.expect_keyword(Keyword::EndTry);
        self.end_statement();
        self.alloc(NodeKind::TryStatement, first, children)
    }

    /// Assignment or procedure call.
    fn simple_statement(&mut self) -> NodeId {
        let first = self.tok_index();
        let end = self.scan(self.sig.len(), is_statement_boundary);
        if end == self.pos {
            self.error_here("Unexpected token");
            let first = self.bump();
            return self.alloc(NodeKind::Error, first, Vec::new());
        }

        let eq = self.scan(end, |kind| kind == TokenKind::Eq);
        if eq < end {
            if eq == self.pos {
                self.error_here("Expected assignment target");
            }
            self.pos = eq + 1;
            let value = self.expression_to(end);
            if value.is_none() {
                self.error_here("Expected expression");
            }
            self.end_statement();
            return self.alloc(NodeKind::Assignment, first, value.into_iter().collect());
        }

        if self.kind_at(end - 1) == Some(TokenKind::RParen) {
            let arguments = self.call_arguments(end);
            self.end_statement();
            return self.alloc(NodeKind::CallStatement, first, arguments);
        }

        let range = OffsetRange::new(
            self.tokens[first].range.start,
            self.tokens[self.sig[end - 1]].range.end,
        );
        self.error("Expected assignment or procedure call", range);
        self.pos = end;
        self.end_statement();
        self.alloc(NodeKind::Error, first, Vec::new())
    }

    /// Walk a call chain up to `end`, producing one expression per argument.
    fn call_arguments(&mut self, end: usize) -> Vec<NodeId> {
        let mut arguments = Vec::new();
        while self.pos < end {
            if !self.eat(TokenKind::LParen) {
                self.bump();
                continue;
            }
            loop {
                let arg_end = self.scan(end, |kind| {
                    matches!(kind, TokenKind::Comma | TokenKind::RParen)
                });
                arguments.extend(self.expression_to(arg_end));
                if self.pos < end && self.eat(TokenKind::Comma) {
                    continue;
                }
                break;
            }
            if self.pos < end {
                self.eat(TokenKind::RParen);
            }
        }
        arguments
    }
}
