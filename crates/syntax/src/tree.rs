//! Immutable arena syntax tree.
//!
//! A [`SyntaxTree`] is built once per document version and never mutated.
//! It is shared via `Arc` between the document store and every in-flight
//! analysis task; the public API is read-only.

use std::sync::Arc;

use bsl_types::OffsetRange;

use crate::lexer::{Token, TokenKind};
use crate::LineIndex;

/// Kinds of syntax nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Module,
    Preprocessor,
    /// `Var A, B Export;`
    VarDeclaration,
    /// One name inside a `VarDeclaration`
    Variable,
    Procedure,
    Function,
    Annotation,
    ParamList,
    Param,
    Assignment,
    CallStatement,
    IfStatement,
    WhileStatement,
    ForStatement,
    ForEachStatement,
    TryStatement,
    ReturnStatement,
    RaiseStatement,
    BreakStatement,
    ContinueStatement,
    /// `~Label:`
    LabelStatement,
    Expression,
    StringLiteral,
    /// Tokens the parser could not make sense of
    Error,
}

impl NodeKind {
    const fn bit(self) -> u64 {
        1 << (self as u64)
    }

    #[must_use]
    pub const fn is_method(self) -> bool {
        matches!(self, Self::Procedure | Self::Function)
    }
}

/// Index of a node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    /// Token indices `[first, end)` into the full token stream
    pub(crate) tokens: std::ops::Range<usize>,
    pub(crate) range: OffsetRange,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Token index of the declared name, for methods, params and variables
    pub(crate) name: Option<usize>,
    pub(crate) exported: bool,
}

/// A parsed module.
#[derive(Debug)]
pub struct SyntaxTree {
    text: Arc<str>,
    tokens: Arc<[Token]>,
    nodes: Vec<NodeData>,
    kinds: u64,
    line_index: LineIndex,
}

impl SyntaxTree {
    pub(crate) fn new(text: Arc<str>, tokens: Arc<[Token]>, nodes: Vec<NodeData>) -> Self {
        let kinds = nodes.iter().fold(0, |acc, node| acc | node.kind.bit());
        let line_index = LineIndex::new(&text);
        Self {
            text,
            tokens,
            nodes,
            kinds,
            line_index,
        }
    }

    /// A tree holding nothing but an empty module spanning `text`.
    pub(crate) fn empty(text: Arc<str>) -> Self {
        let module = NodeData {
            kind: NodeKind::Module,
            tokens: 0..0,
            range: OffsetRange::new(0, text.len()),
            parent: None,
            children: Vec::new(),
            name: None,
            exported: false,
        };
        Self::new(text, Arc::from(Vec::new()), vec![module])
    }

    /// The root `Module` node.
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        // the parser always allocates the module last
        self.node(NodeId::new(self.nodes.len().saturating_sub(1)))
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node { tree: self, id }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The full, lossless token stream.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Returns `true` if at least one node of `kind` exists in the tree.
    #[must_use]
    pub fn contains(&self, kind: NodeKind) -> bool {
        self.kinds & kind.bit() != 0
    }

    /// All nodes in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        (0..self.nodes.len()).map(|i| self.node(NodeId::new(i)))
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = Node<'_>> + '_ {
        self.nodes().filter(move |node| node.kind() == kind)
    }

    /// Procedures and functions, in source order.
    pub fn methods(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.root().children().filter(|node| node.kind().is_method())
    }

    /// Text of the token at `index`.
    #[must_use]
    pub fn token_text(&self, index: usize) -> &str {
        self.tokens
            .get(index)
            .map_or("", |token| token.text(&self.text))
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// A borrowed handle to one node of a [`SyntaxTree`].
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    tree: &'a SyntaxTree,
    id: NodeId,
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl<'a> Node<'a> {
    #[must_use]
    pub fn id(self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn kind(self) -> NodeKind {
        self.tree.data(self.id).kind
    }

    #[must_use]
    pub fn range(self) -> OffsetRange {
        self.tree.data(self.id).range
    }

    #[must_use]
    pub fn text(self) -> &'a str {
        let range = self.range();
        self.tree.text.get(range.start..range.end).unwrap_or("")
    }

    /// Index range of this node's tokens in [`SyntaxTree::tokens`].
    #[must_use]
    pub fn token_indices(self) -> std::ops::Range<usize> {
        self.tree.data(self.id).tokens.clone()
    }

    /// Non-trivia tokens covered by this node, with their stream index.
    pub fn significant_tokens(self) -> impl Iterator<Item = (usize, &'a Token)> + 'a {
        let tokens = &self.tree.tokens;
        self.token_indices()
            .filter_map(move |i| tokens.get(i).map(|t| (i, t)))
            .filter(|(_, t)| !t.kind.is_trivia())
    }

    #[must_use]
    pub fn first_token(self) -> Option<&'a Token> {
        self.significant_tokens().next().map(|(_, t)| t)
    }

    #[must_use]
    pub fn parent(self) -> Option<Node<'a>> {
        self.tree.data(self.id).parent.map(|id| self.tree.node(id))
    }

    pub fn children(self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        tree.data(self.id)
            .children
            .iter()
            .map(move |id| tree.node(*id))
    }

    /// Parent, grandparent, ... up to the module.
    pub fn ancestors(self) -> impl Iterator<Item = Node<'a>> + 'a {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// All nodes below this one, depth-first, in source order.
    #[must_use]
    pub fn descendants(self) -> Vec<Node<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<Node<'a>> = self.children().collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            out.push(node);
            let mark = stack.len();
            stack.extend(node.children());
            stack[mark..].reverse();
        }
        out
    }

    /// The enclosing procedure or function, if any.
    #[must_use]
    pub fn enclosing_method(self) -> Option<Node<'a>> {
        self.ancestors().find(|node| node.kind().is_method())
    }

    /// Declared name for methods, parameters and variables.
    #[must_use]
    pub fn name(self) -> Option<&'a str> {
        let index = self.tree.data(self.id).name?;
        Some(self.tree.tokens.get(index)?.text(&self.tree.text))
    }

    /// Byte range of the declared name token.
    #[must_use]
    pub fn name_range(self) -> Option<OffsetRange> {
        let index = self.tree.data(self.id).name?;
        Some(self.tree.tokens.get(index)?.range)
    }

    /// Whether a method or module variable carries `Export`.
    #[must_use]
    pub fn is_exported(self) -> bool {
        self.tree.data(self.id).exported
    }

    /// Returns `true` if any token of this node is of `kind`.
    #[must_use]
    pub fn has_token(self, kind: TokenKind) -> bool {
        self.significant_tokens().any(|(_, t)| t.kind == kind)
    }
}
