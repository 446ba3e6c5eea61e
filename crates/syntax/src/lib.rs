//! # BSL Syntax
//!
//! The syntax tree provider for the analysis engine: turns module text into
//! an immutable [`SyntaxTree`] plus its lossless token stream.
//!
//! Parsing never fails. Malformed input produces [`SyntaxError`]s alongside a
//! partial tree, and the [`Parse`] is flagged as degraded so consumers can
//! decide how far to trust it.
//!
//! ```rust,ignore
//! let parse = BslSyntaxProvider.parse("Процедура Тест()\nКонецПроцедуры");
//! assert!(!parse.is_degraded());
//! for method in parse.tree().methods() {
//!     println!("{}", method.name().unwrap_or("?"));
//! }
//! ```

mod lexer;
mod line_index;
mod parser;
mod tree;

use std::sync::Arc;

use bsl_types::OffsetRange;

pub use lexer::{tokenize, Keyword, Token, TokenKind};
pub use line_index::LineIndex;
pub use tree::{Node, NodeId, NodeKind, SyntaxTree};

/// A syntax error with its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub range: OffsetRange,
}

impl SyntaxError {
    #[must_use]
    pub fn new(message: impl Into<String>, range: OffsetRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.message, self.range)
    }
}

/// Result of parsing one text.
///
/// Cheap to clone; the tree and error list are shared.
#[derive(Debug, Clone)]
pub struct Parse {
    tree: Arc<SyntaxTree>,
    errors: Arc<[SyntaxError]>,
}

impl Parse {
    /// A parse that produced no usable structure.
    ///
    /// Used when the provider itself failed; the tree holds only an empty
    /// module so rules that need nothing but the text can still run.
    #[must_use]
    pub fn failed(text: &str, message: impl Into<String>) -> Self {
        let tree = SyntaxTree::empty(Arc::from(text));
        Self {
            tree: Arc::new(tree),
            errors: Arc::from(vec![SyntaxError::new(message, OffsetRange::at(0))]),
        }
    }

    #[must_use]
    pub fn tree(&self) -> &Arc<SyntaxTree> {
        &self.tree
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        self.tree.tokens()
    }

    #[must_use]
    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.tree.text()
    }

    /// Returns `true` if the tree is only partially usable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Source of syntax trees for the engine.
///
/// Implementations must be deterministic for identical input and must not
/// keep references to earlier outputs.
pub trait SyntaxProvider: Send + Sync {
    fn parse(&self, text: &str) -> Parse;
}

/// The built-in BSL / `OneScript` parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BslSyntaxProvider;

impl SyntaxProvider for BslSyntaxProvider {
    fn parse(&self, text: &str) -> Parse {
        parse(text)
    }
}

/// Parse a module.
#[must_use]
pub fn parse(text: &str) -> Parse {
    let (tokens, mut errors) = tokenize(text);
    let (tree, parse_errors) = parser::parse_module(Arc::from(text), Arc::from(tokens));
    errors.extend(parse_errors);
    errors.sort_by_key(|error| error.range.start);

    tracing::trace!(
        tokens = tree.tokens().len(),
        errors = errors.len(),
        "parsed module"
    );

    Parse {
        tree: Arc::new(tree),
        errors: Arc::from(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_of(parse: &Parse) -> Vec<NodeKind> {
        parse.tree().root().descendants().iter().map(|n| n.kind()).collect()
    }

    #[test]
    fn test_parse_empty_text() {
        let parse = parse("");
        assert!(!parse.is_degraded());
        assert_eq!(parse.tree().root().kind(), NodeKind::Module);
        assert_eq!(parse.tree().root().children().count(), 0);
    }

    #[test]
    fn test_parse_procedure_with_params_and_export() {
        let text = "Процедура Тест(Знач А, Б = 1) Экспорт\n\tСообщить(А);\nКонецПроцедуры";
        let parse = parse(text);
        assert!(parse.errors().is_empty(), "{:?}", parse.errors());

        let methods: Vec<_> = parse.tree().methods().collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].kind(), NodeKind::Procedure);
        assert_eq!(methods[0].name(), Some("Тест"));
        assert!(methods[0].is_exported());

        let params: Vec<_> = parse
            .tree()
            .nodes_of_kind(NodeKind::Param)
            .filter_map(|p| p.name())
            .collect();
        assert_eq!(params, vec!["А", "Б"]);
        assert!(parse.tree().contains(NodeKind::CallStatement));
        assert!(!parse.tree().contains(NodeKind::Assignment));
    }

    #[test]
    fn test_parse_function_with_control_flow() {
        let text = r#"
&НаСервере
Функция Сумма(Список)
    Итог = 0;
    Для Каждого Элемент Из Список Цикл
        Если Элемент > 0 Тогда
            Итог = Итог + Элемент;
        ИначеЕсли Элемент = 0 Тогда
            Продолжить;
        Иначе
            Прервать;
        КонецЕсли;
    КонецЦикла;
    Для Индекс = 1 По 10 Цикл
    КонецЦикла;
    Пока Ложь Цикл
    КонецЦикла;
    Попытка
        ВызватьИсключение "ошибка";
    Исключение
        Возврат 0;
    КонецПопытки;
    Возврат Итог;
КонецФункции
"#;
        let parse = parse(text);
        assert!(parse.errors().is_empty(), "{:?}", parse.errors());

        let kinds = kinds_of(&parse);
        for expected in [
            NodeKind::Function,
            NodeKind::Annotation,
            NodeKind::ForEachStatement,
            NodeKind::IfStatement,
            NodeKind::ForStatement,
            NodeKind::WhileStatement,
            NodeKind::TryStatement,
            NodeKind::RaiseStatement,
            NodeKind::ReturnStatement,
            NodeKind::ContinueStatement,
            NodeKind::BreakStatement,
            NodeKind::StringLiteral,
        ] {
            assert!(kinds.contains(&expected), "missing {expected:?}");
        }
    }

    #[test]
    fn test_parse_module_variables() {
        let parse = parse("Перем А Экспорт, Б;\n");
        assert!(parse.errors().is_empty());
        let vars: Vec<_> = parse
            .tree()
            .nodes_of_kind(NodeKind::Variable)
            .map(|v| (v.name().unwrap_or_default(), v.is_exported()))
            .collect();
        assert_eq!(vars, vec![("А", true), ("Б", false)]);
    }

    #[test]
    fn test_string_literals_are_children_of_expressions() {
        let parse = parse("Путь = \"C:\\temp\" + Имя;");
        let literal = parse
            .tree()
            .nodes_of_kind(NodeKind::StringLiteral)
            .next()
            .unwrap();
        assert_eq!(literal.text(), "\"C:\\temp\"");
        assert_eq!(literal.parent().map(Node::kind), Some(NodeKind::Expression));
        assert_eq!(
            literal.ancestors().map(Node::kind).collect::<Vec<_>>(),
            vec![NodeKind::Expression, NodeKind::Assignment, NodeKind::Module]
        );
    }

    #[test]
    fn test_call_arguments_become_expressions() {
        let parse = parse("ЭтаФорма.Элементы.Найти(\"Поле\", ЭтаФорма).Видимость();");
        assert!(parse.errors().is_empty());
        let call = parse
            .tree()
            .nodes_of_kind(NodeKind::CallStatement)
            .next()
            .unwrap();
        let args: Vec<_> = call.children().map(Node::text).collect();
        assert_eq!(args, vec!["\"Поле\"", "ЭтаФорма"]);
    }

    #[test]
    fn test_missing_end_procedure_is_degraded_but_recovers() {
        let text = "Процедура А()\n\tX = 1;\n\nПроцедура Б()\nКонецПроцедуры";
        let parse = parse(text);
        assert!(parse.is_degraded());
        assert_eq!(parse.errors()[0].message, "Expected EndProcedure");
        let names: Vec<_> = parse.tree().methods().filter_map(|m| m.name()).collect();
        assert_eq!(names, vec!["А", "Б"]);
    }

    #[test]
    fn test_garbage_statement_produces_error_node() {
        let parse = parse("Процедура А()\n\tX Y Z;\nКонецПроцедуры");
        assert!(parse.is_degraded());
        assert!(parse.tree().contains(NodeKind::Error));
        assert_eq!(
            parse.errors()[0].message,
            "Expected assignment or procedure call"
        );
    }

    #[test]
    fn test_stray_block_end_is_reported() {
        let parse = parse("КонецЕсли;\nА = 1;");
        assert_eq!(parse.errors().len(), 1);
        assert_eq!(parse.errors()[0].message, "Unexpected EndIf");
        assert!(parse.tree().contains(NodeKind::Assignment));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "Если А Тогда Б(); КонецЕсли";
        let first = parse(text);
        let second = parse(text);
        assert_eq!(kinds_of(&first), kinds_of(&second));
        assert_eq!(first.errors(), second.errors());
    }

    #[test]
    fn test_failed_parse_keeps_text() {
        let parse = Parse::failed("А = 1;", "parser crashed");
        assert!(parse.is_degraded());
        assert_eq!(parse.text(), "А = 1;");
        assert!(parse.tokens().is_empty());
        assert_eq!(parse.tree().root().kind(), NodeKind::Module);
    }

    #[test]
    fn test_enclosing_method() {
        let parse = parse("Процедура А()\n\tБ();\nКонецПроцедуры\nВ();");
        let calls: Vec<_> = parse
            .tree()
            .nodes_of_kind(NodeKind::CallStatement)
            .map(|c| c.enclosing_method().and_then(Node::name))
            .collect();
        assert_eq!(calls, vec![Some("А"), None]);
    }
}
