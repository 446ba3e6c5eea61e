//! Document outline: methods and module-level variables.

use bsl_syntax::{Node, NodeKind, SyntaxTree};
use bsl_types::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Procedure,
    Function,
    /// Module variable declared with `Var` / `Перем`
    Variable,
}

/// One entry of the document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Parameter list for methods, e.g. `(Знач А, Б = 1)`
    pub detail: Option<String>,
    pub exported: bool,
    /// Full range of the declaration
    pub range: Range,
    /// Range of the name only
    pub selection_range: Range,
}

/// Outline of `tree` in source order.
#[must_use]
pub fn document_symbols(tree: &SyntaxTree) -> Vec<DocumentSymbol> {
    let line_index = tree.line_index();
    tree.nodes()
        .filter_map(|node| {
            let kind = symbol_kind(node)?;
            let name = node.name()?;
            let selection = node.name_range().unwrap_or_else(|| node.range());
            let detail = node
                .children()
                .find(|child| child.kind() == NodeKind::ParamList)
                .map(|params| params.text().to_string());
            Some((
                node.range().start,
                DocumentSymbol {
                    name: name.to_string(),
                    kind,
                    detail,
                    exported: node.is_exported(),
                    range: line_index.range(node.range()),
                    selection_range: line_index.range(selection),
                },
            ))
        })
        .collect::<std::collections::BTreeMap<_, _>>()
        .into_values()
        .collect()
}

fn symbol_kind(node: Node<'_>) -> Option<SymbolKind> {
    match node.kind() {
        NodeKind::Procedure => Some(SymbolKind::Procedure),
        NodeKind::Function => Some(SymbolKind::Function),
        NodeKind::Variable if node.enclosing_method().is_none() => Some(SymbolKind::Variable),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsl_types::Position;

    #[test]
    fn test_methods_and_module_variables() {
        let text = "Перем Кэш Экспорт;\n\nПроцедура Обновить(Знач Ключ) Экспорт\n\tПерем Локальная;\nКонецПроцедуры\n\nФункция Получить()\n\tВозврат Кэш;\nКонецФункции\n";
        let parse = bsl_syntax::parse(text);
        let symbols = document_symbols(parse.tree());

        let outline: Vec<_> = symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.exported))
            .collect();
        assert_eq!(
            outline,
            vec![
                ("Кэш", SymbolKind::Variable, true),
                ("Обновить", SymbolKind::Procedure, true),
                ("Получить", SymbolKind::Function, false),
            ]
        );

        let procedure = &symbols[1];
        assert_eq!(procedure.detail.as_deref(), Some("(Знач Ключ)"));
        assert_eq!(procedure.range.start, Position::new(2, 0));
        assert_eq!(procedure.range.end, Position::new(4, 14));
        assert_eq!(
            procedure.selection_range,
            Range::new(Position::new(2, 10), Position::new(2, 18))
        );
    }

    #[test]
    fn test_empty_module_has_no_symbols() {
        let parse = bsl_syntax::parse("");
        assert!(document_symbols(parse.tree()).is_empty());
    }
}
