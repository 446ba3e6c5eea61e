//! Conversions between LSP types and engine types.
//!
//! ## Extension Traits
//!
//! ```rust,ignore
//! use crate::conversions::{IntoEngine, IntoLsp};
//!
//! let lsp_range = engine_range.into_lsp();
//! let engine_position = lsp_position.into_engine();
//! ```
//!
//! Diagnostics travel through the client and come back in code action
//! requests, so [`DiagnosticData`] carries everything the quick-fix engine
//! needs to rebuild the original diagnostic.

use std::collections::HashMap;

use bsl_analysis::{DocumentSymbol, SymbolKind};
use bsl_linter::{Diagnostic, DiagnosticKind, RuleId};
use bsl_syntax::LineIndex;
use bsl_types::{CodeFix, DiagnosticSeverity, Position, Range};
use lsp_types::{CodeAction, CodeActionKind, CodeActionOrCommand, NumberOrString, Uri, WorkspaceEdit};
use serde::{Deserialize, Serialize};

/// `source` of every published diagnostic.
pub const SOURCE: &str = "bsl";

/// Extension trait for converting engine types to LSP types.
pub trait IntoLsp {
    type Output;
    fn into_lsp(self) -> Self::Output;
}

/// Extension trait for converting LSP types to engine types.
pub trait IntoEngine {
    type Output;
    fn into_engine(self) -> Self::Output;
}

impl IntoLsp for Position {
    type Output = lsp_types::Position;
    fn into_lsp(self) -> lsp_types::Position {
        lsp_types::Position {
            line: self.line,
            character: self.character,
        }
    }
}

impl IntoEngine for lsp_types::Position {
    type Output = Position;
    fn into_engine(self) -> Position {
        Position::new(self.line, self.character)
    }
}

impl IntoLsp for Range {
    type Output = lsp_types::Range;
    fn into_lsp(self) -> lsp_types::Range {
        lsp_types::Range {
            start: self.start.into_lsp(),
            end: self.end.into_lsp(),
        }
    }
}

impl IntoEngine for lsp_types::Range {
    type Output = Range;
    fn into_engine(self) -> Range {
        Range::new(self.start.into_engine(), self.end.into_engine())
    }
}

impl IntoLsp for DiagnosticSeverity {
    type Output = lsp_types::DiagnosticSeverity;
    fn into_lsp(self) -> lsp_types::DiagnosticSeverity {
        match self {
            Self::Error => lsp_types::DiagnosticSeverity::ERROR,
            Self::Warning => lsp_types::DiagnosticSeverity::WARNING,
            Self::Information => lsp_types::DiagnosticSeverity::INFORMATION,
            Self::Hint => lsp_types::DiagnosticSeverity::HINT,
        }
    }
}

impl IntoEngine for lsp_types::DiagnosticSeverity {
    type Output = DiagnosticSeverity;
    fn into_engine(self) -> DiagnosticSeverity {
        match self {
            Self::ERROR => DiagnosticSeverity::Error,
            Self::INFORMATION => DiagnosticSeverity::Information,
            Self::HINT => DiagnosticSeverity::Hint,
            _ => DiagnosticSeverity::Warning,
        }
    }
}

/// The `data` field of a published diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticData {
    pub rule: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub internal_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl IntoLsp for &Diagnostic {
    type Output = lsp_types::Diagnostic;
    fn into_lsp(self) -> lsp_types::Diagnostic {
        let data = DiagnosticData {
            rule: self.rule.to_string(),
            internal_error: self.is_internal_error(),
            payload: self.payload.clone(),
            anchor: self.anchor.clone(),
        };
        lsp_types::Diagnostic {
            range: self.range.into_lsp(),
            severity: Some(self.severity.into_lsp()),
            code: Some(NumberOrString::String(self.rule.to_string())),
            source: Some(SOURCE.to_string()),
            message: self.message.clone(),
            data: serde_json::to_value(data).ok(),
            ..Default::default()
        }
    }
}

impl IntoEngine for &lsp_types::Diagnostic {
    /// `None` for diagnostics this server did not publish.
    type Output = Option<Diagnostic>;
    fn into_engine(self) -> Option<Diagnostic> {
        if self.source.as_deref() != Some(SOURCE) {
            return None;
        }
        let data: DiagnosticData = serde_json::from_value(self.data.clone()?).ok()?;
        let severity = self
            .severity
            .map_or(DiagnosticSeverity::Warning, IntoEngine::into_engine);
        let mut diagnostic = Diagnostic::new(
            RuleId::from(data.rule),
            severity,
            self.range.into_engine(),
            self.message.clone(),
        );
        if data.internal_error {
            diagnostic.kind = DiagnosticKind::InternalError;
        }
        diagnostic.payload = data.payload;
        diagnostic.anchor = data.anchor;
        Some(diagnostic)
    }
}

impl IntoLsp for SymbolKind {
    type Output = lsp_types::SymbolKind;
    fn into_lsp(self) -> lsp_types::SymbolKind {
        match self {
            Self::Procedure => lsp_types::SymbolKind::METHOD,
            Self::Function => lsp_types::SymbolKind::FUNCTION,
            Self::Variable => lsp_types::SymbolKind::VARIABLE,
        }
    }
}

impl IntoLsp for DocumentSymbol {
    type Output = lsp_types::DocumentSymbol;
    #[allow(deprecated)] // LSP requires deprecated field
    fn into_lsp(self) -> lsp_types::DocumentSymbol {
        let detail = match (self.detail, self.exported) {
            (Some(params), true) => Some(format!("{params} Экспорт")),
            (Some(params), false) => Some(params),
            (None, true) => Some("Экспорт".to_string()),
            (None, false) => None,
        };
        lsp_types::DocumentSymbol {
            name: self.name,
            kind: self.kind.into_lsp(),
            detail,
            range: self.range.into_lsp(),
            selection_range: self.selection_range.into_lsp(),
            children: None,
            tags: None,
            deprecated: None,
        }
    }
}

/// Convert a quick fix over `index`'s text into a code action for `uri`.
#[allow(clippy::mutable_key_type)] // `Uri` keys, as `WorkspaceEdit` requires
pub fn code_action(
    fix: CodeFix,
    uri: &Uri,
    index: &LineIndex,
    diagnostic: lsp_types::Diagnostic,
    preferred: bool,
) -> CodeActionOrCommand {
    let edits = fix
        .edits
        .into_iter()
        .map(|edit| lsp_types::TextEdit {
            range: index.range(edit.offset_range).into_lsp(),
            new_text: edit.new_text,
        })
        .collect();
    CodeActionOrCommand::CodeAction(CodeAction {
        title: fix.label,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic]),
        edit: Some(WorkspaceEdit {
            changes: Some(HashMap::from([(uri.clone(), edits)])),
            ..Default::default()
        }),
        is_preferred: Some(preferred),
        ..Default::default()
    })
}

/// Apply one content change to `text`.
///
/// Returns `None` if the change's range does not exist in `text`.
pub fn apply_change(text: &str, change: lsp_types::TextDocumentContentChangeEvent) -> Option<String> {
    let Some(range) = change.range else {
        return Some(change.text);
    };
    let range = LineIndex::new(text).offset_range(range.into_engine())?;
    let mut text = text.to_string();
    text.replace_range(range.start..range.end, &change.text);
    Some(text)
}
