//! Per-document state.
//!
//! The store is the only mutable state shared between the protocol side and
//! the scheduler. Each document lives behind its own map entry, so updates to
//! one URI are serialized while different URIs proceed independently.
//!
//! Every mutation of the text draws a fresh version from a store-wide
//! counter and drops the cached parse and diagnostics in the same critical
//! section. A parse or diagnostic set produced later is only installed if its
//! version is still the current one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bsl_linter::Diagnostic;
use bsl_syntax::Parse;
use bsl_types::{DocumentUri, DocumentVersion};
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document '{0}' is not open")]
    NotOpen(DocumentUri),
}

/// A merged diagnostic set and the version it was computed against.
#[derive(Debug, Clone)]
pub struct DiagnosticSet {
    pub version: DocumentVersion,
    pub diagnostics: Arc<[Diagnostic]>,
}

#[derive(Debug)]
struct DocumentState {
    text: Arc<str>,
    version: DocumentVersion,
    parse: Option<Parse>,
    diagnostics: Option<DiagnosticSet>,
}

/// A self-consistent view of one document at one version.
///
/// `parse` and `diagnostics` are `None` until the engine has produced them
/// for `version`; they never belong to an older text.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: DocumentUri,
    pub text: Arc<str>,
    pub version: DocumentVersion,
    pub parse: Option<Parse>,
    pub diagnostics: Option<Arc<[Diagnostic]>>,
}

/// All open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<DocumentUri, DocumentState>,
    last_version: AtomicU64,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> DocumentVersion {
        DocumentVersion::new(self.last_version.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Create a fresh document, replacing any previous state for `uri`.
    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    pub fn open(&self, uri: &DocumentUri, text: &str) -> DocumentVersion {
        let mut state = self
            .documents
            .entry(uri.clone())
            .or_insert_with(|| DocumentState::new("", DocumentVersion::new(0)));
        let version = self.next_version();
        *state = DocumentState::new(text, version);
        tracing::debug!(%version, "document opened");
        version
    }

    /// Replace the text of an open document.
    ///
    /// The cached parse and diagnostics are invalidated immediately.
    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    pub fn update(&self, uri: &DocumentUri, text: &str) -> Result<DocumentVersion, DocumentError> {
        let mut state = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::NotOpen(uri.clone()))?;
        let version = self.next_version();
        *state = DocumentState::new(text, version);
        tracing::debug!(%version, "document updated");
        Ok(version)
    }

    /// Forget a document. Returns `false` if it was not open.
    #[tracing::instrument(skip(self))]
    pub fn close(&self, uri: &DocumentUri) -> bool {
        self.documents.remove(uri).is_some()
    }

    #[must_use]
    pub fn get(&self, uri: &DocumentUri) -> Option<DocumentSnapshot> {
        let state = self.documents.get(uri)?;
        Some(DocumentSnapshot {
            uri: uri.clone(),
            text: Arc::clone(&state.text),
            version: state.version,
            parse: state.parse.clone(),
            diagnostics: state
                .diagnostics
                .as_ref()
                .map(|set| Arc::clone(&set.diagnostics)),
        })
    }

    #[must_use]
    pub fn current_version(&self, uri: &DocumentUri) -> Option<DocumentVersion> {
        self.documents.get(uri).map(|state| state.version)
    }

    #[must_use]
    pub fn is_current(&self, uri: &DocumentUri, version: DocumentVersion) -> bool {
        self.current_version(uri) == Some(version)
    }

    /// Open documents and their current versions, ordered by URI.
    #[must_use]
    pub fn versions(&self) -> Vec<(DocumentUri, DocumentVersion)> {
        let mut versions: Vec<_> = self
            .documents
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().version))
            .collect();
        versions.sort();
        versions
    }

    /// Cache `parse` if `version` is still current.
    pub fn install_parse(&self, uri: &DocumentUri, version: DocumentVersion, parse: Parse) -> bool {
        match self.documents.get_mut(uri) {
            Some(mut state) if state.version == version => {
                state.parse = Some(parse);
                true
            }
            _ => false,
        }
    }

    /// Store `diagnostics` as the result for `version` if it is still
    /// current, then run `on_commit` before any other writer can touch the
    /// document.
    ///
    /// Returns `false` and skips `on_commit` if a newer version superseded
    /// the result or the document was closed.
    pub fn commit(
        &self,
        uri: &DocumentUri,
        version: DocumentVersion,
        diagnostics: Arc<[Diagnostic]>,
        on_commit: impl FnOnce(&Arc<[Diagnostic]>),
    ) -> bool {
        let Some(mut state) = self.documents.get_mut(uri) else {
            return false;
        };
        if state.version != version {
            return false;
        }
        on_commit(&diagnostics);
        state.diagnostics = Some(DiagnosticSet {
            version,
            diagnostics,
        });
        true
    }

    /// The committed diagnostic set, if any, with its version tag.
    #[must_use]
    pub fn diagnostics(&self, uri: &DocumentUri) -> Option<DiagnosticSet> {
        self.documents.get(uri)?.diagnostics.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&self) {
        self.documents.clear();
    }
}

impl DocumentState {
    fn new(text: &str, version: DocumentVersion) -> Self {
        Self {
            text: Arc::from(text),
            version,
            parse: None,
            diagnostics: None,
        }
    }
}
