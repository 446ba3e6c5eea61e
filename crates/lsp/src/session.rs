//! Per-document protocol state.
//!
//! Every document moves `Unopened -> Open -> Closed`, with any number of
//! changes while open. A closed document can only be opened again, which
//! starts from scratch. Notifications that do not fit the current state are
//! rejected with a [`SessionError`] and must not reach the engine.

use std::collections::HashMap;
use std::fmt;

use bsl_types::{DocumentUri, DocumentVersion};
use lsp_types::Uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unopened,
    Open,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unopened => "not opened",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("document '{0}' is already open")]
    AlreadyOpen(DocumentUri),
    #[error("document '{uri}' is {phase}")]
    NotOpen { uri: DocumentUri, phase: Phase },
}

/// An open document as the client and the engine see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    /// The client's URI, echoed back when publishing
    pub uri: Uri,
    /// Version sent by the client
    pub client_version: i32,
    /// Engine version of the latest text, once the engine has it
    pub engine_version: Option<DocumentVersion>,
}

/// Open documents are `Some`, closed ones `None`; unopened ones are absent.
#[derive(Debug, Default)]
pub struct Sessions {
    documents: HashMap<DocumentUri, Option<OpenDocument>>,
}

impl Sessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self, uri: &DocumentUri) -> Phase {
        match self.documents.get(uri) {
            None => Phase::Unopened,
            Some(Some(_)) => Phase::Open,
            Some(None) => Phase::Closed,
        }
    }

    /// Enter `Open`. Legal from `Unopened` and `Closed`.
    pub fn open(
        &mut self,
        key: DocumentUri,
        uri: Uri,
        client_version: i32,
    ) -> Result<&mut OpenDocument, SessionError> {
        if self.phase(&key) == Phase::Open {
            return Err(SessionError::AlreadyOpen(key));
        }
        let slot = self.documents.entry(key).or_default();
        Ok(slot.insert(OpenDocument {
            uri,
            client_version,
            engine_version: None,
        }))
    }

    /// Record a change. Only legal while `Open`.
    pub fn change(
        &mut self,
        key: &DocumentUri,
        client_version: i32,
    ) -> Result<&mut OpenDocument, SessionError> {
        let phase = self.phase(key);
        match self.documents.get_mut(key) {
            Some(Some(document)) => {
                document.client_version = client_version;
                Ok(document)
            }
            _ => Err(SessionError::NotOpen {
                uri: key.clone(),
                phase,
            }),
        }
    }

    /// Saving does not change the state but is only legal while `Open`.
    pub fn save(&self, key: &DocumentUri) -> Result<(), SessionError> {
        self.get(key).map(|_| ())
    }

    /// Move `Open -> Closed`, returning the document as it was.
    pub fn close(&mut self, key: &DocumentUri) -> Result<OpenDocument, SessionError> {
        if let Some(document) = self.documents.get_mut(key).and_then(Option::take) {
            return Ok(document);
        }
        Err(SessionError::NotOpen {
            uri: key.clone(),
            phase: self.phase(key),
        })
    }

    pub fn get(&self, key: &DocumentUri) -> Result<&OpenDocument, SessionError> {
        match self.documents.get(key) {
            Some(Some(document)) => Ok(document),
            _ => Err(SessionError::NotOpen {
                uri: key.clone(),
                phase: self.phase(key),
            }),
        }
    }

    /// The document to publish a result for `engine_version` to, if that
    /// version is still the latest one the client has.
    #[must_use]
    pub fn publishable(
        &self,
        key: &DocumentUri,
        engine_version: DocumentVersion,
    ) -> Option<&OpenDocument> {
        self.get(key)
            .ok()
            .filter(|document| document.engine_version == Some(engine_version))
    }

    pub fn open_documents(&self) -> impl Iterator<Item = (&DocumentUri, &OpenDocument)> {
        self.documents
            .iter()
            .filter_map(|(key, slot)| slot.as_ref().map(|document| (key, document)))
    }
}
