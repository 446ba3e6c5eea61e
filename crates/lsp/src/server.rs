//! The protocol loop.
//!
//! One thread owns the connection, the [`Sessions`] and the analysis host.
//! It waits on two channels at once: messages from the client and
//! publications from the engine. Edits are handed to the engine without
//! waiting for analysis; results come back on the publication channel and
//! are forwarded only if the client still has that version.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use bsl_analysis::{AnalysisHost, EngineOptions, FixError, Publication};
use bsl_config::{find_config, load_config, ServerConfig};
use bsl_linter::{ConfigIssue, RuleRegistry};
use bsl_syntax::{BslSyntaxProvider, LineIndex};
use bsl_types::DocumentUri;
use crossbeam_channel::select;
use lsp_server::{Connection, ErrorCode, Message, Notification, Request, RequestId, Response};
use lsp_types::notification::{
    DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument,
    DidSaveTextDocument, Notification as _, PublishDiagnostics, ShowMessage,
};
use lsp_types::request::{CodeActionRequest, DocumentSymbolRequest, Request as _};
use lsp_types::{
    CodeActionKind, CodeActionOptions, CodeActionParams, CodeActionProviderCapability,
    DidChangeConfigurationParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, DocumentSymbolParams,
    DocumentSymbolResponse, InitializeParams, MessageType, OneOf, PublishDiagnosticsParams,
    ServerCapabilities, ShowMessageParams, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, Uri,
};
use serde::de::DeserializeOwned;

use crate::conversions::{apply_change, code_action, IntoEngine, IntoLsp};
use crate::session::Sessions;

/// Settings key read from `workspace/didChangeConfiguration`.
pub const SETTINGS_SECTION: &str = "bslLanguageServer";

#[must_use]
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                ..Default::default()
            },
        )),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
            ..Default::default()
        })),
        document_symbol_provider: Some(OneOf::Left(true)),
        ..Default::default()
    }
}

/// Run the initialize handshake and the main loop on `connection`.
///
/// Returns after the client's `shutdown`/`exit` sequence or when the
/// connection is dropped.
pub fn serve(connection: &Connection) -> anyhow::Result<()> {
    let (id, params) = connection
        .initialize_start()
        .context("failed to receive initialize request")?;
    let params: InitializeParams =
        serde_json::from_value(params).context("invalid initialize params")?;

    let result = serde_json::json!({
        "capabilities": server_capabilities(),
        "serverInfo": {
            "name": "bsl-language-server",
            "version": env!("CARGO_PKG_VERSION"),
        },
    });
    connection
        .initialize_finish(id, result)
        .context("failed to complete initialize handshake")?;

    let mut server = Server::new(connection, &params)?;
    server.run()
}

struct Server<'a> {
    connection: &'a Connection,
    host: AnalysisHost,
    sessions: Sessions,
}

impl<'a> Server<'a> {
    fn new(connection: &'a Connection, params: &InitializeParams) -> anyhow::Result<Self> {
        let registry = Arc::new(RuleRegistry::builtin().context("invalid built-in rules")?);

        let mut warnings = Vec::new();
        let config = workspace_root(params)
            .map_or_else(|| Ok(ServerConfig::default()), |root| discover_config(&root))
            .unwrap_or_else(|error| {
                warnings.push(format!("Failed to load configuration: {error:#}"));
                ServerConfig::default()
            });
        warnings.extend(config.validate(&registry).iter().map(ToString::to_string));

        let host = AnalysisHost::new(
            registry,
            &config.diagnostics,
            EngineOptions::from(&config.engine),
            Arc::new(BslSyntaxProvider),
        )
        .context("failed to start the analysis engine")?;

        let server = Self {
            connection,
            host,
            sessions: Sessions::new(),
        };
        for warning in warnings {
            server.show_warning(warning)?;
        }
        Ok(server)
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let publications = self.host.publications().clone();
        loop {
            select! {
                recv(self.connection.receiver) -> message => {
                    let Ok(message) = message else {
                        tracing::info!("client disconnected");
                        break;
                    };
                    if self.handle_message(message)? {
                        break;
                    }
                }
                recv(publications) -> publication => {
                    let Ok(publication) = publication else {
                        tracing::error!("analysis engine stopped unexpectedly");
                        break;
                    };
                    self.publish(publication)?;
                }
            }
        }
        self.host.shutdown();
        Ok(())
    }

    /// Returns `true` once the client asked to shut down.
    fn handle_message(&mut self, message: Message) -> anyhow::Result<bool> {
        match message {
            Message::Request(request) => {
                if self.connection.handle_shutdown(&request)? {
                    tracing::info!("shutdown requested");
                    return Ok(true);
                }
                self.handle_request(request)?;
            }
            Message::Notification(notification) => self.handle_notification(notification)?,
            Message::Response(response) => {
                tracing::debug!(id = ?response.id, "ignoring response from client");
            }
        }
        Ok(false)
    }

    fn handle_request(&self, request: Request) -> anyhow::Result<()> {
        let Request { id, method, params } = request;
        let response = match method.as_str() {
            CodeActionRequest::METHOD => match parse_params::<CodeActionParams>(params) {
                Ok(params) => Response::new_ok(id, self.code_actions(params)),
                Err(error) => invalid_params(id, &error),
            },
            DocumentSymbolRequest::METHOD => match parse_params::<DocumentSymbolParams>(params) {
                Ok(params) => Response::new_ok(id, self.document_symbols(&params)),
                Err(error) => invalid_params(id, &error),
            },
            _ => Response::new_err(
                id,
                ErrorCode::MethodNotFound as i32,
                format!("unhandled method '{method}'"),
            ),
        };
        self.send(Message::Response(response))
    }

    fn handle_notification(&mut self, notification: Notification) -> anyhow::Result<()> {
        let Notification { method, params } = notification;
        match method.as_str() {
            DidOpenTextDocument::METHOD => {
                if let Some(params) = decode(&method, params) {
                    self.did_open(params);
                }
            }
            DidChangeTextDocument::METHOD => {
                if let Some(params) = decode(&method, params) {
                    self.did_change(params);
                }
            }
            DidCloseTextDocument::METHOD => {
                if let Some(params) = decode(&method, params) {
                    self.did_close(params)?;
                }
            }
            DidSaveTextDocument::METHOD => {
                if let Some(params) = decode(&method, params) {
                    self.did_save(&params);
                }
            }
            DidChangeConfiguration::METHOD => {
                if let Some(params) = decode(&method, params) {
                    self.did_change_configuration(params)?;
                }
            }
            _ => tracing::debug!(%method, "ignoring notification"),
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(uri = params.text_document.uri.as_str()))]
    fn did_open(&mut self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        let key = DocumentUri::new(document.uri.as_str());
        match self.sessions.open(key.clone(), document.uri, document.version) {
            Ok(session) => {
                session.engine_version = Some(self.host.open(&key, &document.text));
            }
            Err(error) => tracing::warn!(%error, "ignoring didOpen"),
        }
    }

    #[tracing::instrument(skip_all, fields(uri = params.text_document.uri.as_str()))]
    fn did_change(&mut self, params: DidChangeTextDocumentParams) {
        let key = DocumentUri::new(params.text_document.uri.as_str());
        if let Err(error) = self.sessions.get(&key) {
            tracing::warn!(%error, "ignoring didChange");
            return;
        }
        let Some(current) = self.host.document(&key) else {
            tracing::error!("open document is missing from the engine");
            return;
        };

        let mut text = current.text.to_string();
        for change in params.content_changes {
            let Some(next) = apply_change(&text, change) else {
                tracing::warn!("change range is outside the document, dropping the edit");
                return;
            };
            text = next;
        }

        match self.host.update(&key, &text) {
            Ok(version) => {
                if let Ok(session) = self.sessions.change(&key, params.text_document.version) {
                    session.engine_version = Some(version);
                }
            }
            Err(error) => tracing::error!(%error, "engine rejected the change"),
        }
    }

    #[tracing::instrument(skip_all, fields(uri = params.text_document.uri.as_str()))]
    fn did_close(&mut self, params: DidCloseTextDocumentParams) -> anyhow::Result<()> {
        let key = DocumentUri::new(params.text_document.uri.as_str());
        match self.sessions.close(&key) {
            Ok(document) => {
                self.host.close(&key);
                // Clear what the editor still shows for the document
                self.send_diagnostics(document.uri, Vec::new(), None)
            }
            Err(error) => {
                tracing::warn!(%error, "ignoring didClose");
                Ok(())
            }
        }
    }

    fn did_save(&self, params: &DidSaveTextDocumentParams) {
        let key = DocumentUri::new(params.text_document.uri.as_str());
        if let Err(error) = self.sessions.save(&key) {
            tracing::warn!(%error, "ignoring didSave");
        }
    }

    #[tracing::instrument(skip_all)]
    fn did_change_configuration(&mut self, params: DidChangeConfigurationParams) -> anyhow::Result<()> {
        let settings = match params.settings {
            serde_json::Value::Object(mut settings) if settings.contains_key(SETTINGS_SECTION) => {
                settings.remove(SETTINGS_SECTION).unwrap_or_default()
            }
            serde_json::Value::Null => {
                tracing::debug!("empty settings, keeping the current configuration");
                return Ok(());
            }
            settings => settings,
        };
        let config = match ServerConfig::from_value(settings) {
            Ok(config) => config,
            Err(error) => {
                return self.show_warning(format!("Invalid settings: {error}"));
            }
        };
        if EngineOptions::from(&config.engine) != *self.host.options() {
            tracing::info!("engine settings take effect after a restart");
        }
        let issues = self.host.set_config(&config.diagnostics);
        self.report_issues(&issues)
    }

    fn code_actions(&self, params: CodeActionParams) -> Vec<lsp_types::CodeActionOrCommand> {
        let uri = params.text_document.uri;
        let key = DocumentUri::new(uri.as_str());
        let Some(snapshot) = self.host.document(&key) else {
            return Vec::new();
        };
        let index = LineIndex::new(&snapshot.text);

        let mut actions = Vec::new();
        for published in params.context.diagnostics {
            let Some(diagnostic) = (&published).into_engine() else {
                continue;
            };
            match self.host.fixes_for(&key, &diagnostic) {
                Ok(fixes) => {
                    let preferred = fixes.len() == 1;
                    actions.extend(
                        fixes
                            .into_iter()
                            .map(|fix| code_action(fix, &uri, &index, published.clone(), preferred)),
                    );
                }
                Err(FixError::Stale { rule }) => {
                    tracing::debug!(%rule, "diagnostic is stale, no quick fix offered");
                }
                Err(error) => tracing::warn!(%error, "quick fix failed"),
            }
        }
        actions
    }

    fn document_symbols(&self, params: &DocumentSymbolParams) -> Option<DocumentSymbolResponse> {
        let key = DocumentUri::new(params.text_document.uri.as_str());
        let symbols = self.host.document_symbols(&key)?;
        Some(DocumentSymbolResponse::Nested(
            symbols.into_iter().map(IntoLsp::into_lsp).collect(),
        ))
    }

    fn publish(&self, publication: Publication) -> anyhow::Result<()> {
        let Some(document) = self.sessions.publishable(&publication.uri, publication.version) else {
            tracing::debug!(
                uri = %publication.uri,
                version = %publication.version,
                "dropping publication for a version the client no longer has"
            );
            return Ok(());
        };
        let diagnostics = publication.diagnostics.iter().map(IntoLsp::into_lsp).collect();
        self.send_diagnostics(document.uri.clone(), diagnostics, Some(document.client_version))
    }

    fn send_diagnostics(
        &self,
        uri: Uri,
        diagnostics: Vec<lsp_types::Diagnostic>,
        version: Option<i32>,
    ) -> anyhow::Result<()> {
        let params = PublishDiagnosticsParams {
            uri,
            diagnostics,
            version,
        };
        self.send(Message::Notification(Notification::new(
            PublishDiagnostics::METHOD.to_string(),
            params,
        )))
    }

    fn report_issues(&self, issues: &[ConfigIssue]) -> anyhow::Result<()> {
        for issue in issues {
            self.show_warning(issue.to_string())?;
        }
        Ok(())
    }

    fn show_warning(&self, message: String) -> anyhow::Result<()> {
        tracing::warn!(%message, "configuration problem");
        let params = ShowMessageParams {
            typ: MessageType::WARNING,
            message,
        };
        self.send(Message::Notification(Notification::new(
            ShowMessage::METHOD.to_string(),
            params,
        )))
    }

    fn send(&self, message: Message) -> anyhow::Result<()> {
        self.connection
            .sender
            .send(message)
            .context("failed to send message to the client")
    }
}

fn parse_params<P: DeserializeOwned>(params: serde_json::Value) -> serde_json::Result<P> {
    serde_json::from_value(params)
}

/// Decode notification params, logging malformed ones.
fn decode<P: DeserializeOwned>(method: &str, params: serde_json::Value) -> Option<P> {
    parse_params(params)
        .inspect_err(|error| tracing::warn!(%method, %error, "malformed notification"))
        .ok()
}

fn invalid_params(id: RequestId, error: &serde_json::Error) -> Response {
    Response::new_err(id, ErrorCode::InvalidParams as i32, error.to_string())
}

/// The first workspace folder, or the deprecated root URI.
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    #[allow(deprecated)]
    let uri = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())?;
    url::Url::parse(uri.as_str()).ok()?.to_file_path().ok()
}

fn discover_config(root: &std::path::Path) -> anyhow::Result<ServerConfig> {
    match find_config(root)? {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading configuration");
            Ok(load_config(&path)?)
        }
        None => Ok(ServerConfig::default()),
    }
}
