//! # BSL Analysis
//!
//! The incremental analysis engine. [`AnalysisHost`] is the one context
//! object tying together the document store, the rule snapshot and the
//! scheduler's worker pool:
//!
//! ```rust,ignore
//! let host = AnalysisHost::new(registry, &LintConfig::default(), EngineOptions::default(), provider)?;
//! let uri = DocumentUri::new("file:///src/Module.bsl");
//! let version = host.open(&uri, "Процедура Тест()\nКонецПроцедуры");
//!
//! let publication = host.publications().recv()?;
//! assert_eq!(publication.version, version);
//! ```
//!
//! Edits never wait for analysis. Each change bumps the document version and
//! queues a work item; results computed for a version that has since been
//! superseded are dropped instead of published.

mod batch;
mod document;
mod merge;
mod quick_fix;
mod scheduler;
mod symbols;
mod task;

use std::sync::Arc;
use std::time::Duration;

use bsl_config::EngineConfig;
use bsl_linter::{ConfigIssue, Diagnostic, LintConfig, RegistryError, RuleRegistry, RuleSet};
use bsl_syntax::{BslSyntaxProvider, SyntaxProvider};
use bsl_types::{CodeFix, DocumentUri, DocumentVersion};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;

pub use batch::{analyze_batch, BatchError, BatchReport, FileReport, SeverityTotals};
pub use document::{DiagnosticSet, DocumentError, DocumentSnapshot, DocumentStore};
pub use merge::{compare, merge};
pub use quick_fix::FixError;
pub use symbols::{document_symbols, DocumentSymbol, SymbolKind};
pub use task::evaluate;

use quick_fix::QuickFixes;
use scheduler::{Scheduler, Shared};

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Threads evaluating rules, shared by all documents
    pub workers: usize,
    /// Soft deadline per rule evaluation
    pub task_timeout: Option<Duration>,
    /// Bound of the work item queue
    pub queue_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            workers: config.worker_count(),
            task_timeout: config.task_timeout(),
            queue_capacity: config.queue_capacity,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// The merged diagnostic set of one document version.
#[derive(Debug, Clone)]
pub struct Publication {
    pub uri: DocumentUri,
    pub version: DocumentVersion,
    pub diagnostics: Arc<[Diagnostic]>,
}

/// The analysis engine.
///
/// # Lifecycle
///
/// Construction builds the rule snapshot and starts the dispatcher thread
/// and worker pool. [`shutdown`](Self::shutdown) stops accepting work,
/// waits for in-flight rule evaluations and clears the document store.
/// Dropping the host does the same.
///
/// Rules that block (waiting on a channel, say) keep `shutdown` waiting
/// until they return.
pub struct AnalysisHost {
    store: Arc<DocumentStore>,
    registry: Arc<RuleRegistry>,
    rules: Arc<RwLock<Arc<RuleSet>>>,
    provider: Arc<dyn SyntaxProvider>,
    scheduler: Scheduler,
    publications: Receiver<Publication>,
    options: EngineOptions,
}

impl AnalysisHost {
    /// Start an engine over `registry`.
    ///
    /// Configuration problems are logged and the affected rules fall back
    /// to their defaults; use [`LintConfig::validate`] to report them.
    pub fn new(
        registry: Arc<RuleRegistry>,
        config: &LintConfig,
        options: EngineOptions,
        provider: Arc<dyn SyntaxProvider>,
    ) -> std::io::Result<Self> {
        let (rule_set, _) = RuleSet::resolve(&registry, config);
        let store = Arc::new(DocumentStore::new());
        let rules = Arc::new(RwLock::new(Arc::new(rule_set)));
        let (publish_tx, publish_rx) = crossbeam_channel::unbounded();

        let scheduler = Scheduler::start(
            Shared {
                store: Arc::clone(&store),
                rules: Arc::clone(&rules),
                provider: Arc::clone(&provider),
            },
            &options,
            publish_tx,
        )?;

        tracing::info!(
            rules = registry.len(),
            workers = options.workers,
            "analysis engine started"
        );
        Ok(Self {
            store,
            registry,
            rules,
            provider,
            scheduler,
            publications: publish_rx,
            options,
        })
    }

    /// An engine with the built-in rules, default configuration and parser.
    pub fn with_builtin_rules(options: EngineOptions) -> Result<Self, HostError> {
        let registry = Arc::new(RuleRegistry::builtin()?);
        Ok(Self::new(
            registry,
            &LintConfig::default(),
            options,
            Arc::new(BslSyntaxProvider),
        )?)
    }

    /// Open (or re-open) a document and queue it for analysis.
    pub fn open(&self, uri: &DocumentUri, text: &str) -> DocumentVersion {
        let version = self.store.open(uri, text);
        self.scheduler.enqueue(uri.clone(), version);
        version
    }

    /// Replace the text of an open document and queue reanalysis.
    ///
    /// Returns as soon as the new version is recorded.
    pub fn update(&self, uri: &DocumentUri, text: &str) -> Result<DocumentVersion, DocumentError> {
        let version = self.store.update(uri, text)?;
        self.scheduler.enqueue(uri.clone(), version);
        Ok(version)
    }

    /// Forget a document. Analysis still in flight for it is discarded.
    pub fn close(&self, uri: &DocumentUri) -> bool {
        self.store.close(uri)
    }

    #[must_use]
    pub fn document(&self, uri: &DocumentUri) -> Option<DocumentSnapshot> {
        self.store.get(uri)
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Merged results, one per successfully analyzed version.
    #[must_use]
    pub fn publications(&self) -> &Receiver<Publication> {
        &self.publications
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// The enabled-rule snapshot new runs will use.
    #[must_use]
    pub fn rule_set(&self) -> Arc<RuleSet> {
        Arc::clone(&*self.rules.read())
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Swap the rule configuration and reanalyze every open document.
    ///
    /// Runs already in flight finish with the snapshot they started with;
    /// their results are superseded by the reanalysis.
    #[tracing::instrument(skip_all)]
    pub fn set_config(&self, config: &LintConfig) -> Vec<ConfigIssue> {
        let (rule_set, issues) = RuleSet::resolve(&self.registry, config);
        *self.rules.write() = Arc::new(rule_set);

        let documents = self.store.versions();
        tracing::info!(documents = documents.len(), "configuration changed, reanalyzing");
        for (uri, version) in documents {
            self.scheduler.enqueue(uri, version);
        }
        issues
    }

    /// Outline of the document's current text.
    #[must_use]
    pub fn document_symbols(&self, uri: &DocumentUri) -> Option<Vec<DocumentSymbol>> {
        let snapshot = self.store.get(uri)?;
        let parse = snapshot
            .parse
            .unwrap_or_else(|| task::parse_contained(self.provider.as_ref(), &snapshot.text));
        Some(document_symbols(parse.tree()))
    }

    /// Quick fixes for a published diagnostic.
    ///
    /// Fails with [`FixError::Stale`] if the document changed under the
    /// diagnostic's range since it was published.
    pub fn fixes_for(
        &self,
        uri: &DocumentUri,
        diagnostic: &Diagnostic,
    ) -> Result<Vec<CodeFix>, FixError> {
        let rules = self.rule_set();
        QuickFixes {
            store: &self.store,
            registry: &self.registry,
            rules: &rules,
            provider: self.provider.as_ref(),
        }
        .fixes_for(uri, diagnostic)
    }

    /// Stop the engine: no new work is accepted, in-flight evaluations are
    /// awaited and all documents are dropped. Idempotent.
    pub fn shutdown(&mut self) {
        if self.scheduler.shutdown() {
            self.store.clear();
            tracing::info!("analysis engine stopped");
        }
    }
}

impl Drop for AnalysisHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Failure to start an engine.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to start the analysis dispatcher: {0}")]
    Spawn(#[from] std::io::Error),
}
