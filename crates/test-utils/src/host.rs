//! Building hosts over custom rule sets and waiting for their results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bsl_analysis::{AnalysisHost, EngineOptions, Publication};
use bsl_linter::{LintConfig, Rule, RuleRegistry};
use bsl_syntax::{BslSyntaxProvider, SyntaxProvider};
use bsl_types::{DocumentUri, DocumentVersion};

/// How long helpers wait for a publication before failing the test.
pub const PUBLICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for an [`AnalysisHost`] in tests.
pub struct TestHost {
    rules: Vec<Arc<dyn Rule>>,
    builtin: bool,
    config: LintConfig,
    options: EngineOptions,
    provider: Arc<dyn SyntaxProvider>,
}

impl Default for TestHost {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            builtin: false,
            config: LintConfig::default(),
            options: EngineOptions::default().with_workers(4),
            provider: Arc::new(BslSyntaxProvider),
        }
    }
}

impl TestHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn rules(mut self, rules: impl IntoIterator<Item = Arc<dyn Rule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    #[must_use]
    pub fn with_builtin_rules(mut self) -> Self {
        self.builtin = true;
        self
    }

    #[must_use]
    pub fn config(mut self, config: LintConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn SyntaxProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Build the registry and start the host. Panics on invalid setups.
    #[must_use]
    pub fn build(self) -> AnalysisHost {
        let mut builder = RuleRegistry::builder();
        if self.builtin {
            builder = builder.with_builtin_rules();
        }
        for rule in self.rules {
            builder = builder.add(rule);
        }
        let registry = builder.build().expect("test registry should be valid");
        AnalysisHost::new(Arc::new(registry), &self.config, self.options, self.provider)
            .expect("analysis host should start")
    }
}

/// Wait for the publication of exactly `version` of `uri`.
///
/// Publications for other documents or versions are skipped. Panics after
/// [`PUBLICATION_TIMEOUT`].
#[must_use]
pub fn await_version(host: &AnalysisHost, uri: &DocumentUri, version: DocumentVersion) -> Publication {
    let deadline = Instant::now() + PUBLICATION_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let publication = host
            .publications()
            .recv_timeout(remaining)
            .unwrap_or_else(|_| panic!("no publication for {uri} {version}"));
        if &publication.uri == uri && publication.version == version {
            return publication;
        }
    }
}

/// Every publication for `uri`, up to and including the one for `version`.
///
/// Unlike [`await_version`], earlier versions are kept, so tests can assert
/// that nothing was published before the expected version. Panics after
/// [`PUBLICATION_TIMEOUT`].
#[must_use]
pub fn publications_until(
    host: &AnalysisHost,
    uri: &DocumentUri,
    version: DocumentVersion,
) -> Vec<Publication> {
    let deadline = Instant::now() + PUBLICATION_TIMEOUT;
    let mut publications = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let publication = host
            .publications()
            .recv_timeout(remaining)
            .unwrap_or_else(|_| panic!("no publication for {uri} {version}, got {publications:?}"));
        if &publication.uri != uri {
            continue;
        }
        let done = publication.version == version;
        publications.push(publication);
        if done {
            return publications;
        }
    }
}

/// Collect publications until none arrives for `quiet`.
#[must_use]
pub fn drain_publications(host: &AnalysisHost, quiet: Duration) -> Vec<Publication> {
    let mut publications = Vec::new();
    while let Ok(publication) = host.publications().recv_timeout(quiet) {
        publications.push(publication);
    }
    publications
}
