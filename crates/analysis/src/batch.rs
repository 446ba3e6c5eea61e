//! Whole-project analysis without a persistent session.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bsl_linter::Diagnostic;
use bsl_types::{DiagnosticSeverity, DocumentUri, DocumentVersion};

use crate::AnalysisHost;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("analysis engine stopped before '{0}' was analyzed")]
    EngineStopped(DocumentUri),
}

/// Diagnostics of one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub uri: DocumentUri,
    pub version: DocumentVersion,
    pub diagnostics: Arc<[Diagnostic]>,
}

/// Diagnostic counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityTotals {
    pub errors: usize,
    pub warnings: usize,
    pub information: usize,
    pub hints: usize,
    /// Rules that failed or timed out (also counted in `errors`)
    pub internal_errors: usize,
}

impl SeverityTotals {
    fn add(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Error => self.errors += 1,
            DiagnosticSeverity::Warning => self.warnings += 1,
            DiagnosticSeverity::Information => self.information += 1,
            DiagnosticSeverity::Hint => self.hints += 1,
        }
        if diagnostic.is_internal_error() {
            self.internal_errors += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.information + self.hints
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Ordered by URI
    pub files: Vec<FileReport>,
    pub totals: SeverityTotals,
}

impl BatchReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0
    }

    /// Combine two reports over disjoint file sets.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        let files: BTreeMap<_, _> = self
            .files
            .into_iter()
            .chain(other.files)
            .map(|file| (file.uri.clone(), file))
            .collect();
        Self::from_files(files.into_values())
    }

    fn from_files(files: impl IntoIterator<Item = FileReport>) -> Self {
        let mut files: Vec<FileReport> = files.into_iter().collect();
        files.sort_by(|a, b| a.uri.cmp(&b.uri));
        let mut totals = SeverityTotals::default();
        for diagnostic in files.iter().flat_map(|file| file.diagnostics.iter()) {
            totals.add(diagnostic);
        }
        Self { files, totals }
    }
}

/// Analyze `files` with `host` and collect one result per file.
///
/// Files are opened in chunks no larger than the work queue, each chunk is
/// awaited and closed before the next one starts. The host must not be
/// shared with an interactive session while this runs, since it consumes
/// the host's publications.
#[tracing::instrument(skip_all, fields(files = files.len()))]
pub fn analyze_batch(
    host: &AnalysisHost,
    files: Vec<(DocumentUri, String)>,
) -> Result<BatchReport, BatchError> {
    let chunk_size = host.options().queue_capacity.max(1);
    let mut reports = Vec::with_capacity(files.len());

    for chunk in files.chunks(chunk_size) {
        let mut waiting: HashMap<DocumentUri, DocumentVersion> = chunk
            .iter()
            .map(|(uri, text)| (uri.clone(), host.open(uri, text)))
            .collect();

        while !waiting.is_empty() {
            let Ok(publication) = host.publications().recv() else {
                let uri = waiting.keys().min().cloned().unwrap_or_else(|| DocumentUri::new(""));
                return Err(BatchError::EngineStopped(uri));
            };
            if waiting.get(&publication.uri) != Some(&publication.version) {
                continue;
            }
            waiting.remove(&publication.uri);
            host.close(&publication.uri);
            reports.push(FileReport {
                uri: publication.uri,
                version: publication.version,
                diagnostics: publication.diagnostics,
            });
        }
    }

    let report = BatchReport::from_files(reports);
    tracing::info!(
        files = report.files.len(),
        errors = report.totals.errors,
        warnings = report.totals.warnings,
        "batch analysis finished"
    );
    Ok(report)
}
