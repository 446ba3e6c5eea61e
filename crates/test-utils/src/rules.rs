//! Rule doubles for engine tests.
//!
//! Each double is a real [`Rule`] with a configurable id, so tests can
//! register as many of them as they need.

use std::sync::Arc;
use std::time::Duration;

use bsl_linter::prelude::*;
use crossbeam_channel::{Receiver, Sender};

fn descriptor(id: &str, severity: DiagnosticSeverity) -> RuleDescriptor {
    RuleDescriptor::new(id, "test rule", severity).always_applicable()
}

/// Reports every occurrence of a word in the text.
pub struct KeywordRule {
    id: String,
    word: String,
    severity: DiagnosticSeverity,
}

impl KeywordRule {
    #[must_use]
    pub fn new(id: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            word: word.into(),
            severity: DiagnosticSeverity::Warning,
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: DiagnosticSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// A fixable variant replacing the word with `replacement`.
    #[must_use]
    pub fn fixable(self, replacement: impl Into<String>) -> FixableKeywordRule {
        FixableKeywordRule {
            inner: self,
            replacement: replacement.into(),
        }
    }

    fn find(&self, ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
        ctx.text()
            .match_indices(&self.word)
            .map(|(start, word)| {
                ctx.diagnostic(
                    OffsetRange::new(start, start + word.len()),
                    format!("Found '{word}'"),
                )
            })
            .collect()
    }
}

impl Rule for KeywordRule {
    fn descriptor(&self) -> RuleDescriptor {
        descriptor(&self.id, self.severity)
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        Ok(self.find(ctx))
    }
}

/// [`KeywordRule`] with a quick fix.
pub struct FixableKeywordRule {
    inner: KeywordRule,
    replacement: String,
}

impl Rule for FixableKeywordRule {
    fn descriptor(&self) -> RuleDescriptor {
        self.inner.descriptor().fixable()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        Ok(self.inner.find(ctx))
    }

    fn fix(&self, _diagnostic: &Diagnostic, ctx: &FixContext<'_>) -> Result<Vec<CodeFix>, RuleError> {
        let range = ctx.range();
        Ok(vec![CodeFix::replace(
            format!("Replace with '{}'", self.replacement),
            range.start,
            range.end,
            self.replacement.clone(),
        )])
    }
}

/// Returns an error on every evaluation.
pub struct FailingRule {
    id: String,
}

impl FailingRule {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Rule for FailingRule {
    fn descriptor(&self) -> RuleDescriptor {
        descriptor(&self.id, DiagnosticSeverity::Warning)
    }

    fn evaluate(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        Err(RuleError::Failed("always fails".into()))
    }
}

/// Panics on every evaluation.
pub struct PanickingRule {
    id: String,
}

impl PanickingRule {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Rule for PanickingRule {
    fn descriptor(&self) -> RuleDescriptor {
        descriptor(&self.id, DiagnosticSeverity::Warning)
    }

    fn evaluate(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        panic!("rule {} exploded", self.id)
    }
}

/// Sleeps before reporting nothing.
pub struct SlowRule {
    id: String,
    delay: Duration,
}

impl SlowRule {
    #[must_use]
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
        }
    }
}

impl Rule for SlowRule {
    fn descriptor(&self) -> RuleDescriptor {
        descriptor(&self.id, DiagnosticSeverity::Hint)
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        std::thread::sleep(self.delay);
        Ok(vec![ctx.diagnostic(OffsetRange::at(0), "Slow rule finished")])
    }
}

/// Upper bound on how long a [`GatedRule`] blocks, so a failing test
/// cannot hang the pool forever.
const MAX_BLOCK: Duration = Duration::from_secs(30);

/// Blocks every evaluation until its [`Gate`] is released.
///
/// Evaluations report the text they saw, so tests can tell versions apart.
pub struct GatedRule {
    id: String,
    release: Receiver<()>,
    entered: Sender<()>,
}

/// Controls a [`GatedRule`].
///
/// Dropping the gate releases every blocked and future evaluation.
pub struct Gate {
    release: Option<Sender<()>>,
    entered: Receiver<()>,
}

impl GatedRule {
    #[must_use]
    pub fn new(id: impl Into<String>) -> (Arc<Self>, Gate) {
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let rule = Arc::new(Self {
            id: id.into(),
            release: release_rx,
            entered: entered_tx,
        });
        let gate = Gate {
            release: Some(release_tx),
            entered: entered_rx,
        };
        (rule, gate)
    }
}

impl Rule for GatedRule {
    fn descriptor(&self) -> RuleDescriptor {
        descriptor(&self.id, DiagnosticSeverity::Information)
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        let _ = self.entered.send(());
        // Nothing is ever sent; this returns once the gate is dropped
        let _ = self.release.recv_timeout(MAX_BLOCK);
        Ok(vec![ctx.diagnostic(
            OffsetRange::at(0),
            format!("Saw: {}", ctx.text()),
        )])
    }
}

impl Gate {
    /// Wait until an evaluation is blocked on this gate.
    #[must_use]
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    /// Let every evaluation through.
    pub fn release(&mut self) {
        self.release.take();
    }
}
