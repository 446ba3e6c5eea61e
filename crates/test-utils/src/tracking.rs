//! Execution tracking for engine tests.
//!
//! Wrap rules with [`TrackedRule`] and the parser with [`TrackedProvider`]
//! to observe what the engine actually ran, e.g. that a rule whose
//! construct filter does not match was skipped, or that reanalysis after a
//! configuration change reused the cached parse.
//!
//! ```ignore
//! let log = EvaluationLog::new();
//! let rule = TrackedRule::wrap(Arc::new(KeywordRule::new("R1", "Foo")), &log);
//!
//! let checkpoint = log.checkpoint();
//! host.open(&uri, "Foo");
//! await_version(&host, &uri, version);
//! assert_eq!(log.count_since("R1", checkpoint), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bsl_linter::{Diagnostic, FixContext, Rule, RuleContext, RuleDescriptor, RuleError};
use bsl_syntax::{Parse, SyntaxProvider};
use bsl_types::CodeFix;
use parking_lot::Mutex;

/// Key under which [`TrackedProvider`] records parses.
pub const PARSE: &str = "parse";

#[derive(Default)]
struct Log {
    executions: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Log {
    fn record(&mut self, name: &str) {
        self.executions.push(name.to_string());
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
    }

    fn count_since(&self, name: &str, checkpoint: usize) -> usize {
        self.executions
            .get(checkpoint..)
            .unwrap_or_default()
            .iter()
            .filter(|n| n.as_str() == name)
            .count()
    }
}

/// Shared record of rule evaluations and parses.
///
/// [`TrackedRule`] and [`TrackedProvider`] record when a call begins,
/// [`DelayedRule`] when its evaluation finishes.
///
/// Each test builds its own log, so parallel tests do not interfere.
#[derive(Clone, Default)]
pub struct EvaluationLog {
    inner: Arc<Mutex<Log>>,
}

impl EvaluationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str) {
        self.inner.lock().record(name);
    }

    /// Current log position, for later comparison.
    #[must_use]
    pub fn checkpoint(&self) -> usize {
        self.inner.lock().executions.len()
    }

    /// Executions of `name` since `checkpoint`.
    #[must_use]
    pub fn count_since(&self, name: &str, checkpoint: usize) -> usize {
        self.inner.lock().count_since(name, checkpoint)
    }

    #[must_use]
    pub fn executions_since(&self, checkpoint: usize) -> Vec<String> {
        self.inner
            .lock()
            .executions
            .get(checkpoint..)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn total_count(&self, name: &str) -> usize {
        self.inner.lock().counts.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&self) {
        let mut log = self.inner.lock();
        log.executions.clear();
        log.counts.clear();
    }
}

/// A rule that records each evaluation under its id, then delegates.
pub struct TrackedRule {
    inner: Arc<dyn Rule>,
    id: String,
    log: EvaluationLog,
}

impl TrackedRule {
    #[must_use]
    pub fn wrap(inner: Arc<dyn Rule>, log: &EvaluationLog) -> Arc<Self> {
        let id = inner.descriptor().id.to_string();
        Arc::new(Self {
            inner,
            id,
            log: log.clone(),
        })
    }
}

impl Rule for TrackedRule {
    fn descriptor(&self) -> RuleDescriptor {
        self.inner.descriptor()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        self.log.record(&self.id);
        self.inner.evaluate(ctx)
    }

    fn fix(&self, diagnostic: &Diagnostic, ctx: &FixContext<'_>) -> Result<Vec<CodeFix>, RuleError> {
        self.inner.fix(diagnostic, ctx)
    }
}

/// A rule that sleeps, delegates, then records its id once finished.
///
/// Giving sibling rules different delays fixes the order in which their
/// results reach the scheduler.
pub struct DelayedRule {
    inner: Arc<dyn Rule>,
    id: String,
    delay: Duration,
    log: EvaluationLog,
}

impl DelayedRule {
    #[must_use]
    pub fn wrap(inner: Arc<dyn Rule>, delay: Duration, log: &EvaluationLog) -> Arc<Self> {
        let id = inner.descriptor().id.to_string();
        Arc::new(Self {
            inner,
            id,
            delay,
            log: log.clone(),
        })
    }
}

impl Rule for DelayedRule {
    fn descriptor(&self) -> RuleDescriptor {
        self.inner.descriptor()
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        std::thread::sleep(self.delay);
        let result = self.inner.evaluate(ctx);
        self.log.record(&self.id);
        result
    }
}

/// The built-in parser, recording each call under [`PARSE`].
pub struct TrackedProvider {
    log: EvaluationLog,
}

impl TrackedProvider {
    #[must_use]
    pub fn new(log: &EvaluationLog) -> Arc<Self> {
        Arc::new(Self { log: log.clone() })
    }
}

impl SyntaxProvider for TrackedProvider {
    fn parse(&self, text: &str) -> Parse {
        self.log.record(PARSE);
        bsl_syntax::parse(text)
    }
}
