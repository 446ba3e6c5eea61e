//! One (document version, rule) unit of work.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bsl_linter::{ActiveRule, Diagnostic, RuleContext, RuleSet};
use bsl_syntax::{Parse, SyntaxProvider};
use bsl_types::{DocumentUri, DocumentVersion, FileScope};
use crossbeam_channel::Sender;

use crate::document::DocumentStore;

/// Identifies an analysis run: one fan-out of rules over one parse.
pub(crate) type RunId = u64;

/// Progress reports sent from pool threads back to the dispatcher.
pub(crate) enum Event {
    Parsed {
        uri: DocumentUri,
        version: DocumentVersion,
        parse: Parse,
    },
    Started {
        uri: DocumentUri,
        run: RunId,
        task: usize,
        at: Instant,
    },
    Finished {
        uri: DocumentUri,
        run: RunId,
        task: usize,
        diagnostics: Vec<Diagnostic>,
    },
}

/// Everything one rule evaluation needs, owned by the task.
///
/// The task holds its own references to the parse and the rule set, so
/// neither a new edit nor a configuration change can pull them away while
/// the rule runs.
pub(crate) struct Task {
    pub(crate) uri: DocumentUri,
    pub(crate) version: DocumentVersion,
    pub(crate) run: RunId,
    pub(crate) index: usize,
    pub(crate) parse: Parse,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) store: Arc<DocumentStore>,
    pub(crate) superseded: Arc<AtomicBool>,
    pub(crate) events: Sender<Event>,
}

impl Task {
    pub(crate) fn run(self) {
        let Some(rule) = self.rules.rules().get(self.index) else {
            return;
        };

        // Queued work for an older version is dropped without evaluating.
        if self.superseded.load(Ordering::Acquire) || !self.store.is_current(&self.uri, self.version)
        {
            tracing::debug!(uri = %self.uri, version = %self.version, rule = %rule.id, "skipping stale task");
            self.finish(Vec::new());
            return;
        }

        let _ = self.events.send(Event::Started {
            uri: self.uri.clone(),
            run: self.run,
            task: self.index,
            at: Instant::now(),
        });
        let diagnostics = evaluate(rule, &self.parse, FileScope::of_uri(&self.uri));
        self.finish(diagnostics);
    }

    fn finish(&self, diagnostics: Vec<Diagnostic>) {
        let _ = self.events.send(Event::Finished {
            uri: self.uri.clone(),
            run: self.run,
            task: self.index,
            diagnostics,
        });
    }
}

/// Run one rule, containing both returned errors and panics.
///
/// A failing rule yields exactly one internal-error diagnostic naming it.
pub fn evaluate(rule: &ActiveRule, parse: &Parse, file: FileScope) -> Vec<Diagnostic> {
    let ctx = RuleContext::new(&rule.id, rule.severity, &rule.params, parse, file);
    match catch_unwind(AssertUnwindSafe(|| rule.rule.evaluate(&ctx))) {
        Ok(Ok(diagnostics)) => diagnostics,
        Ok(Err(error)) => {
            tracing::warn!(rule = %rule.id, %error, "rule failed");
            vec![Diagnostic::internal_error(rule.id.clone(), error)]
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::warn!(rule = %rule.id, %reason, "rule panicked");
            vec![Diagnostic::internal_error(
                rule.id.clone(),
                format!("panicked: {reason}"),
            )]
        }
    }
}

/// Parse `text`, replacing a panicking provider with an empty degraded tree.
pub(crate) fn parse_contained(provider: &dyn SyntaxProvider, text: &str) -> Parse {
    catch_unwind(AssertUnwindSafe(|| provider.parse(text))).unwrap_or_else(|payload| {
        let reason = panic_message(payload.as_ref());
        tracing::warn!(%reason, "syntax provider panicked");
        Parse::failed(text, format!("Parser failed: {reason}"))
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsl_linter::{LintConfig, Rule, RuleDescriptor, RuleError, RuleRegistry};
    use bsl_types::DiagnosticSeverity;

    struct Behaving;
    struct Failing;
    struct Panicking;

    impl Rule for Behaving {
        fn descriptor(&self) -> RuleDescriptor {
            RuleDescriptor::new("Behaving", "ok", DiagnosticSeverity::Hint).always_applicable()
        }

        fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
            Ok(vec![ctx.diagnostic(bsl_types::OffsetRange::new(0, 1), "found")])
        }
    }

    impl Rule for Failing {
        fn descriptor(&self) -> RuleDescriptor {
            RuleDescriptor::new("Failing", "err", DiagnosticSeverity::Hint).always_applicable()
        }

        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
            Err(RuleError::Failed("no luck".into()))
        }
    }

    impl Rule for Panicking {
        fn descriptor(&self) -> RuleDescriptor {
            RuleDescriptor::new("Panicking", "panic", DiagnosticSeverity::Hint).always_applicable()
        }

        fn evaluate(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
            panic!("index out of bounds")
        }
    }

    struct PanickingProvider;

    impl SyntaxProvider for PanickingProvider {
        fn parse(&self, _text: &str) -> Parse {
            panic!("grammar exploded")
        }
    }

    fn rule_set() -> RuleSet {
        let registry = RuleRegistry::builder()
            .add(Arc::new(Behaving))
            .add(Arc::new(Failing))
            .add(Arc::new(Panicking))
            .build()
            .unwrap();
        RuleSet::resolve(&registry, &LintConfig::default()).0
    }

    fn run(id: &str) -> Vec<Diagnostic> {
        let rules = rule_set();
        let parse = bsl_syntax::parse("А = 1;");
        evaluate(rules.get(id).unwrap(), &parse, FileScope::Bsl)
    }

    #[test]
    fn test_findings_pass_through() {
        let diagnostics = run("Behaving");
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_internal_error());
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Hint);
    }

    #[test]
    fn test_rule_error_becomes_internal_error() {
        let diagnostics = run("Failing");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_internal_error());
        assert_eq!(diagnostics[0].message, "Rule 'Failing' failed: no luck");
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let diagnostics = run("Panicking");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Rule 'Panicking' failed: panicked: index out of bounds"
        );
    }

    #[test]
    fn test_panicking_provider_yields_degraded_parse() {
        let parse = parse_contained(&PanickingProvider, "А = 1;");
        assert!(parse.is_degraded());
        assert_eq!(parse.text(), "А = 1;");
        assert_eq!(parse.errors()[0].message, "Parser failed: grammar exploded");
    }
}
