//! The enabled-rule snapshot.
//!
//! A [`RuleSet`] is the registry filtered and parameterized by one
//! configuration. Analysis runs take an `Arc<RuleSet>` when they start, so a
//! configuration change never alters a run that is already in flight.

use std::collections::HashMap;
use std::sync::Arc;

use bsl_syntax::SyntaxTree;
use bsl_types::{DiagnosticSeverity, FileScope};

use crate::config::{ConfigIssue, LintConfig};
use crate::descriptor::{Applicability, RuleParams};
use crate::diagnostics::RuleId;
use crate::registry::RuleRegistry;
use crate::traits::Rule;

/// A rule enabled by the configuration, with its resolved settings.
#[derive(Clone)]
pub struct ActiveRule {
    pub id: RuleId,
    pub rule: Arc<dyn Rule>,
    pub severity: DiagnosticSeverity,
    pub params: Arc<RuleParams>,
    pub applicability: Applicability,
    pub scope: FileScope,
    pub fixable: bool,
}

impl ActiveRule {
    /// Whether this rule should run on `tree` from a file of kind `file`.
    #[must_use]
    pub fn applies(&self, tree: &SyntaxTree, file: FileScope) -> bool {
        self.scope.applies_to(file) && self.applicability.matches(tree)
    }
}

impl std::fmt::Debug for ActiveRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct RuleSet {
    /// Ordered by rule id
    rules: Vec<ActiveRule>,
    index: HashMap<RuleId, usize>,
}

impl RuleSet {
    /// Resolve `config` against `registry`.
    ///
    /// Problems in the configuration are returned alongside the snapshot;
    /// the affected rules fall back to their defaults.
    #[must_use]
    pub fn resolve(registry: &RuleRegistry, config: &LintConfig) -> (Self, Vec<ConfigIssue>) {
        let issues = config.validate(registry);
        for issue in &issues {
            tracing::warn!(rule = ?issue.rule, "{}", issue.message);
        }

        let rules: Vec<ActiveRule> = registry
            .entries()
            .iter()
            .filter_map(|entry| {
                let descriptor = &entry.descriptor;
                let severity = config.resolve(descriptor)?;
                let (params, _) = descriptor.resolve_params(config.get_options(descriptor.id.as_str()));
                Some(ActiveRule {
                    id: descriptor.id.clone(),
                    rule: Arc::clone(&entry.rule),
                    severity,
                    params: Arc::new(params),
                    applicability: descriptor.applicability.clone(),
                    scope: descriptor.scope,
                    fixable: descriptor.fixable,
                })
            })
            .collect();

        let index = rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.id.clone(), i))
            .collect();

        tracing::debug!(
            enabled = rules.len(),
            available = registry.len(),
            "rule set resolved"
        );
        (Self { rules, index }, issues)
    }

    #[must_use]
    pub fn rules(&self) -> &[ActiveRule] {
        &self.rules
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ActiveRule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// Enabled rules that can report on `tree`.
    pub fn applicable<'a>(
        &'a self,
        tree: &'a SyntaxTree,
        file: FileScope,
    ) -> impl Iterator<Item = &'a ActiveRule> + 'a {
        self.rules.iter().filter(move |rule| rule.applies(tree, file))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
