//! Registry of all available rules.
//!
//! Built once at startup, validated, then frozen. The registry is shared by
//! reference (behind an `Arc`) with every analysis task and needs no locking.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use crate::descriptor::{Applicability, RuleDescriptor};
use crate::diagnostics::RuleId;
use crate::rules::{
    CommentedCodeRuleImpl, MissingSpaceRuleImpl, ParseErrorRuleImpl, UsingHardcodePathRuleImpl,
    UsingServiceTagRuleImpl, UsingThisFormRuleImpl,
};
use crate::traits::Rule;

/// Lazily initialized built-in rules.
/// Rules are created once and reused across all registries.
static BUILTIN_RULES: LazyLock<Vec<Arc<dyn Rule>>> = LazyLock::new(|| {
    vec![
        Arc::new(ParseErrorRuleImpl),
        Arc::new(CommentedCodeRuleImpl),
        Arc::new(MissingSpaceRuleImpl),
        Arc::new(UsingHardcodePathRuleImpl),
        Arc::new(UsingServiceTagRuleImpl),
        Arc::new(UsingThisFormRuleImpl),
    ]
});

#[must_use]
pub fn builtin_rules() -> &'static [Arc<dyn Rule>] {
    &BUILTIN_RULES
}

/// A malformed rule catalogue. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("rule id must not be empty")]
    EmptyId,
    #[error("duplicate rule id '{0}'")]
    DuplicateId(RuleId),
    #[error("rule '{rule}' declares parameter '{param}' twice")]
    DuplicateParameter { rule: RuleId, param: String },
    #[error("parameter '{param}' of rule '{rule}' has no default")]
    MissingDefault { rule: RuleId, param: String },
    #[error("default of parameter '{param}' of rule '{rule}' is a {found}, declared {expected}")]
    DefaultTypeMismatch {
        rule: RuleId,
        param: String,
        expected: crate::ParamKind,
        found: crate::ParamKind,
    },
    #[error("rule '{0}' declares no applicable constructs and does not opt into always running")]
    NoApplicability(RuleId),
}

/// A rule and its frozen descriptor.
#[derive(Clone)]
pub struct RegisteredRule {
    pub descriptor: RuleDescriptor,
    pub rule: Arc<dyn Rule>,
}

impl std::fmt::Debug for RegisteredRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredRule")
            .field("id", &self.descriptor.id)
            .finish_non_exhaustive()
    }
}

/// Collects rules before validation.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<RegisteredRule>,
}

impl RegistryBuilder {
    /// Register `rule` under an explicit descriptor.
    #[must_use]
    pub fn register(mut self, descriptor: RuleDescriptor, rule: Arc<dyn Rule>) -> Self {
        self.entries.push(RegisteredRule { descriptor, rule });
        self
    }

    /// Register `rule` under its own declared descriptor.
    #[must_use]
    pub fn add(self, rule: Arc<dyn Rule>) -> Self {
        let descriptor = rule.descriptor();
        self.register(descriptor, rule)
    }

    #[must_use]
    pub fn with_builtin_rules(self) -> Self {
        builtin_rules()
            .iter()
            .fold(self, |builder, rule| builder.add(Arc::clone(rule)))
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<RuleRegistry, RegistryError> {
        let mut entries = self.entries;
        for entry in &entries {
            validate(&entry.descriptor)?;
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.descriptor.id.clone()) {
                return Err(RegistryError::DuplicateId(entry.descriptor.id.clone()));
            }
        }

        entries.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.descriptor.id.clone(), i))
            .collect();

        tracing::debug!(rules = entries.len(), "rule registry built");
        Ok(RuleRegistry { entries, index })
    }
}

fn validate(descriptor: &RuleDescriptor) -> Result<(), RegistryError> {
    let rule = &descriptor.id;
    if rule.as_str().is_empty() {
        return Err(RegistryError::EmptyId);
    }
    if matches!(&descriptor.applicability, Applicability::Constructs(kinds) if kinds.is_empty()) {
        return Err(RegistryError::NoApplicability(rule.clone()));
    }

    let mut names = HashSet::new();
    for param in &descriptor.params {
        if !names.insert(param.name.as_str()) {
            return Err(RegistryError::DuplicateParameter {
                rule: rule.clone(),
                param: param.name.clone(),
            });
        }
        let Some(default) = &param.default else {
            return Err(RegistryError::MissingDefault {
                rule: rule.clone(),
                param: param.name.clone(),
            });
        };
        if default.kind() != param.kind {
            return Err(RegistryError::DefaultTypeMismatch {
                rule: rule.clone(),
                param: param.name.clone(),
                expected: param.kind,
                found: default.kind(),
            });
        }
    }
    Ok(())
}

/// The immutable, validated rule catalogue.
#[derive(Debug)]
pub struct RuleRegistry {
    /// Sorted by rule id
    entries: Vec<RegisteredRule>,
    index: HashMap<RuleId, usize>,
}

impl RuleRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The registry of built-in rules.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::builder().with_builtin_rules().build()
    }

    /// Descriptors ordered by rule id.
    pub fn all(&self) -> impl Iterator<Item = &RuleDescriptor> + '_ {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    #[must_use]
    pub fn entries(&self) -> &[RegisteredRule] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegisteredRule> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// The evaluator registered under `id`.
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.get(id).map(|entry| &entry.rule)
    }

    #[must_use]
    pub fn descriptor(&self, id: &str) -> Option<&RuleDescriptor> {
        self.get(id).map(|entry| &entry.descriptor)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.descriptor.id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
