//! Rule metadata.
//!
//! A [`RuleDescriptor`] is declared once by each rule and frozen when the
//! registry is built. It carries everything the engine needs without
//! running the rule: identity, defaults, the parameter schema and the
//! construct filter used to skip rules that cannot match a tree.

use std::collections::BTreeMap;

use bsl_syntax::{NodeKind, SyntaxTree};
use bsl_types::{DiagnosticSeverity, FileScope};

use crate::diagnostics::RuleId;

/// Broad category of a rule's findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleKind {
    Error,
    #[default]
    CodeSmell,
    Vulnerability,
    SecurityHotspot,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::CodeSmell => write!(f, "code-smell"),
            Self::Vulnerability => write!(f, "vulnerability"),
            Self::SecurityHotspot => write!(f, "security-hotspot"),
        }
    }
}

/// Which trees a rule can possibly report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicability {
    /// Run on every tree (token or text based rules)
    Always,
    /// Run only if the tree contains at least one of these node kinds
    Constructs(Vec<NodeKind>),
}

impl Applicability {
    #[must_use]
    pub fn matches(&self, tree: &SyntaxTree) -> bool {
        match self {
            Self::Always => true,
            Self::Constructs(kinds) => kinds.iter().any(|kind| tree.contains(*kind)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Bool,
    Integer,
    Float,
    String,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    #[must_use]
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Integer(_) => ParamKind::Integer,
            Self::Float(_) => ParamKind::Float,
            Self::String(_) => ParamKind::String,
        }
    }

    /// Convert a configuration value to the declared kind.
    ///
    /// Integers are accepted where floats are expected; nothing else is coerced.
    #[must_use]
    pub fn from_json(kind: ParamKind, value: &serde_json::Value) -> Option<Self> {
        match kind {
            ParamKind::Bool => value.as_bool().map(Self::Bool),
            ParamKind::Integer => value.as_i64().map(Self::Integer),
            ParamKind::Float => value.as_f64().map(Self::Float),
            ParamKind::String => value.as_str().map(|s| Self::String(s.to_string())),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// One declared rule parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<ParamValue>,
    pub description: String,
}

impl ParameterSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamKind, default: Option<ParamValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ParamKind::Bool, Some(ParamValue::Bool(default)))
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, ParamKind::Integer, Some(ParamValue::Integer(default)))
    }

    #[must_use]
    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, ParamKind::Float, Some(ParamValue::Float(default)))
    }

    #[must_use]
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(
            name,
            ParamKind::String,
            Some(ParamValue::String(default.into())),
        )
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declared metadata of a rule. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDescriptor {
    pub id: RuleId,
    pub description: String,
    pub default_severity: DiagnosticSeverity,
    pub enabled_by_default: bool,
    pub kind: RuleKind,
    pub scope: FileScope,
    pub tags: Vec<String>,
    pub minutes_to_fix: u32,
    /// Whether the rule implements [`Rule::fix`](crate::Rule::fix)
    pub fixable: bool,
    pub params: Vec<ParameterSpec>,
    pub applicability: Applicability,
}

impl RuleDescriptor {
    /// Start a descriptor. Rules must still declare an applicability with
    /// [`always_applicable`](Self::always_applicable) or
    /// [`applies_to`](Self::applies_to) before the registry accepts them.
    #[must_use]
    pub fn new(
        id: impl Into<RuleId>,
        description: impl Into<String>,
        default_severity: DiagnosticSeverity,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            default_severity,
            enabled_by_default: true,
            kind: RuleKind::default(),
            scope: FileScope::All,
            tags: Vec::new(),
            minutes_to_fix: 1,
            fixable: false,
            params: Vec::new(),
            applicability: Applicability::Constructs(Vec::new()),
        }
    }

    #[must_use]
    pub fn disabled_by_default(mut self) -> Self {
        self.enabled_by_default = false;
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: RuleKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: FileScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn minutes_to_fix(mut self, minutes: u32) -> Self {
        self.minutes_to_fix = minutes;
        self
    }

    #[must_use]
    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParameterSpec) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn always_applicable(mut self) -> Self {
        self.applicability = Applicability::Always;
        self
    }

    #[must_use]
    pub fn applies_to(mut self, kinds: &[NodeKind]) -> Self {
        self.applicability = Applicability::Constructs(kinds.to_vec());
        self
    }

    /// Parameter defaults keyed by name.
    #[must_use]
    pub fn default_params(&self) -> RuleParams {
        RuleParams {
            values: self
                .params
                .iter()
                .filter_map(|p| Some((p.name.clone(), p.default.clone()?)))
                .collect(),
        }
    }

    /// Resolve configured `options` against the parameter schema.
    ///
    /// Unknown names and values of the wrong type are reported and the
    /// default is kept.
    #[must_use]
    pub fn resolve_params(&self, options: Option<&serde_json::Value>) -> (RuleParams, Vec<String>) {
        let mut params = self.default_params();
        let mut problems = Vec::new();

        let Some(options) = options else {
            return (params, problems);
        };
        let Some(map) = options.as_object() else {
            problems.push(format!("options for '{}' must be an object", self.id));
            return (params, problems);
        };

        for (name, value) in map {
            let Some(spec) = self.params.iter().find(|p| &p.name == name) else {
                problems.push(format!("'{}' has no parameter '{name}'", self.id));
                continue;
            };
            match ParamValue::from_json(spec.kind, value) {
                Some(value) => {
                    params.values.insert(name.clone(), value);
                }
                None => problems.push(format!(
                    "parameter '{name}' of '{}' expects a {}, got {value}",
                    self.id, spec.kind
                )),
            }
        }
        (params, problems)
    }
}

/// Resolved parameter values for one rule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleParams {
    values: BTreeMap<String, ParamValue>,
}

impl RuleParams {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> RuleDescriptor {
        RuleDescriptor::new("Sample", "sample rule", DiagnosticSeverity::Warning)
            .param(ParameterSpec::bool("strict", false))
            .param(ParameterSpec::integer("limit", 120))
            .param(ParameterSpec::float("ratio", 0.9))
            .param(ParameterSpec::string("words", "todo"))
            .always_applicable()
    }

    #[test]
    fn test_defaults_without_options() {
        let (params, problems) = descriptor().resolve_params(None);
        assert!(problems.is_empty());
        assert_eq!(params.bool("strict"), Some(false));
        assert_eq!(params.integer("limit"), Some(120));
        assert_eq!(params.string("words"), Some("todo"));
        assert_eq!(params.bool("missing"), None);
    }

    #[test]
    fn test_options_override_defaults() {
        let options = json!({ "strict": true, "limit": 80, "ratio": 1 });
        let (params, problems) = descriptor().resolve_params(Some(&options));
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(params.bool("strict"), Some(true));
        assert_eq!(params.integer("limit"), Some(80));
        assert_eq!(params.float("ratio"), Some(1.0));
    }

    #[test]
    fn test_bad_options_are_reported_and_defaults_kept() {
        let options = json!({ "strict": "yes", "unknown": 1 });
        let (params, problems) = descriptor().resolve_params(Some(&options));
        assert_eq!(params.bool("strict"), Some(false));
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("'Sample' has no parameter 'unknown'")));
        assert!(problems.iter().any(|p| p.contains("expects a bool")));
    }

    #[test]
    fn test_non_object_options() {
        let (_, problems) = descriptor().resolve_params(Some(&json!([1, 2])));
        assert_eq!(problems, vec!["options for 'Sample' must be an object"]);
    }

    #[test]
    fn test_applicability() {
        let tree = bsl_syntax::parse("А = \"x\";");
        assert!(Applicability::Always.matches(tree.tree()));
        assert!(Applicability::Constructs(vec![NodeKind::StringLiteral]).matches(tree.tree()));
        assert!(!Applicability::Constructs(vec![NodeKind::Procedure]).matches(tree.tree()));
        assert!(!Applicability::Constructs(vec![]).matches(tree.tree()));
    }
}
