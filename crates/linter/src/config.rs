use std::collections::HashMap;

use bsl_types::{DiagnosticSeverity, RuleSeverity};
use serde::Deserialize;

use crate::descriptor::RuleDescriptor;
use crate::registry::RuleRegistry;

const PRESETS: &[&str] = &["recommended", "all"];

/// Configuration for a single rule
///
/// Supports multiple formats:
/// ```json
/// // Switch on with defaults, or off
/// "MissingSpace": true
///
/// // Severity override
/// "MissingSpace": "warn"
///
/// // Array: [severity, options]
/// "UsingHardcodePath": ["error", { "enableSearchNetworkAddresses": false }]
///
/// // Object with optional severity and options
/// "UsingServiceTag": { "severity": "info", "options": { "serviceTags": "todo" } }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum LintRuleConfig {
    Enabled(bool),
    Severity(RuleSeverity),
    Detailed {
        severity: Option<RuleSeverity>,
        options: Option<serde_json::Value>,
    },
}

impl LintRuleConfig {
    /// Explicit severity, if this configuration names one.
    ///
    /// `false` reads as `off`; `true` and option-only objects keep the
    /// rule's default severity.
    #[must_use]
    pub fn severity(&self) -> Option<RuleSeverity> {
        match self {
            Self::Enabled(false) => Some(RuleSeverity::Off),
            Self::Enabled(true) => None,
            Self::Severity(s) => Some(*s),
            Self::Detailed { severity, .. } => *severity,
        }
    }

    #[must_use]
    pub fn options(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Enabled(_) | Self::Severity(_) => None,
            Self::Detailed { options, .. } => options.as_ref(),
        }
    }
}

fn parse_severity<E: serde::de::Error>(value: &str) -> Result<RuleSeverity, E> {
    RuleSeverity::parse(value).ok_or_else(|| E::custom(format!("unknown severity: {value}")))
}

/// Custom deserializer for `LintRuleConfig` to handle booleans and the array syntax
impl<'de> Deserialize<'de> for LintRuleConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, SeqAccess, Visitor};

        struct LintRuleConfigVisitor;

        impl<'de> Visitor<'de> for LintRuleConfigVisitor {
            type Value = LintRuleConfig;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str(
                    "a boolean, \
                     a severity string ('off', 'hint', 'info', 'warn', 'error'), \
                     an array [severity, options], \
                     or an object { severity, options }",
                )
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(LintRuleConfig::Enabled(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                parse_severity(value).map(LintRuleConfig::Severity)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let severity: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &"array with severity"))?;
                let severity = parse_severity(&severity)?;
                let options: Option<serde_json::Value> = seq.next_element()?;

                Ok(LintRuleConfig::Detailed {
                    severity: Some(severity),
                    options,
                })
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct DetailedConfig {
                    #[serde(default)]
                    severity: Option<String>,
                    #[serde(default, alias = "parameters")]
                    options: Option<serde_json::Value>,
                }

                let config =
                    DetailedConfig::deserialize(de::value::MapAccessDeserializer::new(map))?;
                let severity = config
                    .severity
                    .as_deref()
                    .map(parse_severity)
                    .transpose()?;
                Ok(LintRuleConfig::Detailed {
                    severity,
                    options: config.options,
                })
            }
        }

        deserializer.deserialize_any(LintRuleConfigVisitor)
    }
}

/// Extends configuration - can be a single preset or multiple
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExtendsConfig {
    /// `"extends": "recommended"`
    Single(String),
    /// `"extends": ["recommended", "all"]`
    Multiple(Vec<String>),
}

impl ExtendsConfig {
    /// Get all presets as a vector (normalizes single to vec)
    #[must_use]
    pub fn presets(&self) -> Vec<&str> {
        match self {
            Self::Single(s) => vec![s.as_str()],
            Self::Multiple(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// Full configuration with optional extends and rules
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FullLintConfig {
    #[serde(default)]
    pub extends: Option<ExtendsConfig>,

    #[serde(default)]
    pub rules: HashMap<String, LintRuleConfig>,
}

/// Overall rule configuration
///
/// ```json
/// // Preset only
/// "diagnostics": "recommended"
///
/// // Preset with overrides
/// "diagnostics": {
///   "extends": "all",
///   "rules": { "UsingServiceTag": false }
/// }
/// ```
///
/// Without any preset, each rule follows its declared default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LintConfig {
    Preset(ExtendsConfig),
    Full(FullLintConfig),
}

impl Default for LintConfig {
    fn default() -> Self {
        Self::Full(FullLintConfig::default())
    }
}

/// One problem found while checking a configuration against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub rule: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl LintConfig {
    /// Configuration that enables every registered rule.
    #[must_use]
    pub fn all() -> Self {
        Self::Preset(ExtendsConfig::Single("all".to_string()))
    }

    #[must_use]
    pub fn recommended() -> Self {
        Self::Preset(ExtendsConfig::Single("recommended".to_string()))
    }

    fn parts(&self) -> (Option<&ExtendsConfig>, Option<&HashMap<String, LintRuleConfig>>) {
        match self {
            Self::Preset(presets) => (Some(presets), None),
            Self::Full(FullLintConfig { extends, rules }) => (extends.as_ref(), Some(rules)),
        }
    }

    #[must_use]
    pub fn rule_config(&self, rule_id: &str) -> Option<&LintRuleConfig> {
        self.parts().1?.get(rule_id)
    }

    /// Get the options for a rule (if configured)
    #[must_use]
    pub fn get_options(&self, rule_id: &str) -> Option<&serde_json::Value> {
        self.rule_config(rule_id).and_then(LintRuleConfig::options)
    }

    /// Effective severity of a rule, or `None` if the rule is switched off.
    ///
    /// Explicit rule settings win over presets; presets (later ones win)
    /// win over the rule's declared default.
    #[must_use]
    pub fn resolve(&self, descriptor: &RuleDescriptor) -> Option<DiagnosticSeverity> {
        let (extends, _) = self.parts();

        let mut enabled = descriptor.enabled_by_default;
        for preset in extends.map(ExtendsConfig::presets).unwrap_or_default() {
            match preset {
                "all" => enabled = true,
                "recommended" => enabled = descriptor.enabled_by_default,
                _ => {}
            }
        }

        match self.rule_config(descriptor.id.as_str()) {
            None if enabled => Some(descriptor.default_severity),
            None => None,
            Some(config) => match config.severity() {
                Some(severity) => severity.to_diagnostic_severity(),
                None => Some(descriptor.default_severity),
            },
        }
    }

    #[must_use]
    pub fn is_enabled(&self, descriptor: &RuleDescriptor) -> bool {
        self.resolve(descriptor).is_some()
    }

    /// Check this configuration against the available rules.
    ///
    /// Collects every problem instead of stopping at the first one.
    #[must_use]
    pub fn validate(&self, registry: &RuleRegistry) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let (extends, rules) = self.parts();

        for preset in extends.map(ExtendsConfig::presets).unwrap_or_default() {
            if !PRESETS.contains(&preset) {
                issues.push(ConfigIssue {
                    rule: None,
                    message: format!(
                        "Invalid preset name: '{preset}'. Valid presets are: {}",
                        PRESETS.join(", ")
                    ),
                });
            }
        }

        let mut names: Vec<&String> = rules.map(|r| r.keys().collect()).unwrap_or_default();
        names.sort();
        for name in names {
            let Some(descriptor) = registry.descriptor(name) else {
                let message = match suggest(name, registry.ids()) {
                    Some(candidate) => {
                        format!("Unknown rule '{name}'. Did you mean '{candidate}'?")
                    }
                    None => format!("Unknown rule '{name}'"),
                };
                issues.push(ConfigIssue {
                    rule: Some(name.clone()),
                    message,
                });
                continue;
            };
            let (_, problems) = descriptor.resolve_params(self.get_options(name));
            issues.extend(problems.into_iter().map(|message| ConfigIssue {
                rule: Some(name.clone()),
                message,
            }));
        }
        issues
    }

    /// Merge another config into this one (later settings win)
    #[must_use]
    pub fn merge(&self, override_config: &Self) -> Self {
        match (self, override_config) {
            (_, Self::Preset(name)) => Self::Preset(name.clone()),

            (
                base,
                Self::Full(FullLintConfig {
                    extends: None,
                    rules,
                }),
            ) if rules.is_empty() => base.clone(),

            (
                Self::Full(FullLintConfig {
                    extends: base_ext,
                    rules: base_rules,
                }),
                Self::Full(FullLintConfig {
                    extends: override_ext,
                    rules: override_rules,
                }),
            ) => {
                let mut merged_rules = base_rules.clone();
                merged_rules.extend(override_rules.clone());
                Self::Full(FullLintConfig {
                    extends: override_ext.clone().or_else(|| base_ext.clone()),
                    rules: merged_rules,
                })
            }

            (
                Self::Preset(presets),
                Self::Full(FullLintConfig {
                    extends: override_ext,
                    rules: override_rules,
                }),
            ) => Self::Full(FullLintConfig {
                extends: override_ext.clone().or_else(|| Some(presets.clone())),
                rules: override_rules.clone(),
            }),
        }
    }
}

/// Closest known rule id, if any is similar enough.
fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|candidate| (candidate, strsim::jaro_winkler(name, candidate)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}
