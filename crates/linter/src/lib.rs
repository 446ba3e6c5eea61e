//! # BSL Linter
//!
//! The rule side of the analysis engine: the [`Rule`] plugin contract, the
//! validated [`RuleRegistry`], rule configuration and the built-in rules.
//!
//! Rules are pure functions of a parsed document and their resolved
//! parameters. The engine decides which rules run, in which order and on
//! which thread; nothing in this crate does I/O or keeps state between
//! calls.

mod config;
mod descriptor;
mod diagnostics;
mod registry;
mod rule_set;
mod rules;
mod traits;

pub use config::{ConfigIssue, ExtendsConfig, FullLintConfig, LintConfig, LintRuleConfig};
pub use descriptor::{
    Applicability, ParamKind, ParamValue, ParameterSpec, RuleDescriptor, RuleKind, RuleParams,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, RuleId};
pub use registry::{builtin_rules, RegisteredRule, RegistryBuilder, RegistryError, RuleRegistry};
pub use rule_set::{ActiveRule, RuleSet};
pub use traits::{FixContext, Rule, RuleContext, RuleError};

/// Commonly used types for writing rules.
///
/// ```rust,ignore
/// use bsl_linter::prelude::*;
/// ```
pub mod prelude {
    pub use crate::descriptor::{ParameterSpec, RuleDescriptor, RuleKind};
    pub use crate::diagnostics::{Diagnostic, RuleId};
    pub use crate::traits::{FixContext, Rule, RuleContext, RuleError};
    pub use bsl_syntax::NodeKind;
    pub use bsl_types::{CodeFix, DiagnosticSeverity, OffsetRange, TextEdit};
}
