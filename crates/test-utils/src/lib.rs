//! Shared test utilities for the BSL analysis crates.
//!
//! - [`fixtures`]: sample modules
//! - [`rules`]: rule doubles (keyword, failing, panicking, slow, gated)
//! - [`host`]: host builder and publication helpers
//! - [`tracking`]: what the engine actually executed, and in which order
//! - [`assertions`]: stable diagnostic rendering for snapshots

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

pub mod assertions;
pub mod fixtures;
pub mod host;
pub mod rules;
pub mod tracking;

pub use assertions::{format_diagnostic_messages, format_diagnostics, rule_ids};
pub use host::{
    await_version, drain_publications, publications_until, TestHost, PUBLICATION_TIMEOUT,
};
pub use rules::{FailingRule, FixableKeywordRule, Gate, GatedRule, KeywordRule, PanickingRule, SlowRule};
pub use tracking::{DelayedRule, EvaluationLog, TrackedProvider, TrackedRule};
