//! Foundation types for the BSL analysis engine.
//!
//! This crate provides shared types used across the workspace.
//! It has zero external dependencies, making it suitable as a foundation layer.
//!
//! # Type Categories
//!
//! - **Document types**: [`DocumentUri`], [`DocumentVersion`], [`FileScope`]
//! - **Position types**: [`Position`], [`Range`], [`OffsetRange`]
//! - **Severity types**: [`DiagnosticSeverity`], [`RuleSeverity`]
//! - **Edit types**: [`TextEdit`], [`CodeFix`]

mod edits;
mod file;
mod position;
mod severity;

pub use edits::{CodeFix, TextEdit};
pub use file::{DocumentUri, DocumentVersion, FileScope};
pub use position::{OffsetRange, Position, Range};
pub use severity::{DiagnosticSeverity, RuleSeverity};
