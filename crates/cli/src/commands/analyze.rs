//! `bsl analyze`: one-shot analysis of a source tree.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use bsl_analysis::{analyze_batch, AnalysisHost, BatchReport, EngineOptions, SeverityTotals};
use bsl_linter::Diagnostic;
use bsl_syntax::BslSyntaxProvider;
use bsl_types::{DiagnosticSeverity, DocumentUri};
use colored::Colorize;
use serde::Serialize;
use walkdir::WalkDir;

use crate::commands::{print_config_issues, CommandContext};
use crate::exit_code::ExitCode;
use crate::{progress, OutputFormat, OutputOptions};

/// Extensions of BSL sources: configuration modules and OneScript files.
const SOURCE_EXTENSIONS: &[&str] = &["bsl", "os"];

pub fn run(
    path: Option<PathBuf>,
    config_path: Option<&Path>,
    format: OutputFormat,
    output: OutputOptions,
) -> Result<ExitCode> {
    let start_time = Instant::now();
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    if !root.exists() {
        bail!("Path not found: {}", root.display());
    }
    let start_dir = if root.is_file() {
        root.parent().unwrap_or_else(|| Path::new("."))
    } else {
        root.as_path()
    };

    let ctx = CommandContext::load(config_path, start_dir)?;
    let issues = ctx.validate();
    if !issues.is_empty() {
        print_config_issues(&ctx.source(), &issues);
        return Ok(ExitCode::ConfigError);
    }
    tracing::info!(config = %ctx.source(), "Configuration loaded");

    let sources = collect_sources(&root)?;
    let mut paths = HashMap::with_capacity(sources.len());
    let mut files = Vec::with_capacity(sources.len());
    for path in sources {
        let text = read_source(&path)?;
        let uri = DocumentUri::from_path(&path);
        files.push((uri.clone(), text));
        paths.insert(uri, path);
    }
    let file_count = files.len();

    let human = matches!(format, OutputFormat::Human);
    let spinner = if human {
        progress::spinner(&format!("Analyzing {file_count} file(s)..."), output)
    } else {
        None
    };

    let CommandContext {
        config, registry, ..
    } = ctx;
    let mut host = AnalysisHost::new(
        Arc::new(registry),
        &config.diagnostics,
        EngineOptions::from(&config.engine),
        Arc::new(BslSyntaxProvider),
    )?;
    let analysis_start = Instant::now();
    let report = analyze_batch(&host, files);
    host.shutdown();
    let report = report?;
    let analysis_duration = analysis_start.elapsed();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Human => {
            print_human(&report, &paths);
            if output.show_info {
                print_summary(&report.totals, file_count);
                println!(
                    "  {} analysis: {:.2}s, total: {:.2}s",
                    "⏱".dimmed(),
                    analysis_duration.as_secs_f64(),
                    start_time.elapsed().as_secs_f64()
                );
            }
        }
        OutputFormat::Json => {
            let json = JsonReport::new(&report, &paths, file_count);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(if report.has_errors() {
        ExitCode::DiagnosticsError
    } else {
        ExitCode::Success
    })
}

/// BSL sources under `root`, sorted by path. A file root is taken as is.
fn collect_sources(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut sources = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && is_source(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    sources.sort();
    tracing::debug!(count = sources.len(), root = %root.display(), "Collected sources");
    Ok(sources)
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|source| ext.eq_ignore_ascii_case(source))
        })
}

/// Read a module, dropping the byte order mark 1C tools write.
fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn display_path(paths: &HashMap<DocumentUri, PathBuf>, uri: &DocumentUri) -> String {
    paths
        .get(uri)
        .map_or_else(|| uri.to_string(), |path| path.display().to_string())
}

fn print_human(report: &BatchReport, paths: &HashMap<DocumentUri, PathBuf>) {
    for file in &report.files {
        let path = display_path(paths, &file.uri);
        for diagnostic in file.diagnostics.iter() {
            let (label, message) = match diagnostic.severity {
                DiagnosticSeverity::Error => {
                    ("error:".red().bold(), diagnostic.message.red())
                }
                DiagnosticSeverity::Warning => {
                    ("warning:".yellow().bold(), diagnostic.message.yellow())
                }
                DiagnosticSeverity::Information => {
                    ("info:".cyan().bold(), diagnostic.message.normal())
                }
                DiagnosticSeverity::Hint => ("hint:".dimmed(), diagnostic.message.normal()),
            };
            println!("{path}:{}: {label} {message}", diagnostic.range.start);
            println!("  {}: {}", "rule".dimmed(), diagnostic.rule.to_string().dimmed());
        }
    }
}

fn print_summary(totals: &SeverityTotals, file_count: usize) {
    println!();
    if totals.total() == 0 {
        println!(
            "{}",
            format!("✓ No problems found in {file_count} file(s)").green().bold()
        );
        return;
    }

    let mut parts = Vec::new();
    for (count, noun) in [
        (totals.errors, "error(s)"),
        (totals.warnings, "warning(s)"),
        (totals.information, "info"),
        (totals.hints, "hint(s)"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {noun}"));
        }
    }
    let line = format!("Found {} in {file_count} file(s)", parts.join(", "));
    if totals.errors > 0 {
        println!("{}", format!("✗ {line}").red());
    } else {
        println!("{}", format!("✓ {line}").yellow().bold());
    }
    if totals.internal_errors > 0 {
        println!(
            "{}",
            format!("  {} rule evaluation(s) failed", totals.internal_errors).red()
        );
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport {
    success: bool,
    files: Vec<JsonFile>,
    stats: JsonStats,
}

#[derive(Serialize)]
struct JsonFile {
    file: String,
    diagnostics: Vec<JsonDiagnostic>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDiagnostic {
    rule: String,
    severity: String,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    internal_error: bool,
    location: JsonLocation,
}

/// 1-based, like the human output.
#[derive(Serialize)]
struct JsonLocation {
    start: JsonPosition,
    end: JsonPosition,
}

#[derive(Serialize)]
struct JsonPosition {
    line: u32,
    column: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonStats {
    total_files: usize,
    errors: usize,
    warnings: usize,
    information: usize,
    hints: usize,
    internal_errors: usize,
}

impl JsonReport {
    fn new(report: &BatchReport, paths: &HashMap<DocumentUri, PathBuf>, file_count: usize) -> Self {
        let files = report
            .files
            .iter()
            .filter(|file| !file.diagnostics.is_empty())
            .map(|file| JsonFile {
                file: display_path(paths, &file.uri),
                diagnostics: file.diagnostics.iter().map(JsonDiagnostic::from).collect(),
            })
            .collect();
        let totals = report.totals;
        Self {
            success: !report.has_errors(),
            files,
            stats: JsonStats {
                total_files: file_count,
                errors: totals.errors,
                warnings: totals.warnings,
                information: totals.information,
                hints: totals.hints,
                internal_errors: totals.internal_errors,
            },
        }
    }
}

impl From<&Diagnostic> for JsonDiagnostic {
    fn from(diagnostic: &Diagnostic) -> Self {
        let position = |p: bsl_types::Position| JsonPosition {
            line: p.line + 1,
            column: p.character + 1,
        };
        Self {
            rule: diagnostic.rule.to_string(),
            severity: diagnostic.severity.to_string(),
            message: diagnostic.message.clone(),
            internal_error: diagnostic.is_internal_error(),
            location: JsonLocation {
                start: position(diagnostic.range.start),
                end: position(diagnostic.range.end),
            },
        }
    }
}
