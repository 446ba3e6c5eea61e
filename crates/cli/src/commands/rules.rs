//! `bsl rules`: the registered rules and how the configuration sets them.

use std::path::Path;

use anyhow::Result;
use bsl_linter::{LintConfig, RuleDescriptor};
use colored::Colorize;
use serde::Serialize;

use crate::commands::{print_config_issues, CommandContext};
use crate::exit_code::ExitCode;
use crate::OutputFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleInfo {
    id: String,
    description: String,
    /// Severity under the current configuration, `None` when off
    severity: Option<String>,
    default_severity: String,
    kind: String,
    scope: String,
    fixable: bool,
    tags: Vec<String>,
    params: Vec<ParamInfo>,
}

#[derive(Serialize)]
struct ParamInfo {
    name: String,
    kind: String,
    default: Option<serde_json::Value>,
    description: String,
}

impl RuleInfo {
    fn new(descriptor: &RuleDescriptor, config: &LintConfig) -> Self {
        Self {
            id: descriptor.id.to_string(),
            description: descriptor.description.clone(),
            severity: config.resolve(descriptor).map(|s| s.to_string()),
            default_severity: descriptor.default_severity.to_string(),
            kind: descriptor.kind.to_string(),
            scope: descriptor.scope.to_string(),
            fixable: descriptor.fixable,
            tags: descriptor.tags.clone(),
            params: descriptor
                .params
                .iter()
                .map(|param| ParamInfo {
                    name: param.name.clone(),
                    kind: param.kind.to_string(),
                    default: param.default.as_ref().map(bsl_linter::ParamValue::to_json),
                    description: param.description.clone(),
                })
                .collect(),
        }
    }
}

pub fn run(config_path: Option<&Path>, format: OutputFormat) -> Result<ExitCode> {
    let cwd = std::env::current_dir()?;
    let ctx = CommandContext::load(config_path, &cwd)?;
    let issues = ctx.validate();
    print_config_issues(&ctx.source(), &issues);

    let rules: Vec<RuleInfo> = ctx
        .registry
        .all()
        .map(|descriptor| RuleInfo::new(descriptor, &ctx.config.diagnostics))
        .collect();

    match format {
        OutputFormat::Human => {
            for rule in &rules {
                let state = match &rule.severity {
                    Some(severity) => severity.green(),
                    None => "off".dimmed(),
                };
                let fixable = if rule.fixable { " (fixable)" } else { "" };
                println!("{} [{state}]{}", rule.id.bold(), fixable.cyan());
                println!("  {}", rule.description);
                for param in &rule.params {
                    let default = param
                        .default
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} {}: {} = {default}",
                        "param".dimmed(),
                        param.name,
                        param.kind
                    );
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rules)?),
    }

    Ok(if issues.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::ConfigError
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsl_linter::RuleRegistry;

    #[test]
    fn test_rule_info_reflects_configuration() {
        let registry = RuleRegistry::builtin().unwrap();
        let config: LintConfig =
            serde_json::from_value(serde_json::json!({ "rules": { "MissingSpace": "off" } }))
                .unwrap();

        let missing_space = RuleInfo::new(registry.descriptor("MissingSpace").unwrap(), &config);
        assert_eq!(missing_space.severity, None);
        assert_eq!(missing_space.default_severity, "info");
        assert!(missing_space.fixable);

        let parse_error = RuleInfo::new(registry.descriptor("ParseError").unwrap(), &config);
        assert_eq!(parse_error.severity.as_deref(), Some("error"));
    }

    #[test]
    fn test_builtin_listing_under_configuration() {
        let registry = RuleRegistry::builtin().unwrap();
        let config: LintConfig = serde_json::from_value(serde_json::json!({
            "rules": { "MissingSpace": "off", "UsingServiceTag": "warn" }
        }))
        .unwrap();

        let listing: Vec<String> = registry
            .all()
            .map(|descriptor| {
                let info = RuleInfo::new(descriptor, &config);
                format!(
                    "{} {} (default {}){}",
                    info.id,
                    info.severity.as_deref().unwrap_or("off"),
                    info.default_severity,
                    if info.fixable { " fixable" } else { "" }
                )
            })
            .collect();
        insta::assert_snapshot!(listing.join("\n"), @r"
        CommentedCode warning (default warning)
        MissingSpace off (default info) fixable
        ParseError error (default error)
        UsingHardcodePath error (default error)
        UsingServiceTag warning (default info)
        UsingThisForm warning (default warning) fixable
        ");
    }
}
