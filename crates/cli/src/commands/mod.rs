pub mod analyze;
pub mod completions;
pub mod lsp;
pub mod rules;

use std::path::{Path, PathBuf};

use bsl_config::ServerConfig;
use bsl_linter::{ConfigIssue, RuleRegistry};
use colored::Colorize;

/// Configuration a command runs with.
pub struct CommandContext {
    pub config: ServerConfig,
    /// File the configuration came from, `None` for defaults
    pub config_path: Option<PathBuf>,
    pub registry: RuleRegistry,
}

impl CommandContext {
    /// Load `explicit`, or the nearest config file above `start_dir`.
    ///
    /// Without either, the default configuration is used.
    pub fn load(explicit: Option<&Path>, start_dir: &Path) -> anyhow::Result<Self> {
        let config_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                // Relative paths would stop the upward search at the working directory
                let start_dir = start_dir
                    .canonicalize()
                    .unwrap_or_else(|_| start_dir.to_path_buf());
                bsl_config::find_config(&start_dir)?
            }
        };
        let config = match &config_path {
            Some(path) => bsl_config::load_config(path)?,
            None => ServerConfig::default(),
        };
        Ok(Self {
            config,
            config_path,
            registry: RuleRegistry::builtin()?,
        })
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        self.config.validate(&self.registry)
    }

    /// Name of the configuration source for messages.
    pub fn source(&self) -> String {
        self.config_path
            .as_ref()
            .map_or_else(|| "default configuration".to_string(), |p| p.display().to_string())
    }
}

pub fn print_config_issues(source: &str, issues: &[ConfigIssue]) {
    for issue in issues {
        eprintln!("{} {source}: {issue}", "config:".yellow().bold());
    }
}
