use std::fs;
use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, ServerConfig};

/// Config file names to search for, in order of preference
pub const CONFIG_FILES: &[&str] = &[
    ".bsl-language-server.json",
    ".bsl-language-server.yaml",
    ".bsl-language-server.yml",
];

/// Find a config file by walking up the directory tree from the given start directory.
/// Returns the path to the config file if found.
#[tracing::instrument(fields(start = %start_dir.display()))]
pub fn find_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current_dir = start_dir.to_path_buf();
    let mut checked_dirs = 0;

    loop {
        tracing::trace!(dir = %current_dir.display(), "Checking directory for config files");
        for file_name in CONFIG_FILES {
            let config_path = current_dir.join(file_name);
            if config_path.is_file() {
                tracing::info!(path = %config_path.display(), checked_dirs, "Found config file");
                return Ok(Some(config_path));
            }
        }

        checked_dirs += 1;
        if !current_dir.pop() {
            tracing::debug!(checked_dirs, "No config file found");
            break;
        }
    }

    Ok(None)
}

/// Load a config from the specified path.
/// Automatically detects the format based on file extension.
#[tracing::instrument(fields(path = %path.display()))]
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    tracing::debug!("Reading config file");
    let contents = fs::read_to_string(path)?;
    let config = load_config_from_str(&contents, path)?;
    tracing::info!(
        workers = config.engine.worker_count(),
        "Config loaded successfully"
    );
    Ok(config)
}

/// Load a config from a string.
/// The path is used for error messages and format detection.
#[tracing::instrument(skip(contents), fields(path = %path.display(), size = contents.len()))]
pub fn load_config_from_str(contents: &str, path: &Path) -> Result<ServerConfig> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

    tracing::debug!(extension, "Detecting config format");

    let config = match extension {
        "yml" | "yaml" => {
            tracing::trace!("Parsing as YAML");
            parse_yaml(contents, path)?
        }
        "json" => {
            tracing::trace!("Parsing as JSON");
            parse_json(contents, path)?
        }
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    validate_config(&config, path)?;
    Ok(config)
}

/// Parse YAML configuration
fn parse_yaml(contents: &str, path: &Path) -> Result<ServerConfig> {
    // An empty YAML document means "all defaults"
    if contents.trim().is_empty() {
        return Ok(ServerConfig::default());
    }
    serde_saphyr::from_str(contents).map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: format!("YAML parse error: {e}"),
    })
}

/// Parse JSON configuration
fn parse_json(contents: &str, path: &Path) -> Result<ServerConfig> {
    serde_json::from_str(contents).map_err(|e| ConfigError::Invalid {
        path: path.to_path_buf(),
        message: format!("JSON parse error: {e}"),
    })
}

/// Validate the engine section. Rule settings are checked against the
/// registry by the caller, which knows which rules exist.
fn validate_config(config: &ServerConfig, path: &Path) -> Result<()> {
    if let Some(message) = config.engine.problems().into_iter().next() {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        });
    }
    tracing::debug!("Config validation passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsl_linter::RuleRegistry;
    use bsl_types::DiagnosticSeverity;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_json() {
        let json = r#"
{
  "diagnostics": {
    "extends": "recommended",
    "rules": {
      "UsingHardcodePath": ["warn", { "enableSearchNetworkAddresses": false }],
      "UsingServiceTag": false
    }
  },
  "engine": { "workers": 2 }
}
"#;
        let file = write_temp(".json", json);
        let config = load_config(file.path()).unwrap();
        let registry = RuleRegistry::builtin().unwrap();

        assert!(config.validate(&registry).is_empty());
        assert_eq!(config.engine.workers, Some(2));
        assert_eq!(
            config
                .diagnostics
                .resolve(registry.descriptor("UsingHardcodePath").unwrap()),
            Some(DiagnosticSeverity::Warning)
        );
        assert!(!config
            .diagnostics
            .is_enabled(registry.descriptor("UsingServiceTag").unwrap()));
    }

    #[test]
    fn test_load_yaml() {
        let yaml = "
diagnostics:
  rules:
    MissingSpace: error
engine:
  taskTimeoutMs: 500
  queueCapacity: 16
";
        let file = write_temp(".yml", yaml);
        let config = load_config(file.path()).unwrap();
        let registry = RuleRegistry::builtin().unwrap();

        assert_eq!(config.engine.task_timeout_ms, Some(500));
        assert_eq!(config.engine.queue_capacity, 16);
        assert_eq!(
            config
                .diagnostics
                .resolve(registry.descriptor("MissingSpace").unwrap()),
            Some(DiagnosticSeverity::Error)
        );
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let file = write_temp(".yaml", "");
        assert_eq!(load_config(file.path()).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let file = write_temp(".json", "{ \"engine\": ");
        let error = load_config(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { .. }));
        assert!(error.to_string().contains("JSON parse error"));
    }

    #[test]
    fn test_invalid_engine_settings() {
        let file = write_temp(".json", r#"{ "engine": { "workers": 0 } }"#);
        let error = load_config(file.path()).unwrap_err();
        assert!(error.to_string().contains("engine.workers must be at least 1"));
    }

    #[test]
    fn test_unsupported_format() {
        let file = write_temp(".toml", "");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_config(&temp_dir.path().join(".bsl-language-server.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join(".bsl-language-server.json");
        fs::write(&config_path, "{}").unwrap();

        let found = find_config(temp_dir.path()).unwrap();
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join(".bsl-language-server.yml");
        fs::write(&config_path, "engine:\n  workers: 1\n").unwrap();

        let sub_dir = temp_dir.path().join("src").join("CommonModules");
        fs::create_dir_all(&sub_dir).unwrap();

        let found = find_config(&sub_dir).unwrap();
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_json_preferred_over_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let json_path = temp_dir.path().join(".bsl-language-server.json");
        fs::write(&json_path, "{}").unwrap();
        fs::write(temp_dir.path().join(".bsl-language-server.yaml"), "").unwrap();

        assert_eq!(find_config(temp_dir.path()).unwrap(), Some(json_path));
    }
}
