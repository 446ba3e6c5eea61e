use std::time::Duration;

use bsl_linter::{ConfigIssue, LintConfig, RuleRegistry};
use serde::Deserialize;

/// Work queue capacity used when the configuration names none.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Root of a `.bsl-language-server.json` file.
///
/// ```json
/// {
///   "diagnostics": {
///     "extends": "recommended",
///     "rules": { "UsingServiceTag": false }
///   },
///   "engine": { "workers": 4, "taskTimeoutMs": 2000 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    pub diagnostics: LintConfig,
    pub engine: EngineConfig,
}

/// Analysis engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    /// Rule evaluation threads. Defaults to the available parallelism.
    pub workers: Option<usize>,
    /// Soft deadline per rule evaluation, in milliseconds. No deadline if unset.
    pub task_timeout_ms: Option<u64>,
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            task_timeout_ms: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    /// Configured worker count, or the machine's available parallelism.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
    }

    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.workers == Some(0) {
            problems.push("engine.workers must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            problems.push("engine.queueCapacity must be at least 1".to_string());
        }
        if self.task_timeout_ms == Some(0) {
            problems.push("engine.taskTimeoutMs must be at least 1".to_string());
        }
        problems
    }
}

impl ServerConfig {
    /// Parse the settings object an editor sends with
    /// `workspace/didChangeConfiguration`.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Check rule settings against the available rules.
    #[must_use]
    pub fn validate(&self, registry: &RuleRegistry) -> Vec<ConfigIssue> {
        self.diagnostics.validate(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsl_types::DiagnosticSeverity;

    #[test]
    fn test_empty_object_is_default() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.engine.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.engine.task_timeout(), None);
        assert!(config.engine.worker_count() >= 1);
    }

    #[test]
    fn test_camel_case_engine_keys() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "engine": { "workers": 2, "taskTimeoutMs": 1500, "queueCapacity": 64 } }"#,
        )
        .unwrap();
        assert_eq!(config.engine.worker_count(), 2);
        assert_eq!(
            config.engine.task_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.engine.queue_capacity, 64);
        assert!(config.engine.problems().is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result: serde_json::Result<ServerConfig> =
            serde_json::from_str(r#"{ "engine": { "threads": 2 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_values_are_problems() {
        let config = EngineConfig {
            workers: Some(0),
            task_timeout_ms: Some(0),
            queue_capacity: 0,
        };
        assert_eq!(config.problems().len(), 3);
    }

    #[test]
    fn test_from_value_and_validate() {
        let value = serde_json::json!({
            "diagnostics": { "rules": { "MissingSpace": "error", "ParseErorr": "off" } }
        });
        let config = ServerConfig::from_value(value).unwrap();
        let registry = RuleRegistry::builtin().unwrap();

        let descriptor = registry.descriptor("MissingSpace").unwrap();
        assert_eq!(
            config.diagnostics.resolve(descriptor),
            Some(DiagnosticSeverity::Error)
        );

        let issues = config.validate(&registry);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Unknown rule 'ParseErorr'. Did you mean 'ParseError'?"
        );
    }
}
