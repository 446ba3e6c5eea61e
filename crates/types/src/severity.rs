//! Severity types for diagnostics and rules.

/// Diagnostic severity level for display.
///
/// Maps directly to LSP's `DiagnosticSeverity`. The declaration order is
/// the sort order used when merging diagnostic sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    /// Error - indicates a problem that prevents correct execution
    Error,
    /// Warning - indicates a potential problem
    Warning,
    /// Information - informational message
    Information,
    /// Hint - a suggestion or style recommendation
    Hint,
}

impl DiagnosticSeverity {
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns true if this severity is at least a warning (warning or error).
    #[must_use]
    pub const fn is_warning_or_higher(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Information => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

/// Rule severity as configured by the user.
///
/// Rules can be turned off or reported at any diagnostic level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleSeverity {
    /// Rule is disabled
    Off,
    Hint,
    Info,
    /// Rule violations are reported as warnings (default)
    #[default]
    Warn,
    Error,
}

impl RuleSeverity {
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Convert to diagnostic severity for display.
    ///
    /// Returns `None` if the rule is off.
    #[must_use]
    pub const fn to_diagnostic_severity(self) -> Option<DiagnosticSeverity> {
        match self {
            Self::Off => None,
            Self::Hint => Some(DiagnosticSeverity::Hint),
            Self::Info => Some(DiagnosticSeverity::Information),
            Self::Warn => Some(DiagnosticSeverity::Warning),
            Self::Error => Some(DiagnosticSeverity::Error),
        }
    }

    /// Parse a configuration keyword.
    ///
    /// Accepts the canonical names plus the long forms `warning` and
    /// `information`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "hint" => Some(Self::Hint),
            "info" | "information" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<DiagnosticSeverity> for RuleSeverity {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => Self::Error,
            DiagnosticSeverity::Warning => Self::Warn,
            DiagnosticSeverity::Information => Self::Info,
            DiagnosticSeverity::Hint => Self::Hint,
        }
    }
}

impl std::fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Hint => write!(f, "hint"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert!(DiagnosticSeverity::Error.is_error());
        assert!(!DiagnosticSeverity::Warning.is_error());

        assert!(DiagnosticSeverity::Warning.is_warning_or_higher());
        assert!(!DiagnosticSeverity::Information.is_warning_or_higher());
        assert!(!DiagnosticSeverity::Hint.is_warning_or_higher());
    }

    #[test]
    fn test_diagnostic_severity_orders_most_severe_first() {
        assert!(DiagnosticSeverity::Error < DiagnosticSeverity::Warning);
        assert!(DiagnosticSeverity::Information < DiagnosticSeverity::Hint);
    }

    #[test]
    fn test_rule_severity_to_diagnostic() {
        assert_eq!(RuleSeverity::Off.to_diagnostic_severity(), None);
        assert_eq!(
            RuleSeverity::Info.to_diagnostic_severity(),
            Some(DiagnosticSeverity::Information)
        );
        assert_eq!(
            RuleSeverity::Error.to_diagnostic_severity(),
            Some(DiagnosticSeverity::Error)
        );
    }

    #[test]
    fn test_rule_severity_parse() {
        assert_eq!(RuleSeverity::parse("off"), Some(RuleSeverity::Off));
        assert_eq!(RuleSeverity::parse("Warning"), Some(RuleSeverity::Warn));
        assert_eq!(RuleSeverity::parse("information"), Some(RuleSeverity::Info));
        assert_eq!(RuleSeverity::parse("critical"), None);
    }

    #[test]
    fn test_rule_severity_round_trips_through_diagnostic_severity() {
        for severity in [
            DiagnosticSeverity::Error,
            DiagnosticSeverity::Warning,
            DiagnosticSeverity::Information,
            DiagnosticSeverity::Hint,
        ] {
            assert_eq!(
                RuleSeverity::from(severity).to_diagnostic_severity(),
                Some(severity)
            );
        }
    }

    #[test]
    fn test_rule_severity_default_and_display() {
        assert_eq!(RuleSeverity::default(), RuleSeverity::Warn);
        assert_eq!(RuleSeverity::Off.to_string(), "off");
        assert_eq!(RuleSeverity::Info.to_string(), "info");
    }
}
