//! Exit codes for the BSL CLI.
//!
//! Scripts and CI jobs rely on these to tell a dirty project apart from a
//! broken invocation.

/// Exit codes used by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// No error diagnostics
    Success = 0,
    /// At least one diagnostic of severity error
    DiagnosticsError = 1,
    /// Unreadable or invalid configuration, bad path or other usage error
    ConfigError = 2,
}

impl ExitCode {
    /// Exit the process with this exit code.
    pub fn exit(self) -> ! {
        std::process::exit(self as i32)
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::DiagnosticsError => write!(f, "errors found"),
            Self::ConfigError => write!(f, "configuration error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::DiagnosticsError.code(), 1);
        assert_eq!(ExitCode::ConfigError.code(), 2);
    }
}
