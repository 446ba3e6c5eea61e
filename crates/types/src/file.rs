//! Document identity types: [`DocumentUri`], [`DocumentVersion`], [`FileScope`].

use std::sync::Arc;

/// A URI string identifying a document.
///
/// Typically a `file://` URI. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentUri(Arc<str>);

impl DocumentUri {
    #[must_use]
    pub fn new(uri: impl Into<Arc<str>>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a `file://` URI from a filesystem path.
    ///
    /// Windows drive paths are normalized to forward slashes.
    #[must_use]
    pub fn from_path(path: &std::path::Path) -> Self {
        let path_str = path.to_string_lossy();
        if path_str.contains("://") {
            return Self::new(path_str.as_ref());
        }
        if path_str.starts_with('/') {
            return Self::new(format!("file://{path_str}"));
        }
        let bytes = path_str.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            let normalized = path_str.replace('\\', "/");
            return Self::new(format!("file:///{normalized}"));
        }
        Self::new(path_str.as_ref())
    }

    /// The last path segment, including extension.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit(['/', '\\']).next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Monotonically increasing counter identifying one text state of a document.
///
/// Versions are the unit of staleness detection: any result tagged with a
/// version other than the document's current one is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentVersion(u64);

impl DocumentVersion {
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Which kind of source file a rule applies to.
///
/// `.bsl` files are 1C:Enterprise modules, `.os` files are `OneScript`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileScope {
    #[default]
    All,
    Bsl,
    OneScript,
}

impl FileScope {
    /// Detect the file kind from a URI's extension.
    ///
    /// Unknown extensions are treated as BSL.
    #[must_use]
    pub fn of_uri(uri: &DocumentUri) -> Self {
        let name = uri.file_name();
        match name.rsplit_once('.') {
            Some((_, ext)) if ext.eq_ignore_ascii_case("os") => Self::OneScript,
            _ => Self::Bsl,
        }
    }

    /// Returns `true` if a rule with this scope should run on a file of kind `file`.
    #[must_use]
    pub const fn applies_to(self, file: Self) -> bool {
        match self {
            Self::All => true,
            Self::Bsl => matches!(file, Self::Bsl | Self::All),
            Self::OneScript => matches!(file, Self::OneScript | Self::All),
        }
    }
}

impl std::fmt::Display for FileScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Bsl => write!(f, "bsl"),
            Self::OneScript => write!(f, "os"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_document_uri_from_unix_path() {
        let uri = DocumentUri::from_path(Path::new("/src/CommonModules/Module.bsl"));
        assert_eq!(uri.as_str(), "file:///src/CommonModules/Module.bsl");
        assert_eq!(uri.file_name(), "Module.bsl");
    }

    #[test]
    fn test_document_uri_from_windows_path() {
        let uri = DocumentUri::from_path(Path::new("C:\\src\\Module.bsl"));
        assert_eq!(uri.as_str(), "file:///C:/src/Module.bsl");
    }

    #[test]
    fn test_document_uri_keeps_existing_scheme() {
        let uri = DocumentUri::from_path(Path::new("file:///a.os"));
        assert_eq!(uri.as_str(), "file:///a.os");
    }

    #[test]
    fn test_document_version_ordering() {
        assert!(DocumentVersion::new(1) < DocumentVersion::new(2));
        assert_eq!(DocumentVersion::new(7).to_string(), "v7");
    }

    #[test]
    fn test_file_scope_detection() {
        assert_eq!(
            FileScope::of_uri(&"file:///x/Main.os".into()),
            FileScope::OneScript
        );
        assert_eq!(
            FileScope::of_uri(&"file:///x/Module.bsl".into()),
            FileScope::Bsl
        );
        assert_eq!(FileScope::of_uri(&"untitled:1".into()), FileScope::Bsl);
    }

    #[test]
    fn test_file_scope_applies_to() {
        assert!(FileScope::All.applies_to(FileScope::OneScript));
        assert!(FileScope::Bsl.applies_to(FileScope::Bsl));
        assert!(!FileScope::Bsl.applies_to(FileScope::OneScript));
        assert!(!FileScope::OneScript.applies_to(FileScope::Bsl));
    }
}
