use std::sync::LazyLock;

use bsl_syntax::{Node, NodeKind};
use bsl_types::{DiagnosticSeverity, FileScope};
use regex::Regex;

use crate::descriptor::{ParameterSpec, RuleDescriptor, RuleKind};
use crate::diagnostics::Diagnostic;
use crate::rules::compile_param;
use crate::traits::{Rule, RuleContext, RuleError};

const DEFAULT_EXCLUSION: &str =
    "Верси|Version|ЗапуститьПриложение|RunApp|Пространств|Namespace|Драйвер|Driver";
const DEFAULT_STD_PATHS_UNIX: &str =
    r"bin|boot|dev|etc|home|lib|lost\+found|misc|mnt|media|opt|proc|root|run|sbin|tmp|usr|var";

/// More dots than this in a string without letters is a classifier code,
/// not an IPv4 address.
const DOTS_IN_IPV4: usize = 3;

/// Windows drive, UNC, environment variable, home and root relative paths.
#[allow(clippy::expect_used)]
static PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:/",
        r"|%[^%]*%[\\/]",
        r"|~[\\/]",
        r#"|[a-z]:(?:[\\/][^\x00-\x1f<>:"/\\|?*]*)*$"#,
        r#"|\\[\\/][^\x00-\x1f<>:"/\\|?*]+(?:[\\/][^\x00-\x1f<>:"/\\|?*]*)*$)"#,
    ))
    .expect("path pattern is valid")
});

#[allow(clippy::expect_used)]
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^(ftp|http|https)://[^ "]"#).expect("url pattern is valid")
});

#[allow(clippy::expect_used)]
static NETWORK_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(([0-9a-fA-F]{1,4}:){7,7}[0-9a-fA-F]{1,4}",
        r"|([0-9a-fA-F]{1,4}:){1,7}:",
        r"|([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}",
        r"|([0-9a-fA-F]{1,4}:){1,5}(:[0-9a-fA-F]{1,4}){1,2}",
        r"|([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}",
        r"|([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}",
        r"|([0-9a-fA-F]{1,4}:){1,2}(:[0-9a-fA-F]{1,4}){1,5}",
        r"|[0-9a-fA-F]{1,4}:((:[0-9a-fA-F]{1,4}){1,6})",
        r"|:((:[0-9a-fA-F]{1,4}){1,7}|:)",
        r"|fe80:(:[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]{1,}",
        r"|::(ffff(:0{1,4}){0,1}:){0,1}((25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])",
        r"|([0-9a-fA-F]{1,4}:){1,4}:((25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9]))",
        r"|((25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])",
    ))
    .expect("network address pattern is valid")
});

#[allow(clippy::expect_used)]
static ALPHABET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Za-zА-Яа-яЁё]").expect("alphabet pattern is valid"));

#[allow(clippy::expect_used)]
static DEFAULT_EXCLUSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile_param("searchWordsExclusion", DEFAULT_EXCLUSION).expect("default exclusion is valid")
});

#[allow(clippy::expect_used)]
static DEFAULT_STD_PATHS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile_param("searchWordsStdPathsUnix", &std_paths_pattern(DEFAULT_STD_PATHS_UNIX))
        .expect("default unix roots are valid")
});

fn std_paths_pattern(words: &str) -> String {
    format!("^/({words})")
}

/// Patterns resolved from the rule parameters.
struct Patterns<'a> {
    exclusion: &'a Regex,
    std_paths: &'a Regex,
    network: bool,
}

impl Patterns<'_> {
    fn is_hardcoded(&self, literal: Node<'_>) -> bool {
        let content = literal.text().replace('"', "");
        if content.chars().count() <= 2 {
            return false;
        }
        if PATH.is_match(&content) && !URL.is_match(&content) {
            // Root relative paths only count under a standard Unix directory
            return !content.starts_with('/') || self.std_paths.is_match(&content);
        }
        self.network && self.is_network_address(literal, &content)
    }

    fn is_network_address(&self, literal: Node<'_>, content: &str) -> bool {
        if !NETWORK_ADDRESS.is_match(content) {
            return false;
        }
        if !ALPHABET.is_match(content) && content.matches('.').count() > DOTS_IN_IPV4 {
            return false;
        }
        let statement = literal
            .ancestors()
            .find(|node| node.kind() != NodeKind::Expression);
        !statement.is_some_and(|statement| self.exclusion.is_match(statement.text()))
    }
}

/// Flags file system paths and network addresses hardcoded in string
/// literals.
pub struct UsingHardcodePathRuleImpl;

impl Rule for UsingHardcodePathRuleImpl {
    fn descriptor(&self) -> RuleDescriptor {
        RuleDescriptor::new(
            "UsingHardcodePath",
            "Storing file paths and network addresses in code",
            DiagnosticSeverity::Error,
        )
        .kind(RuleKind::Error)
        .scope(FileScope::Bsl)
        .tags(&["standard"])
        .minutes_to_fix(15)
        .param(
            ParameterSpec::bool("enableSearchNetworkAddresses", true)
                .describe("Search for IPv4 and IPv6 addresses"),
        )
        .param(
            ParameterSpec::string("searchWordsExclusion", DEFAULT_EXCLUSION)
                .describe("Statements matching this pattern are not searched for addresses"),
        )
        .param(
            ParameterSpec::string("searchWordsStdPathsUnix", DEFAULT_STD_PATHS_UNIX)
                .describe("Standard Unix root directories"),
        )
        .applies_to(&[NodeKind::StringLiteral])
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<Vec<Diagnostic>, RuleError> {
        let params = ctx.params();

        let exclusion_words = params
            .string("searchWordsExclusion")
            .unwrap_or(DEFAULT_EXCLUSION);
        let configured_exclusion;
        let exclusion = if exclusion_words == DEFAULT_EXCLUSION {
            &*DEFAULT_EXCLUSION_PATTERN
        } else {
            configured_exclusion = compile_param("searchWordsExclusion", exclusion_words)?;
            &configured_exclusion
        };

        let root_words = params
            .string("searchWordsStdPathsUnix")
            .unwrap_or(DEFAULT_STD_PATHS_UNIX);
        let configured_roots;
        let std_paths = if root_words == DEFAULT_STD_PATHS_UNIX {
            &*DEFAULT_STD_PATHS_PATTERN
        } else {
            configured_roots =
                compile_param("searchWordsStdPathsUnix", &std_paths_pattern(root_words))?;
            &configured_roots
        };

        let patterns = Patterns {
            exclusion,
            std_paths,
            network: params.bool("enableSearchNetworkAddresses").unwrap_or(true),
        };

        Ok(ctx
            .tree()
            .nodes_of_kind(NodeKind::StringLiteral)
            .filter(|literal| patterns.is_hardcoded(*literal))
            .map(|literal| ctx.diagnostic(literal.range(), "Hardcoded path or network address"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{run, run_with, texts};
    use serde_json::json;

    fn found(source: &str) -> Vec<&str> {
        texts(source, &run(&UsingHardcodePathRuleImpl, source))
    }

    #[test]
    fn test_builtin_patterns_compile() {
        for pattern in [
            &PATH,
            &URL,
            &NETWORK_ADDRESS,
            &ALPHABET,
            &DEFAULT_EXCLUSION_PATTERN,
            &DEFAULT_STD_PATHS_PATTERN,
        ] {
            LazyLock::force(pattern);
        }
    }

    #[test]
    fn test_windows_paths() {
        let source = "\
Каталог = \"C:\\Program Files (x86)\\1cv8\\\";
Сетевой = \"\\\\server\\share\\file.txt\";
Профиль = \"%APPDATA%\\1C\";
";
        assert_eq!(
            found(source),
            vec![
                "\"C:\\Program Files (x86)\\1cv8\\\"",
                "\"\\\\server\\share\\file.txt\"",
                "\"%APPDATA%\\1C\"",
            ]
        );
    }

    #[test]
    fn test_unix_paths_need_a_standard_root() {
        let source = "А = \"/home/user/base\";\nБ = \"/some/where\";\n";
        assert_eq!(found(source), vec!["\"/home/user/base\""]);

        let diagnostics = run_with(
            &UsingHardcodePathRuleImpl,
            source,
            Some(json!({ "searchWordsStdPathsUnix": "some" })),
        );
        assert_eq!(texts(source, &diagnostics), vec!["\"/some/where\""]);
    }

    #[test]
    fn test_urls_and_plain_strings_are_ignored() {
        let source = "\
Адрес = \"https://example.com/api\";
Текст = \"Привет, мир\";
Пусто = \"ab\";
";
        assert!(found(source).is_empty());
    }

    #[test]
    fn test_network_addresses() {
        let source = "\
Сервер = \"192.168.0.1\";
Сервер6 = \"fe80::1ff:fe23:4567:890a\";
Версия = \"8.3.1.1\";
Код = \"1.2.3.4.5\";
";
        assert_eq!(
            found(source),
            vec!["\"192.168.0.1\"", "\"fe80::1ff:fe23:4567:890a\""]
        );
    }

    #[test]
    fn test_network_search_can_be_disabled() {
        let source = "Сервер = \"192.168.0.1\";\nКаталог = \"D:\\base\";\n";
        let diagnostics = run_with(
            &UsingHardcodePathRuleImpl,
            source,
            Some(json!({ "enableSearchNetworkAddresses": false })),
        );
        assert_eq!(texts(source, &diagnostics), vec!["\"D:\\base\""]);
    }

    #[test]
    fn test_exclusion_words_in_call() {
        let source = "ЗапуститьПриложение(\"10.0.0.1\");\nПодключить(\"10.0.0.1\");\n";
        assert_eq!(found(source).len(), 1);
    }
}
