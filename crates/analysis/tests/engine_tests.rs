//! End-to-end behavior of the analysis engine: publication, versioning,
//! rule isolation and timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bsl_analysis::{DocumentError, EngineOptions};
use bsl_linter::{builtin_rules, DiagnosticKind, LintConfig, Rule};
use bsl_test_utils::fixtures::{uri, CLEAN_MODULE, COMMON_MODULE};
use bsl_test_utils::{
    await_version, drain_publications, format_diagnostics, publications_until, rule_ids,
    EvaluationLog, FailingRule, GatedRule, KeywordRule, PanickingRule, SlowRule, TestHost,
    TrackedProvider, TrackedRule, PUBLICATION_TIMEOUT,
};
use bsl_types::{DiagnosticSeverity, Position, Range};

const QUIET: Duration = Duration::from_millis(300);

fn keyword(id: &str, word: &str) -> Arc<dyn Rule> {
    Arc::new(KeywordRule::new(id, word))
}

#[test]
fn test_single_violation_is_published_with_rule_severity_and_range() {
    let host = TestHost::new().rule(keyword("R1", "Foo")).build();
    let module = uri("Module.bsl");

    let version = host.open(&module, "А = Foo;");
    let publication = await_version(&host, &module, version);

    assert_eq!(publication.diagnostics.len(), 1);
    let diagnostic = &publication.diagnostics[0];
    assert_eq!(diagnostic.rule.as_str(), "R1");
    assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
    assert_eq!(
        diagnostic.range,
        Range::new(Position::new(0, 4), Position::new(0, 7))
    );
    assert_eq!(diagnostic.anchor.as_deref(), Some("Foo"));
}

#[test]
fn test_removing_violation_publishes_empty_set_for_new_version() {
    let host = TestHost::new().rule(keyword("R1", "Foo")).build();
    let module = uri("Module.bsl");

    let v1 = host.open(&module, "А = Foo;");
    assert_eq!(await_version(&host, &module, v1).diagnostics.len(), 1);

    let v2 = host.update(&module, "А = 1;").unwrap();
    let publication = await_version(&host, &module, v2);
    assert!(publication.diagnostics.is_empty());

    let committed = host.store().diagnostics(&module).unwrap();
    assert_eq!(committed.version, v2);
}

#[test]
fn test_fifty_rules_with_one_failing() {
    let mut rules: Vec<Arc<dyn Rule>> = (1..=49)
        .map(|i| keyword(&format!("R{i:02}"), "Foo"))
        .collect();
    rules.push(Arc::new(FailingRule::new("Broken")));
    let host = TestHost::new().rules(rules).build();
    let module = uri("Module.bsl");

    let version = host.open(&module, "Foo();");
    let publication = await_version(&host, &module, version);

    let findings: Vec<_> = publication
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Finding)
        .collect();
    let internal: Vec<_> = publication
        .diagnostics
        .iter()
        .filter(|d| d.is_internal_error())
        .collect();
    assert_eq!(findings.len(), 49);
    assert_eq!(internal.len(), 1);
    assert_eq!(internal[0].rule.as_str(), "Broken");
    assert_eq!(internal[0].message, "Rule 'Broken' failed: always fails");
}

#[test]
fn test_results_of_all_rules_are_merged_in_document_order() {
    let host = TestHost::new()
        .rule(keyword("Foos", "Foo"))
        .rule(keyword("Bars", "Bar"))
        .build();
    let module = uri("Module.bsl");

    let version = host.open(&module, "Bar(Foo);\nFoo();");
    let publication = await_version(&host, &module, version);

    insta::assert_snapshot!(format_diagnostics(&publication.diagnostics), @r"
    1:1-1:4 warning Bars: Found 'Bar'
    1:5-1:8 warning Foos: Found 'Foo'
    2:1-2:4 warning Foos: Found 'Foo'
    ");
}

#[test]
fn test_broken_rules_do_not_reduce_other_results() {
    let text = "Foo(); Bar(); Foo();";
    let module = uri("Module.bsl");

    let healthy = TestHost::new()
        .rule(keyword("Foos", "Foo"))
        .rule(keyword("Bars", "Bar"))
        .build();
    let version = healthy.open(&module, text);
    let baseline = await_version(&healthy, &module, version).diagnostics;

    let broken = TestHost::new()
        .rule(keyword("Foos", "Foo"))
        .rule(keyword("Bars", "Bar"))
        .rule(Arc::new(FailingRule::new("Failing")))
        .rule(Arc::new(PanickingRule::new("Panicking")))
        .build();
    let version = broken.open(&module, text);
    let diagnostics = await_version(&broken, &module, version).diagnostics;

    let findings: Vec<_> = diagnostics
        .iter()
        .filter(|d| !d.is_internal_error())
        .cloned()
        .collect();
    assert_eq!(findings, baseline.to_vec());

    let mut failed: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_internal_error())
        .map(|d| d.message.as_str())
        .collect();
    failed.sort_unstable();
    assert_eq!(
        failed,
        vec![
            "Rule 'Failing' failed: always fails",
            "Rule 'Panicking' failed: panicked: rule Panicking exploded",
        ]
    );
}

#[test]
fn test_rapid_updates_publish_only_latest_version() {
    let (gated, mut gate) = GatedRule::new("Gated");
    let host = TestHost::new().rule(gated).build();
    let module = uri("Module.bsl");

    let v1 = host.open(&module, "first");
    assert!(gate.wait_entered(Duration::from_secs(10)));
    let v2 = host.update(&module, "second").unwrap();
    gate.release();

    let mut published = publications_until(&host, &module, v2);
    published.extend(drain_publications(&host, QUIET));
    let versions: Vec<_> = published.iter().map(|p| p.version).collect();
    assert_eq!(versions, vec![v2], "v1 = {v1}");
    assert_eq!(
        format_diagnostics(&published[0].diagnostics),
        "1:1-1:1 info Gated: Saw: second"
    );
}

#[test]
fn test_late_result_never_overwrites_newer_version() {
    let (gated, mut gate) = GatedRule::new("Gated");
    let host = TestHost::new()
        .rule(gated)
        .rule(keyword("R1", "Foo"))
        .build();
    let module = uri("Module.bsl");

    let v1 = host.open(&module, "Foo");
    assert!(gate.wait_entered(Duration::from_secs(10)));
    let v2 = host.update(&module, "Bar").unwrap();
    let v3 = host.update(&module, "Baz").unwrap();
    gate.release();

    let publication = await_version(&host, &module, v3);
    assert_eq!(rule_ids(&publication.diagnostics), vec!["Gated"]);

    for late in drain_publications(&host, QUIET) {
        assert!(late.version >= v3, "published {} after {v3}", late.version);
    }
    let committed = host.store().diagnostics(&module).unwrap();
    assert_eq!(committed.version, v3);
    assert!(v1 < v2 && v2 < v3);
}

#[test]
fn test_sequential_updates_end_at_latest_version() {
    let host = TestHost::new()
        .rule(keyword("R1", "Foo"))
        .rule(Arc::new(SlowRule::new("Slow", Duration::from_millis(5))))
        .build();
    let module = uri("Module.bsl");

    let mut version = host.open(&module, "Foo 0");
    for i in 1..=20 {
        version = host.update(&module, &format!("Foo {i}")).unwrap();
    }

    let publication = await_version(&host, &module, version);
    assert_eq!(publication.diagnostics.len(), 2);
    for late in drain_publications(&host, QUIET) {
        assert_eq!(late.version, version);
    }
    assert_eq!(host.store().diagnostics(&module).unwrap().version, version);
}

#[test]
fn test_close_discards_in_flight_analysis() {
    let (gated, mut gate) = GatedRule::new("Gated");
    let host = TestHost::new().rule(gated).build();
    let module = uri("Module.bsl");

    host.open(&module, "text");
    assert!(gate.wait_entered(Duration::from_secs(10)));
    assert!(host.close(&module));
    gate.release();

    assert!(drain_publications(&host, QUIET).is_empty());
    assert!(host.document(&module).is_none());
    assert_eq!(
        host.update(&module, "again").unwrap_err(),
        DocumentError::NotOpen(module.clone())
    );

    let reopened = host.open(&module, "again");
    let publication = await_version(&host, &module, reopened);
    assert_eq!(publication.diagnostics[0].message, "Saw: again");
}

#[test]
fn test_slow_rule_times_out_alone() {
    let host = TestHost::new()
        .rule(keyword("R1", "Foo"))
        .rule(Arc::new(SlowRule::new("Slow", Duration::from_millis(500))))
        .options(
            EngineOptions::default()
                .with_workers(2)
                .with_task_timeout(Duration::from_millis(50)),
        )
        .build();
    let module = uri("Module.bsl");

    let version = host.open(&module, "Foo");
    let publication = await_version(&host, &module, version);

    // the internal error has no location, so it sorts first
    assert_eq!(rule_ids(&publication.diagnostics), vec!["Slow", "R1"]);
    let timed_out = &publication.diagnostics[0];
    assert!(timed_out.is_internal_error());
    assert_eq!(timed_out.message, "Rule 'Slow' failed: timed out after 50 ms");
}

#[test]
fn test_rules_without_matching_constructs_are_skipped() {
    let log = EvaluationLog::new();
    let tracked: Vec<Arc<dyn Rule>> = builtin_rules()
        .iter()
        .map(|rule| TrackedRule::wrap(Arc::clone(rule), &log) as Arc<dyn Rule>)
        .collect();
    let host = TestHost::new().rules(tracked).build();
    let module = uri("Module.bsl");

    let checkpoint = log.checkpoint();
    let version = host.open(&module, CLEAN_MODULE);
    let publication = await_version(&host, &module, version);
    assert_eq!(format_diagnostics(&publication.diagnostics), "(no diagnostics)");

    assert_eq!(log.count_since("ParseError", checkpoint), 1);
    assert_eq!(log.count_since("MissingSpace", checkpoint), 1);
    assert_eq!(log.count_since("UsingHardcodePath", checkpoint), 0);
}

#[test]
fn test_configuration_change_reanalyzes_with_cached_parse() {
    let log = EvaluationLog::new();
    let host = TestHost::new()
        .with_builtin_rules()
        .provider(TrackedProvider::new(&log))
        .build();
    let module = uri("CommonModule.bsl");

    let version = host.open(&module, COMMON_MODULE);
    let before = await_version(&host, &module, version);
    assert!(rule_ids(&before.diagnostics).contains(&"UsingServiceTag"));

    let checkpoint = log.checkpoint();
    let config: LintConfig =
        serde_json::from_str(r#"{ "rules": { "UsingServiceTag": false } }"#).unwrap();
    assert!(host.set_config(&config).is_empty());

    let after = await_version(&host, &module, version);
    assert!(!rule_ids(&after.diagnostics).contains(&"UsingServiceTag"));
    assert_eq!(log.count_since(bsl_test_utils::tracking::PARSE, checkpoint), 0);
}

#[test]
fn test_unknown_rule_in_configuration_is_reported() {
    let host = TestHost::new().with_builtin_rules().build();
    let config: LintConfig =
        serde_json::from_str(r#"{ "rules": { "MisingSpace": "warn" } }"#).unwrap();
    let issues = host.set_config(&config);
    assert_eq!(issues.len(), 1);
    assert_eq!(
        issues[0].message,
        "Unknown rule 'MisingSpace'. Did you mean 'MissingSpace'?"
    );
}

#[test]
fn test_documents_are_analyzed_independently() {
    let host = TestHost::new().rule(keyword("R1", "Foo")).build();
    let a = uri("A.bsl");
    let b = uri("B.os");

    let va = host.open(&a, "Foo Foo");
    let vb = host.open(&b, "Foo");

    let mut published = HashMap::new();
    while published.len() < 2 {
        let publication = host
            .publications()
            .recv_timeout(PUBLICATION_TIMEOUT)
            .unwrap();
        published.insert(publication.uri.clone(), publication);
    }
    assert_eq!(published[&a].version, va);
    assert_eq!(published[&a].diagnostics.len(), 2);
    assert_eq!(published[&b].version, vb);
    assert_eq!(published[&b].diagnostics.len(), 1);
    assert_eq!(host.store().len(), 2);
}

#[test]
fn test_shutdown_clears_documents() {
    let mut host = TestHost::new().rule(keyword("R1", "Foo")).build();
    let module = uri("Module.bsl");
    let version = host.open(&module, "Foo");
    let _ = await_version(&host, &module, version);

    host.shutdown();
    assert!(host.store().is_empty());
    host.shutdown();
}
