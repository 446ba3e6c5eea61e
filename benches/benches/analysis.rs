use std::hint::black_box;

use bsl_analysis::{evaluate, AnalysisHost, EngineOptions};
use bsl_linter::{LintConfig, RuleRegistry, RuleSet};
use bsl_test_utils::await_version;
use bsl_test_utils::fixtures::{large_module, uri};
use bsl_types::FileScope;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

const METHODS: usize = 200;

fn bench_parse(c: &mut Criterion) {
    let text = large_module(METHODS);
    c.bench_function("parse_large_module", |b| {
        b.iter(|| black_box(bsl_syntax::parse(black_box(&text))));
    });
}

/// Every built-in rule over one parse, without the scheduler.
fn bench_rules(c: &mut Criterion) {
    let text = large_module(METHODS);
    let parse = bsl_syntax::parse(&text);
    let registry = RuleRegistry::builtin().expect("built-in rules are valid");
    let (rules, _) = RuleSet::resolve(&registry, &LintConfig::all());

    c.bench_function("evaluate_builtin_rules", |b| {
        b.iter(|| {
            rules
                .applicable(parse.tree(), FileScope::Bsl)
                .map(|rule| evaluate(rule, &parse, FileScope::Bsl).len())
                .sum::<usize>()
        });
    });
}

/// Edit to publication through the whole engine.
fn bench_reanalysis(c: &mut Criterion) {
    let host = AnalysisHost::with_builtin_rules(EngineOptions::default())
        .expect("failed to start the engine");
    let module = uri("Large.bsl");
    let text = large_module(METHODS);
    let version = host.open(&module, &text);
    await_version(&host, &module, version);

    let mut edit = 0usize;
    c.bench_function("reanalyze_after_edit", |b| {
        b.iter_batched(
            || {
                edit += 1;
                format!("{text}// правка {edit}\n")
            },
            |edited| {
                let version = host.update(&module, &edited).expect("document is open");
                black_box(await_version(&host, &module, version))
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_parse, bench_rules, bench_reanalysis);
criterion_main!(benches);
