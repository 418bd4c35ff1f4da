use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use hrq2mongoq::emitter::Emitter;
use hrq2mongoq::lexer::{tokenize, Lexer};
use hrq2mongoq::parser::Parser;
use hrq2mongoq::{Compiler, Reviver};

const CASES: &[(&str, &str)] = &[
    ("simple", r#"status = "Open""#),
    ("medium", r#"status IN ["Open", "Pending"] AND priority > 2 AND assignee != "bob""#),
    (
        "complex",
        r#"(title ~ "^Release" OR tags IN ["v1", "v2"]) AND NOT archived = true AND created >= date("2015-01-01T00:00:00Z") AND owner = oid("507f1f77bcf86cd799439011")"#,
    ),
    (
        "wide_or",
        r#"s = "Open" OR s = "Pending" OR s = "Review" OR s = "Approved" OR s = "Testing" OR s = "Done""#,
    ),
];

fn benchmark_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_performance");

    for &(name, hrq) in CASES {
        group.bench_with_input(BenchmarkId::new("tokenize", name), &hrq, |b, &hrq| {
            b.iter(|| {
                let tokens: Vec<_> = Lexer::new(black_box(hrq)).collect();
                black_box(tokens)
            })
        });
    }

    group.finish();
}

fn benchmark_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_performance");

    for &(name, hrq) in CASES {
        let tokens = tokenize(hrq).expect("benchmark query should lex");

        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, tokens| {
            b.iter(|| {
                let ast = Parser::new(black_box(tokens)).parse().expect("benchmark query should parse");
                black_box(ast)
            })
        });
    }

    group.finish();
}

fn benchmark_emitter(c: &mut Criterion) {
    let mut group = c.benchmark_group("emitter_performance");
    let emitter = Emitter::new();

    for &(name, hrq) in CASES {
        let tokens = tokenize(hrq).expect("benchmark query should lex");
        let ast = Parser::new(&tokens).parse().expect("benchmark query should parse");

        group.bench_with_input(BenchmarkId::new("emit", name), &ast, |b, ast| {
            b.iter(|| {
                let doc = emitter.emit(black_box(ast)).expect("benchmark query should emit");
                black_box(doc)
            })
        });
    }

    group.finish();
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end_performance");
    let compiler = Compiler::default();

    for &(name, hrq) in CASES {
        group.bench_with_input(BenchmarkId::new("compile", name), &hrq, |b, &hrq| {
            b.iter(|| {
                let filter = compiler.compile(black_box(hrq)).expect("benchmark query should compile");
                black_box(filter)
            })
        });
    }

    group.finish();
}

fn benchmark_revive_json(c: &mut Criterion) {
    let reviver = Reviver::default();
    let text = serde_json::to_string(&Compiler::default().compile(CASES[2].1).expect("benchmark query should compile"))
        .expect("filter should serialize");

    c.bench_function("revive_extended_json", |b| {
        b.iter(|| {
            let doc = reviver.revive_json_str(black_box(&text)).expect("filter should revive");
            black_box(doc)
        })
    });
}

criterion_group!(
    benches,
    benchmark_lexer,
    benchmark_parser,
    benchmark_emitter,
    benchmark_end_to_end,
    benchmark_revive_json
);
criterion_main!(benches);
