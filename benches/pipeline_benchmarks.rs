//! Criterion benchmarks for the semantic pipeline and IR emission.
//!
//! Run with: `cargo bench`
//!
//! Synthetic programs keep the numbers reproducible across machines.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sushic::passes::run_pipeline;
use sushic::syntax::parse_unit;
use sushic::{compile_to_ir, Context, Reporter};

// ─── Helpers ─────────────────────────────────────────────────────────

/// A program with N hashable structs, N functions, and a main that touches
/// all of them.
fn synthetic_program(n: usize) -> String {
    let mut src = String::new();
    for i in 0..n {
        src.push_str(&format!("struct S{i}{{i32 a, i32 b}}\n"));
        src.push_str(&format!(
            "fn f{i}(S{i} s) i32:\n    return s.a + s.b\n"
        ));
    }
    src.push_str("fn main() i32:\n");
    for i in 0..n {
        src.push_str(&format!("    i32 v{i} = f{i}(S{i}{{1, 2}})?\n"));
    }
    src.push_str("    return 0\n");
    src
}

/// Generic-heavy program: one generic function instantiated at N distinct
/// struct types, exercising the monomorphizer's fixed point.
fn generic_program(n: usize) -> String {
    let mut src = String::from("fn id<T>(T v) T: return v\n");
    for i in 0..n {
        src.push_str(&format!("struct G{i}{{i32 x}}\n"));
    }
    src.push_str("fn main() i32:\n");
    for i in 0..n {
        src.push_str(&format!("    G{i} g{i} = id(G{i}{{1}})?\n"));
    }
    src.push_str("    return 0\n");
    src
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for n in [10, 50, 200] {
        let src = synthetic_program(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| parse_unit(0, black_box(src)).unwrap());
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    for n in [10, 50, 200] {
        let src = synthetic_program(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let mut reporter = Reporter::new();
                let file_id = reporter.add_file("bench.sushi", src);
                let program = parse_unit(file_id, src).unwrap();
                let mut ctx = Context::new();
                let mut programs = vec![program];
                run_pipeline(&mut ctx, &mut reporter, &mut programs);
                assert!(!reporter.has_errors());
                black_box(ctx)
            });
        });
    }
    group.finish();
}

fn bench_monomorphization(c: &mut Criterion) {
    let mut group = c.benchmark_group("monomorphize");
    for n in [10, 50] {
        let src = generic_program(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let mut reporter = Reporter::new();
                let file_id = reporter.add_file("bench.sushi", src);
                let program = parse_unit(file_id, src).unwrap();
                let mut ctx = Context::new();
                let mut programs = vec![program];
                run_pipeline(&mut ctx, &mut reporter, &mut programs);
                assert!(!reporter.has_errors());
                black_box(ctx.monomorphized_functions.len())
            });
        });
    }
    group.finish();
}

fn bench_end_to_end_ir(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    for n in [10, 50] {
        let src = synthetic_program(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let ir = compile_to_ir(&[("bench.sushi", black_box(src))]).unwrap();
                black_box(ir.len())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_pipeline,
    bench_monomorphization,
    bench_end_to_end_ir
);
criterion_main!(benches);
