//! Benchmarks for the full pipeline.
//!
//! - Single-unit compile on the calling thread
//! - Multi-unit projects through the worker pool, cold and warm cache
//! - Dependency ordering on large graphs

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vbstudio::{
    CompilationUnit, CompileOptions, Compiler, CompilerConfig, DependencyGraph, PatternExtractor,
    Pipeline,
};

/// `units` modules where each one loads the next.
fn project(units: usize) -> Vec<(String, String)> {
    (0..units)
        .map(|i| {
            let source = format!(
                "Load Module{}\nDim total As Long\n\n\
                 Function Step{i}(ByVal n As Long) As Long\n\
                 \x20   Step{i} = n * 2 + total\nEnd Function\n",
                i + 1
            );
            (format!("Module{i}"), source)
        })
        .collect()
}

fn compiler() -> Compiler {
    match Compiler::create(CompilerConfig::default()) {
        Ok(compiler) => compiler,
        Err(err) => panic!("failed to create compiler: {}", err),
    }
}

fn single_unit_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/single_unit");
    let pipeline = Pipeline::default();

    let form = include_str!("../test_scripts/frmMain.bas");
    group.bench_function("form", |b| {
        b.iter(|| black_box(pipeline.run(black_box(form), &CompileOptions::default())))
    });

    let minified = CompileOptions {
        minification: true,
        ..CompileOptions::default()
    };
    group.bench_function("form_minified", |b| {
        b.iter(|| black_box(pipeline.run(black_box(form), &minified)))
    });

    group.finish();
}

fn project_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/project");
    group.sample_size(20);

    for units in [10, 100] {
        let sources = project(units);

        group.bench_function(format!("{units}_units_cold"), |b| {
            b.iter_batched(
                compiler,
                |mut compiler| {
                    black_box(compiler.compile(sources.clone(), &CompileOptions::default()))
                },
                BatchSize::PerIteration,
            )
        });

        let mut warm = compiler();
        warm.compile(sources.clone(), &CompileOptions::default());
        group.bench_function(format!("{units}_units_warm"), |b| {
            b.iter(|| black_box(warm.compile(sources.clone(), &CompileOptions::default())))
        });
    }

    group.finish();
}

fn ordering_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/ordering");

    let extractor = PatternExtractor::new();
    let units: Vec<CompilationUnit> = project(5000)
        .into_iter()
        .map(|(id, source)| CompilationUnit::new(id, source, &extractor))
        .collect();
    let graph = DependencyGraph::from_units(&units);

    group.bench_function("chain_5000", |b| {
        b.iter(|| black_box(graph.topological_order(units.iter().map(CompilationUnit::id))))
    });

    group.finish();
}

criterion_group!(benches, single_unit_benchmarks, project_benchmarks, ordering_benchmarks);
criterion_main!(benches);
