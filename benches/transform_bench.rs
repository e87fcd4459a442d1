//! Benchmark for transformation operations
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

use lowp_optimizer::graph::{Attributes, Graph, OpKind};
use lowp_optimizer::tensor::{array_from_vec, scalar, QuantRange};
use lowp_optimizer::transform::Pipeline;

/// `branches` independent `Constant -> (Identity, Reshape)* -> QuantizeRange -> Result`
/// chains, each `depth` preserving nodes long
fn chain_graph(branches: usize, depth: usize) -> Graph {
    let range = QuantRange {
        input_low: scalar(-1.0),
        input_high: scalar(1.0),
        output_low: scalar(-1.0),
        output_high: scalar(1.0),
        levels: 256,
    };

    let mut graph = Graph::new();
    for b in 0..branches {
        let data: Vec<f32> = (0..64).map(|i| ((i * 7 + b) % 23) as f32 / 11.0 - 1.0).collect();
        let mut prev = graph
            .add_constant(format!("c{}", b), array_from_vec(data, &[8, 8]).unwrap())
            .unwrap();
        for d in 0..depth {
            let (kind, attrs) = if d % 2 == 0 {
                (OpKind::Identity, Attributes::new())
            } else {
                let shape = if d % 4 == 1 { vec![64i64] } else { vec![8i64, 8] };
                (OpKind::Reshape, Attributes::new().with("shape", shape))
            };
            prev = graph
                .add_node(kind, format!("n{}_{}", b, d), &[prev.into()], attrs)
                .unwrap();
        }
        let q = graph
            .add_node(
                OpKind::QuantizeRange,
                format!("q{}", b),
                &[prev.into()],
                range.to_attributes(),
            )
            .unwrap();
        graph.add_result(format!("out{}", b), q.into()).unwrap();
    }
    graph
}

fn transform_benchmark(c: &mut Criterion) {
    let pipeline = Pipeline::builtin().unwrap();
    let mut group = c.benchmark_group("builtin_pipeline");

    for &(branches, depth) in &[(16, 2), (64, 8), (256, 4)] {
        let graph = chain_graph(branches, depth);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", branches, depth)),
            &graph,
            |b, graph| {
                b.iter_batched(
                    || graph.clone(),
                    |mut g| black_box(pipeline.run(&mut g).unwrap()),
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();

    let graph = chain_graph(256, 8);
    c.bench_function("topological_order_256x8", |b| {
        b.iter_batched(
            || graph.clone(),
            |g| black_box(g.topological_order().len()),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, transform_benchmark);
criterion_main!(benches);
