//! Benchmarks for flow execution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tutorflow::pipeline::FlowBuilder;
use tutorflow::stages::NoOpStage;

fn flow_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("noop_flow");
    for length in [1_usize, 6, 32] {
        let mut builder = FlowBuilder::<u64>::new("bench");
        for i in 0..length {
            builder = builder.stage(NoOpStage::new(format!("stage_{i}"))).unwrap();
        }
        let flow = builder.chain().unwrap().build().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(length), &flow, |b, flow| {
            b.iter(|| {
                let mut state = 0_u64;
                let report = runtime.block_on(flow.run(&mut state)).unwrap();
                black_box(report)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, flow_benchmark);
criterion_main!(benches);
