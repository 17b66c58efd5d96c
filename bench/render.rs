use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mask_attention::viz::{AttentionSweep, BlockFont, DiagramLayout, DiagramRenderer};
use mask_attention::AttentionTensor;
use ndarray::Array4;

#[derive(Clone, Copy)]
struct RenderConfig {
    name: &'static str,
    layers: usize,
    heads: usize,
    tokens: usize,
}

/// Roughly the shape of a base-size BERT run on a short sentence, plus a
/// longer input to show how cell count dominates.
const RENDER_CONFIGS: &[RenderConfig] = &[
    RenderConfig {
        name: "l2_h4_t8",
        layers: 2,
        heads: 4,
        tokens: 8,
    },
    RenderConfig {
        name: "l12_h12_t12",
        layers: 12,
        heads: 12,
        tokens: 12,
    },
    RenderConfig {
        name: "l2_h2_t64",
        layers: 2,
        heads: 2,
        tokens: 64,
    },
];

const SWEEP_WORKERS: &[usize] = &[1, 4];

fn labels(count: usize) -> Vec<String> {
    (0..count).map(|idx| format!("tok{idx}")).collect()
}

fn attention(cfg: &RenderConfig) -> AttentionTensor {
    let shape = (cfg.layers, cfg.heads, cfg.tokens, cfg.tokens);
    let weights = Array4::from_shape_fn(shape, |(layer, head, query, key)| {
        ((layer + head + query * key) % 17) as f32 / 16.0
    });
    AttentionTensor::new(weights).expect("attention tensor")
}

fn diagram_bench(c: &mut Criterion) {
    let font = BlockFont::default();
    let renderer = DiagramRenderer::new(DiagramLayout::default(), &font);
    let mut group = c.benchmark_group("attention_diagram/render");

    for cfg in RENDER_CONFIGS {
        let tokens = labels(cfg.tokens);
        let attention = attention(cfg);
        group.throughput(Throughput::Elements((cfg.tokens * cfg.tokens) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(cfg.name), cfg, |b, _| {
            b.iter(|| {
                let canvas = renderer
                    .render(&tokens, attention.head(0, 0))
                    .expect("render diagram");
                black_box(canvas);
            });
        });
    }

    group.finish();
}

fn sweep_bench(c: &mut Criterion) {
    let font = BlockFont::default();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut group = c.benchmark_group("attention_diagram/sweep");
    group.sample_size(10);

    for cfg in RENDER_CONFIGS {
        let tokens = labels(cfg.tokens);
        let attention = attention(cfg);
        group.throughput(Throughput::Elements((cfg.layers * cfg.heads) as u64));

        for &workers in SWEEP_WORKERS {
            let sweep = AttentionSweep::new(
                DiagramRenderer::new(DiagramLayout::default(), &font),
                dir.path().join(cfg.name),
            )
            .with_workers(workers);
            let id = BenchmarkId::new(cfg.name, format!("workers{workers}"));
            group.bench_with_input(id, cfg, |b, _| {
                b.iter(|| {
                    let report = sweep.run(&tokens, &attention).expect("sweep");
                    black_box(report);
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, diagram_bench, sweep_bench);
criterion_main!(benches);
