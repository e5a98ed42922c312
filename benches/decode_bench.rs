//! Benchmarks for chart construction and rescoring.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use itg_reorder::{FeatureDataSequence, FeatureSet, HyperGraph, ReordererModel, SequenceFeatureGen};

const WORDS: &str = "the quick brown fox jumps over the lazy dog near the old river bank";
const TAGS: &str = "DT JJ JJ NN VBZ IN DT JJ NN IN DT JJ NN NN";

fn sentence(len: usize) -> Vec<FeatureDataSequence> {
    vec![
        WORDS.split(' ').cycle().take(len).collect(),
        TAGS.split(' ').cycle().take(len).collect(),
    ]
}

fn feature_set() -> FeatureSet<SequenceFeatureGen> {
    FeatureSet::new()
        .with_generator(SequenceFeatureGen::new("W"))
        .with_generator(SequenceFeatureGen::new("P"))
}

/// A model with a fixed pseudo-random weight for every feature of `sent`.
fn model_for(features: &mut FeatureSet<SequenceFeatureGen>, sent: &[FeatureDataSequence]) -> ReordererModel {
    let mut graph = HyperGraph::new();
    graph.build(&ReordererModel::new(), features, sent).unwrap();
    let weights = (0..features.symbols().len())
        .map(|i| ((i * 7919) % 201) as f64 / 100.0 - 1.0)
        .collect();
    ReordererModel::from_weights(weights)
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &(len, beam) in &[(10, 0), (10, 10), (20, 10), (40, 10)] {
        let sent = sentence(len);
        let mut features = feature_set();
        let model = model_for(&mut features, &sent);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("n{}_k{}", len, beam)),
            &sent,
            |b, sent| {
                b.iter(|| {
                    let mut graph = HyperGraph::with_beam_size(beam);
                    graph.build(&model, &mut features, black_box(sent)).unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_rescore(c: &mut Criterion) {
    let sent = sentence(20);
    let mut features = feature_set();
    let model = model_for(&mut features, &sent);
    let mut graph = HyperGraph::with_beam_size(10);
    graph.build(&model, &mut features, &sent).unwrap();

    c.bench_function("rescore_n20_k10", |b| {
        b.iter(|| graph.rescore(black_box(&model), 1.0).unwrap())
    });
}

criterion_group!(benches, bench_build, bench_rescore);
criterion_main!(benches);
