use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use regbpe::{Trainer, TrainerConfig};

fn build_corpus() -> String {
    const WORDS: [&str; 12] = [
        "token", "merge", "pair", "byte", "encode", "decode", "vocab", "chunk", "regex", "the",
        "of", "and",
    ];
    let mut text = String::with_capacity(1 << 20);
    let mut index = 0usize;
    while text.len() < (1 << 20) {
        text.push_str(WORDS[index % WORDS.len()]);
        text.push_str(if index % 17 == 0 { ".\n" } else { " " });
        if index % 29 == 0 {
            text.push_str(&index.to_string());
            text.push(' ');
        }
        index = index.wrapping_mul(31).wrapping_add(7) % 10_007;
    }
    text
}

fn bench_training(c: &mut Criterion) {
    let corpus = build_corpus();
    let cfg = TrainerConfig::builder()
        .target_vocab_size(512)
        .show_progress(false)
        .build()
        .expect("configuration");

    let mut group = c.benchmark_group("train_text_corpus");
    group.throughput(Throughput::Bytes(corpus.len() as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.bench_function(BenchmarkId::from_parameter("MiB_1"), |b| {
        b.iter(|| {
            let trainer = Trainer::new(cfg.clone());
            let artefacts = trainer.train(&corpus).expect("training");
            let _ = black_box(artefacts);
        });
    });
    group.finish();

    let model = Trainer::new(cfg.clone())
        .train(&corpus)
        .expect("training")
        .model;
    let mut group = c.benchmark_group("encode_text");
    group.throughput(Throughput::Bytes(corpus.len() as u64));
    group.bench_function("MiB_1", |b| {
        b.iter(|| black_box(model.encode_ordinary(&corpus).expect("encode")));
    });
    group.finish();
}

criterion_group!(benches, bench_training);
criterion_main!(benches);
