use criterion::{black_box, criterion_group, criterion_main, Criterion};

use readgap_core::model::{Band, QuestionResult};
use readgap_core::scoring::{weighted_accuracy, Scorer};

fn results(n: usize) -> Vec<QuestionResult> {
    (0..n)
        .map(|i| QuestionResult {
            difficulty: 1.0 + (i % 9) as f64 * 0.5,
            correct: i % 3 != 0,
        })
        .collect()
}

fn bench_weighted_accuracy(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_accuracy");

    for n in [3, 15, 1000] {
        let set = results(n);
        group.bench_function(format!("n={n}"), |b| {
            b.iter(|| weighted_accuracy(black_box(&set)))
        });
    }

    group.finish();
}

fn bench_band(c: &mut Criterion) {
    c.bench_function("band_from_gap", |b| {
        b.iter(|| {
            for gap in [-40.0, 0.5, 1.0, 1.51, 60.0] {
                black_box(Band::from_gap(black_box(gap)));
            }
        })
    });
}

fn bench_fallback_scorer(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let scorer = Scorer::deterministic();
    let english = results(15);
    let l1 = results(3);

    c.bench_function("score (fallback service)", |b| {
        b.iter(|| rt.block_on(scorer.score(black_box(&english), black_box(&l1))))
    });
}

criterion_group!(benches, bench_weighted_accuracy, bench_band, bench_fallback_scorer);
criterion_main!(benches);
