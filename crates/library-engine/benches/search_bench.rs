//! Library Engine Search Benchmarks
//!
//! Benchmarks for the hot paths of vector and text search.
//! Run with: cargo bench -p library-engine

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use library_engine::index::InvertedIndex;
use library_engine::similarity::{cosine, fast_cosine, MagnitudeCache};
use library_engine::textsearch::{bm25_scores, fuzzy_score, token_score};

fn sample_embedding(dim: usize, seed: usize) -> Vec<f32> {
    (0..dim).map(|i| ((seed * dim + i) as f32).sin()).collect()
}

fn bench_cosine(c: &mut Criterion) {
    let a = sample_embedding(256, 1);
    let b = sample_embedding(256, 2);

    c.bench_function("cosine_256d", |bencher| {
        bencher.iter(|| {
            black_box(cosine(&a, &b));
        })
    });
}

fn bench_fast_cosine_with_cache(c: &mut Criterion) {
    let query = sample_embedding(256, 1);
    let query_magnitude = (query.iter().map(|x| x * x).sum::<f32>()).sqrt();
    let entries: Vec<(String, Vec<f32>)> = (0..200)
        .map(|i| (format!("id-{i}"), sample_embedding(256, i)))
        .collect();

    c.bench_function("fast_cosine_200_entries_cached", |bencher| {
        let mut cache = MagnitudeCache::new();
        for (id, embedding) in &entries {
            cache.get_or_compute(id, embedding);
        }
        bencher.iter(|| {
            for (id, embedding) in &entries {
                black_box(fast_cosine(&query, query_magnitude, id, embedding, &mut cache));
            }
        })
    });
}

fn bench_bm25(c: &mut Criterion) {
    let mut index = InvertedIndex::new();
    let corpus = [
        "the quick brown fox jumps over the lazy dog",
        "rust ownership borrowing and lifetimes explained",
        "async runtimes schedule cooperative tasks on a reactor",
        "vector search ranks embeddings by cosine similarity",
        "bm25 scores documents by term frequency and inverse document frequency",
    ];
    for (i, doc) in corpus.iter().enumerate() {
        index.add(&format!("doc-{i}"), doc);
    }

    c.bench_function("bm25_scores_5_docs", |bencher| {
        bencher.iter(|| {
            black_box(bm25_scores(&index, "vector search term frequency"));
        })
    });
}

fn bench_token_score(c: &mut Criterion) {
    let text = "bm25 scores documents by term frequency and inverse document frequency";

    c.bench_function("token_score", |bencher| {
        bencher.iter(|| {
            black_box(token_score("term frequency document", text));
        })
    });
}

fn bench_fuzzy_score(c: &mut Criterion) {
    let text = "the quick brown fox jumps over the lazy dog";

    c.bench_function("fuzzy_score", |bencher| {
        bencher.iter(|| {
            black_box(fuzzy_score("quikc brwon fox", text));
        })
    });
}

fn bench_magnitude_cache_cold_miss(c: &mut Criterion) {
    let embeddings: Vec<Vec<f32>> = (0..100).map(|i| sample_embedding(128, i)).collect();

    c.bench_function("magnitude_cache_100_cold_misses", |bencher| {
        bencher.iter(|| {
            let mut cache = MagnitudeCache::new();
            for (i, embedding) in embeddings.iter().enumerate() {
                black_box(cache.get_or_compute(&format!("id-{i}"), embedding));
            }
        })
    });
}

fn bench_timestamp_now(c: &mut Criterion) {
    // Cheap sanity benchmark: confirms chrono's clock read stays negligible
    // relative to the scoring paths above.
    c.bench_function("utc_now", |bencher| {
        bencher.iter(|| {
            black_box(Utc::now());
        })
    });
}

criterion_group!(
    benches,
    bench_cosine,
    bench_fast_cosine_with_cache,
    bench_bm25,
    bench_token_score,
    bench_fuzzy_score,
    bench_magnitude_cache_cold_miss,
    bench_timestamp_now,
);
criterion_main!(benches);
