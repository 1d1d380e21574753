use criterion::{criterion_group, criterion_main, Criterion};
use postdex_core::aggregate::TermAggregator;
use postdex_core::config::IndexConfig;
use postdex_core::pipeline::build_index;
use postdex_core::tokenizer::{count_tokens, TokenFilter};
use postdex_core::SearchEngine;

fn sample_text() -> String {
    let words = ["index", "posting", "dictionary", "hash", "chain", "weight", "document", "search", "token", "slot"];
    (0..5_000).map(|i| words[(i * 7 + i / 3) % words.len()]).collect::<Vec<_>>().join(" ")
}

fn bench_tokenize(c: &mut Criterion) {
    let text = sample_text();
    let filter = TokenFilter::default();
    c.bench_function("count_tokens_5k_words", |b| b.iter(|| count_tokens(&text, &filter)));
}

fn bench_build_and_search(c: &mut Criterion) {
    let counts = count_tokens(&sample_text(), &TokenFilter::default());
    let build = || {
        let mut agg = TermAggregator::new();
        for d in 0..200 {
            let doc = format!("doc{d}.html");
            for (token, count) in &counts {
                agg.add(&doc, &format!("{token}{}", d % 17), *count);
            }
        }
        build_index(agg.finish(), &IndexConfig::default()).expect("valid config")
    };
    c.bench_function("build_200_docs", |b| b.iter(&build));
    let engine = SearchEngine::from_index(build());
    c.bench_function("search_hit", |b| b.iter(|| engine.search("posting3")));
}

criterion_group!(benches, bench_tokenize, bench_build_and_search);
criterion_main!(benches);
