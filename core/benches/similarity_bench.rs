use criterion::{criterion_group, criterion_main, Criterion};
use recsys_core::pipeline::build;
use recsys_core::{BuildConfig, CatalogRecord, TitleKind};

const WORDS: &[&str] = &[
    "heist", "family", "detective", "space", "romance", "war", "cartel", "school", "ghost", "kingdom",
    "robot", "village", "lawyer", "chef", "band", "island", "prison", "spy", "vampire", "startup",
];
const GENRES: &[&str] = &["Dramas", "Comedies", "Thrillers", "Documentaries", "Horror Movies", "Crime TV Shows"];

fn synthetic_catalog(n: usize) -> Vec<CatalogRecord> {
    (0..n)
        .map(|i| CatalogRecord {
            title: format!("Title {i}"),
            description: Some((0..8).map(|k| WORDS[(i * 7 + k * 3) % WORDS.len()]).collect::<Vec<_>>().join(" ")),
            genres: vec![GENRES[i % GENRES.len()].to_string(), GENRES[(i / 3) % GENRES.len()].to_string()],
            kind: if i % 2 == 0 { TitleKind::Movie } else { TitleKind::Show },
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let records = synthetic_catalog(1_000);
    let cfg = BuildConfig::default();
    c.bench_function("build_1000_titles", |b| b.iter(|| build(&records, &cfg).unwrap()));
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
