use criterion::{criterion_group, criterion_main, Criterion};
use searchcore::lemmatizer::Lemmatizer;

const TEXT: &str = "Cats are small carnivorous mammals. Domestic cats are valued by humans for \
companionship and their ability to kill vermin. Dogs were the first species to be domesticated \
and have been selectively bred over millennia for various behaviours and physical attributes.";

fn bench_lemma_counts(c: &mut Criterion) {
    let lemmatizer = Lemmatizer::english();
    c.bench_function("lemma_counts_paragraph", |b| b.iter(|| lemmatizer.lemma_counts(TEXT)));
    c.bench_function("locate_occurrences_paragraph", |b| b.iter(|| lemmatizer.locate_occurrences(TEXT, "cat")));
}

criterion_group!(benches, bench_lemma_counts);
criterion_main!(benches);
