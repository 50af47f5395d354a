use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

use emlsearch::index::tokenizer::tokenize;
use emlsearch::index::{IndexStore, StoreOptions};
use emlsearch::model::record::EmailRecord;

const BODY: &str = "Hi team, the staging deploy for the customer portal went out this \
morning. Remaining items: certificate renewal, the CSV export timeout and the \
mobile layout regression. Budget review moves to Thursday.";

fn records(n: usize) -> Vec<EmailRecord> {
    (0..n)
        .map(|i| {
            EmailRecord::new(
                format!("Client{}/Project{}/{i}.eml", i % 7, i % 3),
                format!("Status update {i}: deploy and budget"),
                format!("user{}@example.com", i % 11),
                BODY,
                Utc::now(),
            )
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_body", |b| b.iter(|| tokenize(BODY)));
}

fn bench_index_records(c: &mut Criterion) {
    let batch = records(200);
    c.bench_function("index_200_records", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let options = StoreOptions {
                compact_after: 1000,
                ..StoreOptions::default()
            };
            let mut store = IndexStore::open_at(dir.path(), options).unwrap();
            for record in batch.iter().cloned() {
                store.index_record(record).unwrap();
            }
            store.close().unwrap();
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut store = IndexStore::open_at(dir.path(), StoreOptions::default()).unwrap();
    for record in records(2000) {
        store.index_record(record).unwrap();
    }

    c.bench_function("search_terms", |b| {
        b.iter(|| store.search("budget deploy", 10).unwrap())
    });
    c.bench_function("search_phrase", |b| {
        b.iter(|| store.search("\"certificate renewal\" -mobile", 10).unwrap())
    });
}

criterion_group!(benches, bench_tokenize, bench_index_records, bench_search);
criterion_main!(benches);
