//! Benchmarks for the in-memory conversation store.
//!
//! Measures turn-pair appends and history reads, both on a single hot
//! conversation and spread across many conversations.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use concierge_chat::ConversationStore;
use concierge_core::types::Turn;

fn seeded_store(conversations: usize, pairs: usize) -> ConversationStore {
    let store = ConversationStore::new(Duration::from_secs(3600));
    for c in 0..conversations {
        let id = format!("conv-{}", c);
        for p in 0..pairs {
            store
                .append_pair(
                    &id,
                    Turn::user(format!("¿Cuánto cuesta el modelo X{}?", p)),
                    Turn::assistant("El modelo cuesta $299.990 CLP"),
                )
                .unwrap();
        }
    }
    store
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_append");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("append_pair_hot_conversation", |b| {
        let store = ConversationStore::new(Duration::from_secs(3600));
        b.iter(|| {
            store
                .append_pair("hot", Turn::user("hola"), Turn::assistant("¡Hola!"))
                .unwrap()
        });
    });

    group.bench_function("append_pair_1000_conversations", |b| {
        let store = seeded_store(1000, 1);
        let ids: Vec<String> = (0..1000).map(|c| format!("conv-{}", c)).collect();
        let mut idx = 0usize;
        b.iter(|| {
            let id = &ids[idx % ids.len()];
            idx += 1;
            store
                .append_pair(id, Turn::user("hola"), Turn::assistant("¡Hola!"))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let store = seeded_store(100, 10);

    let mut group = c.benchmark_group("store_read");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("get_history_20_turns", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let history = store.get_history(&format!("conv-{}", idx % 100)).unwrap();
            idx += 1;
            history
        });
    });

    group.bench_function("get_history_unknown", |b| {
        b.iter(|| store.get_history("missing").unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_read);
criterion_main!(benches);
