use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use meshcache::lru::LruStore;
use meshcache::singleflight::FlightGroup;
use meshcache::ByteView;

fn lru_ops(c: &mut Criterion) {
  c.bench_function("lru_add_then_get", |b| {
    let mut store: LruStore<ByteView> = LruStore::new(64 * 1024);
    let value = ByteView::from("x".repeat(64));
    let keys: Vec<String> = (0..1024).map(|i| format!("key-{i}")).collect();
    let mut i = 0usize;
    b.iter(|| {
      let key = &keys[i & 1023];
      store.add(key, value.clone());
      black_box(store.get(key).is_some());
      i += 1;
    });
  });

  c.bench_function("lru_hit", |b| {
    let mut store: LruStore<ByteView> = LruStore::new(64 * 1024);
    store.add("hot", ByteView::from("x".repeat(64)));
    b.iter(|| black_box(store.get("hot").is_some()));
  });
}

fn singleflight_ops(c: &mut Criterion) {
  c.bench_function("singleflight_uncontended", |b| {
    let group: FlightGroup<u64> = FlightGroup::new();
    b.iter(|| black_box(group.run("key", || 42)));
  });
}

criterion_group!(benches, lru_ops, singleflight_ops);
criterion_main!(benches);
