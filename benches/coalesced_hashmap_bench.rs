use coalesced_hashmap::CoalescedHashMap;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("coalesced::insert_fresh_100k", |b| {
        b.iter_batched(
            CoalescedHashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("hashbrown::insert_fresh_100k", |b| {
        b.iter_batched(
            hashbrown::HashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.entry(key(x)).or_insert(i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_erase_reinsert_10k(c: &mut Criterion) {
    c.bench_function("coalesced::erase_reinsert_10k_of_100k", |b| {
        b.iter_batched(
            || {
                let mut m = CoalescedHashMap::new();
                let keys: Vec<String> = lcg(5).take(100_000).map(key).collect();
                for (i, k) in keys.iter().enumerate() {
                    m.insert(k.clone(), i as u64);
                }
                // Every tenth key: erased, then revived from its tombstone.
                let picked: Vec<String> = keys.into_iter().step_by(10).collect();
                (m, picked)
            },
            |(mut m, picked)| {
                for k in &picked {
                    m.erase(k);
                }
                for k in picked {
                    m.insert(k, 0);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_10k(c: &mut Criterion) {
    let keys: Vec<_> = lcg(7).take(100_000).map(key).collect();
    let n = keys.len();
    let mut s = 0x9e3779b97f4a7c15u64;
    let queries: Vec<String> = (0..10_000)
        .map(|_| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            keys[(s as usize) % n].clone()
        })
        .collect();

    let mut m = CoalescedHashMap::new();
    let mut h = hashbrown::HashMap::new();
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64);
        h.insert(k.clone(), i as u64);
    }

    c.bench_function("coalesced::find_hit_10k_on_100k", |b| {
        b.iter(|| {
            for k in &queries {
                black_box(m.get(k));
            }
        })
    });
    c.bench_function("hashbrown::find_hit_10k_on_100k", |b| {
        b.iter(|| {
            for k in &queries {
                black_box(h.get(k));
            }
        })
    });
}

fn bench_find_miss_10k(c: &mut Criterion) {
    c.bench_function("coalesced::find_miss_10k_on_100k", |b| {
        let mut m = CoalescedHashMap::new();
        for (i, x) in lcg(11).take(100_000).enumerate() {
            m.insert(key(x), i as u64);
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(m.find(&k).is_end());
            }
        })
    });
}

fn bench_iter_and_iter_mut(c: &mut Criterion) {
    c.bench_function("coalesced::iter_all_100k", |b| {
        let mut m = CoalescedHashMap::new();
        for (i, x) in lcg(999).take(100_000).enumerate() {
            m.insert(key(x), i as u64);
        }
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in m.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("coalesced::iter_mut_increment_all_100k", |b| {
        b.iter_batched(
            || {
                let mut m = CoalescedHashMap::new();
                for (i, x) in lcg(1001).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                m
            },
            |mut m| {
                for v in m.values_mut() {
                    *v = v.wrapping_add(1);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_erase_reinsert_10k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_find_hit_10k,
              bench_find_miss_10k,
              bench_iter_and_iter_mut
}
criterion_main!(benches_insert, benches_ops);
