use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fnv::FnvHasher;
use objcache::{EntryOps, ObjectCache};
use rand::{thread_rng, Rng};
use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::marker::PhantomData;

struct Ops<H>(PhantomData<H>);

impl<H> Default for Ops<H> {
    fn default() -> Self {
        Ops(PhantomData)
    }
}

impl<H: Hasher + Default> EntryOps<u64> for Ops<H> {
    type Value = u64;
    type Args = ();
    type Error = ();

    fn key_hash(&self, key: &u64) -> u64 {
        let mut h = H::default();
        h.write_u64(*key);
        h.finish()
    }

    fn key_equal(&self, key: &u64, cached: &u64) -> bool {
        key == cached
    }

    fn create(&self, key: &u64, _: ()) -> Result<u64, ()> {
        Ok(*key)
    }

    fn destroy(&self, _: &u64, _: u64) {}
}

fn random_keys(cases: usize) -> Vec<u64> {
    let mut rng = thread_rng();
    black_box(
        (0..cases)
            .map(|i| {
                if i % 2 == 0 {
                    rng.gen::<u64>() % 16384
                } else {
                    rng.gen::<u64>() % 32768
                }
            })
            .collect(),
    )
}

fn bench_random_fx_hasher(c: &mut Criterion) {
    c.bench_function("Test ObjectCache random keys FX hasher", move |b| {
        let cases = 1_000_000;
        b.iter_batched(
            || {
                let cache: ObjectCache<u64, _> =
                    ObjectCache::new(8192, Ops::<FxHasher>::default());
                (cache, random_keys(cases))
            },
            |(cache, nums)| {
                nums.iter().for_each(|k| {
                    let _ = cache.hold(k, Some(()));
                });
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_random_fnv_hasher(c: &mut Criterion) {
    c.bench_function("Test ObjectCache random keys FNV hasher", move |b| {
        let cases = 1_000_000;
        b.iter_batched(
            || {
                let cache: ObjectCache<u64, _> =
                    ObjectCache::new(8192, Ops::<FnvHasher>::default());
                (cache, random_keys(cases))
            },
            |(cache, nums)| {
                nums.iter().for_each(|k| {
                    let _ = cache.hold(k, Some(()));
                });
            },
            BatchSize::LargeInput,
        )
    });
}

/// Repeated hits on the same few keys, served by the head probe.
fn bench_hot_keys(c: &mut Criterion) {
    c.bench_function("Test ObjectCache hot keys", move |b| {
        let cases = 1_000_000;
        b.iter_batched(
            || {
                let cache: ObjectCache<u64, _> =
                    ObjectCache::new(8192, Ops::<FxHasher>::default());
                let pinned = cache.hold(&0, Some(())).unwrap();
                (cache, pinned)
            },
            |(cache, pinned)| {
                (0..cases).for_each(|i| {
                    let _ = cache.hold(&((i & 1) as u64), Some(()));
                });
                drop(pinned);
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_random_fx_hasher,
    bench_random_fnv_hasher,
    bench_hot_keys
);
criterion_main!(benches);
