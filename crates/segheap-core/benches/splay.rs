use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use segheap_core::{Keyed, SplayTree};

struct Span {
    base: usize,
    len: usize,
}

impl Keyed for Span {
    type Key = usize;

    fn key(&self) -> usize {
        self.base
    }
}

fn keys(n: usize) -> Vec<usize> {
    let mut rng: u64 = 0xb33f_5eed;
    (0..n)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            (rng >> 16) as usize
        })
        .collect()
}

fn populated(keys: &[usize]) -> SplayTree<Span> {
    let mut tree = SplayTree::new();
    for &base in keys {
        let _ = tree.insert(Span { base, len: 64 });
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let keys = keys(4096);
    c.bench_function("splay_insert_4096", |b| {
        b.iter_batched(
            || keys.clone(),
            |keys| {
                let mut tree = SplayTree::new();
                for base in keys {
                    let _ = tree.insert(Span { base, len: 64 });
                }
                black_box(tree.len())
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_find_hot(c: &mut Criterion) {
    let keys = keys(4096);
    let mut tree = populated(&keys);
    let hot = keys[keys.len() / 2];
    c.bench_function("splay_find_hot", |b| {
        b.iter(|| black_box(tree.find(black_box(&hot)).is_some()));
    });
}

fn bench_successor_walk(c: &mut Criterion) {
    let keys = keys(1024);
    c.bench_function("splay_successor_walk_1024", |b| {
        b.iter_batched(
            || populated(&keys),
            |mut tree| {
                let mut count = 0usize;
                let mut cursor = match tree.minimum() {
                    Some(span) => span.base,
                    None => return count,
                };
                count += 1;
                while let Some(span) = tree.successor(&cursor) {
                    cursor = span.base;
                    count += 1;
                }
                black_box(count)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_insert, bench_find_hot, bench_successor_walk);
criterion_main!(benches);
