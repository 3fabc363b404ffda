//! Reconciliation benchmarks
//!
//! Measures keyed list updates against the in-memory host, and the LIS step
//! on its own.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::reactive::Runtime;
use ripple_core::render::{longest_increasing_subsequence, MemoryHost, Renderer, VNode};

fn list(keys: &[usize]) -> VNode {
    VNode::element("ul").children(
        keys.iter()
            .map(|key| VNode::element("li").key(*key).text_content(key.to_string())),
    )
}

/// Deterministic shuffle so runs are comparable.
fn scrambled(len: usize) -> Vec<usize> {
    let mut keys: Vec<usize> = (1..=len).collect();
    let mut seed = 0x2545_f491_4f6c_dd1d_u64;
    for i in (1..keys.len()).rev() {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        keys.swap(i, (seed % (i as u64 + 1)) as usize);
    }
    keys
}

fn bench_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reorder");

    for len in [100, 1_000] {
        let sorted: Vec<usize> = (1..=len).collect();
        let reversed: Vec<usize> = sorted.iter().rev().copied().collect();
        let shuffled = scrambled(len);

        for (name, target) in [("reverse", &reversed), ("shuffle", &shuffled)] {
            group.bench_with_input(BenchmarkId::new(name, len), target, |b, target| {
                let rt = Runtime::new();
                let mut host = MemoryHost::new();
                let root = host.create_root();
                let renderer = Renderer::new(&rt, host);

                b.iter(|| {
                    renderer.render(Some(list(&sorted)), root).unwrap();
                    renderer.render(Some(list(black_box(target))), root).unwrap();
                    renderer.host_mut().take_ops();
                });
            });
        }
    }

    group.finish();
}

fn bench_lis(c: &mut Criterion) {
    let mut group = c.benchmark_group("lis");

    for len in [100, 10_000] {
        let sources: Vec<Option<usize>> = scrambled(len)
            .into_iter()
            .map(|key| (key % 7 != 0).then_some(key))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(len), &sources, |b, sources| {
            b.iter(|| longest_increasing_subsequence(black_box(sources)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reorder, bench_lis);
criterion_main!(benches);
