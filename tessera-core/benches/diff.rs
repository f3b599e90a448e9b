//! Benchmarks for the keyed-children diff algorithms
//!
//! Run with: cargo bench -p tessera-core --bench diff
//!
//! Each iteration reconciles a keyed list into a permutation of itself and
//! back, against the in-memory host.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tessera_core::config::DiffStrategy;
use tessera_core::render::{MemoryHost, MemoryNode, Renderer, VNode};

fn list(keys: &[usize]) -> VNode<MemoryNode> {
    VNode::element("ul").with_children(
        keys.iter()
            .map(|key| VNode::element("li").with_key(*key).with_text(&key.to_string()))
            .collect(),
    )
}

/// Named permutations of `0..len`.
fn permutations(len: usize) -> Vec<(&'static str, Vec<usize>)> {
    let ordered: Vec<usize> = (0..len).collect();

    let reversed: Vec<usize> = ordered.iter().rev().copied().collect();

    let mut single_move = ordered.clone();
    let moved = single_move.remove(1);
    single_move.insert(len - 2, moved);

    // Deterministic scatter: stride through the list with a step coprime to len
    let step = (1..len).rev().find(|s| gcd(*s, len) == 1 && *s < len / 2).unwrap_or(1);
    let scattered: Vec<usize> = (0..len).map(|i| (i * step) % len).collect();

    vec![
        ("reverse", reversed),
        ("single_move", single_move),
        ("scatter", scattered),
    ]
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn bench_keyed_diff(c: &mut Criterion) {
    for (name, strategy) in [("fast", DiffStrategy::Fast), ("double_ended", DiffStrategy::DoubleEnded)] {
        let mut group = c.benchmark_group(format!("diff/{name}"));

        for len in [100usize, 1_000] {
            let original: Vec<usize> = (0..len).collect();
            for (shape, permuted) in permutations(len) {
                let mut renderer = Renderer::new(MemoryHost::new());
                renderer.set_strategy(strategy);
                let root = renderer.host_mut().create_root();
                renderer.render(Some(list(&original)), &root).unwrap();

                group.throughput(Throughput::Elements(len as u64));
                group.bench_with_input(BenchmarkId::new(shape, len), &len, |b, _| {
                    b.iter(|| {
                        renderer.render(Some(list(&permuted)), &root).unwrap();
                        renderer.render(Some(list(&original)), &root).unwrap();
                        black_box(renderer.host_mut().take_ops().len())
                    })
                });
            }
        }

        group.finish();
    }
}

criterion_group!(benches, bench_keyed_diff);
criterion_main!(benches);
