//! Benchmarks for the keyed diff and the reactive core
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use vireo_core::props;
use vireo_core::reactive::{computed, effect, reactive, Value};
use vireo_core::render::{h, longest_increasing_subsequence, MemoryHost, Renderer, VNode};

fn list(keys: impl Iterator<Item = usize>) -> VNode {
    h(
        "ul",
        props! {},
        keys.map(|k| h("li", props! { "key" => k }, k.to_string()))
            .collect::<Vec<_>>(),
    )
}

// =============================================================================
// RECONCILE BENCHMARKS
// =============================================================================

fn bench_keyed_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reverse");
    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let renderer = Renderer::new(MemoryHost::new());
            let root = renderer.with_host(|host| host.create_root());
            let mut flipped = false;
            b.iter(|| {
                let tree = if flipped {
                    list(0..size)
                } else {
                    list((0..size).rev())
                };
                flipped = !flipped;
                renderer.render(Some(tree), root);
                renderer.with_host(|host| host.take_ops().len())
            })
        });
    }
    group.finish();
}

fn bench_keyed_swap(c: &mut Criterion) {
    c.bench_function("keyed_swap_1000", |b| {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.with_host(|host| host.create_root());
        let mut order: Vec<usize> = (0..1000).collect();
        b.iter(|| {
            order.swap(1, 998);
            renderer.render(Some(list(order.iter().copied())), root);
            renderer.with_host(|host| host.take_ops().len())
        })
    });
}

fn bench_lis(c: &mut Criterion) {
    let values: Vec<usize> = (0..1000).map(|i| (i * 7919) % 1000 + 1).collect();
    c.bench_function("lis_1000", |b| {
        b.iter(|| black_box(longest_increasing_subsequence(black_box(&values))))
    });
}

// =============================================================================
// REACTIVE BENCHMARKS
// =============================================================================

fn bench_effect_trigger(c: &mut Criterion) {
    let state = reactive(Value::from(json!({ "n": 0 })));
    let s = state.clone();
    let _runner = effect(move || {
        black_box(s.get("n"));
    });
    let mut n = 0;
    c.bench_function("effect_trigger", |b| {
        b.iter(|| {
            n += 1;
            state.set("n", n)
        })
    });
}

fn bench_computed_read(c: &mut Criterion) {
    let state = reactive(Value::from(json!({ "a": 1, "b": 2 })));
    let s = state.clone();
    let sum = computed(move || {
        s.get("a").as_number().unwrap_or_default() + s.get("b").as_number().unwrap_or_default()
    });
    c.bench_function("computed_read_clean", |b| b.iter(|| black_box(sum.get())));
}

criterion_group!(reconcile, bench_keyed_reverse, bench_keyed_swap, bench_lis);
criterion_group!(reactive_core, bench_effect_trigger, bench_computed_read);
criterion_main!(reconcile, reactive_core);
