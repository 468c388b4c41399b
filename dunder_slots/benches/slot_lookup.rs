//! Slot Cache Performance Benchmarks
//!
//! Measures the two hot paths of the slot cache: resolving an attribute
//! name to a slot on every class write, and the dispatch read of a slot.
//!
//! # Benchmark Categories
//!
//! 1. **Name Resolution**: slot names, near misses and ordinary names
//! 2. **Dispatch Reads**: shared tier, concrete table and fallback walk
//! 3. **Propagation**: writes fanning out over a class chain
//!
//! # Performance Targets
//!
//! - Ordinary name rejection: < 2ns
//! - Slot name resolution: < 10ns
//! - Shared or concrete dispatch read: < 30ns

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dunder_core::Value;
use dunder_slots::{
    BuiltinType, ClassId, Context, NativeNamespace, SlotCacheConfig, SpecialSlot, resolve_slot,
};

// =============================================================================
// Benchmark Helpers
// =============================================================================

/// A release-configured context with a linear chain of `depth` classes
/// below `object`. Returns the context and the chain, root-most first.
fn context_with_chain(depth: usize) -> (Context, Vec<ClassId>) {
    let ctx = Context::with_config(SlotCacheConfig::release());
    let mut chain = Vec::with_capacity(depth);
    let mut bases: Vec<ClassId> = Vec::new();
    for i in 0..depth {
        let id = ctx
            .define_class(&format!("C{}", i), &bases, &[])
            .unwrap();
        chain.push(id);
        bases = vec![id];
    }
    (ctx, chain)
}

// =============================================================================
// Name Resolution
// =============================================================================

fn bench_resolve_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_slot");

    let names = [
        ("ordinary", "value"),
        ("short_dunder", "__x__"),
        ("unknown_dunder", "__bogus__"),
        ("add", "__add__"),
        ("getattribute", "__getattribute__"),
        ("rfloordiv", "__rfloordiv__"),
    ];
    for (label, name) in names {
        group.bench_with_input(BenchmarkId::from_parameter(label), name, |b, name| {
            b.iter(|| resolve_slot(black_box(name)))
        });
    }

    group.bench_function("all_slot_names", |b| {
        b.iter(|| {
            for slot in SpecialSlot::ALL {
                black_box(resolve_slot(black_box(slot.name())));
            }
        })
    });

    group.finish();
}

// =============================================================================
// Dispatch Reads
// =============================================================================

fn bench_get_slot_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_slot_value");
    let (ctx, chain) = context_with_chain(8);
    let leaf = chain[chain.len() - 1];
    let foreign = ctx
        .define_foreign_class("Native", &[leaf], Box::new(NativeNamespace::default()))
        .unwrap();
    let int = BuiltinType::Int.class_id();

    group.bench_function("shared_descriptor", |b| {
        b.iter(|| ctx.slot_value(black_box(int), black_box(SpecialSlot::Add)))
    });

    group.bench_function("shared_unknown_to_concrete", |b| {
        b.iter(|| ctx.slot_value(black_box(int), black_box(SpecialSlot::Len)))
    });

    group.bench_function("concrete_leaf", |b| {
        b.iter(|| ctx.slot_value(black_box(leaf), black_box(SpecialSlot::Repr)))
    });

    group.bench_function("foreign_fallback", |b| {
        b.iter(|| ctx.slot_value(black_box(foreign), black_box(SpecialSlot::Repr)))
    });

    group.finish();
}

// =============================================================================
// Propagation
// =============================================================================

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    for depth in [1usize, 8, 32] {
        let (ctx, chain) = context_with_chain(depth);
        let root = chain[0];
        let values = [Value::function("a"), Value::function("b")];
        let mut toggle = 0usize;

        group.bench_with_input(BenchmarkId::new("chain_write", depth), &depth, |b, _| {
            b.iter(|| {
                toggle ^= 1;
                ctx.set_class_attr(root, "__len__", values[toggle].clone())
                    .unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("early_exit", depth), &depth, |b, _| {
            let value = values[toggle].clone();
            b.iter(|| {
                ctx.set_class_attr(root, "__len__", value.clone())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_slot,
    bench_get_slot_value,
    bench_propagation
);
criterion_main!(benches);
