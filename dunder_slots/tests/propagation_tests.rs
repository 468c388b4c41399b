//! Tests for slot table exactness under class mutation.
//!
//! Every test ends by comparing each cached slot of each class against an
//! uncached MRO walk, through both the dispatch read path and the
//! validators.
//!
//! Coverage:
//! - Inheritance, shadowing and deletion through member writes
//! - Idempotent writes and propagation exactness
//! - Unrelated classes, diamonds and the implicit root
//! - Base reassignment, including multiple-inheritance reordering
//! - Foreign classes in the subclass graph
//! - Collected classes
//! - Fast path and general path equivalence

use dunder_core::{Value, intern};
use dunder_slots::slots::build::{BuildPath, build_table_with};
use dunder_slots::slots::table::same_entry;
use dunder_slots::{
    BuiltinType, ClassError, ClassHierarchy, ClassId, Context, MroError, NativeNamespace,
    SlotCacheConfig, SlotLookup, SpecialSlot,
};

// =============================================================================
// Helpers
// =============================================================================

fn context() -> Context {
    Context::with_config(SlotCacheConfig::debug())
}

/// Every slot of every class agrees with an uncached MRO lookup.
fn assert_exact(ctx: &Context) {
    for id in ctx.classes().ids() {
        for slot in SpecialSlot::ALL {
            let expected = ctx
                .classes()
                .lookup_in_mro(id, slot.interned_name())
                .map(|hit| hit.value);
            let actual = ctx.slot_value(id, slot).materialize(ctx);
            assert!(
                same_entry(expected.as_ref(), actual.as_ref()),
                "{} {}: expected {:?}, got {:?}",
                id,
                slot,
                expected,
                actual
            );
        }
    }
    assert!(ctx.validate().is_empty());
}

fn lookup(ctx: &Context, id: ClassId, slot: SpecialSlot) -> Option<Value> {
    ctx.slot_value(id, slot).materialize(ctx)
}

fn assert_slot(ctx: &Context, id: ClassId, slot: SpecialSlot, expected: &Value) {
    match lookup(ctx, id, slot) {
        Some(actual) => assert!(actual.is(expected), "{}: {:?} is not {:?}", slot, actual, expected),
        None => panic!("{} absent on {}", slot, id),
    }
}

// =============================================================================
// Member Writes
// =============================================================================

mod member_write_tests {
    use super::*;

    #[test]
    fn test_override_inherit_and_shadow() {
        let ctx = context();
        let (f, g, h, k) = (
            Value::function("f"),
            Value::function("g"),
            Value::function("h"),
            Value::function("k"),
        );
        let a = ctx.define_class("A", &[], &[("__add__", f.clone())]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        assert_slot(&ctx, b, SpecialSlot::Add, &f);

        ctx.set_class_attr(a, "__add__", g.clone()).unwrap();
        assert_slot(&ctx, b, SpecialSlot::Add, &g);

        ctx.set_class_attr(b, "__add__", h.clone()).unwrap();
        assert_slot(&ctx, b, SpecialSlot::Add, &h);

        let report = ctx.set_class_attr(a, "__add__", k.clone()).unwrap();
        assert_slot(&ctx, a, SpecialSlot::Add, &k);
        assert_slot(&ctx, b, SpecialSlot::Add, &h);
        assert_eq!(report.updated, vec![a]);
        assert_eq!(report.visited, 2);

        assert_exact(&ctx);
    }

    #[test]
    fn test_delete_falls_back_to_ancestor() {
        let ctx = context();
        let f = Value::function("f");
        let g = Value::function("g");
        let a = ctx.define_class("A", &[], &[("__len__", f.clone())]).unwrap();
        let b = ctx.define_class("B", &[a], &[("__len__", g.clone())]).unwrap();
        let c = ctx.define_class("C", &[b], &[]).unwrap();
        assert_slot(&ctx, c, SpecialSlot::Len, &g);

        let report = ctx.del_class_attr(b, "__len__").unwrap();
        assert_eq!(report.updated, vec![b, c]);
        assert_slot(&ctx, c, SpecialSlot::Len, &f);

        ctx.del_class_attr(a, "__len__").unwrap();
        assert!(ctx.slot_value(c, SpecialSlot::Len).is_absent());
        assert!(ctx.slot_value(a, SpecialSlot::Len).is_absent());

        assert_exact(&ctx);
    }

    #[test]
    fn test_delete_exposes_root_slot() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[("__hash__", Value::None)]).unwrap();
        assert_eq!(lookup(&ctx, a, SpecialSlot::Hash), Some(Value::None));

        ctx.del_class_attr(a, "__hash__").unwrap();
        let object_hash = ctx
            .builtin_class(BuiltinType::Object)
            .unwrap()
            .own_member(&intern("__hash__"))
            .unwrap();
        assert_slot(&ctx, a, SpecialSlot::Hash, &object_hash);
        assert_exact(&ctx);
    }

    #[test]
    fn test_idempotent_write_does_not_recurse() {
        let ctx = context();
        let f = Value::function("f");
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        let _c = ctx.define_class("C", &[b], &[]).unwrap();

        let first = ctx.set_class_attr(a, "__iter__", f.clone()).unwrap();
        assert_eq!(first.updated.len(), 3);
        assert!(!first.early_exit);

        let table_before = ctx.classes().get(b).unwrap().slot_cell().unwrap().load().unwrap();
        let second = ctx.set_class_attr(a, "__iter__", f.clone()).unwrap();
        assert!(second.early_exit);
        assert!(second.updated.is_empty());
        assert_eq!(second.visited, 1);
        let table_after = ctx.classes().get(b).unwrap().slot_cell().unwrap().load().unwrap();
        assert!(std::sync::Arc::ptr_eq(&table_before, &table_after));

        let stats = ctx.propagation_stats().snapshot();
        assert_eq!(stats.member_writes, 2);
        assert_eq!(stats.early_exits, 1);
        assert_exact(&ctx);
    }

    #[test]
    fn test_equal_but_distinct_value_propagates() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[("__len__", Value::function("len"))]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();

        let replacement = Value::function("len");
        let report = ctx.set_class_attr(a, "__len__", replacement.clone()).unwrap();
        assert_eq!(report.updated, vec![a, b]);
        assert_slot(&ctx, b, SpecialSlot::Len, &replacement);
    }

    #[test]
    fn test_propagation_exactness() {
        // A
        // ├── B (defines __eq__)
        // │   └── D
        // └── C
        //     └── E (defines __eq__)
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx
            .define_class("B", &[a], &[("__eq__", Value::function("b_eq"))])
            .unwrap();
        let c = ctx.define_class("C", &[a], &[]).unwrap();
        let d = ctx.define_class("D", &[b], &[]).unwrap();
        let e = ctx
            .define_class("E", &[c], &[("__eq__", Value::function("e_eq"))])
            .unwrap();

        let report = ctx.set_class_attr(a, "__eq__", Value::function("a_eq")).unwrap();
        let mut updated = report.updated.clone();
        updated.sort();
        assert_eq!(updated, vec![a, c]);
        for untouched in [b, d, e] {
            assert!(!report.updated.contains(&untouched));
        }
        assert_exact(&ctx);
    }

    #[test]
    fn test_unrelated_classes_are_isolated() {
        let ctx = context();
        let x = ctx.define_class("X", &[], &[]).unwrap();
        let y = ctx.define_class("Y", &[], &[]).unwrap();
        let y_table = ctx.classes().get(y).unwrap().slot_cell().unwrap().load().unwrap();

        for slot in [SpecialSlot::Add, SpecialSlot::Len, SpecialSlot::Repr, SpecialSlot::Hash] {
            let report = ctx.set_class_attr(x, slot.name(), Value::function("x")).unwrap();
            assert!(!report.updated.contains(&y));
        }
        ctx.del_class_attr(x, "__repr__").unwrap();

        let y_after = ctx.classes().get(y).unwrap().slot_cell().unwrap().load().unwrap();
        assert!(std::sync::Arc::ptr_eq(&y_table, &y_after));
        assert_exact(&ctx);
    }

    #[test]
    fn test_class_without_bases_mirrors_root() {
        let ctx = context();
        let z = ctx.define_class("Z", &[], &[]).unwrap();
        let object = BuiltinType::Object.class_id();
        for slot in SpecialSlot::ALL {
            let root = ctx.concrete_slot_value(object, slot);
            let own = ctx.concrete_slot_value(z, slot);
            assert!(same_entry(root.as_ref(), own.as_ref()), "{}", slot);
        }
        assert!(ctx.slot_value(z, SpecialSlot::Len).is_absent());
        assert!(!ctx.slot_value(z, SpecialSlot::Repr).is_absent());
    }

    #[test]
    fn test_diamond_follows_linearization() {
        //   A
        //  / \
        // B   C
        //  \ /
        //   D
        let ctx = context();
        let a = ctx
            .define_class("A", &[], &[("__len__", Value::function("a_len"))])
            .unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        let c = ctx.define_class("C", &[a], &[]).unwrap();
        let d = ctx.define_class("D", &[b, c], &[]).unwrap();
        assert_eq!(ctx.classes().linearize(d).as_slice(), &[d, b, c, a, ClassId::OBJECT]);

        let c_len = Value::function("c_len");
        ctx.set_class_attr(c, "__len__", c_len.clone()).unwrap();
        assert_slot(&ctx, d, SpecialSlot::Len, &c_len);

        // C still shadows A for D.
        ctx.set_class_attr(a, "__len__", Value::function("a_len2")).unwrap();
        assert_slot(&ctx, d, SpecialSlot::Len, &c_len);

        // B sits before C in D's MRO.
        let b_len = Value::function("b_len");
        ctx.set_class_attr(b, "__len__", b_len.clone()).unwrap();
        assert_slot(&ctx, d, SpecialSlot::Len, &b_len);

        ctx.del_class_attr(b, "__len__").unwrap();
        assert_slot(&ctx, d, SpecialSlot::Len, &c_len);
        assert_exact(&ctx);
    }

    #[test]
    fn test_non_slot_names_do_not_touch_tables() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let before = ctx.classes().get(a).unwrap().slot_cell().unwrap().load().unwrap();
        for name in ["__doc__", "__slots__", "method", "_private"] {
            let report = ctx.set_class_attr(a, name, Value::Int(1)).unwrap();
            assert_eq!(report.slot, None);
            assert!(!report.changed_anything());
        }
        let after = ctx.classes().get(a).unwrap().slot_cell().unwrap().load().unwrap();
        assert!(std::sync::Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_deterministic_write_sequence_stays_exact() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        let c = ctx.define_class("C", &[a], &[]).unwrap();
        let d = ctx.define_class("D", &[b, c], &[]).unwrap();
        let e = ctx.define_class("E", &[d], &[]).unwrap();
        let classes = [a, b, c, d, e];
        let slots = [SpecialSlot::Len, SpecialSlot::Add, SpecialSlot::RAdd, SpecialSlot::Repr];
        let values: Vec<Value> = (0..3).map(|i| Value::function(&format!("v{}", i))).collect();

        // Linear congruential generator; fixed seed keeps the run reproducible.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = |bound: usize| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as usize) % bound
        };

        for _ in 0..200 {
            let class = classes[next(classes.len())];
            let slot = slots[next(slots.len())];
            if next(4) == 0 {
                let _ = ctx.del_class_attr(class, slot.name());
            } else {
                let value = values[next(values.len())].clone();
                ctx.set_class_attr(class, slot.name(), value).unwrap();
            }
        }
        assert_exact(&ctx);
    }
}

// =============================================================================
// Base Reassignment
// =============================================================================

mod base_change_tests {
    use super::*;

    #[test]
    fn test_single_inheritance_rebase() {
        let ctx = context();
        let f = Value::function("f");
        let g = Value::function("g");
        let a1 = ctx.define_class("A1", &[], &[("__len__", f.clone())]).unwrap();
        let a2 = ctx.define_class("A2", &[], &[("__len__", g.clone())]).unwrap();
        let b = ctx.define_class("B", &[a1], &[]).unwrap();
        let c = ctx.define_class("C", &[b], &[]).unwrap();
        assert_slot(&ctx, c, SpecialSlot::Len, &f);

        let report = ctx.set_bases(b, &[a2]).unwrap();
        assert_eq!(report.rebuilt, vec![b]);
        assert!(report.updated.contains(&c));
        assert_slot(&ctx, b, SpecialSlot::Len, &g);
        assert_slot(&ctx, c, SpecialSlot::Len, &g);
        assert_eq!(ctx.classes().direct_subclasses(a1), Vec::<ClassId>::new());
        assert_eq!(ctx.classes().direct_subclasses(a2), vec![b]);

        assert_eq!(ctx.propagation_stats().snapshot().base_changes, 1);
        assert_exact(&ctx);
    }

    #[test]
    fn test_rebase_onto_root() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[("__len__", Value::function("f"))]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();

        ctx.set_bases(b, &[]).unwrap();
        assert_eq!(ctx.classes().linearize(b).as_slice(), &[b, ClassId::OBJECT]);
        assert!(ctx.slot_value(b, SpecialSlot::Len).is_absent());
        assert_exact(&ctx);
    }

    #[test]
    fn test_reordering_without_value_change_in_mutated_class() {
        // K and K2 both define __len__ as the same object g; M defines f.
        // C(A, M) initially resolves f (A -> K comes after M). Rebasing A
        // onto K2 leaves A's own slot at g but moves K2 ahead of M in C's
        // linearization, so C must switch to g.
        let ctx = context();
        let f = Value::function("f");
        let g = Value::function("g");
        let k = ctx.define_class("K", &[], &[("__len__", g.clone())]).unwrap();
        let k2 = ctx.define_class("K2", &[], &[("__len__", g.clone())]).unwrap();
        let a = ctx.define_class("A", &[k], &[]).unwrap();
        let m = ctx.define_class("M", &[k], &[("__len__", f.clone())]).unwrap();
        let c = ctx.define_class("C", &[a, m], &[]).unwrap();
        let leaf = ctx.define_class("Leaf", &[c], &[]).unwrap();
        assert_eq!(
            ctx.classes().linearize(c).as_slice(),
            &[c, a, m, k, ClassId::OBJECT]
        );
        assert_slot(&ctx, c, SpecialSlot::Len, &f);

        let report = ctx.set_bases(a, &[k2]).unwrap();
        assert_slot(&ctx, a, SpecialSlot::Len, &g);
        assert_eq!(
            ctx.classes().linearize(c).as_slice(),
            &[c, a, k2, m, k, ClassId::OBJECT]
        );
        assert!(report.rebuilt.contains(&c));
        assert_slot(&ctx, c, SpecialSlot::Len, &g);
        assert_slot(&ctx, leaf, SpecialSlot::Len, &g);
        assert_exact(&ctx);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        let err = ctx.set_bases(a, &[b]).unwrap_err();
        assert!(matches!(err, ClassError::Mro(MroError::Cycle { .. })));
        assert_eq!(ctx.classes().linearize(a).as_slice(), &[a, ClassId::OBJECT]);
        assert_exact(&ctx);
    }

    #[test]
    fn test_inconsistent_rebase_leaves_graph_unchanged() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        let c = ctx.define_class("C", &[], &[]).unwrap();
        let err = ctx.set_bases(c, &[a, b]).unwrap_err();
        assert!(matches!(err, ClassError::Mro(MroError::Inconsistent { .. })));
        assert_eq!(ctx.classes().linearize(c).as_slice(), &[c, ClassId::OBJECT]);
        assert_exact(&ctx);
    }
}

// =============================================================================
// Foreign Classes
// =============================================================================

mod foreign_tests {
    use super::*;

    #[test]
    fn test_propagation_passes_through_foreign_class() {
        let ctx = context();
        let f = Value::function("f");
        let a = ctx.define_class("A", &[], &[("__len__", f.clone())]).unwrap();
        let foreign = ctx
            .define_foreign_class("Native", &[a], Box::new(NativeNamespace::default()))
            .unwrap();
        let s = ctx.define_class("S", &[foreign], &[]).unwrap();
        assert_slot(&ctx, s, SpecialSlot::Len, &f);

        let g = Value::function("g");
        let report = ctx.set_class_attr(a, "__len__", g.clone()).unwrap();
        assert!(report.updated.contains(&s));
        assert!(!report.updated.contains(&foreign));
        assert_slot(&ctx, foreign, SpecialSlot::Len, &g);
        assert_slot(&ctx, s, SpecialSlot::Len, &g);
        assert_exact(&ctx);
    }

    #[test]
    fn test_write_through_foreign_bridge() {
        let ctx = context();
        let f = Value::function("f");
        let foreign = ctx
            .define_foreign_class(
                "Native",
                &[],
                Box::new(NativeNamespace::new([("__len__", f.clone())])),
            )
            .unwrap();
        let s = ctx.define_class("S", &[foreign], &[]).unwrap();
        assert_slot(&ctx, s, SpecialSlot::Len, &f);

        let g = Value::function("g");
        let report = ctx.set_class_attr(foreign, "__len__", g.clone()).unwrap();
        assert_eq!(report.updated, vec![s]);
        assert_slot(&ctx, s, SpecialSlot::Len, &g);

        ctx.del_class_attr(foreign, "__len__").unwrap();
        assert!(ctx.slot_value(s, SpecialSlot::Len).is_absent());
        assert_exact(&ctx);
    }

    #[test]
    fn test_read_only_bridge_rejects_writes() {
        let ctx = context();
        let foreign = ctx
            .define_foreign_class(
                "Frozen",
                &[],
                Box::new(NativeNamespace::default().read_only()),
            )
            .unwrap();
        let err = ctx
            .set_class_attr(foreign, "__len__", Value::function("f"))
            .unwrap_err();
        assert_eq!(
            err,
            ClassError::ReadOnlyNamespace {
                class_name: "Frozen".to_string()
            }
        );
        assert!(ctx.slot_value(foreign, SpecialSlot::Len).is_absent());
    }

    #[test]
    fn test_foreign_reads_take_the_fallback_path() {
        let ctx = context();
        let foreign = ctx
            .define_foreign_class("Native", &[], Box::new(NativeNamespace::default()))
            .unwrap();
        ctx.dispatch_stats().reset();
        let _ = ctx.slot_value(foreign, SpecialSlot::Repr);
        let (_, concrete, fallback) = ctx.dispatch_stats().stats();
        assert_eq!((concrete, fallback), (0, 1));
    }
}

// =============================================================================
// Collected Classes
// =============================================================================

mod unregister_tests {
    use super::*;

    #[test]
    fn test_collected_subclass_is_not_visited() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        ctx.unregister_class(b).unwrap();
        assert!(!ctx.classes().contains(b));
        assert!(ctx.classes().direct_subclasses(a).is_empty());

        let report = ctx.set_class_attr(a, "__len__", Value::function("f")).unwrap();
        assert_eq!(report.updated, vec![a]);
        assert_eq!(report.visited, 1);
        assert!(ctx.slot_value(b, SpecialSlot::Len).is_absent());
        assert_exact(&ctx);
    }

    #[test]
    fn test_unknown_class_errors() {
        let ctx = context();
        let missing = ClassId(4096);
        assert_eq!(
            ctx.unregister_class(missing).unwrap_err(),
            ClassError::UnknownClass(missing)
        );
        assert_eq!(
            ctx.set_bases(missing, &[]).unwrap_err(),
            ClassError::UnknownClass(missing)
        );
        assert_eq!(ctx.slot_value(missing, SpecialSlot::Len), SlotLookup::Absent);
    }
}

// =============================================================================
// Construction Paths
// =============================================================================

mod construction_tests {
    use super::*;

    #[test]
    fn test_fast_and_general_paths_agree() {
        let ctx = context();
        let a = ctx
            .define_class(
                "A",
                &[],
                &[("__len__", Value::function("len")), ("__iter__", Value::function("iter"))],
            )
            .unwrap();
        let b = ctx
            .define_class("B", &[a], &[("__len__", Value::function("b_len"))])
            .unwrap();
        let c = ctx.define_class("C", &[b], &[("__next__", Value::None)]).unwrap();

        for id in [a, b, c] {
            let (fast, fast_path) = build_table_with(ctx.classes(), id, true);
            let (general, general_path) = build_table_with(ctx.classes(), id, false);
            // A has no explicit base, so only its subclasses qualify.
            let expected = if id == a { BuildPath::General } else { BuildPath::FastPath };
            assert_eq!(fast_path, expected);
            assert_eq!(general_path, BuildPath::General);
            assert!(fast.diff(&general).is_empty(), "{}", id);
        }
    }

    #[test]
    fn test_multiple_bases_use_general_path() {
        let ctx = context();
        let a = ctx.define_class("A", &[], &[]).unwrap();
        let b = ctx.define_class("B", &[], &[]).unwrap();
        let c = ctx.define_class("C", &[a, b], &[]).unwrap();
        let (_, path) = build_table_with(ctx.classes(), c, true);
        assert_eq!(path, BuildPath::General);
    }

    #[test]
    fn test_general_path_only_context_is_exact() {
        let ctx = Context::with_config(SlotCacheConfig {
            fast_path: false,
            ..SlotCacheConfig::debug()
        });
        let a = ctx.define_class("A", &[], &[("__len__", Value::function("f"))]).unwrap();
        let b = ctx.define_class("B", &[a], &[]).unwrap();
        ctx.set_class_attr(a, "__len__", Value::function("g")).unwrap();
        ctx.set_bases(b, &[]).unwrap();
        assert_exact(&ctx);
    }

    #[test]
    fn test_builtin_subclass_inherits_context_functions() {
        let ctx = context();
        let my_int = ctx
            .define_class("MyInt", &[BuiltinType::Int.class_id()], &[])
            .unwrap();
        let int_add = ctx
            .builtin_class(BuiltinType::Int)
            .unwrap()
            .own_member(&intern("__add__"))
            .unwrap();
        assert_eq!(ctx.slot_value(my_int, SpecialSlot::Add), SlotLookup::Value(int_add));
        assert_exact(&ctx);
    }
}
