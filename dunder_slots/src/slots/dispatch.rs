//! Dispatch read path.
//!
//! # Lookup Order
//!
//! 1. Builtin classes consult the shared tier first. A descriptor or a
//!    constant there answers immediately.
//! 2. Otherwise a managed class's own table answers, including *absent*:
//!    a published table is exact, so absence is authoritative.
//! 3. Only classes without a table (foreign, or still under construction)
//!    fall back to an uncached MRO walk.

use crate::context::Context;
use crate::object::class::ClassKind;
use crate::object::mro::ClassId;
use crate::object::registry::ClassHierarchy;
use crate::slots::shared::{BuiltinDescriptor, SharedEntry, shared_tables};
use crate::slots::slot::SpecialSlot;
use dunder_core::{BuiltinFunction, Value};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Slot Lookup
// =============================================================================

/// Result of a dispatch read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotLookup {
    /// Context-independent builtin implementation from the shared tier.
    Descriptor(BuiltinDescriptor),
    /// Concrete value.
    Value(Value),
    /// No class in the MRO defines the slot.
    Absent,
}

impl SlotLookup {
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, SlotLookup::Absent)
    }

    /// The value an MRO lookup in `ctx` would produce.
    ///
    /// Descriptors resolve to the context's own builtin function object.
    pub fn materialize(&self, ctx: &Context) -> Option<Value> {
        match self {
            SlotLookup::Descriptor(desc) => ctx
                .call_target(desc)
                .map(|target| Value::Builtin(Arc::clone(target.function()))),
            SlotLookup::Value(value) => Some(value.clone()),
            SlotLookup::Absent => None,
        }
    }
}

impl From<Option<Value>> for SlotLookup {
    fn from(value: Option<Value>) -> Self {
        value.map_or(SlotLookup::Absent, SlotLookup::Value)
    }
}

/// Dispatch read of `slot` on `class` in `ctx`.
pub fn get_slot_value(ctx: &Context, class: ClassId, slot: SpecialSlot) -> SlotLookup {
    let classes = ctx.classes();
    let Some(class_obj) = classes.get(class) else {
        return SlotLookup::Absent;
    };
    let stats = ctx.dispatch_stats();

    if ctx.config().shared_tier {
        if let Some(table) = class_obj.builtin_type().and_then(|ty| shared_tables().get(ty)) {
            match table.get(slot) {
                SharedEntry::Descriptor(desc) => {
                    stats.shared_hits.fetch_add(1, Ordering::Relaxed);
                    return SlotLookup::Descriptor(*desc);
                }
                SharedEntry::Constant(value) => {
                    stats.shared_hits.fetch_add(1, Ordering::Relaxed);
                    return SlotLookup::Value(value.clone());
                }
                SharedEntry::Unknown => {}
            }
        }
    }

    if let ClassKind::Managed(managed) = class_obj.kind() {
        if let Some(entry) = managed.slots.entry(slot) {
            stats.concrete_hits.fetch_add(1, Ordering::Relaxed);
            return entry.into();
        }
    }

    stats.fallback_lookups.fetch_add(1, Ordering::Relaxed);
    classes
        .lookup_in_mro(class, slot.interned_name())
        .map(|hit| hit.value)
        .into()
}

/// Concrete value of `slot`, from the class's table or an MRO walk.
pub fn concrete_slot_value<H: ClassHierarchy + ?Sized>(
    hier: &H,
    class: ClassId,
    slot: SpecialSlot,
) -> Option<Value> {
    let class_obj = hier.class(class)?;
    if let Some(entry) = class_obj.slot_cell().and_then(|cell| cell.entry(slot)) {
        return entry;
    }
    hier.lookup_in_mro(class, slot.interned_name())
        .map(|hit| hit.value)
}

// =============================================================================
// Call Targets
// =============================================================================

/// A context's entry point for one descriptor index.
#[derive(Debug)]
pub struct CallTarget {
    function: Arc<BuiltinFunction>,
    invocations: AtomicU64,
}

impl CallTarget {
    pub fn new(function: Arc<BuiltinFunction>) -> Self {
        Self {
            function,
            invocations: AtomicU64::new(0),
        }
    }

    /// The context's builtin function object.
    #[inline]
    pub fn function(&self) -> &Arc<BuiltinFunction> {
        &self.function
    }

    pub fn call(&self, args: &[Value]) -> Value {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.function.call(args)
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

/// Per-context array of call targets, filled on first use.
#[derive(Debug, Default)]
pub struct CallTargets {
    targets: RwLock<Vec<Option<Arc<CallTarget>>>>,
}

impl CallTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target at `index`, if already resolved.
    pub fn get(&self, index: u32) -> Option<Arc<CallTarget>> {
        self.targets
            .read()
            .get(index as usize)
            .and_then(|target| target.clone())
    }

    /// Target at `index`, resolving it with `resolve` on first use.
    pub fn get_or_resolve<F>(&self, index: u32, resolve: F) -> Option<Arc<CallTarget>>
    where
        F: FnOnce() -> Option<CallTarget>,
    {
        if let Some(target) = self.get(index) {
            return Some(target);
        }
        let mut targets = self.targets.write();
        let i = index as usize;
        if let Some(Some(target)) = targets.get(i) {
            return Some(Arc::clone(target));
        }
        let target = Arc::new(resolve()?);
        if targets.len() <= i {
            targets.resize(i + 1, None);
        }
        targets[i] = Some(Arc::clone(&target));
        Some(target)
    }

    /// Number of resolved targets.
    pub fn resolved(&self) -> usize {
        self.targets.read().iter().filter(|t| t.is_some()).count()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Dispatch counters per lookup tier.
#[derive(Debug, Default)]
pub struct DispatchStats {
    shared_hits: AtomicU64,
    concrete_hits: AtomicU64,
    fallback_lookups: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// (shared, concrete, fallback)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.shared_hits.load(Ordering::Relaxed),
            self.concrete_hits.load(Ordering::Relaxed),
            self.fallback_lookups.load(Ordering::Relaxed),
        )
    }

    /// Share of lookups answered without an MRO walk.
    pub fn hit_rate(&self) -> f64 {
        let (shared, concrete, fallback) = self.stats();
        let total = shared + concrete + fallback;
        if total == 0 {
            0.0
        } else {
            (shared + concrete) as f64 / total as f64
        }
    }

    pub fn reset(&self) {
        self.shared_hits.store(0, Ordering::Relaxed);
        self.concrete_hits.store(0, Ordering::Relaxed);
        self.fallback_lookups.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dunder_core::{BuiltinImpl, ContextId};

    fn echo(_: ContextId, args: &[Value]) -> Value {
        args.first().cloned().unwrap_or(Value::None)
    }

    static ECHO: BuiltinImpl = BuiltinImpl::pure("__pos__", "test", echo);

    #[test]
    fn test_lookup_from_option() {
        assert_eq!(SlotLookup::from(None), SlotLookup::Absent);
        assert_eq!(SlotLookup::from(Some(Value::Int(1))), SlotLookup::Value(Value::Int(1)));
        assert!(SlotLookup::Absent.is_absent());
    }

    #[test]
    fn test_call_targets_resolve_once() {
        let targets = CallTargets::new();
        let ctx = ContextId::allocate();
        assert!(targets.get(3).is_none());

        let first = targets
            .get_or_resolve(3, || {
                Some(CallTarget::new(Arc::new(BuiltinFunction::new(&ECHO, ctx))))
            })
            .unwrap();
        let second = targets
            .get_or_resolve(3, || panic!("resolved twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(targets.resolved(), 1);

        assert_eq!(first.call(&[Value::Int(9)]), Value::Int(9));
        assert_eq!(second.invocations(), 1);
    }

    #[test]
    fn test_failed_resolution_is_not_cached() {
        let targets = CallTargets::new();
        assert!(targets.get_or_resolve(0, || None).is_none());
        assert_eq!(targets.resolved(), 0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = DispatchStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.shared_hits.fetch_add(2, Ordering::Relaxed);
        stats.concrete_hits.fetch_add(1, Ordering::Relaxed);
        stats.fallback_lookups.fetch_add(1, Ordering::Relaxed);
        assert_eq!(stats.stats(), (2, 1, 1));
        assert_eq!(stats.hit_rate(), 0.75);
        stats.reset();
        assert_eq!(stats.stats(), (0, 0, 0));
    }
}
