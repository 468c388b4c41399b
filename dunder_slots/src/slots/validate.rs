//! Consistency checks for slot tables.
//!
//! Debug and test tooling: mismatches are reported and logged, never raised.

use crate::context::Context;
use crate::object::builtin_types::BuiltinType;
use crate::object::mro::ClassId;
use crate::object::registry::ClassHierarchy;
use crate::slots::dispatch::SlotLookup;
use crate::slots::shared::{SharedEntry, shared_tables};
use crate::slots::slot::SpecialSlot;
use crate::slots::table::same_entry;
use dunder_core::{InternedString, Value};
use std::fmt;
use tracing::warn;

/// A cached slot that disagrees with an uncached MRO lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMismatch {
    pub class: ClassId,
    pub class_name: InternedString,
    pub slot: SpecialSlot,
    /// Result of the MRO lookup.
    pub expected: Option<Value>,
    /// What the cache holds, materialized in the checking context.
    pub actual: Option<Value>,
    /// Which tier disagreed.
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Shared,
    Class,
}

impl fmt::Display for SlotMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} slot {} of {} ({}): expected {:?}, cached {:?}",
            self.tier, self.slot, self.class_name, self.class, self.expected, self.actual
        )
    }
}

fn report(mismatch: &SlotMismatch) {
    warn!(
        class = %mismatch.class_name,
        id = mismatch.class.raw(),
        slot = %mismatch.slot,
        tier = ?mismatch.tier,
        "slot cache mismatch: expected {:?}, cached {:?}",
        mismatch.expected,
        mismatch.actual
    );
}

/// Compare every published table entry of `classes` with an MRO lookup.
///
/// Classes without a table are skipped.
pub fn check_class_tables<H: ClassHierarchy + ?Sized>(
    hier: &H,
    classes: &[ClassId],
) -> Vec<SlotMismatch> {
    let mut mismatches = Vec::new();
    for &id in classes {
        let Some(class) = hier.class(id) else {
            continue;
        };
        let Some(table) = class.slot_cell().and_then(|cell| cell.load()) else {
            continue;
        };
        for (slot, cached) in table.iter() {
            let expected = hier
                .lookup_in_mro(id, slot.interned_name())
                .map(|hit| hit.value);
            if !same_entry(expected.as_ref(), cached) {
                let mismatch = SlotMismatch {
                    class: id,
                    class_name: class.name().clone(),
                    slot,
                    expected,
                    actual: cached.cloned(),
                    tier: Tier::Class,
                };
                report(&mismatch);
                mismatches.push(mismatch);
            }
        }
    }
    mismatches
}

/// Check that every shared-tier entry behaves like the per-context MRO
/// lookup in `ctx`.
pub fn check_shared_tables(ctx: &Context) -> Vec<SlotMismatch> {
    let mut mismatches = Vec::new();
    let classes = ctx.classes();
    for ty in BuiltinType::ALL {
        let Some(table) = shared_tables().get(ty) else {
            continue;
        };
        let Some(class) = classes.get(ty.class_id()) else {
            continue;
        };
        for (slot, entry) in table.iter() {
            let expected = classes
                .lookup_in_mro(ty.class_id(), slot.interned_name())
                .map(|hit| hit.value);
            let consistent = match entry {
                SharedEntry::Unknown => continue,
                SharedEntry::Constant(value) => expected.as_ref().is_some_and(|v| v.is(value)),
                SharedEntry::Descriptor(desc) => {
                    slot.allows_builtin_descriptors()
                        && matches!(&expected, Some(Value::Builtin(f)) if desc.is_descriptor_of(f))
                        && same_entry(
                            SlotLookup::Descriptor(*desc).materialize(ctx).as_ref(),
                            expected.as_ref(),
                        )
                }
            };
            if !consistent {
                let actual = match entry {
                    SharedEntry::Descriptor(desc) => SlotLookup::Descriptor(*desc).materialize(ctx),
                    SharedEntry::Constant(value) => Some(value.clone()),
                    SharedEntry::Unknown => None,
                };
                let mismatch = SlotMismatch {
                    class: ty.class_id(),
                    class_name: class.name().clone(),
                    slot,
                    expected,
                    actual,
                    tier: Tier::Shared,
                };
                report(&mismatch);
                mismatches.push(mismatch);
            }
        }
    }
    mismatches
}
