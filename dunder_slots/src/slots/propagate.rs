//! Slot invalidation after namespace writes and base reassignment.
//!
//! # Member Writes
//!
//! When a dunder member of class `C` is written or deleted, the slot's value
//! is re-derived by an MRO lookup and compared with the cached entry. Only a
//! real change is published, and only then are `C`'s direct subclasses
//! visited, so the walk touches exactly the classes whose resolved value
//! moves. Overriding a method on a base that a subclass already overrides
//! stops at the subclass.
//!
//! Foreign classes have no table; the walk passes straight through them.
//!
//! # Base Reassignment
//!
//! The class's table is rebuilt on the general path and every slot that
//! differs from the old table is propagated as above. Descendants whose
//! MRO changed but whose table is not a pure extension of a single managed
//! base are rebuilt as well, since their merge order can move without any
//! slot of the reassigned class changing.

use crate::object::class::ClassKind;
use crate::object::mro::ClassId;
use crate::object::registry::ClassHierarchy;
use crate::slots::build::install_table;
use crate::slots::slot::{SpecialSlot, resolve_slot};
use crate::slots::table::same_entry;
use dunder_core::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

// =============================================================================
// Report
// =============================================================================

/// What one propagation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Slot that was propagated; `None` for non-slot names and base changes.
    pub slot: Option<SpecialSlot>,
    /// Written value already matched the cached entry.
    pub early_exit: bool,
    /// Classes inspected.
    pub visited: usize,
    /// Classes whose table entry changed, in visiting order.
    pub updated: Vec<ClassId>,
    /// Classes whose whole table was rebuilt.
    pub rebuilt: Vec<ClassId>,
}

impl PropagationReport {
    fn for_slot(slot: SpecialSlot) -> Self {
        Self {
            slot: Some(slot),
            ..Self::default()
        }
    }

    /// Whether any table changed.
    pub fn changed_anything(&self) -> bool {
        !self.updated.is_empty() || !self.rebuilt.is_empty()
    }
}

// =============================================================================
// Member Writes
// =============================================================================

/// React to a write (`Some`) or delete (`None`) of `name` on class `id`.
///
/// Must be called after the namespace itself was updated.
pub fn on_member_written<H: ClassHierarchy + ?Sized>(
    hier: &H,
    id: ClassId,
    name: &str,
    new_value: Option<&Value>,
) -> PropagationReport {
    let Some(slot) = resolve_slot(name) else {
        return PropagationReport::default();
    };
    let mut report = PropagationReport::for_slot(slot);
    let Some(class) = hier.class(id) else {
        return report;
    };

    match class.kind() {
        ClassKind::Foreign(_) => {
            report.visited += 1;
            let subclasses = hier.direct_subclasses(id);
            propagate_slot(hier, subclasses, slot, &mut report);
        }
        ClassKind::Managed(managed) => match managed.slots.entry(slot) {
            None => {
                debug_assert!(
                    hier.may_be_initializing(id),
                    "slot write on class {} without a table",
                    class.name()
                );
            }
            Some(cached) if same_entry(cached.as_ref(), new_value) => {
                report.visited += 1;
                report.early_exit = true;
            }
            Some(_) => propagate_slot(hier, vec![id], slot, &mut report),
        },
    }
    report
}

/// Re-derive `slot` for every class in `start`, descending into the direct
/// subclasses of each class whose entry changed.
fn propagate_slot<H: ClassHierarchy + ?Sized>(
    hier: &H,
    start: Vec<ClassId>,
    slot: SpecialSlot,
    report: &mut PropagationReport,
) {
    let name = slot.interned_name();
    let mut worklist = start;
    while let Some(cid) = worklist.pop() {
        // Stale ids from collected classes are skipped.
        let Some(class) = hier.class(cid) else {
            continue;
        };
        report.visited += 1;
        match class.kind() {
            ClassKind::Foreign(_) => {
                worklist.extend(hier.direct_subclasses(cid));
            }
            ClassKind::Managed(managed) => {
                if !managed.slots.is_initialized() {
                    debug_assert!(
                        hier.may_be_initializing(cid),
                        "propagation reached class {} without a table",
                        class.name()
                    );
                    continue;
                }
                let resolved = hier.lookup_in_mro(cid, name).map(|hit| hit.value);
                if managed.slots.replace_entry(slot, resolved) {
                    trace!(class = %class.name(), id = cid.raw(), %slot, "slot updated");
                    report.updated.push(cid);
                    worklist.extend(hier.direct_subclasses(cid));
                }
            }
        }
    }
}

// =============================================================================
// Base Reassignment
// =============================================================================

/// React to a replaced base list of `id`.
///
/// `changed_descendants` are the descendants whose MRO changed, bases
/// before subclasses, as returned by `ClassRegistry::set_bases`.
pub fn on_bases_changed<H: ClassHierarchy + ?Sized>(
    hier: &H,
    id: ClassId,
    changed_descendants: &[ClassId],
) -> PropagationReport {
    let mut report = PropagationReport::default();
    rebuild_and_propagate(hier, id, &mut report);
    for &descendant in changed_descendants {
        if needs_rebuild(hier, descendant) {
            rebuild_and_propagate(hier, descendant, &mut report);
        }
    }
    report
}

/// Whether diff propagation alone cannot keep `id` exact.
fn needs_rebuild<H: ClassHierarchy + ?Sized>(hier: &H, id: ClassId) -> bool {
    let Some(class) = hier.class(id) else {
        return false;
    };
    if class.is_foreign() {
        return false;
    }
    match class.bases().as_slice() {
        [base] => hier.class(*base).is_none_or(|b| b.is_foreign()),
        _ => true,
    }
}

fn rebuild_and_propagate<H: ClassHierarchy + ?Sized>(
    hier: &H,
    id: ClassId,
    report: &mut PropagationReport,
) {
    report.visited += 1;
    let Some(installed) = install_table(hier, id, false) else {
        return;
    };
    report.rebuilt.push(id);
    let Some(previous) = installed.previous else {
        return;
    };
    for slot in previous.diff(&installed.current) {
        trace!(id = id.raw(), %slot, "slot changed by rebuild");
        propagate_slot(hier, hier.direct_subclasses(id), slot, report);
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Cumulative propagation counters for one context.
#[derive(Debug, Default)]
pub struct PropagationStats {
    member_writes: AtomicU64,
    early_exits: AtomicU64,
    classes_visited: AtomicU64,
    entries_updated: AtomicU64,
    base_changes: AtomicU64,
    tables_rebuilt: AtomicU64,
}

/// Point-in-time copy of [`PropagationStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationSnapshot {
    pub member_writes: u64,
    pub early_exits: u64,
    pub classes_visited: u64,
    pub entries_updated: u64,
    pub base_changes: u64,
    pub tables_rebuilt: u64,
}

impl PropagationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a member-write propagation.
    pub fn record_write(&self, report: &PropagationReport) {
        self.member_writes.fetch_add(1, Ordering::Relaxed);
        if report.early_exit {
            self.early_exits.fetch_add(1, Ordering::Relaxed);
        }
        self.record_work(report);
    }

    /// Count a base-change propagation.
    pub fn record_base_change(&self, report: &PropagationReport) {
        self.base_changes.fetch_add(1, Ordering::Relaxed);
        self.record_work(report);
    }

    fn record_work(&self, report: &PropagationReport) {
        self.classes_visited
            .fetch_add(report.visited as u64, Ordering::Relaxed);
        self.entries_updated
            .fetch_add(report.updated.len() as u64, Ordering::Relaxed);
        self.tables_rebuilt
            .fetch_add(report.rebuilt.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PropagationSnapshot {
        PropagationSnapshot {
            member_writes: self.member_writes.load(Ordering::Relaxed),
            early_exits: self.early_exits.load(Ordering::Relaxed),
            classes_visited: self.classes_visited.load(Ordering::Relaxed),
            entries_updated: self.entries_updated.load(Ordering::Relaxed),
            base_changes: self.base_changes.load(Ordering::Relaxed),
            tables_rebuilt: self.tables_rebuilt.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.member_writes.store(0, Ordering::Relaxed);
        self.early_exits.store(0, Ordering::Relaxed);
        self.classes_visited.store(0, Ordering::Relaxed);
        self.entries_updated.store(0, Ordering::Relaxed);
        self.base_changes.store(0, Ordering::Relaxed);
        self.tables_rebuilt.store(0, Ordering::Relaxed);
    }
}
