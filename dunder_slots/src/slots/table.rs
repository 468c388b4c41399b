//! Per-class slot tables and their publication cell.
//!
//! A [`SlotTable`] is a fixed-size array indexed by slot ordinal. Tables are
//! never mutated once published: a [`SlotCell`] always swaps in a fresh
//! `Arc<SlotTable>`, so a reader holding the previous `Arc` keeps a complete,
//! consistent snapshot.

use crate::slots::slot::{SLOT_COUNT, SpecialSlot};
use dunder_core::Value;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Slot Table
// =============================================================================

/// Cached MRO lookup results for every slot of one class.
#[derive(Clone, PartialEq, Eq)]
pub struct SlotTable {
    entries: [Option<Value>; SLOT_COUNT],
}

impl SlotTable {
    /// A table with every slot absent.
    pub fn absent() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
        }
    }

    /// Cached value of a slot, `None` when absent.
    #[inline]
    pub fn get(&self, slot: SpecialSlot) -> Option<&Value> {
        self.entries[slot.ordinal()].as_ref()
    }

    /// Overwrite one entry. Only valid on a table that is not yet published.
    #[inline]
    pub fn set(&mut self, slot: SpecialSlot, value: Option<Value>) {
        self.entries[slot.ordinal()] = value;
    }

    /// Copy of this table with one entry replaced.
    pub fn with_entry(&self, slot: SpecialSlot, value: Option<Value>) -> Self {
        let mut next = self.clone();
        next.set(slot, value);
        next
    }

    /// Iterate `(slot, entry)` pairs in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (SpecialSlot, Option<&Value>)> + '_ {
        SpecialSlot::ALL
            .iter()
            .map(move |&slot| (slot, self.entries[slot.ordinal()].as_ref()))
    }

    /// Number of present entries.
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Slots whose entries differ between `self` and `other`.
    pub fn diff(&self, other: &SlotTable) -> Vec<SpecialSlot> {
        SpecialSlot::ALL
            .iter()
            .copied()
            .filter(|&slot| !same_entry(self.get(slot), other.get(slot)))
            .collect()
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::absent()
    }
}

impl fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (slot, entry) in self.iter() {
            if let Some(value) = entry {
                map.entry(&slot.name(), value);
            }
        }
        map.finish()
    }
}

/// Identity comparison of two optional entries.
#[inline]
pub fn same_entry(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.is(b),
        _ => false,
    }
}

// =============================================================================
// Slot Cell
// =============================================================================

/// Publication point for a class's slot table.
///
/// Empty until the class finishes construction.
pub struct SlotCell {
    table: RwLock<Option<Arc<SlotTable>>>,
}

impl SlotCell {
    /// An empty cell.
    pub const fn new() -> Self {
        Self {
            table: RwLock::new(None),
        }
    }

    /// Current snapshot.
    #[inline]
    pub fn load(&self) -> Option<Arc<SlotTable>> {
        self.table.read().clone()
    }

    /// Whether a table has been published.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.table.read().is_some()
    }

    /// Copy one entry out of the current table.
    ///
    /// Outer `None` means there is no table yet.
    #[inline]
    pub fn entry(&self, slot: SpecialSlot) -> Option<Option<Value>> {
        self.table
            .read()
            .as_ref()
            .map(|table| table.get(slot).cloned())
    }

    /// Publish a complete table, returning the one it replaces.
    ///
    /// The caller keeps its own handle on `table`, so it never has to read
    /// the cell back to learn what it published.
    pub fn publish(&self, table: Arc<SlotTable>) -> Option<Arc<SlotTable>> {
        self.table.write().replace(table)
    }

    /// Publish a copy of the current table with one entry replaced.
    ///
    /// Returns `false` (and publishes nothing) when there is no table or the
    /// entry already holds `value`.
    pub fn replace_entry(&self, slot: SpecialSlot, value: Option<Value>) -> bool {
        let mut guard = self.table.write();
        let Some(current) = guard.as_ref() else {
            return false;
        };
        if same_entry(current.get(slot), value.as_ref()) {
            return false;
        }
        let next = current.with_entry(slot, value);
        *guard = Some(Arc::new(next));
        true
    }
}

impl Default for SlotCell {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SlotCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.load() {
            Some(table) => write!(f, "SlotCell({} present)", table.present_count()),
            None => f.write_str("SlotCell(uninitialized)"),
        }
    }
}
