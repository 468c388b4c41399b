//! Process-wide descriptor tier for builtin types.
//!
//! Every context owns its own builtin class objects, so the concrete values
//! in their slot tables are per-context function objects. The shared tier
//! describes the same tables without naming any of them:
//!
//! - a context-free native method becomes a [`BuiltinDescriptor`] carrying
//!   the `'static` implementation and a process-wide index,
//! - an immutable plain value (`None`, ints, interned strings, ...) is kept
//!   as a [`SharedEntry::Constant`],
//! - anything else is [`SharedEntry::Unknown`] and dispatch falls back to
//!   the context's concrete table.
//!
//! The tables are built once per process from the first context to finish
//! bootstrap and are read without locking afterwards.

use crate::object::builtin_types::BuiltinType;
use crate::object::registry::ClassHierarchy;
use crate::slots::slot::{SLOT_COUNT, SpecialSlot};
use crate::slots::table::SlotTable;
use dunder_core::{BuiltinFunction, BuiltinImpl, ContextId, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

// =============================================================================
// Builtin Descriptor
// =============================================================================

/// Context-independent stand-in for a native slot implementation.
#[derive(Clone, Copy)]
pub struct BuiltinDescriptor {
    slot: SpecialSlot,
    imp: &'static BuiltinImpl,
    index: u32,
    owner: BuiltinType,
}

impl BuiltinDescriptor {
    #[inline]
    pub fn slot(&self) -> SpecialSlot {
        self.slot
    }

    /// The shared implementation.
    #[inline]
    pub fn implementation(&self) -> &'static BuiltinImpl {
        self.imp
    }

    /// Index into a context's call-target array.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Builtin type whose namespace defines the implementation.
    #[inline]
    pub fn owner(&self) -> BuiltinType {
        self.owner
    }

    /// Whether `function` is a per-context object for this descriptor.
    #[inline]
    pub fn is_descriptor_of(&self, function: &BuiltinFunction) -> bool {
        BuiltinImpl::same(self.imp, function.implementation())
    }

    /// Invoke the implementation directly in `context`.
    #[inline]
    pub fn invoke(&self, context: ContextId, args: &[Value]) -> Value {
        self.imp.invoke(context, args)
    }
}

impl PartialEq for BuiltinDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && BuiltinImpl::same(self.imp, other.imp)
    }
}

impl Eq for BuiltinDescriptor {}

impl fmt::Debug for BuiltinDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BuiltinDescriptor({}.{} #{})",
            self.owner.name(),
            self.slot,
            self.index
        )
    }
}

// =============================================================================
// Descriptor Index
// =============================================================================

/// Process-wide numbering of native implementations.
pub struct DescriptorIndex {
    inner: RwLock<IndexInner>,
}

#[derive(Default)]
struct IndexInner {
    by_address: FxHashMap<usize, u32>,
    impls: Vec<&'static BuiltinImpl>,
}

impl DescriptorIndex {
    fn new() -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
        }
    }

    /// Index of `imp`, assigning the next free one on first sight.
    pub fn index_of(&self, imp: &'static BuiltinImpl) -> u32 {
        let address = imp as *const BuiltinImpl as usize;
        if let Some(&index) = self.inner.read().by_address.get(&address) {
            return index;
        }
        let mut inner = self.inner.write();
        if let Some(&index) = inner.by_address.get(&address) {
            return index;
        }
        let index = inner.impls.len() as u32;
        inner.impls.push(imp);
        inner.by_address.insert(address, index);
        index
    }

    /// Implementation registered under `index`.
    pub fn get(&self, index: u32) -> Option<&'static BuiltinImpl> {
        self.inner.read().impls.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().impls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static DESCRIPTOR_INDEX: OnceLock<DescriptorIndex> = OnceLock::new();

/// The process-wide descriptor index.
pub fn descriptor_index() -> &'static DescriptorIndex {
    DESCRIPTOR_INDEX.get_or_init(DescriptorIndex::new)
}

// =============================================================================
// Shared Tables
// =============================================================================

/// One entry of a shared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedEntry {
    /// Resolve through the context's concrete table.
    Unknown,
    /// The same immutable value in every context.
    Constant(Value),
    Descriptor(BuiltinDescriptor),
}

/// Context-independent table of one builtin type.
pub struct SharedTable {
    builtin: BuiltinType,
    entries: [SharedEntry; SLOT_COUNT],
}

impl SharedTable {
    #[inline]
    pub fn builtin(&self) -> BuiltinType {
        self.builtin
    }

    #[inline]
    pub fn get(&self, slot: SpecialSlot) -> &SharedEntry {
        &self.entries[slot.ordinal()]
    }

    /// Number of descriptor entries.
    pub fn descriptor_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, SharedEntry::Descriptor(_)))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpecialSlot, &SharedEntry)> + '_ {
        SpecialSlot::ALL
            .iter()
            .map(move |&slot| (slot, &self.entries[slot.ordinal()]))
    }
}

impl fmt::Debug for SharedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTable")
            .field("builtin", &self.builtin)
            .field("descriptors", &self.descriptor_count())
            .finish()
    }
}

/// Write-once holder of the shared tables.
pub struct SharedSlotTables {
    lock: Mutex<()>,
    initialized: AtomicBool,
    tables: OnceLock<Box<[SharedTable]>>,
}

impl SharedSlotTables {
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            tables: OnceLock::new(),
        }
    }

    /// Whether the tables have been built.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Shared table of a builtin type, once built.
    #[inline]
    pub fn get(&self, ty: BuiltinType) -> Option<&SharedTable> {
        self.tables.get().and_then(|tables| tables.get(ty.ordinal()))
    }

    /// Build the tables from a bootstrapped hierarchy. Only the first call
    /// builds; later calls return `false` without reading `hier`.
    pub fn initialize<H: ClassHierarchy + ?Sized>(&self, hier: &H) -> bool {
        if self.is_initialized() {
            return false;
        }
        let _guard = self.lock.lock();
        if self.is_initialized() {
            return false;
        }

        let tables: Box<[SharedTable]> = BuiltinType::ALL
            .iter()
            .map(|&ty| build_shared_table(hier, ty))
            .collect();
        let descriptors: usize = tables.iter().map(SharedTable::descriptor_count).sum();
        let built = self.tables.set(tables).is_ok();
        self.initialized.store(true, Ordering::Release);
        info!(
            types = BuiltinType::COUNT,
            descriptors,
            implementations = descriptor_index().len(),
            "shared slot tables initialized"
        );
        built
    }
}

impl Default for SharedSlotTables {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_TABLES: SharedSlotTables = SharedSlotTables::new();

/// The process-wide shared tables.
#[inline]
pub fn shared_tables() -> &'static SharedSlotTables {
    &SHARED_TABLES
}

/// Build the process-wide tables from `hier` unless already built.
///
/// Returns `true` if this call built them.
pub fn initialize_shared_tables<H: ClassHierarchy + ?Sized>(hier: &H) -> bool {
    SHARED_TABLES.initialize(hier)
}

fn build_shared_table<H: ClassHierarchy + ?Sized>(hier: &H, ty: BuiltinType) -> SharedTable {
    let concrete = hier
        .class(ty.class_id())
        .and_then(|class| class.slot_cell().and_then(|cell| cell.load()));
    let absent = SlotTable::absent();
    let table = concrete.as_deref().unwrap_or(&absent);
    SharedTable {
        builtin: ty,
        entries: std::array::from_fn(|ordinal| {
            let slot = SpecialSlot::ALL[ordinal];
            classify_entry(hier, ty, slot, table.get(slot))
        }),
    }
}

/// Shared-tier representation of the concrete value `value` of `slot` on
/// builtin type `ty`.
pub fn classify_entry<H: ClassHierarchy + ?Sized>(
    hier: &H,
    ty: BuiltinType,
    slot: SpecialSlot,
    value: Option<&Value>,
) -> SharedEntry {
    if ty.redefines_slot(slot) {
        return SharedEntry::Unknown;
    }
    match value {
        None => SharedEntry::Unknown,
        Some(Value::Builtin(function)) => {
            let imp = function.implementation();
            if !slot.allows_builtin_descriptors() || !imp.context_free {
                return SharedEntry::Unknown;
            }
            let owner = hier
                .lookup_in_mro(ty.class_id(), slot.interned_name())
                .and_then(|hit| BuiltinType::from_class_id(hit.defining_class))
                .unwrap_or(ty);
            SharedEntry::Descriptor(BuiltinDescriptor {
                slot,
                imp,
                index: descriptor_index().index_of(imp),
                owner,
            })
        }
        Some(value) if value.is_context_independent() => SharedEntry::Constant(value.clone()),
        Some(_) => SharedEntry::Unknown,
    }
}
