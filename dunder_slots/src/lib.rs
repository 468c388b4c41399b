//! Special-method slot cache for the Python object model.
//!
//! This crate provides:
//! - The fixed set of special-method slots and name-to-slot resolution
//! - Per-class slot tables built from the MRO and kept exact on writes
//! - Invalidation across subclasses on member writes and base changes
//! - A process-wide shared tier of context-independent builtin descriptors
//! - Execution contexts owning isolated class graphs
//! - Validators comparing cached entries with uncached MRO lookups

pub mod config;
pub mod context;
pub mod object;
pub mod slots;

// Re-export commonly used items
pub use config::SlotCacheConfig;
pub use context::{ClassError, Context};
pub use object::builtin_types::BuiltinType;
pub use object::class::{ClassFlags, ClassKind, ForeignNamespace, NativeNamespace, PyClassObject};
pub use object::mro::{ClassId, Mro, MroError};
pub use object::registry::{ClassHierarchy, ClassRegistry};
pub use slots::dispatch::{SlotLookup, get_slot_value};
pub use slots::propagate::{PropagationReport, PropagationSnapshot};
pub use slots::shared::{BuiltinDescriptor, SharedEntry, shared_tables};
pub use slots::slot::{SLOT_COUNT, SpecialSlot, resolve_slot};
pub use slots::table::SlotTable;
pub use slots::validate::SlotMismatch;
