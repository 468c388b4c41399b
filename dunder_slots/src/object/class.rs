//! Class objects as seen by the slot cache.
//!
//! A `PyClassObject` is either *managed*, with a namespace held in a
//! [`ClassDict`] and a published slot table, or *foreign*, with members read
//! through a [`ForeignNamespace`] bridge and no table of its own.
//!
//! # Architecture
//!
//! ```text
//! PyClassObject
//! ├── id: ClassId
//! ├── name: InternedString
//! ├── builtin: Option<BuiltinType>
//! ├── bases: RwLock<Bases>      (declaration order, empty = implicit object)
//! ├── mro: RwLock<Mro>          (recomputed on base reassignment)
//! ├── flags: AtomicU32          (ClassFlags)
//! └── kind: ClassKind
//!     ├── Managed { dict: ClassDict, slots: SlotCell }
//!     └── Foreign(Box<dyn ForeignNamespace>)
//! ```

use crate::object::builtin_types::BuiltinType;
use crate::object::mro::{ClassId, Mro};
use crate::slots::slot::{SpecialSlot, resolve_slot};
use crate::slots::table::SlotCell;
use dunder_core::{InternedString, Value, intern};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Class Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags describing class state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u32 {
        /// Class construction finished and its table is published.
        const INITIALIZED = 1 << 0;
        /// Class was created by context bootstrap.
        const BUILTIN = 1 << 1;
        /// Namespace and bases can no longer be changed.
        const IMMUTABLE = 1 << 2;
    }
}

impl Default for ClassFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// Class Dictionary
// =============================================================================

/// Class attribute dictionary (methods, class variables).
#[derive(Default)]
pub struct ClassDict {
    attrs: RwLock<FxHashMap<InternedString, Value>>,
}

impl ClassDict {
    /// Create a new empty class dict.
    pub fn new() -> Self {
        Self {
            attrs: RwLock::new(FxHashMap::default()),
        }
    }

    #[inline]
    pub fn get(&self, name: &InternedString) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    /// Set an attribute, returning the previous value.
    #[inline]
    pub fn set(&self, name: InternedString, value: Value) -> Option<Value> {
        self.attrs.write().insert(name, value)
    }

    #[inline]
    pub fn delete(&self, name: &InternedString) -> Option<Value> {
        self.attrs.write().remove(name)
    }

    #[inline]
    pub fn contains(&self, name: &InternedString) -> bool {
        self.attrs.read().contains_key(name)
    }

    pub fn keys(&self) -> Vec<InternedString> {
        self.attrs.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.attrs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.read().is_empty()
    }

    /// Iterate over all attributes under one read lock.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&InternedString, &Value),
    {
        let attrs = self.attrs.read();
        for (name, value) in attrs.iter() {
            f(name, value);
        }
    }
}

impl fmt::Debug for ClassDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.attrs.read().iter()).finish()
    }
}

// =============================================================================
// Foreign Namespaces
// =============================================================================

/// Bridge to a namespace owned by an external representation.
pub trait ForeignNamespace: Send + Sync {
    /// Member defined directly on the foreign class.
    fn get_member(&self, name: &str) -> Option<Value>;

    /// Names of all directly defined members.
    fn member_names(&self) -> Vec<InternedString>;

    /// Write or delete a member. Returns `false` if the bridge is read-only.
    fn set_member(&self, name: &str, value: Option<Value>) -> bool;
}

/// A foreign namespace backed by a plain map, as produced by native
/// extension type definitions.
#[derive(Default)]
pub struct NativeNamespace {
    members: RwLock<FxHashMap<InternedString, Value>>,
    read_only: bool,
}

impl NativeNamespace {
    pub fn new<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        Self {
            members: RwLock::new(
                members
                    .into_iter()
                    .map(|(name, value)| (intern(name), value))
                    .collect(),
            ),
            read_only: false,
        }
    }

    /// Reject all writes through the bridge.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl ForeignNamespace for NativeNamespace {
    fn get_member(&self, name: &str) -> Option<Value> {
        self.members.read().get(&intern(name)).cloned()
    }

    fn member_names(&self) -> Vec<InternedString> {
        self.members.read().keys().cloned().collect()
    }

    fn set_member(&self, name: &str, value: Option<Value>) -> bool {
        if self.read_only {
            return false;
        }
        let mut members = self.members.write();
        match value {
            Some(value) => {
                members.insert(intern(name), value);
            }
            None => {
                members.remove(&intern(name));
            }
        }
        true
    }
}

// =============================================================================
// Class Kind
// =============================================================================

/// State owned by a managed class.
#[derive(Debug, Default)]
pub struct ManagedClass {
    pub dict: ClassDict,
    pub slots: SlotCell,
}

/// Namespace representation of a class.
pub enum ClassKind {
    Managed(ManagedClass),
    Foreign(Box<dyn ForeignNamespace>),
}

impl fmt::Debug for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassKind::Managed(managed) => f.debug_tuple("Managed").field(managed).finish(),
            ClassKind::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}

// =============================================================================
// Base Classes Storage
// =============================================================================

/// Stack-allocated storage for base classes.
/// Most classes have 1-2 base classes.
pub type Bases = SmallVec<[ClassId; 2]>;

// =============================================================================
// MRO Lookup Result
// =============================================================================

/// Result of an uncached MRO walk.
#[derive(Debug, Clone)]
pub struct MroHit {
    /// The member value.
    pub value: Value,
    /// ClassId where the member was found.
    pub defining_class: ClassId,
    /// Index in MRO where the member was found.
    pub mro_index: usize,
}

// =============================================================================
// Class Object
// =============================================================================

/// A class registered with a context.
#[derive(Debug)]
pub struct PyClassObject {
    id: ClassId,
    name: InternedString,
    builtin: Option<BuiltinType>,
    bases: RwLock<Bases>,
    mro: RwLock<Mro>,
    flags: AtomicU32,
    kind: ClassKind,
}

impl PyClassObject {
    /// Create a managed class with an empty namespace and no table yet.
    pub fn managed(id: ClassId, name: &str, bases: &[ClassId], mro: Mro) -> Self {
        Self::with_kind(id, name, bases, mro, ClassKind::Managed(ManagedClass::default()))
    }

    /// Create a foreign class reading members through `namespace`.
    pub fn foreign(
        id: ClassId,
        name: &str,
        bases: &[ClassId],
        mro: Mro,
        namespace: Box<dyn ForeignNamespace>,
    ) -> Self {
        Self::with_kind(id, name, bases, mro, ClassKind::Foreign(namespace))
    }

    /// Create the managed class for a builtin type.
    pub fn builtin(ty: BuiltinType, mro: Mro) -> Self {
        let bases: Bases = ty.base().map(BuiltinType::class_id).into_iter().collect();
        let mut class = Self::managed(ty.class_id(), ty.name(), &bases, mro);
        class.builtin = Some(ty);
        class.add_flags(ClassFlags::BUILTIN);
        class
    }

    fn with_kind(id: ClassId, name: &str, bases: &[ClassId], mro: Mro, kind: ClassKind) -> Self {
        Self {
            id,
            name: intern(name),
            builtin: None,
            bases: RwLock::new(bases.iter().copied().collect()),
            mro: RwLock::new(mro),
            flags: AtomicU32::new(ClassFlags::empty().bits()),
            kind,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ClassId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &InternedString {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &ClassKind {
        &self.kind
    }

    /// Builtin type this class was bootstrapped for.
    #[inline]
    pub fn builtin_type(&self) -> Option<BuiltinType> {
        self.builtin
    }

    #[inline]
    pub fn is_foreign(&self) -> bool {
        matches!(self.kind, ClassKind::Foreign(_))
    }

    /// Direct bases in declaration order.
    pub fn bases(&self) -> Bases {
        self.bases.read().clone()
    }

    /// Current MRO snapshot.
    pub fn mro(&self) -> Mro {
        self.mro.read().clone()
    }

    pub(crate) fn replace_bases(&self, bases: Bases) {
        *self.bases.write() = bases;
    }

    pub(crate) fn replace_mro(&self, mro: Mro) {
        *self.mro.write() = mro;
    }

    /// Slot table cell; `None` for foreign classes.
    #[inline]
    pub fn slot_cell(&self) -> Option<&SlotCell> {
        match &self.kind {
            ClassKind::Managed(managed) => Some(&managed.slots),
            ClassKind::Foreign(_) => None,
        }
    }

    /// Managed namespace; `None` for foreign classes.
    #[inline]
    pub fn dict(&self) -> Option<&ClassDict> {
        match &self.kind {
            ClassKind::Managed(managed) => Some(&managed.dict),
            ClassKind::Foreign(_) => None,
        }
    }

    // =========================================================================
    // Namespace Access
    // =========================================================================

    /// Member defined directly on this class, ignoring ancestors.
    pub fn own_member(&self, name: &InternedString) -> Option<Value> {
        match &self.kind {
            ClassKind::Managed(managed) => managed.dict.get(name),
            ClassKind::Foreign(namespace) => namespace.get_member(name.as_str()),
        }
    }

    /// Directly defined members that name a special slot.
    pub fn own_slot_members(&self) -> Vec<(SpecialSlot, Value)> {
        let mut members = Vec::new();
        match &self.kind {
            ClassKind::Managed(managed) => managed.dict.for_each(|name, value| {
                if let Some(slot) = resolve_slot(name) {
                    members.push((slot, value.clone()));
                }
            }),
            ClassKind::Foreign(namespace) => {
                for name in namespace.member_names() {
                    if let Some(slot) = resolve_slot(&name) {
                        if let Some(value) = namespace.get_member(&name) {
                            members.push((slot, value));
                        }
                    }
                }
            }
        }
        members
    }

    /// Write or delete a member in the class's own namespace.
    ///
    /// Returns the previous value, or `Err(())` if a foreign bridge refused
    /// the write.
    pub(crate) fn write_member(
        &self,
        name: InternedString,
        value: Option<Value>,
    ) -> Result<Option<Value>, ()> {
        match &self.kind {
            ClassKind::Managed(managed) => Ok(match value {
                Some(value) => managed.dict.set(name, value),
                None => managed.dict.delete(&name),
            }),
            ClassKind::Foreign(namespace) => {
                let previous = namespace.get_member(&name);
                if namespace.set_member(&name, value) {
                    Ok(previous)
                } else {
                    Err(())
                }
            }
        }
    }

    // =========================================================================
    // Flags
    // =========================================================================

    #[inline]
    pub fn flags(&self) -> ClassFlags {
        ClassFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn add_flags(&self, flags: ClassFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags().contains(ClassFlags::INITIALIZED)
    }

    #[inline]
    pub fn is_immutable(&self) -> bool {
        self.flags().contains(ClassFlags::IMMUTABLE)
    }
}
