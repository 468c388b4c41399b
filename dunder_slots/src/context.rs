//! Execution contexts.
//!
//! A `Context` owns one isolated class graph: its own builtin class objects
//! (with per-context builtin function objects), user classes, call targets
//! and counters. All contexts share the process-wide slot registry, the
//! descriptor index and the shared tier.
//!
//! # Bootstrap
//!
//! 1. Create the builtin classes base-first, each namespace filled with
//!    function objects for its native implementations, and build their
//!    tables.
//! 2. Build the shared tier (first context in the process only).
//! 3. Install slots that read per-context state, through ordinary
//!    propagation.
//! 4. Freeze the builtin classes.
//! 5. Optionally run the validators.

use crate::config::SlotCacheConfig;
use crate::object::builtin_types::BuiltinType;
use crate::object::class::{ClassFlags, ForeignNamespace, PyClassObject};
use crate::object::mro::{ClassId, Mro, MroError, compute_c3_mro};
use crate::object::registry::ClassRegistry;
use crate::slots::build::install_table;
use crate::slots::dispatch::{
    CallTarget, CallTargets, DispatchStats, SlotLookup, concrete_slot_value, get_slot_value,
};
use crate::slots::propagate::{
    PropagationReport, PropagationStats, on_bases_changed, on_member_written,
};
use crate::slots::shared::{BuiltinDescriptor, initialize_shared_tables};
use crate::slots::slot::SpecialSlot;
use crate::slots::validate::{SlotMismatch, check_class_tables, check_shared_tables};
use dunder_core::{BuiltinFunction, ContextId, Value, intern};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Errors
// =============================================================================

/// Error from a class mutation or definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassError {
    /// No class with this id is registered.
    UnknownClass(ClassId),
    /// Linearization failed.
    Mro(MroError),
    /// Builtin classes cannot be changed after bootstrap.
    ImmutableBuiltin { class_name: String },
    /// Deleted attribute is not defined on the class itself.
    MissingAttribute { class_name: String, name: String },
    /// The foreign namespace bridge refused the write.
    ReadOnlyNamespace { class_name: String },
}

impl fmt::Display for ClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::UnknownClass(id) => write!(f, "unknown class {}", id),
            ClassError::Mro(err) => write!(f, "MRO error: {}", err),
            ClassError::ImmutableBuiltin { class_name } => write!(
                f,
                "cannot set attributes of built-in/extension type '{}'",
                class_name
            ),
            ClassError::MissingAttribute { class_name, name } => {
                write!(f, "type object '{}' has no attribute '{}'", class_name, name)
            }
            ClassError::ReadOnlyNamespace { class_name } => {
                write!(f, "namespace of foreign class '{}' is read-only", class_name)
            }
        }
    }
}

impl std::error::Error for ClassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassError::Mro(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MroError> for ClassError {
    fn from(err: MroError) -> Self {
        match err {
            MroError::UnknownClass(id) => ClassError::UnknownClass(id),
            err => ClassError::Mro(err),
        }
    }
}

// =============================================================================
// Context
// =============================================================================

/// An isolated execution context with its own class graph.
pub struct Context {
    id: ContextId,
    config: SlotCacheConfig,
    classes: ClassRegistry,
    call_targets: CallTargets,
    dispatch_stats: DispatchStats,
    propagation_stats: PropagationStats,
    /// Serializes class-graph mutations. A namespace write and the table
    /// updates it triggers must not interleave with another writer.
    mutation: Mutex<()>,
}

impl Context {
    /// Bootstrap a context configured from the environment.
    pub fn new() -> Self {
        Self::with_config(SlotCacheConfig::from_env())
    }

    /// Bootstrap a context with an explicit configuration.
    pub fn with_config(config: SlotCacheConfig) -> Self {
        let ctx = Self {
            id: ContextId::allocate(),
            config,
            classes: ClassRegistry::new(config.track_initializing),
            call_targets: CallTargets::new(),
            dispatch_stats: DispatchStats::new(),
            propagation_stats: PropagationStats::new(),
            mutation: Mutex::new(()),
        };
        ctx.bootstrap();
        ctx
    }

    fn bootstrap(&self) {
        for ty in BuiltinType::ALL {
            let class = PyClassObject::builtin(ty, builtin_mro(ty));
            if let Some(dict) = class.dict() {
                for &(slot, imp) in ty.native_slots() {
                    let function = BuiltinFunction::new(imp, self.id);
                    dict.set(slot.interned_name().clone(), Value::Builtin(Arc::new(function)));
                }
            }
            self.register_and_build(Arc::new(class));
        }

        let built_shared = initialize_shared_tables(&self.classes);

        for ty in BuiltinType::ALL {
            for &(slot, imp) in ty.post_init_slots() {
                let function = Value::Builtin(Arc::new(BuiltinFunction::new(imp, self.id)));
                let installed = self.write_attr(ty.class_id(), slot.name(), Some(function));
                if let Err(err) = &installed {
                    warn!(
                        context = %self.id,
                        class = ty.name(),
                        slot = slot.name(),
                        error = %err,
                        "post-init slot not installed"
                    );
                }
                debug_assert!(installed.is_ok(), "post-init slot {} on {} failed", slot, ty.name());
            }
            if let Some(class) = self.classes.get(ty.class_id()) {
                class.add_flags(ClassFlags::IMMUTABLE);
            }
        }

        info!(
            context = %self.id,
            builtins = BuiltinType::COUNT,
            built_shared,
            "context bootstrapped"
        );

        if self.config.validate_on_bootstrap {
            let mismatches = self.validate();
            if mismatches.is_empty() {
                debug!(context = %self.id, "slot tables validated");
            }
        }
    }

    /// Insert a class and publish its table, with the construction marker
    /// held in between.
    fn register_and_build(&self, class: Arc<PyClassObject>) {
        let id = class.id();
        self.classes.begin_initializing(id);
        self.classes.insert(Arc::clone(&class));
        install_table(&self.classes, id, self.config.fast_path);
        class.add_flags(ClassFlags::INITIALIZED);
        self.classes.finish_initializing(id);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &SlotCacheConfig {
        &self.config
    }

    #[inline]
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    #[inline]
    pub fn dispatch_stats(&self) -> &DispatchStats {
        &self.dispatch_stats
    }

    #[inline]
    pub fn propagation_stats(&self) -> &PropagationStats {
        &self.propagation_stats
    }

    #[inline]
    pub fn call_targets(&self) -> &CallTargets {
        &self.call_targets
    }

    /// This context's class object for a builtin type.
    pub fn builtin_class(&self, ty: BuiltinType) -> Option<Arc<PyClassObject>> {
        self.classes.get(ty.class_id())
    }

    // =========================================================================
    // Class Definition
    // =========================================================================

    /// Define a managed class with the given direct members.
    pub fn define_class(
        &self,
        name: &str,
        bases: &[ClassId],
        members: &[(&str, Value)],
    ) -> Result<ClassId, ClassError> {
        let _guard = self.mutation.lock();
        let id = self.classes.allocate_class_id();
        let mro = self.linearize_new(id, bases)?;
        let class = PyClassObject::managed(id, name, bases, mro);
        if let Some(dict) = class.dict() {
            for (member, value) in members {
                dict.set(intern(member), value.clone());
            }
        }
        self.register_and_build(Arc::new(class));
        debug!(context = %self.id, class = name, id = id.raw(), "class defined");
        Ok(id)
    }

    /// Define a class whose namespace lives behind a foreign bridge.
    pub fn define_foreign_class(
        &self,
        name: &str,
        bases: &[ClassId],
        namespace: Box<dyn ForeignNamespace>,
    ) -> Result<ClassId, ClassError> {
        let _guard = self.mutation.lock();
        let id = self.classes.allocate_class_id();
        let mro = self.linearize_new(id, bases)?;
        let class = PyClassObject::foreign(id, name, bases, mro, namespace);
        class.add_flags(ClassFlags::INITIALIZED);
        self.classes.insert(Arc::new(class));
        debug!(context = %self.id, class = name, id = id.raw(), "foreign class defined");
        Ok(id)
    }

    fn linearize_new(&self, id: ClassId, bases: &[ClassId]) -> Result<Mro, MroError> {
        compute_c3_mro(id, bases, |base| self.classes.get(base).map(|c| c.mro()))
    }

    /// Remove a class that was collected.
    pub fn unregister_class(&self, id: ClassId) -> Result<Arc<PyClassObject>, ClassError> {
        let _guard = self.mutation.lock();
        let class = self.mutable_class(id)?;
        self.classes.unregister(class.id()).ok_or(ClassError::UnknownClass(id))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Set an attribute on a class and propagate slot changes.
    pub fn set_class_attr(
        &self,
        id: ClassId,
        name: &str,
        value: Value,
    ) -> Result<PropagationReport, ClassError> {
        let _guard = self.mutation.lock();
        self.mutable_class(id)?;
        let report = self.write_attr(id, name, Some(value))?;
        self.record_write(&report);
        Ok(report)
    }

    /// Delete an attribute from a class and propagate slot changes.
    pub fn del_class_attr(&self, id: ClassId, name: &str) -> Result<PropagationReport, ClassError> {
        let _guard = self.mutation.lock();
        self.mutable_class(id)?;
        let report = self.write_attr(id, name, None)?;
        self.record_write(&report);
        Ok(report)
    }

    fn record_write(&self, report: &PropagationReport) {
        if report.slot.is_some() {
            self.propagation_stats.record_write(report);
        }
    }

    fn write_attr(
        &self,
        id: ClassId,
        name: &str,
        value: Option<Value>,
    ) -> Result<PropagationReport, ClassError> {
        let class = self.classes.get(id).ok_or(ClassError::UnknownClass(id))?;
        let previous = class
            .write_member(intern(name), value.clone())
            .map_err(|()| ClassError::ReadOnlyNamespace {
                class_name: class.name().to_string(),
            })?;
        if value.is_none() && previous.is_none() {
            return Err(ClassError::MissingAttribute {
                class_name: class.name().to_string(),
                name: name.to_string(),
            });
        }
        Ok(on_member_written(&self.classes, id, name, value.as_ref()))
    }

    /// Replace the bases of a class, recomputing MROs and slot tables.
    pub fn set_bases(
        &self,
        id: ClassId,
        bases: &[ClassId],
    ) -> Result<PropagationReport, ClassError> {
        let _guard = self.mutation.lock();
        self.mutable_class(id)?;
        let changed = self.classes.set_bases(id, bases)?;
        let report = on_bases_changed(&self.classes, id, &changed);
        self.propagation_stats.record_base_change(&report);
        Ok(report)
    }

    fn mutable_class(&self, id: ClassId) -> Result<Arc<PyClassObject>, ClassError> {
        let class = self.classes.get(id).ok_or(ClassError::UnknownClass(id))?;
        if class.is_immutable() {
            return Err(ClassError::ImmutableBuiltin {
                class_name: class.name().to_string(),
            });
        }
        Ok(class)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatch read of a slot.
    #[inline]
    pub fn slot_value(&self, id: ClassId, slot: SpecialSlot) -> SlotLookup {
        get_slot_value(self, id, slot)
    }

    /// Concrete value of a slot, bypassing the shared tier.
    #[inline]
    pub fn concrete_slot_value(&self, id: ClassId, slot: SpecialSlot) -> Option<Value> {
        concrete_slot_value(&self.classes, id, slot)
    }

    /// This context's entry point for a descriptor, resolved on first use.
    pub fn call_target(&self, desc: &BuiltinDescriptor) -> Option<Arc<CallTarget>> {
        self.call_targets.get_or_resolve(desc.index(), || {
            let owner = self.classes.get(desc.owner().class_id())?;
            match owner.own_member(desc.slot().interned_name())? {
                Value::Builtin(function) if desc.is_descriptor_of(&function) => {
                    Some(CallTarget::new(function))
                }
                _ => None,
            }
        })
    }

    /// Invoke a descriptor through this context's call target.
    pub fn invoke_descriptor(&self, desc: &BuiltinDescriptor, args: &[Value]) -> Option<Value> {
        self.call_target(desc).map(|target| target.call(args))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Run both validators over this context.
    pub fn validate(&self) -> Vec<SlotMismatch> {
        let mut mismatches = check_class_tables(&self.classes, &self.classes.ids());
        mismatches.extend(check_shared_tables(self));
        mismatches
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("classes", &self.classes.len())
            .finish()
    }
}

/// MRO of a builtin type: the type followed by its base chain.
fn builtin_mro(ty: BuiltinType) -> Mro {
    let mut mro = Mro::new();
    let mut next = Some(ty);
    while let Some(current) = next {
        mro.push(current.class_id());
        next = current.base();
    }
    mro
}
