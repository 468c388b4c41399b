//! Class registry for mapping ClassId to class objects.
//!
//! Besides O(1) lookup by id, the registry owns the subclass back-references
//! the slot cache walks during invalidation, and recomputes MROs when a
//! class's bases are reassigned.

use crate::object::class::{Bases, MroHit, PyClassObject};
use crate::object::mro::{ClassId, Mro, MroError, compute_c3_mro};
use dashmap::DashMap;
use dunder_core::InternedString;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

// =============================================================================
// Hierarchy Seam
// =============================================================================

/// What the slot cache needs to know about the class graph.
pub trait ClassHierarchy {
    /// Class object by id.
    fn class(&self, id: ClassId) -> Option<Arc<PyClassObject>>;

    /// MRO of a class, most-derived first. Empty for unknown classes.
    fn linearize(&self, id: ClassId) -> Mro {
        self.class(id).map(|class| class.mro()).unwrap_or_default()
    }

    /// Classes that list `id` among their direct bases.
    fn direct_subclasses(&self, id: ClassId) -> Vec<ClassId>;

    /// Whether `id` may still be under construction. Implementations that do
    /// not track construction answer `true`.
    fn may_be_initializing(&self, _id: ClassId) -> bool {
        true
    }

    /// Uncached MRO walk for a member name.
    fn lookup_in_mro(&self, id: ClassId, name: &InternedString) -> Option<MroHit> {
        for (mro_index, ancestor) in self.linearize(id).into_iter().enumerate() {
            let Some(class) = self.class(ancestor) else {
                continue;
            };
            if let Some(value) = class.own_member(name) {
                return Some(MroHit {
                    value,
                    defining_class: ancestor,
                    mro_index,
                });
            }
        }
        None
    }
}

// =============================================================================
// Class Registry
// =============================================================================

/// Per-context registry of classes and their subclass links.
pub struct ClassRegistry {
    /// Map from ClassId to class object.
    classes: RwLock<FxHashMap<ClassId, Arc<PyClassObject>>>,
    /// Direct subclasses of each class.
    subclasses: DashMap<ClassId, FxHashSet<ClassId>>,
    /// Serializes structural changes (insert, base reassignment, removal).
    structure: Mutex<()>,
    /// Counter for generating new ClassIds.
    next_id: AtomicU32,
    /// Classes currently being constructed, innermost last.
    initializing: Mutex<Vec<ClassId>>,
    track_initializing: bool,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new(track_initializing: bool) -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            subclasses: DashMap::new(),
            structure: Mutex::new(()),
            next_id: AtomicU32::new(ClassId::FIRST_USER),
            initializing: Mutex::new(Vec::new()),
            track_initializing,
        }
    }

    /// Allocate a new ClassId for a user-defined class.
    pub fn allocate_class_id(&self) -> ClassId {
        ClassId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a class and link it under its bases.
    pub fn insert(&self, class: Arc<PyClassObject>) {
        let _guard = self.structure.lock();
        let id = class.id();
        for base in effective_bases(id, &class.bases()) {
            self.subclasses.entry(base).or_default().insert(id);
        }
        self.classes.write().insert(id, class);
    }

    /// Look up a class by id.
    #[inline]
    pub fn get(&self, id: ClassId) -> Option<Arc<PyClassObject>> {
        self.classes.read().get(&id).cloned()
    }

    #[inline]
    pub fn contains(&self, id: ClassId) -> bool {
        self.classes.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all registered classes, in ascending order.
    pub fn ids(&self) -> Vec<ClassId> {
        let mut ids: Vec<ClassId> = self.classes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Remove a collected class and its subclass links.
    ///
    /// Surviving subclasses keep the id in their bases; propagation skips
    /// ids that no longer resolve.
    pub fn unregister(&self, id: ClassId) -> Option<Arc<PyClassObject>> {
        let _guard = self.structure.lock();
        let class = self.classes.write().remove(&id)?;
        for base in effective_bases(id, &class.bases()) {
            if let Some(mut subclasses) = self.subclasses.get_mut(&base) {
                subclasses.remove(&id);
            }
        }
        self.subclasses.remove(&id);
        debug!(class = %class.name(), id = id.raw(), "class unregistered");
        Some(class)
    }

    // =========================================================================
    // Construction Tracking
    // =========================================================================

    /// Mark a class as under construction.
    pub fn begin_initializing(&self, id: ClassId) {
        if self.track_initializing {
            self.initializing.lock().push(id);
        }
    }

    /// Clear the construction mark of a class.
    pub fn finish_initializing(&self, id: ClassId) {
        if self.track_initializing {
            let mut stack = self.initializing.lock();
            if let Some(pos) = stack.iter().rposition(|&c| c == id) {
                stack.remove(pos);
            }
        }
    }

    /// Whether construction tracking is enabled and `id` is marked.
    pub fn is_initializing(&self, id: ClassId) -> bool {
        self.track_initializing && self.initializing.lock().contains(&id)
    }

    // =========================================================================
    // Graph Queries
    // =========================================================================

    /// All transitive subclasses of `id`, breadth-first, each listed once.
    pub fn descendants(&self, id: ClassId) -> Vec<ClassId> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue: VecDeque<ClassId> = self.direct_subclasses(id).into();
        while let Some(next) = queue.pop_front() {
            if next == id || !seen.insert(next) {
                continue;
            }
            order.push(next);
            queue.extend(self.direct_subclasses(next));
        }
        order
    }

    // =========================================================================
    // Base Reassignment
    // =========================================================================

    /// Replace the bases of `id`, recomputing the MRO of the class and of
    /// every descendant.
    ///
    /// Nothing changes unless every new MRO can be computed. Returns the
    /// descendants whose MRO changed, bases before subclasses.
    pub fn set_bases(&self, id: ClassId, new_bases: &[ClassId]) -> Result<Vec<ClassId>, MroError> {
        let _guard = self.structure.lock();
        let class = self.get(id).ok_or(MroError::UnknownClass(id))?;

        let descendants = self.descendants(id);
        let below: FxHashSet<ClassId> = descendants.iter().copied().collect();
        if let Some(&base) = new_bases.iter().find(|b| **b == id || below.contains(b)) {
            return Err(MroError::Cycle { class: id, base });
        }

        let mut pending: FxHashMap<ClassId, Mro> = FxHashMap::default();
        let mro = compute_c3_mro(id, new_bases, |b| self.pending_mro(&pending, b))?;
        pending.insert(id, mro);

        // Kahn's algorithm over the descendant subgraph so every class is
        // linearized after all of its bases.
        let mut indegree: FxHashMap<ClassId, usize> = FxHashMap::default();
        for &d in &descendants {
            let bases = self.get(d).map(|c| c.bases()).unwrap_or_default();
            let count = bases.iter().filter(|b| below.contains(b)).count();
            indegree.insert(d, count);
        }
        let mut ready: VecDeque<ClassId> = descendants
            .iter()
            .copied()
            .filter(|d| indegree.get(d) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(descendants.len());
        while let Some(d) = ready.pop_front() {
            let Some(sub) = self.get(d) else {
                continue;
            };
            let sub_mro = compute_c3_mro(d, &sub.bases(), |b| self.pending_mro(&pending, b))?;
            pending.insert(d, sub_mro);
            order.push(d);
            for s in self.direct_subclasses(d) {
                if let Some(count) = indegree.get_mut(&s) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.push_back(s);
                    }
                }
            }
        }

        // Apply.
        let old_bases = class.bases();
        for base in effective_bases(id, &old_bases) {
            if let Some(mut subclasses) = self.subclasses.get_mut(&base) {
                subclasses.remove(&id);
            }
        }
        let new_bases: Bases = new_bases.iter().copied().collect();
        for base in effective_bases(id, &new_bases) {
            self.subclasses.entry(base).or_default().insert(id);
        }
        class.replace_bases(new_bases);

        let mut changed = Vec::new();
        for (cid, new_mro) in pending {
            let Some(target) = self.get(cid) else {
                continue;
            };
            if target.mro() != new_mro {
                target.replace_mro(new_mro);
                if cid != id {
                    changed.push(cid);
                }
            }
        }
        changed.sort_by_key(|cid| order.iter().position(|o| o == cid));

        debug!(
            class = %class.name(),
            id = id.raw(),
            descendants_changed = changed.len(),
            "bases reassigned"
        );
        Ok(changed)
    }

    fn pending_mro(&self, pending: &FxHashMap<ClassId, Mro>, id: ClassId) -> Option<Mro> {
        pending
            .get(&id)
            .cloned()
            .or_else(|| self.get(id).map(|class| class.mro()))
    }
}

impl ClassHierarchy for ClassRegistry {
    fn class(&self, id: ClassId) -> Option<Arc<PyClassObject>> {
        self.get(id)
    }

    fn direct_subclasses(&self, id: ClassId) -> Vec<ClassId> {
        let mut subclasses: Vec<ClassId> = self
            .subclasses
            .get(&id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        subclasses.sort_unstable();
        subclasses
    }

    fn may_be_initializing(&self, id: ClassId) -> bool {
        !self.track_initializing || self.is_initializing(id)
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

/// Bases as seen by the subclass graph: no bases means `object`.
fn effective_bases(id: ClassId, bases: &[ClassId]) -> Bases {
    if bases.is_empty() && id != ClassId::OBJECT {
        let mut implicit = Bases::new();
        implicit.push(ClassId::OBJECT);
        implicit
    } else {
        bases.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dunder_core::{Value, intern};

    fn registry_with_object() -> ClassRegistry {
        let registry = ClassRegistry::new(true);
        let object = PyClassObject::managed(ClassId::OBJECT, "object", &[], Mro::from_slice(&[ClassId::OBJECT]));
        registry.insert(Arc::new(object));
        registry
    }

    fn define(registry: &ClassRegistry, name: &str, bases: &[ClassId]) -> ClassId {
        let id = registry.allocate_class_id();
        let mro = compute_c3_mro(id, bases, |b| registry.get(b).map(|c| c.mro())).unwrap();
        registry.insert(Arc::new(PyClassObject::managed(id, name, bases, mro)));
        id
    }

    #[test]
    fn test_allocate_class_id() {
        let registry = ClassRegistry::new(false);
        let id1 = registry.allocate_class_id();
        let id2 = registry.allocate_class_id();
        assert_eq!(id1.raw(), 64);
        assert_eq!(id2.raw(), 65);
    }

    #[test]
    fn test_subclass_links() {
        let registry = registry_with_object();
        let a = define(&registry, "A", &[]);
        let b = define(&registry, "B", &[a]);
        let c = define(&registry, "C", &[a]);
        let d = define(&registry, "D", &[b, c]);

        assert_eq!(registry.direct_subclasses(ClassId::OBJECT), vec![a]);
        assert_eq!(registry.direct_subclasses(a), vec![b, c]);
        assert_eq!(registry.descendants(a), vec![b, c, d]);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_lookup_in_mro() {
        let registry = registry_with_object();
        let a = define(&registry, "A", &[]);
        let b = define(&registry, "B", &[a]);
        let f = Value::function("__len__");
        registry.get(a).unwrap().dict().unwrap().set(intern("__len__"), f.clone());

        let hit = registry.lookup_in_mro(b, &intern("__len__")).unwrap();
        assert_eq!(hit.value, f);
        assert_eq!(hit.defining_class, a);
        assert_eq!(hit.mro_index, 1);
        assert!(registry.lookup_in_mro(b, &intern("__iter__")).is_none());
    }

    /// Hierarchy with one real class at the end of a very long MRO.
    struct DeepMro {
        registry: ClassRegistry,
        target: ClassId,
        depth: usize,
    }

    impl ClassHierarchy for DeepMro {
        fn class(&self, id: ClassId) -> Option<Arc<PyClassObject>> {
            self.registry.get(id)
        }

        fn linearize(&self, _id: ClassId) -> Mro {
            let mut mro: Mro = (0..self.depth).map(|i| ClassId(1_000_000 + i as u32)).collect();
            mro.push(self.target);
            mro
        }

        fn direct_subclasses(&self, _id: ClassId) -> Vec<ClassId> {
            Vec::new()
        }
    }

    #[test]
    fn test_lookup_in_mro_reports_deep_index() {
        let registry = registry_with_object();
        let f = Value::function("__hash__");
        registry
            .get(ClassId::OBJECT)
            .unwrap()
            .dict()
            .unwrap()
            .set(intern("__hash__"), f.clone());

        let depth = usize::from(u16::MAX) + 10;
        let hier = DeepMro {
            registry,
            target: ClassId::OBJECT,
            depth,
        };
        let hit = hier.lookup_in_mro(ClassId(5), &intern("__hash__")).unwrap();
        assert_eq!(hit.value, f);
        assert_eq!(hit.mro_index, depth);
    }

    #[test]
    fn test_initializing_marker() {
        let registry = ClassRegistry::new(true);
        let id = ClassId(80);
        assert!(!registry.may_be_initializing(id));
        registry.begin_initializing(id);
        assert!(registry.may_be_initializing(id));
        registry.finish_initializing(id);
        assert!(!registry.is_initializing(id));

        let untracked = ClassRegistry::new(false);
        assert!(untracked.may_be_initializing(id));
    }

    #[test]
    fn test_set_bases_recomputes_descendants() {
        let registry = registry_with_object();
        let a = define(&registry, "A", &[]);
        let x = define(&registry, "X", &[]);
        let b = define(&registry, "B", &[]);
        let c = define(&registry, "C", &[b]);

        let changed = registry.set_bases(b, &[a, x]).unwrap();
        assert_eq!(changed, vec![c]);
        assert_eq!(
            registry.get(c).unwrap().mro().as_slice(),
            &[c, b, a, x, ClassId::OBJECT]
        );
        assert_eq!(registry.direct_subclasses(a), vec![b]);
        assert!(!registry.direct_subclasses(ClassId::OBJECT).contains(&b));
    }

    #[test]
    fn test_set_bases_rejects_cycles_without_changes() {
        let registry = registry_with_object();
        let a = define(&registry, "A", &[]);
        let b = define(&registry, "B", &[a]);

        assert_eq!(
            registry.set_bases(a, &[b]),
            Err(MroError::Cycle { class: a, base: b })
        );
        assert!(registry.get(a).unwrap().bases().is_empty());
        assert_eq!(registry.get(b).unwrap().mro().as_slice(), &[b, a, ClassId::OBJECT]);
    }

    #[test]
    fn test_set_bases_unknown_class() {
        let registry = registry_with_object();
        let err = registry.set_bases(ClassId(9999), &[]).unwrap_err();
        assert_eq!(err, MroError::UnknownClass(ClassId(9999)));
        assert_eq!(err.to_string(), format!("class {} is not registered", ClassId(9999)));
    }

    #[test]
    fn test_unregister_removes_links() {
        let registry = registry_with_object();
        let a = define(&registry, "A", &[]);
        let b = define(&registry, "B", &[a]);

        assert!(registry.unregister(b).is_some());
        assert!(registry.direct_subclasses(a).is_empty());
        assert!(!registry.contains(b));
        assert!(registry.unregister(b).is_none());
    }
}
