//! Process-wide string interning.
//!
//! Attribute names flow through every namespace read and write, so they are
//! interned once and compared by pointer afterwards. Two `InternedString`s
//! are equal exactly when they point at the same backing allocation, which
//! the interner guarantees for equal contents.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

// =============================================================================
// Interned String
// =============================================================================

/// An interned, immutable string with O(1) equality and hashing.
#[derive(Clone)]
pub struct InternedString(Arc<str>);

impl InternedString {
    /// Get the string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the backing allocation, stable for the process lifetime.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }
}

impl PartialEq for InternedString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for InternedString {}

impl Hash for InternedString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.as_ptr() as usize).hash(state);
    }
}

impl Deref for InternedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for InternedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Interner
// =============================================================================

struct Interner {
    strings: Mutex<FxHashSet<InternedArc>>,
}

/// Set entry that can be probed with a plain `&str`.
#[derive(PartialEq, Eq, Hash)]
struct InternedArc(Arc<str>);

impl Borrow<str> for InternedArc {
    fn borrow(&self) -> &str {
        &self.0
    }
}

static INTERNER: OnceLock<Interner> = OnceLock::new();

fn interner() -> &'static Interner {
    INTERNER.get_or_init(|| Interner {
        strings: Mutex::new(FxHashSet::default()),
    })
}

/// Intern a string, returning the canonical handle for its contents.
pub fn intern(s: &str) -> InternedString {
    let mut strings = interner().strings.lock();
    if let Some(existing) = strings.get(s) {
        return InternedString(existing.0.clone());
    }
    let arc: Arc<str> = Arc::from(s);
    strings.insert(InternedArc(arc.clone()));
    InternedString(arc)
}

/// Number of distinct strings interned so far.
pub fn interned_count() -> usize {
    interner().strings.lock().len()
}
