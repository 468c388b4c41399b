//! Native builtin implementations and their per-context function objects.
//!
//! A [`BuiltinImpl`] is a `'static` description of one native method: a
//! plain function pointer plus metadata. Its address is its identity, so two
//! contexts that expose "the same" builtin share one `BuiltinImpl` even though
//! each context owns its own [`BuiltinFunction`] object wrapping it.

use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Context Identity
// =============================================================================

/// Identifier of an isolated execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

static NEXT_CONTEXT_ID: AtomicU32 = AtomicU32::new(1);

impl ContextId {
    /// Allocate a fresh, process-unique context id.
    pub fn allocate() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

// =============================================================================
// Builtin Implementation
// =============================================================================

/// Native entry point. Receives the invoking context and positional
/// arguments (`args[0]` is the receiver).
pub type NativeFn = fn(ContextId, &[Value]) -> Value;

/// Static description of a native method implementation.
pub struct BuiltinImpl {
    /// Dunder name the implementation is installed under.
    pub name: &'static str,
    /// Name of the type that declares it.
    pub owner: &'static str,
    /// The implementation itself.
    pub func: NativeFn,
    /// Whether the implementation reads no per-context state.
    pub context_free: bool,
}

impl BuiltinImpl {
    /// Describe an implementation that only depends on its arguments.
    pub const fn pure(name: &'static str, owner: &'static str, func: NativeFn) -> Self {
        Self {
            name,
            owner,
            func,
            context_free: true,
        }
    }

    /// Describe an implementation that consults per-context state.
    pub const fn contextual(name: &'static str, owner: &'static str, func: NativeFn) -> Self {
        Self {
            name,
            owner,
            func,
            context_free: false,
        }
    }

    /// Identity comparison.
    #[inline]
    pub fn same(a: &'static BuiltinImpl, b: &'static BuiltinImpl) -> bool {
        std::ptr::eq(a, b)
    }

    /// Invoke in the given context.
    #[inline]
    pub fn invoke(&self, context: ContextId, args: &[Value]) -> Value {
        (self.func)(context, args)
    }
}

impl fmt::Debug for BuiltinImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}.{}>", self.owner, self.name)
    }
}

// =============================================================================
// Builtin Function Object
// =============================================================================

/// A builtin function object as it appears in one context's namespaces.
///
/// Compared by identity through `Value`; two contexts never share one.
pub struct BuiltinFunction {
    implementation: &'static BuiltinImpl,
    context: ContextId,
}

impl BuiltinFunction {
    /// Wrap an implementation for a context.
    pub fn new(implementation: &'static BuiltinImpl, context: ContextId) -> Self {
        Self {
            implementation,
            context,
        }
    }

    /// The shared implementation behind this object.
    #[inline]
    pub fn implementation(&self) -> &'static BuiltinImpl {
        self.implementation
    }

    /// Context that owns this object.
    #[inline]
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Call with positional arguments.
    #[inline]
    pub fn call(&self, args: &[Value]) -> Value {
        self.implementation.invoke(self.context, args)
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<built-in method {}.{} of {}>",
            self.implementation.owner, self.implementation.name, self.context
        )
    }
}
