//! Runtime values as seen by namespaces and slot tables.
//!
//! Equality on `Value` is *identity*: primitives compare by value (their
//! identity in the object model), heap objects compare by pointer. This is
//! the comparison slot invalidation needs, since replacing a method with an
//! equal-looking but distinct function object must still be observed.

use crate::builtin::BuiltinFunction;
use crate::intern::{InternedString, intern};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Function Object
// =============================================================================

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// A user-defined callable.
///
/// Only its identity matters to the slot cache; bodies live in the
/// surrounding object model.
pub struct FunctionObject {
    name: InternedString,
    id: u64,
}

impl FunctionObject {
    /// Create a function with a fresh identity.
    pub fn new(name: &str) -> Self {
        Self {
            name: intern(name),
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Function name.
    #[inline]
    pub fn name(&self) -> &InternedString {
        &self.name
    }

    /// Unique id.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {} #{}>", self.name, self.id)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// `None`.
    None,
    /// `NotImplemented`, returned by binary operators that decline.
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(InternedString),
    /// User-defined function.
    Function(Arc<FunctionObject>),
    /// Builtin function object bound to one context.
    Builtin(Arc<BuiltinFunction>),
}

impl Value {
    /// Create a fresh user function value.
    pub fn function(name: &str) -> Self {
        Value::Function(Arc::new(FunctionObject::new(name)))
    }

    /// Create an interned string value.
    pub fn str(s: &str) -> Self {
        Value::Str(intern(s))
    }

    /// Identity comparison.
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::NotImplemented, Value::NotImplemented) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this value carries no per-context state and may be shared
    /// by every context as a constant.
    #[inline]
    pub fn is_context_independent(&self) -> bool {
        !matches!(self, Value::Function(_) | Value::Builtin(_))
    }

    /// Interpret as an integer (bools count, as in Python).
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Interpret as a float, widening integers.
    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            other => other.as_int().map(|i| i as f64),
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&InternedString> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_builtin(&self) -> Option<&Arc<BuiltinFunction>> {
        match self {
            Value::Builtin(f) => Some(f),
            _ => None,
        }
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::NotImplemented => "NotImplementedType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }
}

impl PartialEq for Value {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.is(other)
    }
}

impl Eq for Value {}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::NotImplemented => f.write_str("NotImplemented"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Builtin(func) => write!(f, "{:?}", func),
        }
    }
}
