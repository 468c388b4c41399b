//! Built-in types and their native slot implementations.
//!
//! Every context creates its own class objects for these types, but the
//! native implementations are `'static` and shared by address. That shared
//! identity is what lets the shared slot tier describe a builtin method once
//! for all contexts.

use crate::object::mro::ClassId;
use crate::slots::slot::SpecialSlot;
use dunder_core::{BuiltinImpl, ContextId, Value};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

// =============================================================================
// Builtin Type
// =============================================================================

/// A type created during context bootstrap.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Object,
    NoneType,
    Int,
    Bool,
    Float,
    Str,
    Module,
}

impl BuiltinType {
    /// All builtin types, bases before subclasses.
    pub const ALL: [BuiltinType; 7] = [
        BuiltinType::Object,
        BuiltinType::NoneType,
        BuiltinType::Int,
        BuiltinType::Bool,
        BuiltinType::Float,
        BuiltinType::Str,
        BuiltinType::Module,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Fixed class id; builtins occupy the ids below `ClassId::FIRST_USER`.
    #[inline]
    pub const fn class_id(self) -> ClassId {
        ClassId(self as u32)
    }

    /// Builtin type with the given class id.
    pub fn from_class_id(id: ClassId) -> Option<BuiltinType> {
        Self::ALL.get(id.raw() as usize).copied()
    }

    #[inline]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            BuiltinType::Object => "object",
            BuiltinType::NoneType => "NoneType",
            BuiltinType::Int => "int",
            BuiltinType::Bool => "bool",
            BuiltinType::Float => "float",
            BuiltinType::Str => "str",
            BuiltinType::Module => "module",
        }
    }

    /// Direct base; `object` has none.
    pub const fn base(self) -> Option<BuiltinType> {
        match self {
            BuiltinType::Object => None,
            BuiltinType::Bool => Some(BuiltinType::Int),
            _ => Some(BuiltinType::Object),
        }
    }

    /// Slots defined directly on the type during bootstrap.
    pub fn native_slots(self) -> &'static [(SpecialSlot, &'static BuiltinImpl)] {
        match self {
            BuiltinType::Object => OBJECT_SLOTS,
            BuiltinType::NoneType => NONE_SLOTS,
            BuiltinType::Int => INT_SLOTS,
            BuiltinType::Bool => BOOL_SLOTS,
            BuiltinType::Float => FLOAT_SLOTS,
            BuiltinType::Str => STR_SLOTS,
            BuiltinType::Module => &[],
        }
    }

    /// Slots installed after the shared tier was built, with
    /// implementations that read per-context state.
    pub fn post_init_slots(self) -> &'static [(SpecialSlot, &'static BuiltinImpl)] {
        match self {
            BuiltinType::Module => MODULE_POST_INIT_SLOTS,
            _ => &[],
        }
    }

    /// Whether the shared tier must not describe `slot` for this type.
    pub fn redefines_slot(self, slot: SpecialSlot) -> bool {
        self.post_init_slots().iter().any(|&(s, _)| s == slot)
    }
}

// =============================================================================
// Argument Helpers
// =============================================================================

#[inline]
fn int_pair(args: &[Value]) -> Option<(i64, i64)> {
    match args {
        [a, b, ..] => Some((a.as_int()?, b.as_int()?)),
        _ => None,
    }
}

#[inline]
fn float_pair(args: &[Value]) -> Option<(f64, f64)> {
    match args {
        [a, b, ..] => Some((a.as_float()?, b.as_float()?)),
        _ => None,
    }
}

#[inline]
fn bool_pair(args: &[Value]) -> Option<(bool, bool)> {
    match args {
        [Value::Bool(a), Value::Bool(b), ..] => Some((*a, *b)),
        _ => None,
    }
}

/// Integer binary operator. Overflow declines.
fn int_binary(args: &[Value], op: fn(i64, i64) -> Option<i64>) -> Value {
    int_pair(args)
        .and_then(|(a, b)| op(a, b))
        .map_or(Value::NotImplemented, Value::Int)
}

/// Reflected integer operator: `args[0]` is the right operand.
fn int_reflected(args: &[Value], op: fn(i64, i64) -> Option<i64>) -> Value {
    int_pair(args)
        .and_then(|(b, a)| op(a, b))
        .map_or(Value::NotImplemented, Value::Int)
}

fn int_compare(args: &[Value], op: fn(&i64, &i64) -> bool) -> Value {
    int_pair(args).map_or(Value::NotImplemented, |(a, b)| Value::Bool(op(&a, &b)))
}

/// Float operators accept int operands and a float receiver.
fn float_binary(args: &[Value], op: fn(f64, f64) -> f64) -> Value {
    match args.first() {
        Some(Value::Float(_)) => float_pair(args).map_or(Value::NotImplemented, |(a, b)| {
            Value::Float(op(a, b))
        }),
        _ => Value::NotImplemented,
    }
}

fn float_reflected(args: &[Value], op: fn(f64, f64) -> f64) -> Value {
    match args.first() {
        Some(Value::Float(_)) => float_pair(args).map_or(Value::NotImplemented, |(b, a)| {
            Value::Float(op(a, b))
        }),
        _ => Value::NotImplemented,
    }
}

fn float_compare(args: &[Value], op: fn(&f64, &f64) -> bool) -> Value {
    match args.first() {
        Some(Value::Float(_)) => {
            float_pair(args).map_or(Value::NotImplemented, |(a, b)| Value::Bool(op(&a, &b)))
        }
        _ => Value::NotImplemented,
    }
}

fn str_pair(args: &[Value]) -> Option<(&str, &str)> {
    match args {
        [Value::Str(a), Value::Str(b), ..] => Some((a.as_str(), b.as_str())),
        _ => None,
    }
}

fn str_compare(args: &[Value], op: fn(&&str, &&str) -> bool) -> Value {
    str_pair(args).map_or(Value::NotImplemented, |(a, b)| Value::Bool(op(&a, &b)))
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn identity_hash(value: &Value) -> i64 {
    let mut hasher = FxHasher::default();
    match value {
        Value::None => 0u8.hash(&mut hasher),
        Value::NotImplemented => 1u8.hash(&mut hasher),
        Value::Bool(b) => return *b as i64,
        Value::Int(i) => return *i,
        Value::Float(f) => f.to_bits().hash(&mut hasher),
        Value::Str(s) => s.hash(&mut hasher),
        Value::Function(f) => f.id().hash(&mut hasher),
        Value::Builtin(f) => (std::sync::Arc::as_ptr(f) as usize).hash(&mut hasher),
    }
    hasher.finish() as i64
}

// =============================================================================
// object
// =============================================================================

fn object_new(_: ContextId, args: &[Value]) -> Value {
    args.first().cloned().unwrap_or(Value::None)
}

fn object_init(_: ContextId, _: &[Value]) -> Value {
    Value::None
}

fn object_eq(_: ContextId, args: &[Value]) -> Value {
    match args {
        [a, b, ..] if a.is(b) => Value::Bool(true),
        _ => Value::NotImplemented,
    }
}

fn object_ne(_: ContextId, args: &[Value]) -> Value {
    match args {
        [a, b, ..] if a.is(b) => Value::Bool(false),
        _ => Value::NotImplemented,
    }
}

fn object_unordered(_: ContextId, _: &[Value]) -> Value {
    Value::NotImplemented
}

fn object_hash(_: ContextId, args: &[Value]) -> Value {
    Value::Int(args.first().map_or(0, identity_hash))
}

fn object_repr(_: ContextId, args: &[Value]) -> Value {
    let type_name = args.first().map_or("object", Value::type_name);
    Value::str(&format!("<{} object>", type_name))
}

fn object_format(ctx: ContextId, args: &[Value]) -> Value {
    object_repr(ctx, args)
}

static OBJECT_NEW: BuiltinImpl = BuiltinImpl::pure("__new__", "object", object_new);
static OBJECT_INIT: BuiltinImpl = BuiltinImpl::pure("__init__", "object", object_init);
static OBJECT_EQ: BuiltinImpl = BuiltinImpl::pure("__eq__", "object", object_eq);
static OBJECT_NE: BuiltinImpl = BuiltinImpl::pure("__ne__", "object", object_ne);
static OBJECT_LT: BuiltinImpl = BuiltinImpl::pure("__lt__", "object", object_unordered);
static OBJECT_LE: BuiltinImpl = BuiltinImpl::pure("__le__", "object", object_unordered);
static OBJECT_GT: BuiltinImpl = BuiltinImpl::pure("__gt__", "object", object_unordered);
static OBJECT_GE: BuiltinImpl = BuiltinImpl::pure("__ge__", "object", object_unordered);
static OBJECT_HASH: BuiltinImpl = BuiltinImpl::pure("__hash__", "object", object_hash);
static OBJECT_REPR: BuiltinImpl = BuiltinImpl::pure("__repr__", "object", object_repr);
static OBJECT_STR: BuiltinImpl = BuiltinImpl::pure("__str__", "object", object_repr);
static OBJECT_FORMAT: BuiltinImpl = BuiltinImpl::pure("__format__", "object", object_format);

static OBJECT_SLOTS: &[(SpecialSlot, &BuiltinImpl)] = &[
    (SpecialSlot::New, &OBJECT_NEW),
    (SpecialSlot::Init, &OBJECT_INIT),
    (SpecialSlot::Eq, &OBJECT_EQ),
    (SpecialSlot::Ne, &OBJECT_NE),
    (SpecialSlot::Lt, &OBJECT_LT),
    (SpecialSlot::Le, &OBJECT_LE),
    (SpecialSlot::Gt, &OBJECT_GT),
    (SpecialSlot::Ge, &OBJECT_GE),
    (SpecialSlot::Hash, &OBJECT_HASH),
    (SpecialSlot::Repr, &OBJECT_REPR),
    (SpecialSlot::Str, &OBJECT_STR),
    (SpecialSlot::Format, &OBJECT_FORMAT),
];

// =============================================================================
// NoneType
// =============================================================================

fn none_bool(_: ContextId, _: &[Value]) -> Value {
    Value::Bool(false)
}

fn none_repr(_: ContextId, _: &[Value]) -> Value {
    Value::str("None")
}

static NONE_BOOL: BuiltinImpl = BuiltinImpl::pure("__bool__", "NoneType", none_bool);
static NONE_REPR: BuiltinImpl = BuiltinImpl::pure("__repr__", "NoneType", none_repr);

static NONE_SLOTS: &[(SpecialSlot, &BuiltinImpl)] = &[
    (SpecialSlot::Bool, &NONE_BOOL),
    (SpecialSlot::Repr, &NONE_REPR),
];

// =============================================================================
// int
// =============================================================================

fn int_add(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, i64::checked_add)
}
fn int_radd(_: ContextId, args: &[Value]) -> Value {
    int_reflected(args, i64::checked_add)
}
fn int_sub(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, i64::checked_sub)
}
fn int_rsub(_: ContextId, args: &[Value]) -> Value {
    int_reflected(args, i64::checked_sub)
}
fn int_mul(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, i64::checked_mul)
}
fn int_rmul(_: ContextId, args: &[Value]) -> Value {
    int_reflected(args, i64::checked_mul)
}
fn int_floordiv(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, floor_div)
}
fn int_rfloordiv(_: ContextId, args: &[Value]) -> Value {
    int_reflected(args, floor_div)
}
fn int_mod(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, floor_mod)
}
fn int_rmod(_: ContextId, args: &[Value]) -> Value {
    int_reflected(args, floor_mod)
}
fn int_and(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, |a, b| Some(a & b))
}
fn int_or(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, |a, b| Some(a | b))
}
fn int_xor(_: ContextId, args: &[Value]) -> Value {
    int_binary(args, |a, b| Some(a ^ b))
}

fn int_eq(_: ContextId, args: &[Value]) -> Value {
    int_compare(args, i64::eq)
}
fn int_ne(_: ContextId, args: &[Value]) -> Value {
    int_compare(args, i64::ne)
}
fn int_lt(_: ContextId, args: &[Value]) -> Value {
    int_compare(args, i64::lt)
}
fn int_le(_: ContextId, args: &[Value]) -> Value {
    int_compare(args, i64::le)
}
fn int_gt(_: ContextId, args: &[Value]) -> Value {
    int_compare(args, i64::gt)
}
fn int_ge(_: ContextId, args: &[Value]) -> Value {
    int_compare(args, i64::ge)
}

fn int_bool(_: ContextId, args: &[Value]) -> Value {
    args.first()
        .and_then(Value::as_int)
        .map_or(Value::NotImplemented, |i| Value::Bool(i != 0))
}

fn int_index(_: ContextId, args: &[Value]) -> Value {
    args.first()
        .and_then(Value::as_int)
        .map_or(Value::NotImplemented, Value::Int)
}

fn int_float(_: ContextId, args: &[Value]) -> Value {
    args.first()
        .and_then(Value::as_int)
        .map_or(Value::NotImplemented, |i| Value::Float(i as f64))
}

fn int_repr(_: ContextId, args: &[Value]) -> Value {
    args.first()
        .and_then(Value::as_int)
        .map_or(Value::NotImplemented, |i| Value::str(&i.to_string()))
}

static INT_ADD: BuiltinImpl = BuiltinImpl::pure("__add__", "int", int_add);
static INT_RADD: BuiltinImpl = BuiltinImpl::pure("__radd__", "int", int_radd);
static INT_SUB: BuiltinImpl = BuiltinImpl::pure("__sub__", "int", int_sub);
static INT_RSUB: BuiltinImpl = BuiltinImpl::pure("__rsub__", "int", int_rsub);
static INT_MUL: BuiltinImpl = BuiltinImpl::pure("__mul__", "int", int_mul);
static INT_RMUL: BuiltinImpl = BuiltinImpl::pure("__rmul__", "int", int_rmul);
static INT_FLOORDIV: BuiltinImpl = BuiltinImpl::pure("__floordiv__", "int", int_floordiv);
static INT_RFLOORDIV: BuiltinImpl = BuiltinImpl::pure("__rfloordiv__", "int", int_rfloordiv);
static INT_MOD: BuiltinImpl = BuiltinImpl::pure("__mod__", "int", int_mod);
static INT_RMOD: BuiltinImpl = BuiltinImpl::pure("__rmod__", "int", int_rmod);
static INT_AND: BuiltinImpl = BuiltinImpl::pure("__and__", "int", int_and);
static INT_RAND: BuiltinImpl = BuiltinImpl::pure("__rand__", "int", int_and);
static INT_OR: BuiltinImpl = BuiltinImpl::pure("__or__", "int", int_or);
static INT_ROR: BuiltinImpl = BuiltinImpl::pure("__ror__", "int", int_or);
static INT_XOR: BuiltinImpl = BuiltinImpl::pure("__xor__", "int", int_xor);
static INT_RXOR: BuiltinImpl = BuiltinImpl::pure("__rxor__", "int", int_xor);
static INT_EQ: BuiltinImpl = BuiltinImpl::pure("__eq__", "int", int_eq);
static INT_NE: BuiltinImpl = BuiltinImpl::pure("__ne__", "int", int_ne);
static INT_LT: BuiltinImpl = BuiltinImpl::pure("__lt__", "int", int_lt);
static INT_LE: BuiltinImpl = BuiltinImpl::pure("__le__", "int", int_le);
static INT_GT: BuiltinImpl = BuiltinImpl::pure("__gt__", "int", int_gt);
static INT_GE: BuiltinImpl = BuiltinImpl::pure("__ge__", "int", int_ge);
static INT_HASH: BuiltinImpl = BuiltinImpl::pure("__hash__", "int", int_index);
static INT_BOOL: BuiltinImpl = BuiltinImpl::pure("__bool__", "int", int_bool);
static INT_INDEX: BuiltinImpl = BuiltinImpl::pure("__index__", "int", int_index);
static INT_INT: BuiltinImpl = BuiltinImpl::pure("__int__", "int", int_index);
static INT_FLOAT: BuiltinImpl = BuiltinImpl::pure("__float__", "int", int_float);
static INT_REPR: BuiltinImpl = BuiltinImpl::pure("__repr__", "int", int_repr);

static INT_SLOTS: &[(SpecialSlot, &BuiltinImpl)] = &[
    (SpecialSlot::Add, &INT_ADD),
    (SpecialSlot::RAdd, &INT_RADD),
    (SpecialSlot::Sub, &INT_SUB),
    (SpecialSlot::RSub, &INT_RSUB),
    (SpecialSlot::Mul, &INT_MUL),
    (SpecialSlot::RMul, &INT_RMUL),
    (SpecialSlot::FloorDiv, &INT_FLOORDIV),
    (SpecialSlot::RFloorDiv, &INT_RFLOORDIV),
    (SpecialSlot::Mod, &INT_MOD),
    (SpecialSlot::RMod, &INT_RMOD),
    (SpecialSlot::And, &INT_AND),
    (SpecialSlot::RAnd, &INT_RAND),
    (SpecialSlot::Or, &INT_OR),
    (SpecialSlot::ROr, &INT_ROR),
    (SpecialSlot::Xor, &INT_XOR),
    (SpecialSlot::RXor, &INT_RXOR),
    (SpecialSlot::Eq, &INT_EQ),
    (SpecialSlot::Ne, &INT_NE),
    (SpecialSlot::Lt, &INT_LT),
    (SpecialSlot::Le, &INT_LE),
    (SpecialSlot::Gt, &INT_GT),
    (SpecialSlot::Ge, &INT_GE),
    (SpecialSlot::Hash, &INT_HASH),
    (SpecialSlot::Bool, &INT_BOOL),
    (SpecialSlot::Index, &INT_INDEX),
    (SpecialSlot::Int, &INT_INT),
    (SpecialSlot::Float, &INT_FLOAT),
    (SpecialSlot::Repr, &INT_REPR),
];

// =============================================================================
// bool
// =============================================================================

fn bool_and(ctx: ContextId, args: &[Value]) -> Value {
    match bool_pair(args) {
        Some((a, b)) => Value::Bool(a & b),
        None => int_and(ctx, args),
    }
}

fn bool_or(ctx: ContextId, args: &[Value]) -> Value {
    match bool_pair(args) {
        Some((a, b)) => Value::Bool(a | b),
        None => int_or(ctx, args),
    }
}

fn bool_xor(ctx: ContextId, args: &[Value]) -> Value {
    match bool_pair(args) {
        Some((a, b)) => Value::Bool(a ^ b),
        None => int_xor(ctx, args),
    }
}

fn bool_repr(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Bool(true)) => Value::str("True"),
        Some(Value::Bool(false)) => Value::str("False"),
        _ => Value::NotImplemented,
    }
}

static BOOL_AND: BuiltinImpl = BuiltinImpl::pure("__and__", "bool", bool_and);
static BOOL_RAND: BuiltinImpl = BuiltinImpl::pure("__rand__", "bool", bool_and);
static BOOL_OR: BuiltinImpl = BuiltinImpl::pure("__or__", "bool", bool_or);
static BOOL_ROR: BuiltinImpl = BuiltinImpl::pure("__ror__", "bool", bool_or);
static BOOL_XOR: BuiltinImpl = BuiltinImpl::pure("__xor__", "bool", bool_xor);
static BOOL_RXOR: BuiltinImpl = BuiltinImpl::pure("__rxor__", "bool", bool_xor);
static BOOL_REPR: BuiltinImpl = BuiltinImpl::pure("__repr__", "bool", bool_repr);

static BOOL_SLOTS: &[(SpecialSlot, &BuiltinImpl)] = &[
    (SpecialSlot::And, &BOOL_AND),
    (SpecialSlot::RAnd, &BOOL_RAND),
    (SpecialSlot::Or, &BOOL_OR),
    (SpecialSlot::ROr, &BOOL_ROR),
    (SpecialSlot::Xor, &BOOL_XOR),
    (SpecialSlot::RXor, &BOOL_RXOR),
    (SpecialSlot::Repr, &BOOL_REPR),
];

// =============================================================================
// float
// =============================================================================

fn float_add(_: ContextId, args: &[Value]) -> Value {
    float_binary(args, |a, b| a + b)
}
fn float_radd(_: ContextId, args: &[Value]) -> Value {
    float_reflected(args, |a, b| a + b)
}
fn float_sub(_: ContextId, args: &[Value]) -> Value {
    float_binary(args, |a, b| a - b)
}
fn float_rsub(_: ContextId, args: &[Value]) -> Value {
    float_reflected(args, |a, b| a - b)
}
fn float_mul(_: ContextId, args: &[Value]) -> Value {
    float_binary(args, |a, b| a * b)
}
fn float_rmul(_: ContextId, args: &[Value]) -> Value {
    float_reflected(args, |a, b| a * b)
}
fn float_truediv(_: ContextId, args: &[Value]) -> Value {
    float_binary(args, |a, b| a / b)
}
fn float_rtruediv(_: ContextId, args: &[Value]) -> Value {
    float_reflected(args, |a, b| a / b)
}

fn float_eq(_: ContextId, args: &[Value]) -> Value {
    float_compare(args, f64::eq)
}
fn float_ne(_: ContextId, args: &[Value]) -> Value {
    float_compare(args, f64::ne)
}
fn float_lt(_: ContextId, args: &[Value]) -> Value {
    float_compare(args, f64::lt)
}
fn float_le(_: ContextId, args: &[Value]) -> Value {
    float_compare(args, f64::le)
}
fn float_gt(_: ContextId, args: &[Value]) -> Value {
    float_compare(args, f64::gt)
}
fn float_ge(_: ContextId, args: &[Value]) -> Value {
    float_compare(args, f64::ge)
}

fn float_hash(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        // Integral floats hash like the equal int.
        Some(Value::Float(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Value::Int(*f as i64)
        }
        Some(value @ Value::Float(_)) => Value::Int(identity_hash(value)),
        _ => Value::NotImplemented,
    }
}

fn float_bool(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Float(f)) => Value::Bool(*f != 0.0),
        _ => Value::NotImplemented,
    }
}

fn float_int(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Float(f)) if f.is_finite() => Value::Int(f.trunc() as i64),
        _ => Value::NotImplemented,
    }
}

fn float_float(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(value @ Value::Float(_)) => value.clone(),
        _ => Value::NotImplemented,
    }
}

fn float_repr(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Float(f)) => Value::str(&format!("{:?}", f)),
        _ => Value::NotImplemented,
    }
}

static FLOAT_ADD: BuiltinImpl = BuiltinImpl::pure("__add__", "float", float_add);
static FLOAT_RADD: BuiltinImpl = BuiltinImpl::pure("__radd__", "float", float_radd);
static FLOAT_SUB: BuiltinImpl = BuiltinImpl::pure("__sub__", "float", float_sub);
static FLOAT_RSUB: BuiltinImpl = BuiltinImpl::pure("__rsub__", "float", float_rsub);
static FLOAT_MUL: BuiltinImpl = BuiltinImpl::pure("__mul__", "float", float_mul);
static FLOAT_RMUL: BuiltinImpl = BuiltinImpl::pure("__rmul__", "float", float_rmul);
static FLOAT_TRUEDIV: BuiltinImpl = BuiltinImpl::pure("__truediv__", "float", float_truediv);
static FLOAT_RTRUEDIV: BuiltinImpl = BuiltinImpl::pure("__rtruediv__", "float", float_rtruediv);
static FLOAT_EQ: BuiltinImpl = BuiltinImpl::pure("__eq__", "float", float_eq);
static FLOAT_NE: BuiltinImpl = BuiltinImpl::pure("__ne__", "float", float_ne);
static FLOAT_LT: BuiltinImpl = BuiltinImpl::pure("__lt__", "float", float_lt);
static FLOAT_LE: BuiltinImpl = BuiltinImpl::pure("__le__", "float", float_le);
static FLOAT_GT: BuiltinImpl = BuiltinImpl::pure("__gt__", "float", float_gt);
static FLOAT_GE: BuiltinImpl = BuiltinImpl::pure("__ge__", "float", float_ge);
static FLOAT_HASH: BuiltinImpl = BuiltinImpl::pure("__hash__", "float", float_hash);
static FLOAT_BOOL: BuiltinImpl = BuiltinImpl::pure("__bool__", "float", float_bool);
static FLOAT_INT: BuiltinImpl = BuiltinImpl::pure("__int__", "float", float_int);
static FLOAT_FLOAT: BuiltinImpl = BuiltinImpl::pure("__float__", "float", float_float);
static FLOAT_REPR: BuiltinImpl = BuiltinImpl::pure("__repr__", "float", float_repr);

static FLOAT_SLOTS: &[(SpecialSlot, &BuiltinImpl)] = &[
    (SpecialSlot::Add, &FLOAT_ADD),
    (SpecialSlot::RAdd, &FLOAT_RADD),
    (SpecialSlot::Sub, &FLOAT_SUB),
    (SpecialSlot::RSub, &FLOAT_RSUB),
    (SpecialSlot::Mul, &FLOAT_MUL),
    (SpecialSlot::RMul, &FLOAT_RMUL),
    (SpecialSlot::TrueDiv, &FLOAT_TRUEDIV),
    (SpecialSlot::RTrueDiv, &FLOAT_RTRUEDIV),
    (SpecialSlot::Eq, &FLOAT_EQ),
    (SpecialSlot::Ne, &FLOAT_NE),
    (SpecialSlot::Lt, &FLOAT_LT),
    (SpecialSlot::Le, &FLOAT_LE),
    (SpecialSlot::Gt, &FLOAT_GT),
    (SpecialSlot::Ge, &FLOAT_GE),
    (SpecialSlot::Hash, &FLOAT_HASH),
    (SpecialSlot::Bool, &FLOAT_BOOL),
    (SpecialSlot::Int, &FLOAT_INT),
    (SpecialSlot::Float, &FLOAT_FLOAT),
    (SpecialSlot::Repr, &FLOAT_REPR),
];

// =============================================================================
// str
// =============================================================================

fn str_add(_: ContextId, args: &[Value]) -> Value {
    str_pair(args).map_or(Value::NotImplemented, |(a, b)| {
        let mut joined = String::with_capacity(a.len() + b.len());
        joined.push_str(a);
        joined.push_str(b);
        Value::str(&joined)
    })
}

fn str_mul(_: ContextId, args: &[Value]) -> Value {
    match args {
        [Value::Str(s), count, ..] => match count.as_int() {
            Some(n) => Value::str(&s.repeat(n.max(0) as usize)),
            None => Value::NotImplemented,
        },
        _ => Value::NotImplemented,
    }
}

fn str_eq(_: ContextId, args: &[Value]) -> Value {
    str_compare(args, |a, b| a == b)
}
fn str_ne(_: ContextId, args: &[Value]) -> Value {
    str_compare(args, |a, b| a != b)
}
fn str_lt(_: ContextId, args: &[Value]) -> Value {
    str_compare(args, |a, b| a < b)
}
fn str_le(_: ContextId, args: &[Value]) -> Value {
    str_compare(args, |a, b| a <= b)
}
fn str_gt(_: ContextId, args: &[Value]) -> Value {
    str_compare(args, |a, b| a > b)
}
fn str_ge(_: ContextId, args: &[Value]) -> Value {
    str_compare(args, |a, b| a >= b)
}

fn str_hash(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Str(s)) => {
            let mut hasher = FxHasher::default();
            s.as_str().hash(&mut hasher);
            Value::Int(hasher.finish() as i64)
        }
        _ => Value::NotImplemented,
    }
}

fn str_len(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Str(s)) => Value::Int(s.chars().count() as i64),
        _ => Value::NotImplemented,
    }
}

fn str_contains(_: ContextId, args: &[Value]) -> Value {
    str_pair(args).map_or(Value::NotImplemented, |(haystack, needle)| {
        Value::Bool(haystack.contains(needle))
    })
}

fn str_repr(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Str(s)) => Value::str(&format!("'{}'", s.escape_default())),
        _ => Value::NotImplemented,
    }
}

fn str_str(_: ContextId, args: &[Value]) -> Value {
    match args.first() {
        Some(value @ Value::Str(_)) => value.clone(),
        _ => Value::NotImplemented,
    }
}

static STR_ADD: BuiltinImpl = BuiltinImpl::pure("__add__", "str", str_add);
static STR_MUL: BuiltinImpl = BuiltinImpl::pure("__mul__", "str", str_mul);
static STR_RMUL: BuiltinImpl = BuiltinImpl::pure("__rmul__", "str", str_mul);
static STR_EQ: BuiltinImpl = BuiltinImpl::pure("__eq__", "str", str_eq);
static STR_NE: BuiltinImpl = BuiltinImpl::pure("__ne__", "str", str_ne);
static STR_LT: BuiltinImpl = BuiltinImpl::pure("__lt__", "str", str_lt);
static STR_LE: BuiltinImpl = BuiltinImpl::pure("__le__", "str", str_le);
static STR_GT: BuiltinImpl = BuiltinImpl::pure("__gt__", "str", str_gt);
static STR_GE: BuiltinImpl = BuiltinImpl::pure("__ge__", "str", str_ge);
static STR_HASH: BuiltinImpl = BuiltinImpl::pure("__hash__", "str", str_hash);
static STR_LEN: BuiltinImpl = BuiltinImpl::pure("__len__", "str", str_len);
static STR_CONTAINS: BuiltinImpl = BuiltinImpl::pure("__contains__", "str", str_contains);
static STR_REPR: BuiltinImpl = BuiltinImpl::pure("__repr__", "str", str_repr);
static STR_STR: BuiltinImpl = BuiltinImpl::pure("__str__", "str", str_str);

static STR_SLOTS: &[(SpecialSlot, &BuiltinImpl)] = &[
    (SpecialSlot::Add, &STR_ADD),
    (SpecialSlot::Mul, &STR_MUL),
    (SpecialSlot::RMul, &STR_RMUL),
    (SpecialSlot::Eq, &STR_EQ),
    (SpecialSlot::Ne, &STR_NE),
    (SpecialSlot::Lt, &STR_LT),
    (SpecialSlot::Le, &STR_LE),
    (SpecialSlot::Gt, &STR_GT),
    (SpecialSlot::Ge, &STR_GE),
    (SpecialSlot::Hash, &STR_HASH),
    (SpecialSlot::Len, &STR_LEN),
    (SpecialSlot::Contains, &STR_CONTAINS),
    (SpecialSlot::Repr, &STR_REPR),
    (SpecialSlot::Str, &STR_STR),
];

// =============================================================================
// module
// =============================================================================

/// Module reprs name the owning context.
fn module_repr(ctx: ContextId, args: &[Value]) -> Value {
    let name = args
        .first()
        .and_then(Value::as_str)
        .map_or("?", |s| s.as_str());
    Value::str(&format!("<module '{}' in {}>", name, ctx))
}

static MODULE_REPR: BuiltinImpl = BuiltinImpl::contextual("__repr__", "module", module_repr);

static MODULE_POST_INIT_SLOTS: &[(SpecialSlot, &BuiltinImpl)] =
    &[(SpecialSlot::Repr, &MODULE_REPR)];
