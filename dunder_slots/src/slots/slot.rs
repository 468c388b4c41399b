//! Special-method slot registry.
//!
//! Every recognised dunder name gets a dense ordinal so a class can cache
//! its MRO lookup result in a fixed-size array. Name resolution is on the
//! hottest attribute-write path, so it is allocation-free: a cheap structural
//! filter rejects ordinary names, then a hand-built perfect hash over the two
//! characters following the leading `__` narrows the candidates to a handful
//! of exact comparisons.
//!
//! # Reverse Operators
//!
//! Binary operators with a reflected variant (`__add__` / `__radd__`) are
//! linked both ways when the registry is constructed. The registry verifies
//! its own definition at that point; an inconsistency is a bug in this file
//! and aborts immediately.

use dunder_core::{InternedString, intern};
use std::fmt;
use std::sync::OnceLock;

/// Number of recognised special-method slots.
pub const SLOT_COUNT: usize = 72;

// =============================================================================
// Special Slot
// =============================================================================

/// A recognised special method, identified by its dense ordinal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecialSlot {
    GetAttribute,
    GetAttr,
    SetAttr,
    DelAttr,

    Dict,

    Get,
    Set,
    Delete,

    Iter,
    Next,

    New,
    Init,
    SetName,
    InstanceCheck,
    SubclassCheck,
    Call,

    GetItem,
    SetItem,
    DelItem,

    Exit,
    Enter,

    Len,
    LengthHint,
    Contains,
    Bool,
    Hash,
    Index,
    Float,
    Int,
    Str,
    Repr,
    Format,
    Missing,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    RAnd,
    Or,
    ROr,
    Xor,
    RXor,
    Add,
    RAdd,
    Sub,
    RSub,
    Mul,
    RMul,
    MatMul,
    RMatMul,
    Mod,
    RMod,
    DivMod,
    RDivMod,
    Pow,
    RPow,
    TrueDiv,
    RTrueDiv,
    FloorDiv,
    RFloorDiv,
    LShift,
    RLShift,
    RShift,
    RRShift,
    Round,

    IAdd,
    IMul,

    Reversed,
    Bytes,
}

use SpecialSlot::*;

impl SpecialSlot {
    /// All slots in ordinal order.
    pub const ALL: [SpecialSlot; SLOT_COUNT] = [
        GetAttribute, GetAttr, SetAttr, DelAttr, Dict, Get, Set, Delete, Iter, Next, New, Init,
        SetName, InstanceCheck, SubclassCheck, Call, GetItem, SetItem, DelItem, Exit, Enter, Len,
        LengthHint, Contains, Bool, Hash, Index, Float, Int, Str, Repr, Format, Missing, Eq, Ne,
        Lt, Le, Gt, Ge, And, RAnd, Or, ROr, Xor, RXor, Add, RAdd, Sub, RSub, Mul, RMul, MatMul,
        RMatMul, Mod, RMod, DivMod, RDivMod, Pow, RPow, TrueDiv, RTrueDiv, FloorDiv, RFloorDiv,
        LShift, RLShift, RShift, RRShift, Round, IAdd, IMul, Reversed, Bytes,
    ];

    /// Dense index into slot tables.
    #[inline]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Slot for an ordinal, if in range.
    #[inline]
    pub fn from_ordinal(ordinal: usize) -> Option<SpecialSlot> {
        Self::ALL.get(ordinal).copied()
    }

    /// Canonical dunder name.
    #[inline]
    pub const fn name(self) -> &'static str {
        SLOT_NAMES[self as usize]
    }

    /// Canonical name as an interned string, for namespace probes.
    #[inline]
    pub fn interned_name(self) -> &'static InternedString {
        &slot_registry().names[self.ordinal()]
    }

    /// The reflected (or forward) counterpart of a binary operator slot.
    #[inline]
    pub fn reverse(self) -> Option<SpecialSlot> {
        slot_registry().reverse[self.ordinal()]
    }

    /// Whether the shared tier may store a `BuiltinDescriptor` here.
    ///
    /// Values of these slots are handed to call paths that need the real
    /// per-context function object.
    #[inline]
    pub const fn allows_builtin_descriptors(self) -> bool {
        !matches!(self, New | Init | SetName | Call)
    }
}

impl fmt::Display for SpecialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const SLOT_NAMES: [&str; SLOT_COUNT] = [
    "__getattribute__",
    "__getattr__",
    "__setattr__",
    "__delattr__",
    "__dict__",
    "__get__",
    "__set__",
    "__delete__",
    "__iter__",
    "__next__",
    "__new__",
    "__init__",
    "__set_name__",
    "__instancecheck__",
    "__subclasscheck__",
    "__call__",
    "__getitem__",
    "__setitem__",
    "__delitem__",
    "__exit__",
    "__enter__",
    "__len__",
    "__length_hint__",
    "__contains__",
    "__bool__",
    "__hash__",
    "__index__",
    "__float__",
    "__int__",
    "__str__",
    "__repr__",
    "__format__",
    "__missing__",
    "__eq__",
    "__ne__",
    "__lt__",
    "__le__",
    "__gt__",
    "__ge__",
    "__and__",
    "__rand__",
    "__or__",
    "__ror__",
    "__xor__",
    "__rxor__",
    "__add__",
    "__radd__",
    "__sub__",
    "__rsub__",
    "__mul__",
    "__rmul__",
    "__matmul__",
    "__rmatmul__",
    "__mod__",
    "__rmod__",
    "__divmod__",
    "__rdivmod__",
    "__pow__",
    "__rpow__",
    "__truediv__",
    "__rtruediv__",
    "__floordiv__",
    "__rfloordiv__",
    "__lshift__",
    "__rlshift__",
    "__rshift__",
    "__rrshift__",
    "__round__",
    "__iadd__",
    "__imul__",
    "__reversed__",
    "__bytes__",
];

/// Forward operator and its reflected variant.
const OPERATOR_PAIRS: [(SpecialSlot, SpecialSlot); 14] = [
    (And, RAnd),
    (Or, ROr),
    (Xor, RXor),
    (Add, RAdd),
    (Sub, RSub),
    (Mul, RMul),
    (MatMul, RMatMul),
    (Mod, RMod),
    (DivMod, RDivMod),
    (Pow, RPow),
    (TrueDiv, RTrueDiv),
    (FloorDiv, RFloorDiv),
    (LShift, RLShift),
    (RShift, RRShift),
];

// =============================================================================
// Name Resolution
// =============================================================================

/// Structural filter: at least six characters, wrapped in double underscores.
#[inline]
pub fn can_be_slot(name: &str) -> bool {
    let b = name.as_bytes();
    let len = b.len();
    len > 5 && b[0] == b'_' && b[1] == b'_' && b[len - 2] == b'_' && b[len - 1] == b'_'
}

/// Resolve a name to its slot. Never allocates.
pub fn resolve_slot(name: &str) -> Option<SpecialSlot> {
    if !can_be_slot(name) {
        return None;
    }
    let b = name.as_bytes();
    let candidates: &'static [SpecialSlot] = match (b[2], b[3]) {
        (b'g', b'e') => &[GetAttribute, GetAttr, Get, GetItem, Ge],
        (b's', b'e') => &[SetAttr, Set, SetName, SetItem],
        (b'd', b'e') => &[DelAttr, Delete, DelItem],
        (b'd', b'i') => &[Dict, DivMod],
        (b'i', b't') => &[Iter],
        (b'n', b'e') => &[Next, New, Ne],
        (b'i', b'n') => &[Init, InstanceCheck, Index, Int],
        (b's', b'u') => &[SubclassCheck, Sub],
        (b'c', b'a') => &[Call],
        (b'e', b'x') => &[Exit],
        (b'e', b'n') => &[Enter],
        (b'l', b'e') => &[Len, LengthHint, Le],
        (b'c', b'o') => &[Contains],
        (b'b', b'o') => &[Bool],
        (b'h', b'a') => &[Hash],
        (b'f', b'l') => &[Float, FloorDiv],
        (b's', b't') => &[Str],
        (b'r', b'e') => &[Repr, Reversed],
        (b'f', b'o') => &[Format],
        (b'm', b'i') => &[Missing],
        (b'e', b'q') => &[Eq],
        (b'l', b't') => &[Lt],
        (b'g', b't') => &[Gt],
        (b'a', b'n') => &[And],
        (b'r', b'a') => &[RAnd, RAdd],
        (b'o', b'r') => &[Or],
        (b'r', b'o') => &[ROr, Round],
        (b'x', b'o') => &[Xor],
        (b'r', b'x') => &[RXor],
        (b'a', b'd') => &[Add],
        (b'r', b's') => &[RSub, RShift],
        (b'm', b'u') => &[Mul],
        (b'r', b'm') => &[RMul, RMatMul, RMod],
        (b'm', b'a') => &[MatMul],
        (b'm', b'o') => &[Mod],
        (b'r', b'd') => &[RDivMod],
        (b'p', b'o') => &[Pow],
        (b'r', b'p') => &[RPow],
        (b't', b'r') => &[TrueDiv],
        (b'r', b't') => &[RTrueDiv],
        (b'r', b'f') => &[RFloorDiv],
        (b'l', b's') => &[LShift],
        (b'r', b'l') => &[RLShift],
        (b'r', b'r') => &[RRShift],
        (b'i', b'a') => &[IAdd],
        (b'i', b'm') => &[IMul],
        (b'b', b'y') => &[Bytes],
        _ => return None,
    };
    candidates.iter().copied().find(|slot| slot.name() == name)
}

// =============================================================================
// Registry
// =============================================================================

/// Derived, process-wide slot metadata: reverse links and interned names.
pub struct SlotRegistry {
    reverse: [Option<SpecialSlot>; SLOT_COUNT],
    names: Box<[InternedString]>,
}

/// A defect in the registry definition found by the startup self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryDefect {
    /// `resolve_slot(slot.name())` returned something else.
    Unresolvable(SpecialSlot),
    /// A name that is not a slot resolved to one.
    FalsePositive(&'static str),
    /// `a.reverse == b` but `b.reverse != a`.
    OneSidedReverse { slot: SpecialSlot, reverse: SpecialSlot },
    /// `__r<op>__` exists alongside `__<op>__` but they are not linked.
    MissingReverse { forward: SpecialSlot, reflected: SpecialSlot },
}

impl fmt::Display for RegistryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryDefect::Unresolvable(slot) => {
                write!(f, "slot {} does not resolve to itself", slot)
            }
            RegistryDefect::FalsePositive(name) => {
                write!(f, "'{}' resolved to a slot", name)
            }
            RegistryDefect::OneSidedReverse { slot, reverse } => {
                write!(f, "{} reverses to {} but not vice versa", slot, reverse)
            }
            RegistryDefect::MissingReverse { forward, reflected } => {
                write!(f, "{} and {} are not linked", forward, reflected)
            }
        }
    }
}

impl std::error::Error for RegistryDefect {}

impl SlotRegistry {
    /// Build registry metadata from a list of operator pairs, without checks.
    pub fn with_pairs(pairs: &[(SpecialSlot, SpecialSlot)]) -> Self {
        let mut reverse = [None; SLOT_COUNT];
        for &(forward, reflected) in pairs {
            reverse[forward.ordinal()] = Some(reflected);
            reverse[reflected.ordinal()] = Some(forward);
        }
        let names = SpecialSlot::ALL.iter().map(|slot| intern(slot.name())).collect();
        Self { reverse, names }
    }

    /// Reverse link recorded for `slot`.
    #[inline]
    pub fn reverse_of(&self, slot: SpecialSlot) -> Option<SpecialSlot> {
        self.reverse[slot.ordinal()]
    }

    /// Self-check of name resolution and reverse pairing.
    pub fn verify(&self) -> Result<(), RegistryDefect> {
        for slot in SpecialSlot::ALL {
            if resolve_slot(slot.name()) != Some(slot) {
                return Err(RegistryDefect::Unresolvable(slot));
            }
        }
        if resolve_slot("__bogus__").is_some() {
            return Err(RegistryDefect::FalsePositive("__bogus__"));
        }
        for slot in SpecialSlot::ALL {
            if let Some(reverse) = self.reverse_of(slot) {
                if self.reverse_of(reverse) != Some(slot) {
                    return Err(RegistryDefect::OneSidedReverse { slot, reverse });
                }
            }
            // `__r<op>__` must be linked to `__<op>__` whenever both exist.
            if let Some(op) = slot.name().strip_prefix("__r") {
                let mut forward_name = String::with_capacity(op.len() + 2);
                forward_name.push_str("__");
                forward_name.push_str(op);
                if let Some(forward) = resolve_slot(&forward_name) {
                    if self.reverse_of(forward) != Some(slot) {
                        return Err(RegistryDefect::MissingReverse {
                            forward,
                            reflected: slot,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn build() -> Self {
        let registry = Self::with_pairs(&OPERATOR_PAIRS);
        if let Err(defect) = registry.verify() {
            panic!("special slot registry is inconsistent: {}", defect);
        }
        registry
    }
}

static SLOT_REGISTRY: OnceLock<SlotRegistry> = OnceLock::new();

/// The process-wide slot registry, built and verified on first use.
#[inline]
pub fn slot_registry() -> &'static SlotRegistry {
    SLOT_REGISTRY.get_or_init(SlotRegistry::build)
}
