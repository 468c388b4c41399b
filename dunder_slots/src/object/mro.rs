//! Class identity and C3 method resolution order.

use smallvec::SmallVec;
use std::fmt;

// =============================================================================
// Class Id
// =============================================================================

/// Unique identifier of a class within one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    /// The universal root class.
    pub const OBJECT: ClassId = ClassId(0);

    /// First id handed out to classes created at run time.
    pub const FIRST_USER: u32 = 64;

    /// Raw id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Linearized ancestors, most-derived first.
pub type Mro = SmallVec<[ClassId; 8]>;

// =============================================================================
// Errors
// =============================================================================

/// Failure to linearize a class hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MroError {
    /// No consistent C3 order exists for these bases.
    Inconsistent { class: ClassId, bases: Vec<ClassId> },
    /// The same class is listed twice as a direct base.
    DuplicateBase { class: ClassId, base: ClassId },
    /// A base has no known MRO.
    UnknownBase { class: ClassId, base: ClassId },
    /// The class being rebased is not registered.
    UnknownClass(ClassId),
    /// The class would become its own ancestor.
    Cycle { class: ClassId, base: ClassId },
}

impl fmt::Display for MroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MroError::Inconsistent { class, bases } => write!(
                f,
                "cannot create a consistent method resolution order for {} with bases {:?}",
                class, bases
            ),
            MroError::DuplicateBase { class, base } => {
                write!(f, "duplicate base class {} for {}", base, class)
            }
            MroError::UnknownBase { class, base } => {
                write!(f, "base class {} of {} is not registered", base, class)
            }
            MroError::UnknownClass(class) => write!(f, "class {} is not registered", class),
            MroError::Cycle { class, base } => {
                write!(f, "a class cannot inherit from its own subclass ({} -> {})", class, base)
            }
        }
    }
}

impl std::error::Error for MroError {}

// =============================================================================
// C3 Linearization
// =============================================================================

/// Compute the C3 linearization of `class` given its direct bases.
///
/// `mro_lookup` returns the already-computed MRO of a base. A class with no
/// bases implicitly derives from [`ClassId::OBJECT`].
pub fn compute_c3_mro<F>(class: ClassId, bases: &[ClassId], mro_lookup: F) -> Result<Mro, MroError>
where
    F: Fn(ClassId) -> Option<Mro>,
{
    let mut mro = Mro::new();
    mro.push(class);

    if class == ClassId::OBJECT {
        return Ok(mro);
    }
    if bases.is_empty() {
        mro.push(ClassId::OBJECT);
        return Ok(mro);
    }

    for (i, &base) in bases.iter().enumerate() {
        if base == class {
            return Err(MroError::Cycle { class, base });
        }
        if bases[..i].contains(&base) {
            return Err(MroError::DuplicateBase { class, base });
        }
    }

    let mut sequences: Vec<Vec<ClassId>> = Vec::with_capacity(bases.len() + 1);
    for &base in bases {
        let base_mro = mro_lookup(base).ok_or(MroError::UnknownBase { class, base })?;
        if base_mro.contains(&class) {
            return Err(MroError::Cycle { class, base });
        }
        sequences.push(base_mro.into_vec());
    }
    sequences.push(bases.to_vec());

    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Ok(mro);
        }

        // A good head appears in no other sequence's tail.
        let head = sequences.iter().map(|seq| seq[0]).find(|&candidate| {
            sequences
                .iter()
                .all(|seq| !seq[1..].contains(&candidate))
        });

        let Some(head) = head else {
            return Err(MroError::Inconsistent {
                class,
                bases: bases.to_vec(),
            });
        };

        mro.push(head);
        for seq in sequences.iter_mut() {
            if seq[0] == head {
                seq.remove(0);
            }
        }
    }
}
