//! Slot table construction.
//!
//! # Construction Paths
//!
//! - **Degenerate**: the MRO is empty (a class caught mid-bootstrap), so
//!   every slot is absent.
//! - **Fast path**: exactly one direct base whose MRO is this class's MRO
//!   minus its head. The base's table already holds every inherited entry,
//!   so only the class's own members are overlaid. O(own members).
//! - **General path**: start from the root-most ancestor's table (normally
//!   `object`, which carries most slots) and overlay each ancestor's own
//!   members walking from the root towards the class, so the most-derived
//!   definition wins. O(|MRO| × own members).
//!
//! A build never reads the class's own previous table.

use crate::object::mro::ClassId;
use crate::object::registry::ClassHierarchy;
use crate::slots::table::SlotTable;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which construction path produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPath {
    Degenerate,
    FastPath,
    General,
}

impl fmt::Display for BuildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildPath::Degenerate => "degenerate",
            BuildPath::FastPath => "fast",
            BuildPath::General => "general",
        })
    }
}

/// Build the table of `id` from the current hierarchy.
pub fn build_table<H: ClassHierarchy + ?Sized>(hier: &H, id: ClassId) -> SlotTable {
    build_table_with(hier, id, true).0
}

/// Build the table of `id`, optionally forbidding the fast path.
pub fn build_table_with<H: ClassHierarchy + ?Sized>(
    hier: &H,
    id: ClassId,
    fast_path: bool,
) -> (SlotTable, BuildPath) {
    let mro = hier.linearize(id);
    let Some(&root) = mro.last() else {
        return (SlotTable::absent(), BuildPath::Degenerate);
    };

    if fast_path {
        if let Some(table) = try_fast_path(hier, id, &mro) {
            return (table, BuildPath::FastPath);
        }
    }

    let mut table = if root != id {
        hier.class(root)
            .and_then(|class| class.slot_cell().and_then(|cell| cell.load()))
            .map(|table| (*table).clone())
            .unwrap_or_default()
    } else {
        SlotTable::absent()
    };

    for &ancestor in mro.iter().rev() {
        let Some(class) = hier.class(ancestor) else {
            continue;
        };
        for (slot, value) in class.own_slot_members() {
            table.set(slot, Some(value));
        }
    }
    (table, BuildPath::General)
}

fn try_fast_path<H: ClassHierarchy + ?Sized>(
    hier: &H,
    id: ClassId,
    mro: &[ClassId],
) -> Option<SlotTable> {
    let class = hier.class(id)?;
    let bases = class.bases();
    let [base] = bases.as_slice() else {
        return None;
    };
    if mro.get(1) != Some(base) {
        return None;
    }
    let base_table = hier.class(*base)?.slot_cell()?.load()?;
    if hier.linearize(*base).as_slice() != &mro[1..] {
        return None;
    }

    let mut table = (*base_table).clone();
    for (slot, value) in class.own_slot_members() {
        table.set(slot, Some(value));
    }
    Some(table)
}

/// Outcome of publishing a freshly built table.
#[derive(Debug)]
pub struct InstalledTable {
    pub path: BuildPath,
    /// Table that was replaced, if the class had one.
    pub previous: Option<Arc<SlotTable>>,
    /// The table now published.
    pub current: Arc<SlotTable>,
}

/// Build and publish the table of a managed class.
///
/// Returns `None` for unknown or foreign classes.
pub fn install_table<H: ClassHierarchy + ?Sized>(
    hier: &H,
    id: ClassId,
    fast_path: bool,
) -> Option<InstalledTable> {
    let class = hier.class(id)?;
    let cell = class.slot_cell()?;
    let (table, path) = build_table_with(hier, id, fast_path);
    let present = table.present_count();
    let current = Arc::new(table);
    let previous = cell.publish(current.clone());
    debug!(
        class = %class.name(),
        id = id.raw(),
        %path,
        present,
        rebuilt = previous.is_some(),
        "slot table installed"
    );
    Some(InstalledTable {
        path,
        previous,
        current,
    })
}
