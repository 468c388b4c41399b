//! Special-method slots.
//!
//! - `slot`: the slot enumeration and name resolution
//! - `table`: per-class slot tables and their copy-on-write cell
//! - `build`: table construction from a class's MRO
//! - `propagate`: invalidation after namespace writes and base changes
//! - `shared`: process-wide descriptor tables for builtin types
//! - `dispatch`: the read path used by operator dispatch
//! - `validate`: cache-versus-MRO consistency checks

pub mod build;
pub mod dispatch;
pub mod propagate;
pub mod shared;
pub mod slot;
pub mod table;
pub mod validate;
