//! Class object model.
//!
//! Classes are identified by `ClassId` and owned by a per-context
//! `ClassRegistry`, which also tracks subclass links and linearizations.

pub mod builtin_types;
pub mod class;
pub mod mro;
pub mod registry;
