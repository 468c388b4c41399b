//! Core primitives shared by the dunder slot cache.
//!
//! This crate provides:
//! - `Value`, the identity-compared runtime value stored in namespaces
//! - String interning (`intern`, `InternedString`)
//! - Native builtin implementations (`BuiltinImpl`) and the per-context
//!   function objects that wrap them (`BuiltinFunction`)

pub mod builtin;
pub mod intern;
pub mod value;

pub use builtin::{BuiltinFunction, BuiltinImpl, ContextId, NativeFn};
pub use intern::{InternedString, intern};
pub use value::{FunctionObject, Value};
