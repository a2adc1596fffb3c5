//! Type definitions for Language runtime values.
//!
//! This module holds the built-in data types that live behind heap slots
//! plus the type registry itself (`class`). Each type module declares its
//! Operations table and, where it exposes named methods, its exposure
//! table.

pub mod bytes;
pub mod class;
pub mod dict;
pub mod function;
pub mod iter;
pub mod list;
pub mod long_int;
pub mod module;
pub mod num;
pub mod singletons;
pub mod str;
pub mod tuple;
pub mod r#type;

pub use class::{Instance, TypeFlags, TypeObject, TypeSpec};
pub use module::ModuleDef;
pub use r#type::Type;
