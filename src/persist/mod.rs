//! Persistent objects: the live object handle, type declarations, the stored
//! document codec and the save/load lifecycle.

mod codec;
mod lifecycle;
mod macros;
pub mod object;
pub mod registry;

pub use object::{Attribute, Object, RESERVED_ATTRIBUTES, json_at_path, new_id};
pub use registry::{ObjectType, PersistentType, TypeRegistry};

pub(crate) use lifecycle::Pending;
