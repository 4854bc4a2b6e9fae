// ============================================================================
// jsonpersist Library
// ============================================================================
//
// Object persistence over a single SQLite table of JSON documents. Objects
// are saved as flat documents (references stored as ids), loaded back into
// live object graphs, and searched with a fluent query builder compiled to
// SQL over `json_extract`.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod persist;
pub mod query;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use connection::{ConnectionConfig, StorageLocation};
pub use core::{DbError, Result, format_timestamp, parse_timestamp, timestamp_value};
pub use persist::{Attribute, Object, ObjectType, PersistentType, TypeRegistry};
pub use query::{CompiledQuery, OrQuery, Query, SortOrder};
pub use storage::{ObjectCache, Store};
pub use transaction::{TransactionScope, TransactionState};
