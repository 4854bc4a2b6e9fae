//! Query builder: predicate clauses compiled to SQL over `json_extract`,
//! with in-process regex post-filters.

pub mod builder;
pub mod clause;
pub mod compile;
pub mod options;
pub mod or_query;
pub mod pattern;

pub use builder::Query;
pub use clause::{Clause, Operand, Operator, Transform};
pub use compile::{CompiledQuery, UNBOUNDED_LIMIT};
pub use options::{QueryOptions, SortOrder};
pub use or_query::OrQuery;
pub use pattern::RegexFilter;
