//! SQL generation for queries, and running the generated statements.

use crate::core::Result;
use crate::persist::{Object, Pending};
use crate::query::clause::Clause;
use crate::query::options::QueryOptions;
use crate::storage::Store;
use crate::storage::schema::{JSON_COLUMN, OBJECTS_TABLE, extract};
use rusqlite::types::Value as SqlValue;

/// Limit substituted when only a skip is requested; the engine needs a
/// `LIMIT` before `OFFSET`.
pub const UNBOUNDED_LIMIT: i64 = 1_000_000_000;

/// A generated statement and its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

/// Clauses joined with `AND`; `None` when there are no clauses.
pub(crate) fn and_group(clauses: &[Clause]) -> Option<CompiledQuery> {
    if clauses.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(clauses.len());
    let mut binds = Vec::new();
    for clause in clauses {
        let (sql, values) = clause.render();
        parts.push(sql);
        binds.extend(values);
    }

    Some(CompiledQuery {
        sql: parts.join(" AND "),
        binds,
    })
}

/// Parenthesized groups joined with `OR`. Groups without clauses are
/// skipped; `None` when no group has any.
pub(crate) fn or_groups(groups: Vec<Option<CompiledQuery>>) -> Option<CompiledQuery> {
    let mut parts = Vec::with_capacity(groups.len());
    let mut binds = Vec::new();
    for group in groups.into_iter().flatten() {
        parts.push(format!("({})", group.sql));
        binds.extend(group.binds);
    }

    if parts.is_empty() {
        return None;
    }
    Some(CompiledQuery {
        sql: parts.join(" OR "),
        binds,
    })
}

/// Full `SELECT` of matching documents.
pub(crate) fn select(filter: Option<CompiledQuery>, options: &QueryOptions) -> CompiledQuery {
    let mut parts = vec![format!("SELECT {} FROM {}", JSON_COLUMN, OBJECTS_TABLE)];
    let mut binds = Vec::new();

    if let Some(filter) = filter {
        parts.push(format!("WHERE {}", filter.sql));
        binds = filter.binds;
    }

    if !options.sort.is_empty() {
        let terms: Vec<String> = options
            .sort
            .iter()
            .map(|(key_path, order)| format!("{} {}", extract(key_path), order.as_sql()))
            .collect();
        parts.push(format!("ORDER BY {}", terms.join(", ")));
    }

    if options.limit.is_some() || options.skip.is_some() {
        parts.push(format!("LIMIT {}", options.limit.unwrap_or(UNBOUNDED_LIMIT)));
    }
    if let Some(skip) = options.skip {
        parts.push(format!("OFFSET {}", skip));
    }

    CompiledQuery {
        sql: parts.join(" "),
        binds,
    }
}

/// `SELECT count(*)` over the pushed-down predicates only.
pub(crate) fn count(filter: Option<CompiledQuery>) -> CompiledQuery {
    let base = format!("SELECT count(*) FROM {}", OBJECTS_TABLE);
    match filter {
        Some(filter) => CompiledQuery {
            sql: format!("{} WHERE {}", base, filter.sql),
            binds: filter.binds,
        },
        None => CompiledQuery {
            sql: base,
            binds: Vec::new(),
        },
    }
}

/// Runs a compiled `SELECT`. `None` when the engine returns no rows at all;
/// otherwise the hydrated objects that pass the regex post-filters.
pub(crate) fn run_find(
    store: &Store,
    compiled: &CompiledQuery,
    options: &QueryOptions,
) -> Result<Option<Vec<Object>>> {
    let documents = store.query_documents(&compiled.sql, &compiled.binds)?;
    if documents.is_empty() {
        return Ok(None);
    }

    let objects = documents
        .iter()
        .map(|document| store.hydrate(document, &mut Pending::new()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(options.filter(objects)))
}

pub(crate) fn run_count(store: &Store, compiled: &CompiledQuery) -> Result<u64> {
    store.query_count(&compiled.sql, &compiled.binds)
}
