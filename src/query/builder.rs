use crate::core::Result;
use crate::core::value::canonical_json;
use crate::persist::{Object, PersistentType};
use crate::query::clause::{Clause, Operand, Operator, Transform};
use crate::query::compile::{self, CompiledQuery};
use crate::query::options::{QueryOptions, SortOrder};
use crate::query::pattern::escape_like;
use crate::storage::Store;
use crate::storage::schema::TYPE_TAG_PATH;
use serde_json::Value as JsonValue;

/// Fluent builder for searching stored objects.
///
/// Predicates are pushed down to the engine and joined with `AND`; regex
/// filters added with [`Query::matches`] run in-process after the fetch.
///
/// # Examples
///
/// ```
/// use jsonpersist::{Object, Query, Store};
///
/// jsonpersist::persistent_type! {
///     pub struct Task = "todo.Task";
/// }
///
/// # fn main() -> jsonpersist::Result<()> {
/// let store = Store::open_in_memory()?;
/// let task = Object::of::<Task>();
/// task.set("priority", 2)?;
/// task.save(&store)?;
///
/// let urgent = Query::of::<Task>().greater_than("priority", 1, false);
/// assert_eq!(urgent.count(&store)?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    clauses: Vec<Clause>,
    options: QueryOptions,
}

impl Query {
    /// Query over every stored object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Query scoped to objects of type `T`.
    pub fn of<T: PersistentType>() -> Self {
        Self::for_type(T::TYPE_TAG)
    }

    /// Query scoped to objects carrying `type_tag`.
    pub fn for_type(type_tag: &str) -> Self {
        Self::new().push(Clause::new(
            TYPE_TAG_PATH,
            Operator::Eq,
            Operand::Scalar(JsonValue::String(type_tag.to_string())),
        ))
    }

    fn push(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn contained_in<I, V>(self, key_path: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Clause::new(key_path, Operator::In, Operand::List(values)))
    }

    pub fn not_contained_in<I, V>(self, key_path: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Clause::new(key_path, Operator::NotIn, Operand::List(values)))
    }

    pub fn exists(self, key_path: &str) -> Self {
        self.push(Clause::new(key_path, Operator::IsNotNull, Operand::None))
    }

    pub fn does_not_exist(self, key_path: &str) -> Self {
        self.push(Clause::new(key_path, Operator::IsNull, Operand::None))
    }

    pub fn contains(self, key_path: &str, text: &str, case_insensitive: bool) -> Self {
        self.like(key_path, text, case_insensitive, |t| format!("%{}%", t))
    }

    pub fn starts_with(self, key_path: &str, text: &str, case_insensitive: bool) -> Self {
        self.like(key_path, text, case_insensitive, |t| format!("{}%", t))
    }

    pub fn ends_with(self, key_path: &str, text: &str, case_insensitive: bool) -> Self {
        self.like(key_path, text, case_insensitive, |t| format!("%{}", t))
    }

    fn like(
        self,
        key_path: &str,
        text: &str,
        case_insensitive: bool,
        wrap: impl Fn(&str) -> String,
    ) -> Self {
        let (text, transform) = if case_insensitive {
            // lower() in the engine folds ASCII only; fold the operand the same way.
            (text.to_ascii_lowercase(), Transform::Lower)
        } else {
            (text.to_string(), Transform::Identity)
        };
        let pattern = JsonValue::String(wrap(&escape_like(&text)));
        self.push(Clause::new(key_path, Operator::Like, Operand::Scalar(pattern)).with_transform(transform))
    }

    /// Equality. Lists and maps compare by their canonical JSON text; `null`
    /// matches a missing or null value.
    pub fn equal_to<V: Into<JsonValue>>(self, key_path: &str, value: V) -> Self {
        let value = value.into();
        if value.is_null() {
            return self.does_not_exist(key_path);
        }
        self.push(equality(key_path, Operator::Eq, value))
    }

    pub fn not_equal_to<V: Into<JsonValue>>(self, key_path: &str, value: V) -> Self {
        let value = value.into();
        if value.is_null() {
            return self.exists(key_path);
        }
        self.push(equality(key_path, Operator::NotEq, value))
    }

    /// With `is_list`, `value` is compared with the length of the list at
    /// `key_path`.
    pub fn greater_than<V: Into<JsonValue>>(self, key_path: &str, value: V, is_list: bool) -> Self {
        self.push(ordering(key_path, Operator::Gt, value.into(), is_list))
    }

    pub fn greater_than_or_equal_to<V: Into<JsonValue>>(
        self,
        key_path: &str,
        value: V,
        is_list: bool,
    ) -> Self {
        self.push(ordering(key_path, Operator::Gte, value.into(), is_list))
    }

    pub fn less_than<V: Into<JsonValue>>(self, key_path: &str, value: V, is_list: bool) -> Self {
        self.push(ordering(key_path, Operator::Lt, value.into(), is_list))
    }

    pub fn less_than_or_equal_to<V: Into<JsonValue>>(
        self,
        key_path: &str,
        value: V,
        is_list: bool,
    ) -> Self {
        self.push(ordering(key_path, Operator::Lte, value.into(), is_list))
    }

    /// Keeps only objects whose text at `key_path` matches `pattern` from its
    /// first character. Applied after the fetch; `count` ignores it.
    pub fn matches(mut self, key_path: &str, pattern: &str, case_insensitive: bool) -> Result<Self> {
        self.options.push_regex(key_path, pattern, case_insensitive)?;
        Ok(self)
    }

    /// Restricts `key_path` to the ids found by `query`, which runs now.
    /// A nested query that finds nothing yields a clause matching nothing.
    pub fn matches_query(self, key_path: &str, query: &Query, store: &Store) -> Result<Self> {
        let ids = found_ids(query, store)?;
        Ok(self.contained_in(key_path, ids))
    }

    /// Excludes the ids found by `query`, which runs now.
    pub fn does_not_match_query(self, key_path: &str, query: &Query, store: &Store) -> Result<Self> {
        let ids = found_ids(query, store)?;
        Ok(self.not_contained_in(key_path, ids))
    }

    pub fn ascending(mut self, key_path: &str) -> Self {
        self.options.push_sort(key_path, SortOrder::Ascending);
        self
    }

    pub fn descending(mut self, key_path: &str) -> Self {
        self.options.push_sort(key_path, SortOrder::Descending);
        self
    }

    /// Fails with `InvalidArgument` unless `n` is positive.
    pub fn limit(mut self, n: i64) -> Result<Self> {
        self.options.set_limit(n)?;
        Ok(self)
    }

    /// Fails with `InvalidArgument` unless `n` is positive.
    pub fn skip(mut self, n: i64) -> Result<Self> {
        self.options.set_skip(n)?;
        Ok(self)
    }

    pub(crate) fn filter(&self) -> Option<CompiledQuery> {
        compile::and_group(&self.clauses)
    }

    /// The `SELECT` this query runs.
    pub fn to_sql(&self) -> CompiledQuery {
        compile::select(self.filter(), &self.options)
    }

    /// Matching objects. `None` when the engine finds no rows; an empty list
    /// when rows were found but regex filters rejected all of them.
    pub fn find(&self, store: &Store) -> Result<Option<Vec<Object>>> {
        compile::run_find(store, &self.to_sql(), &self.options)
    }

    /// The first matching object, if any.
    pub fn first(&self, store: &Store) -> Result<Option<Object>> {
        let mut single = self.clone();
        single.options.limit = Some(1);
        Ok(single.find(store)?.and_then(|objects| objects.into_iter().next()))
    }

    /// Number of stored objects matching the pushed-down predicates. Regex
    /// filters, sort, limit and skip do not apply.
    pub fn count(&self, store: &Store) -> Result<u64> {
        compile::run_count(store, &compile::count(self.filter()))
    }
}

fn equality(key_path: &str, operator: Operator, value: JsonValue) -> Clause {
    match value {
        JsonValue::Array(_) | JsonValue::Object(_) => Clause::new(
            key_path,
            operator,
            Operand::Scalar(JsonValue::String(canonical_json(&value))),
        )
        .with_transform(Transform::Json),
        scalar => Clause::new(key_path, operator, Operand::Scalar(scalar)),
    }
}

fn ordering(key_path: &str, operator: Operator, value: JsonValue, is_list: bool) -> Clause {
    let clause = Clause::new(key_path, operator, Operand::Scalar(value));
    if is_list {
        clause.with_transform(Transform::ArrayLength)
    } else {
        clause
    }
}

fn found_ids(query: &Query, store: &Store) -> Result<Vec<JsonValue>> {
    let ids = query
        .find(store)?
        .unwrap_or_default()
        .iter()
        .map(|object| JsonValue::String(object.id()))
        .collect();
    Ok(ids)
}
