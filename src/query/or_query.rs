use crate::core::Result;
use crate::persist::Object;
use crate::query::builder::Query;
use crate::query::compile::{self, CompiledQuery};
use crate::query::options::{QueryOptions, SortOrder};
use crate::storage::Store;

/// Union of several queries: each child's predicates form one `AND` group,
/// and the groups are joined with `OR`.
///
/// Only the children's predicates are used; sort, limit, skip and regex
/// filters come from the `OrQuery` itself.
#[derive(Debug, Clone, Default)]
pub struct OrQuery {
    queries: Vec<Query>,
    options: QueryOptions,
}

impl OrQuery {
    pub fn new<I>(queries: I) -> Self
    where
        I: IntoIterator<Item = Query>,
    {
        Self {
            queries: queries.into_iter().collect(),
            options: QueryOptions::default(),
        }
    }

    pub fn or(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn matches(mut self, key_path: &str, pattern: &str, case_insensitive: bool) -> Result<Self> {
        self.options.push_regex(key_path, pattern, case_insensitive)?;
        Ok(self)
    }

    pub fn ascending(mut self, key_path: &str) -> Self {
        self.options.push_sort(key_path, SortOrder::Ascending);
        self
    }

    pub fn descending(mut self, key_path: &str) -> Self {
        self.options.push_sort(key_path, SortOrder::Descending);
        self
    }

    pub fn limit(mut self, n: i64) -> Result<Self> {
        self.options.set_limit(n)?;
        Ok(self)
    }

    pub fn skip(mut self, n: i64) -> Result<Self> {
        self.options.set_skip(n)?;
        Ok(self)
    }

    fn filter(&self) -> Option<CompiledQuery> {
        compile::or_groups(self.queries.iter().map(Query::filter).collect())
    }

    pub fn to_sql(&self) -> CompiledQuery {
        compile::select(self.filter(), &self.options)
    }

    /// Same contract as [`Query::find`].
    pub fn find(&self, store: &Store) -> Result<Option<Vec<Object>>> {
        compile::run_find(store, &self.to_sql(), &self.options)
    }

    pub fn first(&self, store: &Store) -> Result<Option<Object>> {
        let mut single = self.clone();
        single.options.limit = Some(1);
        Ok(single.find(store)?.and_then(|objects| objects.into_iter().next()))
    }

    pub fn count(&self, store: &Store) -> Result<u64> {
        compile::run_count(store, &compile::count(self.filter()))
    }
}
