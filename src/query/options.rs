use crate::core::{DbError, Result};
use crate::persist::Object;
use crate::query::pattern::RegexFilter;

/// Direction of one sort term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Result shaping shared by [`Query`](super::Query) and
/// [`OrQuery`](super::OrQuery): sort terms, limit, skip and regex post-filters.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    pub regexes: Vec<RegexFilter>,
}

impl QueryOptions {
    pub(crate) fn push_sort(&mut self, key_path: &str, order: SortOrder) {
        self.sort.push((key_path.to_string(), order));
    }

    pub(crate) fn set_limit(&mut self, n: i64) -> Result<()> {
        self.limit = Some(positive("limit", n)?);
        Ok(())
    }

    pub(crate) fn set_skip(&mut self, n: i64) -> Result<()> {
        self.skip = Some(positive("skip", n)?);
        Ok(())
    }

    pub(crate) fn push_regex(&mut self, key_path: &str, pattern: &str, case_insensitive: bool) -> Result<()> {
        self.regexes
            .push(RegexFilter::new(key_path, pattern, case_insensitive)?);
        Ok(())
    }

    /// Keeps the objects that pass every regex post-filter.
    pub(crate) fn filter(&self, objects: Vec<Object>) -> Vec<Object> {
        if self.regexes.is_empty() {
            return objects;
        }
        objects
            .into_iter()
            .filter(|object| self.regexes.iter().all(|filter| filter.is_match(object)))
            .collect()
    }
}

fn positive(name: &str, n: i64) -> Result<i64> {
    if n <= 0 {
        return Err(DbError::InvalidArgument(format!(
            "{} must be a positive integer, got {}",
            name, n
        )));
    }
    Ok(n)
}
