use crate::core::{DbError, Result};
use crate::persist::Object;
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use serde_json::Value as JsonValue;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

const REGEX_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(200) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Mutex<LruCache<String, Arc<Regex>>> =
        Mutex::new(LruCache::new(REGEX_CACHE_CAPACITY));
}

/// Escape character used in generated `LIKE ... ESCAPE` clauses.
pub const LIKE_ESCAPE: char = '\\';

/// Escapes `LIKE` wildcards so `text` matches literally.
#[inline]
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Compiles a post-filter pattern anchored at the start of the value, with
/// caching of compiled expressions.
fn get_or_compile_regex(pattern: &str, case_insensitive: bool) -> Result<Arc<Regex>> {
    let cache_key = if case_insensitive {
        format!("i:{}", pattern)
    } else {
        format!("s:{}", pattern)
    };

    {
        let mut cache = REGEX_LRU_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = cache.get(&cache_key) {
            return Ok(Arc::clone(regex));
        }
    }

    let compiled = RegexBuilder::new(&format!("^(?:{})", pattern))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| DbError::InvalidArgument(format!("Invalid regex pattern: {}", e)))?;
    let compiled = Arc::new(compiled);

    {
        let mut cache = REGEX_LRU_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(cache_key, Arc::clone(&compiled));
    }

    Ok(compiled)
}

/// In-process filter for a key path: the value there must be text matching
/// the pattern from its first character.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    key_path: String,
    regex: Arc<Regex>,
}

impl RegexFilter {
    pub fn new(key_path: &str, pattern: &str, case_insensitive: bool) -> Result<Self> {
        Ok(Self {
            key_path: key_path.to_string(),
            regex: get_or_compile_regex(pattern, case_insensitive)?,
        })
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, object: &Object) -> bool {
        match object.value_at_path(&self.key_path) {
            Some(JsonValue::String(text)) => self.regex.is_match(&text),
            _ => false,
        }
    }
}
