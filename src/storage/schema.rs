//! Schema DDL for the object table and its expression indexes.

pub const OBJECTS_TABLE: &str = "objects";
pub const JSON_COLUMN: &str = "json";
pub const ID_PATH: &str = "id";

/// Document field carrying the concrete type tag. Kept in the established
/// on-disk layout so existing object tables stay readable.
pub const TYPE_TAG_PATH: &str = "py/object";

pub const ID_INDEX: &str = "id_index";
pub const TYPE_INDEX: &str = "type_index";

/// Connection-level settings plus the table and built-in indexes.
pub fn bootstrap_sql() -> String {
    format!(
        "PRAGMA case_sensitive_like = ON;\n\
         CREATE TABLE IF NOT EXISTS {table} ({column} JSON NOT NULL);\n\
         CREATE UNIQUE INDEX IF NOT EXISTS {id_index} ON {table} ({id});\n\
         CREATE INDEX IF NOT EXISTS {type_index} ON {table} ({type_tag});",
        table = OBJECTS_TABLE,
        column = JSON_COLUMN,
        id_index = ID_INDEX,
        id = extract(ID_PATH),
        type_index = TYPE_INDEX,
        type_tag = extract(TYPE_TAG_PATH),
    )
}

/// `json_extract` expression for a key path inside the document column.
pub fn extract(key_path: &str) -> String {
    format!(
        "json_extract({}, '$.{}')",
        JSON_COLUMN,
        sql_escape_string(key_path)
    )
}

/// Replaces single quotes with doubled quotes for use inside a SQL literal.
pub fn sql_escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Deterministic index name for a set of key paths.
///
/// Paths are joined with `__`, path separators become `_`, and the result is
/// suffixed with `__idx`: `["a", "b.c"]` → `a__b_c__idx`.
pub fn index_name<S: AsRef<str>>(key_paths: &[S]) -> String {
    let joined = key_paths
        .iter()
        .map(|path| path.as_ref())
        .collect::<Vec<_>>()
        .join("__");
    format!("{}__idx", joined.replace(['.', '/'], "_"))
}

/// Builder for `CREATE INDEX` statements over document key paths
pub struct CreateIndexBuilder {
    key_paths: Vec<String>,
    unique: bool,
    global_scope: bool,
}

impl CreateIndexBuilder {
    pub fn new<S: AsRef<str>>(key_paths: &[S]) -> Self {
        Self {
            key_paths: key_paths.iter().map(|p| p.as_ref().to_string()).collect(),
            unique: false,
            global_scope: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Global scope drops the leading type-tag column, so the index (and any
    /// uniqueness constraint) spans every stored type.
    pub fn global_scope(mut self, global_scope: bool) -> Self {
        self.global_scope = global_scope;
        self
    }

    pub fn name(&self) -> String {
        index_name(&self.key_paths)
    }

    pub fn build(&self) -> String {
        let mut parts = Vec::with_capacity(self.key_paths.len() + 1);
        if !self.global_scope {
            parts.push(extract(TYPE_TAG_PATH));
        }
        parts.extend(self.key_paths.iter().map(|path| extract(path)));

        format!(
            "CREATE {}INDEX IF NOT EXISTS '{}' ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            sql_escape_string(&self.name()),
            OBJECTS_TABLE,
            parts.join(", ")
        )
    }
}
