use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A write violated a unique index. `index` is the violated index name,
    /// or empty when the engine message could not be parsed.
    #[error("Uniqueness violation on index '{index}'")]
    Uniqueness { index: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown object type '{0}'")]
    UnknownType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_uniqueness(&self) -> bool {
        matches!(self, Self::Uniqueness { .. })
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
