use crate::connection::{ConnectionConfig, StorageLocation};
use crate::core::{DbError, Result};
use crate::persist::{ObjectType, PersistentType, TypeRegistry};
use crate::storage::cache::ObjectCache;
use crate::storage::schema::{self, CreateIndexBuilder, ID_PATH, JSON_COLUMN, OBJECTS_TABLE};
use crate::transaction::TransactionScope;
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params_from_iter};
use std::cell::RefCell;
use tracing::{debug, info, warn};

lazy_static! {
    static ref VIOLATED_INDEX: Regex = Regex::new(r"index '([^']+)'").unwrap();
}

/// Handle to the object table.
///
/// Owns the single engine connection, the object cache and the type registry.
/// A `Store` is not shared between threads; callers serialize access to it.
pub struct Store {
    conn: Connection,
    cache: ObjectCache,
    registry: RefCell<TypeRegistry>,
    config: ConnectionConfig,
}

impl Store {
    /// Opens the configured database, creating the object table and its
    /// built-in indexes when missing.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut conn = match &config.location {
            StorageLocation::Memory => Connection::open_in_memory()?,
            StorageLocation::File(path) => Connection::open(path)?,
        };

        if config.debug {
            conn.trace(Some(trace_statement as fn(&str)));
        }
        if config.use_wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch(&schema::bootstrap_sql())?;

        info!(
            "Object store connected: location='{}' cache_size={} wal={}",
            config.describe_location(),
            config.cache_size,
            config.use_wal
        );

        Ok(Self {
            conn,
            cache: ObjectCache::new(config.cache_size),
            registry: RefCell::new(TypeRegistry::new()),
            config: config.clone(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::connect(&ConnectionConfig::in_memory())
    }

    /// Replaces the connection and cache with fresh ones for `config`.
    /// Registered types are kept.
    pub fn reconnect(&mut self, config: &ConnectionConfig) -> Result<()> {
        let mut fresh = Self::connect(config)?;
        fresh.registry = RefCell::new(self.registry.take());
        *self = fresh;
        Ok(())
    }

    /// Closes the connection, reporting any error the engine raises on close.
    pub fn close(self) -> Result<()> {
        let location = self.config.describe_location();
        self.conn.close().map_err(|(_, err)| DbError::from(err))?;
        info!("Object store closed: location='{}'", location);
        Ok(())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Raw engine connection, for administrative statements.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    /// Registers a persisted type so its stored documents can be loaded.
    /// Saving an object registers its type implicitly.
    pub fn register<T: PersistentType>(&self) -> bool {
        self.register_type(T::object_type())
    }

    pub fn register_type(&self, object_type: ObjectType) -> bool {
        self.registry.borrow_mut().register(object_type)
    }

    pub fn registered_tags(&self) -> Vec<&'static str> {
        self.registry.borrow().tags()
    }

    pub(crate) fn registry(&self) -> std::cell::Ref<'_, TypeRegistry> {
        self.registry.borrow()
    }

    /// Creates a secondary index over one or more document key paths and
    /// returns its name.
    ///
    /// Unless `global_scope` is set the index leads with the type tag, so a
    /// unique index constrains each type separately. Repeating a call with
    /// the same paths is a no-op.
    pub fn add_index<S: AsRef<str>>(
        &self,
        key_paths: &[S],
        unique: bool,
        global_scope: bool,
    ) -> Result<String> {
        if key_paths.is_empty() {
            return Err(DbError::InvalidArgument(
                "an index needs at least one key path".to_string(),
            ));
        }

        let builder = CreateIndexBuilder::new(key_paths)
            .unique(unique)
            .global_scope(global_scope);
        self.conn
            .execute_batch(&builder.build())
            .map_err(map_write_error)?;

        let name = builder.name();
        info!(
            "Index ready: name='{}' unique={} global_scope={}",
            name, unique, global_scope
        );
        Ok(name)
    }

    /// Begins a caller-managed transaction. Writes issued while it is open
    /// join it; dropping the scope without committing rolls back.
    ///
    /// A rollback only undoes storage. Objects saved inside the scope stay
    /// clean and stamped in memory, so saving them again is a no-op (or an
    /// update of a row that no longer exists). Discard them, or reload them
    /// with [`Store::get`], after a rollback.
    pub fn transaction(&self) -> Result<TransactionScope<'_>> {
        TransactionScope::begin(&self.conn)
    }

    /// Runs `f` inside a transaction: commits on `Ok`, rolls back on `Err`.
    ///
    /// After a rollback, objects that `f` saved successfully still report
    /// themselves saved and clean; see [`Store::transaction`].
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T>,
    {
        let scope = self.transaction()?;
        let value = f(self)?;
        scope.commit()?;
        Ok(value)
    }

    /// `true` when a transaction is open on the connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Runs a write in its own transaction when asked to, unless a
    /// transaction is already open, in which case the write joins it.
    pub(crate) fn run_write<T, F>(&self, use_transaction: bool, write: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if !use_transaction || self.in_transaction() {
            return write();
        }

        let scope = TransactionScope::begin(&self.conn)?;
        let value = write()?;
        scope.commit()?;
        Ok(value)
    }

    pub(crate) fn insert_document(&self, document: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES (json(?1))",
            OBJECTS_TABLE, JSON_COLUMN
        );
        self.conn
            .execute(&sql, [document])
            .map_err(map_write_error)?;
        Ok(())
    }

    pub(crate) fn update_document(&self, id: &str, document: &str) -> Result<usize> {
        let sql = format!(
            "UPDATE {} SET {} = json(?1) WHERE {} = ?2",
            OBJECTS_TABLE,
            JSON_COLUMN,
            schema::extract(ID_PATH)
        );
        self.conn
            .execute(&sql, [document, id])
            .map_err(map_write_error)
    }

    pub(crate) fn delete_document(&self, id: &str) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            OBJECTS_TABLE,
            schema::extract(ID_PATH)
        );
        Ok(self.conn.execute(&sql, [id])?)
    }

    pub(crate) fn fetch_document(&self, id: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            JSON_COLUMN,
            OBJECTS_TABLE,
            schema::extract(ID_PATH)
        );
        let document = self
            .conn
            .query_row(&sql, [id], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(document)
    }

    /// `true` when a document with this id is stored.
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.fetch_document(id)?.is_some())
    }

    pub(crate) fn query_documents(&self, sql: &str, binds: &[SqlValue]) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(binds.iter()), |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    pub(crate) fn query_count(&self, sql: &str, binds: &[SqlValue]) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(sql, params_from_iter(binds.iter()), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn trace_statement(sql: &str) {
    debug!(target: "jsonpersist::sql", "{}", sql);
}

/// Turns a unique-index violation into [`DbError::Uniqueness`]; every other
/// engine error passes through unchanged.
pub(crate) fn map_write_error(err: rusqlite::Error) -> DbError {
    let index = match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            match message.as_deref() {
                Some(text) if text.contains("UNIQUE") => Some(violated_index(text)),
                _ => None,
            }
        }
        _ => None,
    };

    match index {
        Some(index) => {
            warn!("Uniqueness violation: index='{}'", index);
            DbError::Uniqueness { index }
        }
        None => DbError::Storage(err),
    }
}

/// Index name from an engine message such as
/// `UNIQUE constraint failed: index 'a__b_c__idx'`; empty when absent.
pub(crate) fn violated_index(message: &str) -> String {
    VIOLATED_INDEX
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .unwrap_or_default()
}
