use super::TransactionState;
use crate::core::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

/// Scoped transaction on the store connection.
///
/// `commit` ends it successfully; `rollback`, or dropping the scope while it
/// is still active (an early `?` return, a panic), undoes every write issued
/// since it began.
pub struct TransactionScope<'conn> {
    conn: &'conn Connection,
    state: TransactionState,
}

impl<'conn> TransactionScope<'conn> {
    pub(crate) fn begin(conn: &'conn Connection) -> Result<Self> {
        conn.execute_batch("BEGIN DEFERRED")?;
        debug!("Transaction started");
        Ok(Self {
            conn,
            state: TransactionState::Active,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.state = TransactionState::Committed;
        debug!("Transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.abort()
    }

    fn abort(&mut self) -> Result<()> {
        self.state = TransactionState::Aborted;
        self.conn.execute_batch("ROLLBACK")?;
        debug!("Transaction rolled back");
        Ok(())
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.state.is_active() {
            if let Err(err) = self.abort() {
                warn!("Rollback on drop failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        conn
    }

    fn rows(conn: &Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_keeps_writes() {
        let conn = connection();
        let scope = TransactionScope::begin(&conn).unwrap();
        assert!(scope.state().is_active());
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        scope.commit().unwrap();
        assert_eq!(rows(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_drop_rolls_back() {
        let conn = connection();
        {
            let _scope = TransactionScope::begin(&conn).unwrap();
            conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        }
        assert_eq!(rows(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_explicit_rollback() {
        let conn = connection();
        let scope = TransactionScope::begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        scope.rollback().unwrap();
        assert_eq!(rows(&conn), 0);
    }

    #[test]
    fn test_nested_begin_fails() {
        let conn = connection();
        let _outer = TransactionScope::begin(&conn).unwrap();
        assert!(TransactionScope::begin(&conn).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TransactionState::Committed.is_terminal());
        assert!(TransactionState::Aborted.is_terminal());
        assert!(!TransactionState::Active.is_terminal());
    }
}
