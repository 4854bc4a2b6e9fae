// ============================================================================
// Transaction State
// ============================================================================
//
// A scope moves Active -> Committed or Active -> Aborted exactly once.
//
// ============================================================================

/// Lifecycle of a transaction scope
///
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback / drop──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is open; writes join it
    Active,

    /// Transaction has been committed
    Committed,

    /// Transaction has been rolled back
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    /// Committed and aborted are both terminal
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}
