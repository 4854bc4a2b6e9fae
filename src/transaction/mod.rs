// ============================================================================
// Transaction Module
// ============================================================================
//
// Caller-managed transactions over the store connection. Individual writes
// open their own transaction unless one of these scopes is already active.
//
// ============================================================================

pub mod scope;
pub mod state;

pub use scope::TransactionScope;
pub use state::TransactionState;
