// ============================================================================
// Transaction State
// ============================================================================
//
// Each store transaction moves through Active -> Committed/Aborted exactly
// once. Store implementations keep one of these per open transaction and
// refuse work once it reaches a terminal state.
//
// ============================================================================

use crate::core::{Result, SheetError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction, used to correlate log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }

    /// Fails unless the transaction can still execute operations.
    pub fn ensure_active(&self, id: TransactionId) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SheetError::Storage(format!(
                "transaction {} is already {}",
                id, self
            )))
        }
    }

    /// Moves an active transaction into `next`, which must be terminal.
    pub fn finish(&mut self, id: TransactionId, next: TransactionState) -> Result<()> {
        self.ensure_active(id)?;
        debug_assert!(next.is_terminal());
        *self = next;
        Ok(())
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}
