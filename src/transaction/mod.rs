// ============================================================================
// Transaction Boundary
// ============================================================================
//
// `run_in_transaction` is the only way the collection manager mutates the
// store: the body runs against one open transaction, which is committed when
// the body returns Ok and rolled back on any error. Errors are never retried
// here.
//
// ============================================================================

pub mod state;

pub use state::{TransactionId, TransactionState};

use crate::core::Result;
use crate::storage::{RecordStore, StoreTransaction};
use futures::future::BoxFuture;
use tracing::{Level, event};

/// Runs `body` inside a read-write transaction of `store`.
///
/// The body receives the open transaction and must return a boxed future,
/// typically `|tx| Box::pin(async move { ... })`. Values the body needs
/// should be moved in, since the future may only borrow the transaction.
pub async fn run_in_transaction<S, T, F>(store: &S, body: F) -> Result<T>
where
    S: RecordStore + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T>> + Send,
{
    let mut tx = store.begin().await?;
    let txn_id = tx.id();

    match body(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            event!(Level::DEBUG, txn = %txn_id, "transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                event!(
                    Level::WARN,
                    txn = %txn_id,
                    error = %rollback_err,
                    "rollback after failed transaction body also failed"
                );
            }
            event!(Level::DEBUG, txn = %txn_id, error = %err, "transaction rolled back");
            Err(err)
        }
    }
}

/// Runs `body` against a read-only view of the last committed state.
pub async fn run_read<S, T, F>(store: &S, body: F) -> Result<T>
where
    S: RecordStore + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T>> + Send,
{
    let mut tx = store.begin_read().await?;
    let result = body(&mut *tx).await;
    tx.rollback().await?;
    result
}
