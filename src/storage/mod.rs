//! Transactional key-position store.
//!
//! [`RecordStore`] hands out transactions; every read and write of sheets and
//! positioned records goes through a [`StoreTransaction`]. A transaction that
//! is dropped without [`StoreTransaction::commit`] leaves no trace.
//!
//! Implementations must enforce uniqueness of `(collection, position)` for
//! records: [`StoreTransaction::create_record`] and
//! [`StoreTransaction::update_position`] fail with
//! [`SheetError::ConstraintViolation`](crate::core::SheetError::ConstraintViolation)
//! when another record of the same collection already holds the position.

pub mod memory;
pub mod persistence;
pub mod table;

pub use memory::MemoryStore;
pub use persistence::{SnapshotFile, StoreSnapshot};
pub use table::StoreState;

use crate::core::{Payload, Position, PositionedRecord, RecordId, Result, Sheet, SheetId};
use crate::transaction::TransactionId;
use async_trait::async_trait;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Opens a read-write transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Opens a transaction over the last committed state that rejects writes.
    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    fn id(&self) -> TransactionId;

    async fn create_sheet(&mut self, name: &str, columns: Vec<String>) -> Result<Sheet>;
    async fn find_sheet(&mut self, sheet: SheetId) -> Result<Option<Sheet>>;
    async fn list_sheets(&mut self) -> Result<Vec<Sheet>>;
    async fn rename_sheet(&mut self, sheet: SheetId, name: &str) -> Result<Sheet>;
    async fn update_columns(&mut self, sheet: SheetId, columns: Vec<String>) -> Result<Sheet>;
    /// Removes the sheet and every record of its collection.
    async fn delete_sheet(&mut self, sheet: SheetId) -> Result<()>;

    /// Records of the collection ordered by position ascending.
    async fn find_all_by_collection(&mut self, sheet: SheetId) -> Result<Vec<PositionedRecord>>;
    async fn find_by_collection_and_position(
        &mut self,
        sheet: SheetId,
        position: Position,
    ) -> Result<Option<PositionedRecord>>;
    async fn create_record(
        &mut self,
        sheet: SheetId,
        position: Position,
        payload: Payload,
    ) -> Result<PositionedRecord>;
    async fn update_position(&mut self, record: RecordId, position: Position) -> Result<()>;
    async fn update_payload(&mut self, record: RecordId, payload: Payload) -> Result<()>;
    async fn delete_record(&mut self, record: RecordId) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}
