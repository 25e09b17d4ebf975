#![allow(dead_code)]

use async_trait::async_trait;
use sheetstore::core::{Payload, RecordId};
use sheetstore::storage::{RecordStore, StoreTransaction};
use sheetstore::transaction::TransactionId;
use sheetstore::{
    CellValue, MemoryStore, Position, PositionedCollectionManager, PositionedRecord, Result,
    Sheet, SheetError, SheetId, run_in_transaction,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Creates a sheet with one column `v` and rows holding `0..rows`.
pub async fn seed_sheet(manager: &PositionedCollectionManager, rows: i64) -> SheetId {
    let sheet = run_in_transaction(manager.store().as_ref(), |tx| {
        Box::pin(async move { tx.create_sheet("seed", vec!["v".into()]).await })
    })
    .await
    .unwrap();
    for i in 0..rows {
        manager
            .insert(sheet.id, vec![CellValue::from(i)], None)
            .await
            .unwrap();
    }
    sheet.id
}

pub async fn seed_grid(
    manager: &PositionedCollectionManager,
    columns: &[&str],
    rows: &[Vec<CellValue>],
) -> SheetId {
    let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let sheet = run_in_transaction(manager.store().as_ref(), move |tx| {
        Box::pin(async move { tx.create_sheet("grid", columns).await })
    })
    .await
    .unwrap();
    for row in rows {
        manager.insert(sheet.id, row.clone(), None).await.unwrap();
    }
    sheet.id
}

pub fn memory_manager() -> PositionedCollectionManager {
    PositionedCollectionManager::new(Arc::new(MemoryStore::new()))
}

/// First cell of every row, in position order.
pub fn first_cells(rows: &[PositionedRecord]) -> Vec<CellValue> {
    rows.iter().map(|r| r.payload[0].clone()).collect()
}

pub fn ids(rows: &[PositionedRecord]) -> Vec<RecordId> {
    rows.iter().map(|r| r.id).collect()
}

pub fn assert_dense(rows: &[PositionedRecord]) {
    let positions: Vec<Position> = rows.iter().map(|r| r.position).collect();
    let expected: Vec<Position> = (0..rows.len() as Position).collect();
    assert_eq!(positions, expected, "positions are not dense");
}

pub fn ints(values: &[i64]) -> Vec<CellValue> {
    values.iter().map(|v| CellValue::from(*v)).collect()
}

/// Counts calls to one store operation and fails the n-th once armed.
#[derive(Clone, Default)]
pub struct Fault {
    fail_on: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl Fault {
    fn arm(&self, nth: usize) {
        self.calls.store(0, Ordering::SeqCst);
        self.fail_on.store(nth, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.fail_on.store(0, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_on = self.fail_on.load(Ordering::SeqCst);
        if fail_on != 0 && call == fail_on {
            return Err(SheetError::Storage(format!(
                "injected failure on {} call {}",
                operation, call
            )));
        }
        Ok(())
    }
}

/// A [`MemoryStore`] whose write transactions fail the n-th
/// `update_position` or `update_payload` call once armed.
pub struct FaultyStore {
    inner: MemoryStore,
    positions: Fault,
    payloads: Fault,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            positions: Fault::default(),
            payloads: Fault::default(),
        }
    }

    /// Arms the store: the `nth` (1-based) `update_position` call from now on
    /// fails with a storage error.
    pub fn fail_update_position_on(&self, nth: usize) {
        self.positions.arm(nth);
    }

    /// Same as [`Self::fail_update_position_on`] for `update_payload`.
    pub fn fail_update_payload_on(&self, nth: usize) {
        self.payloads.arm(nth);
    }

    pub fn disarm(&self) {
        self.positions.disarm();
        self.payloads.disarm();
    }

    pub fn update_position_calls(&self) -> usize {
        self.positions.calls()
    }

    pub fn update_payload_calls(&self) -> usize {
        self.payloads.calls()
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            positions: self.positions.clone(),
            payloads: self.payloads.clone(),
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>> {
        self.inner.begin_read().await
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    positions: Fault,
    payloads: Fault,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    fn id(&self) -> TransactionId {
        self.inner.id()
    }

    async fn create_sheet(&mut self, name: &str, columns: Vec<String>) -> Result<Sheet> {
        self.inner.create_sheet(name, columns).await
    }

    async fn find_sheet(&mut self, sheet: SheetId) -> Result<Option<Sheet>> {
        self.inner.find_sheet(sheet).await
    }

    async fn list_sheets(&mut self) -> Result<Vec<Sheet>> {
        self.inner.list_sheets().await
    }

    async fn rename_sheet(&mut self, sheet: SheetId, name: &str) -> Result<Sheet> {
        self.inner.rename_sheet(sheet, name).await
    }

    async fn update_columns(&mut self, sheet: SheetId, columns: Vec<String>) -> Result<Sheet> {
        self.inner.update_columns(sheet, columns).await
    }

    async fn delete_sheet(&mut self, sheet: SheetId) -> Result<()> {
        self.inner.delete_sheet(sheet).await
    }

    async fn find_all_by_collection(&mut self, sheet: SheetId) -> Result<Vec<PositionedRecord>> {
        self.inner.find_all_by_collection(sheet).await
    }

    async fn find_by_collection_and_position(
        &mut self,
        sheet: SheetId,
        position: Position,
    ) -> Result<Option<PositionedRecord>> {
        self.inner.find_by_collection_and_position(sheet, position).await
    }

    async fn create_record(
        &mut self,
        sheet: SheetId,
        position: Position,
        payload: Payload,
    ) -> Result<PositionedRecord> {
        self.inner.create_record(sheet, position, payload).await
    }

    async fn update_position(&mut self, record: RecordId, position: Position) -> Result<()> {
        self.positions.check("update_position")?;
        self.inner.update_position(record, position).await
    }

    async fn update_payload(&mut self, record: RecordId, payload: Payload) -> Result<()> {
        self.payloads.check("update_payload")?;
        self.inner.update_payload(record, payload).await
    }

    async fn delete_record(&mut self, record: RecordId) -> Result<()> {
        self.inner.delete_record(record).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}
