use super::persistence::{SnapshotFile, StoreSnapshot};
use super::{RecordStore, StoreState, StoreTransaction};
use crate::core::{
    Payload, Position, PositionedRecord, RecordId, Result, Sheet, SheetError, SheetId,
};
use crate::transaction::{TransactionId, TransactionState};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{Level, event};

/// Monotonic id source shared by every transaction of one store.
///
/// Lives outside [`StoreState`] so ids handed out by a rolled-back
/// transaction are not handed out again.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next_sheet: AtomicU64,
    next_record: AtomicU64,
}

impl IdAllocator {
    fn starting_after(max_sheet: u64, max_record: u64) -> Self {
        Self {
            next_sheet: AtomicU64::new(max_sheet + 1),
            next_record: AtomicU64::new(max_record + 1),
        }
    }

    fn sheet(&self) -> SheetId {
        SheetId(self.next_sheet.fetch_add(1, Ordering::SeqCst))
    }

    fn record(&self) -> RecordId {
        RecordId(self.next_record.fetch_add(1, Ordering::SeqCst))
    }

    fn peek(&self) -> (u64, u64) {
        (
            self.next_sheet.load(Ordering::SeqCst),
            self.next_record.load(Ordering::SeqCst),
        )
    }
}

/// In-memory [`RecordStore`] with optional snapshot durability.
///
/// Write transactions hold the writer lock from `begin` until commit,
/// rollback or drop, so they execute one at a time. Each works on a
/// copy-on-write clone of the committed state that replaces it on commit.
/// Read transactions clone the committed state and are never blocked by an
/// open writer.
pub struct MemoryStore {
    writer: Arc<Mutex<()>>,
    state: Arc<RwLock<StoreState>>,
    ids: Arc<IdAllocator>,
    snapshot: Option<Arc<SnapshotFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            writer: Arc::new(Mutex::new(())),
            state: Arc::new(RwLock::new(StoreState::new())),
            ids: Arc::new(IdAllocator::starting_after(0, 0)),
            snapshot: None,
        }
    }

    /// Opens a store persisted at `path`, loading the snapshot if one exists.
    /// Every later commit rewrites the snapshot.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = Arc::new(SnapshotFile::new(path.as_ref()));
        let loader = Arc::clone(&file);
        let loaded = tokio::task::spawn_blocking(move || loader.load::<StoreSnapshot>()).await??;

        let (state, ids) = match loaded {
            Some(snapshot) => {
                let (state, next_sheet, next_record) = snapshot.into_state()?;
                event!(
                    Level::INFO,
                    path = %file.path().display(),
                    sheets = state.sheet_count(),
                    records = state.record_count(),
                    "loaded store snapshot"
                );
                let ids = IdAllocator {
                    next_sheet: AtomicU64::new(next_sheet),
                    next_record: AtomicU64::new(next_record),
                };
                (state, ids)
            }
            None => (StoreState::new(), IdAllocator::starting_after(0, 0)),
        };

        Ok(Self {
            writer: Arc::new(Mutex::new(())),
            state: Arc::new(RwLock::new(state)),
            ids: Arc::new(ids),
            snapshot: Some(file),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref().map(SnapshotFile::path)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let working = self.state.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            id: TransactionId::new(),
            state: TransactionState::Active,
            writer: Some(writer),
            committed: Arc::clone(&self.state),
            working,
            ids: Arc::clone(&self.ids),
            snapshot: self.snapshot.clone(),
        }))
    }

    async fn begin_read(&self) -> Result<Box<dyn StoreTransaction>> {
        let working = self.state.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            id: TransactionId::new(),
            state: TransactionState::Active,
            writer: None,
            committed: Arc::clone(&self.state),
            working,
            ids: Arc::clone(&self.ids),
            snapshot: None,
        }))
    }
}

pub struct MemoryTransaction {
    id: TransactionId,
    state: TransactionState,
    /// `None` for read-only transactions.
    writer: Option<OwnedMutexGuard<()>>,
    committed: Arc<RwLock<StoreState>>,
    working: StoreState,
    ids: Arc<IdAllocator>,
    snapshot: Option<Arc<SnapshotFile>>,
}

impl MemoryTransaction {
    fn readable(&self) -> Result<&StoreState> {
        self.state.ensure_active(self.id)?;
        Ok(&self.working)
    }

    fn writable(&mut self) -> Result<&mut StoreState> {
        self.state.ensure_active(self.id)?;
        if self.writer.is_none() {
            return Err(SheetError::Storage(format!(
                "transaction {} is read-only",
                self.id
            )));
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    async fn create_sheet(&mut self, name: &str, columns: Vec<String>) -> Result<Sheet> {
        self.writable()?;
        let now = Utc::now();
        let sheet = Sheet {
            id: self.ids.sheet(),
            name: name.to_string(),
            columns,
            created_at: now,
            updated_at: now,
        };
        self.writable()?.insert_sheet(sheet.clone());
        Ok(sheet)
    }

    async fn find_sheet(&mut self, sheet: SheetId) -> Result<Option<Sheet>> {
        Ok(self.readable()?.sheet(sheet).cloned())
    }

    async fn list_sheets(&mut self) -> Result<Vec<Sheet>> {
        Ok(self.readable()?.sheets())
    }

    async fn rename_sheet(&mut self, sheet: SheetId, name: &str) -> Result<Sheet> {
        self.writable()?.rename_sheet(sheet, name, Utc::now())
    }

    async fn update_columns(&mut self, sheet: SheetId, columns: Vec<String>) -> Result<Sheet> {
        self.writable()?.set_columns(sheet, columns, Utc::now())
    }

    async fn delete_sheet(&mut self, sheet: SheetId) -> Result<()> {
        let removed = self.writable()?.remove_sheet(sheet)?;
        event!(Level::DEBUG, txn = %self.id, sheet = %sheet, records = removed, "sheet removed");
        Ok(())
    }

    async fn find_all_by_collection(&mut self, sheet: SheetId) -> Result<Vec<PositionedRecord>> {
        Ok(self.readable()?.records_in(sheet))
    }

    async fn find_by_collection_and_position(
        &mut self,
        sheet: SheetId,
        position: Position,
    ) -> Result<Option<PositionedRecord>> {
        Ok(self.readable()?.record_at(sheet, position))
    }

    async fn create_record(
        &mut self,
        sheet: SheetId,
        position: Position,
        payload: Payload,
    ) -> Result<PositionedRecord> {
        self.writable()?;
        let now = Utc::now();
        let record = PositionedRecord {
            id: self.ids.record(),
            collection_id: sheet,
            position,
            payload,
            created_at: now,
            updated_at: now,
        };
        self.writable()?.insert_record(record)
    }

    async fn update_position(&mut self, record: RecordId, position: Position) -> Result<()> {
        self.writable()?.set_position(record, position, Utc::now())
    }

    async fn update_payload(&mut self, record: RecordId, payload: Payload) -> Result<()> {
        self.writable()?.set_payload(record, payload, Utc::now())
    }

    async fn delete_record(&mut self, record: RecordId) -> Result<()> {
        self.writable()?.remove_record(record).map(|_| ())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.state.ensure_active(self.id)?;
        let Some(writer) = self.writer.take() else {
            // Nothing to publish for a read-only transaction.
            return self.state.finish(self.id, TransactionState::Committed);
        };

        if let Some(file) = self.snapshot.clone() {
            let (next_sheet, next_record) = self.ids.peek();
            let snapshot = StoreSnapshot::capture(&self.working, next_sheet, next_record);
            // Write before publishing: a failed write aborts the commit and
            // the committed state stays as it was.
            tokio::task::spawn_blocking(move || file.save(&snapshot)).await??;
        }

        *self.committed.write().await = std::mem::take(&mut self.working);
        drop(writer);
        self.state.finish(self.id, TransactionState::Committed)
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.writer = None;
        self.state.finish(self.id, TransactionState::Aborted)
    }
}
