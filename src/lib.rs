// ============================================================================
// SheetStore Library
// ============================================================================

pub mod access;
pub mod collection;
pub mod config;
pub mod core;
pub mod sheets;
pub mod storage;
pub mod transaction;
pub mod web;

// Re-export main types for convenience
pub use access::{AccessControl, Actor, GrantTable, Role, SheetPermission, SheetRole};
pub use collection::PositionedCollectionManager;
pub use core::{
    CellValue, ColumnChange, Payload, Position, PositionedRecord, Result, SENTINEL_POSITION,
    Sheet, SheetError, SheetId, SheetSnapshot,
};
pub use sheets::SheetService;
pub use storage::{MemoryStore, RecordStore, StoreTransaction};
pub use transaction::{run_in_transaction, run_read};
pub use web::{AppState, build_router};
