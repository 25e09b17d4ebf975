use super::CellValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based rank of a record inside its collection.
///
/// Signed so that the store can hold a record at [`SENTINEL_POSITION`]
/// while a cascade is in flight.
pub type Position = i64;

/// Reserved slot a record is parked in while its neighbours shift.
///
/// Never a valid client-visible position, so it cannot collide with a
/// committed record. At most one record per collection holds it at a time.
pub const SENTINEL_POSITION: Position = -1;

/// Identifier of a sheet, which is also the collection id of its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetId(pub u64);

impl SheetId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet_{}", self.0)
    }
}

/// Store-assigned record identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record_{}", self.0)
    }
}

/// Ordered cells of one row.
pub type Payload = Vec<CellValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub id: SheetId,
    pub name: String,
    pub columns: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sheet {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedRecord {
    pub id: RecordId,
    pub collection_id: SheetId,
    pub position: Position,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sheet together with its rows in position order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSnapshot {
    #[serde(flatten)]
    pub sheet: Sheet,
    pub rows: Vec<PositionedRecord>,
}

/// Structural edit of a sheet's column set, mirrored into every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ColumnChange {
    Insert { index: Position, name: String },
    Delete { index: Position },
    Rename { index: Position, name: String },
    Move { source: Position, target: Position },
}

impl ColumnChange {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Delete { .. } => "delete",
            Self::Rename { .. } => "rename",
            Self::Move { .. } => "move",
        }
    }

    /// Whether the change reshapes row payloads (rename only touches metadata).
    pub fn reshapes_payloads(&self) -> bool {
        !matches!(self, Self::Rename { .. })
    }
}
