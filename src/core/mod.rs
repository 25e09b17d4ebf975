pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, SheetError};
pub use types::{
    ColumnChange, Payload, Position, PositionedRecord, RecordId, SENTINEL_POSITION, Sheet,
    SheetId, SheetSnapshot,
};
pub use value::CellValue;
