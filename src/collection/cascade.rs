//! Cascade planning.
//!
//! Each planner takes the current records of a collection (ascending by
//! position, as the store returns them) and returns the position updates to
//! issue, already in an order where every update targets a free slot:
//!
//! - insert at `p`: records at `>= p` move up by one, highest first;
//! - delete at `p`: records at `> p` move down by one, lowest first;
//! - move `s -> t`: the source is parked at the sentinel first (not part of
//!   the plan), then the records between walk one step towards the freed
//!   slot, starting next to it.

use crate::core::{Position, PositionedRecord, RecordId, Result, SheetError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub record: RecordId,
    pub from: Position,
    pub to: Position,
}

/// Checks that positions are exactly `0..n` with no duplicates.
pub fn ensure_dense(records: &[PositionedRecord]) -> Result<()> {
    for (expected, record) in records.iter().enumerate() {
        if record.position != expected as Position {
            return Err(SheetError::ConstraintViolation(format!(
                "{} is not densely positioned: found {} at rank {}",
                record.collection_id, record.position, expected
            )));
        }
    }
    Ok(())
}

pub fn plan_insert(records: &[PositionedRecord], at: Position) -> Vec<Shift> {
    records
        .iter()
        .rev()
        .filter(|r| r.position >= at)
        .map(|r| Shift {
            record: r.id,
            from: r.position,
            to: r.position + 1,
        })
        .collect()
}

pub fn plan_delete(records: &[PositionedRecord], removed: Position) -> Vec<Shift> {
    records
        .iter()
        .filter(|r| r.position > removed)
        .map(|r| Shift {
            record: r.id,
            from: r.position,
            to: r.position - 1,
        })
        .collect()
}

/// Shifts for the records strictly between `source` and `target` (target
/// inclusive). The source record itself is not part of the plan.
pub fn plan_move(records: &[PositionedRecord], source: Position, target: Position) -> Vec<Shift> {
    if source < target {
        records
            .iter()
            .filter(|r| r.position > source && r.position <= target)
            .map(|r| Shift {
                record: r.id,
                from: r.position,
                to: r.position - 1,
            })
            .collect()
    } else if source > target {
        records
            .iter()
            .rev()
            .filter(|r| r.position >= target && r.position < source)
            .map(|r| Shift {
                record: r.id,
                from: r.position,
                to: r.position + 1,
            })
            .collect()
    } else {
        Vec::new()
    }
}
