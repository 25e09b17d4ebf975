//! Ordered collections of positioned records.
//!
//! [`PositionedCollectionManager`] keeps the rows of every sheet densely
//! ranked `0..n` with unique positions. Each operation reads the collection,
//! plans its cascade and applies it inside one store transaction, so either
//! every position update commits or none does.
//!
//! The manager holds no lock of its own. Two operations on the same sheet
//! are only as isolated as the store's transactions make them; see
//! [`RecordStore`].

pub mod cascade;
pub mod columns;

use crate::core::{
    CellValue, ColumnChange, Payload, Position, PositionedRecord, Result, SENTINEL_POSITION, Sheet,
    SheetError, SheetId, SheetSnapshot,
};
use crate::storage::{RecordStore, StoreTransaction};
use crate::transaction::{run_in_transaction, run_read};
use cascade::Shift;
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

#[derive(Clone)]
pub struct PositionedCollectionManager {
    store: Arc<dyn RecordStore>,
}

impl PositionedCollectionManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Rows of `sheet` ordered by position.
    pub async fn list(&self, sheet: SheetId) -> Result<Vec<PositionedRecord>> {
        run_read(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                load_sheet(tx, sheet).await?;
                tx.find_all_by_collection(sheet).await
            })
        })
        .await
    }

    pub async fn snapshot(&self, sheet: SheetId) -> Result<SheetSnapshot> {
        run_read(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let sheet = load_sheet(tx, sheet).await?;
                let rows = tx.find_all_by_collection(sheet.id).await?;
                Ok(SheetSnapshot { sheet, rows })
            })
        })
        .await
    }

    /// Inserts a row at `position`, or appends it when `position` is `None`.
    ///
    /// The new record is created at the sentinel, the tail is shifted up
    /// highest first, then the record is moved into its slot.
    pub async fn insert(
        &self,
        sheet: SheetId,
        payload: Payload,
        position: Option<Position>,
    ) -> Result<PositionedRecord> {
        if let Some(requested) = position {
            reject_negative("position", requested)?;
        }
        let span = info_span!("collection.insert", sheet = %sheet, position = ?position);

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let meta = load_sheet(tx, sheet).await?;
                check_payload(&meta, &payload)?;
                let rows = load_rows(tx, sheet).await?;
                let n = rows.len() as Position;
                let at = position.unwrap_or(n);
                if at > n {
                    return Err(SheetError::out_of_range("position", at, n));
                }

                if at == n {
                    return tx.create_record(sheet, at, payload).await;
                }

                let created = tx.create_record(sheet, SENTINEL_POSITION, payload).await?;
                apply_shifts(tx, &cascade::plan_insert(&rows, at)).await?;
                tx.update_position(created.id, at).await?;
                fetch_at(tx, sheet, at).await
            })
        })
        .instrument(span.clone())
        .await;

        span.in_scope(|| report("insert", result))
    }

    /// Replaces the payload of the row at `position`.
    pub async fn update_payload(
        &self,
        sheet: SheetId,
        position: Position,
        payload: Payload,
    ) -> Result<PositionedRecord> {
        reject_negative("position", position)?;
        let span = info_span!("collection.update_payload", sheet = %sheet, position);

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let meta = load_sheet(tx, sheet).await?;
                check_payload(&meta, &payload)?;
                let rows = load_rows(tx, sheet).await?;
                check_existing("position", position, rows.len())?;
                let record = fetch_at(tx, sheet, position).await?;
                tx.update_payload(record.id, payload).await?;
                fetch_at(tx, sheet, position).await
            })
        })
        .instrument(span.clone())
        .await;

        span.in_scope(|| report("update_payload", result))
    }

    /// Deletes the row at `position` and closes the gap, lowest first.
    /// Returns the deleted record.
    pub async fn delete(&self, sheet: SheetId, position: Position) -> Result<PositionedRecord> {
        reject_negative("position", position)?;
        let span = info_span!("collection.delete", sheet = %sheet, position);

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                load_sheet(tx, sheet).await?;
                let rows = load_rows(tx, sheet).await?;
                check_existing("position", position, rows.len())?;
                let record = fetch_at(tx, sheet, position).await?;
                tx.delete_record(record.id).await?;
                apply_shifts(tx, &cascade::plan_delete(&rows, position)).await?;
                Ok(record)
            })
        })
        .instrument(span.clone())
        .await;

        span.in_scope(|| report("delete", result))
    }

    /// Moves the row at `source` to `target` and returns the reordered rows.
    pub async fn move_record(
        &self,
        sheet: SheetId,
        source: Position,
        target: Position,
    ) -> Result<Vec<PositionedRecord>> {
        reject_negative("sourceIndex", source)?;
        reject_negative("targetIndex", target)?;
        let span = info_span!("collection.move", sheet = %sheet, source, target);

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                load_sheet(tx, sheet).await?;
                let rows = load_rows(tx, sheet).await?;
                check_existing("sourceIndex", source, rows.len())?;
                check_existing("targetIndex", target, rows.len())?;
                if source == target {
                    return Ok(rows);
                }

                let moving = fetch_at(tx, sheet, source).await?;
                tx.update_position(moving.id, SENTINEL_POSITION).await?;
                apply_shifts(tx, &cascade::plan_move(&rows, source, target)).await?;
                tx.update_position(moving.id, target).await?;
                tx.find_all_by_collection(sheet).await
            })
        })
        .instrument(span.clone())
        .await;

        span.in_scope(|| report("move", result))
    }

    /// Applies a structural column change to the sheet's column set and to
    /// every row payload in one transaction.
    pub async fn apply_column_change(
        &self,
        sheet: SheetId,
        change: ColumnChange,
    ) -> Result<SheetSnapshot> {
        let span = info_span!("collection.column_change", sheet = %sheet, op = change.name());

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let meta = load_sheet(tx, sheet).await?;
                let width = meta.column_count();
                columns::validate(&change, width)?;

                if change.reshapes_payloads() {
                    let rows = load_rows(tx, sheet).await?;
                    event!(Level::DEBUG, rows = rows.len(), "reshaping row payloads");
                    for row in rows {
                        let payload = columns::apply_to_payload(&row.payload, width, &change)?;
                        tx.update_payload(row.id, payload).await?;
                    }
                }

                let sheet = tx
                    .update_columns(sheet, columns::apply_to_columns(&meta.columns, &change))
                    .await?;
                let rows = tx.find_all_by_collection(sheet.id).await?;
                Ok(SheetSnapshot { sheet, rows })
            })
        })
        .instrument(span.clone())
        .await;

        span.in_scope(|| report("column_change", result))
    }
}

pub(crate) async fn load_sheet(tx: &mut dyn StoreTransaction, sheet: SheetId) -> Result<Sheet> {
    tx.find_sheet(sheet)
        .await?
        .ok_or_else(|| SheetError::not_found(sheet.to_string()))
}

/// Loads the rows and refuses to plan a cascade over a collection that is
/// already broken.
async fn load_rows(tx: &mut dyn StoreTransaction, sheet: SheetId) -> Result<Vec<PositionedRecord>> {
    let rows = tx.find_all_by_collection(sheet).await?;
    cascade::ensure_dense(&rows)?;
    Ok(rows)
}

async fn fetch_at(
    tx: &mut dyn StoreTransaction,
    sheet: SheetId,
    position: Position,
) -> Result<PositionedRecord> {
    tx.find_by_collection_and_position(sheet, position)
        .await?
        .ok_or_else(|| SheetError::not_found(format!("row at position {} of {}", position, sheet)))
}

async fn apply_shifts(tx: &mut dyn StoreTransaction, plan: &[Shift]) -> Result<()> {
    event!(Level::DEBUG, shifts = plan.len(), "applying cascade");
    for shift in plan {
        tx.update_position(shift.record, shift.to).await?;
    }
    Ok(())
}

fn check_payload(sheet: &Sheet, payload: &[CellValue]) -> Result<()> {
    if payload.len() != sheet.column_count() {
        return Err(SheetError::invalid(format!(
            "row has {} cells but {} has {} columns",
            payload.len(),
            sheet.id,
            sheet.column_count()
        )));
    }
    Ok(())
}

fn reject_negative(field: &str, position: Position) -> Result<()> {
    if position < 0 {
        return Err(SheetError::invalid(format!(
            "{} must be non-negative, got {}",
            field, position
        )));
    }
    Ok(())
}

fn check_existing(field: &'static str, position: Position, len: usize) -> Result<()> {
    let max = len as Position - 1;
    if position > max {
        return Err(SheetError::out_of_range(field, position, max));
    }
    Ok(())
}

fn report<T>(op: &'static str, result: Result<T>) -> Result<T> {
    match &result {
        Err(SheetError::ConstraintViolation(msg)) => {
            event!(Level::ERROR, op, error = %msg, "operation aborted by constraint violation");
        }
        Err(err) => event!(Level::DEBUG, op, error = %err, "operation rejected"),
        Ok(_) => event!(Level::DEBUG, op, "operation applied"),
    }
    result
}
