use crate::core::{
    Payload, Position, PositionedRecord, RecordId, Result, Sheet, SheetError, SheetId,
};
use chrono::{DateTime, Utc};
use im::OrdMap;

/// Committed (or in-flight working) contents of a [`MemoryStore`](super::MemoryStore).
///
/// Backed by persistent maps, so cloning is O(1) and a transaction can work
/// on its own copy without disturbing readers of the committed one.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    sheets: OrdMap<SheetId, Sheet>,
    records: OrdMap<RecordId, PositionedRecord>,
    /// Unique index over `(collection, position)`.
    positions: OrdMap<(SheetId, Position), RecordId>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a state from plain rows, checking the position index as it goes.
    pub fn from_parts(sheets: Vec<Sheet>, records: Vec<PositionedRecord>) -> Result<Self> {
        let mut state = Self::new();
        for sheet in sheets {
            state.sheets.insert(sheet.id, sheet);
        }
        for record in records {
            if !state.sheets.contains_key(&record.collection_id) {
                return Err(SheetError::ConstraintViolation(format!(
                    "{} references missing {}",
                    record.id, record.collection_id
                )));
            }
            state.check_position_free(record.collection_id, record.position, None)?;
            state
                .positions
                .insert((record.collection_id, record.position), record.id);
            state.records.insert(record.id, record);
        }
        Ok(state)
    }

    pub fn sheet(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.get(&id)
    }

    pub fn sheets(&self) -> Vec<Sheet> {
        self.sheets.values().cloned().collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn max_sheet_id(&self) -> u64 {
        self.sheets.get_max().map(|(id, _)| id.0).unwrap_or(0)
    }

    pub fn max_record_id(&self) -> u64 {
        self.records.get_max().map(|(id, _)| id.0).unwrap_or(0)
    }

    pub fn all_records(&self) -> Vec<PositionedRecord> {
        self.records.values().cloned().collect()
    }

    pub fn insert_sheet(&mut self, sheet: Sheet) {
        self.sheets.insert(sheet.id, sheet);
    }

    pub fn rename_sheet(&mut self, id: SheetId, name: &str, now: DateTime<Utc>) -> Result<Sheet> {
        let sheet = self
            .sheets
            .get_mut(&id)
            .ok_or_else(|| SheetError::not_found(id.to_string()))?;
        sheet.name = name.to_string();
        sheet.updated_at = now;
        Ok(sheet.clone())
    }

    pub fn set_columns(
        &mut self,
        id: SheetId,
        columns: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Sheet> {
        let sheet = self
            .sheets
            .get_mut(&id)
            .ok_or_else(|| SheetError::not_found(id.to_string()))?;
        sheet.columns = columns;
        sheet.updated_at = now;
        Ok(sheet.clone())
    }

    /// Drops a sheet with its records. Returns how many records went with it.
    pub fn remove_sheet(&mut self, id: SheetId) -> Result<usize> {
        if self.sheets.remove(&id).is_none() {
            return Err(SheetError::not_found(id.to_string()));
        }
        let keys: Vec<(SheetId, Position)> = self
            .positions
            .range((id, Position::MIN)..=(id, Position::MAX))
            .map(|(key, _)| *key)
            .collect();
        for key in &keys {
            if let Some(record_id) = self.positions.remove(key) {
                self.records.remove(&record_id);
            }
        }
        Ok(keys.len())
    }

    /// Records of one collection in ascending position order. A record parked
    /// at the sentinel sorts first.
    pub fn records_in(&self, id: SheetId) -> Vec<PositionedRecord> {
        self.positions
            .range((id, Position::MIN)..=(id, Position::MAX))
            .filter_map(|(_, record_id)| self.records.get(record_id).cloned())
            .collect()
    }

    pub fn record_at(&self, id: SheetId, position: Position) -> Option<PositionedRecord> {
        self.positions
            .get(&(id, position))
            .and_then(|record_id| self.records.get(record_id).cloned())
    }

    pub fn record(&self, id: RecordId) -> Option<&PositionedRecord> {
        self.records.get(&id)
    }

    pub fn insert_record(&mut self, record: PositionedRecord) -> Result<PositionedRecord> {
        if !self.sheets.contains_key(&record.collection_id) {
            return Err(SheetError::not_found(record.collection_id.to_string()));
        }
        self.check_position_free(record.collection_id, record.position, None)?;
        self.positions
            .insert((record.collection_id, record.position), record.id);
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn set_position(
        &mut self,
        id: RecordId,
        position: Position,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (collection, old_position) = match self.records.get(&id) {
            Some(record) => (record.collection_id, record.position),
            None => return Err(SheetError::not_found(id.to_string())),
        };
        if old_position == position {
            return Ok(());
        }
        self.check_position_free(collection, position, Some(id))?;

        self.positions.remove(&(collection, old_position));
        self.positions.insert((collection, position), id);
        if let Some(record) = self.records.get_mut(&id) {
            record.position = position;
            record.updated_at = now;
        }
        Ok(())
    }

    pub fn set_payload(&mut self, id: RecordId, payload: Payload, now: DateTime<Utc>) -> Result<()> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| SheetError::not_found(id.to_string()))?;
        record.payload = payload;
        record.updated_at = now;
        Ok(())
    }

    pub fn remove_record(&mut self, id: RecordId) -> Result<PositionedRecord> {
        let record = self
            .records
            .remove(&id)
            .ok_or_else(|| SheetError::not_found(id.to_string()))?;
        self.positions.remove(&(record.collection_id, record.position));
        Ok(record)
    }

    fn check_position_free(
        &self,
        collection: SheetId,
        position: Position,
        exclude: Option<RecordId>,
    ) -> Result<()> {
        match self.positions.get(&(collection, position)) {
            Some(holder) if Some(*holder) != exclude => {
                Err(SheetError::ConstraintViolation(format!(
                    "position {} of {} is already held by {}",
                    position, collection, holder
                )))
            }
            _ => Ok(()),
        }
    }
}
