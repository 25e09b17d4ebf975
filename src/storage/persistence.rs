//! Snapshot persistence for [`MemoryStore`](super::MemoryStore) and the
//! grant table.
//!
//! The whole document is written as one JSON document on every commit. Writes
//! go to a temporary file in the target directory which is then renamed over
//! the previous snapshot, so a crash leaves either the old or the new file.

use super::StoreState;
use crate::core::{PositionedRecord, Result, Sheet, SheetError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub next_sheet_id: u64,
    pub next_record_id: u64,
    pub sheets: Vec<Sheet>,
    pub records: Vec<PositionedRecord>,
}

impl StoreSnapshot {
    pub fn capture(state: &StoreState, next_sheet_id: u64, next_record_id: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            next_sheet_id,
            next_record_id,
            sheets: state.sheets(),
            records: state.all_records(),
        }
    }

    /// Rebuilds the store state and returns it with the next free sheet and
    /// record ids.
    pub fn into_state(self) -> Result<(StoreState, u64, u64)> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SheetError::Storage(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        let state = StoreState::from_parts(self.sheets, self.records)?;
        // Never hand out an id that is already present, whatever the counters say.
        let next_sheet = self.next_sheet_id.max(state.max_sheet_id() + 1);
        let next_record = self.next_record_id.max(state.max_record_id() + 1);
        Ok((state, next_sheet, next_record))
    }
}

/// A JSON document on disk, replaced atomically on every save.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    pub fn save<T: Serialize>(&self, snapshot: &T) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| SheetError::Storage(format!("failed to replace snapshot: {}", e)))?;
        Ok(())
    }
}
