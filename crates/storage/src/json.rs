//! Single-file JSON backend
//!
//! Every mutation takes an exclusive lock on a sibling `.lock` file, reads the
//! whole file, applies the change, and replaces the file through a uniquely
//! named temporary sibling. A failed mutation leaves the file untouched, so a
//! delete and its line item cleanup land together or not at all. Readers never
//! lock; the rename keeps every read whole.

use crate::{LineItemStore, MeasurementStore, StorageError, TakeoffData};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use takeoff_model::{
    CostLineItem, DocumentId, LineItemId, Measurement, MeasurementDraft, MeasurementId,
};

const DATA_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DataEnvelope {
    version: u32,
    data: TakeoffData,
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current contents; a missing file is an empty store
    pub fn read(&self) -> Result<TakeoffData, StorageError> {
        if !self.path.exists() {
            return Ok(TakeoffData::default());
        }

        let bytes = fs::read(&self.path)?;
        let envelope: DataEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > DATA_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        for measurement in envelope.data.all_measurements() {
            if !measurement.is_consistent() {
                tracing::warn!(
                    id = %measurement.id(),
                    stored = measurement.value(),
                    recomputed = measurement.recomputed_value(),
                    "stored measurement does not match its geometry"
                );
            }
        }

        Ok(envelope.data)
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn write(&self, data: TakeoffData) -> Result<(), StorageError> {
        let envelope = DataEnvelope { version: DATA_SCHEMA_VERSION, data };

        let mut temp = NamedTempFile::new_in(self.directory())?;
        serde_json::to_writer_pretty(&mut temp, &envelope)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Read, apply, and write back while holding the store's write lock
    fn transact<T>(
        &self,
        apply: impl FnOnce(&mut TakeoffData) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        fs::create_dir_all(self.directory())?;
        let lock_file =
            OpenOptions::new().create(true).truncate(false).write(true).open(self.lock_path())?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write()?;

        let mut data = self.read()?;
        let result = apply(&mut data)?;
        self.write(data)?;
        Ok(result)
    }
}

impl MeasurementStore for JsonStore {
    fn save(
        &mut self,
        document_id: DocumentId,
        draft: &MeasurementDraft,
    ) -> Result<MeasurementId, StorageError> {
        let id = self.transact(|data| Ok(data.insert_measurement(document_id, draft)))?;
        tracing::debug!(%id, document = %document_id, kind = %draft.kind(), "saved measurement");
        Ok(id)
    }

    fn load(
        &self,
        document_id: DocumentId,
        page_number: u32,
    ) -> Result<Vec<Measurement>, StorageError> {
        Ok(self.read()?.measurements_on_page(document_id, page_number))
    }

    fn load_document(&self, document_id: DocumentId) -> Result<Vec<Measurement>, StorageError> {
        Ok(self.read()?.measurements_in_document(document_id))
    }

    fn find(&self, measurement_id: MeasurementId) -> Result<Option<Measurement>, StorageError> {
        Ok(self.read()?.measurement(measurement_id).cloned())
    }

    fn link(
        &mut self,
        measurement_id: MeasurementId,
        line_item_id: LineItemId,
    ) -> Result<(), StorageError> {
        self.transact(|data| data.link(measurement_id, line_item_id))?;
        tracing::debug!(measurement = %measurement_id, line_item = %line_item_id, "linked");
        Ok(())
    }

    fn delete(&mut self, measurement_id: MeasurementId) -> Result<(), StorageError> {
        let removed = self.transact(|data| data.delete(measurement_id))?;
        tracing::debug!(
            id = %measurement_id,
            cleared_link = ?removed.linked_line_item_id(),
            "deleted measurement"
        );
        Ok(())
    }
}

impl LineItemStore for JsonStore {
    fn insert_line_item(&mut self, item: CostLineItem) -> Result<LineItemId, StorageError> {
        self.transact(|data| data.insert_line_item(item))
    }

    fn line_items(&self, document_id: DocumentId) -> Result<Vec<CostLineItem>, StorageError> {
        Ok(self.read()?.line_items(document_id))
    }

    fn record_actual(
        &mut self,
        line_item_id: LineItemId,
        amount: f64,
    ) -> Result<CostLineItem, StorageError> {
        self.transact(|data| data.record_actual(line_item_id, amount))
    }
}
