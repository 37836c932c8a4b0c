//! Takeoff persistence
//!
//! The measurement engine talks to storage through [`MeasurementStore`] and
//! [`LineItemStore`]. [`JsonStore`] keeps everything in one JSON file under
//! the data root; [`MemoryStore`] keeps it in process.

mod data;
mod json;
mod memory;

pub use data::TakeoffData;
pub use json::JsonStore;
pub use memory::MemoryStore;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_model::{
    CostLineItem, DocumentId, EstimateError, LineItemId, Measurement, MeasurementDraft,
    MeasurementId, Preferences, MAX_DISPLAY_PRECISION,
};

const PREFS_SCHEMA_VERSION: u32 = 1;

/// Environment variable that overrides the default data root
pub const DATA_DIR_ENV: &str = "TAKEOFF_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported data file version {0}")]
    UnsupportedVersion(u32),
    #[error("measurement {0} not found")]
    MeasurementNotFound(MeasurementId),
    #[error("line item {0} not found")]
    LineItemNotFound(LineItemId),
    #[error("measurement {measurement_id} is already linked to line item {line_item_id}")]
    AlreadyLinked { measurement_id: MeasurementId, line_item_id: LineItemId },
    #[error("line item {0} is already linked to another measurement")]
    LineItemTaken(LineItemId),
    #[error("measurement {measurement_id} and line item {line_item_id} belong to different documents")]
    DocumentMismatch { measurement_id: MeasurementId, line_item_id: LineItemId },
    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

/// Persistence collaborator for measurements
pub trait MeasurementStore {
    /// Persist a finalized draft and return its assigned identifier
    fn save(
        &mut self,
        document_id: DocumentId,
        draft: &MeasurementDraft,
    ) -> Result<MeasurementId, StorageError>;

    /// Measurements saved on one page, in save order
    fn load(
        &self,
        document_id: DocumentId,
        page_number: u32,
    ) -> Result<Vec<Measurement>, StorageError>;

    fn load_document(&self, document_id: DocumentId) -> Result<Vec<Measurement>, StorageError>;

    fn find(&self, measurement_id: MeasurementId) -> Result<Option<Measurement>, StorageError>;

    fn link(
        &mut self,
        measurement_id: MeasurementId,
        line_item_id: LineItemId,
    ) -> Result<(), StorageError>;

    /// Remove a measurement; a linked line item loses its reference in the same write
    fn delete(&mut self, measurement_id: MeasurementId) -> Result<(), StorageError>;
}

/// Persistence collaborator for cost line items
pub trait LineItemStore {
    fn insert_line_item(&mut self, item: CostLineItem) -> Result<LineItemId, StorageError>;

    fn line_items(&self, document_id: DocumentId) -> Result<Vec<CostLineItem>, StorageError>;

    fn record_actual(
        &mut self,
        line_item_id: LineItemId,
        amount: f64,
    ) -> Result<CostLineItem, StorageError>;
}

/// Data root holding the takeoff file and preferences
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: Preferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Takeoff", "Takeoff").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    /// `explicit`, then `TAKEOFF_DATA_DIR`, then the platform data directory
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, StorageError> {
        if let Some(root) = explicit.or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        {
            return Ok(Self::with_root(root));
        }
        Self::from_default_project()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn takeoff_store(&self) -> JsonStore {
        JsonStore::new(self.root.join("takeoff.json"))
    }

    pub fn load_preferences(&self) -> Result<Preferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(Preferences::default());
        }

        let bytes = fs::read(path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }

        let mut preferences = envelope.preferences;
        preferences.display_precision = preferences.display_precision.min(MAX_DISPLAY_PRECISION);
        Ok(preferences)
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        tracing::debug!(root = %self.root.display(), "saved preferences");
        Ok(())
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}
