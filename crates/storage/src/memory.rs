use crate::{LineItemStore, MeasurementStore, StorageError, TakeoffData};
use takeoff_model::{
    CostLineItem, DocumentId, LineItemId, Measurement, MeasurementDraft, MeasurementId,
};

/// In-process store, mainly for sessions that do not outlive the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: TakeoffData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MeasurementStore for MemoryStore {
    fn save(
        &mut self,
        document_id: DocumentId,
        draft: &MeasurementDraft,
    ) -> Result<MeasurementId, StorageError> {
        Ok(self.data.insert_measurement(document_id, draft))
    }

    fn load(
        &self,
        document_id: DocumentId,
        page_number: u32,
    ) -> Result<Vec<Measurement>, StorageError> {
        Ok(self.data.measurements_on_page(document_id, page_number))
    }

    fn load_document(&self, document_id: DocumentId) -> Result<Vec<Measurement>, StorageError> {
        Ok(self.data.measurements_in_document(document_id))
    }

    fn find(&self, measurement_id: MeasurementId) -> Result<Option<Measurement>, StorageError> {
        Ok(self.data.measurement(measurement_id).cloned())
    }

    fn link(
        &mut self,
        measurement_id: MeasurementId,
        line_item_id: LineItemId,
    ) -> Result<(), StorageError> {
        self.data.link(measurement_id, line_item_id)
    }

    fn delete(&mut self, measurement_id: MeasurementId) -> Result<(), StorageError> {
        self.data.delete(measurement_id).map(|_| ())
    }
}

impl LineItemStore for MemoryStore {
    fn insert_line_item(&mut self, item: CostLineItem) -> Result<LineItemId, StorageError> {
        self.data.insert_line_item(item)
    }

    fn line_items(&self, document_id: DocumentId) -> Result<Vec<CostLineItem>, StorageError> {
        Ok(self.data.line_items(document_id))
    }

    fn record_actual(
        &mut self,
        line_item_id: LineItemId,
        amount: f64,
    ) -> Result<CostLineItem, StorageError> {
        self.data.record_actual(line_item_id, amount)
    }
}
