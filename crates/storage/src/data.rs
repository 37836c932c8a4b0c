use crate::StorageError;
use serde::{Deserialize, Serialize};
use takeoff_model::{
    CostLineItem, DocumentId, LineItemId, Measurement, MeasurementDraft, MeasurementId,
};

/// Everything a store persists, shared by the file and in-memory backends
///
/// Records keep their save order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TakeoffData {
    #[serde(default)]
    measurements: Vec<Measurement>,
    #[serde(default)]
    line_items: Vec<CostLineItem>,
}

impl TakeoffData {
    pub fn insert_measurement(
        &mut self,
        document_id: DocumentId,
        draft: &MeasurementDraft,
    ) -> MeasurementId {
        let id = MeasurementId::new_v4();
        self.measurements.push(draft.clone().into_measurement(id, document_id));
        id
    }

    pub fn measurements_on_page(&self, document_id: DocumentId, page_number: u32) -> Vec<Measurement> {
        self.measurements
            .iter()
            .filter(|m| m.document_id() == document_id && m.page_number() == page_number)
            .cloned()
            .collect()
    }

    pub fn measurements_in_document(&self, document_id: DocumentId) -> Vec<Measurement> {
        self.measurements.iter().filter(|m| m.document_id() == document_id).cloned().collect()
    }

    pub fn measurement(&self, measurement_id: MeasurementId) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.id() == measurement_id)
    }

    pub fn all_measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Record the association on both the measurement and the line item
    pub fn link(
        &mut self,
        measurement_id: MeasurementId,
        line_item_id: LineItemId,
    ) -> Result<(), StorageError> {
        let measurement = self
            .measurements
            .iter_mut()
            .find(|m| m.id() == measurement_id)
            .ok_or(StorageError::MeasurementNotFound(measurement_id))?;
        let item = self
            .line_items
            .iter_mut()
            .find(|item| item.id == line_item_id)
            .ok_or(StorageError::LineItemNotFound(line_item_id))?;

        if let Some(existing) = measurement.linked_line_item_id() {
            if existing != line_item_id {
                return Err(StorageError::AlreadyLinked { measurement_id, line_item_id: existing });
            }
        }
        if item.document_id != measurement.document_id() {
            return Err(StorageError::DocumentMismatch { measurement_id, line_item_id });
        }
        if item.measurement_id.is_some_and(|linked| linked != measurement_id) {
            return Err(StorageError::LineItemTaken(line_item_id));
        }

        measurement.link_line_item(line_item_id);
        item.measurement_id = Some(measurement_id);
        Ok(())
    }

    /// Remove a measurement and clear any line item pointing at it
    pub fn delete(&mut self, measurement_id: MeasurementId) -> Result<Measurement, StorageError> {
        let index = self
            .measurements
            .iter()
            .position(|m| m.id() == measurement_id)
            .ok_or(StorageError::MeasurementNotFound(measurement_id))?;
        let removed = self.measurements.remove(index);

        for item in &mut self.line_items {
            if item.measurement_id == Some(measurement_id) {
                item.measurement_id = None;
            }
        }

        Ok(removed)
    }

    /// Add a line item; one that names a measurement is linked to it in the same step
    pub fn insert_line_item(&mut self, mut item: CostLineItem) -> Result<LineItemId, StorageError> {
        let id = item.id;
        let measurement_id = item.measurement_id.take();
        self.line_items.push(item);

        if let Some(measurement_id) = measurement_id {
            if let Err(error) = self.link(measurement_id, id) {
                self.line_items.pop();
                return Err(error);
            }
        }

        Ok(id)
    }

    pub fn line_items(&self, document_id: DocumentId) -> Vec<CostLineItem> {
        self.line_items.iter().filter(|item| item.document_id == document_id).cloned().collect()
    }

    pub fn record_actual(
        &mut self,
        line_item_id: LineItemId,
        amount: f64,
    ) -> Result<CostLineItem, StorageError> {
        let item = self
            .line_items
            .iter_mut()
            .find(|item| item.id == line_item_id)
            .ok_or(StorageError::LineItemNotFound(line_item_id))?;
        item.record_actual(amount)?;
        Ok(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use takeoff_model::{
        CalibrationScale, CostItemRequest, DocumentPoint, LineItemStatus, MeasurementKind,
    };

    fn linear_draft(page_number: u32) -> MeasurementDraft {
        MeasurementDraft::new(
            MeasurementKind::Linear,
            vec![DocumentPoint::new(0.0, 0.0), DocumentPoint::new(30.0, 40.0)],
            CalibrationScale::new(10.0).expect("scale"),
            page_number,
        )
        .expect("draft")
    }

    fn line_item_for(data: &TakeoffData, measurement_id: MeasurementId) -> CostLineItem {
        let measurement = data.measurement(measurement_id).expect("measurement exists");
        CostLineItem::from_measurement(
            LineItemId::new_v4(),
            measurement,
            CostItemRequest {
                category: "Framing".to_owned(),
                description: None,
                unit_cost: 3.0,
                status: LineItemStatus::Draft,
            },
        )
        .expect("line item")
    }

    #[test]
    fn load_filters_by_document_and_page() {
        let mut data = TakeoffData::default();
        let first = data.insert_measurement(DocumentId(1), &linear_draft(1));
        data.insert_measurement(DocumentId(1), &linear_draft(2));
        data.insert_measurement(DocumentId(2), &linear_draft(1));
        let second = data.insert_measurement(DocumentId(1), &linear_draft(1));

        let page: Vec<_> =
            data.measurements_on_page(DocumentId(1), 1).iter().map(Measurement::id).collect();
        assert_eq!(page, vec![first, second]);
        assert_eq!(data.measurements_in_document(DocumentId(1)).len(), 3);
    }

    #[test]
    fn link_sets_both_sides_once() {
        let mut data = TakeoffData::default();
        let measurement_id = data.insert_measurement(DocumentId(1), &linear_draft(1));
        let mut item = line_item_for(&data, measurement_id);
        item.measurement_id = None;
        let item_id = data.insert_line_item(item).expect("insert");
        assert_eq!(data.line_items(DocumentId(1))[0].measurement_id, None);

        data.link(measurement_id, item_id).expect("link");
        assert_eq!(
            data.measurement(measurement_id).and_then(Measurement::linked_line_item_id),
            Some(item_id)
        );
        assert_eq!(data.line_items(DocumentId(1))[0].measurement_id, Some(measurement_id));

        let mut other = line_item_for(&data, measurement_id);
        other.measurement_id = None;
        let other_id = data.insert_line_item(other).expect("insert");
        assert!(matches!(
            data.link(measurement_id, other_id),
            Err(StorageError::AlreadyLinked { .. })
        ));
    }

    #[test]
    fn inserting_item_for_measurement_links_it() {
        let mut data = TakeoffData::default();
        let measurement_id = data.insert_measurement(DocumentId(1), &linear_draft(1));

        let item_id = data.insert_line_item(line_item_for(&data, measurement_id)).expect("insert");
        assert_eq!(
            data.measurement(measurement_id).and_then(Measurement::linked_line_item_id),
            Some(item_id)
        );

        let second = line_item_for(&data, measurement_id);
        assert!(matches!(data.insert_line_item(second), Err(StorageError::AlreadyLinked { .. })));
        assert_eq!(data.line_items(DocumentId(1)).len(), 1);
    }

    #[test]
    fn delete_clears_reverse_reference() {
        let mut data = TakeoffData::default();
        let measurement_id = data.insert_measurement(DocumentId(1), &linear_draft(1));
        let item_id = data.insert_line_item(line_item_for(&data, measurement_id)).expect("insert");

        let removed = data.delete(measurement_id).expect("delete");
        assert_eq!(removed.id(), measurement_id);
        assert!(data.measurement(measurement_id).is_none());
        assert_eq!(data.line_items(DocumentId(1))[0].id, item_id);
        assert_eq!(data.line_items(DocumentId(1))[0].measurement_id, None);

        assert!(matches!(
            data.delete(measurement_id),
            Err(StorageError::MeasurementNotFound(_))
        ));
    }

    #[test]
    fn link_rejects_cross_document_items() {
        let mut data = TakeoffData::default();
        let on_one = data.insert_measurement(DocumentId(1), &linear_draft(1));
        let on_two = data.insert_measurement(DocumentId(2), &linear_draft(1));

        let mut item = line_item_for(&data, on_two);
        item.measurement_id = None;
        let item_id = data.insert_line_item(item).expect("insert");

        assert!(matches!(data.link(on_one, item_id), Err(StorageError::DocumentMismatch { .. })));
    }

    #[test]
    fn record_actual_validates_amount() {
        let mut data = TakeoffData::default();
        let measurement_id = data.insert_measurement(DocumentId(1), &linear_draft(1));
        let item_id = data.insert_line_item(line_item_for(&data, measurement_id)).expect("insert");

        let updated = data.record_actual(item_id, 16.5).expect("actual");
        assert_eq!(updated.actual_cost, Some(16.5));
        assert!(matches!(data.record_actual(item_id, -1.0), Err(StorageError::Estimate(_))));
        assert!(matches!(
            data.record_actual(LineItemId::new_v4(), 1.0),
            Err(StorageError::LineItemNotFound(_))
        ));
    }
}
