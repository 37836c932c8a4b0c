//! Takeoff session
//!
//! One document being measured: pointer input goes through the capture
//! machine, finalized shapes are persisted, and the user is prompted to fold
//! the quantity into a cost line item. Prompts are answered by a [`Prompter`].

use std::collections::VecDeque;
use takeoff_model::{
    render_draft, render_page, render_preview, CalibrationError, CalibrationScale, Capture,
    CaptureError, CaptureOutcome, CostItemRequest, CostLineItem, DisplayScale, DocumentId,
    EstimateError, LineItemId, Measurement, MeasurementDraft, MeasurementId, MeasurementKind,
    Preferences, RenderOptions, RenderedShape, Tool, ViewPoint, MAX_DISPLAY_PRECISION,
};
use takeoff_storage::{LineItemStore, MeasurementStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("calibration rejected: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error("measurement {0} not found")]
    MeasurementNotFound(MeasurementId),
}

/// Answers the questions a session asks while a gesture completes
pub trait Prompter {
    /// Real-world length in feet of the calibration reference; `None` cancels
    fn calibration_distance(&mut self, pixel_distance: f64) -> Option<String>;

    fn note_label(&mut self) -> Option<String>;

    /// Offered for every finalized non-note shape; `None` declines
    fn cost_item(&mut self, draft: &MeasurementDraft) -> Option<CostItemRequest>;
}

/// Prompter that answers from queued responses and declines once they run out
#[derive(Debug, Default, Clone)]
pub struct ScriptedPrompter {
    pub distances: VecDeque<String>,
    pub labels: VecDeque<String>,
    pub cost_items: VecDeque<CostItemRequest>,
}

impl Prompter for ScriptedPrompter {
    fn calibration_distance(&mut self, _pixel_distance: f64) -> Option<String> {
        self.distances.pop_front()
    }

    fn note_label(&mut self) -> Option<String> {
        self.labels.pop_front()
    }

    fn cost_item(&mut self, _draft: &MeasurementDraft) -> Option<CostItemRequest> {
        self.cost_items.pop_front()
    }
}

/// What a pointer event led to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Ignored,
    Pending,
    Calibrated(CalibrationScale),
    CalibrationCancelled,
    Saved { measurement: Measurement, line_item: Option<CostLineItem> },
    Discarded { vertices: usize },
}

pub struct TakeoffSession<S> {
    store: S,
    document_id: DocumentId,
    capture: Capture,
    zoom: DisplayScale,
    precision: usize,
    highlight: Option<MeasurementId>,
    unsaved: Option<MeasurementDraft>,
}

impl<S> TakeoffSession<S>
where
    S: MeasurementStore + LineItemStore,
{
    pub fn new(store: S, document_id: DocumentId, page_number: u32) -> Result<Self, SessionError> {
        Ok(Self {
            store,
            document_id,
            capture: Capture::new(page_number)?,
            zoom: DisplayScale::ACTUAL_SIZE,
            precision: Preferences::default().display_precision,
            highlight: None,
            unsaved: None,
        })
    }

    pub fn with_preferences(mut self, preferences: &Preferences) -> Self {
        self.precision = preferences.display_precision.min(MAX_DISPLAY_PRECISION);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn page_number(&self) -> u32 {
        self.capture.page_number()
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn calibration(&self) -> Option<CalibrationScale> {
        self.capture.calibration()
    }

    pub fn zoom(&self) -> DisplayScale {
        self.zoom
    }

    /// Finalized shape whose save failed; shown until the next gesture starts
    pub fn unsaved(&self) -> Option<&MeasurementDraft> {
        self.unsaved.as_ref()
    }

    pub fn select_tool(&mut self, tool: Tool) -> Result<(), SessionError> {
        self.capture.select_tool(tool)?;
        self.unsaved = None;
        tracing::debug!(%tool, "tool selected");
        Ok(())
    }

    pub fn set_calibration(&mut self, scale: CalibrationScale) {
        self.capture.set_calibration(scale);
    }

    pub fn set_page(&mut self, page_number: u32) -> Result<(), SessionError> {
        self.capture.set_page(page_number)?;
        self.unsaved = None;
        self.highlight = None;
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: DisplayScale) {
        self.zoom = zoom;
    }

    pub fn set_highlight(&mut self, measurement_id: Option<MeasurementId>) {
        self.highlight = measurement_id;
    }

    pub fn click(
        &mut self,
        at: ViewPoint,
        prompter: &mut impl Prompter,
    ) -> Result<SessionEvent, SessionError> {
        if self.capture.state().is_idle() {
            self.unsaved = None;
        }

        let point = self.zoom.to_document(at);
        let outcome = self.capture.click(point)?;
        self.handle(outcome, prompter)
    }

    pub fn double_click(&mut self, prompter: &mut impl Prompter) -> Result<SessionEvent, SessionError> {
        let outcome = self.capture.double_click()?;
        self.handle(outcome, prompter)
    }

    fn handle(
        &mut self,
        outcome: CaptureOutcome,
        prompter: &mut impl Prompter,
    ) -> Result<SessionEvent, SessionError> {
        match outcome {
            CaptureOutcome::Ignored => Ok(SessionEvent::Ignored),
            CaptureOutcome::Pending => Ok(SessionEvent::Pending),
            CaptureOutcome::CalibrationReady { pixel_distance } => {
                let Some(feet) = prompter.calibration_distance(pixel_distance) else {
                    self.capture.cancel_calibration();
                    return Ok(SessionEvent::CalibrationCancelled);
                };

                let scale = self.capture.confirm_calibration(&feet)?;
                tracing::debug!(pixels_per_foot = scale.pixels_per_foot(), "page calibrated");
                Ok(SessionEvent::Calibrated(scale))
            }
            CaptureOutcome::Discarded { vertices } => {
                tracing::debug!(vertices, "area closed with too few vertices, discarded");
                Ok(SessionEvent::Discarded { vertices })
            }
            CaptureOutcome::Finalized(draft) => self.finalize(draft, prompter),
        }
    }

    fn finalize(
        &mut self,
        mut draft: MeasurementDraft,
        prompter: &mut impl Prompter,
    ) -> Result<SessionEvent, SessionError> {
        // The cost item is asked for and checked before the save, so a
        // rejected request leaves nothing behind.
        let request = if draft.kind() == MeasurementKind::Note {
            draft.set_label(prompter.note_label());
            None
        } else {
            prompter.cost_item(&draft)
        };
        if let Some(request) = &request {
            request.validate()?;
        }

        let id = match self.store.save(self.document_id, &draft) {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(%error, kind = %draft.kind(), "measurement was not saved");
                self.unsaved = Some(draft);
                return Err(error.into());
            }
        };

        let mut measurement = draft.into_measurement(id, self.document_id);
        let line_item = match request {
            Some(request) => {
                let item = self.insert_line_item(&measurement, request)?;
                measurement.link_line_item(item.id);
                Some(item)
            }
            None => None,
        };

        Ok(SessionEvent::Saved { measurement, line_item })
    }

    /// "Create cost item from measurement" for an already saved measurement
    pub fn create_line_item(
        &mut self,
        measurement_id: MeasurementId,
        request: CostItemRequest,
    ) -> Result<CostLineItem, SessionError> {
        let measurement = self
            .store
            .find(measurement_id)?
            .ok_or(SessionError::MeasurementNotFound(measurement_id))?;
        self.insert_line_item(&measurement, request)
    }

    fn insert_line_item(
        &mut self,
        measurement: &Measurement,
        request: CostItemRequest,
    ) -> Result<CostLineItem, SessionError> {
        let item = CostLineItem::from_measurement(LineItemId::new_v4(), measurement, request)?;
        self.store.insert_line_item(item.clone())?;
        tracing::debug!(line_item = %item.id, measurement = %measurement.id(), "line item created");
        Ok(item)
    }

    pub fn delete_measurement(&mut self, measurement_id: MeasurementId) -> Result<(), SessionError> {
        self.store.delete(measurement_id)?;
        if self.highlight == Some(measurement_id) {
            self.highlight = None;
        }
        Ok(())
    }

    /// Saved measurements on the current page
    pub fn measurements(&self) -> Result<Vec<Measurement>, SessionError> {
        Ok(self.store.load(self.document_id, self.page_number())?)
    }

    /// Saved shapes, then an unsaved shape, then the gesture in progress
    pub fn render(&self) -> Result<Vec<RenderedShape>, SessionError> {
        let options =
            RenderOptions { zoom: self.zoom, highlight: self.highlight, precision: self.precision };

        let mut shapes = render_page(&self.measurements()?, self.page_number(), &options);
        if let Some(draft) = &self.unsaved {
            shapes.push(render_draft(draft, self.zoom, self.precision));
        }
        if let Some(preview) = render_preview(&self.capture, self.zoom) {
            shapes.push(preview);
        }
        Ok(shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use takeoff_model::{CalibrationScale, LineItemStatus};
    use takeoff_storage::MemoryStore;

    /// Store whose saves can be made to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_saves: bool,
    }

    impl MeasurementStore for FlakyStore {
        fn save(
            &mut self,
            document_id: DocumentId,
            draft: &MeasurementDraft,
        ) -> Result<MeasurementId, StorageError> {
            if self.fail_saves {
                return Err(StorageError::Io(std::io::Error::other("network down")));
            }
            self.inner.save(document_id, draft)
        }

        fn load(&self, document_id: DocumentId, page: u32) -> Result<Vec<Measurement>, StorageError> {
            self.inner.load(document_id, page)
        }

        fn load_document(&self, document_id: DocumentId) -> Result<Vec<Measurement>, StorageError> {
            self.inner.load_document(document_id)
        }

        fn find(&self, id: MeasurementId) -> Result<Option<Measurement>, StorageError> {
            self.inner.find(id)
        }

        fn link(&mut self, id: MeasurementId, item: LineItemId) -> Result<(), StorageError> {
            self.inner.link(id, item)
        }

        fn delete(&mut self, id: MeasurementId) -> Result<(), StorageError> {
            self.inner.delete(id)
        }
    }

    impl LineItemStore for FlakyStore {
        fn insert_line_item(&mut self, item: CostLineItem) -> Result<LineItemId, StorageError> {
            self.inner.insert_line_item(item)
        }

        fn line_items(&self, document_id: DocumentId) -> Result<Vec<CostLineItem>, StorageError> {
            self.inner.line_items(document_id)
        }

        fn record_actual(&mut self, id: LineItemId, amount: f64) -> Result<CostLineItem, StorageError> {
            self.inner.record_actual(id, amount)
        }
    }

    fn v(x: f64, y: f64) -> ViewPoint {
        ViewPoint::new(x, y)
    }

    fn session() -> TakeoffSession<MemoryStore> {
        TakeoffSession::new(MemoryStore::new(), DocumentId(1), 1).expect("session")
    }

    fn saved(event: SessionEvent) -> (Measurement, Option<CostLineItem>) {
        match event {
            SessionEvent::Saved { measurement, line_item } => (measurement, line_item),
            other => panic!("expected a saved measurement, got {other:?}"),
        }
    }

    fn calibrate(session: &mut TakeoffSession<impl MeasurementStore + LineItemStore>, feet: &str) {
        let mut prompter = ScriptedPrompter::default();
        prompter.distances.push_back(feet.to_owned());
        session.select_tool(Tool::Scale).expect("scale tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("first point");
        session.click(v(100.0, 0.0), &mut prompter).expect("second point");
    }

    #[test]
    fn calibrate_then_measure_linear() {
        let mut session = session();
        calibrate(&mut session, "10");
        assert_eq!(session.calibration().map(CalibrationScale::pixels_per_foot), Some(10.0));

        let mut prompter = ScriptedPrompter::default();
        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let (measurement, line_item) =
            saved(session.click(v(30.0, 40.0), &mut prompter).expect("end"));

        assert_eq!(measurement.value(), 5.0);
        assert_eq!(line_item, None);
        assert_eq!(measurement.linked_line_item_id(), None);
        assert_eq!(session.measurements().expect("load"), vec![measurement]);
    }

    #[test]
    fn rejected_distance_keeps_previous_scale() {
        let mut session = session();
        calibrate(&mut session, "10");

        let mut prompter = ScriptedPrompter::default();
        prompter.distances.push_back("-3".to_owned());
        session.click(v(0.0, 0.0), &mut prompter).expect("first point");
        let result = session.click(v(0.0, 50.0), &mut prompter);

        assert!(matches!(
            result,
            Err(SessionError::Calibration(CalibrationError::NonPositive(_)))
        ));
        assert_eq!(session.calibration().map(CalibrationScale::pixels_per_foot), Some(10.0));
    }

    #[test]
    fn cancelled_distance_prompt() {
        let mut session = session();
        let mut prompter = ScriptedPrompter::default();
        session.select_tool(Tool::Scale).expect("scale tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("first point");

        assert_eq!(
            session.click(v(10.0, 0.0), &mut prompter).expect("second point"),
            SessionEvent::CalibrationCancelled
        );
        assert_eq!(session.calibration(), None);
        assert!(session.capture().state().is_idle());
    }

    #[test]
    fn recalibration_does_not_change_saved_values() {
        let mut session = session();
        session.set_calibration(CalibrationScale::new(10.0).expect("scale"));

        let mut prompter = ScriptedPrompter::default();
        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let (first, _) = saved(session.click(v(200.0, 0.0), &mut prompter).expect("end"));
        assert_eq!(first.value(), 20.0);

        calibrate(&mut session, "5");
        assert_eq!(session.calibration().map(CalibrationScale::pixels_per_foot), Some(20.0));

        let stored = session.measurements().expect("load");
        assert_eq!(stored[0].value(), 20.0);
        assert_eq!(stored[0].scale().pixels_per_foot(), 10.0);
    }

    #[test]
    fn area_with_two_vertices_saves_nothing() {
        let mut session = session();
        session.set_calibration(CalibrationScale::NEUTRAL);
        let mut prompter = ScriptedPrompter::default();

        session.select_tool(Tool::Area).expect("area tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("click");
        session.click(v(4.0, 0.0), &mut prompter).expect("click");

        assert_eq!(
            session.double_click(&mut prompter).expect("double click"),
            SessionEvent::Discarded { vertices: 2 }
        );
        assert!(session.measurements().expect("load").is_empty());
    }

    #[test]
    fn count_markers_with_cost_item() {
        let mut session = session();
        let mut prompter = ScriptedPrompter::default();
        prompter.cost_items.push_back(CostItemRequest {
            category: "Electrical".to_owned(),
            description: Some("Duplex outlets".to_owned()),
            unit_cost: 45.0,
            status: LineItemStatus::Draft,
        });

        session.select_tool(Tool::Count).expect("count tool");
        for i in 0..4 {
            session.click(v(f64::from(i) * 12.0, 8.0), &mut prompter).expect("marker");
        }
        let (measurement, line_item) =
            saved(session.double_click(&mut prompter).expect("double click"));
        let line_item = line_item.expect("line item created");

        assert_eq!(measurement.value(), 4.0);
        assert_eq!(measurement.linked_line_item_id(), Some(line_item.id));
        assert_eq!(line_item.estimated_cost(), 180.0);

        let stored = session.measurements().expect("load");
        assert_eq!(stored[0].linked_line_item_id(), Some(line_item.id));
        let items = session.store().line_items(DocumentId(1)).expect("line items");
        assert_eq!(items[0].measurement_id, Some(measurement.id()));
    }

    #[test]
    fn rejected_cost_item_saves_nothing() {
        let mut session = session();
        session.set_calibration(CalibrationScale::NEUTRAL);
        let mut prompter = ScriptedPrompter::default();
        prompter.cost_items.push_back(CostItemRequest {
            category: "Framing".to_owned(),
            description: None,
            unit_cost: -5.0,
            status: LineItemStatus::Draft,
        });

        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let result = session.click(v(3.0, 4.0), &mut prompter);

        assert!(matches!(
            result,
            Err(SessionError::Estimate(EstimateError::InvalidUnitCost(_)))
        ));
        assert!(session.measurements().expect("load").is_empty());
        assert!(session.store().line_items(DocumentId(1)).expect("line items").is_empty());
    }

    #[test]
    fn tool_switch_abandons_area_in_progress() {
        let mut session = session();
        session.set_calibration(CalibrationScale::NEUTRAL);
        let mut prompter = ScriptedPrompter::default();

        session.select_tool(Tool::Area).expect("area tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("click");
        session.click(v(5.0, 0.0), &mut prompter).expect("click");

        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let (linear, _) = saved(session.click(v(0.0, 3.0), &mut prompter).expect("end"));

        let stored = session.measurements().expect("load");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), linear.id());
        assert_eq!(stored[0].kind(), MeasurementKind::Linear);
    }

    #[test]
    fn note_takes_label_from_prompt() {
        let mut session = session();
        let mut prompter = ScriptedPrompter::default();
        prompter.labels.push_back("Verify header size".to_owned());

        session.select_tool(Tool::Note).expect("note tool");
        let (note, line_item) = saved(session.click(v(40.0, 40.0), &mut prompter).expect("click"));

        assert_eq!(note.label(), Some("Verify header size"));
        assert_eq!(note.value(), 0.0);
        assert_eq!(line_item, None);
    }

    #[test]
    fn zoomed_clicks_are_stored_in_document_space() {
        let mut session = session();
        session.set_calibration(CalibrationScale::NEUTRAL);
        session.set_zoom(DisplayScale::new(2.0));
        let mut prompter = ScriptedPrompter::default();

        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let (linear, _) = saved(session.click(v(60.0, 80.0), &mut prompter).expect("end"));

        assert_eq!(linear.value(), 50.0);
        let shapes = session.render().expect("render");
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].label_anchor, v(30.0, 40.0));
    }

    #[test]
    fn failed_save_keeps_unsaved_shape_visible() {
        let store = FlakyStore { fail_saves: true, ..FlakyStore::default() };
        let mut session = TakeoffSession::new(store, DocumentId(1), 1).expect("session");
        session.set_calibration(CalibrationScale::NEUTRAL);
        let mut prompter = ScriptedPrompter::default();

        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let result = session.click(v(3.0, 4.0), &mut prompter);

        assert!(matches!(result, Err(SessionError::Storage(_))));
        assert!(session.measurements().expect("load").is_empty());
        assert_eq!(session.unsaved().map(MeasurementDraft::value), Some(5.0));

        let shapes = session.render().expect("render");
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].measurement_id, None);
        assert_eq!(shapes[0].label, "5.00 LF");

        session.click(v(10.0, 10.0), &mut prompter).expect("next gesture");
        assert!(session.unsaved().is_none());
    }

    #[test]
    fn delete_clears_highlight_and_line_item_link() {
        let mut session = session();
        session.set_calibration(CalibrationScale::NEUTRAL);
        let mut prompter = ScriptedPrompter::default();

        session.select_tool(Tool::Linear).expect("linear tool");
        session.click(v(0.0, 0.0), &mut prompter).expect("start");
        let (linear, _) = saved(session.click(v(0.0, 8.0), &mut prompter).expect("end"));

        let item = session
            .create_line_item(
                linear.id(),
                CostItemRequest {
                    category: "Trim".to_owned(),
                    description: None,
                    unit_cost: 2.0,
                    status: LineItemStatus::Final,
                },
            )
            .expect("line item");
        session.set_highlight(Some(linear.id()));
        assert!(session.render().expect("render")[0].highlighted);

        session.delete_measurement(linear.id()).expect("delete");
        assert!(session.render().expect("render").is_empty());

        let items = session.store().line_items(DocumentId(1)).expect("line items");
        assert_eq!(items[0].id, item.id);
        assert_eq!(items[0].measurement_id, None);
    }
}
