//! Projection of measurements into view space
//!
//! Stored geometry is in document space. Drawing multiplies each point by the
//! current display zoom; the calibration scale frozen on each measurement only
//! affects its value label.

use crate::capture::{Capture, CaptureState};
use crate::geometry::DocumentPoint;
use crate::measurement::{
    format_value, label_anchor, Measurement, MeasurementDraft, MeasurementId, MeasurementKind,
};
use serde::{Deserialize, Serialize};

const MIN_ZOOM: f64 = 0.1;
const MAX_ZOOM: f64 = 16.0;

/// Display zoom factor: view pixels per document unit
///
/// Deserializing goes through [`DisplayScale::new`], so a stored zoom is
/// clamped like any other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct DisplayScale(f64);

impl DisplayScale {
    pub const ACTUAL_SIZE: DisplayScale = DisplayScale(1.0);

    /// Clamped to 10%..1600%; non-finite input falls back to actual size
    pub fn new(factor: f64) -> Self {
        if !factor.is_finite() {
            return Self::ACTUAL_SIZE;
        }
        Self(factor.clamp(MIN_ZOOM, MAX_ZOOM))
    }

    pub fn from_percent(percent: u16) -> Self {
        Self::new(f64::from(percent) / 100.0)
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    pub fn to_view(self, point: DocumentPoint) -> ViewPoint {
        ViewPoint { x: point.x * self.0, y: point.y * self.0 }
    }

    /// Map a pointer position back into document space
    pub fn to_document(self, point: ViewPoint) -> DocumentPoint {
        DocumentPoint::new(point.x / self.0, point.y / self.0)
    }
}

impl Default for DisplayScale {
    fn default() -> Self {
        Self::ACTUAL_SIZE
    }
}

impl From<f64> for DisplayScale {
    fn from(factor: f64) -> Self {
        Self::new(factor)
    }
}

impl From<DisplayScale> for f64 {
    fn from(zoom: DisplayScale) -> Self {
        zoom.0
    }
}

/// A position in the current view, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPoint {
    pub x: f64,
    pub y: f64,
}

impl ViewPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ShapeGeometry {
    Line { start: ViewPoint, end: ViewPoint },
    /// Closed for saved areas; open while vertices are still being placed
    Polygon { vertices: Vec<ViewPoint>, closed: bool },
    Markers { points: Vec<ViewPoint> },
    Pin { position: ViewPoint },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedShape {
    /// `None` for shapes that are not persisted
    pub measurement_id: Option<MeasurementId>,
    /// `None` while calibrating
    pub kind: Option<MeasurementKind>,
    /// Points already multiplied by the display zoom
    pub geometry: ShapeGeometry,
    /// Formatted value ("12.50 LF", "4 EA") or the note text
    pub label: String,
    pub label_anchor: ViewPoint,
    /// At most one shape per page is highlighted
    pub highlighted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub zoom: DisplayScale,
    /// Measurement drawn with the highlight style
    pub highlight: Option<MeasurementId>,
    /// Decimal places in linear and area labels
    pub precision: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { zoom: DisplayScale::ACTUAL_SIZE, highlight: None, precision: 2 }
    }
}

/// Shapes for every saved measurement on `page_number`, in input order
pub fn render_page(
    measurements: &[Measurement],
    page_number: u32,
    options: &RenderOptions,
) -> Vec<RenderedShape> {
    measurements
        .iter()
        .filter(|m| m.page_number() == page_number)
        .map(|m| RenderedShape {
            measurement_id: Some(m.id()),
            kind: Some(m.kind()),
            geometry: finished_geometry(m.kind(), m.points(), options.zoom),
            label: m.formatted_value(options.precision),
            label_anchor: options.zoom.to_view(m.label_anchor()),
            highlighted: options.highlight == Some(m.id()),
        })
        .collect()
}

/// Shape for a finalized draft whose save did not go through
pub fn render_draft(draft: &MeasurementDraft, zoom: DisplayScale, precision: usize) -> RenderedShape {
    let anchor = label_anchor(draft.kind(), draft.points());
    RenderedShape {
        measurement_id: None,
        kind: Some(draft.kind()),
        geometry: finished_geometry(draft.kind(), draft.points(), zoom),
        label: format_value(draft.kind(), draft.value(), draft.label(), precision),
        label_anchor: zoom.to_view(anchor),
        highlighted: false,
    }
}

/// Rubber-band shape for the gesture in progress
pub fn render_preview(capture: &Capture, zoom: DisplayScale) -> Option<RenderedShape> {
    let points: Vec<ViewPoint> =
        capture.state().points().into_iter().map(|p| zoom.to_view(p)).collect();
    let anchor = *points.last()?;

    let (kind, geometry) = match capture.state() {
        CaptureState::Idle => return None,
        CaptureState::ConfirmingCalibration { start, end, .. } => {
            (None, ShapeGeometry::Line { start: zoom.to_view(*start), end: zoom.to_view(*end) })
        }
        CaptureState::Calibrating { .. } => (None, ShapeGeometry::Markers { points }),
        CaptureState::CapturingLinear { .. } => {
            (Some(MeasurementKind::Linear), ShapeGeometry::Markers { points })
        }
        CaptureState::CapturingArea { .. } => {
            (Some(MeasurementKind::Area), ShapeGeometry::Polygon { vertices: points, closed: false })
        }
        CaptureState::CapturingCount { .. } => {
            (Some(MeasurementKind::Count), ShapeGeometry::Markers { points })
        }
    };

    Some(RenderedShape {
        measurement_id: None,
        kind,
        geometry,
        label: String::new(),
        label_anchor: anchor,
        highlighted: false,
    })
}

fn finished_geometry(
    kind: MeasurementKind,
    points: &[DocumentPoint],
    zoom: DisplayScale,
) -> ShapeGeometry {
    let mut view: Vec<ViewPoint> = points.iter().map(|p| zoom.to_view(*p)).collect();
    match kind {
        MeasurementKind::Linear if view.len() == 2 => {
            let end = view.pop().unwrap_or(ViewPoint::new(0.0, 0.0));
            let start = view.pop().unwrap_or(ViewPoint::new(0.0, 0.0));
            ShapeGeometry::Line { start, end }
        }
        MeasurementKind::Area => ShapeGeometry::Polygon { vertices: view, closed: true },
        MeasurementKind::Note if !view.is_empty() => ShapeGeometry::Pin { position: view[0] },
        _ => ShapeGeometry::Markers { points: view },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationScale;
    use crate::capture::Tool;
    use crate::measurement::DocumentId;

    fn saved(
        kind: MeasurementKind,
        points: Vec<DocumentPoint>,
        page_number: u32,
        px_per_ft: f64,
    ) -> Measurement {
        MeasurementDraft::new(
            kind,
            points,
            CalibrationScale::new(px_per_ft).expect("scale"),
            page_number,
        )
        .expect("draft")
        .into_measurement(MeasurementId::new_v4(), DocumentId(1))
    }

    #[test]
    fn zoom_is_clamped() {
        assert_eq!(DisplayScale::new(0.01).factor(), 0.1);
        assert_eq!(DisplayScale::new(40.0).factor(), 16.0);
        assert_eq!(DisplayScale::new(f64::NAN), DisplayScale::ACTUAL_SIZE);
        assert_eq!(DisplayScale::from_percent(250).factor(), 2.5);
    }

    #[test]
    fn deserialized_zoom_is_clamped() {
        let zero: DisplayScale = serde_json::from_str("0.0").expect("zoom");
        assert_eq!(zero.factor(), 0.1);
        let back = zero.to_document(ViewPoint::new(1.0, 2.0));
        assert!((back.x - 10.0).abs() < 1e-9 && (back.y - 20.0).abs() < 1e-9);

        let stored = serde_json::to_string(&DisplayScale::new(3.0)).expect("serialize");
        assert_eq!(stored, "3.0");
    }

    #[test]
    fn view_and_document_space_round_trip() {
        let zoom = DisplayScale::new(2.0);
        let view = zoom.to_view(DocumentPoint::new(10.0, 4.0));
        assert_eq!(view, ViewPoint::new(20.0, 8.0));
        assert_eq!(zoom.to_document(view), DocumentPoint::new(10.0, 4.0));
    }

    #[test]
    fn render_scales_points_but_not_values() {
        let wall = saved(
            MeasurementKind::Linear,
            vec![DocumentPoint::new(0.0, 0.0), DocumentPoint::new(100.0, 0.0)],
            1,
            10.0,
        );
        let options = RenderOptions { zoom: DisplayScale::new(2.0), ..RenderOptions::default() };

        let shapes = render_page(std::slice::from_ref(&wall), 1, &options);
        assert_eq!(shapes.len(), 1);
        assert_eq!(
            shapes[0].geometry,
            ShapeGeometry::Line { start: ViewPoint::new(0.0, 0.0), end: ViewPoint::new(200.0, 0.0) }
        );
        assert_eq!(shapes[0].label, "10.00 LF");
        assert_eq!(shapes[0].label_anchor, ViewPoint::new(100.0, 0.0));
    }

    #[test]
    fn render_skips_other_pages_and_highlights_one() {
        let a = saved(MeasurementKind::Count, vec![DocumentPoint::new(1.0, 1.0)], 1, 1.0);
        let b = saved(
            MeasurementKind::Area,
            vec![DocumentPoint::new(0.0, 0.0), DocumentPoint::new(2.0, 0.0), DocumentPoint::new(0.0, 2.0)],
            1,
            1.0,
        );
        let c = saved(MeasurementKind::Note, vec![DocumentPoint::new(3.0, 3.0)], 2, 1.0);

        let options = RenderOptions { highlight: Some(b.id()), ..RenderOptions::default() };
        let shapes = render_page(&[a.clone(), b.clone(), c], 1, &options);

        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].measurement_id, Some(a.id()));
        assert!(!shapes[0].highlighted);
        assert!(shapes[1].highlighted);
        assert!(matches!(shapes[1].geometry, ShapeGeometry::Polygon { closed: true, .. }));
        assert_eq!(shapes[1].label, "2.00 SF");
    }

    #[test]
    fn preview_follows_capture_state() {
        let mut capture = Capture::new(1).expect("capture");
        assert_eq!(render_preview(&capture, DisplayScale::ACTUAL_SIZE), None);

        capture.set_calibration(CalibrationScale::NEUTRAL);
        capture.select_tool(Tool::Area).expect("area tool");
        capture.click(DocumentPoint::new(1.0, 1.0)).expect("click");
        capture.click(DocumentPoint::new(3.0, 1.0)).expect("click");

        let preview =
            render_preview(&capture, DisplayScale::new(2.0)).expect("preview while capturing");
        assert_eq!(preview.kind, Some(MeasurementKind::Area));
        assert_eq!(
            preview.geometry,
            ShapeGeometry::Polygon {
                vertices: vec![ViewPoint::new(2.0, 2.0), ViewPoint::new(6.0, 2.0)],
                closed: false,
            }
        );
    }
}
