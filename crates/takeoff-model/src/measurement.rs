//! Measurement records
//!
//! A measurement is one finalized takeoff shape on one page of one document.
//! Geometry is stored in document space together with the calibration scale
//! that was active at capture time, so its value never changes after a page
//! is recalibrated.

use crate::calibration::CalibrationScale;
use crate::estimate::LineItemId;
use crate::geometry::{shoelace_area, vertex_centroid, DocumentPoint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for measurements, assigned by the store
pub type MeasurementId = uuid::Uuid;

/// Identifier of a source document (blueprint set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Linear,
    Area,
    Count,
    Note,
}

impl MeasurementKind {
    pub fn unit(self) -> Unit {
        match self {
            MeasurementKind::Linear => Unit::LinearFeet,
            MeasurementKind::Area => Unit::SquareFeet,
            MeasurementKind::Count | MeasurementKind::Note => Unit::Each,
        }
    }

    /// Linear and area values are only meaningful on a calibrated page
    pub fn requires_calibration(self) -> bool {
        matches!(self, MeasurementKind::Linear | MeasurementKind::Area)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementKind::Linear => "linear",
            MeasurementKind::Area => "area",
            MeasurementKind::Count => "count",
            MeasurementKind::Note => "note",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "LF")]
    LinearFeet,
    #[serde(rename = "SF")]
    SquareFeet,
    #[serde(rename = "EA")]
    Each,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::LinearFeet => "LF",
            Unit::SquareFeet => "SF",
            Unit::Each => "EA",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeasurementError {
    #[error("{kind} measurement requires {expected} points, got {actual}")]
    PointCount { kind: MeasurementKind, expected: &'static str, actual: usize },
    #[error("page numbers are 1-based")]
    InvalidPage,
}

fn check_point_count(kind: MeasurementKind, actual: usize) -> Result<(), MeasurementError> {
    let (ok, expected) = match kind {
        MeasurementKind::Linear => (actual == 2, "exactly 2"),
        MeasurementKind::Area => (actual >= 3, "at least 3"),
        MeasurementKind::Count => (actual >= 1, "at least 1"),
        MeasurementKind::Note => (actual == 1, "exactly 1"),
    };

    if ok {
        Ok(())
    } else {
        Err(MeasurementError::PointCount { kind, expected, actual })
    }
}

fn compute_value(kind: MeasurementKind, points: &[DocumentPoint], scale: CalibrationScale) -> f64 {
    match kind {
        MeasurementKind::Linear => match points {
            [start, end] => scale.to_feet(start.distance_to(end)),
            _ => 0.0,
        },
        MeasurementKind::Area => scale.to_square_feet(shoelace_area(points)),
        MeasurementKind::Count => points.len() as f64,
        MeasurementKind::Note => 0.0,
    }
}

/// A finalized shape that has not been persisted yet
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementDraft {
    kind: MeasurementKind,
    points: Vec<DocumentPoint>,
    value: f64,
    label: Option<String>,
    page_number: u32,
    scale: CalibrationScale,
}

impl MeasurementDraft {
    /// Validate the point count for `kind` and compute the value
    pub fn new(
        kind: MeasurementKind,
        points: Vec<DocumentPoint>,
        scale: CalibrationScale,
        page_number: u32,
    ) -> Result<Self, MeasurementError> {
        if page_number == 0 {
            return Err(MeasurementError::InvalidPage);
        }
        check_point_count(kind, points.len())?;

        let value = compute_value(kind, &points, scale);
        Ok(Self { kind, points, value, label: None, page_number, scale })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label.filter(|text| !text.trim().is_empty());
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn points(&self) -> &[DocumentPoint] {
        &self.points
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.kind.unit()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn scale(&self) -> CalibrationScale {
        self.scale
    }

    /// Attach the store-assigned identity
    pub fn into_measurement(self, id: MeasurementId, document_id: DocumentId) -> Measurement {
        Measurement {
            id,
            document_id,
            kind: self.kind,
            points: self.points,
            value: self.value,
            unit: self.kind.unit(),
            label: self.label,
            page_number: self.page_number,
            scale: self.scale,
            linked_line_item_id: None,
        }
    }
}

/// A persisted measurement
///
/// Immutable apart from the optional line item link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    id: MeasurementId,
    document_id: DocumentId,
    #[serde(rename = "type")]
    kind: MeasurementKind,
    points: Vec<DocumentPoint>,
    value: f64,
    unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    page_number: u32,
    scale: CalibrationScale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    linked_line_item_id: Option<LineItemId>,
}

impl Measurement {
    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn points(&self) -> &[DocumentPoint] {
        &self.points
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn scale(&self) -> CalibrationScale {
        self.scale
    }

    pub fn linked_line_item_id(&self) -> Option<LineItemId> {
        self.linked_line_item_id
    }

    pub fn link_line_item(&mut self, line_item_id: LineItemId) {
        self.linked_line_item_id = Some(line_item_id);
    }

    pub fn clear_line_item_link(&mut self) {
        self.linked_line_item_id = None;
    }

    /// Recompute the value from stored points and frozen scale
    pub fn recomputed_value(&self) -> f64 {
        compute_value(self.kind, &self.points, self.scale)
    }

    /// Check the record against its invariants (point count, unit, derived value)
    pub fn is_consistent(&self) -> bool {
        if check_point_count(self.kind, self.points.len()).is_err()
            || self.unit != self.kind.unit()
            || self.page_number == 0
        {
            return false;
        }

        let recomputed = self.recomputed_value();
        (recomputed - self.value).abs() <= 1e-9 * recomputed.abs().max(1.0)
    }

    /// Human-readable value, e.g. `12.50 LF` or `4 EA`; notes show their label
    pub fn formatted_value(&self, precision: usize) -> String {
        format_value(self.kind, self.value, self.label.as_deref(), precision)
    }

    /// Where the value label should be drawn, in document space
    pub fn label_anchor(&self) -> DocumentPoint {
        label_anchor(self.kind, &self.points)
    }
}

pub(crate) fn format_value(
    kind: MeasurementKind,
    value: f64,
    label: Option<&str>,
    precision: usize,
) -> String {
    match kind {
        MeasurementKind::Linear | MeasurementKind::Area => {
            format!("{:.*} {}", precision, value, kind.unit())
        }
        MeasurementKind::Count => format!("{} {}", value.round() as u64, kind.unit()),
        MeasurementKind::Note => label.unwrap_or_default().to_owned(),
    }
}

pub(crate) fn label_anchor(kind: MeasurementKind, points: &[DocumentPoint]) -> DocumentPoint {
    let origin = DocumentPoint::new(0.0, 0.0);
    match (kind, points) {
        (MeasurementKind::Linear, [start, end, ..]) => start.midpoint(end),
        (MeasurementKind::Area, _) => vertex_centroid(points).unwrap_or(origin),
        (_, [first, ..]) => *first,
        (_, []) => origin,
    }
}
