//! Pointer-driven shape capture
//!
//! Turns clicks and double-clicks on a page into finalized measurement drafts.
//! Each tool has its own in-progress state; switching tools or pages drops
//! whatever was in progress without saving it.

use crate::calibration::{parse_feet, CalibrationError, CalibrationScale};
use crate::geometry::DocumentPoint;
use crate::measurement::{MeasurementDraft, MeasurementError, MeasurementKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Two-point calibration
    Scale,
    Linear,
    Area,
    Count,
    Note,
}

impl Tool {
    pub fn measurement_kind(self) -> Option<MeasurementKind> {
        match self {
            Tool::Scale => None,
            Tool::Linear => Some(MeasurementKind::Linear),
            Tool::Area => Some(MeasurementKind::Area),
            Tool::Count => Some(MeasurementKind::Count),
            Tool::Note => Some(MeasurementKind::Note),
        }
    }

    pub fn requires_calibration(self) -> bool {
        self.measurement_kind().is_some_and(MeasurementKind::requires_calibration)
    }
}

impl From<MeasurementKind> for Tool {
    fn from(kind: MeasurementKind) -> Self {
        match kind {
            MeasurementKind::Linear => Tool::Linear,
            MeasurementKind::Area => Tool::Area,
            MeasurementKind::Count => Tool::Count,
            MeasurementKind::Note => Tool::Note,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.measurement_kind() {
            Some(kind) => write!(f, "{kind}"),
            None => f.write_str("scale"),
        }
    }
}

/// In-progress gesture
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// First calibration point placed
    Calibrating { start: DocumentPoint },
    /// Both calibration points placed, waiting for the real-world distance
    ConfirmingCalibration { start: DocumentPoint, end: DocumentPoint, pixel_distance: f64 },
    CapturingLinear { start: DocumentPoint },
    CapturingArea { vertices: Vec<DocumentPoint> },
    CapturingCount { markers: Vec<DocumentPoint> },
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    pub fn points(&self) -> Vec<DocumentPoint> {
        match self {
            CaptureState::Idle => Vec::new(),
            CaptureState::Calibrating { start } | CaptureState::CapturingLinear { start } => {
                vec![*start]
            }
            CaptureState::ConfirmingCalibration { start, end, .. } => vec![*start, *end],
            CaptureState::CapturingArea { vertices } => vertices.clone(),
            CaptureState::CapturingCount { markers } => markers.clone(),
        }
    }
}

/// Result of feeding one pointer event into the capture machine
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// The event does not apply to the current tool or state
    Ignored,
    /// A point was recorded; the gesture continues
    Pending,
    /// Both calibration points are placed; a distance must be confirmed
    CalibrationReady { pixel_distance: f64 },
    Finalized(MeasurementDraft),
    /// Area closed with too few vertices; nothing is kept
    Discarded { vertices: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("the {0} tool needs a calibrated scale")]
    CalibrationRequired(Tool),
    #[error("page numbers are 1-based")]
    InvalidPage,
    #[error(transparent)]
    Measurement(#[from] MeasurementError),
}

/// Per-page capture machine for one viewing session
#[derive(Debug, Clone)]
pub struct Capture {
    tool: Option<Tool>,
    state: CaptureState,
    calibration: Option<CalibrationScale>,
    page_number: u32,
}

impl Capture {
    pub fn new(page_number: u32) -> Result<Self, CaptureError> {
        if page_number == 0 {
            return Err(CaptureError::InvalidPage);
        }
        Ok(Self { tool: None, state: CaptureState::Idle, calibration: None, page_number })
    }

    pub fn tool(&self) -> Option<Tool> {
        self.tool
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn calibration(&self) -> Option<CalibrationScale> {
        self.calibration
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn is_tool_available(&self, tool: Tool) -> bool {
        !tool.requires_calibration() || self.calibration.is_some()
    }

    /// Activate a tool, dropping any in-progress gesture
    pub fn select_tool(&mut self, tool: Tool) -> Result<(), CaptureError> {
        if !self.is_tool_available(tool) {
            return Err(CaptureError::CalibrationRequired(tool));
        }
        self.abandon();
        self.tool = Some(tool);
        Ok(())
    }

    /// Move to another page, dropping any in-progress gesture
    pub fn set_page(&mut self, page_number: u32) -> Result<(), CaptureError> {
        if page_number == 0 {
            return Err(CaptureError::InvalidPage);
        }
        self.abandon();
        self.page_number = page_number;
        Ok(())
    }

    fn abandon(&mut self) {
        self.state = CaptureState::Idle;
    }

    /// Use a known scale directly instead of two-point calibration
    pub fn set_calibration(&mut self, scale: CalibrationScale) {
        self.calibration = Some(scale);
    }

    pub fn click(&mut self, point: DocumentPoint) -> Result<CaptureOutcome, CaptureError> {
        let Some(tool) = self.tool else {
            return Ok(CaptureOutcome::Ignored);
        };

        let state = std::mem::take(&mut self.state);
        let outcome = match (tool, state) {
            (_, state @ CaptureState::ConfirmingCalibration { .. }) => {
                self.state = state;
                CaptureOutcome::Ignored
            }
            (Tool::Scale, CaptureState::Calibrating { start }) => {
                let pixel_distance = start.distance_to(&point);
                self.state =
                    CaptureState::ConfirmingCalibration { start, end: point, pixel_distance };
                CaptureOutcome::CalibrationReady { pixel_distance }
            }
            (Tool::Scale, _) => {
                self.state = CaptureState::Calibrating { start: point };
                CaptureOutcome::Pending
            }
            (Tool::Linear, CaptureState::CapturingLinear { start }) => {
                let scale = self.calibration.ok_or(CaptureError::CalibrationRequired(tool))?;
                let draft = MeasurementDraft::new(
                    MeasurementKind::Linear,
                    vec![start, point],
                    scale,
                    self.page_number,
                )?;
                CaptureOutcome::Finalized(draft)
            }
            (Tool::Linear, _) => {
                self.state = CaptureState::CapturingLinear { start: point };
                CaptureOutcome::Pending
            }
            (Tool::Area, CaptureState::CapturingArea { mut vertices }) => {
                vertices.push(point);
                self.state = CaptureState::CapturingArea { vertices };
                CaptureOutcome::Pending
            }
            (Tool::Area, _) => {
                self.state = CaptureState::CapturingArea { vertices: vec![point] };
                CaptureOutcome::Pending
            }
            (Tool::Count, CaptureState::CapturingCount { mut markers }) => {
                markers.push(point);
                self.state = CaptureState::CapturingCount { markers };
                CaptureOutcome::Pending
            }
            (Tool::Count, _) => {
                self.state = CaptureState::CapturingCount { markers: vec![point] };
                CaptureOutcome::Pending
            }
            (Tool::Note, _) => {
                let draft = MeasurementDraft::new(
                    MeasurementKind::Note,
                    vec![point],
                    self.unitless_scale(),
                    self.page_number,
                )?;
                CaptureOutcome::Finalized(draft)
            }
        };

        Ok(outcome)
    }

    /// Close an area or count gesture; the double-click adds no point
    pub fn double_click(&mut self) -> Result<CaptureOutcome, CaptureError> {
        let state = std::mem::take(&mut self.state);
        let outcome = match state {
            CaptureState::CapturingArea { vertices } if vertices.len() < 3 => {
                CaptureOutcome::Discarded { vertices: vertices.len() }
            }
            CaptureState::CapturingArea { vertices } => {
                let scale =
                    self.calibration.ok_or(CaptureError::CalibrationRequired(Tool::Area))?;
                CaptureOutcome::Finalized(MeasurementDraft::new(
                    MeasurementKind::Area,
                    vertices,
                    scale,
                    self.page_number,
                )?)
            }
            CaptureState::CapturingCount { markers } => {
                CaptureOutcome::Finalized(MeasurementDraft::new(
                    MeasurementKind::Count,
                    markers,
                    self.unitless_scale(),
                    self.page_number,
                )?)
            }
            other => {
                self.state = other;
                CaptureOutcome::Ignored
            }
        };

        Ok(outcome)
    }

    /// Apply the user-entered distance to the pending calibration reference
    ///
    /// The reference is consumed either way; on error the previous
    /// calibration stays in effect.
    pub fn confirm_calibration(&mut self, feet: &str) -> Result<CalibrationScale, CalibrationError> {
        let CaptureState::ConfirmingCalibration { start, end, .. } = self.state else {
            return Err(CalibrationError::NoPendingReference);
        };
        self.state = CaptureState::Idle;

        let scale = CalibrationScale::from_reference(start, end, parse_feet(feet)?)?;
        self.calibration = Some(scale);
        Ok(scale)
    }

    pub fn cancel_calibration(&mut self) {
        if matches!(
            self.state,
            CaptureState::Calibrating { .. } | CaptureState::ConfirmingCalibration { .. }
        ) {
            self.state = CaptureState::Idle;
        }
    }

    fn unitless_scale(&self) -> CalibrationScale {
        self.calibration.unwrap_or(CalibrationScale::NEUTRAL)
    }
}
