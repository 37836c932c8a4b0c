//! Takeoff model
//!
//! Data model and algorithms for blueprint takeoff: calibration, pointer-driven
//! shape capture, measurement records, view-space rendering, cost line items,
//! and budget variance.

pub mod calibration;
pub mod capture;
pub mod estimate;
pub mod geometry;
pub mod measurement;
pub mod render;
pub mod summary;
pub mod variance;

pub use calibration::{parse_feet, CalibrationError, CalibrationScale};
pub use capture::{Capture, CaptureError, CaptureOutcome, CaptureState, Tool};
pub use estimate::{CostItemRequest, CostLineItem, EstimateError, LineItemId, LineItemStatus};
pub use geometry::{shoelace_area, DocumentPoint, ParsePointError};
pub use measurement::{
    DocumentId, Measurement, MeasurementDraft, MeasurementError, MeasurementId, MeasurementKind,
    Unit,
};
pub use render::{
    render_draft, render_page, render_preview, DisplayScale, RenderOptions, RenderedShape,
    ShapeGeometry, ViewPoint,
};
pub use summary::{summarize, PageTotal, TakeoffSummary, UnitTotal};
pub use variance::{qa_report, variance_percent, QaFinding, QaReport, QaSeverity};

use serde::{Deserialize, Serialize};

/// Most decimal places a label or export column may show
pub const MAX_DISPLAY_PRECISION: usize = 6;

/// User preferences persisted alongside the takeoff data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Decimal places shown in linear and area labels, at most
    /// [`MAX_DISPLAY_PRECISION`]
    pub display_precision: usize,
    /// Category offered when a cost item is created without one
    pub default_category: String,
    pub default_status: LineItemStatus,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display_precision: 2,
            default_category: "General".to_owned(),
            default_status: LineItemStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_fill_missing_fields_with_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"display_precision":3}"#).expect("partial preferences");
        assert_eq!(prefs.display_precision, 3);
        assert_eq!(prefs.default_category, "General");
        assert_eq!(prefs.default_status, LineItemStatus::Draft);
    }
}
