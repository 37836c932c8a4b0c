//! Cost line items created from takeoff quantities

use crate::measurement::{DocumentId, Measurement, MeasurementId, MeasurementKind, Unit};
use crate::variance::variance_percent;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type LineItemId = uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemStatus {
    /// Provisional, pending promotion
    #[default]
    Draft,
    Final,
}

impl fmt::Display for LineItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineItemStatus::Draft => f.write_str("draft"),
            LineItemStatus::Final => f.write_str("final"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    #[error("note measurements carry no quantity")]
    NotQuantifiable,
    #[error("unit cost must be a non-negative number, got {0}")]
    InvalidUnitCost(f64),
    #[error("actual cost must be a non-negative number, got {0}")]
    InvalidActualCost(f64),
}

/// Answer to the "create cost item from measurement" prompt
#[derive(Debug, Clone, PartialEq)]
pub struct CostItemRequest {
    /// Free-text trade or cost code, e.g. "Electrical"
    pub category: String,
    /// Blank or missing falls back to "<type> takeoff, page <n>"
    pub description: Option<String>,
    /// Cost per unit of the measured quantity
    pub unit_cost: f64,
    pub status: LineItemStatus,
}

impl CostItemRequest {
    /// Check the request on its own, before anything is persisted
    pub fn validate(&self) -> Result<(), EstimateError> {
        if !self.unit_cost.is_finite() || self.unit_cost < 0.0 {
            return Err(EstimateError::InvalidUnitCost(self.unit_cost));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLineItem {
    pub id: LineItemId,
    /// Document the source measurement belongs to
    pub document_id: DocumentId,
    pub description: String,
    pub category: String,
    /// Measured value at the time the item was created
    pub quantity: f64,
    /// Unit of `quantity` (LF, SF, or EA)
    pub unit: Unit,
    pub unit_cost: f64,
    pub status: LineItemStatus,
    /// Source measurement; cleared when that measurement is deleted
    #[serde(default)]
    pub measurement_id: Option<MeasurementId>,
    /// Recorded spend, compared against `estimated_cost` in QA reports
    #[serde(default)]
    pub actual_cost: Option<f64>,
}

impl CostLineItem {
    /// Fold a measured quantity into a new line item
    ///
    /// The measurement side of the link is recorded by the store.
    pub fn from_measurement(
        id: LineItemId,
        measurement: &Measurement,
        request: CostItemRequest,
    ) -> Result<Self, EstimateError> {
        if measurement.kind() == MeasurementKind::Note {
            return Err(EstimateError::NotQuantifiable);
        }
        request.validate()?;

        let description = request
            .description
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| {
                format!("{} takeoff, page {}", measurement.kind(), measurement.page_number())
            });

        Ok(Self {
            id,
            document_id: measurement.document_id(),
            description,
            category: request.category,
            quantity: measurement.value(),
            unit: measurement.unit(),
            unit_cost: request.unit_cost,
            status: request.status,
            measurement_id: Some(measurement.id()),
            actual_cost: None,
        })
    }

    pub fn estimated_cost(&self) -> f64 {
        self.quantity * self.unit_cost
    }

    pub fn record_actual(&mut self, amount: f64) -> Result<(), EstimateError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(EstimateError::InvalidActualCost(amount));
        }
        self.actual_cost = Some(amount);
        Ok(())
    }

    /// Positive when the actual cost is over the estimate
    pub fn variance_percent(&self) -> Option<f64> {
        variance_percent(self.estimated_cost(), self.actual_cost?)
    }
}
