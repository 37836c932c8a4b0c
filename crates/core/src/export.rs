//! CSV export for measurements and cost line items
//!
//! Produces flat tables for spreadsheets and estimating tools.

use std::io::Write;
use takeoff_model::{CostLineItem, Measurement};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Export only measurements from these pages (None = all pages)
    pub page_filter: Option<Vec<u32>>,

    /// Decimal places for values and money columns
    pub precision: usize,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self { include_headers: true, delimiter: b',', page_filter: None, precision: 2 }
    }
}

/// Export measurements to CSV
///
/// Columns: ID, Page, Type, Value, Unit, Pixels Per Foot, Label,
/// Line Item ID, Points.
pub fn export_measurements_csv<W: Write>(
    writer: W,
    measurements: &[Measurement],
    config: &CsvExportConfig,
) -> ExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "ID",
            "Page",
            "Type",
            "Value",
            "Unit",
            "Pixels Per Foot",
            "Label",
            "Line Item ID",
            "Points",
        ])?;
    }

    let selected = measurements.iter().filter(|m| {
        config.page_filter.as_ref().map_or(true, |pages| pages.contains(&m.page_number()))
    });

    for measurement in selected {
        csv_writer.write_record(&[
            measurement.id().to_string(),
            measurement.page_number().to_string(),
            measurement.kind().to_string(),
            format!("{:.*}", config.precision, measurement.value()),
            measurement.unit().to_string(),
            measurement.scale().pixels_per_foot().to_string(),
            measurement.label().unwrap_or("").to_string(),
            measurement.linked_line_item_id().map(|id| id.to_string()).unwrap_or_default(),
            measurement.points().len().to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export cost line items to CSV
///
/// Actual and variance columns stay empty until an actual cost is recorded.
pub fn export_line_items_csv<W: Write>(
    writer: W,
    items: &[CostLineItem],
    config: &CsvExportConfig,
) -> ExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "ID",
            "Category",
            "Description",
            "Quantity",
            "Unit",
            "Unit Cost",
            "Estimated",
            "Actual",
            "Variance %",
            "Status",
            "Measurement ID",
        ])?;
    }

    let precision = config.precision;
    for item in items {
        csv_writer.write_record(&[
            item.id.to_string(),
            item.category.clone(),
            item.description.clone(),
            format!("{:.*}", precision, item.quantity),
            item.unit.to_string(),
            format!("{:.*}", precision, item.unit_cost),
            format!("{:.*}", precision, item.estimated_cost()),
            item.actual_cost.map(|a| format!("{a:.precision$}")).unwrap_or_default(),
            item.variance_percent().map(|v| format!("{v:.1}")).unwrap_or_default(),
            item.status.to_string(),
            item.measurement_id.map(|id| id.to_string()).unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}
