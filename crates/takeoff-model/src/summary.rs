//! Quantity totals across a document's measurements

use crate::measurement::{Measurement, MeasurementKind, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTotal {
    pub page_number: u32,
    #[serde(rename = "type")]
    pub kind: MeasurementKind,
    pub unit: Unit,
    /// Sum of values, in `unit`
    pub total: f64,
    /// Number of measurements contributing to `total`
    pub measurements: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTotal {
    pub unit: Unit,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TakeoffSummary {
    pub pages: Vec<PageTotal>,
    pub totals: Vec<UnitTotal>,
}

/// Totals per page and type, plus grand totals per unit
///
/// Notes carry no quantity and are left out.
pub fn summarize(measurements: &[Measurement]) -> TakeoffSummary {
    let mut by_page: BTreeMap<(u32, MeasurementKind), (f64, usize)> = BTreeMap::new();
    let mut by_unit: BTreeMap<Unit, f64> = BTreeMap::new();

    for measurement in measurements.iter().filter(|m| m.kind() != MeasurementKind::Note) {
        let entry = by_page.entry((measurement.page_number(), measurement.kind())).or_default();
        entry.0 += measurement.value();
        entry.1 += 1;
        *by_unit.entry(measurement.unit()).or_default() += measurement.value();
    }

    TakeoffSummary {
        pages: by_page
            .into_iter()
            .map(|((page_number, kind), (total, measurements))| PageTotal {
                page_number,
                kind,
                unit: kind.unit(),
                total,
                measurements,
            })
            .collect(),
        totals: by_unit.into_iter().map(|(unit, total)| UnitTotal { unit, total }).collect(),
    }
}
