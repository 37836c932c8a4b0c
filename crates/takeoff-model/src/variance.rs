//! Budget variance and QA severity
//!
//! Variance is `(actual - estimated) / estimated * 100`; positive means over
//! budget. Severity thresholds are fixed and applied to every item alike.

use crate::estimate::{CostLineItem, LineItemId};
use serde::{Deserialize, Serialize};

/// Over budget by more than this is critical
pub const CRITICAL_OVER_PERCENT: f64 = 10.0;
/// Over budget by more than this is a warning
pub const WARNING_OVER_PERCENT: f64 = 5.0;
/// Under budget by more than this is a favorable variance
pub const FAVORABLE_UNDER_PERCENT: f64 = -5.0;

/// Percentage variance, `None` when there is no estimate to compare against
pub fn variance_percent(estimated: f64, actual: f64) -> Option<f64> {
    if estimated == 0.0 || !estimated.is_finite() || !actual.is_finite() {
        return None;
    }
    Some((actual - estimated) / estimated * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaSeverity {
    /// More than 10% over the estimate
    Critical,
    /// More than 5% over the estimate
    Warning,
    /// More than 5% under the estimate
    Favorable,
    /// Within 5% of the estimate
    OnBudget,
}

impl QaSeverity {
    pub fn classify(variance_percent: f64) -> Self {
        if variance_percent > CRITICAL_OVER_PERCENT {
            QaSeverity::Critical
        } else if variance_percent > WARNING_OVER_PERCENT {
            QaSeverity::Warning
        } else if variance_percent < FAVORABLE_UNDER_PERCENT {
            QaSeverity::Favorable
        } else {
            QaSeverity::OnBudget
        }
    }
}

/// One line item's estimate against its recorded actual cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaFinding {
    pub line_item_id: LineItemId,
    pub description: String,
    pub category: String,
    /// Quantity times unit cost
    pub estimated: f64,
    pub actual: f64,
    /// `None` when the estimate is zero
    pub variance_percent: Option<f64>,
    /// `None` when there is no variance to classify
    pub severity: Option<QaSeverity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    /// Items with an actual cost, in line item order
    pub findings: Vec<QaFinding>,
    /// Sum of `estimated` over the findings
    pub total_estimated: f64,
    /// Sum of `actual` over the findings
    pub total_actual: f64,
    pub overall_variance_percent: Option<f64>,
    /// Findings more than 10% over budget
    pub critical: usize,
    /// Findings more than 5% over budget
    pub warning: usize,
    /// Findings more than 5% under budget
    pub favorable: usize,
    /// Findings within 5% either way
    pub on_budget: usize,
}

/// Compare every line item that has an actual cost against its estimate
///
/// Totals only cover items with an actual cost, so the overall variance
/// compares like with like.
pub fn qa_report(items: &[CostLineItem]) -> QaReport {
    let mut report = QaReport::default();

    for item in items {
        let Some(actual) = item.actual_cost else {
            continue;
        };

        let estimated = item.estimated_cost();
        let variance = variance_percent(estimated, actual);
        let severity = variance.map(QaSeverity::classify);

        match severity {
            Some(QaSeverity::Critical) => report.critical += 1,
            Some(QaSeverity::Warning) => report.warning += 1,
            Some(QaSeverity::Favorable) => report.favorable += 1,
            Some(QaSeverity::OnBudget) => report.on_budget += 1,
            None => {}
        }

        report.total_estimated += estimated;
        report.total_actual += actual;
        report.findings.push(QaFinding {
            line_item_id: item.id,
            description: item.description.clone(),
            category: item.category.clone(),
            estimated,
            actual,
            variance_percent: variance,
            severity,
        });
    }

    report.overall_variance_percent = variance_percent(report.total_estimated, report.total_actual);
    report
}
