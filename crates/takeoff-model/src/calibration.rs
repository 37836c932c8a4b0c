//! Page calibration
//!
//! A calibration is the number of document pixels that make up one real-world
//! foot on the current sheet. It is derived from two reference points and a
//! known distance, and is frozen into every measurement captured under it.

use crate::geometry::DocumentPoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("distance `{0}` is not a number")]
    NotANumber(String),
    #[error("distance must be greater than zero, got {0}")]
    NonPositive(f64),
    #[error("calibration points coincide")]
    ZeroLengthReference,
    #[error("no calibration reference is waiting for a distance")]
    NoPendingReference,
}

/// Pixels-per-foot conversion factor
///
/// Always positive and finite. Not to be confused with
/// [`DisplayScale`](crate::render::DisplayScale), which only affects how a page
/// is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CalibrationScale(f64);

impl CalibrationScale {
    /// Scale stored on unit-less measurements captured before any calibration
    pub const NEUTRAL: CalibrationScale = CalibrationScale(1.0);

    pub fn new(pixels_per_foot: f64) -> Result<Self, CalibrationError> {
        if !pixels_per_foot.is_finite() {
            return Err(CalibrationError::NotANumber(pixels_per_foot.to_string()));
        }
        if pixels_per_foot <= 0.0 {
            return Err(CalibrationError::NonPositive(pixels_per_foot));
        }
        Ok(Self(pixels_per_foot))
    }

    /// Two-point calibration: `|end - start|` pixels correspond to `feet`
    pub fn from_reference(
        start: DocumentPoint,
        end: DocumentPoint,
        feet: f64,
    ) -> Result<Self, CalibrationError> {
        validate_feet(feet)?;

        let pixel_distance = start.distance_to(&end);
        if pixel_distance <= 0.0 {
            return Err(CalibrationError::ZeroLengthReference);
        }

        Self::new(pixel_distance / feet)
    }

    pub fn pixels_per_foot(self) -> f64 {
        self.0
    }

    pub fn to_feet(self, pixels: f64) -> f64 {
        pixels / self.0
    }

    pub fn to_square_feet(self, square_pixels: f64) -> f64 {
        square_pixels / (self.0 * self.0)
    }
}

impl TryFrom<f64> for CalibrationScale {
    type Error = CalibrationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CalibrationScale> for f64 {
    fn from(scale: CalibrationScale) -> Self {
        scale.0
    }
}

/// Parse a user-entered real-world distance in feet
pub fn parse_feet(input: &str) -> Result<f64, CalibrationError> {
    let trimmed = input.trim();
    let feet = trimmed
        .parse::<f64>()
        .map_err(|_| CalibrationError::NotANumber(trimmed.to_owned()))?;
    validate_feet(feet)?;
    Ok(feet)
}

fn validate_feet(feet: f64) -> Result<(), CalibrationError> {
    if !feet.is_finite() {
        return Err(CalibrationError::NotANumber(feet.to_string()));
    }
    if feet <= 0.0 {
        return Err(CalibrationError::NonPositive(feet));
    }
    Ok(())
}
