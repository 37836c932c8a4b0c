//! Document-space geometry
//!
//! All takeoff geometry is stored in document space: unscaled page units of the
//! source sheet, independent of the zoom the page is currently displayed at.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point on an unscaled document page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentPoint {
    pub x: f64,
    pub y: f64,
}

impl DocumentPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point, in document units
    pub fn distance_to(&self, other: &DocumentPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &DocumentPoint) -> DocumentPoint {
        DocumentPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

impl fmt::Display for DocumentPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePointError {
    #[error("expected a point as `x,y`, got `{0}`")]
    Format(String),
    #[error("invalid coordinate `{0}`")]
    Coordinate(String),
}

impl FromStr for DocumentPoint {
    type Err = ParsePointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once(',').ok_or_else(|| ParsePointError::Format(s.to_owned()))?;

        let parse = |raw: &str| -> Result<f64, ParsePointError> {
            let raw = raw.trim();
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(ParsePointError::Coordinate(raw.to_owned())),
            }
        };

        Ok(DocumentPoint::new(parse(x)?, parse(y)?))
    }
}

/// Polygon area via the Shoelace formula
///
/// Vertices are taken in the order given and the polygon is closed implicitly
/// (last vertex connects back to the first). Winding direction does not matter.
/// Fewer than three vertices enclose no area.
pub fn shoelace_area(vertices: &[DocumentPoint]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += vertices[i].x * vertices[j].y;
        twice_area -= vertices[j].x * vertices[i].y;
    }

    (twice_area / 2.0).abs()
}

/// Arithmetic mean of the vertices, used as a label anchor
pub fn vertex_centroid(points: &[DocumentPoint]) -> Option<DocumentPoint> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.x).sum();
    let sum_y: f64 = points.iter().map(|p| p.y).sum();
    Some(DocumentPoint::new(sum_x / n, sum_y / n))
}
