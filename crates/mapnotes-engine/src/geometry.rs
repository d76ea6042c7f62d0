//! Polygon boundary validation and geodesic area.
//!
//! A [`Ring`] is the only way to hold an annotation boundary, so every ring in the
//! system has already passed [`Ring::new`]: at least three distinct vertices, finite
//! coordinates, a valid latitude range, a non-zero area and no self-intersection.

use serde::{Deserialize, Serialize};

use crate::models::{Geometry, Position};

/// Equatorial radius used by the spherical area formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Rings smaller than this (square meters) are treated as degenerate.
const MIN_AREA_M2: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("shape is empty")]
    Empty,
    #[error("polygon needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),
    #[error("coordinate is not a finite number")]
    NonFinite,
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("polygon has no area")]
    ZeroArea,
    #[error("polygon edges cross each other")]
    SelfIntersecting,
    #[error("polygons with holes are not supported")]
    HasHoles,
    #[error("expected a polygon, got a {0}")]
    UnsupportedShape(&'static str),
}

/// A closed polygon boundary, stored without its repeated closing vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Position>", into = "Vec<Position>")]
pub struct Ring {
    points: Vec<Position>,
}

impl Ring {
    /// Build a ring from vertices, open or closed.
    ///
    /// A trailing copy of the first vertex and consecutive duplicates are dropped
    /// before validation.
    pub fn new(points: Vec<Position>) -> Result<Self, GeometryError> {
        if points.is_empty() {
            return Err(GeometryError::Empty);
        }

        let mut open: Vec<Position> = Vec::with_capacity(points.len());
        for point in points {
            if !point[0].is_finite() || !point[1].is_finite() {
                return Err(GeometryError::NonFinite);
            }
            if !(-90.0..=90.0).contains(&point[1]) {
                return Err(GeometryError::LatitudeOutOfRange(point[1]));
            }
            if open.last() != Some(&point) {
                open.push(point);
            }
        }
        while open.len() > 1 && open.first() == open.last() {
            open.pop();
        }

        if open.len() < 3 {
            return Err(GeometryError::TooFewVertices(open.len()));
        }
        if is_self_intersecting(&open) {
            return Err(GeometryError::SelfIntersecting);
        }
        if ring_area(&open) < MIN_AREA_M2 {
            return Err(GeometryError::ZeroArea);
        }

        Ok(Self { points: open })
    }

    /// Extract the boundary of a single-ring polygon geometry.
    pub fn from_geometry(geometry: &Geometry) -> Result<Self, GeometryError> {
        match geometry {
            Geometry::Polygon(rings) => match rings.as_slice() {
                [] => Err(GeometryError::Empty),
                [outer] => Self::new(outer.clone()),
                _ => Err(GeometryError::HasHoles),
            },
            other => Err(GeometryError::UnsupportedShape(other.kind_name())),
        }
    }

    /// Vertices without the closing repeat
    pub fn points(&self) -> &[Position] {
        &self.points
    }

    /// Vertices with the first one repeated at the end, as GeoJSON expects.
    pub fn closed(&self) -> Vec<Position> {
        let mut closed = self.points.clone();
        closed.push(self.points[0]);
        closed
    }

    pub fn to_geometry(&self) -> Geometry {
        Geometry::Polygon(vec![self.closed()])
    }

    /// Geodesic area in square meters.
    pub fn area(&self) -> f64 {
        ring_area(&self.points)
    }

    /// Arithmetic mean of the vertices; good enough to anchor a popup.
    pub fn centroid(&self) -> Position {
        let n = self.points.len() as f64;
        let (lng, lat) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(lng, lat), p| (lng + p[0], lat + p[1]));
        [lng / n, lat / n]
    }
}

impl TryFrom<Vec<Position>> for Ring {
    type Error = GeometryError;

    fn try_from(points: Vec<Position>) -> Result<Self, Self::Error> {
        Ring::new(points)
    }
}

impl From<Ring> for Vec<Position> {
    fn from(ring: Ring) -> Self {
        ring.closed()
    }
}

/// Area of a ring on a sphere of radius [`EARTH_RADIUS_M`], in square meters.
///
/// Accepts open or closed rings. Always non-negative regardless of winding order.
pub fn ring_area(points: &[Position]) -> f64 {
    let points = match points {
        [first, .., last] if first == last => &points[..points.len() - 1],
        _ => points,
    };
    let n = points.len();
    if n < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let lower = points[i];
        let middle = points[(i + 1) % n];
        let upper = points[(i + 2) % n];
        total += (upper[0].to_radians() - lower[0].to_radians()) * middle[1].to_radians().sin();
    }

    (total * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

/// Even-odd test of a point against a ring (open or closed).
pub fn point_in_ring(point: Position, ring: &[Position]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi[1] > point[1]) != (pj[1] > point[1])
            && point[0] < (pj[0] - pi[0]) * (point[1] - pi[1]) / (pj[1] - pi[1]) + pi[0]
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn orientation(a: Position, b: Position, c: Position) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(a: Position, b: Position, p: Position) -> bool {
    p[0] >= a[0].min(b[0])
        && p[0] <= a[0].max(b[0])
        && p[1] >= a[1].min(b[1])
        && p[1] <= a[1].max(b[1])
}

fn segments_intersect(p1: Position, p2: Position, q1: Position, q2: Position) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// True when two non-adjacent edges of the open ring touch or cross.
fn is_self_intersecting(points: &[Position]) -> bool {
    let n = points.len();
    for i in 0..n {
        let (a1, a2) = (points[i], points[(i + 1) % n]);
        for j in (i + 2)..n {
            // first and last edge share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            let (b1, b2) = (points[j], points[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}
