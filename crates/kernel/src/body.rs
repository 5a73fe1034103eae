//! Body registry: boundary markers and per-body bounding data.
//!
//! Markers of all bodies share one struct-of-arrays store; each body owns a
//! contiguous `[offset, offset + num_points)` slice of it. The markers of a
//! body form a closed polyline: segment `k` joins marker `k` to
//! [`BodyRegistry::next`]`(k)`.

use serde::{Deserialize, Serialize};

use crate::error::{IbError, IbResult};

/// Struct-of-arrays marker storage.
///
/// All arrays are parallel: index `k` across every array refers to the same
/// marker.
#[derive(Debug, Clone, Default)]
pub struct Markers {
    /// Reference x-coordinates (t = 0 geometry).
    pub x0: Vec<f64>,
    /// Reference y-coordinates.
    pub y0: Vec<f64>,
    /// Current x-coordinates.
    pub x: Vec<f64>,
    /// Current y-coordinates.
    pub y: Vec<f64>,
    /// Current x-velocity.
    pub ub: Vec<f64>,
    /// Current y-velocity.
    pub vb: Vec<f64>,
    /// x-coordinates at the previous sub-step.
    pub xk: Vec<f64>,
    /// y-coordinates at the previous sub-step.
    pub yk: Vec<f64>,
    /// x-velocity at the previous sub-step.
    pub ubk: Vec<f64>,
    /// y-velocity at the previous sub-step.
    pub vbk: Vec<f64>,
    /// Owning body index.
    pub body: Vec<usize>,
    /// x-index of the pressure cell containing the marker.
    pub cell_i: Vec<usize>,
    /// y-index of the pressure cell containing the marker.
    pub cell_j: Vec<usize>,
}

impl Markers {
    /// Number of markers.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no markers.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn push(&mut self, x: f64, y: f64, body: usize) {
        self.x0.push(x);
        self.y0.push(y);
        self.x.push(x);
        self.y.push(y);
        self.ub.push(0.0);
        self.vb.push(0.0);
        self.xk.push(x);
        self.yk.push(y);
        self.ubk.push(0.0);
        self.vbk.push(0.0);
        self.body.push(body);
        self.cell_i.push(0);
        self.cell_j.push(0);
    }

    /// Copy the current position and velocity into the previous-sub-step slots.
    pub fn store_substep(&mut self) {
        self.xk.copy_from_slice(&self.x);
        self.yk.copy_from_slice(&self.y);
        self.ubk.copy_from_slice(&self.ub);
        self.vbk.copy_from_slice(&self.vb);
    }
}

/// Axis-aligned box `[xmin, xmax] x [ymin, ymax]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lowest x.
    pub xmin: f64,
    /// Highest x.
    pub xmax: f64,
    /// Lowest y.
    pub ymin: f64,
    /// Highest y.
    pub ymax: f64,
}

impl BoundingBox {
    /// Whether the point lies in the closed box.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Whether `other` lies strictly inside this box.
    pub fn strictly_contains(&self, other: &BoundingBox) -> bool {
        self.xmin < other.xmin && self.xmax > other.xmax && self.ymin < other.ymin && self.ymax > other.ymax
    }
}

/// One rigid body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Body {
    /// Index of the body's first marker.
    pub offset: usize,
    /// Number of markers of the body.
    pub num_points: usize,
    /// Min/max box of the markers.
    pub unscaled: BoundingBox,
    /// Box expanded by the covering factor.
    pub bbox: BoundingBox,
    /// First pressure-cell column of the covering rectangle.
    pub start_i: usize,
    /// First pressure-cell row of the covering rectangle.
    pub start_j: usize,
    /// Width of the covering rectangle in cells.
    pub num_cells_x: usize,
    /// Height of the covering rectangle in cells.
    pub num_cells_y: usize,
    /// `+1` for counter-clockwise marker order, `-1` for clockwise.
    pub orientation: f64,
}

impl Body {
    /// Marker index range of the body.
    pub fn markers(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.num_points
    }
}

/// All bodies and their markers.
#[derive(Debug, Clone, Default)]
pub struct BodyRegistry {
    /// Shared marker store.
    pub markers: Markers,
    /// Per-body data, indexed by body id.
    pub bodies: Vec<Body>,
}

impl BodyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Return `true` if no body is registered.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Register a closed polyline as a new body and return its id.
    pub fn add_body(&mut self, points: &[(f64, f64)]) -> IbResult<usize> {
        if points.len() < 3 {
            return Err(IbError::InvalidInput(format!(
                "a body needs at least 3 markers, got {}",
                points.len()
            )));
        }
        if points.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(IbError::InvalidInput("marker coordinates must be finite".to_string()));
        }

        let id = self.bodies.len();
        let offset = self.markers.len();
        for &(x, y) in points {
            self.markers.push(x, y, id);
        }
        let mut body = Body { offset, num_points: points.len(), ..Body::default() };
        let area = signed_area(&self.markers.x[body.markers()], &self.markers.y[body.markers()]);
        if area.abs() < f64::EPSILON {
            return Err(IbError::InvalidInput(format!("body {} has zero enclosed area", id)));
        }
        body.orientation = area.signum();
        body.unscaled = points.iter().fold(
            BoundingBox { xmin: f64::INFINITY, xmax: f64::NEG_INFINITY, ymin: f64::INFINITY, ymax: f64::NEG_INFINITY },
            |bb, &(x, y)| BoundingBox { xmin: bb.xmin.min(x), xmax: bb.xmax.max(x), ymin: bb.ymin.min(y), ymax: bb.ymax.max(y) },
        );
        self.bodies.push(body);
        tracing::debug!(body = id, markers = points.len(), "registered body");
        Ok(id)
    }

    /// Total number of markers.
    pub fn total_points(&self) -> usize {
        self.markers.len()
    }

    /// Next marker along the owning body's polyline (wraps around).
    #[inline]
    pub fn next(&self, k: usize) -> usize {
        let b = &self.bodies[self.markers.body[k]];
        if k + 1 == b.offset + b.num_points {
            b.offset
        } else {
            k + 1
        }
    }

    /// Previous marker along the owning body's polyline (wraps around).
    #[inline]
    pub fn prev(&self, k: usize) -> usize {
        let b = &self.bodies[self.markers.body[k]];
        if k == b.offset {
            b.offset + b.num_points - 1
        } else {
            k - 1
        }
    }

    /// Endpoints of segment `k`.
    #[inline]
    pub fn segment(&self, k: usize) -> ((f64, f64), (f64, f64)) {
        let n = self.next(k);
        (
            (self.markers.x[k], self.markers.y[k]),
            (self.markers.x[n], self.markers.y[n]),
        )
    }

    /// Length of segment `k`.
    pub fn segment_length(&self, k: usize) -> f64 {
        let ((ax, ay), (bx, by)) = self.segment(k);
        (bx - ax).hypot(by - ay)
    }

    /// Outward unit normal of segment `k`.
    pub fn segment_normal(&self, k: usize) -> (f64, f64) {
        let ((ax, ay), (bx, by)) = self.segment(k);
        let (tx, ty) = (bx - ax, by - ay);
        let len = tx.hypot(ty);
        if len < f64::MIN_POSITIVE {
            return (0.0, 0.0);
        }
        let s = self.bodies[self.markers.body[k]].orientation;
        (s * ty / len, -s * tx / len)
    }

    /// Body velocity at parameter `t` in `[0, 1]` along segment `k`.
    pub fn segment_velocity(&self, k: usize, t: f64) -> (f64, f64) {
        let n = self.next(k);
        let m = &self.markers;
        (
            m.ub[k] + t * (m.ub[n] - m.ub[k]),
            m.vb[k] + t * (m.vb[n] - m.vb[k]),
        )
    }

    /// Body acceleration at parameter `t` along segment `k`, from the current
    /// and previous sub-step velocities.
    pub fn segment_acceleration(&self, k: usize, t: f64, dt: f64) -> (f64, f64) {
        if dt <= 0.0 {
            return (0.0, 0.0);
        }
        let n = self.next(k);
        let m = &self.markers;
        let ax0 = (m.ub[k] - m.ubk[k]) / dt;
        let ay0 = (m.vb[k] - m.vbk[k]) / dt;
        let ax1 = (m.ub[n] - m.ubk[n]) / dt;
        let ay1 = (m.vb[n] - m.vbk[n]) / dt;
        (ax0 + t * (ax1 - ax0), ay0 + t * (ay1 - ay0))
    }

    /// Closest point to `(px, py)` on segment `k`, with its parameter `t`.
    pub fn closest_on_segment(&self, k: usize, px: f64, py: f64) -> (f64, f64, f64) {
        let ((ax, ay), (bx, by)) = self.segment(k);
        let t = project_parameter(ax, ay, bx, by, px, py).clamp(0.0, 1.0);
        (ax + t * (bx - ax), ay + t * (by - ay), t)
    }
}

/// Parameter of the perpendicular foot of `p` on the line through `a` and `b`.
#[inline]
pub fn project_parameter(ax: f64, ay: f64, bx: f64, by: f64, px: f64, py: f64) -> f64 {
    let (tx, ty) = (bx - ax, by - ay);
    let len_sq = tx * tx + ty * ty;
    if len_sq < f64::MIN_POSITIVE {
        return 0.0;
    }
    ((px - ax) * tx + (py - ay) * ty) / len_sq
}

/// Shoelace signed area of a closed polyline (positive when counter-clockwise).
pub fn signed_area(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    let mut twice = 0.0;
    for k in 0..n {
        let l = (k + 1) % n;
        twice += x[k] * y[l] - x[l] * y[k];
    }
    0.5 * twice
}
