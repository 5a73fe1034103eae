//! Intercept & stencil builder for hybrid and ghost nodes.
//!
//! For each tagged node the builder finds the body-intercept point on the
//! tagged segment, places an image point on the fluid side along the
//! outward normal and fits a bilinear polynomial
//!
//! ```text
//! q(x, y) = a0 + a1 X + a2 Y + a3 X Y,   X = (x - x_ip) / h,  Y = (y - y_ip) / h
//! ```
//!
//! through the four corners of the lattice cell containing the image point.
//! The fit is local to the image point, so `a0` is the interpolated value
//! there and the first row of the inverse fit matrix gives the corner
//! weights.
//!
//! Corners that are ghost, solid-interior or the node itself are replaced by
//! a boundary point carrying the boundary condition: body velocity
//! (Dirichlet) for u and v, the momentum-equation normal gradient (Neumann)
//! for pressure. A stencil that still cannot be fitted is a hard error.

use nalgebra::{Matrix4, Vector4};
use rayon::prelude::*;
use serde::Serialize;

use crate::body::{project_parameter, BodyRegistry};
use crate::error::{IbError, IbResult};
use crate::field::FlowField;
use crate::grid::{NodeFamily, StaggeredGrid};
use crate::locate::locate_cell_exhaustive;
use crate::tagging::{BoundaryNode, NodeRole, TagSet};

/// Fit determinants below this (in scaled local coordinates) are singular.
const DET_TOL: f64 = 1e-10;

/// Where a stencil corner's sample comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CornerKind {
    /// A fluid-normal or hybrid grid node (flat index).
    Node(usize),
    /// A point on the boundary substituted for an invalid node.
    Boundary {
        /// Segment the point lies on.
        segment: usize,
        /// Parameter along the segment.
        t: f64,
    },
}

/// One corner of an interpolation stencil.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Corner {
    /// Corner x-coordinate.
    pub x: f64,
    /// Corner y-coordinate.
    pub y: f64,
    /// Sample source.
    pub kind: CornerKind,
    /// Sampled value: field value, boundary value, or normal gradient for
    /// pressure boundary corners.
    pub value: f64,
    /// Outward normal at boundary corners, zero for grid nodes.
    pub normal: (f64, f64),
}

/// Advection and unsteady terms of the momentum equation at a boundary point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MomentumTerms {
    /// Body x-acceleration.
    pub dudt: f64,
    /// u * du/dx.
    pub ududx: f64,
    /// v * du/dy.
    pub vdudy: f64,
    /// Body y-acceleration.
    pub dvdt: f64,
    /// u * dv/dx.
    pub udvdx: f64,
    /// v * dv/dy.
    pub vdvdy: f64,
}

impl MomentumTerms {
    /// Normal pressure gradient `dp/dn = -(Du/Dt) . n`.
    pub fn normal_gradient(&self, n: (f64, f64)) -> f64 {
        -(self.dudt + self.ududx + self.vdudy) * n.0 - (self.dvdt + self.udvdx + self.vdvdy) * n.1
    }
}

/// Pressure-specific fit data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PressureFit {
    /// Local polynomial coefficients `a0..a3`.
    pub coeffs: [f64; 4],
    /// Normal pressure gradient imposed at the body intercept.
    pub dpdn: f64,
    /// Momentum terms at the body intercept.
    pub momentum: MomentumTerms,
}

/// Intercept/stencil record of one hybrid or ghost node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StencilRecord {
    /// Node family.
    pub family: NodeFamily,
    /// Flat node index.
    pub index: usize,
    /// Hybrid or ghost.
    pub role: NodeRole,
    /// Segment holding the body intercept.
    pub segment: usize,
    /// Node coordinates.
    pub node: (f64, f64),
    /// Body-intercept point.
    pub intercept: (f64, f64),
    /// Image point on the fluid side.
    pub image: (f64, f64),
    /// Outward unit normal through the intercept.
    pub normal: (f64, f64),
    /// Node value = `(1 - alpha) * boundary_value + alpha * image_value`
    /// (velocity); signed node position along the probe for pressure.
    pub alpha: f64,
    /// Distance from the intercept to the image point.
    pub probe_length: f64,
    /// Boundary value at the intercept (body velocity, or extrapolated
    /// pressure).
    pub boundary_value: f64,
    /// Stencil corners in (i0, j0), (i0+1, j0), (i0, j0+1), (i0+1, j0+1) order.
    pub corners: [Corner; 4],
    /// Weights such that `image_value = sum(weights[c] * corners[c].value)`.
    pub weights: [f64; 4],
    /// Interpolated value at the image point.
    pub image_value: f64,
    /// Reconstructed value at the node.
    pub node_value: f64,
    /// Present for pressure records.
    pub pressure: Option<PressureFit>,
}

/// Read-only bundle of everything needed to sample near the boundary.
///
/// Shared by the stencil builder and the force integrator.
#[derive(Clone, Copy)]
pub struct Sampler<'a> {
    /// Grid.
    pub grid: &'a StaggeredGrid,
    /// Bodies and markers.
    pub registry: &'a BodyRegistry,
    /// Current tags.
    pub tags: &'a TagSet,
    /// Lagged field.
    pub field: FlowField<'a>,
}

impl<'a> Sampler<'a> {
    /// Bundle the inputs of a stencil or force pass.
    pub fn new(grid: &'a StaggeredGrid, registry: &'a BodyRegistry, tags: &'a TagSet, field: FlowField<'a>) -> Self {
        Self { grid, registry, tags, field }
    }

    /// Advection and unsteady terms at parameter `t` of segment `k`.
    pub fn momentum(&self, k: usize, t: f64, x: f64, y: f64) -> MomentumTerms {
        let (ub, vb) = self.registry.segment_velocity(k, t);
        let (dudt, dvdt) = self.registry.segment_acceleration(k, t, self.field.dt);
        let (dudx, dudy) = field_gradient(self.grid, NodeFamily::U, self.field.u, x, y);
        let (dvdx, dvdy) = field_gradient(self.grid, NodeFamily::V, self.field.v, x, y);
        MomentumTerms {
            dudt,
            ududx: ub * dudx,
            vdudy: vb * dudy,
            dvdt,
            udvdx: ub * dvdx,
            vdvdy: vb * dvdy,
        }
    }

    /// Boundary sample at parameter `t` of segment `k` for a family.
    fn boundary_corner(&self, family: NodeFamily, k: usize, x: f64, y: f64, t: f64) -> Corner {
        let normal = self.registry.segment_normal(k);
        let value = match family {
            NodeFamily::U => self.registry.segment_velocity(k, t).0,
            NodeFamily::V => self.registry.segment_velocity(k, t).1,
            NodeFamily::P => self.momentum(k, t, x, y).normal_gradient(normal),
        };
        Corner { x, y, kind: CornerKind::Boundary { segment: k, t }, value, normal }
    }

    /// Stencil corners around `(px, py)`.
    ///
    /// `segments` are the candidate segments for boundary substitutes;
    /// `exclude` is a node that may not be used as its own corner.
    pub fn corners(
        &self,
        family: NodeFamily,
        px: f64,
        py: f64,
        segments: &[usize],
        exclude: Option<usize>,
        node: usize,
    ) -> IbResult<[Corner; 4]> {
        let xs = self.grid.xs(family);
        let ys = self.grid.ys(family);
        let (ni, nj) = (xs.len(), ys.len());
        if px < xs[0] || px > xs[ni - 1] || py < ys[0] || py > ys[nj - 1] {
            return Err(IbError::DegenerateStencil {
                family,
                node,
                detail: format!("point ({:.6}, {:.6}) outside the {} lattice", px, py, family),
            });
        }
        let i0 = locate_cell_exhaustive(xs, px);
        let j0 = locate_cell_exhaustive(ys, py);
        let ft = self.tags.family(family);
        let values = self.field.values(family);

        let mut out = [Corner { x: 0.0, y: 0.0, kind: CornerKind::Node(0), value: 0.0, normal: (0.0, 0.0) }; 4];
        for (c, (di, dj)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
            let (i, j) = (i0 + di, j0 + dj);
            let idx = self.grid.index(family, i, j);
            let (x, y) = (xs[i], ys[j]);
            let usable = Some(idx) != exclude && matches!(ft.role(idx), NodeRole::Fluid | NodeRole::Hybrid);
            out[c] = if usable {
                Corner { x, y, kind: CornerKind::Node(idx), value: values[idx], normal: (0.0, 0.0) }
            } else {
                let mut candidates: Vec<usize> = segments.to_vec();
                if let Some(k) = ft.segment(idx) {
                    candidates.push(k);
                }
                let (k, bx, by, t) = closest_on(self.registry, &candidates, x, y);
                self.boundary_corner(family, k, bx, by, t)
            };
        }

        let h = self.grid.spacing_at(px, py);
        for a in 0..4 {
            for b in a + 1..4 {
                let both_boundary = matches!(out[a].kind, CornerKind::Boundary { .. })
                    && matches!(out[b].kind, CornerKind::Boundary { .. });
                if both_boundary && (out[a].x - out[b].x).hypot(out[a].y - out[b].y) < 1e-9 * h {
                    return Err(IbError::DegenerateStencil {
                        family,
                        node,
                        detail: format!("corners {} and {} collapse onto the same boundary point", a, b),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Value of a family at `(px, py)` from a substitute-aware bilinear fit.
    pub fn value_at(&self, family: NodeFamily, px: f64, py: f64, segments: &[usize], node: usize) -> IbResult<f64> {
        let corners = self.corners(family, px, py, segments, None, node)?;
        let h = self.grid.spacing_at(px, py);
        let (coeffs, _) = fit(family, &corners, (px, py), h, node)?;
        Ok(coeffs[0])
    }
}

/// Closest point to `(x, y)` over a set of segments: `(segment, bx, by, t)`.
fn closest_on(registry: &BodyRegistry, segments: &[usize], x: f64, y: f64) -> (usize, f64, f64, f64) {
    let mut best = (segments[0], x, y, 0.0, f64::INFINITY);
    for &k in segments {
        let (bx, by, t) = registry.closest_on_segment(k, x, y);
        let d = (bx - x).hypot(by - y);
        if d < best.4 || (d == best.4 && k < best.0) {
            best = (k, bx, by, t, d);
        }
    }
    (best.0, best.1, best.2, best.3)
}

/// Solve the local bilinear fit; returns `(coefficients, weights)`.
///
/// Grid and Dirichlet corners give rows `[1, X, Y, XY]`; pressure boundary
/// corners give Neumann rows `[0, nx, ny, nx Y + ny X]` with the gradient
/// scaled by `h`.
pub fn fit(family: NodeFamily, corners: &[Corner; 4], origin: (f64, f64), h: f64, node: usize) -> IbResult<([f64; 4], [f64; 4])> {
    let mut a = Matrix4::<f64>::zeros();
    let mut q = Vector4::<f64>::zeros();
    for (r, c) in corners.iter().enumerate() {
        let xl = (c.x - origin.0) / h;
        let yl = (c.y - origin.1) / h;
        let neumann = family == NodeFamily::P && matches!(c.kind, CornerKind::Boundary { .. });
        if neumann {
            let (nx, ny) = c.normal;
            a[(r, 0)] = 0.0;
            a[(r, 1)] = nx;
            a[(r, 2)] = ny;
            a[(r, 3)] = nx * yl + ny * xl;
            q[r] = c.value * h;
        } else {
            a[(r, 0)] = 1.0;
            a[(r, 1)] = xl;
            a[(r, 2)] = yl;
            a[(r, 3)] = xl * yl;
            q[r] = c.value;
        }
    }

    let lu = a.lu();
    let det = lu.determinant();
    let inv = if det.abs() > DET_TOL { lu.try_inverse() } else { None };
    let inv = inv.ok_or_else(|| IbError::DegenerateStencil {
        family,
        node,
        detail: format!("singular bilinear fit (det = {:.3e})", det),
    })?;

    let coeffs = inv * q;
    let weights = [inv[(0, 0)], inv[(0, 1)], inv[(0, 2)], inv[(0, 3)]];
    Ok(([coeffs[0], coeffs[1], coeffs[2], coeffs[3]], weights))
}

/// Gradient of a lattice field at `(x, y)` from the bilinear fit of the
/// enclosing cell. Points outside the lattice use the nearest cell.
pub fn field_gradient(grid: &StaggeredGrid, family: NodeFamily, values: &[f64], x: f64, y: f64) -> (f64, f64) {
    let xs = grid.xs(family);
    let ys = grid.ys(family);
    let i0 = locate_cell_exhaustive(xs, x);
    let j0 = locate_cell_exhaustive(ys, y);
    let h = grid.spacing_at(x, y);
    let mut corners = [Corner { x: 0.0, y: 0.0, kind: CornerKind::Node(0), value: 0.0, normal: (0.0, 0.0) }; 4];
    for (c, (di, dj)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
        let idx = grid.index(family, i0 + di, j0 + dj);
        corners[c] = Corner {
            x: xs[i0 + di],
            y: ys[j0 + dj],
            kind: CornerKind::Node(idx),
            value: values[idx],
            normal: (0.0, 0.0),
        };
    }
    // Grid-node rows only: the family choice just selects Dirichlet rows.
    match fit(NodeFamily::U, &corners, (x, y), h, 0) {
        Ok((a, _)) => (a[1] / h, a[2] / h),
        Err(_) => (0.0, 0.0),
    }
}

/// Body intercept of a point on segment `k`, moving to the neighbouring
/// segment when the perpendicular foot falls beyond an end.
pub fn body_intercept(registry: &BodyRegistry, k: usize, px: f64, py: f64) -> (usize, f64, f64, f64) {
    let ((ax, ay), (bx, by)) = registry.segment(k);
    let t = project_parameter(ax, ay, bx, by, px, py);
    let neighbour = if t < 0.0 {
        Some(registry.prev(k))
    } else if t > 1.0 {
        Some(registry.next(k))
    } else {
        None
    };
    if let Some(m) = neighbour {
        let ((cx, cy), (dx, dy)) = registry.segment(m);
        let s = project_parameter(cx, cy, dx, dy, px, py);
        if (0.0..=1.0).contains(&s) {
            return (m, cx + s * (dx - cx), cy + s * (dy - cy), s);
        }
    }
    let t = t.clamp(0.0, 1.0);
    (k, ax + t * (bx - ax), ay + t * (by - ay), t)
}

/// Builds intercept/stencil records for every hybrid and ghost node.
#[derive(Debug, Clone, Copy)]
pub struct StencilBuilder {
    /// Smallest intercept-to-node distance used for the probe, relative to
    /// the local spacing.
    pub min_probe: f64,
}

impl Default for StencilBuilder {
    fn default() -> Self {
        Self { min_probe: 0.1 }
    }
}

impl StencilBuilder {
    /// Records for all hybrid/ghost nodes of one family, in node order.
    pub fn build(&self, sampler: &Sampler<'_>, family: NodeFamily) -> IbResult<Vec<StencilRecord>> {
        sampler.field.validate(sampler.grid)?;
        sampler
            .tags
            .boundary_nodes(family)
            .par_iter()
            .map(|node| self.build_node(sampler, node))
            .collect()
    }

    /// Records for all three families.
    pub fn build_all(&self, sampler: &Sampler<'_>) -> IbResult<[Vec<StencilRecord>; 3]> {
        Ok([
            self.build(sampler, NodeFamily::U)?,
            self.build(sampler, NodeFamily::V)?,
            self.build(sampler, NodeFamily::P)?,
        ])
    }

    fn build_node(&self, sampler: &Sampler<'_>, node: &BoundaryNode) -> IbResult<StencilRecord> {
        let grid = sampler.grid;
        let registry = sampler.registry;
        let family = node.family;
        let (x, y) = grid.position(family, node.i, node.j);
        let h = grid.spacing_at(x, y);

        let (k, bix, biy, t) = body_intercept(registry, node.segment, x, y);
        let d = (x - bix).hypot(y - biy);
        let ghost = node.role == NodeRole::Ghost;
        let normal = if d > 1e-12 * h {
            let s = if ghost { -1.0 } else { 1.0 };
            (s * (x - bix) / d, s * (y - biy) / d)
        } else {
            registry.segment_normal(k)
        };

        let reach = d.max(self.min_probe * h);
        let probe_length = if ghost { reach } else { 2.0 * reach };
        let signed = if ghost { -d } else { d };
        let image = (bix + probe_length * normal.0, biy + probe_length * normal.1);

        let segments = [registry.prev(k), k, registry.next(k)];
        let corners = sampler.corners(family, image.0, image.1, &segments, Some(node.index), node.index)?;
        let (coeffs, weights) = fit(family, &corners, image, grid.spacing_at(image.0, image.1), node.index)?;
        let image_value = coeffs[0];
        let alpha = signed / probe_length;

        let (boundary_value, node_value, pressure) = match family {
            NodeFamily::U | NodeFamily::V => {
                let (ub, vb) = registry.segment_velocity(k, t);
                let bv = if family == NodeFamily::U { ub } else { vb };
                (bv, (1.0 - alpha) * bv + alpha * image_value, None)
            }
            NodeFamily::P => {
                let momentum = sampler.momentum(k, t, bix, biy);
                let dpdn = momentum.normal_gradient(normal);
                let p_bi = image_value - probe_length * dpdn;
                let p_node = image_value + dpdn * (signed - probe_length);
                (p_bi, p_node, Some(PressureFit { coeffs, dpdn, momentum }))
            }
        };

        Ok(StencilRecord {
            family,
            index: node.index,
            role: node.role,
            segment: k,
            node: (x, y),
            intercept: (bix, biy),
            image,
            normal,
            alpha,
            probe_length,
            boundary_value,
            corners,
            weights,
            image_value,
            node_value,
            pressure,
        })
    }
}
