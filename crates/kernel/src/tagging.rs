//! Node tagger: classifies staggered-grid nodes around each body.
//!
//! Every u, v and p node inside a body's covering rectangle gets exactly one
//! role:
//!
//! - **fluid-normal**: outside the body, all axis neighbours outside;
//! - **hybrid**: outside, with at least one axis neighbour inside;
//! - **ghost**: inside, with at least one axis neighbour outside;
//! - **solid-interior**: inside, all axis neighbours inside.
//!
//! Inside-ness is a crossing-number ray cast using the half-open straddle
//! rule `(a.y <= y) != (b.y <= y)`. A node lying on the boundary (within
//! `on_boundary_tol` times the local spacing) counts as inside, so a segment
//! that coincides with a grid line classifies its nodes one way only.
//!
//! Inside-ness is decided against the union of all bodies, so two bodies
//! closer than a cell never disagree about a node; a solid-interior node
//! records the lowest-id body containing it. All arrays are reset at the
//! start of every pass, which clears tags left behind by a previous, larger
//! boundary position.
//!
//! Hybrid and ghost nodes record the marker segment whose crossing of the
//! axis line towards the opposite neighbour is nearest the node (ties go to
//! the lower segment index). The result depends only on geometry, never on
//! iteration order.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::body::{project_parameter, Body, BodyRegistry};
use crate::error::{IbError, IbResult};
use crate::grid::{NodeFamily, StaggeredGrid};

/// Tag value for "not relevant to any boundary".
pub const UNTAGGED: i32 = -1;

/// Logical role of a node relative to the immersed boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeRole {
    /// Ordinary fluid node, unmodified in the linear system.
    Fluid,
    /// Fluid-side node adjacent to the boundary.
    Hybrid,
    /// Solid-side node adjacent to the boundary.
    Ghost,
    /// Node fully inside a body.
    Solid,
}

/// Axis of the line along which a boundary crossing was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    /// Horizontal line through the node (neighbour at `i +- 1`).
    X,
    /// Vertical line through the node (neighbour at `j +- 1`).
    Y,
}

/// Tag arrays of one node family.
///
/// Each array is indexed like the corresponding field. `hybrid` and `ghost`
/// hold the producing segment index, `solid` holds the owning body id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyTags {
    /// Node family these arrays describe.
    pub family: NodeFamily,
    /// Segment index for hybrid nodes, `-1` otherwise.
    pub hybrid: Vec<i32>,
    /// Segment index for ghost nodes, `-1` otherwise.
    pub ghost: Vec<i32>,
    /// Body id for solid-interior nodes, `-1` otherwise.
    pub solid: Vec<i32>,
}

impl FamilyTags {
    /// Untagged arrays for `n` nodes.
    pub fn new(family: NodeFamily, n: usize) -> Self {
        Self {
            family,
            hybrid: vec![UNTAGGED; n],
            ghost: vec![UNTAGGED; n],
            solid: vec![UNTAGGED; n],
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.hybrid.len()
    }

    /// Return `true` if the family has no nodes.
    pub fn is_empty(&self) -> bool {
        self.hybrid.is_empty()
    }

    /// Reset every node to fluid-normal.
    pub fn reset(&mut self) {
        self.hybrid.fill(UNTAGGED);
        self.ghost.fill(UNTAGGED);
        self.solid.fill(UNTAGGED);
    }

    /// Role of node `idx`.
    pub fn role(&self, idx: usize) -> NodeRole {
        debug_assert!(self.checked_role(idx).is_ok(), "node {} has several roles", idx);
        if self.hybrid[idx] >= 0 {
            NodeRole::Hybrid
        } else if self.ghost[idx] >= 0 {
            NodeRole::Ghost
        } else if self.solid[idx] >= 0 {
            NodeRole::Solid
        } else {
            NodeRole::Fluid
        }
    }

    /// Role of node `idx`, failing if more than one array claims it.
    pub fn checked_role(&self, idx: usize) -> IbResult<NodeRole> {
        let claims = [self.hybrid[idx], self.ghost[idx], self.solid[idx]]
            .iter()
            .filter(|&&t| t >= 0)
            .count();
        match claims {
            0 => Ok(NodeRole::Fluid),
            1 if self.hybrid[idx] >= 0 => Ok(NodeRole::Hybrid),
            1 if self.ghost[idx] >= 0 => Ok(NodeRole::Ghost),
            1 => Ok(NodeRole::Solid),
            roles => Err(IbError::ClassificationInconsistency {
                family: self.family,
                node: idx,
                roles,
            }),
        }
    }

    /// Segment index recorded for a hybrid or ghost node.
    pub fn segment(&self, idx: usize) -> Option<usize> {
        let t = self.hybrid[idx].max(self.ghost[idx]);
        (t >= 0).then_some(t as usize)
    }

    /// Check that every node holds exactly one role.
    pub fn verify_partition(&self) -> IbResult<()> {
        (0..self.len()).try_for_each(|idx| self.checked_role(idx).map(|_| ()))
    }

    /// Number of nodes with the given role.
    pub fn count(&self, role: NodeRole) -> usize {
        (0..self.len()).filter(|&idx| self.role(idx) == role).count()
    }

    /// Number of nodes whose tags differ from `other`.
    pub fn changed_from(&self, other: &FamilyTags) -> usize {
        if self.len() != other.len() {
            return self.len().max(other.len());
        }
        (0..self.len())
            .filter(|&idx| {
                self.hybrid[idx] != other.hybrid[idx]
                    || self.ghost[idx] != other.ghost[idx]
                    || self.solid[idx] != other.solid[idx]
            })
            .count()
    }
}

/// Geometric record of a hybrid or ghost node produced by the tagger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryNode {
    /// Node family.
    pub family: NodeFamily,
    /// Flat node index.
    pub index: usize,
    /// Node column.
    pub i: usize,
    /// Node row.
    pub j: usize,
    /// Hybrid or ghost.
    pub role: NodeRole,
    /// Body the crossing belongs to.
    pub body: usize,
    /// Global index of the crossed segment.
    pub segment: usize,
    /// Axis of the crossing line.
    pub axis: Axis,
    /// Crossing point of the segment with the axis line.
    pub crossing: (f64, f64),
    /// Neighbour `(i, j)` on the far side of the crossing.
    pub partner: (usize, usize),
}

/// Tag arrays for all three families plus the boundary-node lists.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSet {
    /// u-velocity tags.
    pub u: FamilyTags,
    /// v-velocity tags.
    pub v: FamilyTags,
    /// Pressure tags.
    pub p: FamilyTags,
    boundary: [Vec<BoundaryNode>; 3],
}

impl TagSet {
    /// Untagged arrays sized for `grid`.
    pub fn new(grid: &StaggeredGrid) -> Self {
        Self {
            u: FamilyTags::new(NodeFamily::U, grid.node_count(NodeFamily::U)),
            v: FamilyTags::new(NodeFamily::V, grid.node_count(NodeFamily::V)),
            p: FamilyTags::new(NodeFamily::P, grid.node_count(NodeFamily::P)),
            boundary: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    fn slot(family: NodeFamily) -> usize {
        match family {
            NodeFamily::U => 0,
            NodeFamily::V => 1,
            NodeFamily::P => 2,
        }
    }

    /// Tag arrays of a family.
    pub fn family(&self, family: NodeFamily) -> &FamilyTags {
        match family {
            NodeFamily::U => &self.u,
            NodeFamily::V => &self.v,
            NodeFamily::P => &self.p,
        }
    }

    fn family_mut(&mut self, family: NodeFamily) -> &mut FamilyTags {
        match family {
            NodeFamily::U => &mut self.u,
            NodeFamily::V => &mut self.v,
            NodeFamily::P => &mut self.p,
        }
    }

    /// Hybrid and ghost nodes of a family, ordered by flat index.
    pub fn boundary_nodes(&self, family: NodeFamily) -> &[BoundaryNode] {
        &self.boundary[Self::slot(family)]
    }

    /// Check the partition invariant for all families.
    pub fn verify_partition(&self) -> IbResult<()> {
        self.u.verify_partition()?;
        self.v.verify_partition()?;
        self.p.verify_partition()
    }
}

/// Ray-casting node classifier.
#[derive(Debug, Clone, Copy)]
pub struct NodeTagger {
    /// Distance to the boundary, relative to the local spacing, below which a
    /// node counts as lying on it (and therefore inside).
    pub on_boundary_tol: f64,
}

impl Default for NodeTagger {
    fn default() -> Self {
        Self { on_boundary_tol: 1e-9 }
    }
}

/// Per-node outcome computed in parallel and scattered afterwards.
struct Classified {
    index: usize,
    role: NodeRole,
    /// Body containing the node (solid-interior nodes only).
    owner: usize,
    boundary: Option<BoundaryNode>,
}

/// Neighbour `(i, j)` across the boundary, its axis and the body whose
/// boundary lies in between.
type Opposite = (usize, usize, Axis, usize);

impl NodeTagger {
    /// Classify all nodes of all families for every body.
    ///
    /// The covering rectangles and unscaled boxes must be current (see
    /// [`crate::locate::MarkerLocator::update`]).
    pub fn tag(&self, grid: &StaggeredGrid, registry: &BodyRegistry, tags: &mut TagSet) -> IbResult<()> {
        for family in NodeFamily::ALL {
            let mut shell: BTreeMap<usize, BoundaryNode> = BTreeMap::new();
            let ft = tags.family_mut(family);
            // Clears stale tags of a previous, larger boundary position.
            ft.reset();

            // Roles come from the union of all bodies, so a node covered by
            // several rectangles gets the same result from each of them.
            for body in &registry.bodies {
                for c in self.classify_rectangle(grid, registry, family, body) {
                    match (c.role, c.boundary) {
                        (NodeRole::Solid, _) => ft.solid[c.index] = c.owner as i32,
                        (NodeRole::Hybrid, Some(node)) => {
                            ft.hybrid[c.index] = node.segment as i32;
                            shell.insert(c.index, node);
                        }
                        (NodeRole::Ghost, Some(node)) => {
                            ft.ghost[c.index] = node.segment as i32;
                            shell.insert(c.index, node);
                        }
                        _ => {}
                    }
                }
            }

            #[cfg(debug_assertions)]
            ft.verify_partition()?;

            tracing::debug!(
                family = %family,
                shell = shell.len(),
                "tagged family"
            );
            tags.boundary[TagSet::slot(family)] = shell.into_values().collect();
        }
        Ok(())
    }

    fn classify_rectangle(
        &self,
        grid: &StaggeredGrid,
        registry: &BodyRegistry,
        family: NodeFamily,
        body: &Body,
    ) -> Vec<Classified> {
        let (ni, nj) = grid.dims(family);
        let i0 = body.start_i.min(ni);
        let i1 = (body.start_i + body.num_cells_x).min(ni);
        let j0 = body.start_j.min(nj);
        let j1 = (body.start_j + body.num_cells_y).min(nj);
        if i0 >= i1 || j0 >= j1 {
            return Vec::new();
        }

        // Owning body of every node in the rectangle grown by one node.
        let mi0 = i0.saturating_sub(1);
        let mj0 = j0.saturating_sub(1);
        let mi1 = (i1 + 1).min(ni);
        let mj1 = (j1 + 1).min(nj);
        let mw = mi1 - mi0;
        let xs = grid.xs(family);
        let ys = grid.ys(family);
        let mask: Vec<Option<usize>> = (0..mw * (mj1 - mj0))
            .into_par_iter()
            .map(|m| {
                let i = mi0 + m % mw;
                let j = mj0 + m / mw;
                let tol = self.on_boundary_tol * grid.spacing_at(xs[i], ys[j]);
                body_containing(registry, xs[i], ys[j], tol)
            })
            .collect();
        let owner = |i: usize, j: usize| mask[(j - mj0) * mw + (i - mi0)];

        let w = i1 - i0;
        (0..w * (j1 - j0))
            .into_par_iter()
            .filter_map(|n| {
                let i = i0 + n % w;
                let j = j0 + n / w;
                let index = grid.index(family, i, j);
                let here = owner(i, j);

                // Opposite neighbours with the body whose boundary separates
                // them from the node.
                let opposite: Vec<Opposite> = neighbours(i, j, ni, nj)
                    .into_iter()
                    .flatten()
                    .filter_map(|(ii, jj, axis)| match (here, owner(ii, jj)) {
                        (Some(b), None) => Some((ii, jj, axis, b)),
                        (None, Some(b)) => Some((ii, jj, axis, b)),
                        _ => None,
                    })
                    .collect();
                // Off-grid neighbours count as outside.
                let off_grid_outside = here.is_some() && (i == 0 || j == 0 || i + 1 == ni || j + 1 == nj);

                let role = match (here.is_some(), opposite.is_empty() && !off_grid_outside) {
                    (true, true) => NodeRole::Solid,
                    (true, false) => NodeRole::Ghost,
                    (false, false) => NodeRole::Hybrid,
                    (false, true) => return None,
                };

                let boundary = matches!(role, NodeRole::Hybrid | NodeRole::Ghost).then(|| {
                    let (x, y) = (xs[i], ys[j]);
                    let (segment, crossing, partner, axis) = nearest_crossing(registry, x, y, xs, ys, &opposite)
                        .unwrap_or_else(|| {
                            let fallback = (i, j, Axis::X, here.unwrap_or(0));
                            let (pi, pj, axis, b) = opposite.first().copied().unwrap_or(fallback);
                            let (k, cx, cy) = nearest_segment(registry, &registry.bodies[b], x, y);
                            (k, (cx, cy), (pi, pj), axis)
                        });
                    BoundaryNode {
                        family,
                        index,
                        i,
                        j,
                        role,
                        body: registry.markers.body[segment],
                        segment,
                        axis,
                        crossing,
                        partner,
                    }
                });

                Some(Classified { index, role, owner: here.unwrap_or(0), boundary })
            })
            .collect()
    }
}

fn neighbours(i: usize, j: usize, ni: usize, nj: usize) -> [Option<(usize, usize, Axis)>; 4] {
    [
        (i > 0).then(|| (i - 1, j, Axis::X)),
        (i + 1 < ni).then(|| (i + 1, j, Axis::X)),
        (j > 0).then(|| (i, j - 1, Axis::Y)),
        (j + 1 < nj).then(|| (i, j + 1, Axis::Y)),
    ]
}

/// Lowest-id body containing the point, with the on-boundary tie-break.
pub fn body_containing(registry: &BodyRegistry, px: f64, py: f64, tol: f64) -> Option<usize> {
    registry.bodies.iter().position(|body| {
        let bb = &body.unscaled;
        px >= bb.xmin - tol
            && px <= bb.xmax + tol
            && py >= bb.ymin - tol
            && py <= bb.ymax + tol
            && point_in_body(registry, body, px, py, tol)
    })
}

/// Crossing-number inside test with the on-boundary-is-inside tie-break.
pub fn point_in_body(registry: &BodyRegistry, body: &Body, px: f64, py: f64, tol: f64) -> bool {
    let mut inside = false;
    for k in body.markers() {
        let ((ax, ay), (bx, by)) = registry.segment(k);
        if tol > 0.0 {
            let t = project_parameter(ax, ay, bx, by, px, py).clamp(0.0, 1.0);
            let d = (ax + t * (bx - ax) - px).hypot(ay + t * (by - ay) - py);
            if d <= tol {
                return true;
            }
        }
        if (ay <= py) != (by <= py) {
            let x_int = ax + (py - ay) * (bx - ax) / (by - ay);
            if x_int > px {
                inside = !inside;
            }
        }
    }
    inside
}

type Crossing = (usize, (f64, f64), (usize, usize), Axis);

/// Nearest crossing of the axis lines from the node to each opposite
/// neighbour with the separating body. Ties go to the lower segment index.
fn nearest_crossing(
    registry: &BodyRegistry,
    x: f64,
    y: f64,
    xs: &[f64],
    ys: &[f64],
    opposite: &[Opposite],
) -> Option<Crossing> {
    let mut best: Option<(f64, Crossing)> = None;
    for &(pi, pj, axis, b) in opposite {
        for k in registry.bodies[b].markers() {
            let ((ax, ay), (bx, by)) = registry.segment(k);
            let hit = match axis {
                Axis::X => {
                    if (ay <= y) == (by <= y) {
                        continue;
                    }
                    let cx = ax + (y - ay) * (bx - ax) / (by - ay);
                    let (lo, hi) = (x.min(xs[pi]), x.max(xs[pi]));
                    (cx >= lo && cx <= hi).then_some(((cx - x).abs(), (cx, y)))
                }
                Axis::Y => {
                    if (ax <= x) == (bx <= x) {
                        continue;
                    }
                    let cy = ay + (x - ax) * (by - ay) / (bx - ax);
                    let (lo, hi) = (y.min(ys[pj]), y.max(ys[pj]));
                    (cy >= lo && cy <= hi).then_some(((cy - y).abs(), (x, cy)))
                }
            };
            if let Some((dist, point)) = hit {
                let better = match &best {
                    None => true,
                    Some((d, c)) => dist < *d || (dist == *d && k < c.0),
                };
                if better {
                    best = Some((dist, (k, point, (pi, pj), axis)));
                }
            }
        }
    }
    best.map(|(_, c)| c)
}

/// Segment of the body closest to a point, with the closest point on it.
pub fn nearest_segment(registry: &BodyRegistry, body: &Body, px: f64, py: f64) -> (usize, f64, f64) {
    let mut best = (body.offset, f64::INFINITY, px, py);
    for k in body.markers() {
        let (cx, cy, _) = registry.closest_on_segment(k, px, py);
        let d = (cx - px).hypot(cy - py);
        if d < best.1 {
            best = (k, d, cx, cy);
        }
    }
    (best.0, best.2, best.3)
}
