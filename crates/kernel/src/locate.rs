//! Bounding-box locator: marker-to-cell lookup and per-body covering boxes.
//!
//! Marker lookup is incremental. Marker 0 starts from its cell of the
//! previous step, every following marker starts from the cell of the marker
//! before it, and the index walks one cell at a time until the marker lies in
//! the half-open cell `[c[i], c[i+1])`. This is O(1) amortised per marker as
//! long as markers are ordered along the polyline and move less than a cell
//! per step; the latter is checked at runtime (`max_cell_jump`).

use crate::body::{BodyRegistry, BoundingBox};
use crate::error::{IbError, IbResult};
use crate::grid::StaggeredGrid;

/// Index of the half-open cell `[c[i], c[i+1])` containing `value`, by
/// exhaustive search. Values beyond either end are clamped to the first or
/// last cell; the last face belongs to the last cell.
pub fn locate_cell_exhaustive(coords: &[f64], value: f64) -> usize {
    let cells = coords.len().saturating_sub(1).max(1);
    coords
        .partition_point(|&c| c <= value)
        .saturating_sub(1)
        .min(cells - 1)
}

/// Walk from cell `start` to the cell containing `value`.
///
/// Fails if `value` lies outside the coordinate range, since the walk would
/// run off the grid.
pub fn walk_cell(coords: &[f64], start: usize, value: f64, marker: usize, axis: char) -> IbResult<usize> {
    let cells = coords.len() - 1;
    if !(value >= coords[0] && value <= coords[cells]) {
        return Err(IbError::GeometrySearch {
            marker,
            axis,
            detail: format!(
                "coordinate {} outside grid range [{}, {}]",
                value, coords[0], coords[cells]
            ),
        });
    }

    let mut i = start.min(cells - 1);
    while value < coords[i] {
        i -= 1;
    }
    while i + 1 < cells && value >= coords[i + 1] {
        i += 1;
    }
    Ok(i)
}

/// Stateful marker/box locator reused across time steps.
#[derive(Debug, Clone)]
pub struct MarkerLocator {
    /// Largest allowed change of a marker's cell index between two calls.
    pub max_cell_jump: usize,
    /// Scale factor for the covering boxes (> 1).
    pub scale: f64,
    initialized: bool,
}

impl MarkerLocator {
    /// Create a locator with the given covering factor and jump limit.
    pub fn new(scale: f64, max_cell_jump: usize) -> Self {
        Self { max_cell_jump, scale, initialized: false }
    }

    /// Whether a previous lookup exists to start the walk from.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Forget the previous lookup; the next call starts from an exhaustive
    /// search and skips the displacement check.
    pub fn reset(&mut self) {
        self.initialized = false;
    }

    /// Run both lookups for the current marker positions.
    pub fn update(&mut self, grid: &StaggeredGrid, registry: &mut BodyRegistry) -> IbResult<()> {
        self.calculate_cell_indices(grid, registry)?;
        self.calculate_bounding_boxes(grid, registry)?;
        self.initialized = true;
        Ok(())
    }

    /// Store the enclosing pressure cell `(I, J)` of every marker.
    pub fn calculate_cell_indices(&self, grid: &StaggeredGrid, registry: &mut BodyRegistry) -> IbResult<()> {
        let markers = &mut registry.markers;
        let n = markers.len();
        if n == 0 {
            return Ok(());
        }

        let (mut i, mut j) = if self.initialized {
            (markers.cell_i[0], markers.cell_j[0])
        } else {
            (
                locate_cell_exhaustive(&grid.x, markers.x[0]),
                locate_cell_exhaustive(&grid.y, markers.y[0]),
            )
        };

        let mut new_i = Vec::with_capacity(n);
        let mut new_j = Vec::with_capacity(n);
        for k in 0..n {
            i = walk_cell(&grid.x, i, markers.x[k], k, 'x')?;
            j = walk_cell(&grid.y, j, markers.y[k], k, 'y')?;

            if self.initialized {
                let (pi, pj) = (markers.cell_i[k], markers.cell_j[k]);
                if !within_reach(&grid.x, pi, markers.x[k], self.max_cell_jump) {
                    return Err(jump_error(k, 'x', i.abs_diff(pi), self.max_cell_jump));
                }
                if !within_reach(&grid.y, pj, markers.y[k], self.max_cell_jump) {
                    return Err(jump_error(k, 'y', j.abs_diff(pj), self.max_cell_jump));
                }
            }
            new_i.push(i);
            new_j.push(j);
        }

        markers.cell_i = new_i;
        markers.cell_j = new_j;
        Ok(())
    }

    /// Recompute every body's scaled bounding box and covering rectangle.
    pub fn calculate_bounding_boxes(&self, grid: &StaggeredGrid, registry: &mut BodyRegistry) -> IbResult<()> {
        let grow = 0.5 * (self.scale - 1.0);
        let (gx0, gx1) = (grid.x[0], grid.x[grid.nx]);
        let (gy0, gy1) = (grid.y[0], grid.y[grid.ny]);

        for (b, body) in registry.bodies.iter_mut().enumerate() {
            let range = body.markers();
            let xs = &registry.markers.x[range.clone()];
            let ys = &registry.markers.y[range];

            let mut unscaled = BoundingBox {
                xmin: xs[0],
                xmax: xs[0],
                ymin: ys[0],
                ymax: ys[0],
            };
            for (&x, &y) in xs.iter().zip(ys) {
                unscaled.xmin = unscaled.xmin.min(x);
                unscaled.xmax = unscaled.xmax.max(x);
                unscaled.ymin = unscaled.ymin.min(y);
                unscaled.ymax = unscaled.ymax.max(y);
            }

            let cx = 0.5 * (unscaled.xmin + unscaled.xmax);
            let cy = 0.5 * (unscaled.ymin + unscaled.ymax);
            let h = grid.spacing_at(cx, cy);
            // A flat body still needs a box with some extent to scale.
            let width = (unscaled.xmax - unscaled.xmin).max(h);
            let height = (unscaled.ymax - unscaled.ymin).max(h);

            let bbox = BoundingBox {
                xmin: unscaled.xmin - grow * width,
                xmax: unscaled.xmax + grow * width,
                ymin: unscaled.ymin - grow * height,
                ymax: unscaled.ymax + grow * height,
            };

            let start_i = walk_cell(&grid.x, body.start_i, bbox.xmin.clamp(gx0, gx1), b, 'x')?;
            let start_j = walk_cell(&grid.y, body.start_j, bbox.ymin.clamp(gy0, gy1), b, 'y')?;

            let mut end_i = start_i;
            while end_i < grid.nx && grid.x[end_i] < bbox.xmax {
                end_i += 1;
            }
            let mut end_j = start_j;
            while end_j < grid.ny && grid.y[end_j] < bbox.ymax {
                end_j += 1;
            }

            // One guard cell on each side keeps the outermost hybrid shell
            // and its neighbours inside the rectangle.
            body.start_i = start_i.saturating_sub(1);
            body.start_j = start_j.saturating_sub(1);
            body.num_cells_x = (end_i + 1).min(grid.nx) - body.start_i;
            body.num_cells_y = (end_j + 1).min(grid.ny) - body.start_j;
            body.unscaled = unscaled;
            body.bbox = bbox;

            tracing::debug!(
                body = b,
                start_i = body.start_i,
                start_j = body.start_j,
                cells_x = body.num_cells_x,
                cells_y = body.num_cells_y,
                "covering rectangle"
            );
        }
        Ok(())
    }
}

/// Whether `value` lies within `jump` cells of cell `prev`, measured in
/// coordinates. A marker sitting on a face that moves exactly `jump` cells may
/// round into the next cell; the face tolerance keeps that step legal.
fn within_reach(coords: &[f64], prev: usize, value: f64, jump: usize) -> bool {
    let cells = coords.len() - 1;
    let prev = prev.min(cells - 1);
    let lo = coords[prev.saturating_sub(jump)];
    let hi = coords[(prev + 1 + jump).min(cells)];
    let tol = 1e-9 * (coords[prev + 1] - coords[prev]);
    value >= lo - tol && value <= hi + tol
}

fn jump_error(marker: usize, axis: char, jump: usize, limit: usize) -> IbError {
    IbError::GeometrySearch {
        marker,
        axis,
        detail: format!(
            "marker moved {} cells in one step (limit {}); reduce the time step",
            jump, limit
        ),
    }
}
