//! Non-uniform staggered Cartesian grid.
//!
//! Pressure lives at cell centres, u-velocity on the interior vertical faces
//! and v-velocity on the interior horizontal faces (MAC layout). Every field
//! family is stored as a flat row-major array (`j` outer, `i` inner).

use serde::{Deserialize, Serialize};

use crate::error::{IbError, IbResult};

/// Which staggered field a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeFamily {
    /// x-velocity nodes on vertical cell faces.
    U,
    /// y-velocity nodes on horizontal cell faces.
    V,
    /// Pressure nodes at cell centres.
    P,
}

impl NodeFamily {
    /// All three families, in the order the tagger processes them.
    pub const ALL: [NodeFamily; 3] = [NodeFamily::U, NodeFamily::V, NodeFamily::P];
}

impl std::fmt::Display for NodeFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeFamily::U => "u",
            NodeFamily::V => "v",
            NodeFamily::P => "p",
        };
        f.write_str(name)
    }
}

/// Staggered grid with per-family coordinate arrays.
#[derive(Debug, Clone)]
pub struct StaggeredGrid {
    /// Number of pressure cells in x.
    pub nx: usize,
    /// Number of pressure cells in y.
    pub ny: usize,
    /// Cell face x-coordinates, `nx + 1` entries.
    pub x: Vec<f64>,
    /// Cell face y-coordinates, `ny + 1` entries.
    pub y: Vec<f64>,
    /// Cell widths, `nx` entries.
    pub dx: Vec<f64>,
    /// Cell heights, `ny` entries.
    pub dy: Vec<f64>,
    xp: Vec<f64>,
    yp: Vec<f64>,
    xu: Vec<f64>,
    yv: Vec<f64>,
}

impl StaggeredGrid {
    /// Build a grid from explicit face coordinates.
    ///
    /// Both arrays must be strictly increasing and describe at least three
    /// cells per direction, so every family has two nodes per axis for a
    /// bilinear cell.
    pub fn from_faces(x: Vec<f64>, y: Vec<f64>) -> IbResult<Self> {
        if x.len() < 4 || y.len() < 4 {
            return Err(IbError::InvalidInput(format!(
                "grid needs at least 3 cells per direction, got {}x{}",
                x.len().saturating_sub(1),
                y.len().saturating_sub(1)
            )));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) || y.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(IbError::InvalidInput(
                "grid face coordinates must be strictly increasing".to_string(),
            ));
        }

        let nx = x.len() - 1;
        let ny = y.len() - 1;
        let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();
        let xp: Vec<f64> = x.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let yp: Vec<f64> = y.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let xu = x[1..nx].to_vec();
        let yv = y[1..ny].to_vec();

        Ok(Self { nx, ny, x, y, dx, dy, xp, yp, xu, yv })
    }

    /// Uniform grid with `nx * ny` cells covering `[x_min, x_max] x [y_min, y_max]`.
    pub fn uniform(nx: usize, ny: usize, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> IbResult<Self> {
        if nx == 0 || ny == 0 || !(x_max > x_min) || !(y_max > y_min) {
            return Err(IbError::InvalidInput(format!(
                "invalid uniform grid {}x{} over [{}, {}]x[{}, {}]",
                nx, ny, x_min, x_max, y_min, y_max
            )));
        }
        let hx = (x_max - x_min) / nx as f64;
        let hy = (y_max - y_min) / ny as f64;
        let x = (0..=nx).map(|i| x_min + i as f64 * hx).collect();
        let y = (0..=ny).map(|j| y_min + j as f64 * hy).collect();
        Self::from_faces(x, y)
    }

    /// Node x-coordinates for a family.
    pub fn xs(&self, family: NodeFamily) -> &[f64] {
        match family {
            NodeFamily::U => &self.xu,
            NodeFamily::V | NodeFamily::P => &self.xp,
        }
    }

    /// Node y-coordinates for a family.
    pub fn ys(&self, family: NodeFamily) -> &[f64] {
        match family {
            NodeFamily::V => &self.yv,
            NodeFamily::U | NodeFamily::P => &self.yp,
        }
    }

    /// Number of nodes of a family along x and y.
    pub fn dims(&self, family: NodeFamily) -> (usize, usize) {
        (self.xs(family).len(), self.ys(family).len())
    }

    /// Total node count of a family (length of its field/tag arrays).
    pub fn node_count(&self, family: NodeFamily) -> usize {
        let (ni, nj) = self.dims(family);
        ni * nj
    }

    /// Flat index of node `(i, j)` of a family.
    #[inline]
    pub fn index(&self, family: NodeFamily, i: usize, j: usize) -> usize {
        j * self.xs(family).len() + i
    }

    /// Inverse of [`StaggeredGrid::index`].
    #[inline]
    pub fn ij(&self, family: NodeFamily, idx: usize) -> (usize, usize) {
        let ni = self.xs(family).len();
        (idx % ni, idx / ni)
    }

    /// Coordinates of node `(i, j)` of a family.
    #[inline]
    pub fn position(&self, family: NodeFamily, i: usize, j: usize) -> (f64, f64) {
        (self.xs(family)[i], self.ys(family)[j])
    }

    /// Local mesh spacing around pressure cell `(i, j)`: the larger of the
    /// cell's width and height. Indices are clamped to the grid.
    pub fn spacing(&self, i: usize, j: usize) -> f64 {
        let i = i.min(self.nx - 1);
        let j = j.min(self.ny - 1);
        self.dx[i].max(self.dy[j])
    }

    /// Local spacing at an arbitrary point (clamped to the grid).
    pub fn spacing_at(&self, px: f64, py: f64) -> f64 {
        let i = crate::locate::locate_cell_exhaustive(&self.x, px);
        let j = crate::locate::locate_cell_exhaustive(&self.y, py);
        self.spacing(i, j)
    }
}
