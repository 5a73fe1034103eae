//! Read-only snapshot of the solved flow field.

use crate::error::{IbError, IbResult};
use crate::grid::{NodeFamily, StaggeredGrid};

/// Lagged velocity/pressure field from the previous solver sub-step.
///
/// Each slice is laid out like the corresponding node family of the grid.
#[derive(Debug, Clone, Copy)]
pub struct FlowField<'a> {
    /// u-velocity values.
    pub u: &'a [f64],
    /// v-velocity values.
    pub v: &'a [f64],
    /// Pressure values.
    pub p: &'a [f64],
    /// Sub-step size used for the unsteady boundary term.
    pub dt: f64,
}

impl<'a> FlowField<'a> {
    /// Values of one family.
    pub fn values(&self, family: NodeFamily) -> &'a [f64] {
        match family {
            NodeFamily::U => self.u,
            NodeFamily::V => self.v,
            NodeFamily::P => self.p,
        }
    }

    /// Check the slice lengths against the grid.
    pub fn validate(&self, grid: &StaggeredGrid) -> IbResult<()> {
        for family in NodeFamily::ALL {
            let expected = grid.node_count(family);
            let got = self.values(family).len();
            if got != expected {
                return Err(IbError::InvalidInput(format!(
                    "{} field has {} values, grid expects {}",
                    family, got, expected
                )));
            }
        }
        if self.dt.is_nan() || self.dt < 0.0 {
            return Err(IbError::InvalidInput(format!("invalid sub-step size {}", self.dt)));
        }
        Ok(())
    }
}

/// Owned field storage, convenient for drivers and tests.
#[derive(Debug, Clone, Default)]
pub struct FieldBuffers {
    /// u-velocity values.
    pub u: Vec<f64>,
    /// v-velocity values.
    pub v: Vec<f64>,
    /// Pressure values.
    pub p: Vec<f64>,
}

impl FieldBuffers {
    /// Zero field sized for `grid`.
    pub fn zeros(grid: &StaggeredGrid) -> Self {
        Self {
            u: vec![0.0; grid.node_count(NodeFamily::U)],
            v: vec![0.0; grid.node_count(NodeFamily::V)],
            p: vec![0.0; grid.node_count(NodeFamily::P)],
        }
    }

    /// Fill every family from analytic functions of position.
    pub fn from_fn(
        grid: &StaggeredGrid,
        u: impl Fn(f64, f64) -> f64,
        v: impl Fn(f64, f64) -> f64,
        p: impl Fn(f64, f64) -> f64,
    ) -> Self {
        let sample = |family: NodeFamily, f: &dyn Fn(f64, f64) -> f64| -> Vec<f64> {
            let (ni, nj) = grid.dims(family);
            (0..ni * nj)
                .map(|idx| {
                    let (x, y) = grid.position(family, idx % ni, idx / ni);
                    f(x, y)
                })
                .collect()
        };
        Self {
            u: sample(NodeFamily::U, &u),
            v: sample(NodeFamily::V, &v),
            p: sample(NodeFamily::P, &p),
        }
    }

    /// Borrow as a [`FlowField`].
    pub fn view(&self, dt: f64) -> FlowField<'_> {
        FlowField { u: &self.u, v: &self.v, p: &self.p, dt }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_validated() {
        let grid = StaggeredGrid::uniform(4, 4, 0.0, 1.0, 0.0, 1.0).unwrap();
        let buffers = FieldBuffers::zeros(&grid);
        assert!(buffers.view(0.1).validate(&grid).is_ok());

        let short = FlowField { u: &buffers.u[1..], v: &buffers.v, p: &buffers.p, dt: 0.1 };
        assert!(short.validate(&grid).is_err());
    }

    #[test]
    fn analytic_fill_uses_family_positions() {
        let grid = StaggeredGrid::uniform(4, 4, 0.0, 1.0, 0.0, 1.0).unwrap();
        let f = FieldBuffers::from_fn(&grid, |x, _| x, |_, y| y, |x, y| x + y);
        assert_eq!(f.u[0], 0.25);
        assert_eq!(f.v[0], 0.25);
        assert_eq!(f.p[0], 0.25);
    }
}
