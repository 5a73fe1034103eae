//! Prescribed rigid-body motion.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use kernel::BodyRegistry;

/// Direction of an oscillation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionAxis {
    /// Along x.
    X,
    /// Along y.
    Y,
}

/// Kinematics of one body relative to its reference markers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Motion {
    /// Fixed in place.
    #[default]
    Static,
    /// Constant velocity.
    Translation {
        /// Velocity [u, v].
        velocity: [f64; 2],
    },
    /// Harmonic oscillation `A sin(2 pi f t)` along one axis.
    Oscillation {
        /// Amplitude.
        amplitude: f64,
        /// Frequency in cycles per unit time.
        frequency: f64,
        /// Direction.
        axis: MotionAxis,
    },
}

impl Motion {
    /// Check the parameters.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Motion::Static => Ok(()),
            Motion::Translation { velocity } => {
                if velocity.iter().all(|v| v.is_finite()) {
                    Ok(())
                } else {
                    Err("translation velocity must be finite".to_string())
                }
            }
            Motion::Oscillation { amplitude, frequency, .. } => {
                if !amplitude.is_finite() || !frequency.is_finite() || frequency < 0.0 {
                    Err("oscillation needs a finite amplitude and a non-negative frequency".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Displacement from the reference position at time `t`.
    pub fn displacement(&self, t: f64) -> [f64; 2] {
        match *self {
            Motion::Static => [0.0, 0.0],
            Motion::Translation { velocity } => [velocity[0] * t, velocity[1] * t],
            Motion::Oscillation { amplitude, frequency, axis } => {
                let d = amplitude * (2.0 * PI * frequency * t).sin();
                match axis {
                    MotionAxis::X => [d, 0.0],
                    MotionAxis::Y => [0.0, d],
                }
            }
        }
    }

    /// Velocity at time `t`.
    pub fn velocity(&self, t: f64) -> [f64; 2] {
        match *self {
            Motion::Static => [0.0, 0.0],
            Motion::Translation { velocity } => velocity,
            Motion::Oscillation { amplitude, frequency, axis } => {
                let w = 2.0 * PI * frequency;
                let s = amplitude * w * (w * t).cos();
                match axis {
                    MotionAxis::X => [s, 0.0],
                    MotionAxis::Y => [0.0, s],
                }
            }
        }
    }

    /// Largest speed reached by the motion.
    pub fn peak_speed(&self) -> f64 {
        match *self {
            Motion::Static => 0.0,
            Motion::Translation { velocity } => velocity[0].hypot(velocity[1]),
            Motion::Oscillation { amplitude, frequency, .. } => (amplitude * 2.0 * PI * frequency).abs(),
        }
    }

    /// Move the markers of `body` to time `t`.
    ///
    /// The caller stores the previous sub-step first
    /// ([`kernel::Markers::store_substep`]).
    pub fn apply(&self, registry: &mut BodyRegistry, body: usize, t: f64) {
        let [dx, dy] = self.displacement(t);
        let [u, v] = self.velocity(t);
        let range = registry.bodies[body].markers();
        let m = &mut registry.markers;
        for k in range {
            m.x[k] = m.x0[k] + dx;
            m.y[k] = m.y0[k] + dy;
            m.ub[k] = u;
            m.vb[k] = v;
        }
    }
}
