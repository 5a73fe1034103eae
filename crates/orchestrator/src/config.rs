//! Configuration parsing and validation for immersed-boundary runs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use kernel::IbMethod;

use crate::error::ConfigError;
use crate::motion::Motion;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbConfig {
    /// Human-readable case name
    pub name: String,
    /// Background grid
    pub grid: GridConfig,
    /// Immersed bodies, in body-id order
    pub bodies: Vec<BodyConfig>,
    /// Reconstruction scheme
    #[serde(default)]
    pub method: IbMethod,
    /// Covering factor for body bounding boxes (> 1)
    #[serde(default = "default_scale_cv")]
    pub scale_cv: f64,
    /// Kinematic viscosity used by the force integrator
    #[serde(default = "default_nu")]
    pub nu: f64,
    /// Force probe distance relative to the local spacing
    #[serde(default = "default_probe_factor")]
    pub probe_factor: f64,
    /// Smallest image-point probe relative to the local spacing
    #[serde(default = "default_min_probe")]
    pub min_probe: f64,
    /// On-boundary tolerance relative to the local spacing
    #[serde(default = "default_on_boundary_tol")]
    pub on_boundary_tol: f64,
    /// Largest marker displacement per step, in cells
    #[serde(default = "default_max_cell_jump")]
    pub max_cell_jump: usize,
}

/// Background grid description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GridConfig {
    /// Uniform spacing over a rectangle
    Uniform {
        /// Cells along x
        nx: usize,
        /// Cells along y
        ny: usize,
        /// Left edge
        x_min: f64,
        /// Right edge
        x_max: f64,
        /// Bottom edge
        y_min: f64,
        /// Top edge
        y_max: f64,
    },
    /// Explicit (possibly stretched) cell faces
    Faces {
        /// x face coordinates, strictly increasing
        x: Vec<f64>,
        /// y face coordinates, strictly increasing
        y: Vec<f64>,
    },
}

/// One immersed body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Marker geometry
    pub shape: ShapeConfig,
    /// Prescribed motion
    #[serde(default)]
    pub motion: Motion,
}

/// Marker geometry source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeConfig {
    /// Circle sampled with evenly spaced markers
    Circle {
        /// Centre [x, y]
        center: [f64; 2],
        /// Radius
        radius: f64,
        /// Number of markers
        points: usize,
    },
    /// Marker file, resolved relative to the config file
    File {
        /// Path to the marker file
        path: String,
    },
}

// Default values
fn default_scale_cv() -> f64 {
    2.0
}

fn default_nu() -> f64 {
    0.01
}

fn default_probe_factor() -> f64 {
    1.0
}

fn default_min_probe() -> f64 {
    0.1
}

fn default_on_boundary_tol() -> f64 {
    1e-9
}

fn default_max_cell_jump() -> usize {
    1
}

impl IbConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: IbConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));

        match &self.grid {
            GridConfig::Uniform { nx, ny, x_min, x_max, y_min, y_max } => {
                if *nx < 3 || *ny < 3 {
                    return invalid(format!("grid needs at least 3x3 cells, got {}x{}", nx, ny));
                }
                if x_min >= x_max || y_min >= y_max {
                    return invalid("grid min must be less than max on both axes".to_string());
                }
            }
            GridConfig::Faces { x, y } => {
                if x.len() < 4 || y.len() < 4 {
                    return invalid("face arrays need at least 4 entries".to_string());
                }
            }
        }

        if self.bodies.is_empty() {
            return invalid("at least one body is required".to_string());
        }
        for (b, body) in self.bodies.iter().enumerate() {
            if let ShapeConfig::Circle { radius, points, .. } = &body.shape {
                if *radius <= 0.0 {
                    return invalid(format!("body {}: radius must be positive", b));
                }
                if *points < 3 {
                    return invalid(format!("body {}: a circle needs at least 3 markers", b));
                }
            }
            body.motion.validate().map_err(|e| ConfigError::Validation(format!("body {}: {}", b, e)))?;
        }

        if self.scale_cv <= 1.0 {
            return invalid(format!("scale_cv must exceed 1, got {}", self.scale_cv));
        }
        if self.nu < 0.0 {
            return invalid("nu must be non-negative".to_string());
        }
        if self.probe_factor <= 0.0 {
            return invalid("probe_factor must be positive".to_string());
        }
        if self.min_probe <= 0.0 || self.min_probe > 1.0 {
            return invalid("min_probe must be in range (0, 1]".to_string());
        }
        if self.on_boundary_tol < 0.0 {
            return invalid("on_boundary_tol must be non-negative".to_string());
        }
        if self.max_cell_jump == 0 {
            return invalid("max_cell_jump must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "name": "cylinder",
        "grid": { "Uniform": { "nx": 64, "ny": 32, "x_min": 0.0, "x_max": 2.0, "y_min": 0.0, "y_max": 1.0 } },
        "bodies": [ { "shape": { "Circle": { "center": [0.5, 0.5], "radius": 0.1, "points": 64 } } } ]
    }"#;

    #[test]
    fn defaults_are_applied() {
        let config = IbConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.scale_cv, 2.0);
        assert_eq!(config.nu, 0.01);
        assert_eq!(config.probe_factor, 1.0);
        assert_eq!(config.min_probe, 0.1);
        assert_eq!(config.on_boundary_tol, 1e-9);
        assert_eq!(config.max_cell_jump, 1);
        assert_eq!(config.method, IbMethod::SharpInterface);
        assert!(matches!(config.bodies[0].motion, Motion::Static));
    }

    #[test]
    fn test_validation_scale_cv() {
        let mut config = IbConfig::from_json(MINIMAL).unwrap();
        config.scale_cv = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.scale_cv = 1.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_grid_bounds() {
        let mut config = IbConfig::from_json(MINIMAL).unwrap();
        config.grid = GridConfig::Uniform { nx: 10, ny: 10, x_min: 1.0, x_max: 0.0, y_min: 0.0, y_max: 1.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_grid_too_coarse() {
        let mut config = IbConfig::from_json(MINIMAL).unwrap();
        config.grid = GridConfig::Uniform { nx: 2, ny: 10, x_min: 0.0, x_max: 1.0, y_min: 0.0, y_max: 1.0 };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.grid = GridConfig::Faces { x: vec![0.0, 0.5, 1.0], y: vec![0.0, 0.25, 0.5, 1.0] };
        assert!(config.validate().is_err());

        config.grid = GridConfig::Uniform { nx: 3, ny: 3, x_min: 0.0, x_max: 1.0, y_min: 0.0, y_max: 1.0 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_bodies() {
        let mut config = IbConfig::from_json(MINIMAL).unwrap();
        config.bodies[0].shape = ShapeConfig::Circle { center: [0.5, 0.5], radius: -0.1, points: 64 };
        assert!(config.validate().is_err());

        config.bodies.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(IbConfig::from_json("{ \"name\": 3 }"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = IbConfig::load("/nonexistent/ib_config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
