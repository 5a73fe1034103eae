//! Orchestration Layer
//!
//! This crate wires the immersed-boundary kernel into a per-step pipeline:
//! - JSON configuration with validation
//! - Body geometry from analytic circles or marker files
//! - Prescribed body motion
//! - The [`ImmersedBoundarySystem`] that owns all boundary state and runs the
//!   passes in order

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod motion;

pub use config::{BodyConfig, GridConfig, IbConfig, ShapeConfig};
pub use error::ConfigError;
pub use motion::{Motion, MotionAxis};

use std::path::Path;

use kernel::{
    BodyForce, BodyRegistry, BoundaryRecords, FamilyTags, FlowField, ForceIntegrator, ForceReport, IbError,
    IbResult, ImmersedBoundary, LogObserver, MarkerLocator, NodeFamily, NodeTagger, Sampler, StaggeredGrid,
    StencilBuilder, TagChurn, TagObserver, TagSet,
};

/// Immersed-boundary state of one simulation.
///
/// Each step runs, strictly in order:
///
/// 1. [`ImmersedBoundarySystem::advance`]: motion, marker lookup, bounding
///    boxes, tagging and churn reporting
/// 2. [`ImmersedBoundarySystem::build_stencils`] from the lagged field
/// 3. [`ImmersedBoundarySystem::compute_forces`] once the solver has a new
///    field
///
/// A failing pass returns the error; tags, records and forces keep the
/// values of the last successful pass.
pub struct ImmersedBoundarySystem {
    config: IbConfig,
    grid: StaggeredGrid,
    registry: BodyRegistry,
    motions: Vec<Motion>,
    locator: MarkerLocator,
    scheme: Box<dyn ImmersedBoundary>,
    observer: Box<dyn TagObserver>,
    tags: TagSet,
    /// Buffer holding the tags of the pass before the current one.
    spare: Option<TagSet>,
    tagged: bool,
    records: BoundaryRecords,
    forces: ForceReport,
    time: f64,
    step: u64,
}

impl ImmersedBoundarySystem {
    /// Load a configuration file and build the system from it.
    ///
    /// Marker files are resolved relative to the configuration file.
    ///
    /// # Example
    /// ```no_run
    /// use orchestrator::ImmersedBoundarySystem;
    ///
    /// let mut system = ImmersedBoundarySystem::from_file("cases/cylinder.json")?;
    /// system.advance(0.0, 0, 1e-3)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        tracing::info!("Creating immersed-boundary system from config: {}", config_path.display());
        let config = IbConfig::load(config_path)?;
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_config(config, base)
    }

    /// Build the system from a configuration; `base` resolves marker files.
    pub fn from_config(config: IbConfig, base: &Path) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = match &config.grid {
            GridConfig::Uniform { nx, ny, x_min, x_max, y_min, y_max } => {
                StaggeredGrid::uniform(*nx, *ny, *x_min, *x_max, *y_min, *y_max)?
            }
            GridConfig::Faces { x, y } => StaggeredGrid::from_faces(x.clone(), y.clone())?,
        };
        tracing::info!("Grid: {}x{} cells", grid.nx, grid.ny);

        let mut registry = BodyRegistry::new();
        let mut motions = Vec::with_capacity(config.bodies.len());
        for body in &config.bodies {
            let points = match &body.shape {
                ShapeConfig::Circle { center, radius, points } => geometry::circle_markers(*center, *radius, *points),
                ShapeConfig::File { path } => geometry::load_markers(&base.join(path))?,
            };
            let id = registry.add_body(&points)?;
            tracing::info!("Body {}: {} markers, motion {:?}", id, points.len(), body.motion);
            motions.push(body.motion);
        }

        let scheme = config.method.build(
            NodeTagger { on_boundary_tol: config.on_boundary_tol },
            StencilBuilder { min_probe: config.min_probe },
            ForceIntegrator { probe_factor: config.probe_factor, nu: config.nu },
        );
        tracing::info!("Reconstruction scheme: {}", scheme.name());

        let tags = TagSet::new(&grid);
        Ok(Self {
            locator: MarkerLocator::new(config.scale_cv, config.max_cell_jump),
            config,
            grid,
            registry,
            motions,
            scheme,
            observer: Box::new(LogObserver),
            tags,
            spare: None,
            tagged: false,
            records: BoundaryRecords::default(),
            forces: ForceReport::default(),
            time: 0.0,
            step: 0,
        })
    }

    /// Replace the tag-churn observer.
    pub fn with_observer(mut self, observer: Box<dyn TagObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Move the bodies to `time` and re-tag the grid.
    ///
    /// `dt` is the sub-step size; it is used to warn when a body may cross
    /// more cells per step than the lookup allows.
    pub fn advance(&mut self, time: f64, step: u64, dt: f64) -> IbResult<TagChurn> {
        if dt.is_nan() || dt < 0.0 {
            return Err(IbError::InvalidInput(format!("invalid sub-step size {}", dt)));
        }

        self.registry.markers.store_substep();
        for (b, motion) in self.motions.iter().enumerate() {
            motion.apply(&mut self.registry, b, time);
            let first = self.registry.bodies[b].offset;
            let h = self.grid.spacing_at(self.registry.markers.x[first], self.registry.markers.y[first]);
            let cells_per_step = motion.peak_speed() * dt / h;
            if cells_per_step > self.config.max_cell_jump as f64 {
                tracing::warn!(
                    body = b,
                    cells_per_step,
                    limit = self.config.max_cell_jump,
                    "body may outrun the incremental marker lookup"
                );
            }
        }

        if !self.tagged {
            // No earlier sub-step, so the first pose carries no acceleration.
            self.registry.markers.store_substep();
        }

        self.locator.update(&self.grid, &mut self.registry)?;

        let mut next = self.spare.take().unwrap_or_else(|| TagSet::new(&self.grid));
        self.scheme.tag(&self.grid, &self.registry, &mut next)?;
        let churn = TagChurn::between(step, self.tagged.then_some(&self.tags), &next);
        self.spare = Some(std::mem::replace(&mut self.tags, next));
        self.tagged = true;
        self.time = time;
        self.step = step;

        self.observer.observe(&churn);
        tracing::info!(
            step,
            time,
            ghost_p = churn.roles[2].ghost,
            hybrid_p = churn.roles[2].hybrid,
            "tagging pass complete"
        );
        Ok(churn)
    }

    /// Build reconstruction records from the lagged field.
    pub fn build_stencils(&mut self, field: &FlowField<'_>) -> IbResult<&BoundaryRecords> {
        let sampler = Sampler::new(&self.grid, &self.registry, &self.tags, *field);
        self.records = self.scheme.build_stencils(&sampler)?;
        tracing::info!(step = self.step, records = self.records.total(), "stencil pass complete");
        Ok(&self.records)
    }

    /// Integrate surface forces from the given field.
    pub fn compute_forces(&mut self, field: &FlowField<'_>) -> IbResult<&ForceReport> {
        let sampler = Sampler::new(&self.grid, &self.registry, &self.tags, *field);
        self.forces = self.scheme.compute_forces(&sampler)?;
        let total = aggregate_body_forces(&self.forces.bodies);
        tracing::info!(
            step = self.step,
            fx = total.net_force[0],
            fy = total.net_force[1],
            "force pass complete"
        );
        Ok(&self.forces)
    }

    /// Configuration the system was built from.
    pub fn config(&self) -> &IbConfig {
        &self.config
    }

    /// Background grid.
    pub fn grid(&self) -> &StaggeredGrid {
        &self.grid
    }

    /// Bodies and markers.
    pub fn registry(&self) -> &BodyRegistry {
        &self.registry
    }

    /// Tags of the latest pass.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Tag arrays of one family.
    pub fn family_tags(&self, family: NodeFamily) -> &FamilyTags {
        self.tags.family(family)
    }

    /// Records of the latest stencil pass.
    pub fn records(&self) -> &BoundaryRecords {
        &self.records
    }

    /// Result of the latest force pass.
    pub fn forces(&self) -> &ForceReport {
        &self.forces
    }

    /// Time and step of the latest [`ImmersedBoundarySystem::advance`].
    pub fn clock(&self) -> (f64, u64) {
        (self.time, self.step)
    }
}

/// Sum per-body forces into a single total (body id of the result is 0).
pub fn aggregate_body_forces(forces: &[BodyForce]) -> BodyForce {
    forces.iter().fold(BodyForce::default(), |mut acc, f| {
        for c in 0..2 {
            acc.net_force[c] += f.net_force[c];
            acc.pressure_force[c] += f.pressure_force[c];
            acc.viscous_force[c] += f.viscous_force[c];
        }
        acc
    })
}
