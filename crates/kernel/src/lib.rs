//! Sharp-interface immersed-boundary kernel
//!
//! Rigid bodies are closed polylines of Lagrangian markers immersed in a
//! staggered Cartesian grid. Each time step the kernel locates the markers,
//! classifies the u, v and p nodes around every body, builds reconstruction
//! records for the nodes next to the wall and integrates the surface forces.
//!
//! # Modules
//! - [`grid`] -- Staggered grid geometry and node families.
//! - [`body`] -- Marker storage and per-body bounding data.
//! - [`locate`] -- Incremental marker-to-cell lookup and covering rectangles.
//! - [`tagging`] -- Node roles (fluid, hybrid, ghost, solid) and tag arrays.
//! - [`field`] -- Read-only view of the lagged flow field.
//! - [`stencil`] -- Body intercepts, image points and bilinear stencils.
//! - [`force`] -- Probe-based surface force integration.
//! - [`method`] -- Interchangeable reconstruction strategies.
//! - [`diagnostics`] -- Tag-churn observers.

#![warn(missing_docs)]

pub mod body;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod force;
pub mod grid;
pub mod locate;
pub mod method;
pub mod stencil;
pub mod tagging;

pub use body::{Body, BodyRegistry, BoundingBox, Markers};
pub use diagnostics::{ChurnHistory, LogObserver, RoleCounts, TagChurn, TagObserver};
pub use error::{IbError, IbResult};
pub use field::{FieldBuffers, FlowField};
pub use force::{BodyForce, ForceIntegrator, ForceReport, MarkerForces};
pub use grid::{NodeFamily, StaggeredGrid};
pub use locate::MarkerLocator;
pub use method::{AxisRecord, BoundaryRecords, DirectForcing, IbMethod, ImmersedBoundary, SharpInterface};
pub use stencil::{Sampler, StencilBuilder, StencilRecord};
pub use tagging::{FamilyTags, NodeRole, NodeTagger, TagSet, UNTAGGED};
