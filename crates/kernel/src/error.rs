//! Error taxonomy for the immersed-boundary passes.
//!
//! Geometry-search and degenerate-stencil failures abort the current step:
//! both mean the boundary moved further than the method's locality
//! assumption allows. A classification inconsistency is a defect and is
//! checked in debug builds and in tests.

use thiserror::Error;

use crate::grid::NodeFamily;

/// Result alias used throughout the kernel.
pub type IbResult<T> = Result<T, IbError>;

/// Immersed-boundary kernel error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IbError {
    /// The incremental marker/box cell lookup did not converge.
    #[error("geometry search failed for marker {marker} along {axis}: {detail}")]
    GeometrySearch {
        /// Global marker index (or body index for bounding boxes).
        marker: usize,
        /// `'x'` or `'y'`.
        axis: char,
        /// Human-readable reason.
        detail: String,
    },

    /// A 4-point interpolation stencil could not be built from valid corners.
    #[error("degenerate {family} stencil at node {node}: {detail}")]
    DegenerateStencil {
        /// Field family of the node.
        family: NodeFamily,
        /// Flat node index.
        node: usize,
        /// Human-readable reason.
        detail: String,
    },

    /// A node ended up with zero or several roles after tagging.
    #[error("classification inconsistency at {family} node {node}: {roles} roles assigned")]
    ClassificationInconsistency {
        /// Field family of the node.
        family: NodeFamily,
        /// Flat node index.
        node: usize,
        /// Number of roles claimed by the tag arrays.
        roles: usize,
    },

    /// Malformed grid, body or field input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_node() {
        let err = IbError::DegenerateStencil {
            family: NodeFamily::P,
            node: 42,
            detail: "singular fit".to_string(),
        };
        assert_eq!(err.to_string(), "degenerate p stencil at node 42: singular fit");

        let err = IbError::GeometrySearch { marker: 7, axis: 'x', detail: "left grid".into() };
        assert!(err.to_string().contains("marker 7"));
    }
}
