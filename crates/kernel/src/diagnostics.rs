//! Tag-churn reporting after each tagging pass.

use serde::Serialize;

use crate::grid::NodeFamily;
use crate::tagging::{FamilyTags, NodeRole, TagSet};

/// Churn above this multiple of the shell size is reported as a warning.
const HIGH_CHURN: f64 = 4.0;

/// Role counts of one family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    /// Fluid-normal nodes.
    pub fluid: usize,
    /// Hybrid nodes.
    pub hybrid: usize,
    /// Ghost nodes.
    pub ghost: usize,
    /// Solid-interior nodes.
    pub solid: usize,
}

impl RoleCounts {
    /// Count the roles of one family.
    pub fn of(tags: &FamilyTags) -> Self {
        let mut c = RoleCounts::default();
        for idx in 0..tags.len() {
            match tags.role(idx) {
                NodeRole::Fluid => c.fluid += 1,
                NodeRole::Hybrid => c.hybrid += 1,
                NodeRole::Ghost => c.ghost += 1,
                NodeRole::Solid => c.solid += 1,
            }
        }
        c
    }
}

/// Summary of how the tags changed between two passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagChurn {
    /// Time step of the pass.
    pub step: u64,
    /// Changed nodes per family (u, v, p).
    pub changed: [usize; 3],
    /// Role counts per family (u, v, p).
    pub roles: [RoleCounts; 3],
}

impl TagChurn {
    /// Compare the new tags with the previous pass. With no previous pass
    /// every non-fluid node counts as changed.
    pub fn between(step: u64, previous: Option<&TagSet>, current: &TagSet) -> Self {
        let mut churn = TagChurn { step, ..TagChurn::default() };
        for (slot, family) in NodeFamily::ALL.into_iter().enumerate() {
            let now = current.family(family);
            let roles = RoleCounts::of(now);
            churn.changed[slot] = match previous {
                Some(prev) => now.changed_from(prev.family(family)),
                None => roles.hybrid + roles.ghost + roles.solid,
            };
            churn.roles[slot] = roles;
        }
        churn
    }

    /// Changed nodes over all families.
    pub fn total_changed(&self) -> usize {
        self.changed.iter().sum()
    }

    /// Hybrid plus ghost nodes over all families.
    pub fn shell_size(&self) -> usize {
        self.roles.iter().map(|r| r.hybrid + r.ghost).sum()
    }
}

/// Receives churn summaries. Observers never fail the step.
pub trait TagObserver: Send {
    /// Called after each tagging pass.
    fn observe(&mut self, churn: &TagChurn);
}

/// Default observer: reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl TagObserver for LogObserver {
    fn observe(&mut self, churn: &TagChurn) {
        let total = churn.total_changed();
        let shell = churn.shell_size();
        if shell > 0 && total as f64 > HIGH_CHURN * shell as f64 {
            tracing::warn!(
                step = churn.step,
                changed = total,
                shell,
                "tag churn far exceeds the boundary shell"
            );
        } else if total > 0 {
            tracing::info!(
                step = churn.step,
                u = churn.changed[0],
                v = churn.changed[1],
                p = churn.changed[2],
                "tags changed"
            );
        } else {
            tracing::debug!(step = churn.step, "tags unchanged");
        }
    }
}

/// Observer that keeps every summary, for tests and post-processing.
#[derive(Debug, Clone, Default)]
pub struct ChurnHistory {
    /// Summaries in pass order.
    pub passes: Vec<TagChurn>,
}

impl TagObserver for ChurnHistory {
    fn observe(&mut self, churn: &TagChurn) {
        self.passes.push(*churn);
    }
}
