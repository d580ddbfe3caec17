//! Clustering objectives.
//!
//! Both objectives plug into the same optimizer through [`Objective`]:
//!
//! - a closed-form whole-graph value, used for reporting and as ground truth
//!   in tests;
//! - per-cluster aggregates that are cheap to update when one node moves;
//! - an exact move delta computed from those aggregates.
//!
//! | Objective | Value | Better | Delta type |
//! |-----------|-------|--------|------------|
//! | [`Modularity`] | Newman-Girvan Q | higher | `i128` (exact) |
//! | [`MapEquation`] | two-level codelength in bits | lower | `f64` |
//!
//! Deltas are oriented so that a **larger delta is a better move** and the
//! zero value (`Default`) means "no change". The optimizer never has to know
//! which way the underlying value points.

mod map_equation;
mod modularity;

pub use map_equation::{MapEquation, MapEquationAggregates};
pub use modularity::{Modularity, ModularityAggregates};

use crate::cluster_store::ClusterStore;
use crate::graph::{ClusterId, Graph, NodeId, Weight};

/// A single candidate move as seen by the optimizer.
///
/// Weights exclude the node's self-loop arcs, which are reported separately
/// in `loop_weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Node being moved.
    pub node: NodeId,
    /// Cluster the node is in now.
    pub current: ClusterId,
    /// Cluster the node would move to.
    pub target: ClusterId,
    /// Weight of arcs from the node to other members of `current`.
    pub weight_to_current: Weight,
    /// Weight of arcs from the node to members of `target`.
    pub weight_to_target: Weight,
    /// Summed weight of the node's self arcs.
    pub loop_weight: Weight,
}

/// Capability interface shared by all objectives.
pub trait Objective {
    /// Per-cluster state updated incrementally by the optimizer.
    type Aggregates;
    /// Move score; `Default` is the "stay" baseline, larger is better.
    type Delta: Copy + PartialOrd + Default + core::fmt::Debug;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// True if larger whole-graph values are better.
    fn higher_is_better(&self) -> bool;

    /// Closed-form value of the clustering.
    fn whole_graph_value(&self, graph: &Graph, clusters: &ClusterStore) -> f64;

    /// Aggregates for the current assignment in `clusters`.
    fn aggregates(&self, graph: &Graph, clusters: &ClusterStore) -> Self::Aggregates;

    /// Improvement obtained by applying `candidate`.
    fn delta_for_move(
        &self,
        graph: &Graph,
        aggregates: &Self::Aggregates,
        candidate: &Candidate,
    ) -> Self::Delta;

    /// Update aggregates after `candidate` was applied to the store.
    fn apply_move(&self, graph: &Graph, aggregates: &mut Self::Aggregates, candidate: &Candidate);
}

/// Runtime choice of objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveKind {
    /// Maximize modularity.
    #[default]
    Modularity,
    /// Minimize the map-equation codelength.
    MapEquation,
}

impl ObjectiveKind {
    /// Whole-graph value of `clusters` under this objective.
    pub fn evaluate(self, graph: &Graph, clusters: &ClusterStore) -> f64 {
        match self {
            ObjectiveKind::Modularity => Modularity.whole_graph_value(graph, clusters),
            ObjectiveKind::MapEquation => MapEquation.whole_graph_value(graph, clusters),
        }
    }

    /// Short name for logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            ObjectiveKind::Modularity => Modularity.name(),
            ObjectiveKind::MapEquation => MapEquation.name(),
        }
    }
}
