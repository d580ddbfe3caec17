//! Modularity.
//!
//! ```text
//! Q = Σ_c inner(c) / 2W  −  Σ_c incident(c)² / 4W²
//! ```
//!
//! `inner(c)` sums the arcs with both endpoints in `c` (so every inner edge
//! counts twice and a self-loop counts with its total weight), `incident(c)`
//! is the summed degree of `c`, and `W` is the total edge weight.
//!
//! ## Integer delta
//!
//! Moving node `u` (degree `d`) from cluster `a` to cluster `b` changes Q by
//!
//! ```text
//! ΔQ = [ 2W·(w_b − w_a) − (Σ_b − (Σ_a − d))·d ] / 2W²
//! ```
//!
//! where `w_x` is the weight between `u` and the other members of `x`. The
//! bracket is computed exactly in [`Wide`] and used as the delta; the common
//! positive denominator never changes the comparison.

use super::{Candidate, Objective};
use crate::cluster_store::ClusterStore;
use crate::graph::{ClusterId, Graph, NodeId, Weight, Wide};

/// Newman-Girvan modularity. Higher is better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modularity;

/// Summed degree per cluster id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModularityAggregates {
    incident: Vec<Weight>,
}

impl ModularityAggregates {
    /// Summed degree of `cluster`.
    pub fn incident_weight(&self, cluster: ClusterId) -> Weight {
        self.incident[cluster as usize]
    }
}

impl Objective for Modularity {
    type Aggregates = ModularityAggregates;
    type Delta = Wide;

    fn name(&self) -> &'static str {
        "modularity"
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn whole_graph_value(&self, graph: &Graph, clusters: &ClusterStore) -> f64 {
        assert_eq!(graph.node_count(), clusters.len());
        if graph.total_weight() == 0 {
            return 0.0;
        }

        let mut incident = vec![0 as Weight; clusters.id_space()];
        let mut inner_sum: Wide = 0;
        for node in 0..graph.node_count() as NodeId {
            let cluster = clusters.cluster_of(node);
            incident[cluster as usize] += graph.node_degree(node);
            graph.for_each_adjacent_node(node, |neighbor, weight| {
                if clusters.cluster_of(neighbor) == cluster {
                    inner_sum += Wide::from(weight);
                }
            });
        }
        let incident_sum: Wide = incident
            .iter()
            .map(|&w| Wide::from(w) * Wide::from(w))
            .sum();

        let total = graph.total_weight() as f64;
        inner_sum as f64 / (2.0 * total) - incident_sum as f64 / (4.0 * total * total)
    }

    fn aggregates(&self, graph: &Graph, clusters: &ClusterStore) -> Self::Aggregates {
        let mut incident = vec![0 as Weight; clusters.id_space()];
        for node in 0..graph.node_count() as NodeId {
            incident[clusters.cluster_of(node) as usize] += graph.node_degree(node);
        }
        ModularityAggregates { incident }
    }

    fn delta_for_move(
        &self,
        graph: &Graph,
        aggregates: &Self::Aggregates,
        candidate: &Candidate,
    ) -> Wide {
        let degree = Wide::from(graph.node_degree(candidate.node));

        let mut target_incident = Wide::from(aggregates.incident[candidate.target as usize]);
        if candidate.target == candidate.current {
            target_incident -= degree;
        }
        let current_incident = Wide::from(aggregates.incident[candidate.current as usize]) - degree;

        let gained = Wide::from(graph.total_weight())
            * 2
            * (Wide::from(candidate.weight_to_target) - Wide::from(candidate.weight_to_current));
        let penalty = (target_incident - current_incident) * degree;
        gained - penalty
    }

    fn apply_move(&self, graph: &Graph, aggregates: &mut Self::Aggregates, candidate: &Candidate) {
        let degree = graph.node_degree(candidate.node);
        aggregates.incident[candidate.current as usize] -= degree;
        aggregates.incident[candidate.target as usize] += degree;
    }
}
