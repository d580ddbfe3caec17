//! Greedy local moving.
//!
//! Phase 1 of every level: visit nodes in random order and move each one to
//! the neighboring cluster with the best objective delta.
//!
//! ## One node step
//!
//! 1. Scan the node's arcs once, summing weight per neighboring cluster into a
//!    scratch array indexed by cluster id. Touched ids are remembered in a
//!    side list, so resetting costs O(degree) instead of O(clusters).
//! 2. Score "stay" and every neighboring cluster, in the order the clusters
//!    were first met during the scan.
//! 3. Keep the first candidate with a strictly larger delta than the best so
//!    far. Equal deltas never replace an earlier candidate, so results only
//!    depend on the shuffle, i.e. on the seed.
//! 4. Apply the winner if it differs from the current cluster.
//!
//! A pass visits every eligible node once. Local moving stops after
//! `max_passes` passes or after the first pass without a move.
//!
//! ## Restricted runs
//!
//! Callers may restrict moving to a subset of nodes. Nodes outside the subset
//! (ghosts) keep their cluster. Whether subset nodes may join a ghost's
//! cluster is controlled by [`LocalMoving::with_ghost_moves`]; when disabled,
//! ghosts are ignored entirely while scanning.

use log::trace;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::cluster_store::ClusterStore;
use crate::graph::{ClusterId, Graph, NodeId, Weight};
use crate::objective::{Candidate, Objective};

/// Greedy randomized local-moving optimizer.
#[derive(Debug, Clone)]
pub struct LocalMoving {
    /// Maximum number of passes over the eligible nodes.
    max_passes: usize,
    /// Whether eligible nodes may join clusters of ineligible neighbors.
    allow_ghost_moves: bool,
}

impl LocalMoving {
    /// Default pass limit.
    pub const DEFAULT_MAX_PASSES: usize = 32;

    /// Create an optimizer with 32 passes and ghost moves enabled.
    pub fn new() -> Self {
        Self {
            max_passes: Self::DEFAULT_MAX_PASSES,
            allow_ghost_moves: true,
        }
    }

    /// Set the maximum number of passes.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Allow or forbid moves into clusters of nodes outside the moved subset.
    pub fn with_ghost_moves(mut self, allow: bool) -> Self {
        self.allow_ghost_moves = allow;
        self
    }

    /// Maximum number of passes.
    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Move every node of `graph`.
    ///
    /// See [`run`](Self::run).
    pub fn run_all<O, R>(
        &self,
        graph: &Graph,
        clusters: &mut ClusterStore,
        objective: &O,
        rng: &mut R,
    ) -> bool
    where
        O: Objective,
        R: Rng + ?Sized,
    {
        let mut nodes: Vec<NodeId> = (0..graph.node_count() as NodeId).collect();
        self.run(graph, clusters, objective, &mut nodes, rng)
    }

    /// Optimize `clusters` by moving the nodes in `nodes`.
    ///
    /// Aggregates are derived from the assignment currently in `clusters`.
    /// `nodes` is reshuffled with `rng` before every pass. Returns true if at
    /// least one node changed its cluster.
    pub fn run<O, R>(
        &self,
        graph: &Graph,
        clusters: &mut ClusterStore,
        objective: &O,
        nodes: &mut [NodeId],
        rng: &mut R,
    ) -> bool
    where
        O: Objective,
        R: Rng + ?Sized,
    {
        assert_eq!(graph.node_count(), clusters.len(), "store does not match graph");

        let mut aggregates = objective.aggregates(graph, clusters);
        let mut weight_to_cluster: Vec<Weight> = vec![0; clusters.id_space()];
        let mut incident_clusters: Vec<ClusterId> = Vec::new();

        let eligible: Option<Vec<bool>> = if self.allow_ghost_moves {
            None
        } else {
            let mut mask = vec![false; graph.node_count()];
            for &node in nodes.iter() {
                mask[node as usize] = true;
            }
            Some(mask)
        };

        let mut changed = false;
        for pass in 0..self.max_passes {
            nodes.shuffle(rng);
            let mut moved = 0usize;

            for &node in nodes.iter() {
                let current = clusters.cluster_of(node);
                let mut weight_to_current: Weight = 0;
                let mut loop_weight: Weight = 0;

                graph.for_each_adjacent_node(node, |neighbor, weight| {
                    if neighbor == node {
                        loop_weight += weight;
                        return;
                    }
                    if let Some(mask) = &eligible {
                        if !mask[neighbor as usize] {
                            return;
                        }
                    }
                    let cluster = clusters.cluster_of(neighbor);
                    if cluster == current {
                        weight_to_current += weight;
                    } else {
                        if weight_to_cluster[cluster as usize] == 0 {
                            incident_clusters.push(cluster);
                        }
                        weight_to_cluster[cluster as usize] += weight;
                    }
                });

                let stay = Candidate {
                    node,
                    current,
                    target: current,
                    weight_to_current,
                    weight_to_target: weight_to_current,
                    loop_weight,
                };
                let mut best = stay;
                let mut best_delta = objective.delta_for_move(graph, &aggregates, &stay);

                for &cluster in &incident_clusters {
                    let candidate = Candidate {
                        target: cluster,
                        weight_to_target: weight_to_cluster[cluster as usize],
                        ..stay
                    };
                    let delta = objective.delta_for_move(graph, &aggregates, &candidate);
                    if delta > best_delta {
                        best_delta = delta;
                        best = candidate;
                    }
                    weight_to_cluster[cluster as usize] = 0;
                }
                incident_clusters.clear();

                if best.target != current {
                    clusters.set(node, best.target);
                    objective.apply_move(graph, &mut aggregates, &best);
                    moved += 1;
                }
            }

            trace!(
                "{} local moving pass {pass}: {moved} of {} nodes moved",
                objective.name(),
                nodes.len()
            );
            if moved == 0 {
                break;
            }
            changed = true;
        }

        changed
    }
}

impl Default for LocalMoving {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::tests::{ring_of_cliques, two_triangles};
    use crate::objective::{MapEquation, Modularity};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;

    /// Delegates to an objective and records the delta of every applied move.
    struct Recording<O: Objective> {
        inner: O,
        applied: RefCell<Vec<O::Delta>>,
    }

    impl<O: Objective> Objective for Recording<O> {
        type Aggregates = O::Aggregates;
        type Delta = O::Delta;

        fn name(&self) -> &'static str {
            self.inner.name()
        }

        fn higher_is_better(&self) -> bool {
            self.inner.higher_is_better()
        }

        fn whole_graph_value(&self, graph: &Graph, clusters: &ClusterStore) -> f64 {
            self.inner.whole_graph_value(graph, clusters)
        }

        fn aggregates(&self, graph: &Graph, clusters: &ClusterStore) -> Self::Aggregates {
            self.inner.aggregates(graph, clusters)
        }

        fn delta_for_move(&self, graph: &Graph, aggregates: &Self::Aggregates, candidate: &Candidate) -> Self::Delta {
            self.inner.delta_for_move(graph, aggregates, candidate)
        }

        fn apply_move(&self, graph: &Graph, aggregates: &mut Self::Aggregates, candidate: &Candidate) {
            let delta = self.inner.delta_for_move(graph, aggregates, candidate);
            self.applied.borrow_mut().push(delta);
            self.inner.apply_move(graph, aggregates, candidate);
        }
    }

    fn same_partition(a: &[ClusterId], b: &[ClusterId]) -> bool {
        (0..a.len()).all(|i| (0..a.len()).all(|j| (a[i] == a[j]) == (b[i] == b[j])))
    }

    #[test]
    fn two_triangles_converge_to_triangles() {
        let graph = two_triangles();
        let mut clusters = ClusterStore::singletons(6);
        let mut rng = StdRng::seed_from_u64(7);

        assert!(LocalMoving::new().run_all(&graph, &mut clusters, &Modularity, &mut rng));
        assert!(same_partition(clusters.as_slice(), &[0, 0, 0, 1, 1, 1]));

        let q = Modularity.whole_graph_value(&graph, &clusters);
        assert!((q - 0.5).abs() < 1e-9);
    }

    #[test]
    fn converged_store_does_not_change_again() {
        let graph = ring_of_cliques(5, 4);
        let mut clusters = ClusterStore::singletons(graph.node_count());
        let mut rng = StdRng::seed_from_u64(3);
        let optimizer = LocalMoving::new();

        assert!(optimizer.run_all(&graph, &mut clusters, &Modularity, &mut rng));
        let converged = clusters.clone();
        assert!(!optimizer.run_all(&graph, &mut clusters, &Modularity, &mut rng));
        assert_eq!(clusters, converged);

        let mut clusters = ClusterStore::singletons(graph.node_count());
        assert!(optimizer.run_all(&graph, &mut clusters, &MapEquation, &mut rng));
        let converged = clusters.clone();
        assert!(!optimizer.run_all(&graph, &mut clusters, &MapEquation, &mut rng));
        assert_eq!(clusters, converged);
    }

    #[test]
    fn applied_moves_are_never_negative() {
        let graph = ring_of_cliques(6, 5);
        let mut rng = StdRng::seed_from_u64(11);

        let modularity = Recording {
            inner: Modularity,
            applied: RefCell::new(Vec::new()),
        };
        let mut clusters = ClusterStore::singletons(graph.node_count());
        let _ = LocalMoving::new().run_all(&graph, &mut clusters, &modularity, &mut rng);
        assert!(!modularity.applied.borrow().is_empty());
        assert!(modularity.applied.borrow().iter().all(|&d| d > 0));

        let map_equation = Recording {
            inner: MapEquation,
            applied: RefCell::new(Vec::new()),
        };
        let mut clusters = ClusterStore::singletons(graph.node_count());
        let _ = LocalMoving::new().run_all(&graph, &mut clusters, &map_equation, &mut rng);
        assert!(!map_equation.applied.borrow().is_empty());
        assert!(map_equation.applied.borrow().iter().all(|&d| d > 0.0));
    }

    #[test]
    fn objective_improves_monotonically_over_passes() {
        let graph = ring_of_cliques(8, 4);
        let mut last_q = f64::NEG_INFINITY;
        let mut last_l = f64::INFINITY;

        for passes in 1..=6 {
            let mut clusters = ClusterStore::singletons(graph.node_count());
            let mut rng = StdRng::seed_from_u64(5);
            let _ = LocalMoving::new()
                .with_max_passes(passes)
                .run_all(&graph, &mut clusters, &Modularity, &mut rng);
            let q = Modularity.whole_graph_value(&graph, &clusters);
            assert!(q >= last_q - 1e-12, "pass {passes}: {q} < {last_q}");
            last_q = q;

            let mut clusters = ClusterStore::singletons(graph.node_count());
            let mut rng = StdRng::seed_from_u64(5);
            let _ = LocalMoving::new()
                .with_max_passes(passes)
                .run_all(&graph, &mut clusters, &MapEquation, &mut rng);
            let l = MapEquation.whole_graph_value(&graph, &clusters);
            assert!(l <= last_l + 1e-12, "pass {passes}: {l} > {last_l}");
            last_l = l;
        }
    }

    #[test]
    fn map_equation_finds_triangles() {
        let graph = two_triangles();
        let mut clusters = ClusterStore::singletons(6);
        let mut rng = StdRng::seed_from_u64(1);

        assert!(LocalMoving::new().run_all(&graph, &mut clusters, &MapEquation, &mut rng));
        assert!(same_partition(clusters.as_slice(), &[0, 0, 0, 1, 1, 1]));
    }

    #[test]
    fn same_seed_same_result() {
        let graph = ring_of_cliques(7, 4);
        let run = |seed, map_equation: bool| {
            let mut clusters = ClusterStore::singletons(graph.node_count());
            let mut rng = StdRng::seed_from_u64(seed);
            let _ = if map_equation {
                LocalMoving::new().run_all(&graph, &mut clusters, &MapEquation, &mut rng)
            } else {
                LocalMoving::new().run_all(&graph, &mut clusters, &Modularity, &mut rng)
            };
            clusters.into_vec()
        };
        assert_eq!(run(99, false), run(99, false));
        assert_eq!(run(99, true), run(99, true));
    }

    #[test]
    fn isolated_nodes_never_move() {
        let graph = Graph::from_half_edges(3, &[]);
        let mut clusters = ClusterStore::singletons(3);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!LocalMoving::new().run_all(&graph, &mut clusters, &Modularity, &mut rng));
        assert!(!LocalMoving::new().run_all(&graph, &mut clusters, &MapEquation, &mut rng));
        assert_eq!(clusters.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn ineligible_nodes_stay_put() {
        // Triangle {0,1,2} and triangle {3,4,5} joined by 2-3.
        let graph = Graph::from_half_edges(
            6,
            &[(0, 1, 1), (1, 2, 1), (0, 2, 1), (3, 4, 1), (4, 5, 1), (3, 5, 1), (2, 3, 1)],
        );
        let mut rng = StdRng::seed_from_u64(2);

        let mut clusters = ClusterStore::singletons(6);
        let mut subset = vec![0, 1, 2];
        let changed = LocalMoving::new()
            .with_ghost_moves(false)
            .run(&graph, &mut clusters, &Modularity, &mut subset, &mut rng);
        assert!(changed);
        assert_eq!(&clusters.as_slice()[3..], &[3, 4, 5]);
        assert!(clusters.as_slice()[..3].iter().all(|&c| c <= 2));
        assert!(same_partition(&clusters.as_slice()[..3], &[0, 0, 0]));
    }

    #[test]
    fn ghost_moves_can_join_outside_clusters() {
        // 0 is only connected to the ghost 1.
        let graph = Graph::from_half_edges(3, &[(0, 1, 5), (1, 2, 1)]);
        let mut rng = StdRng::seed_from_u64(4);

        let mut clusters = ClusterStore::singletons(3);
        let mut subset = vec![0];
        assert!(LocalMoving::new().run(&graph, &mut clusters, &Modularity, &mut subset, &mut rng));
        assert_eq!(clusters.as_slice(), &[1, 1, 2]);

        let mut clusters = ClusterStore::singletons(3);
        let mut subset = vec![0];
        assert!(!LocalMoving::new()
            .with_ghost_moves(false)
            .run(&graph, &mut clusters, &Modularity, &mut subset, &mut rng));
        assert_eq!(clusters.as_slice(), &[0, 1, 2]);
    }
}
