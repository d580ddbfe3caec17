//! Graph contraction (phase 2 of every level).
//!
//! Every cluster becomes one meta-node. Arcs between two clusters are merged
//! into one meta-arc carrying their summed weight; arcs inside a cluster
//! become a self-loop stored as two arcs with half the summed weight each.
//! This keeps `sum(weights) == 2 * total_weight` on the meta-graph, and the
//! total weight itself is carried over unchanged.
//!
//! ```text
//! clustering {0,1,2} {3,4,5}            meta-graph
//!
//!   0 ─ 1     3 ─ 4                    ┌─┐       ┌─┐
//!    \ /  ─────  \ /         ==>       │A│ ───── │B│
//!     2          5                     └─┘ 1     └─┘
//!                                      loop 6    loop 6
//! ```
//!
//! Runs in O(N + M): nodes are bucketed by cluster with a counting sort, and
//! per-cluster scratch state is reset through touched-lists.

use crate::cluster_store::ClusterStore;
use crate::graph::{EdgeId, Graph, NodeId, Weight};

const NO_SLOT: usize = usize::MAX;

/// Build the meta-graph induced by `clusters`.
///
/// `clusters` is renumbered densely from 0 first, so afterwards
/// `clusters.cluster_of(n)` is the meta-node of `n`.
///
/// # Panics
///
/// If the meta-graph's total weight differs from the input's. That can only
/// happen through a bug in this module or an inconsistent input graph.
pub fn contract(graph: &Graph, clusters: &mut ClusterStore) -> Graph {
    assert_eq!(graph.node_count(), clusters.len(), "store does not match graph");
    let cluster_count = clusters.rewrite_cluster_ids(0) as usize;

    // Counting sort of nodes by cluster.
    let mut member_offsets = vec![0usize; cluster_count + 1];
    for &cluster in clusters.as_slice() {
        member_offsets[cluster as usize + 1] += 1;
    }
    for c in 0..cluster_count {
        member_offsets[c + 1] += member_offsets[c];
    }
    let mut members = vec![0 as NodeId; graph.node_count()];
    let mut cursor = member_offsets.clone();
    for (node, &cluster) in clusters.as_slice().iter().enumerate() {
        members[cursor[cluster as usize]] = node as NodeId;
        cursor[cluster as usize] += 1;
    }

    // Meta-degrees: distinct neighboring clusters, own cluster twice.
    let mut seen = vec![false; cluster_count];
    let mut touched: Vec<usize> = Vec::new();
    let mut first_out = vec![0 as EdgeId; cluster_count + 1];
    for c in 0..cluster_count {
        for &node in &members[member_offsets[c]..member_offsets[c + 1]] {
            graph.for_each_adjacent_node(node, |neighbor, _| {
                let target = clusters.cluster_of(neighbor) as usize;
                if !seen[target] {
                    seen[target] = true;
                    touched.push(target);
                }
            });
        }
        let loop_arcs = usize::from(seen[c]);
        first_out[c + 1] = (touched.len() + loop_arcs) as EdgeId;
        for &target in &touched {
            seen[target] = false;
        }
        touched.clear();
    }
    for c in 0..cluster_count {
        first_out[c + 1] += first_out[c];
    }

    let arc_count = first_out[cluster_count] as usize;
    let mut neighbors = vec![0 as NodeId; arc_count];
    let mut weights = vec![0 as Weight; arc_count];
    let mut slot = vec![NO_SLOT; cluster_count];

    for c in 0..cluster_count {
        let mut next = first_out[c] as usize;
        for &node in &members[member_offsets[c]..member_offsets[c + 1]] {
            graph.for_each_adjacent_node(node, |neighbor, weight| {
                let target = clusters.cluster_of(neighbor) as usize;
                if slot[target] == NO_SLOT {
                    slot[target] = next;
                    touched.push(target);
                    neighbors[next] = target as NodeId;
                    next += 1;
                    if target == c {
                        neighbors[next] = target as NodeId;
                        next += 1;
                    }
                }
                weights[slot[target]] += weight;
            });
        }
        debug_assert_eq!(next as EdgeId, first_out[c + 1]);

        if slot[c] != NO_SLOT {
            let loop_arc = slot[c];
            let inner = weights[loop_arc];
            assert!(inner % 2 == 0, "odd inner weight {inner} in cluster {c}");
            weights[loop_arc] = inner / 2;
            weights[loop_arc + 1] = inner / 2;
        }
        for &target in &touched {
            slot[target] = NO_SLOT;
        }
        touched.clear();
    }

    let meta = Graph::from_csr(first_out, neighbors, weights);
    assert_eq!(
        meta.total_weight(),
        graph.total_weight(),
        "contraction changed the total weight"
    );
    meta
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::community::LocalMoving;
    use crate::graph::tests::{assert_csr_invariants, four_cycle, two_triangles};
    use crate::objective::{Modularity, Objective};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn two_triangles_become_two_loops() {
        let graph = two_triangles();
        let mut clusters = ClusterStore::singletons(6);
        let mut rng = StdRng::seed_from_u64(9);
        assert!(LocalMoving::new().run_all(&graph, &mut clusters, &Modularity, &mut rng));

        let meta = contract(&graph, &mut clusters);
        assert_csr_invariants(&meta);
        assert_eq!(meta.node_count(), 2);
        assert_eq!(meta.total_weight(), graph.total_weight());
        assert_eq!(meta.first_out(), &[0, 2, 4]);
        assert_eq!(meta.neighbors(), &[0, 0, 1, 1]);
        assert_eq!(meta.weights(), &[3, 3, 3, 3]);
        assert_eq!(clusters.as_slice(), &[0, 0, 0, 1, 1, 1]);

        let mut meta_clusters = ClusterStore::singletons(2);
        assert!(!LocalMoving::new().run_all(&meta, &mut meta_clusters, &Modularity, &mut rng));
    }

    #[test]
    fn parallel_arcs_are_merged() {
        let graph = four_cycle();
        let mut clusters = ClusterStore::from_vec(vec![0, 0, 1, 1]);
        let meta = contract(&graph, &mut clusters);

        assert_csr_invariants(&meta);
        // 1-2 and 3-0 both run between the two pairs
        let mut arcs = Vec::new();
        meta.for_each_adjacent_node(0, |v, w| arcs.push((v, w)));
        assert_eq!(arcs, vec![(0, 1), (0, 1), (1, 2)]);
        assert_eq!(meta.node_degree(0), 4);
        assert_eq!(meta.node_degree(1), 4);
    }

    #[test]
    fn sparse_ids_are_densified() {
        let graph = four_cycle();
        let mut clusters = ClusterStore::from_vec(vec![3, 1, 3, 1]);
        let meta = contract(&graph, &mut clusters);
        assert_eq!(clusters.as_slice(), &[0, 1, 0, 1]);
        assert_eq!(meta.node_count(), 2);
        // no arcs inside {0, 2} or {1, 3}
        assert_eq!(meta.neighbors(), &[1, 0]);
        assert_eq!(meta.weights(), &[4, 4]);
    }

    #[test]
    fn singleton_clustering_keeps_the_graph() {
        let graph = Graph::from_half_edges(3, &[(0, 1, 2), (1, 2, 5), (2, 2, 1)]);
        let mut clusters = ClusterStore::singletons(3);
        let meta = contract(&graph, &mut clusters);
        assert_eq!(meta.node_count(), 3);
        for node in 0..3 {
            assert_eq!(meta.node_degree(node), graph.node_degree(node));
        }
        assert_eq!(meta.total_weight(), graph.total_weight());
    }

    #[test]
    fn adjacency_list_loops_contract() {
        let graph = Graph::from_adjacency_lists(&[vec![0, 1], vec![0, 1]]);

        let mut clusters = ClusterStore::singletons(2);
        let meta = contract(&graph, &mut clusters);
        assert_csr_invariants(&meta);
        assert_eq!(meta, graph);

        let mut clusters = ClusterStore::new(2, 0);
        let meta = contract(&graph, &mut clusters);
        assert_csr_invariants(&meta);
        assert_eq!(meta.node_count(), 1);
        assert_eq!(meta.weights(), &[3, 3]);
        assert_eq!(meta.total_weight(), graph.total_weight());
    }

    proptest! {
        #[test]
        fn contraction_preserves_weight_and_modularity(
            raw in proptest::collection::vec((0u32..25, 0u32..25, 1u64..9), 1..80),
            labels in proptest::collection::vec(0u32..25, 25),
        ) {
            let graph = Graph::from_half_edges(25, &raw);
            let mut clusters = ClusterStore::from_vec(labels);
            let before = Modularity.whole_graph_value(&graph, &clusters);

            let meta = contract(&graph, &mut clusters);
            assert_csr_invariants(&meta);
            prop_assert_eq!(meta.total_weight(), graph.total_weight());
            prop_assert_eq!(meta.node_count(), clusters.cluster_count());

            let after = Modularity.whole_graph_value(&meta, &ClusterStore::singletons(meta.node_count()));
            prop_assert_eq!(before, after);
            prop_assert_eq!(Modularity.whole_graph_value(&graph, &clusters), before);
        }
    }
}
