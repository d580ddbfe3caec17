//! Compact weighted graph for one clustering level.
//!
//! Adjacency is stored in CSR form (a.k.a. forward star):
//!
//! ```text
//! first_out:  [0, 2, 5, 7]          node v owns arcs first_out[v]..first_out[v+1]
//! neighbors:  [1, 2, 0, 2, 2, ...]
//! weights:    [1, 1, 1, 1, 3, ...]
//! ```
//!
//! Every undirected edge `{u, v}` is stored as two mirrored arcs `u -> v` and
//! `v -> u`. A self-loop with total weight `w` is stored as two arcs `u -> u`
//! carrying `w / 2` each, so that summing a node's arcs always yields its
//! weighted degree and `sum(weights) == 2 * total_weight`.
//!
//! ## Width contract
//!
//! Objective scoring multiplies degrees with each other and with the total
//! weight. All such products are accumulated in [`Wide`], which is checked at
//! compile time to be at least twice as wide as [`EdgeId`] and [`Weight`].

use std::collections::BTreeMap;

/// Dense node index in `[0, node_count)`.
pub type NodeId = u32;
/// Cluster label. Shares the id space of the nodes it was derived from.
pub type ClusterId = u32;
/// Arc index into the CSR arrays.
pub type EdgeId = u64;
/// Unsigned edge / degree weight.
pub type Weight = u64;
/// Signed accumulator for products of weights.
pub type Wide = i128;

const _: () = assert!(core::mem::size_of::<Wide>() >= 2 * core::mem::size_of::<EdgeId>());
const _: () = assert!(core::mem::size_of::<Wide>() >= 2 * core::mem::size_of::<Weight>());

/// Immutable weighted undirected graph in CSR layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    first_out: Vec<EdgeId>,
    neighbors: Vec<NodeId>,
    weights: Vec<Weight>,
    degrees: Vec<Weight>,
    total_weight: Weight,
}

impl Graph {
    /// Build from a half-edge list (each undirected edge listed once).
    ///
    /// Backward arcs are generated, arcs are stable-sorted by tail, and the
    /// offsets are derived in one scan. A self-loop `(u, u, w)` becomes two
    /// arcs of weight `w`, i.e. a loop of total weight `2w`.
    ///
    /// # Panics
    ///
    /// If an endpoint is `>= node_count` or a weight is zero.
    pub fn from_half_edges(node_count: usize, edges: &[(NodeId, NodeId, Weight)]) -> Self {
        let mut arcs: Vec<(NodeId, NodeId, Weight)> = Vec::with_capacity(2 * edges.len());
        for &(u, v, w) in edges {
            assert!(
                (u as usize) < node_count && (v as usize) < node_count,
                "edge ({u}, {v}) out of range for {node_count} nodes"
            );
            assert!(w > 0, "edge ({u}, {v}) has zero weight");
            arcs.push((u, v, w));
        }
        for &(u, v, w) in edges {
            arcs.push((v, u, w));
        }
        arcs.sort_by_key(|&(tail, _, _)| tail);

        let mut first_out = vec![0 as EdgeId; node_count + 1];
        let mut neighbors = Vec::with_capacity(arcs.len());
        let mut weights = Vec::with_capacity(arcs.len());
        let mut next_node = 0usize;
        for (index, &(tail, head, weight)) in arcs.iter().enumerate() {
            while next_node <= tail as usize {
                first_out[next_node] = index as EdgeId;
                next_node += 1;
            }
            neighbors.push(head);
            weights.push(weight);
        }
        for offset in first_out.iter_mut().skip(next_node) {
            *offset = arcs.len() as EdgeId;
        }

        Self::from_csr(first_out, neighbors, weights)
    }

    /// Build from per-node adjacency maps `neighbor -> weight`.
    ///
    /// Every edge must be present in both endpoint maps with the same weight.
    /// A self-loop entry holds the loop's total weight, which is split over
    /// two identical arcs.
    ///
    /// # Panics
    ///
    /// If a neighbor is out of range, a weight is zero, or a self-loop total is
    /// odd.
    pub fn from_adjacency_maps(adjacency: &[BTreeMap<NodeId, Weight>]) -> Self {
        let node_count = adjacency.len();
        let mut first_out = Vec::with_capacity(node_count + 1);
        let mut neighbors = Vec::new();
        let mut weights = Vec::new();

        first_out.push(0);
        for (node, links) in adjacency.iter().enumerate() {
            for (&neighbor, &weight) in links {
                assert!(
                    (neighbor as usize) < node_count,
                    "neighbor {neighbor} of node {node} out of range"
                );
                assert!(weight > 0, "arc {node} -> {neighbor} has zero weight");
                if neighbor as usize == node {
                    assert!(weight % 2 == 0, "self-loop at {node} has odd total weight {weight}");
                    neighbors.extend([neighbor, neighbor]);
                    weights.extend([weight / 2, weight / 2]);
                } else {
                    neighbors.push(neighbor);
                    weights.push(weight);
                }
            }
            first_out.push(neighbors.len() as EdgeId);
        }

        Self::from_csr(first_out, neighbors, weights)
    }

    /// Build from per-node neighbor lists with implicit weight 1.
    ///
    /// Lists must already be symmetric (`v` in `adjacency[u]` iff `u` in
    /// `adjacency[v]`). A node listing itself gets a self-loop: two arcs of
    /// weight 1, as in [`from_half_edges`](Self::from_half_edges).
    pub fn from_adjacency_lists(adjacency: &[Vec<NodeId>]) -> Self {
        let node_count = adjacency.len();
        let mut first_out = Vec::with_capacity(node_count + 1);
        let mut neighbors = Vec::new();

        first_out.push(0);
        for (node, list) in adjacency.iter().enumerate() {
            for &neighbor in list {
                assert!(
                    (neighbor as usize) < node_count,
                    "neighbor {neighbor} of node {node} out of range"
                );
                neighbors.push(neighbor);
                if neighbor as usize == node {
                    neighbors.push(neighbor);
                }
            }
            first_out.push(neighbors.len() as EdgeId);
        }
        let weights = vec![1; neighbors.len()];

        Self::from_csr(first_out, neighbors, weights)
    }

    /// Convert a `petgraph` undirected graph, treating every edge as weight 1.
    #[cfg(feature = "petgraph")]
    pub fn from_petgraph<N, E>(graph: &petgraph::graph::UnGraph<N, E>) -> Self {
        use petgraph::visit::EdgeRef;

        let edges: Vec<(NodeId, NodeId, Weight)> = graph
            .edge_references()
            .map(|e| (e.source().index() as NodeId, e.target().index() as NodeId, 1))
            .collect();
        Self::from_half_edges(graph.node_count(), &edges)
    }

    /// Validate raw CSR arrays and derive degrees.
    ///
    /// The graph is only handed out once every array is final.
    pub(crate) fn from_csr(
        first_out: Vec<EdgeId>,
        neighbors: Vec<NodeId>,
        weights: Vec<Weight>,
    ) -> Self {
        assert!(!first_out.is_empty(), "first_out needs a sentinel entry");
        assert_eq!(first_out[0], 0);
        assert_eq!(*first_out.last().unwrap_or(&0), neighbors.len() as EdgeId);
        assert_eq!(neighbors.len(), weights.len());

        let node_count = first_out.len() - 1;
        let mut degrees = Vec::with_capacity(node_count);
        let mut loop_arcs: Vec<Weight> = Vec::new();
        for node in 0..node_count {
            let (begin, end) = (first_out[node] as usize, first_out[node + 1] as usize);
            assert!(begin <= end, "first_out not monotonic at node {node}");
            let mut degree: Weight = 0;
            for arc in begin..end {
                assert!(weights[arc] > 0, "arc {arc} of node {node} has zero weight");
                assert!((neighbors[arc] as usize) < node_count);
                if neighbors[arc] as usize == node {
                    loop_arcs.push(weights[arc]);
                }
                degree += weights[arc];
            }
            degrees.push(degree);

            // Self arcs must pair up: each loop is two arcs of equal weight.
            if !loop_arcs.is_empty() {
                loop_arcs.sort_unstable();
                assert!(
                    loop_arcs.len() % 2 == 0 && loop_arcs.chunks(2).all(|pair| pair[0] == pair[1]),
                    "unpaired self-loop arcs at node {node}"
                );
                loop_arcs.clear();
            }
        }

        let volume: Weight = degrees.iter().sum();
        assert!(volume % 2 == 0, "arc weights sum to odd volume {volume}");

        Self {
            first_out,
            neighbors,
            weights,
            degrees,
            total_weight: volume / 2,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.degrees.len()
    }

    /// Number of stored arcs (twice the number of undirected edges).
    #[inline]
    pub fn arc_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Sum of all degrees divided by two.
    #[inline]
    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// Weighted degree of `node`.
    #[inline]
    pub fn node_degree(&self, node: NodeId) -> Weight {
        self.degrees[node as usize]
    }

    /// Call `visit(neighbor, weight)` for every arc leaving `node`.
    #[inline]
    pub fn for_each_adjacent_node<F>(&self, node: NodeId, mut visit: F)
    where
        F: FnMut(NodeId, Weight),
    {
        let begin = self.first_out[node as usize] as usize;
        let end = self.first_out[node as usize + 1] as usize;
        for arc in begin..end {
            visit(self.neighbors[arc], self.weights[arc]);
        }
    }

    /// CSR offsets, `node_count + 1` entries.
    pub fn first_out(&self) -> &[EdgeId] {
        &self.first_out
    }

    /// Arc heads.
    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    /// Arc weights.
    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn four_cycle() -> Graph {
        Graph::from_half_edges(4, &[(0, 1, 1), (1, 2, 1), (2, 3, 1), (3, 0, 1)])
    }

    pub(crate) fn two_triangles() -> Graph {
        Graph::from_half_edges(
            6,
            &[(0, 1, 1), (1, 2, 1), (0, 2, 1), (3, 4, 1), (4, 5, 1), (3, 5, 1)],
        )
    }

    /// `count` cliques of `size` nodes, consecutive cliques joined by one edge.
    pub(crate) fn ring_of_cliques(count: u32, size: u32) -> Graph {
        let mut edges = Vec::new();
        for clique in 0..count {
            let base = clique * size;
            for i in 0..size {
                for j in (i + 1)..size {
                    edges.push((base + i, base + j, 1));
                }
            }
            let next = ((clique + 1) % count) * size;
            edges.push((base + size - 1, next, 1));
        }
        Graph::from_half_edges((count * size) as usize, &edges)
    }

    pub(crate) fn assert_csr_invariants(graph: &Graph) {
        let first_out = graph.first_out();
        assert_eq!(first_out.len(), graph.node_count() + 1);
        assert_eq!(first_out[0], 0);
        assert_eq!(*first_out.last().unwrap(), graph.neighbors().len() as EdgeId);
        assert!(first_out.windows(2).all(|w| w[0] <= w[1]));
        assert!(graph.weights().iter().all(|&w| w > 0));
        let sum: Weight = graph.weights().iter().sum();
        assert_eq!(sum, 2 * graph.total_weight());
    }

    #[test]
    fn half_edges_are_mirrored() {
        let graph = four_cycle();
        assert_csr_invariants(&graph);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.arc_count(), 8);
        assert_eq!(graph.total_weight(), 4);
        for node in 0..4 {
            assert_eq!(graph.node_degree(node), 2);
        }

        let mut adjacent = Vec::new();
        graph.for_each_adjacent_node(0, |v, w| adjacent.push((v, w)));
        adjacent.sort_unstable();
        assert_eq!(adjacent, vec![(1, 1), (3, 1)]);
    }

    #[test]
    fn half_edge_self_loop_becomes_two_arcs() {
        let graph = Graph::from_half_edges(2, &[(0, 0, 3), (0, 1, 2)]);
        assert_csr_invariants(&graph);
        assert_eq!(graph.node_degree(0), 8);
        assert_eq!(graph.node_degree(1), 2);
        assert_eq!(graph.total_weight(), 5);
    }

    #[test]
    fn trailing_isolated_nodes_get_empty_ranges() {
        let graph = Graph::from_half_edges(5, &[(0, 1, 1)]);
        assert_csr_invariants(&graph);
        assert_eq!(graph.first_out(), &[0, 1, 2, 2, 2, 2]);
        assert_eq!(graph.node_degree(4), 0);
    }

    #[test]
    fn adjacency_maps_halve_self_loops() {
        let adjacency: Vec<BTreeMap<NodeId, Weight>> = vec![
            [(0, 6), (1, 2)].into_iter().collect(),
            [(0, 2)].into_iter().collect(),
        ];
        let graph = Graph::from_adjacency_maps(&adjacency);
        assert_csr_invariants(&graph);
        assert_eq!(graph.neighbors(), &[0, 0, 1, 0]);
        assert_eq!(graph.weights(), &[3, 3, 2, 2]);
        assert_eq!(graph.node_degree(0), 8);
        assert_eq!(graph.total_weight(), 5);
    }

    #[test]
    #[should_panic(expected = "odd total weight")]
    fn adjacency_maps_reject_odd_self_loop() {
        let adjacency: Vec<BTreeMap<NodeId, Weight>> = vec![[(0, 3)].into_iter().collect()];
        let _ = Graph::from_adjacency_maps(&adjacency);
    }

    #[test]
    fn adjacency_lists_use_unit_weights() {
        let graph = Graph::from_adjacency_lists(&[vec![1, 2], vec![0], vec![0]]);
        assert_csr_invariants(&graph);
        assert_eq!(graph.total_weight(), 2);
        assert_eq!(graph.node_degree(0), 2);
    }

    #[test]
    fn adjacency_list_self_loop_becomes_two_arcs() {
        let graph = Graph::from_adjacency_lists(&[vec![0, 1], vec![0, 1]]);
        assert_csr_invariants(&graph);
        assert_eq!(graph.neighbors(), &[0, 0, 1, 0, 1, 1]);
        assert_eq!(graph.total_weight(), 3);
        assert_eq!(graph.node_degree(0), 3);
        assert_eq!(graph.node_degree(1), 3);
    }

    #[test]
    #[should_panic(expected = "unpaired self-loop")]
    fn csr_rejects_single_loop_arc() {
        // one arc 0 -> 0 plus the 0 - 1 edge: even volume, but no loop pair
        let _ = Graph::from_csr(vec![0, 2, 4], vec![0, 1, 0, 1], vec![1, 1, 1, 1]);
    }

    #[test]
    #[should_panic(expected = "unpaired self-loop")]
    fn csr_rejects_unequal_loop_halves() {
        let _ = Graph::from_csr(vec![0, 2], vec![0, 0], vec![1, 3]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_endpoint_panics() {
        let _ = Graph::from_half_edges(2, &[(0, 2, 1)]);
    }

    #[test]
    #[should_panic(expected = "zero weight")]
    fn zero_weight_panics() {
        let _ = Graph::from_half_edges(2, &[(0, 1, 0)]);
    }

    #[cfg(feature = "petgraph")]
    #[test]
    fn petgraph_conversion_matches_half_edges() {
        let mut pg = petgraph::graph::UnGraph::<(), ()>::new_undirected();
        let nodes: Vec<_> = (0..4).map(|_| pg.add_node(())).collect();
        for i in 0..4 {
            let _ = pg.add_edge(nodes[i], nodes[(i + 1) % 4], ());
        }
        assert_eq!(Graph::from_petgraph(&pg), four_cycle());
    }

    proptest! {
        #[test]
        fn csr_invariants_hold_for_random_edge_lists(
            node_count in 1usize..40,
            raw in proptest::collection::vec((0u32..40, 0u32..40, 1u64..20), 0..120),
        ) {
            let edges: Vec<_> = raw
                .into_iter()
                .map(|(u, v, w)| (u % node_count as u32, v % node_count as u32, w))
                .collect();
            let graph = Graph::from_half_edges(node_count, &edges);
            assert_csr_invariants(&graph);
            let expected: Weight = edges.iter().map(|&(_, _, w)| w).sum();
            prop_assert_eq!(graph.total_weight(), expected);
        }
    }
}
