//! Multilevel Louvain driver.
//!
//! ## The Algorithm (Blondel et al. 2008)
//!
//! 1. **Local moving**: start from singletons and greedily move nodes to the
//!    neighboring cluster with the best objective delta
//!    ([`LocalMoving`]).
//! 2. **Contraction**: every cluster becomes a meta-node; inner arcs become a
//!    self-loop ([`contract`]).
//! 3. **Recurse** on the meta-graph with fresh singletons, then map every node
//!    to the cluster its meta-node ended up in.
//!
//! The recursion stops at the first level where local moving changes nothing
//! (or at the optional level cap). Each level owns its graph and store; levels
//! only talk to each other through the final composition step.
//!
//! Any [`Objective`] can drive the search. [`ObjectiveKind`] picks one at
//! runtime; the driver itself is monomorphized per objective.
//!
//! ## Partitioned start
//!
//! [`Louvain::run_partitioned`] replaces the first level with independent
//! local-moving runs, one per partition of the nodes. Ids of different
//! partitions are kept apart, so no first-level cluster spans two partitions.
//! Later levels run on the contracted graph as usual.
//!
//! ## Determinism
//!
//! All randomness comes from one `StdRng` seeded by [`Louvain::with_seed`],
//! created once per run and threaded through every level.
//!
//! ## References
//!
//! Blondel et al. (2008). "Fast unfolding of communities in large networks."
//! Journal of Statistical Mechanics: Theory and Experiment, P10008.

use std::collections::BTreeMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::contraction::contract;
use super::local_moving::LocalMoving;
use crate::cluster_store::ClusterStore;
use crate::error::{Error, Result};
use crate::graph::{ClusterId, Graph, NodeId};
use crate::objective::{MapEquation, Modularity, Objective, ObjectiveKind};

/// Summary of one level of the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    /// Depth, 0 for the input graph.
    pub level: u32,
    /// Nodes of this level's graph.
    pub node_count: usize,
    /// Clusters found on this level.
    pub cluster_count: usize,
    /// Objective value of this level's clustering on this level's graph.
    pub objective_value: f64,
    /// `cluster size -> number of clusters` on this level.
    pub cluster_size_distribution: BTreeMap<u32, u32>,
}

/// Result of a Louvain run.
#[derive(Debug, Clone)]
pub struct Clustering {
    clusters: ClusterStore,
    objective_value: f64,
    levels: Vec<LevelReport>,
}

impl Clustering {
    /// Final assignment of the input nodes, ids dense from 0.
    pub fn clusters(&self) -> &ClusterStore {
        &self.clusters
    }

    /// Take the final assignment.
    pub fn into_clusters(self) -> ClusterStore {
        self.clusters
    }

    /// Number of final clusters.
    pub fn cluster_count(&self) -> usize {
        self.clusters.cluster_count()
    }

    /// Objective value of the final assignment on the input graph.
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// One report per level, level 0 first.
    pub fn levels(&self) -> &[LevelReport] {
        &self.levels
    }
}

/// Louvain community detection.
#[derive(Debug, Clone)]
pub struct Louvain {
    /// Objective to optimize.
    objective: ObjectiveKind,
    /// Seed of the shuffling generator.
    seed: u64,
    /// Local-moving settings shared by all levels.
    local_moving: LocalMoving,
    /// Maximum number of levels, unlimited if `None`.
    max_levels: Option<u32>,
}

impl Louvain {
    /// Default generator seed.
    pub const DEFAULT_SEED: u64 = 42;

    /// Create a detector optimizing modularity with default settings.
    pub fn new() -> Self {
        Self {
            objective: ObjectiveKind::default(),
            seed: Self::DEFAULT_SEED,
            local_moving: LocalMoving::new(),
            max_levels: None,
        }
    }

    /// Set the objective.
    pub fn with_objective(mut self, objective: ObjectiveKind) -> Self {
        self.objective = objective;
        self
    }

    /// Set the seed of the node-order shuffles.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the maximum number of local-moving passes per level.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.local_moving = self.local_moving.with_max_passes(max_passes);
        self
    }

    /// Cap the number of levels.
    ///
    /// Levels beyond the cap keep their nodes as singletons.
    pub fn with_max_levels(mut self, max_levels: Option<u32>) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Allow nodes of one partition to join clusters of other partitions'
    /// nodes during [`run_partitioned`](Self::run_partitioned).
    pub fn with_ghost_moves(mut self, allow: bool) -> Self {
        self.local_moving = self.local_moving.with_ghost_moves(allow);
        self
    }

    /// Configured objective.
    pub fn objective(&self) -> ObjectiveKind {
        self.objective
    }

    /// Value of any clustering of `graph` under the configured objective.
    pub fn evaluate(&self, graph: &Graph, clusters: &ClusterStore) -> f64 {
        self.objective.evaluate(graph, clusters)
    }

    /// Cluster `graph`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyInput`] for a graph without nodes, and
    /// [`Error::InvalidParameter`] for a zero pass or level limit.
    pub fn run(&self, graph: &Graph) -> Result<Clustering> {
        self.validate(graph)?;
        match self.objective {
            ObjectiveKind::Modularity => Ok(self.drive(graph, &Modularity, None)),
            ObjectiveKind::MapEquation => Ok(self.drive(graph, &MapEquation, None)),
        }
    }

    /// Cluster `graph`, running the first level independently on each
    /// partition. `partitions[n]` is the partition of node `n`.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus [`Error::DimensionMismatch`] if
    /// `partitions` does not cover every node exactly once.
    pub fn run_partitioned(&self, graph: &Graph, partitions: &[u32]) -> Result<Clustering> {
        self.validate(graph)?;
        if partitions.len() != graph.node_count() {
            return Err(Error::DimensionMismatch {
                expected: graph.node_count(),
                found: partitions.len(),
            });
        }
        match self.objective {
            ObjectiveKind::Modularity => Ok(self.drive(graph, &Modularity, Some(partitions))),
            ObjectiveKind::MapEquation => Ok(self.drive(graph, &MapEquation, Some(partitions))),
        }
    }

    fn validate(&self, graph: &Graph) -> Result<()> {
        if graph.node_count() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.local_moving.max_passes() == 0 {
            return Err(Error::InvalidParameter {
                name: "max_passes",
                message: "must be at least 1",
            });
        }
        if self.max_levels == Some(0) {
            return Err(Error::InvalidParameter {
                name: "max_levels",
                message: "must be at least 1",
            });
        }
        Ok(())
    }

    fn drive<O: Objective>(&self, graph: &Graph, objective: &O, partitions: Option<&[u32]>) -> Clustering {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut driver = Driver {
            objective,
            local_moving: &self.local_moving,
            max_levels: self.max_levels,
            rng: &mut rng,
            levels: Vec::new(),
        };

        let mut clusters = match partitions {
            Some(partitions) => driver.partitioned_level(graph, partitions),
            None => driver.level(graph, 0),
        };
        let levels = driver.levels;

        clusters.rewrite_cluster_ids(0);
        let objective_value = objective.whole_graph_value(graph, &clusters);
        info!(
            "louvain ({}): {} nodes -> {} clusters in {} levels, value {objective_value:.6}",
            objective.name(),
            graph.node_count(),
            clusters.cluster_count(),
            levels.len()
        );

        Clustering {
            clusters,
            objective_value,
            levels,
        }
    }
}

impl Default for Louvain {
    fn default() -> Self {
        Self::new()
    }
}

/// State threaded through the recursion.
struct Driver<'a, O, R: ?Sized> {
    objective: &'a O,
    local_moving: &'a LocalMoving,
    max_levels: Option<u32>,
    rng: &'a mut R,
    levels: Vec<LevelReport>,
}

impl<O: Objective, R: Rng + ?Sized> Driver<'_, O, R> {
    /// Cluster `graph` starting from singletons; returns its final store.
    fn level(&mut self, graph: &Graph, level: u32) -> ClusterStore {
        let mut clusters = ClusterStore::singletons(graph.node_count());
        if self.max_levels.is_some_and(|cap| level >= cap) {
            return clusters;
        }

        let changed = self
            .local_moving
            .run_all(graph, &mut clusters, self.objective, &mut *self.rng);
        self.report(graph, &clusters, level);
        if !changed {
            return clusters;
        }

        self.contract_and_recurse(graph, &mut clusters, level);
        clusters
    }

    /// First level of a partitioned run.
    fn partitioned_level(&mut self, graph: &Graph, partitions: &[u32]) -> ClusterStore {
        let mut clusters = cluster_partitions(graph, partitions, self.objective, self.local_moving, &mut *self.rng);
        self.report(graph, &clusters, 0);
        if self.max_levels == Some(1) {
            return clusters;
        }
        self.contract_and_recurse(graph, &mut clusters, 0);
        clusters
    }

    /// Contract `clusters`, cluster the meta-graph, and map every node to
    /// the cluster of its meta-node.
    fn contract_and_recurse(&mut self, graph: &Graph, clusters: &mut ClusterStore, level: u32) {
        let meta_graph = contract(graph, clusters);
        let meta_clusters = self.level(&meta_graph, level + 1);
        for node in 0..graph.node_count() as NodeId {
            clusters.set(node, meta_clusters.cluster_of(clusters.cluster_of(node)));
        }
    }

    fn report(&mut self, graph: &Graph, clusters: &ClusterStore, level: u32) {
        let report = LevelReport {
            level,
            node_count: graph.node_count(),
            cluster_count: clusters.cluster_count(),
            objective_value: self.objective.whole_graph_value(graph, clusters),
            cluster_size_distribution: clusters.cluster_size_distribution(),
        };
        debug!(
            "{} level {}: {} nodes -> {} clusters, value {:.6}",
            self.objective.name(),
            report.level,
            report.node_count,
            report.cluster_count,
            report.objective_value
        );
        self.levels.push(report);
    }
}

/// Local moving restricted to each partition in turn.
///
/// Every partition starts from singletons, with the nodes of all other
/// partitions as singleton ghosts. The resulting ids are renumbered per
/// partition from a shared counter, so clusters never span partitions.
fn cluster_partitions<O, R>(
    graph: &Graph,
    partitions: &[u32],
    objective: &O,
    local_moving: &LocalMoving,
    rng: &mut R,
) -> ClusterStore
where
    O: Objective,
    R: Rng + ?Sized,
{
    let partition_count = partitions.iter().copied().max().map_or(0, |p| p as usize + 1);
    let mut members: Vec<Vec<NodeId>> = vec![Vec::new(); partition_count];
    for (node, &partition) in partitions.iter().enumerate() {
        members[partition as usize].push(node as NodeId);
    }

    let mut clusters = ClusterStore::singletons(graph.node_count());
    let mut scratch = ClusterStore::singletons(graph.node_count());
    let mut id_counter: ClusterId = 0;

    for (partition, nodes) in members.iter_mut().enumerate() {
        if nodes.is_empty() {
            continue;
        }
        let _ = local_moving.run(graph, &mut scratch, objective, nodes, &mut *rng);

        let in_ghost_clusters = nodes
            .iter()
            .filter(|&&node| partitions[scratch.cluster_of(node) as usize] as usize != partition)
            .count();
        debug!(
            "partition {partition}: {} nodes, {in_ghost_clusters} in ghost clusters",
            nodes.len()
        );

        for &node in nodes.iter() {
            clusters.set(node, scratch.cluster_of(node));
        }
        id_counter = clusters.rewrite_cluster_ids_for(nodes, id_counter);

        // back to singletons for the next partition
        for &node in nodes.iter() {
            scratch.set(node, node);
        }
    }

    clusters
}

#[cfg(feature = "petgraph")]
impl super::traits::CommunityDetection for Louvain {
    fn detect<N, E>(&self, graph: &petgraph::graph::UnGraph<N, E>) -> Result<Vec<usize>> {
        let clustering = self.run(&Graph::from_petgraph(graph))?;
        Ok(clustering
            .into_clusters()
            .into_vec()
            .into_iter()
            .map(|cluster| cluster as usize)
            .collect())
    }
}
