//! Node → cluster assignment for one level.
//!
//! A [`ClusterStore`] keeps one [`ClusterId`] per node together with the
//! half-open range `[lower_bound, upper_bound)` of ids that are currently
//! valid. Writes outside that range are contract violations and panic; the
//! range moves only through the renumbering helpers or an explicit
//! [`ClusterStore::rebind`].

use std::collections::{BTreeMap, HashMap};

use crate::graph::{ClusterId, NodeId};

const UNSEEN: ClusterId = ClusterId::MAX;

/// Mutable cluster assignment with a declared id range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStore {
    node_clusters: Vec<ClusterId>,
    lower_bound: ClusterId,
    upper_bound: ClusterId,
}

impl ClusterStore {
    /// Every node starts in `initial`.
    ///
    /// The valid range is `[0, max(node_count, initial + 1))`.
    ///
    /// # Panics
    ///
    /// If `initial` is `ClusterId::MAX`, which is reserved.
    pub fn new(node_count: usize, initial: ClusterId) -> Self {
        assert!(initial < UNSEEN, "cluster id {initial} is reserved");
        let upper = (node_count as ClusterId).max(initial + 1);
        Self {
            node_clusters: vec![initial; node_count],
            lower_bound: 0,
            upper_bound: upper,
        }
    }

    /// Every node in its own cluster (`cluster_of(n) == n`).
    pub fn singletons(node_count: usize) -> Self {
        let mut store = Self::new(node_count, 0);
        store.assign_singleton_cluster_ids();
        store
    }

    /// Wrap an existing assignment; bounds are `[0, max + 1)`.
    ///
    /// # Panics
    ///
    /// If an id is `ClusterId::MAX`, which is reserved.
    pub fn from_vec(node_clusters: Vec<ClusterId>) -> Self {
        let max = node_clusters.iter().copied().max();
        assert!(max != Some(UNSEEN), "cluster id {UNSEEN} is reserved");
        let upper = max.map_or(1, |m| m + 1);
        Self {
            node_clusters,
            lower_bound: 0,
            upper_bound: upper,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.node_clusters.len()
    }

    /// True if the store covers no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_clusters.is_empty()
    }

    /// Cluster of `node`.
    #[inline]
    pub fn cluster_of(&self, node: NodeId) -> ClusterId {
        self.node_clusters[node as usize]
    }

    /// Inclusive lower end of the valid id range.
    pub fn lower_bound(&self) -> ClusterId {
        self.lower_bound
    }

    /// Exclusive upper end of the valid id range.
    pub fn upper_bound(&self) -> ClusterId {
        self.upper_bound
    }

    /// Raw assignment, indexed by node.
    pub fn as_slice(&self) -> &[ClusterId] {
        &self.node_clusters
    }

    /// Consume into the raw assignment.
    pub fn into_vec(self) -> Vec<ClusterId> {
        self.node_clusters
    }

    /// Assign `cluster` to `node`.
    ///
    /// # Panics
    ///
    /// If `node` is out of range or `cluster` lies outside the declared bounds.
    #[inline]
    pub fn set(&mut self, node: NodeId, cluster: ClusterId) {
        assert!(
            cluster >= self.lower_bound && cluster < self.upper_bound,
            "cluster id {cluster} outside [{}, {})",
            self.lower_bound,
            self.upper_bound
        );
        self.node_clusters[node as usize] = cluster;
    }

    /// Reset to the identity assignment with bounds `[0, len)`.
    pub fn assign_singleton_cluster_ids(&mut self) {
        for (node, cluster) in self.node_clusters.iter_mut().enumerate() {
            *cluster = node as ClusterId;
        }
        self.reset_bounds();
    }

    /// Declare `[0, max(len, 1))` as the valid range.
    pub fn reset_bounds(&mut self) {
        self.lower_bound = 0;
        self.upper_bound = (self.len() as ClusterId).max(1);
    }

    /// Declare `[lower, upper)` as the valid range.
    pub fn rebind(&mut self, lower: ClusterId, upper: ClusterId) {
        assert!(lower < upper, "empty id range [{lower}, {upper})");
        self.lower_bound = lower;
        self.upper_bound = upper;
    }

    /// Renumber all ids densely, starting at `id_counter`.
    ///
    /// Nodes are walked in ascending order and each id not seen before gets
    /// the next counter value. The partition itself is unchanged. Returns the
    /// next free id; the bounds become `[id_counter, returned)`.
    pub fn rewrite_cluster_ids(&mut self, id_counter: ClusterId) -> ClusterId {
        let mut mapping = vec![UNSEEN; self.id_space()];
        let mut next = id_counter;
        for cluster in &mut self.node_clusters {
            let slot = &mut mapping[*cluster as usize];
            if *slot == UNSEEN {
                *slot = next;
                next += 1;
            }
            *cluster = *slot;
        }

        self.lower_bound = id_counter;
        self.upper_bound = next.max(id_counter + 1);
        next
    }

    /// Like [`rewrite_cluster_ids`](Self::rewrite_cluster_ids), but only for
    /// `nodes`, walked in the given order.
    ///
    /// Ids of other nodes are left alone. The bounds are widened to cover the
    /// new ids, so several subsets can be renumbered into one store without
    /// collisions by threading the returned counter.
    pub fn rewrite_cluster_ids_for(&mut self, nodes: &[NodeId], id_counter: ClusterId) -> ClusterId {
        let mut mapping: HashMap<ClusterId, ClusterId> = HashMap::with_capacity(nodes.len());
        let mut next = id_counter;
        for &node in nodes {
            let cluster = &mut self.node_clusters[node as usize];
            let renamed = *mapping.entry(*cluster).or_insert_with(|| {
                next += 1;
                next - 1
            });
            *cluster = renamed;
        }

        self.lower_bound = self.lower_bound.min(id_counter);
        self.upper_bound = self.upper_bound.max(next);
        next
    }

    /// Number of distinct ids in use.
    pub fn cluster_count(&self) -> usize {
        let mut seen = vec![false; self.id_space()];
        let mut count = 0;
        for &cluster in &self.node_clusters {
            if !seen[cluster as usize] {
                seen[cluster as usize] = true;
                count += 1;
            }
        }
        count
    }

    /// Number of nodes per cluster id, indexed by id.
    pub fn cluster_sizes(&self) -> Vec<u32> {
        let mut sizes = vec![0u32; self.id_space()];
        for &cluster in &self.node_clusters {
            sizes[cluster as usize] += 1;
        }
        sizes
    }

    /// Histogram `cluster size -> number of clusters with that size`.
    pub fn cluster_size_distribution(&self) -> BTreeMap<u32, u32> {
        let mut distribution = BTreeMap::new();
        for size in self.cluster_sizes() {
            if size != 0 {
                *distribution.entry(size).or_insert(0) += 1;
            }
        }
        distribution
    }

    /// Common refinement of two clusterings over the same nodes.
    ///
    /// Two nodes share a cluster in the result iff they share one in both
    /// inputs. Ids are dense, starting at 0.
    ///
    /// # Panics
    ///
    /// If the stores cover a different number of nodes.
    pub fn intersection(&self, other: &ClusterStore) -> ClusterStore {
        assert_eq!(self.len(), other.len(), "intersection of differently sized stores");
        let stride = other.id_space() as u64;
        let mut mapping: HashMap<u64, ClusterId> = HashMap::new();
        let mut node_clusters = Vec::with_capacity(self.len());
        for (&a, &b) in self.node_clusters.iter().zip(&other.node_clusters) {
            let product = u64::from(a) * stride + u64::from(b);
            let next = mapping.len() as ClusterId;
            node_clusters.push(*mapping.entry(product).or_insert(next));
        }

        let count = mapping.len() as ClusterId;
        ClusterStore {
            node_clusters,
            lower_bound: 0,
            upper_bound: count.max(1),
        }
    }

    /// Size of an array that can be indexed by every id in the store.
    pub(crate) fn id_space(&self) -> usize {
        let max_used = self.node_clusters.iter().copied().max().map_or(0, |m| m as usize + 1);
        max_used.max(self.upper_bound as usize)
    }
}
