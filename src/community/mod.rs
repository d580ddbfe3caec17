//! Multilevel community detection.
//!
//! Given a graph, find groupings where nodes within groups are densely
//! connected and connections between groups are sparse, by greedily
//! optimizing an [`Objective`](crate::objective::Objective).
//!
//! ## Building Blocks
//!
//! - [`LocalMoving`]: one level of greedy node moves in random order.
//! - [`contract`]: collapse every cluster into a meta-node.
//! - [`Louvain`]: alternate both until local moving stops changing anything.
//!
//! ```text
//! level 0   ●●●  ●●●  ●●●      local moving, contract
//!             │    │    │
//! level 1     ◉    ◉    ◉      local moving, contract
//!              \   |   /
//! level 2         ◉◉◉          no move: stop, compose back down
//! ```
//!
//! Louvain can produce clusters that are not internally connected; no
//! refinement phase is applied.
//!
//! ## Usage
//!
//! ```rust
//! use coarsen::community::Louvain;
//! use coarsen::graph::Graph;
//! use coarsen::objective::ObjectiveKind;
//!
//! // Two triangles joined by one edge
//! let graph = Graph::from_half_edges(
//!     6,
//!     &[(0, 1, 1), (1, 2, 1), (0, 2, 1), (3, 4, 1), (4, 5, 1), (3, 5, 1), (2, 3, 1)],
//! );
//!
//! let clustering = Louvain::new()
//!     .with_objective(ObjectiveKind::Modularity)
//!     .with_seed(7)
//!     .run(&graph)
//!     .unwrap();
//! assert_eq!(clustering.cluster_count(), 2);
//! ```
//!
//! ## References
//!
//! - Blondel et al. (2008). "Fast unfolding of communities in large networks."
//! - Rosvall & Bergstrom (2008). "Maps of random walks on complex networks
//!   reveal community structure."

mod contraction;
mod local_moving;
mod louvain;
#[cfg(feature = "petgraph")]
mod traits;

pub use contraction::contract;
pub use local_moving::LocalMoving;
pub use louvain::{Clustering, LevelReport, Louvain};
#[cfg(feature = "petgraph")]
pub use traits::CommunityDetection;
