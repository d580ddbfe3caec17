//! # coarsen
//!
//! Multilevel graph clustering: Louvain-style local moving and contraction
//! over a compact weighted graph, driven by modularity or the map equation.
//!
//! ```rust
//! use coarsen::{Graph, Louvain, ObjectiveKind};
//!
//! let graph = Graph::from_adjacency_lists(&[vec![1, 2], vec![0, 2], vec![0, 1]]);
//! let clustering = Louvain::new()
//!     .with_objective(ObjectiveKind::MapEquation)
//!     .run(&graph)
//!     .unwrap();
//! assert_eq!(clustering.clusters().as_slice(), &[0, 0, 0]);
//! ```
//!
//! Every level owns its own [`Graph`] and [`ClusterStore`]; results are
//! composed back onto the input nodes once the recursion unwinds. Runs are
//! single-threaded and fully determined by the configured seed.

pub mod cluster_store;
pub mod community;
/// Error types used across `coarsen`.
pub mod error;
pub mod graph;
pub mod objective;

pub use cluster_store::ClusterStore;
pub use community::{contract, Clustering, LevelReport, LocalMoving, Louvain};
pub use error::{Error, Result};
pub use graph::{ClusterId, EdgeId, Graph, NodeId, Weight, Wide};
pub use objective::{Candidate, MapEquation, Modularity, Objective, ObjectiveKind};

#[cfg(feature = "petgraph")]
pub use community::CommunityDetection;
