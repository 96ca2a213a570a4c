//! Translation and scale invariant comparison of team formations, and grouping
//! of rounds by formation.

pub mod cluster;
pub mod similarity;

pub use cluster::{Cluster, ClusterConfig, FormationClusterer, SimilarityMatrix};
pub use similarity::formation_similarity;
