//! Spatial primitives shared by the layout passes and the selector:
//! a point quadtree, k-means and DBSCAN clustering, a proximity graph,
//! and grid/boundary pattern detectors.

pub mod cluster;
pub mod graph;
pub mod patterns;
pub mod quadtree;

pub use cluster::{Cluster, DbscanResult, KMeans, KMeansResult, NOISE, dbscan, default_k};
pub use graph::ProximityGraph;
pub use patterns::{BoundaryDetector, Edge, EdgeMembership, GridDetector, GridPitch};
pub use quadtree::QuadTree;
