//! Selection queries over anything with a position.
//!
//! Every query is pure: it reads the element slice and returns sorted,
//! de-duplicated indices into it.

use crate::config::{KMeansConfig, SelectorConfig};
use crate::error::{LayoutError, LayoutResult, require_points, require_positive};
use crate::geometry::{Point2D, centroid};
use crate::spatial::{BoundaryDetector, Cluster, Edge, GridDetector, KMeans, ProximityGraph, dbscan};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Minimum elements for a k-means grouping query.
pub const MIN_PARTITION_ELEMENTS: usize = 3;
/// Minimum elements for a density-cluster query.
pub const MIN_CLUSTER_ELEMENTS: usize = 5;

/// Something the selector can place on the plane.
pub trait Locatable {
    fn location(&self) -> Point2D;

    /// Host type tag used by similarity queries.
    fn element_type(&self) -> Option<&str> {
        None
    }

    fn category(&self) -> Option<&str> {
        None
    }
}

impl Locatable for Point2D {
    fn location(&self) -> Point2D {
        *self
    }
}

/// A host element with resolved geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    pub position: Point2D,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub type_id: Option<String>,
}

impl Element {
    pub fn new(id: impl Into<String>, position: Point2D) -> Self {
        Self {
            id: id.into(),
            position,
            category: None,
            type_id: None,
        }
    }

    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

impl Locatable for Element {
    fn location(&self) -> Point2D {
        self.position
    }

    fn element_type(&self) -> Option<&str> {
        self.type_id.as_deref()
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

pub struct SpatialSelector<'a, L> {
    elements: &'a [L],
    config: SelectorConfig,
}

impl<'a, L: Locatable> SpatialSelector<'a, L> {
    pub fn new(elements: &'a [L], config: SelectorConfig) -> Self {
        Self { elements, config }
    }

    pub fn elements(&self) -> &'a [L] {
        self.elements
    }

    fn points(&self) -> Vec<Point2D> {
        self.elements.iter().map(Locatable::location).collect()
    }

    fn check_indices(&self, indices: &[usize]) -> LayoutResult<()> {
        match indices.iter().find(|&&i| i >= self.elements.len()) {
            Some(&bad) => Err(LayoutError::invalid("selection index", bad)),
            None => Ok(()),
        }
    }

    fn seed_centroid(&self, seeds: &[usize], operation: &'static str) -> LayoutResult<Point2D> {
        self.check_indices(seeds)?;
        centroid(seeds.iter().map(|&i| self.elements[i].location()))
            .ok_or_else(|| LayoutError::insufficient(operation, 1, 0))
    }

    /// Elements sharing a type with any selected element.
    pub fn similar(&self, selection: &[usize]) -> LayoutResult<Vec<usize>> {
        self.check_indices(selection)?;
        let types: BTreeSet<&str> = selection
            .iter()
            .filter_map(|&i| self.elements[i].element_type())
            .collect();
        Ok(self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.element_type().is_some_and(|t| types.contains(t)))
            .map(|(i, _)| i)
            .collect())
    }

    /// Everything reachable from the seeds through hops no longer than `radius`
    /// (the configured chain radius when `None`).
    pub fn chain(&self, seeds: &[usize], radius: Option<f64>) -> LayoutResult<Vec<usize>> {
        require_points("chain selection", 1, seeds.len())?;
        let radius = radius.unwrap_or(self.config.chain_radius);
        require_positive("chain radius", radius)?;
        self.check_indices(seeds)?;
        let graph = ProximityGraph::build(&self.points(), radius)?;
        graph.component_of_all(seeds)
    }

    /// The density cluster whose centroid lies nearest the seeds' centroid.
    /// Empty when every element is noise.
    pub fn nearest_cluster(&self, seeds: &[usize]) -> LayoutResult<Vec<usize>> {
        require_points("cluster selection", MIN_CLUSTER_ELEMENTS, self.elements.len())?;
        let target = self.seed_centroid(seeds, "cluster selection")?;
        let points = self.points();
        let result = dbscan(
            &points,
            self.config.dbscan_eps,
            self.config.dbscan_min_points,
        )?;
        let clusters = result.to_clusters(&points);
        debug!(clusters = clusters.len(), noise = result.noise().len(), "cluster selection");
        Ok(nearest_group(clusters, target))
    }

    /// The k-means group whose centroid lies nearest the seeds' centroid.
    pub fn kmeans_partition<R: Rng + ?Sized>(
        &self,
        seeds: &[usize],
        k: Option<usize>,
        rng: &mut R,
    ) -> LayoutResult<Vec<usize>> {
        require_points("partition selection", MIN_PARTITION_ELEMENTS, self.elements.len())?;
        let target = self.seed_centroid(seeds, "partition selection")?;
        let result = KMeans::new(KMeansConfig::default()).run(&self.points(), k, rng)?;
        let groups = result.clusters.into_iter().filter(|c| !c.is_empty()).collect();
        Ok(nearest_group(groups, target))
    }

    /// Elements of the selection's type that sit on the grid those elements
    /// form. With an untyped selection every element takes part.
    pub fn on_grid(&self, selection: &[usize]) -> LayoutResult<Vec<usize>> {
        let mut pool = self.similar(selection)?;
        if pool.is_empty() {
            pool = (0..self.elements.len()).collect();
        }
        let points: Vec<Point2D> = pool.iter().map(|&i| self.elements[i].location()).collect();
        let detector = GridDetector::new(self.config.grid_tolerance)?;
        let pitch = detector.detect(&points)?;
        debug!(
            x_pitch = ?pitch.x_pitch,
            y_pitch = ?pitch.y_pitch,
            candidates = pool.len(),
            "grid selection"
        );
        Ok(detector
            .on_grid(&points, &pitch)
            .into_iter()
            .map(|j| pool[j])
            .collect())
    }

    /// Elements in the named boundary band (`top`, `bottom`, `left`, `right`, `center`).
    pub fn edge_region(&self, region: &str) -> LayoutResult<Vec<usize>> {
        let edge: Edge = region.parse()?;
        let detector = BoundaryDetector::new(self.config.edge_margin_pct)?;
        let membership = detector.find_edges(&self.points())?;
        Ok(membership.members(edge).to_vec())
    }
}

impl SpatialSelector<'_, Element> {
    /// Element ids for a query result, in result order.
    pub fn ids_of(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.elements.get(i))
            .map(|e| e.id.clone())
            .collect()
    }
}

fn nearest_group(groups: Vec<Cluster>, target: Point2D) -> Vec<usize> {
    let Some(best) = groups
        .into_iter()
        .min_by(|a, b| {
            a.centroid
                .distance_sq(target)
                .total_cmp(&b.centroid.distance_sq(target))
        })
    else {
        return Vec::new();
    };
    let mut members = best.members;
    members.sort_unstable();
    members.dedup();
    members
}
