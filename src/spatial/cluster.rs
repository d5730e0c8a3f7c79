use crate::config::KMeansConfig;
use crate::error::{LayoutResult, require_points, require_positive};
use crate::geometry::{Point2D, centroid};
use crate::spatial::quadtree::QuadTree;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Cluster id reserved for DBSCAN noise.
pub const NOISE: i32 = -1;

/// Grouping of indices into the point set that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub members: Vec<usize>,
    pub centroid: Point2D,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn points<'a>(&'a self, points: &'a [Point2D]) -> impl Iterator<Item = Point2D> + 'a {
        self.members.iter().map(move |&i| points[i])
    }
}

#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub centroids: Vec<Point2D>,
    /// One entry per centroid, in the same order; some may be empty.
    pub clusters: Vec<Cluster>,
    pub iterations: usize,
    pub converged: bool,
}

/// `clamp(round(sqrt(n / 2)), 1, 6)`.
pub fn default_k(n: usize) -> usize {
    ((n as f64 / 2.0).sqrt().round() as usize).clamp(1, 6)
}

/// Lloyd-style k-means with centroids seeded from distinct input points.
#[derive(Debug, Clone, Default)]
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    /// Partition `points` into `k` groups (or the configured/derived default).
    ///
    /// The effective k is always `min(k, points.len())`.
    pub fn run<R: Rng + ?Sized>(
        &self,
        points: &[Point2D],
        k: Option<usize>,
        rng: &mut R,
    ) -> LayoutResult<KMeansResult> {
        let n = points.len();
        require_points("kmeans", 1, n)?;
        let k = k
            .or(self.config.k)
            .unwrap_or_else(|| default_k(n))
            .clamp(1, n);

        let mut centroids: Vec<Point2D> = rand::seq::index::sample(rng, n, k)
            .into_iter()
            .map(|i| points[i])
            .collect();
        let mut assignment = vec![0usize; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            for (slot, p) in assignment.iter_mut().zip(points) {
                *slot = nearest_index(&centroids, *p);
            }

            let mut sums = vec![Point2D::ZERO; k];
            let mut counts = vec![0usize; k];
            for (&c, p) in assignment.iter().zip(points) {
                sums[c] += *p;
                counts[c] += 1;
            }
            let mut max_shift: f64 = 0.0;
            for c in 0..k {
                if counts[c] == 0 {
                    continue;
                }
                let next = sums[c] / counts[c] as f64;
                max_shift = max_shift.max(next.distance(centroids[c]));
                centroids[c] = next;
            }
            if max_shift <= self.config.tolerance {
                converged = true;
                break;
            }
        }
        // Membership must reflect the final centroids even when the loop ran out.
        for (slot, p) in assignment.iter_mut().zip(points) {
            *slot = nearest_index(&centroids, *p);
        }

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (i, &c) in assignment.iter().enumerate() {
            members[c].push(i);
        }
        let clusters = members
            .into_iter()
            .zip(&centroids)
            .map(|(members, &centroid)| Cluster { members, centroid })
            .collect();

        debug!(n, k, iterations, converged, "kmeans finished");
        Ok(KMeansResult {
            centroids,
            clusters,
            iterations,
            converged,
        })
    }
}

/// Index of the closest centroid; ties resolve to the lowest index.
fn nearest_index(centroids: &[Point2D], p: Point2D) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = c.distance_sq(p);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbscanResult {
    /// Cluster id per input point; `NOISE` for unclustered points.
    pub assignments: Vec<i32>,
    /// `cluster_id -> member indices`, including the `NOISE` bucket when non-empty.
    pub clusters: BTreeMap<i32, Vec<usize>>,
}

impl DbscanResult {
    pub fn cluster_count(&self) -> usize {
        self.clusters.keys().filter(|&&id| id != NOISE).count()
    }

    pub fn noise(&self) -> &[usize] {
        self.clusters.get(&NOISE).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-noise clusters with their centroids, in ascending id order.
    pub fn to_clusters(&self, points: &[Point2D]) -> Vec<Cluster> {
        self.clusters
            .iter()
            .filter(|&(&id, _)| id != NOISE)
            .filter_map(|(_, members)| {
                let c = centroid(members.iter().map(|&i| points[i]))?;
                Some(Cluster {
                    members: members.clone(),
                    centroid: c,
                })
            })
            .collect()
    }
}

/// Density-based clustering. A point is core when at least `min_pts` points
/// (itself included) lie within `eps`.
///
/// Ids are assigned in order of the first core point encountered, so the same
/// input ordering always produces the same assignment.
pub fn dbscan(points: &[Point2D], eps: f64, min_pts: usize) -> LayoutResult<DbscanResult> {
    require_positive("eps", eps)?;
    let n = points.len();
    let mut assignments = vec![NOISE; n];
    let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    let Some(index) = QuadTree::from_items(points.iter().copied().enumerate()) else {
        return Ok(DbscanResult {
            assignments,
            clusters,
        });
    };
    let region = |i: usize| -> Vec<usize> {
        let mut found: Vec<usize> = index
            .query_radius(points[i], eps)
            .into_iter()
            .map(|(j, _)| j)
            .collect();
        found.sort_unstable();
        found
    };

    let mut visited = vec![false; n];
    let mut next_id: i32 = 0;
    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let neighbors = region(i);
        if neighbors.len() < min_pts.max(1) {
            continue;
        }
        let id = next_id;
        next_id += 1;
        assignments[i] = id;
        let mut queue: std::collections::VecDeque<usize> = neighbors.into_iter().collect();
        while let Some(j) = queue.pop_front() {
            if assignments[j] == NOISE {
                assignments[j] = id;
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = region(j);
            if reach.len() >= min_pts.max(1) {
                queue.extend(reach.into_iter().filter(|&k| !visited[k] || assignments[k] == NOISE));
            }
        }
    }

    for (i, &id) in assignments.iter().enumerate() {
        clusters.entry(id).or_default().push(i);
    }
    debug!(n, eps, min_pts, clusters = next_id, "dbscan finished");
    Ok(DbscanResult {
        assignments,
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn blobs() -> Vec<Point2D> {
        let mut pts = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (20.0, 0.0), (10.0, 20.0)] {
            for i in 0..6 {
                let a = i as f64;
                pts.push(Point2D::new(cx + (a * 0.7).cos(), cy + (a * 1.3).sin()));
            }
        }
        pts
    }

    #[test]
    fn default_k_is_clamped() {
        assert_eq!(default_k(1), 1);
        assert_eq!(default_k(8), 2);
        assert_eq!(default_k(18), 3);
        assert_eq!(default_k(1000), 6);
    }

    #[test]
    fn kmeans_centroid_count_is_min_of_k_and_n() {
        let mut rng = StdRng::seed_from_u64(3);
        let pts = blobs();
        let km = KMeans::default();
        assert_eq!(km.run(&pts, Some(3), &mut rng).unwrap().centroids.len(), 3);
        assert_eq!(km.run(&pts[..2], Some(5), &mut rng).unwrap().centroids.len(), 2);
        assert_eq!(km.run(&pts[..1], None, &mut rng).unwrap().centroids.len(), 1);
    }

    #[test]
    fn kmeans_rejects_empty_input() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = KMeans::default().run(&[], Some(2), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            crate::error::LayoutError::InsufficientData { actual: 0, .. }
        ));
    }

    #[test]
    fn kmeans_assigns_every_point_once() {
        let mut rng = StdRng::seed_from_u64(11);
        let pts = blobs();
        let result = KMeans::default().run(&pts, Some(3), &mut rng).unwrap();
        let mut seen: Vec<usize> = result
            .clusters
            .iter()
            .flat_map(|c| c.members.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..pts.len()).collect::<Vec<_>>());
    }

    #[test]
    fn nearest_index_prefers_lowest_on_tie() {
        let centroids = [Point2D::new(-1.0, 0.0), Point2D::new(1.0, 0.0)];
        assert_eq!(nearest_index(&centroids, Point2D::ZERO), 0);
    }

    #[test]
    fn dbscan_finds_blobs_and_noise() {
        let mut pts = blobs();
        pts.push(Point2D::new(100.0, 100.0));
        let result = dbscan(&pts, 3.0, 3).unwrap();
        assert_eq!(result.cluster_count(), 3);
        assert_eq!(result.noise(), &[18]);
        assert_eq!(result.assignments[0], 0);
        assert_eq!(result.assignments[6], 1);
        assert_eq!(result.assignments[12], 2);
    }

    #[test]
    fn dbscan_is_deterministic() {
        let pts = blobs();
        let a = dbscan(&pts, 2.5, 4).unwrap();
        let b = dbscan(&pts, 2.5, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dbscan_border_point_joins_cluster() {
        let pts = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(0.5, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(1.9, 0.0),
        ];
        let result = dbscan(&pts, 1.0, 3).unwrap();
        assert_eq!(result.assignments, vec![0, 0, 0, 0]);
        let clusters = result.to_clusters(&pts);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 4);
    }
}
