use crate::error::{LayoutError, LayoutResult, require_positive};
use crate::geometry::Point2D;
use crate::spatial::quadtree::QuadTree;
use std::collections::VecDeque;

/// Undirected graph linking every pair of points within a distance threshold.
#[derive(Debug, Clone, Default)]
pub struct ProximityGraph {
    adjacency: Vec<Vec<usize>>,
}

impl ProximityGraph {
    pub fn build(points: &[Point2D], threshold: f64) -> LayoutResult<Self> {
        require_positive("threshold", threshold)?;
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); points.len()];
        if let Some(index) = QuadTree::from_items(points.iter().copied().enumerate()) {
            for (i, p) in points.iter().enumerate() {
                let mut near: Vec<usize> = index
                    .query_radius(*p, threshold)
                    .into_iter()
                    .map(|(j, _)| j)
                    .filter(|&j| j != i)
                    .collect();
                near.sort_unstable();
                adjacency[i] = near;
            }
        }
        Ok(Self { adjacency })
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.adjacency.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Sorted members of the component containing `index`.
    pub fn component_of(&self, index: usize) -> LayoutResult<Vec<usize>> {
        self.component_of_all(&[index])
    }

    /// Sorted union of the components containing any of `seeds`.
    pub fn component_of_all(&self, seeds: &[usize]) -> LayoutResult<Vec<usize>> {
        let n = self.adjacency.len();
        if let Some(&bad) = seeds.iter().find(|&&s| s >= n) {
            return Err(LayoutError::invalid("component seed index", bad));
        }
        let mut seen = vec![false; n];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for &s in seeds {
            if !seen[s] {
                seen[s] = true;
                queue.push_back(s);
            }
        }
        while let Some(current) = queue.pop_front() {
            for &next in &self.adjacency[current] {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        Ok((0..n).filter(|&i| seen[i]).collect())
    }

    /// All connected components, each sorted, ordered by their smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.adjacency.len();
        let mut label = vec![usize::MAX; n];
        let mut out: Vec<Vec<usize>> = Vec::new();
        for start in 0..n {
            if label[start] != usize::MAX {
                continue;
            }
            let id = out.len();
            let mut members = Vec::new();
            let mut stack = vec![start];
            label[start] = id;
            while let Some(current) = stack.pop() {
                members.push(current);
                for &next in &self.adjacency[current] {
                    if label[next] == usize::MAX {
                        label[next] = id;
                        stack.push(next);
                    }
                }
            }
            members.sort_unstable();
            out.push(members);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_and_island() -> Vec<Point2D> {
        vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(3.0, 0.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.5, 10.0),
        ]
    }

    #[test]
    fn links_points_within_threshold() {
        let graph = ProximityGraph::build(&chain_and_island(), 1.0).unwrap();
        assert_eq!(graph.neighbors(1), &[0, 2]);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn component_walks_the_chain() {
        let graph = ProximityGraph::build(&chain_and_island(), 1.0).unwrap();
        assert_eq!(graph.component_of(0).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(graph.component_of(5).unwrap(), vec![4, 5]);
        assert_eq!(graph.component_of_all(&[3, 4]).unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(graph.components().len(), 2);
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let pts: Vec<Point2D> = (0..5_000).map(|i| Point2D::new(i as f64, 0.0)).collect();
        let graph = ProximityGraph::build(&pts, 1.0).unwrap();
        assert_eq!(graph.component_of(0).unwrap().len(), 5_000);
    }

    #[test]
    fn out_of_range_seed_is_rejected() {
        let graph = ProximityGraph::build(&chain_and_island(), 1.0).unwrap();
        assert!(graph.component_of(42).is_err());
    }
}
