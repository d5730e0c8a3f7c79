use crate::error::{LayoutError, LayoutResult, require_points, require_positive};
use crate::geometry::{Bounds, COINCIDENT_EPS, Point2D};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detected spacing along each axis, measured from the smallest bucketed coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridPitch {
    pub x_pitch: Option<f64>,
    pub y_pitch: Option<f64>,
    pub x_origin: f64,
    pub y_origin: f64,
}

impl GridPitch {
    pub fn is_empty(&self) -> bool {
        self.x_pitch.is_none() && self.y_pitch.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GridDetector {
    tolerance: f64,
}

impl GridDetector {
    pub fn new(tolerance: f64) -> LayoutResult<Self> {
        require_positive("tolerance", tolerance)?;
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn detect(&self, points: &[Point2D]) -> LayoutResult<GridPitch> {
        require_points("grid detection", 2, points.len())?;
        let bounds = Bounds::from_points(points.iter().copied())
            .ok_or_else(|| LayoutError::insufficient("grid detection", 2, 0))?;
        if bounds.width() < COINCIDENT_EPS && bounds.height() < COINCIDENT_EPS {
            return Err(LayoutError::degenerate(
                "grid detection",
                "all points coincide",
            ));
        }
        let xs = self.bucket(points.iter().map(|p| p.x));
        let ys = self.bucket(points.iter().map(|p| p.y));
        Ok(GridPitch {
            x_pitch: self.axis_pitch(&xs),
            y_pitch: self.axis_pitch(&ys),
            x_origin: xs.first().copied().unwrap_or(0.0),
            y_origin: ys.first().copied().unwrap_or(0.0),
        })
    }

    /// Indices of points lying within tolerance of a pitch multiple on at
    /// least one axis that has a pitch.
    ///
    /// With no pitch on either axis there is no grid, so nothing matches.
    pub fn on_grid(&self, points: &[Point2D], pitch: &GridPitch) -> Vec<usize> {
        if pitch.is_empty() {
            return Vec::new();
        }
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                let on_x = pitch
                    .x_pitch
                    .is_some_and(|step| self.near_multiple(p.x - pitch.x_origin, step));
                let on_y = pitch
                    .y_pitch
                    .is_some_and(|step| self.near_multiple(p.y - pitch.y_origin, step));
                on_x || on_y
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Sorted distinct coordinates at tolerance resolution.
    fn bucket(&self, values: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut keys: Vec<i64> = values
            .map(|v| (v / self.tolerance).round() as i64)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter().map(|k| k as f64 * self.tolerance).collect()
    }

    fn axis_pitch(&self, distinct: &[f64]) -> Option<f64> {
        if distinct.len() < 2 {
            return None;
        }
        let gaps: Vec<f64> = distinct.windows(2).map(|w| w[1] - w[0]).collect();
        let avg = gaps.iter().sum::<f64>() / gaps.len() as f64;
        if avg <= self.tolerance {
            return None;
        }
        // Small epsilon absorbs the rounding introduced by bucketing.
        let limit = self.tolerance + 1e-9;
        gaps.iter()
            .all(|g| (g - avg).abs() <= limit)
            .then_some(avg)
    }

    fn near_multiple(&self, offset: f64, step: f64) -> bool {
        let rem = offset.rem_euclid(step);
        rem.min(step - rem) <= self.tolerance
    }
}

/// Region of a point set's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

impl Edge {
    pub const ALL: [Edge; 5] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right, Edge::Center];

    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Center => "center",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edge {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Edge::Top),
            "bottom" => Ok(Edge::Bottom),
            "left" => Ok(Edge::Left),
            "right" => Ok(Edge::Right),
            "center" | "centre" | "interior" => Ok(Edge::Center),
            _ => Err(LayoutError::invalid("edge region", s)),
        }
    }
}

/// Edge membership per region; corner points appear in two lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeMembership {
    pub top: Vec<usize>,
    pub bottom: Vec<usize>,
    pub left: Vec<usize>,
    pub right: Vec<usize>,
    pub center: Vec<usize>,
}

impl EdgeMembership {
    pub fn members(&self, edge: Edge) -> &[usize] {
        match edge {
            Edge::Top => &self.top,
            Edge::Bottom => &self.bottom,
            Edge::Left => &self.left,
            Edge::Right => &self.right,
            Edge::Center => &self.center,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundaryDetector {
    margin_pct: f64,
}

impl BoundaryDetector {
    /// `margin_pct` is a percentage (0–50) of each axis extent.
    pub fn new(margin_pct: f64) -> LayoutResult<Self> {
        if !(0.0..=50.0).contains(&margin_pct) {
            return Err(LayoutError::invalid("margin_pct", margin_pct));
        }
        Ok(Self { margin_pct })
    }

    /// Classify points against the margin bands of their bounding box.
    /// Y grows upward, so `top` is the high-Y band.
    pub fn find_edges(&self, points: &[Point2D]) -> LayoutResult<EdgeMembership> {
        let bounds = Bounds::from_points(points.iter().copied())
            .ok_or_else(|| LayoutError::insufficient("edge detection", 1, 0))?;
        let (w, h) = (bounds.width(), bounds.height());
        if w < COINCIDENT_EPS && h < COINCIDENT_EPS {
            return Err(LayoutError::degenerate(
                "edge detection",
                "bounding box has zero extent",
            ));
        }
        let mx = w * self.margin_pct / 100.0;
        let my = h * self.margin_pct / 100.0;

        let mut out = EdgeMembership::default();
        for (i, p) in points.iter().enumerate() {
            let mut any = false;
            if p.y >= bounds.max.y - my {
                out.top.push(i);
                any = true;
            }
            if p.y <= bounds.min.y + my {
                out.bottom.push(i);
                any = true;
            }
            if p.x <= bounds.min.x + mx {
                out.left.push(i);
                any = true;
            }
            if p.x >= bounds.max.x - mx {
                out.right.push(i);
                any = true;
            }
            if !any {
                out.center.push(i);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn six_grid() -> Vec<Point2D> {
        [(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (0.0, 2.0), (2.0, 2.0), (4.0, 2.0)]
            .into_iter()
            .map(Point2D::from)
            .collect()
    }

    #[test]
    fn detects_regular_pitch() {
        let pitch = GridDetector::new(0.1).unwrap().detect(&six_grid()).unwrap();
        assert_abs_diff_eq!(pitch.x_pitch.unwrap(), 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pitch.y_pitch.unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn irregular_axis_has_no_pitch() {
        let pts: Vec<Point2D> = [(0.0, 0.0), (1.0, 0.0), (5.0, 0.0), (0.0, 3.0), (1.0, 3.0)]
            .into_iter()
            .map(Point2D::from)
            .collect();
        let pitch = GridDetector::new(0.1).unwrap().detect(&pts).unwrap();
        assert!(pitch.x_pitch.is_none());
        assert_abs_diff_eq!(pitch.y_pitch.unwrap(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn on_grid_matches_pitch_multiples() {
        let detector = GridDetector::new(0.1).unwrap();
        let mut pts = six_grid();
        pts.push(Point2D::new(1.0, 1.0));
        pts.push(Point2D::new(6.05, 7.3));
        let pitch = detector.detect(&six_grid()).unwrap();
        assert_eq!(detector.on_grid(&pts, &pitch), vec![0, 1, 2, 3, 4, 5, 7]);
    }

    #[test]
    fn on_grid_without_any_pitch_matches_nothing() {
        let detector = GridDetector::new(0.1).unwrap();
        let pts = vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0), Point2D::new(3.5, 0.0)];
        let pitch = detector.detect(&pts).unwrap();
        assert!(pitch.is_empty());
        assert!(detector.on_grid(&pts, &pitch).is_empty());
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let pts = vec![Point2D::new(1.0, 1.0); 4];
        let err = GridDetector::new(0.1).unwrap().detect(&pts).unwrap_err();
        assert!(matches!(err, LayoutError::DegenerateGeometry { .. }));
        let err = BoundaryDetector::new(15.0).unwrap().find_edges(&pts).unwrap_err();
        assert!(matches!(err, LayoutError::DegenerateGeometry { .. }));
    }

    #[test]
    fn classifies_corners_edges_and_center() {
        let pts: Vec<Point2D> = [(0.0, 0.0), (10.0, 10.0), (5.0, 5.0), (5.0, 10.0), (0.0, 5.0)]
            .into_iter()
            .map(Point2D::from)
            .collect();
        let edges = BoundaryDetector::new(10.0).unwrap().find_edges(&pts).unwrap();
        assert_eq!(edges.bottom, vec![0]);
        assert_eq!(edges.left, vec![0, 4]);
        assert_eq!(edges.top, vec![1, 3]);
        assert_eq!(edges.right, vec![1]);
        assert_eq!(edges.center, vec![2]);
        assert_eq!(edges.members(Edge::Center), &[2]);
    }

    #[test]
    fn edge_names_parse() {
        assert_eq!("Top".parse::<Edge>().unwrap(), Edge::Top);
        assert_eq!(" centre ".parse::<Edge>().unwrap(), Edge::Center);
        assert!("diagonal".parse::<Edge>().is_err());
        assert!(BoundaryDetector::new(75.0).is_err());
    }
}
