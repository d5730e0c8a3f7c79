use super::types::{Label, overlaps};
use crate::config::ScoreWeights;
use crate::error::{LayoutResult, require_points, require_positive};
use crate::geometry::{COINCIDENT_EPS, Point2D, centroid};
use serde::Serialize;
use std::collections::HashMap;

/// Leash weight used by the default energy function.
pub const DEFAULT_LEASH_WEIGHT: f64 = 0.1;
/// Mean leash up to this multiple of spacing keeps the full leash score.
const LEASH_TARGET_FACTOR: f64 = 2.0;
/// Coordinates are compared for alignment at this fraction of spacing.
const ALIGNMENT_RESOLUTION: f64 = 0.1;

/// Per-criterion points; each is bounded by its weight.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub overlap: f64,
    pub distribution: f64,
    pub leash: f64,
    pub alignment: f64,
    pub uniformity: f64,
}

impl ScoreBreakdown {
    pub fn sum(&self) -> f64 {
        self.overlap + self.distribution + self.leash + self.alignment + self.uniformity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutScore {
    /// Composite quality in `[0, 100]`.
    pub total: f64,
    pub breakdown: ScoreBreakdown,
    pub clashes: usize,
}

/// Annealing cost: squared overlap depth per clashing pair plus a linear
/// charge on every leash. Lower is better.
pub fn layout_energy(labels: &[Label], spacing: f64, leash_weight: f64) -> f64 {
    let mut energy = 0.0;
    for (i, a) in labels.iter().enumerate() {
        energy += leash_weight * a.leash();
        for b in &labels[i + 1..] {
            energy += pair_energy(a.position, b.position, spacing);
        }
    }
    energy
}

pub(crate) fn pair_energy(a: Point2D, b: Point2D, spacing: f64) -> f64 {
    let d = a.distance(b);
    if d < spacing {
        (spacing - d).powi(2)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutScorer {
    weights: ScoreWeights,
}

impl LayoutScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Energy with the default leash weight.
    pub fn energy(&self, labels: &[Label], spacing: f64) -> f64 {
        layout_energy(labels, spacing, DEFAULT_LEASH_WEIGHT)
    }

    pub fn score(&self, labels: &[Label], spacing: f64) -> LayoutResult<LayoutScore> {
        require_points("layout scoring", 1, labels.len())?;
        require_positive("spacing", spacing)?;
        let w = &self.weights;
        let points: Vec<Point2D> = labels.iter().map(|l| l.position).collect();
        let n = points.len();

        let pairs = n * (n - 1) / 2;
        let mut clashes = 0;
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                if overlaps(*a, *b, spacing) {
                    clashes += 1;
                }
            }
        }
        let overlap = if pairs == 0 {
            w.overlap
        } else {
            w.overlap * (1.0 - clashes as f64 / pairs as f64)
        };

        let distribution = match centroid(points.iter().copied()) {
            Some(c) if n > 1 => {
                let dists: Vec<f64> = points.iter().map(|p| p.distance(c)).collect();
                spread_score(&dists, w.distribution)
            }
            _ => w.distribution,
        };

        let mean_leash = labels.iter().map(Label::leash).sum::<f64>() / n as f64;
        let target = LEASH_TARGET_FACTOR * spacing;
        let leash = if mean_leash <= target {
            w.leash
        } else {
            w.leash * target / mean_leash
        };

        let alignment = if n < 2 {
            w.alignment
        } else {
            w.alignment * aligned_count(&points, spacing * ALIGNMENT_RESOLUTION) as f64 / n as f64
        };

        let uniformity = if n < 2 {
            w.uniformity
        } else {
            let nearest: Vec<f64> = (0..n)
                .map(|i| {
                    points
                        .iter()
                        .enumerate()
                        .filter(|&(j, _)| j != i)
                        .map(|(_, q)| points[i].distance(*q))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            spread_score(&nearest, w.uniformity)
        };

        let breakdown = ScoreBreakdown {
            overlap,
            distribution,
            leash,
            alignment,
            uniformity,
        };
        let max = w.total();
        let total = if max > 0.0 {
            (breakdown.sum() / max * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Ok(LayoutScore {
            total,
            breakdown,
            clashes,
        })
    }
}

/// `weight / (1 + cv)` where cv is the coefficient of variation; zero when the
/// values collapse to a point.
fn spread_score(values: &[f64], weight: f64) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean < COINCIDENT_EPS {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    weight / (1.0 + var.sqrt() / mean)
}

/// Labels sharing a rounded X or Y coordinate with at least one other label.
fn aligned_count(points: &[Point2D], resolution: f64) -> usize {
    let key = |v: f64| (v / resolution).round() as i64;
    let mut xs: HashMap<i64, usize> = HashMap::new();
    let mut ys: HashMap<i64, usize> = HashMap::new();
    for p in points {
        *xs.entry(key(p.x)).or_default() += 1;
        *ys.entry(key(p.y)).or_default() += 1;
    }
    points
        .iter()
        .filter(|p| xs[&key(p.x)] > 1 || ys[&key(p.y)] > 1)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn row(n: usize, step: f64) -> Vec<Label> {
        (0..n)
            .map(|i| {
                let p = Point2D::new(i as f64 * step, 0.0);
                Label::new(i, p, p + Point2D::new(0.0, 0.5))
            })
            .collect()
    }

    #[test]
    fn clean_evenly_spaced_row_scores_high() {
        let score = LayoutScorer::default().score(&row(4, 2.0), 1.0).unwrap();
        assert_eq!(score.clashes, 0);
        assert_abs_diff_eq!(score.breakdown.overlap, 30.0);
        assert_abs_diff_eq!(score.breakdown.leash, 20.0);
        assert_abs_diff_eq!(score.breakdown.alignment, 15.0);
        assert_abs_diff_eq!(score.breakdown.uniformity, 15.0);
        assert!(score.total > 80.0 && score.total <= 100.0);
    }

    #[test]
    fn stacked_labels_lose_overlap_points() {
        let labels: Vec<Label> = (0..3usize)
            .map(|i| Label::new(i, Point2D::ZERO, Point2D::ZERO))
            .collect();
        let score = LayoutScorer::default().score(&labels, 1.0).unwrap();
        assert_eq!(score.clashes, 3);
        assert_abs_diff_eq!(score.breakdown.overlap, 0.0);
        assert_abs_diff_eq!(score.breakdown.distribution, 0.0);
    }

    #[test]
    fn long_leashes_are_penalised() {
        let labels = vec![
            Label::new("a", Point2D::ZERO, Point2D::new(8.0, 0.0)),
            Label::new("b", Point2D::new(0.0, 5.0), Point2D::new(8.0, 5.0)),
        ];
        let score = LayoutScorer::default().score(&labels, 1.0).unwrap();
        assert_abs_diff_eq!(score.breakdown.leash, 5.0);
    }

    #[test]
    fn energy_counts_overlap_and_leash() {
        let labels = vec![
            Label::new("a", Point2D::ZERO, Point2D::new(0.0, 0.0)),
            Label::new("b", Point2D::ZERO, Point2D::new(0.5, 0.0)),
        ];
        let e = LayoutScorer::default().energy(&labels, 1.0);
        assert_abs_diff_eq!(e, 0.25 + 0.05, epsilon = 1e-12);
    }

    #[test]
    fn empty_layout_is_rejected() {
        assert!(LayoutScorer::default().score(&[], 1.0).is_err());
    }
}
