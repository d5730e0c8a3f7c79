use super::types::{Label, clash_count};
use crate::config::ForceConfig;
use crate::error::{LayoutResult, require_points, require_positive};
use crate::geometry::{COINCIDENT_EPS, Point2D};
use tracing::debug;

/// Golden angle; spreads kicks for coincident labels over distinct directions.
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

#[derive(Debug, Clone, Default)]
pub struct ForceStats {
    pub iterations: usize,
    pub clashes_before: usize,
    pub clashes_after: usize,
    /// Largest single-label move during the last iteration.
    pub last_displacement: f64,
}

/// Pairwise spring relaxation with a weak pull back to each anchor.
///
/// Labels within `neighbor_range × spacing` of one another are pushed toward a
/// separation of `spacing`; a label whose leash exceeds `leash_limit × spacing`
/// is drawn back toward its anchor. All forces of an iteration are computed
/// from the same snapshot and applied together.
#[derive(Debug, Clone)]
pub struct ForceEngine {
    spacing: f64,
    config: ForceConfig,
}

impl ForceEngine {
    pub fn new(spacing: f64, config: ForceConfig) -> LayoutResult<Self> {
        require_positive("spacing", spacing)?;
        Ok(Self { spacing, config })
    }

    pub fn run(&self, labels: &mut [Label], iterations: usize) -> LayoutResult<ForceStats> {
        require_points("force relaxation", 2, labels.len())?;
        let clashes_before = clash_count(labels, self.spacing);
        let mut last_displacement = 0.0;
        for _ in 0..iterations {
            last_displacement = self.step(labels);
        }
        let stats = ForceStats {
            iterations,
            clashes_before,
            clashes_after: clash_count(labels, self.spacing),
            last_displacement,
        };
        debug!(
            labels = labels.len(),
            iterations,
            clashes_before = stats.clashes_before,
            clashes_after = stats.clashes_after,
            "force relaxation finished"
        );
        Ok(stats)
    }

    /// One simultaneous update; returns the largest displacement applied.
    pub fn step(&self, labels: &mut [Label]) -> f64 {
        let s = self.spacing;
        let range = self.config.neighbor_range * s;
        let leash_limit = self.config.leash_limit * s;
        let forces: Vec<Point2D> = (0..labels.len())
            .map(|i| {
                let me = labels[i].position;
                let mut force = Point2D::ZERO;
                for (j, other) in labels.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let delta = me - other.position;
                    let d = delta.norm();
                    if d < COINCIDENT_EPS {
                        force += Point2D::from_angle(GOLDEN_ANGLE * i as f64)
                            * (self.config.repulsion * s);
                    } else if d < range {
                        force += delta * ((s - d) / d * self.config.repulsion);
                    }
                }
                let to_anchor = labels[i].anchor - me;
                let leash = to_anchor.norm();
                if leash > leash_limit {
                    force += to_anchor * ((leash - leash_limit) / leash * self.config.attraction);
                }
                force
            })
            .collect();

        let mut max_move: f64 = 0.0;
        for (label, force) in labels.iter_mut().zip(forces) {
            label.position += force;
            max_move = max_move.max(force.norm());
        }
        max_move
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ForceEngine {
        ForceEngine::new(1.0, ForceConfig::default()).unwrap()
    }

    #[test]
    fn one_step_separates_close_pair() {
        let mut labels = vec![
            Label::new("a", Point2D::ZERO, Point2D::new(0.0, 0.0)),
            Label::new("b", Point2D::ZERO, Point2D::new(0.5, 0.0)),
        ];
        engine().step(&mut labels);
        let d = labels[0].position.distance(labels[1].position);
        assert!(d > 0.5);
        approx::assert_abs_diff_eq!(d, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn coincident_labels_fan_out() {
        let mut labels: Vec<Label> = (0..5usize)
            .map(|i| Label::new(i, Point2D::ZERO, Point2D::ZERO))
            .collect();
        let stats = engine().run(&mut labels, 40).unwrap();
        assert_eq!(stats.clashes_before, 10);
        assert_eq!(stats.clashes_after, 0);
    }

    #[test]
    fn long_leash_is_pulled_back() {
        let mut labels = vec![
            Label::new("a", Point2D::ZERO, Point2D::new(10.0, 0.0)),
            Label::new("b", Point2D::new(50.0, 50.0), Point2D::new(50.0, 50.0)),
        ];
        engine().step(&mut labels);
        // (10 - 3) / 10 * 0.15 * 10 = 1.05 toward the anchor.
        approx::assert_abs_diff_eq!(labels[0].position.x, 8.95, epsilon = 1e-12);
        assert_eq!(labels[1].position, Point2D::new(50.0, 50.0));
    }

    #[test]
    fn needs_two_labels() {
        let mut labels = vec![Label::new("solo", Point2D::ZERO, Point2D::ZERO)];
        assert!(engine().run(&mut labels, 3).is_err());
    }
}
