use super::types::Label;
use crate::config::OffsetConfig;
use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One observed placement: where a label of `category` sat relative to its anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub category: String,
    pub anchor: Point2D,
    pub position: Point2D,
}

impl Observation {
    pub fn new(category: impl Into<String>, anchor: Point2D, position: Point2D) -> Self {
        Self {
            category: category.into(),
            anchor,
            position,
        }
    }
}

/// Running offset totals for a category.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OffsetStats {
    pub count: u32,
    pub sum_dx: f64,
    pub sum_dy: f64,
}

impl OffsetStats {
    pub fn mean(&self) -> Option<Point2D> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(Point2D::new(self.sum_dx / n, self.sum_dy / n))
    }

    fn observe(&mut self, offset: Point2D, cap: u32) {
        self.count += 1;
        self.sum_dx += offset.x;
        self.sum_dy += offset.y;
        if self.count >= cap {
            // Halve the weight of history; the mean is unchanged.
            let halved = self.count / 2;
            let scale = halved as f64 / self.count as f64;
            self.count = halved;
            self.sum_dx *= scale;
            self.sum_dy *= scale;
        }
    }
}

/// Learns a mean anchor→label offset per category and re-applies it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffsetPatternLearner {
    #[serde(default)]
    config: OffsetConfig,
    model: BTreeMap<String, OffsetStats>,
}

impl OffsetPatternLearner {
    pub fn new(config: OffsetConfig) -> Self {
        Self {
            config,
            model: BTreeMap::new(),
        }
    }

    pub fn learn<'a, I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let cap = self.config.count_cap.max(2);
        let mut seen = 0usize;
        for obs in observations {
            self.model
                .entry(obs.category.clone())
                .or_default()
                .observe(obs.position - obs.anchor, cap);
            seen += 1;
        }
        debug!(observations = seen, categories = self.model.len(), "offsets learned");
    }

    /// Learn from labels that carry a category; uncategorised labels feed the fallback bucket.
    pub fn learn_from_labels(&mut self, labels: &[Label]) {
        let observations: Vec<Observation> = labels
            .iter()
            .map(|l| {
                let category = l
                    .category
                    .clone()
                    .unwrap_or_else(|| self.config.fallback_category.clone());
                Observation::new(category, l.anchor, l.position)
            })
            .collect();
        self.learn(&observations);
    }

    pub fn stats(&self, category: &str) -> Option<&OffsetStats> {
        self.model.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.model.keys().map(String::as_str)
    }

    /// Mean offset for `category`, falling back to the fallback bucket.
    pub fn mean_offset(&self, category: Option<&str>) -> Option<Point2D> {
        category
            .and_then(|c| self.model.get(c))
            .and_then(OffsetStats::mean)
            .or_else(|| {
                self.model
                    .get(&self.config.fallback_category)
                    .and_then(OffsetStats::mean)
            })
    }

    /// Place each label at `anchor + mean offset`. Labels with no usable
    /// statistics are left alone. Returns how many labels moved.
    pub fn apply(&self, labels: &mut [Label]) -> usize {
        let mut applied = 0;
        for label in labels.iter_mut() {
            if let Some(offset) = self.mean_offset(label.category.as_deref()) {
                label.position = label.anchor + offset;
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn door_offsets_are_reapplied() {
        let mut learner = OffsetPatternLearner::default();
        learner.learn(&[
            Observation::new("Door", Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)),
            Observation::new("Door", Point2D::new(10.0, 10.0), Point2D::new(11.0, 11.0)),
        ]);
        let mut labels =
            vec![Label::new("d1", Point2D::new(5.0, 5.0), Point2D::ZERO).with_category("Door")];
        assert_eq!(learner.apply(&mut labels), 1);
        assert_eq!(labels[0].position, Point2D::new(6.0, 6.0));
    }

    #[test]
    fn unknown_bucket_is_the_fallback() {
        let mut learner = OffsetPatternLearner::default();
        learner.learn(&[Observation::new(
            "Unknown",
            Point2D::ZERO,
            Point2D::new(0.0, -2.0),
        )]);
        let mut labels = vec![
            Label::new("w", Point2D::new(3.0, 3.0), Point2D::ZERO).with_category("Window"),
            Label::new("x", Point2D::new(1.0, 1.0), Point2D::ZERO),
        ];
        assert_eq!(learner.apply(&mut labels), 2);
        assert_eq!(labels[0].position, Point2D::new(3.0, 1.0));
        assert_eq!(labels[1].position, Point2D::new(1.0, -1.0));
    }

    #[test]
    fn no_statistics_leaves_labels_alone() {
        let learner = OffsetPatternLearner::default();
        let mut labels =
            vec![Label::new("w", Point2D::ZERO, Point2D::new(4.0, 4.0)).with_category("Window")];
        assert_eq!(learner.apply(&mut labels), 0);
        assert_eq!(labels[0].position, Point2D::new(4.0, 4.0));
    }

    #[test]
    fn count_is_capped_without_moving_the_mean() {
        let mut learner = OffsetPatternLearner::new(OffsetConfig {
            count_cap: 8,
            ..Default::default()
        });
        let obs: Vec<Observation> = (0..7)
            .map(|_| Observation::new("Tag", Point2D::ZERO, Point2D::new(2.0, -1.0)))
            .collect();
        learner.learn(&obs);
        assert_eq!(learner.stats("Tag").unwrap().count, 7);
        learner.learn(&obs[..1]);
        let stats = learner.stats("Tag").unwrap();
        assert_eq!(stats.count, 4);
        let mean = stats.mean().unwrap();
        assert_abs_diff_eq!(mean.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mean.y, -1.0, epsilon = 1e-12);

        for _ in 0..1000 {
            learner.learn(&obs);
        }
        assert!(learner.stats("Tag").unwrap().count < 8);
    }

    #[test]
    fn recent_observations_outweigh_old_after_rescale() {
        let mut learner = OffsetPatternLearner::new(OffsetConfig {
            count_cap: 4,
            ..Default::default()
        });
        let old = Observation::new("Tag", Point2D::ZERO, Point2D::new(0.0, 0.0));
        let new = Observation::new("Tag", Point2D::ZERO, Point2D::new(4.0, 0.0));
        learner.learn(&[old.clone(), old.clone(), old]);
        learner.learn(&[new.clone(), new.clone(), new]);
        // 3 old, then new #1 hits the cap (count 4 -> 2, sum 4 -> 2), then two more.
        let mean = learner.stats("Tag").unwrap().mean().unwrap();
        assert_abs_diff_eq!(mean.x, 10.0 / 4.0, epsilon = 1e-12);
    }
}
