use super::score::{layout_energy, pair_energy};
use super::types::Label;
use crate::config::AnnealingConfig;
use crate::error::{LayoutResult, require_points, require_positive};
use crate::geometry::Point2D;
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct AnnealStats {
    pub steps: usize,
    pub accepted: usize,
    pub improvements: usize,
    pub initial_energy: f64,
    pub final_energy: f64,
}

/// Single-label Metropolis search over label positions.
///
/// The best configuration seen is restored at the end, so the returned layout
/// never has higher energy than the input.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    spacing: f64,
    config: AnnealingConfig,
}

impl SimulatedAnnealing {
    pub fn new(spacing: f64, config: AnnealingConfig) -> LayoutResult<Self> {
        require_positive("spacing", spacing)?;
        Ok(Self { spacing, config })
    }

    pub fn energy(&self, labels: &[Label]) -> f64 {
        layout_energy(labels, self.spacing, self.config.leash_weight)
    }

    /// Geometric factor that takes the start temperature to
    /// `final_temperature_ratio` of itself after `iterations` steps.
    pub fn cooling_factor(&self, iterations: usize) -> f64 {
        if iterations == 0 {
            return 1.0;
        }
        (self.config.final_temperature_ratio.ln() / iterations as f64).exp()
    }

    pub fn run<R: Rng + ?Sized>(
        &self,
        labels: &mut [Label],
        iterations: usize,
        rng: &mut R,
    ) -> LayoutResult<AnnealStats> {
        require_points("simulated annealing", 2, labels.len())?;
        let initial: Vec<Point2D> = labels.iter().map(|l| l.position).collect();
        let initial_energy = self.energy(labels);
        let mut stats = AnnealStats {
            steps: iterations,
            initial_energy,
            final_energy: initial_energy,
            ..Default::default()
        };
        if iterations == 0 {
            return Ok(stats);
        }

        let cooling = self.cooling_factor(iterations);
        let mut temperature = self.config.initial_temperature * self.spacing;
        let mut current_energy = initial_energy;
        let mut best_energy = initial_energy;
        let mut best = initial.clone();

        for _ in 0..iterations {
            let idx = rng.random_range(0..labels.len());
            let old = labels[idx].position;
            let candidate = old
                + Point2D::new(
                    rng.random_range(-1.0..=1.0) * temperature,
                    rng.random_range(-1.0..=1.0) * temperature,
                );
            let before = self.local_energy(labels, idx, old);
            let after = self.local_energy(labels, idx, candidate);
            let delta = after - before;
            let accept = delta <= 0.0 || rng.random::<f64>() < (-delta / temperature).exp();
            if accept {
                labels[idx].position = candidate;
                current_energy += delta;
                stats.accepted += 1;
                if current_energy < best_energy {
                    best_energy = current_energy;
                    for (slot, label) in best.iter_mut().zip(labels.iter()) {
                        *slot = label.position;
                    }
                    stats.improvements += 1;
                }
            }
            temperature *= cooling;
        }

        restore(labels, &best);
        let mut final_energy = self.energy(labels);
        // Incremental bookkeeping can drift; never hand back something worse.
        if final_energy > initial_energy {
            restore(labels, &initial);
            final_energy = initial_energy;
        }
        stats.final_energy = final_energy;
        debug!(
            labels = labels.len(),
            steps = iterations,
            accepted = stats.accepted,
            initial_energy,
            final_energy,
            "annealing finished"
        );
        Ok(stats)
    }

    /// Energy terms that involve label `idx` when placed at `pos`.
    fn local_energy(&self, labels: &[Label], idx: usize, pos: Point2D) -> f64 {
        let mut energy = self.config.leash_weight * pos.distance(labels[idx].anchor);
        for (j, other) in labels.iter().enumerate() {
            if j != idx {
                energy += pair_energy(pos, other.position, self.spacing);
            }
        }
        energy
    }
}

fn restore(labels: &mut [Label], positions: &[Point2D]) {
    for (label, pos) in labels.iter_mut().zip(positions) {
        label.position = *pos;
    }
}
