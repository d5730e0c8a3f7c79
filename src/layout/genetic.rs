use super::types::Label;
use crate::config::GeneticConfig;
use crate::error::{LayoutError, LayoutResult, require_points, require_positive};
use crate::geometry::Point2D;
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct GeneticStats {
    pub generations: usize,
    pub initial_fitness: f64,
    pub best_fitness: f64,
    /// Best fitness seen so far, recorded after seeding and after each generation.
    pub history: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Chromosome {
    genes: Vec<Point2D>,
    fitness: f64,
}

/// Evolves whole-layout chromosomes (one gene per label position).
///
/// The fittest chromosome seen in any generation is written back, so the
/// result is never less fit than the input layout.
#[derive(Debug, Clone)]
pub struct GeneticSolver {
    spacing: f64,
    config: GeneticConfig,
}

impl GeneticSolver {
    pub fn new(spacing: f64, config: GeneticConfig) -> LayoutResult<Self> {
        require_positive("spacing", spacing)?;
        if !(0.0..=1.0).contains(&config.mutation_rate) {
            return Err(LayoutError::invalid("mutation_rate", config.mutation_rate));
        }
        Ok(Self { spacing, config })
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// Budget minus penalties for overlapping pairs and for leashes that are
    /// too long or too short. Higher is better.
    pub fn fitness(&self, genes: &[Point2D], anchors: &[Point2D]) -> f64 {
        let s = self.spacing;
        let cfg = &self.config;
        let mut fitness = cfg.fitness_budget;
        for (i, a) in genes.iter().enumerate() {
            for b in &genes[i + 1..] {
                let d = a.distance(*b);
                if d < s {
                    fitness -= cfg.overlap_penalty * (1.0 + (s - d) / s);
                }
            }
        }
        let (min_leash, max_leash) = (cfg.min_leash * s, cfg.max_leash * s);
        for (g, anchor) in genes.iter().zip(anchors) {
            let leash = g.distance(*anchor);
            if leash > max_leash {
                fitness -= cfg.leash_penalty * (leash - max_leash) / s;
            } else if leash < min_leash {
                fitness -= cfg.leash_penalty * (min_leash - leash) / s;
            }
        }
        fitness
    }

    /// Evolve with the configured population size and generation count.
    pub fn run<R: Rng + ?Sized>(
        &self,
        labels: &mut [Label],
        rng: &mut R,
    ) -> LayoutResult<GeneticStats> {
        self.run_with(labels, self.config.population_size, self.config.generations, rng)
    }

    pub fn run_with<R: Rng + ?Sized>(
        &self,
        labels: &mut [Label],
        population_size: usize,
        generations: usize,
        rng: &mut R,
    ) -> LayoutResult<GeneticStats> {
        require_points("genetic solver", 2, labels.len())?;
        let population_size = population_size.max(2);
        let anchors: Vec<Point2D> = labels.iter().map(|l| l.anchor).collect();
        let seed: Vec<Point2D> = labels.iter().map(|l| l.position).collect();
        let initial_fitness = self.fitness(&seed, &anchors);

        let mut population = Vec::with_capacity(population_size);
        population.push(Chromosome {
            genes: seed.clone(),
            fitness: initial_fitness,
        });
        while population.len() < population_size {
            let genes: Vec<Point2D> = seed
                .iter()
                .map(|&p| p + self.jitter(rng, self.spacing))
                .collect();
            let fitness = self.fitness(&genes, &anchors);
            population.push(Chromosome { genes, fitness });
        }
        sort_by_fitness(&mut population);

        let mut best = population[0].clone();
        let mut history = Vec::with_capacity(generations + 1);
        history.push(best.fitness);

        let elite = self.config.elite.min(population_size);
        let parent_pool = (population_size / 2).max(1);
        for _ in 0..generations {
            let mut next: Vec<Chromosome> = population[..elite].to_vec();
            while next.len() < population_size {
                let a = self.tournament(&population[..parent_pool], rng);
                let b = self.tournament(&population[..parent_pool], rng);
                let mut genes = crossover(&a.genes, &b.genes, rng);
                self.mutate(&mut genes, rng);
                let fitness = self.fitness(&genes, &anchors);
                next.push(Chromosome { genes, fitness });
            }
            sort_by_fitness(&mut next);
            population = next;
            if population[0].fitness > best.fitness {
                best = population[0].clone();
            }
            history.push(best.fitness);
        }

        if best.fitness > initial_fitness {
            for (label, pos) in labels.iter_mut().zip(&best.genes) {
                label.position = *pos;
            }
        }
        let best_fitness = best.fitness.max(initial_fitness);
        debug!(
            labels = labels.len(),
            population = population_size,
            generations,
            initial_fitness,
            best_fitness,
            "genetic solver finished"
        );
        Ok(GeneticStats {
            generations,
            initial_fitness,
            best_fitness,
            history,
        })
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R, scale: f64) -> Point2D {
        Point2D::new(
            rng.random_range(-1.0..=1.0) * scale,
            rng.random_range(-1.0..=1.0) * scale,
        )
    }

    fn tournament<'a, R: Rng + ?Sized>(
        &self,
        pool: &'a [Chromosome],
        rng: &mut R,
    ) -> &'a Chromosome {
        let rounds = self.config.tournament_size.max(1);
        let mut winner = &pool[rng.random_range(0..pool.len())];
        for _ in 1..rounds {
            let challenger = &pool[rng.random_range(0..pool.len())];
            if challenger.fitness > winner.fitness {
                winner = challenger;
            }
        }
        winner
    }

    fn mutate<R: Rng + ?Sized>(&self, genes: &mut [Point2D], rng: &mut R) {
        let scale = self.config.mutation_scale * self.spacing;
        for gene in genes.iter_mut() {
            if rng.random_bool(self.config.mutation_rate) {
                *gene += self.jitter(rng, scale);
            }
        }
    }
}

/// Single-point crossover: genes before the cut come from `a`, the rest from `b`.
fn crossover<R: Rng + ?Sized>(a: &[Point2D], b: &[Point2D], rng: &mut R) -> Vec<Point2D> {
    let cut = rng.random_range(1..a.len());
    a[..cut].iter().chain(&b[cut..]).copied().collect()
}

fn sort_by_fitness(population: &mut [Chromosome]) {
    population.sort_by(|x, y| y.fitness.total_cmp(&x.fitness));
}
