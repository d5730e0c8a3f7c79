use crate::error::{LayoutError, LayoutResult, require_positive};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceConfig {
    /// Scale of the pairwise push between labels closer than `neighbor_range × spacing`.
    pub repulsion: f64,
    /// Scale of the pull back toward the anchor once the leash exceeds `leash_limit × spacing`.
    pub attraction: f64,
    pub neighbor_range: f64,
    pub leash_limit: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            repulsion: 0.3,
            attraction: 0.15,
            neighbor_range: 1.5,
            leash_limit: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealingConfig {
    /// Starting temperature as a multiple of spacing.
    pub initial_temperature: f64,
    /// Temperature after the last step relative to the starting one.
    pub final_temperature_ratio: f64,
    /// Energy charged per unit of leash length.
    pub leash_weight: f64,
    /// Annealing steps per configured session iteration.
    pub iteration_multiplier: usize,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 2.0,
            final_temperature_ratio: 0.01,
            leash_weight: 0.1,
            iteration_multiplier: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    pub elite: usize,
    pub mutation_rate: f64,
    /// Maximum jitter per mutated gene as a multiple of spacing.
    pub mutation_scale: f64,
    pub tournament_size: usize,
    pub fitness_budget: f64,
    pub overlap_penalty: f64,
    pub leash_penalty: f64,
    /// Leashes shorter than this multiple of spacing sit on top of their anchor.
    pub min_leash: f64,
    pub max_leash: f64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 24,
            generations: 40,
            elite: 5,
            mutation_rate: 0.18,
            mutation_scale: 0.5,
            tournament_size: 3,
            fitness_budget: 1000.0,
            overlap_penalty: 10.0,
            leash_penalty: 5.0,
            min_leash: 0.5,
            max_leash: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Fixed cluster count; `None` derives it from the point count.
    pub k: Option<usize>,
    pub max_iterations: usize,
    /// Iteration stops once no centroid moves farther than this.
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: None,
            max_iterations: 50,
            tolerance: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub dbscan_eps: f64,
    pub dbscan_min_points: usize,
    pub chain_radius: f64,
    pub grid_tolerance: f64,
    pub edge_margin_pct: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            dbscan_eps: 5.0,
            dbscan_min_points: 3,
            chain_radius: 5.0,
            grid_tolerance: 0.1,
            edge_margin_pct: 15.0,
        }
    }
}

/// Maximum points of each sub-score; the total is their sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub overlap: f64,
    pub distribution: f64,
    pub leash: f64,
    pub alignment: f64,
    pub uniformity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            overlap: 30.0,
            distribution: 20.0,
            leash: 20.0,
            alignment: 15.0,
            uniformity: 15.0,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.overlap + self.distribution + self.leash + self.alignment + self.uniformity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetConfig {
    /// Observation count at which a category's running sums are halved.
    pub count_cap: u32,
    pub fallback_category: String,
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            count_cap: 10_000,
            fallback_category: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Minimum desired separation between labels, in drawing units.
    pub spacing: f64,
    /// Force iterations for the physics pass; annealing runs a multiple of it.
    pub iterations: usize,
    pub seed: Option<u64>,
    pub cluster_push: f64,
    pub expand_push: f64,
    pub snap_angle_deg: f64,
    pub snap_clearance: f64,
    pub polish_rounds: usize,
    pub force: ForceConfig,
    pub annealing: AnnealingConfig,
    pub genetic: GeneticConfig,
    pub kmeans: KMeansConfig,
    pub selector: SelectorConfig,
    pub score: ScoreWeights,
    pub offsets: OffsetConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            spacing: 1.0,
            iterations: 30,
            seed: None,
            cluster_push: 0.3,
            expand_push: 0.4,
            snap_angle_deg: 45.0,
            snap_clearance: 0.7,
            polish_rounds: 5,
            force: ForceConfig::default(),
            annealing: AnnealingConfig::default(),
            genetic: GeneticConfig::default(),
            kmeans: KMeansConfig::default(),
            selector: SelectorConfig::default(),
            score: ScoreWeights::default(),
            offsets: OffsetConfig::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn with_spacing(spacing: f64) -> Self {
        Self {
            spacing,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> LayoutResult<()> {
        require_positive("spacing", self.spacing)?;
        require_positive("snapAngleDeg", self.snap_angle_deg)?;
        require_positive("force.neighborRange", self.force.neighbor_range)?;
        require_positive("annealing.initialTemperature", self.annealing.initial_temperature)?;
        let ratio = self.annealing.final_temperature_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(LayoutError::invalid("annealing.finalTemperatureRatio", ratio));
        }
        if self.genetic.population_size < 2 {
            return Err(LayoutError::invalid(
                "genetic.populationSize",
                self.genetic.population_size,
            ));
        }
        let rate = self.genetic.mutation_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(LayoutError::invalid("genetic.mutationRate", rate));
        }
        require_positive("selector.dbscanEps", self.selector.dbscan_eps)?;
        require_positive("selector.gridTolerance", self.selector.grid_tolerance)?;
        let margin = self.selector.edge_margin_pct;
        if !(0.0..=50.0).contains(&margin) {
            return Err(LayoutError::invalid("selector.edgeMarginPct", margin));
        }
        if self.offsets.count_cap < 2 {
            return Err(LayoutError::invalid("offsets.countCap", self.offsets.count_cap));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForceConfigFile {
    repulsion: Option<f64>,
    attraction: Option<f64>,
    neighbor_range: Option<f64>,
    leash_limit: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnealingConfigFile {
    initial_temperature: Option<f64>,
    final_temperature_ratio: Option<f64>,
    leash_weight: Option<f64>,
    iteration_multiplier: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneticConfigFile {
    population_size: Option<usize>,
    generations: Option<usize>,
    elite: Option<usize>,
    mutation_rate: Option<f64>,
    mutation_scale: Option<f64>,
    tournament_size: Option<usize>,
    fitness_budget: Option<f64>,
    overlap_penalty: Option<f64>,
    leash_penalty: Option<f64>,
    min_leash: Option<f64>,
    max_leash: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KMeansConfigFile {
    k: Option<usize>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectorConfigFile {
    dbscan_eps: Option<f64>,
    dbscan_min_points: Option<usize>,
    chain_radius: Option<f64>,
    grid_tolerance: Option<f64>,
    edge_margin_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreWeightsFile {
    overlap: Option<f64>,
    distribution: Option<f64>,
    leash: Option<f64>,
    alignment: Option<f64>,
    uniformity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OffsetConfigFile {
    count_cap: Option<u32>,
    fallback_category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    spacing: Option<f64>,
    iterations: Option<usize>,
    seed: Option<u64>,
    cluster_push: Option<f64>,
    expand_push: Option<f64>,
    snap_angle_deg: Option<f64>,
    snap_clearance: Option<f64>,
    polish_rounds: Option<usize>,
    force: Option<ForceConfigFile>,
    annealing: Option<AnnealingConfigFile>,
    genetic: Option<GeneticConfigFile>,
    kmeans: Option<KMeansConfigFile>,
    selector: Option<SelectorConfigFile>,
    score: Option<ScoreWeightsFile>,
    offsets: Option<OffsetConfigFile>,
}

/// Load optimizer settings, falling back to defaults for anything the file omits.
///
/// Strict JSON is tried first; files with comments or trailing commas are
/// accepted through the JSON5 parser.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<OptimizerConfig> {
    let Some(path) = path else {
        return Ok(OptimizerConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("loading config {}", path.display()))
}

pub fn parse_config(contents: &str) -> anyhow::Result<OptimizerConfig> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(strict_err) => json5::from_str(contents).map_err(|lenient_err| {
            anyhow::anyhow!("invalid config: {strict_err} (json5: {lenient_err})")
        })?,
    };
    let mut config = OptimizerConfig::default();
    merge_config(&mut config, parsed);
    config.validate()?;
    Ok(config)
}

fn merge_config(config: &mut OptimizerConfig, file: ConfigFile) {
    if let Some(v) = file.spacing {
        config.spacing = v;
    }
    if let Some(v) = file.iterations {
        config.iterations = v;
    }
    if file.seed.is_some() {
        config.seed = file.seed;
    }
    if let Some(v) = file.cluster_push {
        config.cluster_push = v;
    }
    if let Some(v) = file.expand_push {
        config.expand_push = v;
    }
    if let Some(v) = file.snap_angle_deg {
        config.snap_angle_deg = v;
    }
    if let Some(v) = file.snap_clearance {
        config.snap_clearance = v;
    }
    if let Some(v) = file.polish_rounds {
        config.polish_rounds = v;
    }
    if let Some(force) = file.force {
        let target = &mut config.force;
        if let Some(v) = force.repulsion {
            target.repulsion = v;
        }
        if let Some(v) = force.attraction {
            target.attraction = v;
        }
        if let Some(v) = force.neighbor_range {
            target.neighbor_range = v;
        }
        if let Some(v) = force.leash_limit {
            target.leash_limit = v;
        }
    }
    if let Some(annealing) = file.annealing {
        let target = &mut config.annealing;
        if let Some(v) = annealing.initial_temperature {
            target.initial_temperature = v;
        }
        if let Some(v) = annealing.final_temperature_ratio {
            target.final_temperature_ratio = v;
        }
        if let Some(v) = annealing.leash_weight {
            target.leash_weight = v;
        }
        if let Some(v) = annealing.iteration_multiplier {
            target.iteration_multiplier = v;
        }
    }
    if let Some(genetic) = file.genetic {
        let target = &mut config.genetic;
        if let Some(v) = genetic.population_size {
            target.population_size = v;
        }
        if let Some(v) = genetic.generations {
            target.generations = v;
        }
        if let Some(v) = genetic.elite {
            target.elite = v;
        }
        if let Some(v) = genetic.mutation_rate {
            target.mutation_rate = v;
        }
        if let Some(v) = genetic.mutation_scale {
            target.mutation_scale = v;
        }
        if let Some(v) = genetic.tournament_size {
            target.tournament_size = v;
        }
        if let Some(v) = genetic.fitness_budget {
            target.fitness_budget = v;
        }
        if let Some(v) = genetic.overlap_penalty {
            target.overlap_penalty = v;
        }
        if let Some(v) = genetic.leash_penalty {
            target.leash_penalty = v;
        }
        if let Some(v) = genetic.min_leash {
            target.min_leash = v;
        }
        if let Some(v) = genetic.max_leash {
            target.max_leash = v;
        }
    }
    if let Some(kmeans) = file.kmeans {
        if kmeans.k.is_some() {
            config.kmeans.k = kmeans.k;
        }
        if let Some(v) = kmeans.max_iterations {
            config.kmeans.max_iterations = v;
        }
        if let Some(v) = kmeans.tolerance {
            config.kmeans.tolerance = v;
        }
    }
    if let Some(selector) = file.selector {
        let target = &mut config.selector;
        if let Some(v) = selector.dbscan_eps {
            target.dbscan_eps = v;
        }
        if let Some(v) = selector.dbscan_min_points {
            target.dbscan_min_points = v;
        }
        if let Some(v) = selector.chain_radius {
            target.chain_radius = v;
        }
        if let Some(v) = selector.grid_tolerance {
            target.grid_tolerance = v;
        }
        if let Some(v) = selector.edge_margin_pct {
            target.edge_margin_pct = v;
        }
    }
    if let Some(score) = file.score {
        let target = &mut config.score;
        if let Some(v) = score.overlap {
            target.overlap = v;
        }
        if let Some(v) = score.distribution {
            target.distribution = v;
        }
        if let Some(v) = score.leash {
            target.leash = v;
        }
        if let Some(v) = score.alignment {
            target.alignment = v;
        }
        if let Some(v) = score.uniformity {
            target.uniformity = v;
        }
    }
    if let Some(offsets) = file.offsets {
        if let Some(v) = offsets.count_cap {
            config.offsets.count_cap = v;
        }
        if let Some(v) = offsets.fallback_category {
            config.offsets.fallback_category = v;
        }
    }
}
