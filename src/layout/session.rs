use super::annealing::SimulatedAnnealing;
use super::force::ForceEngine;
use super::score::{LayoutScore, LayoutScorer};
use super::types::{Label, LabelId, Placement, clash_count, positions};
use crate::config::OptimizerConfig;
use crate::error::{LayoutError, LayoutResult, require_points};
use crate::geometry::{COINCIDENT_EPS, Point2D, centroid};
use crate::spatial::{KMeans, KMeansResult};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::fmt;
use tracing::debug;

/// The eight stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    Analyze,
    ClusterSeparate,
    GlobalExpand,
    Physics,
    Anneal,
    Snap,
    Polish,
    Score,
}

impl Pass {
    pub const ALL: [Pass; 8] = [
        Pass::Analyze,
        Pass::ClusterSeparate,
        Pass::GlobalExpand,
        Pass::Physics,
        Pass::Anneal,
        Pass::Snap,
        Pass::Polish,
        Pass::Score,
    ];
    pub const COUNT: usize = Self::ALL.len();

    /// 1-based position in the sequence.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Pass::Analyze => "analyze",
            Pass::ClusterSeparate => "cluster-separate",
            Pass::GlobalExpand => "global-expand",
            Pass::Physics => "physics",
            Pass::Anneal => "anneal",
            Pass::Snap => "snap",
            Pass::Polish => "polish",
            Pass::Score => "score",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
    /// The given pass (1..=8) was the last one run.
    Pass(usize),
}

/// What one pass did. `Display` gives the one-line status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub pass: Pass,
    pub labels: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clusters: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clashes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_before: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_after: Option<f64>,
}

impl PassReport {
    fn new(pass: Pass, labels: usize) -> Self {
        Self {
            pass,
            labels,
            clusters: None,
            moved: None,
            clashes: None,
            score_before: None,
            score_after: None,
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pass {}/{} {}: {} labels",
            self.pass.number(),
            Pass::COUNT,
            self.pass,
            self.labels
        )?;
        if let Some(clusters) = self.clusters {
            write!(f, ", {clusters} clusters")?;
        }
        if let Some(moved) = self.moved {
            write!(f, ", {moved} moved")?;
        }
        if let Some(clashes) = self.clashes {
            write!(f, ", {clashes} clashes")?;
        }
        match (self.score_before, self.score_after) {
            (Some(before), Some(after)) => write!(f, ", score {before:.1} -> {after:.1}")?,
            (None, Some(after)) => write!(f, ", score {after:.1}")?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Ran(PassReport),
    /// All passes have already run; nothing changed.
    Complete,
}

/// Multi-pass placement over one batch of labels.
///
/// `load` snapshots the batch, each `run_pass` advances one stage, `apply`
/// reads the current placements and `reset` rewinds to the snapshot.
#[derive(Debug)]
pub struct LayoutSession {
    config: OptimizerConfig,
    labels: Vec<Label>,
    snapshot: HashMap<LabelId, Point2D>,
    pass_index: usize,
    loaded: bool,
    rng: StdRng,
    analysis: Option<KMeansResult>,
    baseline: Option<LayoutScore>,
    reports: Vec<PassReport>,
}

impl LayoutSession {
    pub fn new(config: OptimizerConfig) -> LayoutResult<Self> {
        config.validate()?;
        let rng = seeded_rng(config.seed);
        Ok(Self {
            config,
            labels: Vec::new(),
            snapshot: HashMap::new(),
            pass_index: 0,
            loaded: false,
            rng,
            analysis: None,
            baseline: None,
            reports: Vec::new(),
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn spacing(&self) -> f64 {
        self.config.spacing
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn pass_index(&self) -> usize {
        self.pass_index
    }

    pub fn reports(&self) -> &[PassReport] {
        &self.reports
    }

    /// Score of the batch as loaded, if it had any labels.
    pub fn baseline(&self) -> Option<&LayoutScore> {
        self.baseline.as_ref()
    }

    pub fn state(&self) -> SessionState {
        match (self.loaded, self.pass_index) {
            (false, _) => SessionState::Empty,
            (true, 0) => SessionState::Loaded,
            (true, n) => SessionState::Pass(n),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pass_index >= Pass::COUNT
    }

    /// Replace the batch and rewind to the first pass.
    pub fn load(&mut self, labels: Vec<Label>) -> LayoutResult<()> {
        check_unique(&labels)?;
        self.snapshot = labels
            .iter()
            .map(|l| (l.id.clone(), l.position))
            .collect();
        self.labels = labels;
        self.loaded = true;
        self.rewind();
        debug!(labels = self.labels.len(), "session loaded");
        Ok(())
    }

    /// Restore every position captured by `load` and rewind to the first pass.
    pub fn reset(&mut self) {
        for label in &mut self.labels {
            if let Some(&position) = self.snapshot.get(&label.id) {
                label.position = position;
            }
        }
        self.rewind();
        debug!(labels = self.labels.len(), "session reset");
    }

    fn rewind(&mut self) {
        self.pass_index = 0;
        self.rng = seeded_rng(self.config.seed);
        self.analysis = None;
        self.reports.clear();
        self.baseline = LayoutScorer::new(self.config.score.clone())
            .score(&self.labels, self.config.spacing)
            .ok();
    }

    /// Current placements, ready for the host to write back. Does not change state.
    pub fn apply(&self) -> Vec<Placement> {
        self.labels.iter().map(Placement::from).collect()
    }

    pub fn score(&self) -> LayoutResult<LayoutScore> {
        LayoutScorer::new(self.config.score.clone()).score(&self.labels, self.config.spacing)
    }

    /// Run the next pass. Once all passes have run this is a no-op that
    /// reports `Complete`.
    pub fn run_pass(&mut self) -> LayoutResult<PassOutcome> {
        let Some(&pass) = Pass::ALL.get(self.pass_index) else {
            return Ok(PassOutcome::Complete);
        };
        require_points("layout pass", 2, self.labels.len())?;
        let report = match pass {
            Pass::Analyze => self.analyze()?,
            Pass::ClusterSeparate => self.separate_clusters()?,
            Pass::GlobalExpand => self.expand(),
            Pass::Physics => self.physics()?,
            Pass::Anneal => self.anneal()?,
            Pass::Snap => self.snap(),
            Pass::Polish => self.polish()?,
            Pass::Score => self.final_score()?,
        };
        self.pass_index += 1;
        debug!(pass = pass.name(), status = %report, "pass finished");
        self.reports.push(report.clone());
        Ok(PassOutcome::Ran(report))
    }

    /// Run every remaining pass and return their reports.
    pub fn run_all(&mut self) -> LayoutResult<Vec<PassReport>> {
        let mut reports = Vec::new();
        while let PassOutcome::Ran(report) = self.run_pass()? {
            reports.push(report);
        }
        Ok(reports)
    }

    fn report(&self, pass: Pass) -> PassReport {
        PassReport::new(pass, self.labels.len())
    }

    fn clashes(&self) -> usize {
        clash_count(&self.labels, self.config.spacing)
    }

    fn analyze(&mut self) -> LayoutResult<PassReport> {
        let points = positions(&self.labels);
        let result = KMeans::new(self.config.kmeans.clone()).run(&points, None, &mut self.rng)?;
        let mut report = self.report(Pass::Analyze);
        report.clusters = Some(result.clusters.iter().filter(|c| !c.is_empty()).count());
        report.clashes = Some(self.clashes());
        self.analysis = Some(result);
        Ok(report)
    }

    fn separate_clusters(&mut self) -> LayoutResult<PassReport> {
        let analysis = match self.analysis.take() {
            Some(analysis) => analysis,
            None => KMeans::new(self.config.kmeans.clone()).run(
                &positions(&self.labels),
                None,
                &mut self.rng,
            )?,
        };
        let push = self.config.cluster_push * self.config.spacing;
        let mut moved = 0;
        for cluster in analysis.clusters.iter().filter(|c| c.len() > 1) {
            let members: Vec<Point2D> = cluster
                .members
                .iter()
                .map(|&i| self.labels[i].position)
                .collect();
            let Some(center) = centroid(members.iter().copied()) else {
                continue;
            };
            moved += push_away(&mut self.labels, &cluster.members, center, push);
        }
        let mut report = self.report(Pass::ClusterSeparate);
        report.clusters = Some(analysis.clusters.iter().filter(|c| c.len() > 1).count());
        report.moved = Some(moved);
        report.clashes = Some(self.clashes());
        Ok(report)
    }

    fn expand(&mut self) -> PassReport {
        let push = self.config.expand_push * self.config.spacing;
        let all: Vec<usize> = (0..self.labels.len()).collect();
        let moved = match centroid(self.labels.iter().map(|l| l.position)) {
            Some(center) => push_away(&mut self.labels, &all, center, push),
            None => 0,
        };
        let mut report = self.report(Pass::GlobalExpand);
        report.moved = Some(moved);
        report.clashes = Some(self.clashes());
        report
    }

    fn physics(&mut self) -> LayoutResult<PassReport> {
        let engine = ForceEngine::new(self.config.spacing, self.config.force.clone())?;
        let stats = engine.run(&mut self.labels, self.config.iterations)?;
        let mut report = self.report(Pass::Physics);
        report.clashes = Some(stats.clashes_after);
        Ok(report)
    }

    fn anneal(&mut self) -> LayoutResult<PassReport> {
        let steps = self.config.iterations * self.config.annealing.iteration_multiplier;
        let annealer = SimulatedAnnealing::new(self.config.spacing, self.config.annealing.clone())?;
        annealer.run(&mut self.labels, steps, &mut self.rng)?;
        let mut report = self.report(Pass::Anneal);
        report.clashes = Some(self.clashes());
        Ok(report)
    }

    fn snap(&mut self) -> PassReport {
        let moved = self.snap_leader_angles();
        let mut report = self.report(Pass::Snap);
        report.moved = Some(moved);
        report.clashes = Some(self.clashes());
        report
    }

    /// Rotate each label about its anchor to the nearest multiple of the snap
    /// angle, keeping the leash length. A label is left alone when the snapped
    /// spot would come closer than the snap clearance to another label.
    fn snap_leader_angles(&mut self) -> usize {
        let step = self.config.snap_angle_deg.to_radians();
        let clearance = self.config.snap_clearance * self.config.spacing;
        let mut snapped = 0;
        for i in 0..self.labels.len() {
            let (anchor, position) = (self.labels[i].anchor, self.labels[i].position);
            let leader = position - anchor;
            let length = leader.norm();
            if length < COINCIDENT_EPS {
                continue;
            }
            let angle = (leader.angle() / step).round() * step;
            let candidate = anchor + Point2D::from_angle(angle) * length;
            if candidate.distance(position) < COINCIDENT_EPS {
                continue;
            }
            let blocked = self
                .labels
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && candidate.distance(other.position) < clearance);
            if !blocked {
                self.labels[i].position = candidate;
                snapped += 1;
            }
        }
        snapped
    }

    fn polish(&mut self) -> LayoutResult<PassReport> {
        let engine = ForceEngine::new(self.config.spacing, self.config.force.clone())?;
        let stats = engine.run(&mut self.labels, self.config.polish_rounds)?;
        let mut report = self.report(Pass::Polish);
        report.clashes = Some(stats.clashes_after);
        Ok(report)
    }

    fn final_score(&mut self) -> LayoutResult<PassReport> {
        let score = self.score()?;
        let mut report = self.report(Pass::Score);
        report.clashes = Some(score.clashes);
        report.score_before = self.baseline.as_ref().map(|s| s.total);
        report.score_after = Some(score.total);
        Ok(report)
    }
}

fn check_unique(labels: &[Label]) -> LayoutResult<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(&label.id) {
            return Err(LayoutError::DuplicateLabel {
                id: label.id.to_string(),
            });
        }
    }
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Move each listed label `distance` further from `center`. Labels sitting on
/// the center are fanned out evenly around it. Returns how many moved.
fn push_away(labels: &mut [Label], members: &[usize], center: Point2D, distance: f64) -> usize {
    if distance <= 0.0 {
        return 0;
    }
    let count = members.len().max(1) as f64;
    for (rank, &i) in members.iter().enumerate() {
        let direction = (labels[i].position - center)
            .normalized()
            .unwrap_or_else(|| Point2D::from_angle(TAU * rank as f64 / count));
        labels[i].position += direction * distance;
    }
    members.len()
}
