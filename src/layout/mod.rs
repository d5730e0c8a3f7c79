//! Label placement: solvers that move labels apart while keeping them near
//! their anchors, the quality scorer, the learned-offset predictor, and the
//! multi-pass session that sequences them.

mod annealing;
mod force;
mod genetic;
mod offset;
mod score;
mod session;
pub(crate) mod types;

pub use annealing::{AnnealStats, SimulatedAnnealing};
pub use force::{ForceEngine, ForceStats};
pub use genetic::{GeneticSolver, GeneticStats};
pub use offset::{Observation, OffsetPatternLearner, OffsetStats};
pub use score::{DEFAULT_LEASH_WEIGHT, LayoutScore, LayoutScorer, ScoreBreakdown, layout_energy};
pub use session::{LayoutSession, Pass, PassOutcome, PassReport, SessionState};
pub use types::*;
