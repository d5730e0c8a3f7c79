//! Annotation placement and spatial selection for drawing-scale label sets.
//!
//! Labels are moved apart by interchangeable solvers (force relaxation,
//! simulated annealing, a genetic search) sequenced by [`LayoutSession`],
//! judged by [`LayoutScorer`], and seeded from learned per-category offsets.
//! [`SpatialSelector`] answers selection queries over the same spatial
//! primitives. Hosts plug in through [`adapter::HostDocumentAdapter`].

pub mod adapter;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod layout_dump;
pub mod select;
pub mod spatial;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{OptimizerConfig, load_config};
pub use error::{LayoutError, LayoutResult};
pub use geometry::{Bounds, Point2D};
pub use layout::{Label, LabelId, LayoutScorer, LayoutSession, OffsetPatternLearner, Placement};
pub use select::{Element, Locatable, SpatialSelector};
