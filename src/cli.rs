use crate::adapter::{HostDocumentAdapter, JsonDocument, Scope, collect_elements, collect_labels, push_positions};
use crate::config::{OptimizerConfig, load_config};
use crate::layout::{
    ForceEngine, GeneticSolver, Label, LayoutScorer, LayoutSession, OffsetPatternLearner, Pass,
    PassOutcome, Placement, SimulatedAnnealing,
};
use crate::layout_dump::write_session_dump;
use crate::select::SpatialSelector;
use anyhow::{Result, anyhow};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "annolay", version, about = "Annotation placement optimizer and spatial selection")]
pub struct Cli {
    /// Config JSON/JSON5 file with optimizer overrides
    #[arg(short = 'c', long = "configFile", global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the multi-pass layout session and write positions back
    Layout(LayoutArgs),
    /// Run a single solver over the labels
    Solve(SolveArgs),
    /// Print the layout quality score
    Score(DocArgs),
    /// Run a selection query and store the result as the document selection
    Select(SelectArgs),
    /// Learn per-category offsets from a reference document and apply them
    Learn(LearnArgs),
}

#[derive(clap::Args, Debug)]
pub struct DocArgs {
    /// Input document (.json)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output document. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Scope passed to the document: all, selection, or a category name
    #[arg(short = 's', long = "scope", default_value = Scope::ALL)]
    pub scope: String,
}

#[derive(clap::Args, Debug)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub doc: DocArgs,

    /// Number of passes to run (all eight by default)
    #[arg(short = 'p', long = "passes")]
    pub passes: Option<usize>,

    /// Write a JSON report of the finished session
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,

    #[arg(long = "spacing")]
    pub spacing: Option<f64>,

    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct SolveArgs {
    #[command(flatten)]
    pub doc: DocArgs,

    #[arg(long = "solver", value_enum, default_value = "force")]
    pub solver: Solver,

    /// Force iterations; annealing runs the configured multiple of it
    #[arg(long = "iterations")]
    pub iterations: Option<usize>,

    #[arg(long = "spacing")]
    pub spacing: Option<f64>,

    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    Force,
    Anneal,
    Genetic,
}

#[derive(clap::Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub doc: DocArgs,

    #[arg(short = 'q', long = "query", value_enum)]
    pub query: Query,

    /// Boundary band for edge queries: top, bottom, left, right or center
    #[arg(long = "region")]
    pub region: Option<String>,

    /// Hop radius for chain queries
    #[arg(long = "radius")]
    pub radius: Option<f64>,

    /// Group count for partition queries
    #[arg(short = 'k', long = "groups")]
    pub groups: Option<usize>,

    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Similar,
    Chain,
    Cluster,
    Partition,
    Grid,
    Edge,
}

#[derive(clap::Args, Debug)]
pub struct LearnArgs {
    #[command(flatten)]
    pub doc: DocArgs,

    /// Reference document whose placements are learned
    #[arg(long = "from")]
    pub from: PathBuf,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Layout(args) => run_layout(args, config),
        Command::Solve(args) => run_solve(args, config),
        Command::Score(args) => run_score(args, config),
        Command::Select(args) => run_select(args, config),
        Command::Learn(args) => run_learn(args, config),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn override_config(
    mut config: OptimizerConfig,
    spacing: Option<f64>,
    seed: Option<u64>,
) -> Result<OptimizerConfig> {
    if let Some(spacing) = spacing {
        config.spacing = spacing;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

fn run_layout(args: LayoutArgs, config: OptimizerConfig) -> Result<()> {
    let config = override_config(config, args.spacing, args.seed)?;
    let mut doc = JsonDocument::open(&args.doc.input)?;
    let labels = collect_labels(&doc, &Scope::new(args.doc.scope.as_str()))?;
    let mut session = LayoutSession::new(config)?;
    session.load(labels)?;

    let limit = args.passes.unwrap_or(Pass::COUNT);
    for _ in 0..limit {
        match session.run_pass()? {
            PassOutcome::Ran(report) => eprintln!("{report}"),
            PassOutcome::Complete => break,
        }
    }
    let written = push_positions(&session, &mut doc)?;
    info!(written, "positions written");
    if let Some(path) = args.dump.as_deref() {
        write_session_dump(path, &session)?;
    }
    write_document(&doc, args.doc.output.as_deref())
}

fn run_solve(args: SolveArgs, config: OptimizerConfig) -> Result<()> {
    let config = override_config(config, args.spacing, args.seed)?;
    let mut doc = JsonDocument::open(&args.doc.input)?;
    let mut labels = collect_labels(&doc, &Scope::new(args.doc.scope.as_str()))?;
    let iterations = args.iterations.unwrap_or(config.iterations);
    let spacing = config.spacing;
    let mut rng = make_rng(config.seed);

    match args.solver {
        Solver::Force => {
            let stats = ForceEngine::new(spacing, config.force.clone())?.run(&mut labels, iterations)?;
            eprintln!(
                "force: {} iterations, clashes {} -> {}",
                stats.iterations, stats.clashes_before, stats.clashes_after
            );
        }
        Solver::Anneal => {
            let steps = iterations * config.annealing.iteration_multiplier;
            let stats = SimulatedAnnealing::new(spacing, config.annealing.clone())?
                .run(&mut labels, steps, &mut rng)?;
            eprintln!(
                "anneal: {} steps, {} accepted, energy {:.3} -> {:.3}",
                stats.steps, stats.accepted, stats.initial_energy, stats.final_energy
            );
        }
        Solver::Genetic => {
            let stats = GeneticSolver::new(spacing, config.genetic.clone())?.run(&mut labels, &mut rng)?;
            eprintln!(
                "genetic: {} generations, fitness {:.2} -> {:.2}",
                stats.generations, stats.initial_fitness, stats.best_fitness
            );
        }
    }
    write_labels(&mut doc, &labels)?;
    write_document(&doc, args.doc.output.as_deref())
}

fn run_score(args: DocArgs, config: OptimizerConfig) -> Result<()> {
    let doc = JsonDocument::open(&args.input)?;
    let labels = collect_labels(&doc, &Scope::new(args.scope.as_str()))?;
    let score = LayoutScorer::new(config.score.clone()).score(&labels, config.spacing)?;
    let b = &score.breakdown;
    println!("score {:.1} ({} clashes)", score.total, score.clashes);
    println!("  overlap       {:6.2}", b.overlap);
    println!("  distribution  {:6.2}", b.distribution);
    println!("  leash         {:6.2}", b.leash);
    println!("  alignment     {:6.2}", b.alignment);
    println!("  uniformity    {:6.2}", b.uniformity);
    Ok(())
}

fn run_select(args: SelectArgs, config: OptimizerConfig) -> Result<()> {
    let mut doc = JsonDocument::open(&args.doc.input)?;
    let elements = collect_elements(&doc, &Scope::new(args.doc.scope.as_str()))?;
    let seeds: Vec<usize> = elements
        .iter()
        .enumerate()
        .filter(|(_, e)| doc.selection.contains(&e.id))
        .map(|(i, _)| i)
        .collect();
    let selector = SpatialSelector::new(elements.as_slice(), config.selector.clone());

    let result = match args.query {
        Query::Similar => selector.similar(&seeds)?,
        Query::Chain => selector.chain(&seeds, args.radius)?,
        Query::Cluster => selector.nearest_cluster(&seeds)?,
        Query::Partition => {
            let mut rng = make_rng(args.seed.or(config.seed));
            selector.kmeans_partition(&seeds, args.groups, &mut rng)?
        }
        Query::Grid => selector.on_grid(&seeds)?,
        Query::Edge => {
            let region = args
                .region
                .as_deref()
                .ok_or_else(|| anyhow!("--region is required for edge queries"))?;
            selector.edge_region(region)?
        }
    };
    let ids = selector.ids_of(&result);
    eprintln!("selected {} of {} elements", ids.len(), elements.len());
    doc.set_selection(&ids)?;
    write_document(&doc, args.doc.output.as_deref())
}

fn run_learn(args: LearnArgs, config: OptimizerConfig) -> Result<()> {
    let reference = JsonDocument::open(&args.from)?;
    let mut learner = OffsetPatternLearner::new(config.offsets.clone());
    learner.learn_from_labels(&collect_labels(&reference, &Scope::all())?);

    let mut doc = JsonDocument::open(&args.doc.input)?;
    let mut labels = collect_labels(&doc, &Scope::new(args.doc.scope.as_str()))?;
    let applied = learner.apply(&mut labels);
    eprintln!("applied learned offsets to {applied} of {} labels", labels.len());
    write_labels(&mut doc, &labels)?;
    write_document(&doc, args.doc.output.as_deref())
}

fn write_labels(doc: &mut JsonDocument, labels: &[Label]) -> Result<()> {
    let placements: Vec<Placement> = labels.iter().map(Placement::from).collect();
    doc.write_positions(&placements)
}

fn write_document(doc: &JsonDocument, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => doc.save(path),
        None => {
            println!("{}", serde_json::to_string_pretty(doc)?);
            Ok(())
        }
    }
}
