use std::path::{Path, PathBuf};

use annotation_layout::adapter::{JsonDocument, Scope, collect_elements, collect_labels, push_positions};
use annotation_layout::config::{
    AnnealingConfig, ForceConfig, GeneticConfig, KMeansConfig, OptimizerConfig, SelectorConfig,
    load_config,
};
use annotation_layout::geometry::Point2D;
use annotation_layout::layout::{
    ForceEngine, GeneticSolver, Label, LayoutScorer, LayoutSession, Observation,
    OffsetPatternLearner, Pass, PassOutcome, SessionState, SimulatedAnnealing, clash_count,
};
use annotation_layout::select::SpatialSelector;
use annotation_layout::spatial::{GridDetector, KMeans, dbscan};
use annotation_layout::LayoutError;
use rand::SeedableRng;
use rand::rngs::StdRng;

// Keep this list explicit so new fixtures must be added intentionally.
const LAYOUT_FIXTURES: [&str; 4] = [
    "stacked_doors.json",
    "dense_grid.json",
    "two_rooms.json",
    "floor_plan.json",
];

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture_labels(name: &str) -> (JsonDocument, Vec<Label>) {
    let path = fixture_path(name);
    assert!(path.exists(), "fixture missing: {name}");
    let doc = JsonDocument::open(&path).expect("fixture read failed");
    let labels = collect_labels(&doc, &Scope::all()).expect("label enumeration failed");
    (doc, labels)
}

fn seeded(seed: u64) -> OptimizerConfig {
    OptimizerConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn session_runs_every_fixture() {
    for name in LAYOUT_FIXTURES {
        let (mut doc, labels) = fixture_labels(name);
        let mut session = LayoutSession::new(seeded(7)).unwrap();
        session.load(labels.clone()).unwrap();
        let clashes_before = clash_count(&labels, session.spacing());

        let reports = session.run_all().unwrap();
        assert_eq!(reports.len(), Pass::COUNT, "{name}");
        let passes: Vec<Pass> = reports.iter().map(|r| r.pass).collect();
        assert_eq!(passes, Pass::ALL, "{name}");
        assert_eq!(session.run_pass().unwrap(), PassOutcome::Complete, "{name}");

        let after = session.labels();
        assert!(after.iter().all(|l| l.position.is_finite()), "{name}: non-finite position");
        for (now, then) in after.iter().zip(&labels) {
            assert_eq!(now.id, then.id, "{name}: order changed");
            assert_eq!(now.anchor, then.anchor, "{name}: anchor moved");
        }
        let clashes_after = clash_count(after, session.spacing());
        assert!(
            clashes_after <= clashes_before,
            "{name}: clashes {clashes_before} -> {clashes_after}"
        );

        let written = push_positions(&session, &mut doc).unwrap();
        assert_eq!(written, labels.len(), "{name}");
    }
}

#[test]
fn reset_restores_every_fixture() {
    for name in LAYOUT_FIXTURES {
        let (_, labels) = fixture_labels(name);
        let mut session = LayoutSession::new(seeded(3)).unwrap();
        session.load(labels.clone()).unwrap();
        session.run_pass().unwrap();
        session.run_pass().unwrap();
        session.reset();
        assert_eq!(session.pass_index(), 0, "{name}");
        assert_eq!(session.state(), SessionState::Loaded, "{name}");
        for (now, then) in session.labels().iter().zip(&labels) {
            assert_eq!(now.position, then.position, "{name}: {} not restored", now.id);
        }
    }
}

#[test]
fn annealing_never_raises_energy() {
    let sa = SimulatedAnnealing::new(1.0, AnnealingConfig::default()).unwrap();
    for name in LAYOUT_FIXTURES {
        let (_, labels) = fixture_labels(name);
        for steps in [0, 1, 10, 200] {
            let mut work = labels.clone();
            let before = sa.energy(&work);
            let mut rng = StdRng::seed_from_u64(steps as u64);
            sa.run(&mut work, steps, &mut rng).unwrap();
            assert!(sa.energy(&work) <= before, "{name} with {steps} steps");
        }
    }
}

#[test]
fn genetic_best_fitness_never_drops() {
    let ga = GeneticSolver::new(1.0, GeneticConfig::default()).unwrap();
    for name in LAYOUT_FIXTURES {
        let (_, mut labels) = fixture_labels(name);
        let mut rng = StdRng::seed_from_u64(21);
        let stats = ga.run_with(&mut labels, 20, 30, &mut rng).unwrap();
        assert!(
            stats.history.windows(2).all(|w| w[1] >= w[0]),
            "{name}: history {:?}",
            stats.history
        );
        assert!(stats.best_fitness >= stats.initial_fitness, "{name}");
    }
}

#[test]
fn five_stacked_labels_spread_out() {
    let (_, mut labels) = fixture_labels("stacked_doors.json");
    assert_eq!(labels.len(), 5);
    ForceEngine::new(1.0, ForceConfig::default())
        .unwrap()
        .run(&mut labels, 40)
        .unwrap();

    let mut short = 0;
    for (i, a) in labels.iter().enumerate() {
        for b in &labels[i + 1..] {
            if a.position.distance(b.position) < 1.0 - 0.05 {
                short += 1;
            }
        }
    }
    assert!(short <= 1, "{short} pairs closer than spacing");

    let score = LayoutScorer::default().score(&labels, 1.0).unwrap();
    assert!(score.breakdown.overlap >= 20.0, "overlap {}", score.breakdown.overlap);
}

#[test]
fn one_force_step_separates_a_close_pair() {
    let engine = ForceEngine::new(1.0, ForceConfig::default()).unwrap();
    for gap in [0.05, 0.3, 0.6, 0.95] {
        let mut labels = vec![
            Label::new("a", Point2D::new(0.0, 0.0), Point2D::new(0.0, 0.0)),
            Label::new("b", Point2D::new(gap, 0.0), Point2D::new(gap, 0.0)),
        ];
        engine.step(&mut labels);
        assert!(labels[0].position.distance(labels[1].position) > gap, "gap {gap}");
    }
}

#[test]
fn kmeans_returns_min_k_n_centroids() {
    let kmeans = KMeans::new(KMeansConfig::default());
    let mut rng = StdRng::seed_from_u64(5);
    for n in 1..=10usize {
        let points: Vec<Point2D> = (0..n)
            .map(|i| Point2D::new((i * 7 % 5) as f64, (i * 3 % 4) as f64))
            .collect();
        for k in 1..=8usize {
            let result = kmeans.run(&points, Some(k), &mut rng).unwrap();
            assert_eq!(result.centroids.len(), k.min(n), "n {n} k {k}");
        }
    }
    assert!(matches!(
        kmeans.run(&[], Some(2), &mut rng),
        Err(LayoutError::InsufficientData { .. })
    ));
}

#[test]
fn dbscan_is_deterministic() {
    let (_, labels) = fixture_labels("two_rooms.json");
    let points: Vec<Point2D> = labels.iter().map(|l| l.anchor).collect();
    let first = dbscan(&points, 1.0, 3).unwrap();
    for _ in 0..5 {
        assert_eq!(dbscan(&points, 1.0, 3).unwrap().assignments, first.assignments);
    }
    assert_eq!(first.cluster_count(), 2);
}

#[test]
fn six_point_grid_has_pitch_two() {
    let points = [
        Point2D::new(0.0, 0.0),
        Point2D::new(2.0, 0.0),
        Point2D::new(4.0, 0.0),
        Point2D::new(0.0, 2.0),
        Point2D::new(2.0, 2.0),
        Point2D::new(4.0, 2.0),
    ];
    let pitch = GridDetector::new(0.1).unwrap().detect(&points).unwrap();
    let x = pitch.x_pitch.unwrap();
    let y = pitch.y_pitch.unwrap();
    assert!((x - 2.0).abs() < 1e-9, "x pitch {x}");
    assert!((y - 2.0).abs() < 1e-9, "y pitch {y}");
}

#[test]
fn learned_door_offset_is_applied() {
    let mut learner = OffsetPatternLearner::default();
    learner.learn(&[
        Observation::new("Door", Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)),
        Observation::new("Door", Point2D::new(10.0, 10.0), Point2D::new(11.0, 11.0)),
    ]);
    let mut labels =
        vec![Label::new("new-door", Point2D::new(5.0, 5.0), Point2D::new(5.0, 5.0)).with_category("Door")];
    learner.apply(&mut labels);
    assert_eq!(labels[0].position, Point2D::new(6.0, 6.0));
}

#[test]
fn floor_plan_selections() {
    let doc = JsonDocument::open(&fixture_path("floor_plan.json")).unwrap();
    let elements = collect_elements(&doc, &Scope::all()).unwrap();
    assert_eq!(elements.len(), 9, "element without a position is skipped");
    let selector = SpatialSelector::new(elements.as_slice(), SelectorConfig::default());
    let seeds: Vec<usize> = elements
        .iter()
        .enumerate()
        .filter(|(_, e)| doc.selection.contains(&e.id))
        .map(|(i, _)| i)
        .collect();

    let similar = selector.ids_of(&selector.similar(&seeds).unwrap());
    assert_eq!(similar, ["c0", "c1", "c2", "c3", "c4", "c5"]);

    let grid = selector.ids_of(&selector.on_grid(&seeds).unwrap());
    assert_eq!(grid, ["c0", "c1", "c2", "c3", "c4", "c5"]);

    let chain = selector.ids_of(&selector.chain(&seeds, Some(3.5)).unwrap());
    assert_eq!(chain, ["c0", "c1", "c2", "d0", "d1"]);

    let top = selector.ids_of(&selector.edge_region("top").unwrap());
    assert_eq!(top, ["c3", "c4", "c5", "d2"]);
    let left = selector.ids_of(&selector.edge_region("left").unwrap());
    assert_eq!(left, ["c0", "c3"]);
}

#[test]
fn config_file_overrides_defaults() {
    let config = load_config(Some(&fixture_path("config.json5"))).unwrap();
    assert_eq!(config.spacing, 1.5);
    assert_eq!(config.expand_push, 0.5);
    assert_eq!(config.annealing.initial_temperature, 1.5);
    assert_eq!(config.selector.edge_margin_pct, 20.0);
    assert_eq!(config.iterations, OptimizerConfig::default().iterations);

    let default = load_config(None).unwrap();
    assert_eq!(default.spacing, 1.0);
}
