//! End-to-end pipeline runs against an in-memory measurement source.

use std::cell::Cell;

use dosewell_core::interaction::SurfaceConfig;
use dosewell_core::output::{OutputConfig, RunToken};
use dosewell_core::pipeline::{
    AnalyzeRequest, MeasurementSource, Pipeline, RunConfig, RunSummary,
};
use dosewell_core::plate::Schematic;
use dosewell_core::{RawResults, ResultsCache, UserError};

struct FakeSource {
    results: RawResults,
    schematic: Schematic,
    analyze_calls: Cell<usize>,
}

impl FakeSource {
    fn new(results: RawResults, schematic: Schematic) -> FakeSource {
        FakeSource { results, schematic, analyze_calls: Cell::new(0) }
    }
}

impl MeasurementSource for FakeSource {
    fn analyze(&self, _request: &AnalyzeRequest) -> Result<RawResults, UserError> {
        self.analyze_calls.set(self.analyze_calls.get() + 1);
        Ok(self.results.clone())
    }

    fn analyze_absolute(&self, _request: &AnalyzeRequest) -> Result<RawResults, UserError> {
        Ok(self.results.clone())
    }

    fn schematic(&self, _request: &AnalyzeRequest) -> Result<Schematic, UserError> {
        Ok(self.schematic.clone())
    }

    fn context_name(&self) -> Option<String> {
        Some("fake-run".to_string())
    }
}

fn raw_results(pairs: &[(&str, &[f64])]) -> RawResults {
    pairs
        .iter()
        .map(|(label, values)| (label.to_string(), values.to_vec()))
        .collect()
}

fn schematic_of(rows: &[&[&str]]) -> Schematic {
    rows.iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// Controls, two single-drug dose series, and one combination well pair.
fn diamond_fixture() -> (RawResults, Schematic) {
    let results = raw_results(&[
        ("B", &[100.0, 98.0, 102.0]),
        ("Gent 5μM", &[90.0, 92.0]),
        ("Gent 50μM", &[50.0, 52.0]),
        ("Gent 500μM", &[20.0, 22.0]),
        ("Neo 10μM", &[85.0, 87.0]),
        ("Neo 100μM", &[45.0, 47.0]),
        ("Neo 1000μM", &[15.0, 17.0]),
        ("Gent 50μM + Neo 100μM", &[30.0, 32.0]),
    ]);
    let schematic = schematic_of(&[
        &["B", "B", "B"],
        &["Gent 5μM", "Gent 5μM"],
        &["Gent 50μM", "Gent 50μM"],
        &["Gent 500μM", "Gent 500μM"],
        &["Neo 10μM", "Neo 10μM"],
        &["Neo 100μM", "Neo 100μM"],
        &["Neo 1000μM", "Neo 1000μM"],
        &["Gent 50μM + Neo 100μM", "Gent 50μM + Neo 100μM"],
    ]);
    (results, schematic)
}

fn run_pipeline(
    source: &FakeSource,
    dir: &std::path::Path,
    configure: impl FnOnce(&mut RunConfig),
) -> anyhow::Result<RunSummary> {
    let request = AnalyzeRequest::default();
    let mut config = RunConfig::new(request);
    config.plate_info = Some("testplate".to_string());
    config.surface = SurfaceConfig { sampling_iterations: 100, seed: 3, ..SurfaceConfig::default() };
    configure(&mut config);

    let pipeline = Pipeline {
        source,
        cache: ResultsCache::new(dir.join("cache")),
        output: OutputConfig::new(dir, RunToken::new("7")),
    };
    pipeline.run(&config)
}

#[test]
fn diamond_mode_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (results, schematic) = diamond_fixture();
    let source = FakeSource::new(results, schematic);

    let summary = run_pipeline(&source, dir.path(), |_| {}).unwrap();

    // no positive control designated: fallback to the global minimum
    assert_eq!(summary.positive_control_value, 15.0);

    // every single-drug curve reaches its EC50 inside the tested range
    let conditions: Vec<&str> =
        summary.ec_reports.iter().map(|ec| ec.condition.as_str()).collect();
    assert!(conditions.contains(&"Gent"));
    assert!(conditions.contains(&"Neo"));
    assert!(summary
        .ec_reports
        .iter()
        .all(|ec| ec.concentration.is_finite() && ec.concentration > 0.0));

    // schematic heatmap, three dose-response charts, one shared diamond chart
    assert!(summary.artifacts.iter().any(|p| {
        p.file_name().unwrap().to_str().unwrap()
            == "testplate_96-well_schematic_heatmap_scaled_7.png"
    }));
    assert!(summary
        .artifacts
        .iter()
        .any(|p| p.to_str().unwrap().contains("testplate_diamond")));
    for artifact in &summary.artifacts {
        assert!(artifact.exists(), "missing artifact {}", artifact.display());
    }
}

#[test]
fn combination_without_single_model_is_skipped_silently() {
    let dir = tempfile::tempdir().unwrap();
    let (mut results, mut schematic) = diamond_fixture();
    // a combination with no Zed single-drug series anywhere on the plate
    results.insert("Gent 50μM + Zed 10μM".to_string(), vec![28.0, 29.0]);
    schematic.push(vec![
        "Gent 50μM + Zed 10μM".to_string(),
        "Gent 50μM + Zed 10μM".to_string(),
    ]);
    let source = FakeSource::new(results, schematic);

    let summary = run_pipeline(&source, dir.path(), |_| {}).unwrap();
    // the Gent+Zed combination renders a dose-response chart but never a diamond
    assert!(summary
        .artifacts
        .iter()
        .any(|p| p.to_str().unwrap().contains("Gent-Zed")));
    assert!(summary
        .artifacts
        .iter()
        .any(|p| p.to_str().unwrap().contains("_diamond_Gent-Neo")));
    assert!(!summary
        .artifacts
        .iter()
        .any(|p| p.to_str().unwrap().contains("_diamond_Gent-Zed")));
}

#[test]
fn checkerboard_mode_runs_surface_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let results = raw_results(&[
        ("B", &[100.0, 98.0]),
        ("Gent 50μM", &[70.0, 72.0]),
        ("Gent 500μM", &[40.0, 42.0]),
        ("Neo 100μM", &[65.0, 67.0]),
        ("Neo 1000μM", &[35.0, 37.0]),
        ("Gent 50μM + Neo 100μM", &[45.0, 47.0]),
        ("Gent 50μM + Neo 1000μM", &[20.0, 22.0]),
        ("Gent 500μM + Neo 100μM", &[25.0, 26.0]),
        ("Gent 500μM + Neo 1000μM", &[10.0, 12.0]),
    ]);
    let schematic = schematic_of(&[
        &["B", "B"],
        &["Gent 50μM", "Gent 50μM"],
        &["Gent 500μM", "Gent 500μM"],
        &["Neo 100μM", "Neo 100μM"],
        &["Neo 1000μM", "Neo 1000μM"],
        &["Gent 50μM + Neo 100μM", "Gent 50μM + Neo 100μM"],
        &["Gent 50μM + Neo 1000μM", "Gent 50μM + Neo 1000μM"],
        &["Gent 500μM + Neo 100μM", "Gent 500μM + Neo 100μM"],
        &["Gent 500μM + Neo 1000μM", "Gent 500μM + Neo 1000μM"],
    ]);
    let source = FakeSource::new(results, schematic);

    let summary = run_pipeline(&source, dir.path(), |config| {
        config.checkerboard = true;
    })
    .unwrap();

    assert!(summary
        .artifacts
        .iter()
        .any(|p| p.to_str().unwrap().contains("checkerboard_Gent-Neo")));
    assert_eq!(summary.surface_verdicts.len(), 1);
    let (pair, verdict) = &summary.surface_verdicts[0];
    assert_eq!(pair, "Gent + Neo");
    assert!(verdict.interaction.is_finite());
    assert!(verdict.samples > 0);
}

#[test]
fn second_run_hits_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (results, schematic) = diamond_fixture();
    let source = FakeSource::new(results, schematic);

    run_pipeline(&source, dir.path(), |_| {}).unwrap();
    assert_eq!(source.analyze_calls.get(), 1);

    run_pipeline(&source, dir.path(), |_| {}).unwrap();
    assert_eq!(source.analyze_calls.get(), 1, "second run should come from the cache");

    // an explicit chartfile bypasses (and refreshes) the cache
    run_pipeline(&source, dir.path(), |config| {
        config.request.chartfile = Some("chart.png".to_string());
    })
    .unwrap();
    assert_eq!(source.analyze_calls.get(), 2);
}

#[test]
fn misspelled_schematic_label_is_a_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let (results, mut schematic) = diamond_fixture();
    schematic[0][0] = "Bogus 1mM".to_string();
    let source = FakeSource::new(results, schematic);

    let error = run_pipeline(&source, dir.path(), |_| {}).unwrap_err();
    let user_error = error.downcast_ref::<UserError>().expect("should be a UserError");
    assert!(user_error.to_string().contains("Bogus 1mM"));
}

#[test]
fn positive_control_mean_feeds_normalization() {
    let dir = tempfile::tempdir().unwrap();
    let (results, schematic) = diamond_fixture();
    let source = FakeSource::new(results, schematic);

    let summary = run_pipeline(&source, dir.path(), |config| {
        config.plate_positive_control = vec!["Neo 1000μM".to_string()];
    })
    .unwrap();
    assert_eq!(summary.positive_control_value, 16.0);
}
