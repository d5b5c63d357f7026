//! CLI for plate-assay dose-response and drug-interaction analysis.
//!
//! Reads a JSON measurement dump and a CSV plate schematic, then drives the
//! core pipeline: plate heatmaps, per-cocktail dose-response charts with EC
//! reporting, and diamond or checkerboard interaction analysis.

mod input;

use std::path::PathBuf;

use clap::Parser;

use dosewell_core::interaction::SurfaceConfig;
use dosewell_core::output::{OutputConfig, RunToken};
use dosewell_core::pipeline::{AnalyzeRequest, Pipeline, RunConfig, RunSummary};
use dosewell_core::{Conversions, ResultsCache, UserError};

use input::FileMeasurementSource;

#[derive(Parser)]
#[command(name = "dosewell")]
#[command(
    about = "Analyze per-well brightness measurements from multi-well assay plates: \
             plate heatmaps, dose-response curves with effective concentrations, and \
             drug-interaction analysis. Reports values relative to control.",
    long_about = None
)]
struct Cli {
    /// JSON file mapping condition labels to per-well scores
    measurements: PathBuf,

    /// CSV file containing the plate schematic (cells are condition labels)
    #[arg(short, long)]
    platefile: PathBuf,

    /// Treat the input as a checkerboard assay, with output produced accordingly
    #[arg(long)]
    checkerboard: bool,

    /// Conversions between dose labels and concrete values, each KEY=VALUE
    /// (e.g. "ABC50=ABC 1mM"; quote values containing spaces)
    #[arg(long, value_parser = parse_key_value, num_args = 0..)]
    conversions: Vec<(String, String)>,

    /// Labels of the control conditions used to anchor dose-response curves
    #[arg(long, num_args = 0.., default_values_t = [String::from("B")])]
    plate_control: Vec<String>,

    /// Labels to treat as positive control (maximum-effect) conditions; used
    /// to normalize all plate values
    #[arg(long, num_args = 0..)]
    plate_positive_control: Vec<String>,

    /// Labels to drop from the schematic and the measurements
    #[arg(long, num_args = 0..)]
    plate_ignore: Vec<String>,

    /// Identifying information for the plate(s), passed through to artifacts
    #[arg(long)]
    plate_info: Option<String>,

    /// Also generate a plate graphic with absolute brightness values
    #[arg(long)]
    absolute_chart: bool,

    /// JSON file with absolute scores (default: <measurements>_absolute.json)
    #[arg(long)]
    absolute_measurements: Option<PathBuf>,

    /// Lower bound of the absolute-brightness rescale window
    #[arg(long, default_value_t = 0.0)]
    absolute_min: f64,

    /// Upper bound of the absolute-brightness rescale window
    #[arg(long, default_value_t = 65535.0)]
    absolute_max: f64,

    /// Render artifacts with enlarged presentation fonts
    #[arg(long)]
    talk: bool,

    /// Maximum number of measurement inputs to analyze (-1 = no cap)
    #[arg(long, default_value_t = -1)]
    cap: i64,

    /// Intermediate chart output path requested from the upstream analyzer;
    /// also bypasses the results cache
    #[arg(long)]
    chartfile: Option<String>,

    /// Debug level; nonzero bypasses the results cache
    #[arg(short, long, default_value_t = 0)]
    debug: u8,

    /// Regex: only condition labels matching it are analyzed
    #[arg(long, default_value = ".*")]
    group_pattern: String,

    /// Physical plate size
    #[arg(long, default_value_t = 96)]
    well_count: usize,

    /// Display ceiling for unscaled schematics
    #[arg(long, default_value_t = 100.0)]
    max_val: f64,

    /// Directory for rendered artifacts
    #[arg(short, long, default_value = "dosewell-out")]
    out_dir: PathBuf,

    /// Directory for cached results (default: <out-dir>/cache)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Uniqueness token for artifact filenames (default: wall clock)
    #[arg(long)]
    run_token: Option<String>,

    /// Seed for the bootstrap response surface
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,
}

/// Split one `KEY=VALUE` conversion argument; malformed pairs fail during
/// argument parsing, before anything runs.
fn parse_key_value(argument: &str) -> Result<(String, String), String> {
    match argument.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(UserError::MalformedConversion { argument: argument.to_string() }.to_string()),
    }
}

fn run(cli: &Cli) -> anyhow::Result<RunSummary> {
    let source = FileMeasurementSource {
        measurements: cli.measurements.clone(),
        absolute_measurements: cli.absolute_measurements.clone(),
    };
    let request = AnalyzeRequest {
        imagefiles: vec![cli.measurements.to_string_lossy().into_owned()],
        cap: cli.cap,
        chartfile: cli.chartfile.clone(),
        debug: cli.debug,
        group_pattern: cli.group_pattern.clone(),
        platefile: Some(cli.platefile.to_string_lossy().into_owned()),
        plate_control: cli.plate_control.clone(),
        plate_ignore: cli.plate_ignore.clone(),
    };
    let config = RunConfig {
        checkerboard: cli.checkerboard,
        conversions: cli.conversions.iter().cloned().collect::<Conversions>(),
        plate_positive_control: cli.plate_positive_control.clone(),
        plate_info: cli.plate_info.clone(),
        absolute_chart: cli.absolute_chart,
        absolute_range: (cli.absolute_min, cli.absolute_max),
        well_count: cli.well_count,
        max_val: cli.max_val,
        surface: SurfaceConfig { seed: cli.seed, ..SurfaceConfig::default() },
        ..RunConfig::new(request)
    };

    std::fs::create_dir_all(&cli.out_dir)?;
    let token = match &cli.run_token {
        Some(token) => RunToken::new(token.clone()),
        None => RunToken::from_clock(),
    };
    let mut output = OutputConfig::new(&cli.out_dir, token);
    output.talk = cli.talk;
    let cache_dir = cli.cache_dir.clone().unwrap_or_else(|| cli.out_dir.join("cache"));

    let pipeline = Pipeline { source: &source, cache: ResultsCache::new(cache_dir), output };
    pipeline.run(&config)
}

fn report(summary: &RunSummary) {
    for ec in &summary.ec_reports {
        println!("{}", ec);
    }
    for (pair, verdict) in &summary.surface_verdicts {
        println!(
            "{}: response-surface interaction {:.4}, CI [{:.4}, {:.4}], significant: {}",
            pair, verdict.interaction, verdict.ci_low, verdict.ci_high, verdict.significant
        );
    }
    for artifact in &summary.artifacts {
        println!("wrote {}", artifact.display());
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(dosewell_core::parse_log_level(cli.log_level.as_deref()))
        .init();

    match run(&cli) {
        Ok(summary) => {
            report(&summary);
            Ok(())
        }
        Err(error) => match error.downcast_ref::<UserError>() {
            Some(user_error) => {
                eprintln!("Error: {}", user_error);
                std::process::exit(1);
            }
            None => Err(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs_parse() {
        assert_eq!(
            parse_key_value("ABC50=ABC 1mM"),
            Ok(("ABC50".to_string(), "ABC 1mM".to_string()))
        );
        assert!(parse_key_value("no-delimiter").is_err());
        assert!(parse_key_value("=empty-key").is_err());
    }

    #[test]
    fn cli_parses_typical_invocation() {
        let cli = Cli::parse_from([
            "dosewell",
            "scores.json",
            "--platefile",
            "plate.csv",
            "--checkerboard",
            "--conversions",
            "ABC50=ABC 1mM",
            "--plate-positive-control",
            "Neo 2mM",
            "--plate-info",
            "plate7",
        ]);
        assert!(cli.checkerboard);
        assert_eq!(cli.conversions.len(), 1);
        assert_eq!(cli.plate_control, vec!["B"]);
        assert_eq!(cli.plate_info.as_deref(), Some("plate7"));
    }
}
