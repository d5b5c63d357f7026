//! The batch pipeline: cache lookup/compute → grouping → positive-control
//! resolution → schematic rendering → per-cocktail modeling → EC reporting →
//! interaction analysis.
//!
//! Everything runs synchronously in that order. The resolved results mapping
//! is the only shared structure; the layout engine copies it into private
//! queues before consuming, so modeling and interaction analysis always see
//! the untouched original.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};
use std::path::PathBuf;

use log::{info, warn};

use crate::cache::{CacheKey, ResultsCache};
use crate::condition::{
    group_by_cocktail, resolve_results, Cocktail, Conversions, Dose, RawResults, Results, Solution,
};
use crate::dose_response::Model;
use crate::error::UserError;
use crate::interaction::{
    analyze_checkerboard, analyze_diamond, squarify, try_response_surface, SurfaceConfig,
    SurfaceInputs, SurfaceVerdict,
};
use crate::output::{OutputConfig, ScaleTag};
use crate::plate::{build_matrix, LayoutOptions, Schematic};
use crate::render;
use crate::stats::{nan_mean, nan_median, nan_min};

/// Arguments forwarded to the upstream measurement analyzer (and hashed for
/// the cache fingerprint).
#[derive(Clone, Debug)]
pub struct AnalyzeRequest {
    pub imagefiles: Vec<String>,
    pub cap: i64,
    pub chartfile: Option<String>,
    pub debug: u8,
    pub group_pattern: String,
    pub platefile: Option<String>,
    pub plate_control: Vec<String>,
    pub plate_ignore: Vec<String>,
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        AnalyzeRequest {
            imagefiles: Vec::new(),
            cap: -1,
            chartfile: None,
            debug: 0,
            group_pattern: ".*".to_string(),
            platefile: None,
            plate_control: vec!["B".to_string()],
            plate_ignore: Vec::new(),
        }
    }
}

/// The upstream analyzer: produces raw per-condition scores and the plate
/// schematic. Image acquisition and per-well extraction live behind this
/// seam; the pipeline never sees a pixel.
pub trait MeasurementSource {
    fn analyze(&self, request: &AnalyzeRequest) -> Result<RawResults, UserError>;

    /// Absolute (unnormalized) variant of [`MeasurementSource::analyze`].
    fn analyze_absolute(&self, request: &AnalyzeRequest) -> Result<RawResults, UserError>;

    fn schematic(&self, request: &AnalyzeRequest) -> Result<Schematic, UserError>;

    /// A plate-identifying string derived from the source itself, used when
    /// the run supplies none.
    fn context_name(&self) -> Option<String> {
        None
    }
}

/// Full configuration for one pipeline run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub request: AnalyzeRequest,
    /// Checkerboard interaction mode instead of diamond mode.
    pub checkerboard: bool,
    pub conversions: Conversions,
    pub plate_positive_control: Vec<String>,
    pub plate_info: Option<String>,
    /// Also render a schematic of absolute brightness values.
    pub absolute_chart: bool,
    /// Rescale window for the absolute schematic.
    pub absolute_range: (f64, f64),
    pub well_count: usize,
    /// Display ceiling for unscaled schematics.
    pub max_val: f64,
    pub surface: SurfaceConfig,
}

impl RunConfig {
    pub fn new(request: AnalyzeRequest) -> Self {
        RunConfig {
            request,
            checkerboard: false,
            conversions: Conversions::new(),
            plate_positive_control: Vec::new(),
            plate_info: None,
            absolute_chart: false,
            absolute_range: (0.0, 65535.0),
            well_count: 96,
            max_val: 100.0,
            surface: SurfaceConfig::default(),
        }
    }
}

/// One reported effective concentration.
#[derive(Clone, Debug)]
pub struct EcReport {
    pub condition: String,
    pub level: u32,
    pub concentration: f64,
    pub units: String,
}

impl Display for EcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} EC_{}={:.2}{}",
            self.condition, self.level, self.concentration, self.units
        )
    }
}

/// Everything a run produced, for the caller to report.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub positive_control_value: f64,
    pub ec_reports: Vec<EcReport>,
    pub surface_verdicts: Vec<(String, SurfaceVerdict)>,
    pub artifacts: Vec<PathBuf>,
}

/// The orchestrator: owns the cache and output policy, drives a
/// [`MeasurementSource`] through a full run.
pub struct Pipeline<'a, S> {
    pub source: &'a S,
    pub cache: ResultsCache,
    pub output: OutputConfig,
}

impl<S: MeasurementSource> Pipeline<'_, S> {
    pub fn run(&self, config: &RunConfig) -> anyhow::Result<RunSummary> {
        let request = &config.request;
        let mut summary = RunSummary::default();

        let schematic = self.source.schematic(request)?;
        let plate_info = config
            .plate_info
            .clone()
            .or_else(|| self.source.context_name())
            .unwrap_or_else(|| "[Unknown]".to_string());

        if config.absolute_chart {
            let raw = self.source.analyze_absolute(request)?;
            let results = resolve_results(&raw, &config.conversions)?;
            let matrix = build_matrix(
                &schematic,
                &results,
                &LayoutOptions {
                    conversions: &config.conversions,
                    scale: Some(config.absolute_range),
                    well_count: config.well_count,
                    max_val: config.max_val,
                },
            )?;
            let tag = ScaleTag::classify(Some(config.absolute_range), config.max_val);
            summary.artifacts.push(render::render_plate_heatmap(
                &matrix,
                &plate_info,
                config.well_count,
                tag,
                &self.output,
            )?);
        }

        let raw = self.fetch_results(request)?;
        let results = resolve_results(&raw, &config.conversions)?;
        let drug_conditions = group_by_cocktail(&results);
        let control_drugs: Vec<Cocktail> = request
            .plate_control
            .iter()
            .map(|label| Dose::parse(label).map(|dose| Cocktail::single(&dose.drug)))
            .collect::<Result<_, _>>()?;

        // positive control: designated wells, else the plate's global minimum
        let mut positive_scores = Vec::new();
        for label in &config.plate_positive_control {
            let solution = Solution::parse(label, &config.conversions)?;
            match results.get(&solution) {
                Some(values) => positive_scores.extend(values.iter().copied()),
                None => {
                    return Err(UserError::ConditionNotFound {
                        label: solution.to_string(),
                        tokens: solution.quoted_tokens(),
                    }
                    .into())
                }
            }
        }
        let mut positive_control_value = nan_mean(&positive_scores);
        if positive_control_value.is_nan() {
            warn!("No positive control included. Using minimum calculated value as positive control");
            positive_control_value = nan_min(results.values().flatten().copied());
        }
        summary.positive_control_value = positive_control_value;

        // plate schematic, scaled so the positive control reads as 0%
        let scale = (positive_control_value, 100.0);
        let matrix = build_matrix(
            &schematic,
            &results,
            &LayoutOptions {
                conversions: &config.conversions,
                scale: Some(scale),
                well_count: config.well_count,
                max_val: config.max_val,
            },
        )?;
        let tag = ScaleTag::classify(Some(scale), config.max_val);
        summary.artifacts.push(render::render_plate_heatmap(
            &matrix,
            &plate_info,
            config.well_count,
            tag,
            &self.output,
        )?);

        // one dose-response model per non-control cocktail, anchored by the
        // control conditions
        let control_solutions: Vec<Solution> = control_drugs
            .iter()
            .filter_map(|cocktail| drug_conditions.get(cocktail))
            .flatten()
            .cloned()
            .collect();
        if control_solutions.is_empty() {
            warn!("no control conditions found among {:?}", request.plate_control);
        }

        let mut models: BTreeMap<Cocktail, Model> = BTreeMap::new();
        for (cocktail, conditions) in &drug_conditions {
            if control_drugs.contains(cocktail) {
                continue;
            }
            let mut full = control_solutions.clone();
            full.extend(conditions.iter().cloned());
            let scores: Vec<f64> =
                full.iter().map(|solution| nan_median(&results[solution])).collect();
            let datapoints: BTreeMap<Solution, Vec<f64>> = full
                .iter()
                .map(|solution| (solution.clone(), results[solution].clone()))
                .collect();
            let model = Model::fit(full, scores, cocktail.clone(), positive_control_value);
            summary.artifacts.push(render::render_dose_response(
                &model,
                &datapoints,
                scale,
                &format!("{}_{}", plate_info, cocktail),
                &self.output,
            )?);
            models.insert(cocktail.clone(), model);
        }

        for model in models.values() {
            for level in [50u32, 75, 90, 99] {
                let concentration = model.effective_concentration(level as f64 / 100.0);
                if !concentration.is_nan() {
                    let report = EcReport {
                        condition: model.condition_name(),
                        level,
                        concentration,
                        units: model.x_units().to_string(),
                    };
                    info!("{}", report);
                    summary.ec_reports.push(report);
                }
            }
        }

        if config.checkerboard {
            self.analyze_checkerboards(
                config,
                &plate_info,
                &results,
                &control_drugs,
                &models,
                &positive_scores,
                &mut summary,
            )?;
        } else {
            self.analyze_diamonds(&plate_info, &models, &mut summary)?;
        }

        Ok(summary)
    }

    /// Cached results when allowed, fresh computation (with a cache refresh)
    /// otherwise.
    fn fetch_results(&self, request: &AnalyzeRequest) -> anyhow::Result<RawResults> {
        let fingerprint = CacheKey {
            imagefiles: &request.imagefiles,
            cap: request.cap,
            group_pattern: &request.group_pattern,
            platefile: request.platefile.as_deref(),
            plate_control: &request.plate_control,
            plate_ignore: &request.plate_ignore,
        }
        .fingerprint();
        let bypass = request.chartfile.is_some() || request.debug > 0;
        if !bypass {
            if let Some(raw) = self.cache.load(&fingerprint) {
                return Ok(raw);
            }
        }
        let raw = self.source.analyze(request)?;
        self.cache.store(&fingerprint, &raw);
        Ok(raw)
    }

    /// Diamond mode: one isobologram per combination whose single-drug
    /// models both exist, plus one shared chart on a uniform axis scale.
    fn analyze_diamonds(
        &self,
        plate_info: &str,
        models: &BTreeMap<Cocktail, Model>,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        let mut analyses = Vec::new();
        let mut total_max_x = 1.0f64;
        let mut total_max_y = 1.0f64;
        for combo in models.values().filter(|m| m.is_combo()) {
            let (drug_a, drug_b) = match combo.cocktail.pair() {
                Some(pair) => pair,
                None => continue,
            };
            // a combination cannot be analyzed without both single-drug baselines
            let (model_a, model_b) = match (
                models.get(&Cocktail::single(drug_a)),
                models.get(&Cocktail::single(drug_b)),
            ) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            if let Some(analysis) = analyze_diamond(model_a, model_b, combo) {
                total_max_x = total_max_x.max(analysis.max_x);
                total_max_y = total_max_y.max(analysis.max_y);
                summary.artifacts.push(render::render_diamond(
                    std::slice::from_ref(&analysis),
                    analysis.max_x,
                    analysis.max_y,
                    &format!("{}_diamond_{}", plate_info, analysis.label),
                    &self.output,
                )?);
                analyses.push(analysis);
            }
        }
        if !analyses.is_empty() {
            summary.artifacts.push(render::render_diamond(
                &analyses,
                total_max_x,
                total_max_y,
                &format!("{}_diamond", plate_info),
                &self.output,
            )?);
        }
        Ok(())
    }

    /// Checkerboard mode: Bliss grid plus bootstrap response surface per
    /// drug pair.
    #[allow(clippy::too_many_arguments)]
    fn analyze_checkerboards(
        &self,
        config: &RunConfig,
        plate_info: &str,
        results: &Results,
        control_drugs: &[Cocktail],
        models: &BTreeMap<Cocktail, Model>,
        positive_scores: &[f64],
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        let combos: Vec<&Model> = models.values().filter(|m| m.is_combo()).collect();
        let pairs: BTreeSet<(String, String)> = combos
            .iter()
            .filter_map(|m| m.cocktail.pair())
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();

        for (drug_a, drug_b) in pairs {
            let (model_a, model_b) = match (
                models.get(&Cocktail::single(&drug_a)),
                models.get(&Cocktail::single(&drug_b)),
            ) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    warn!(
                        "{} + {}: missing single-drug model, skipping checkerboard",
                        drug_a, drug_b
                    );
                    continue;
                }
            };
            let relevant: Vec<&Model> = combos
                .iter()
                .copied()
                .filter(|m| m.cocktail.pair() == Some((drug_a.as_str(), drug_b.as_str())))
                .collect();

            let analysis = analyze_checkerboard(model_a, model_b, &relevant);
            summary.artifacts.push(render::render_checkerboard(
                &analysis,
                plate_info,
                &self.output,
            )?);

            // dense arrays for the response surface, controls excluded
            let is_control = |s: &Solution| control_drugs.contains(&s.cocktail());
            let single_rows = |model: &Model| -> (Vec<f64>, Vec<Vec<f64>>) {
                let solutions: Vec<&Solution> =
                    model.conditions.iter().filter(|s| !is_control(s)).collect();
                let doses = solutions.iter().map(|s| s.total_micromolar()).collect();
                let rows: Vec<Vec<f64>> =
                    solutions.iter().map(|s| results[*s].clone()).collect();
                (doses, squarify(&rows))
            };
            let (doses_a, responses_a) = single_rows(model_a);
            let (doses_b, responses_b) = single_rows(model_b);

            let combo_rows: Vec<(f64, f64, Vec<f64>)> = results
                .iter()
                .filter_map(|(solution, values)| {
                    if !solution.is_combo() {
                        return None;
                    }
                    let da = solution.dose_of(&drug_a)?;
                    let db = solution.dose_of(&drug_b)?;
                    Some((da, db, values.clone()))
                })
                .collect();
            let doses_a_ab: Vec<f64> = combo_rows.iter().map(|row| row.0).collect();
            let doses_b_ab: Vec<f64> = combo_rows.iter().map(|row| row.1).collect();
            let ab_rows: Vec<Vec<f64>> = combo_rows.iter().map(|row| row.2.clone()).collect();
            let responses_ab = squarify(&ab_rows);

            let positive_control = if positive_scores.is_empty() {
                vec![nan_min(results.values().flatten().copied())]
            } else {
                positive_scores.to_vec()
            };

            let inputs = SurfaceInputs {
                doses_a: &doses_a,
                responses_a: &responses_a,
                doses_b: &doses_b,
                responses_b: &responses_b,
                doses_a_ab: &doses_a_ab,
                doses_b_ab: &doses_b_ab,
                responses_ab: &responses_ab,
                positive_control: &positive_control,
            };
            if let Some(verdict) = try_response_surface(&inputs, &config.surface)? {
                info!(
                    "{} + {}: response-surface interaction {:.4}, CI [{:.4}, {:.4}], significant: {}",
                    drug_a, drug_b, verdict.interaction, verdict.ci_low, verdict.ci_high,
                    verdict.significant
                );
                summary.surface_verdicts.push((format!("{} + {}", drug_a, drug_b), verdict));
            }
        }
        Ok(())
    }
}
