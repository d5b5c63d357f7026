use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SurfaceError;
use crate::stats::nan_mean;

/// Pad ragged replicate rows with NaN so the matrix is rectangular.
pub fn squarify(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            row.resize(width, f64::NAN);
            row
        })
        .collect()
}

/// Bootstrap response-surface parameters.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceConfig {
    pub sampling_iterations: usize,
    pub sample_size: usize,
    pub model_order: usize,
    pub alpha: f64,
    pub seed: u64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        SurfaceConfig {
            sampling_iterations: 1000,
            sample_size: 20,
            model_order: 1,
            alpha: 0.1,
            seed: 0,
        }
    }
}

/// Dense dose/response arrays for one drug pair: each single agent alone,
/// the combination grid, and the positive-control reference scores.
///
/// Response matrices are row-per-dose, one column per replicate, NaN-padded
/// (see [`squarify`]) when replicate counts are ragged.
#[derive(Clone, Debug)]
pub struct SurfaceInputs<'a> {
    pub doses_a: &'a [f64],
    pub responses_a: &'a [Vec<f64>],
    pub doses_b: &'a [f64],
    pub responses_b: &'a [Vec<f64>],
    pub doses_a_ab: &'a [f64],
    pub doses_b_ab: &'a [f64],
    pub responses_ab: &'a [Vec<f64>],
    pub positive_control: &'a [f64],
}

/// Outcome of the bootstrap response-surface test.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceVerdict {
    /// Interaction coefficient of the full-data fit.
    pub interaction: f64,
    /// Bootstrap percentile interval for the interaction coefficient.
    pub ci_low: f64,
    pub ci_high: f64,
    /// True when the interval excludes zero: the observed surface deviates
    /// from the additive/independence expectation.
    pub significant: bool,
    /// Bootstrap fits that succeeded.
    pub samples: usize,
}

fn rectangular(rows: &[Vec<f64>]) -> bool {
    match rows.first() {
        Some(first) => rows.iter().all(|row| row.len() == first.len()),
        None => true,
    }
}

/// One observation: a dose pair and the effect fraction measured there.
type Observation = (f64, f64, f64);

fn collect_observations(inputs: &SurfaceInputs) -> Result<Vec<Observation>, SurfaceError> {
    if inputs.doses_a.len() != inputs.responses_a.len()
        || inputs.doses_b.len() != inputs.responses_b.len()
        || inputs.doses_a_ab.len() != inputs.doses_b_ab.len()
        || inputs.doses_a_ab.len() != inputs.responses_ab.len()
        || !rectangular(inputs.responses_a)
        || !rectangular(inputs.responses_b)
        || !rectangular(inputs.responses_ab)
    {
        return Err(SurfaceError::NonSquare);
    }

    let all_scores = inputs
        .responses_a
        .iter()
        .chain(inputs.responses_b.iter())
        .chain(inputs.responses_ab.iter())
        .flatten()
        .copied()
        .filter(|x: &f64| x.is_finite());
    let baseline = all_scores.fold(f64::NEG_INFINITY, f64::max);
    let reference = nan_mean(inputs.positive_control);
    let span = baseline - reference;
    if !span.is_finite() || span == 0.0 {
        return Err(SurfaceError::Numeric(format!(
            "degenerate effect scale: baseline {}, positive-control reference {}",
            baseline, reference
        )));
    }

    let mut observations = Vec::new();
    let mut extend = |doses_a: &[(f64, f64)], responses: &[Vec<f64>]| {
        for (&(da, db), row) in doses_a.iter().zip(responses.iter()) {
            for &score in row.iter().filter(|s| s.is_finite()) {
                observations.push((da, db, (baseline - score) / span));
            }
        }
    };
    let singles_a: Vec<(f64, f64)> = inputs.doses_a.iter().map(|&d| (d, 0.0)).collect();
    let singles_b: Vec<(f64, f64)> = inputs.doses_b.iter().map(|&d| (0.0, d)).collect();
    let pairs: Vec<(f64, f64)> = inputs
        .doses_a_ab
        .iter()
        .zip(inputs.doses_b_ab.iter())
        .map(|(&da, &db)| (da, db))
        .collect();
    extend(&singles_a, inputs.responses_a);
    extend(&singles_b, inputs.responses_b);
    extend(&pairs, inputs.responses_ab);

    Ok(observations)
}

/// Fit `effect ~ polynomial(dose_a, dose_b) + βab·dose_a·dose_b` and return
/// the interaction coefficient `βab`.
fn fit_interaction(observations: &[Observation], order: usize) -> Result<f64, SurfaceError> {
    // monomials a^i b^j with i + j <= order, then the interaction column
    let mut exponents = Vec::new();
    for i in 0..=order {
        for j in 0..=(order - i) {
            exponents.push((i as i32, j as i32));
        }
    }
    let n_cols = exponents.len() + 1;
    if observations.len() < n_cols {
        return Err(SurfaceError::Numeric(format!(
            "{} observations cannot constrain {} surface terms",
            observations.len(),
            n_cols
        )));
    }

    let mut flat = Vec::with_capacity(observations.len() * n_cols);
    let mut effects = Vec::with_capacity(observations.len());
    for &(da, db, effect) in observations {
        for &(i, j) in &exponents {
            flat.push(da.powi(i) * db.powi(j));
        }
        flat.push(da * db);
        effects.push(effect);
    }
    let design = DMatrix::from_row_slice(observations.len(), n_cols, &flat);
    let response = DVector::from_vec(effects);
    let solution = design
        .svd(true, true)
        .solve(&response, 1e-12)
        .map_err(|e| SurfaceError::Numeric(e.to_string()))?;
    Ok(solution[(n_cols - 1, 0)])
}

/// Bootstrap response-surface test: does the combination's observed effect
/// surface deviate from the additive expectation?
///
/// Resamples observation rows with replacement (NaN padding never enters —
/// only finite replicates become observations), refits the surface each
/// iteration, and reads the interaction coefficient's percentile interval.
pub fn response_surface(
    inputs: &SurfaceInputs,
    config: &SurfaceConfig,
) -> Result<SurfaceVerdict, SurfaceError> {
    let observations = collect_observations(inputs)?;
    let interaction = fit_interaction(&observations, config.model_order)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut coefficients = Vec::with_capacity(config.sampling_iterations);
    for _ in 0..config.sampling_iterations {
        let sample: Vec<Observation> = (0..config.sample_size)
            .map(|_| observations[rng.gen_range(0..observations.len())])
            .collect();
        // rank-deficient or non-finite resamples are expected; they drop out
        if let Ok(coefficient) = fit_interaction(&sample, config.model_order) {
            if coefficient.is_finite() {
                coefficients.push(coefficient);
            }
        }
    }
    if coefficients.len() < config.sampling_iterations / 10 {
        return Err(SurfaceError::Numeric(format!(
            "only {} of {} bootstrap fits succeeded",
            coefficients.len(),
            config.sampling_iterations
        )));
    }

    coefficients.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let percentile = |q: f64| {
        let idx = (q * (coefficients.len() - 1) as f64).round() as usize;
        coefficients[idx]
    };
    let ci_low = percentile(config.alpha / 2.0);
    let ci_high = percentile(1.0 - config.alpha / 2.0);
    let significant = ci_low > 0.0 || ci_high < 0.0;

    debug!(
        "response surface: interaction {:.4}, CI [{:.4}, {:.4}] over {} fits",
        interaction,
        ci_low,
        ci_high,
        coefficients.len()
    );
    Ok(SurfaceVerdict {
        interaction,
        ci_low,
        ci_high,
        significant,
        samples: coefficients.len(),
    })
}

/// Run the response surface, downgrading the recognized non-square input
/// shape to an informational skip. All other failures stay fatal.
pub fn try_response_surface(
    inputs: &SurfaceInputs,
    config: &SurfaceConfig,
) -> Result<Option<SurfaceVerdict>, SurfaceError> {
    match response_surface(inputs, config) {
        Ok(verdict) => Ok(Some(verdict)),
        Err(SurfaceError::NonSquare) => {
            info!("Unable to analyze non-square interaction matrix");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
