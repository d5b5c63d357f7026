use std::collections::BTreeSet;

use log::debug;
use ordered_float::OrderedFloat;

use crate::dose_response::Model;
use crate::stats::nan_median;

/// Bliss-independence expectation for two effect fractions.
pub fn bliss(effect_a: f64, effect_b: f64) -> f64 {
    effect_a + effect_b - effect_a * effect_b
}

/// A full-grid Bliss comparison for one drug pair.
///
/// Grids are indexed `[a_index][b_index]`; cells with no matching
/// combination condition hold NaN. `synergy` is observed minus expected, so
/// positive cells exceed the independence prediction.
#[derive(Clone, Debug)]
pub struct CheckerboardAnalysis {
    pub drug_a: String,
    pub drug_b: String,
    pub doses_a: Vec<f64>,
    pub doses_b: Vec<f64>,
    pub observed: Vec<Vec<f64>>,
    pub expected: Vec<Vec<f64>>,
    pub synergy: Vec<Vec<f64>>,
}

/// Run a Bliss-independence checkerboard over every combination model of a
/// drug pair, using the single-drug models' fitted curves for the
/// independence expectation.
pub fn analyze_checkerboard(
    model_a: &Model,
    model_b: &Model,
    combos: &[&Model],
) -> CheckerboardAnalysis {
    let drug_a = model_a.cocktail.drugs()[0].clone();
    let drug_b = model_b.cocktail.drugs()[0].clone();

    // grid axes from the combination conditions actually present
    let mut axis_a = BTreeSet::new();
    let mut axis_b = BTreeSet::new();
    for combo in combos {
        for solution in &combo.conditions {
            if let (Some(da), Some(db)) = (solution.dose_of(&drug_a), solution.dose_of(&drug_b)) {
                if da > 0.0 && db > 0.0 {
                    axis_a.insert(OrderedFloat(da));
                    axis_b.insert(OrderedFloat(db));
                }
            }
        }
    }
    let doses_a: Vec<f64> = axis_a.into_iter().map(|d| d.0).collect();
    let doses_b: Vec<f64> = axis_b.into_iter().map(|d| d.0).collect();

    // effects share one scale: span from the singles' undosed anchor down to e_max
    let baseline = nan_median(&[model_a.params().top, model_b.params().top]);
    let e_max = model_a.e_max;
    let span = baseline - e_max;

    let mut observed = vec![vec![f64::NAN; doses_b.len()]; doses_a.len()];
    for combo in combos {
        for (solution, &score) in combo.conditions.iter().zip(combo.scores.iter()) {
            let (da, db) = match (solution.dose_of(&drug_a), solution.dose_of(&drug_b)) {
                (Some(da), Some(db)) if da > 0.0 && db > 0.0 => (da, db),
                _ => continue,
            };
            let ia = doses_a.iter().position(|&d| d == da);
            let ib = doses_b.iter().position(|&d| d == db);
            if let (Some(ia), Some(ib)) = (ia, ib) {
                observed[ia][ib] = (baseline - score) / span;
            }
        }
    }

    let mut expected = vec![vec![f64::NAN; doses_b.len()]; doses_a.len()];
    let mut synergy = vec![vec![f64::NAN; doses_b.len()]; doses_a.len()];
    for (ia, &da) in doses_a.iter().enumerate() {
        for (ib, &db) in doses_b.iter().enumerate() {
            let e = bliss(model_a.effect_at(da), model_b.effect_at(db));
            expected[ia][ib] = e;
            synergy[ia][ib] = observed[ia][ib] - e;
        }
    }

    debug!(
        "{} + {}: {}×{} checkerboard grid",
        drug_a,
        drug_b,
        doses_a.len(),
        doses_b.len()
    );
    CheckerboardAnalysis { drug_a, drug_b, doses_a, doses_b, observed, expected, synergy }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Cocktail, Conversions, Solution};
    use crate::dose_response::Ll4;
    use approx::assert_relative_eq;

    #[test]
    fn bliss_expectation() {
        assert_relative_eq!(bliss(0.3, 0.4), 0.58);
        assert_relative_eq!(bliss(0.0, 0.4), 0.4);
        assert_relative_eq!(bliss(1.0, 0.4), 1.0);
    }

    fn single_model(drug: &str, ec50: f64) -> Model {
        let truth = Ll4 { top: 100.0, bottom: 0.0, log_ec50: ec50.log10(), hill: 1.0 };
        let mut conditions = Vec::new();
        let mut scores = Vec::new();
        for mult in [0.01, 0.1, 1.0, 10.0, 100.0] {
            let x = ec50 * mult;
            conditions.push(
                Solution::parse(&format!("{} {}μM", drug, x), &Conversions::new()).unwrap(),
            );
            scores.push(truth.response(x));
        }
        Model::fit(conditions, scores, Cocktail::single(drug), 0.0)
    }

    #[test]
    fn grid_covers_combination_conditions() {
        let model_a = single_model("Alpha", 10.0);
        let model_b = single_model("Beta", 20.0);

        let mut conditions = Vec::new();
        let mut scores = Vec::new();
        for (da, db, score) in [(5.0, 10.0, 40.0), (5.0, 20.0, 25.0), (10.0, 10.0, 30.0)] {
            conditions.push(
                Solution::parse(
                    &format!("Alpha {}μM + Beta {}μM", da, db),
                    &Conversions::new(),
                )
                .unwrap(),
            );
            scores.push(score);
        }
        let cocktail = Cocktail::new(["Alpha".to_string(), "Beta".to_string()]);
        let combo = Model::fit(conditions, scores, cocktail, 0.0);

        let analysis = analyze_checkerboard(&model_a, &model_b, &[&combo]);
        assert_eq!(analysis.doses_a, vec![5.0, 10.0]);
        assert_eq!(analysis.doses_b, vec![10.0, 20.0]);
        // (10, 20) was never measured
        assert!(analysis.observed[1][1].is_nan());
        assert!(analysis.observed[0][0].is_finite());
        // every expected cell comes from the fitted singles
        assert!(analysis.expected.iter().flatten().all(|e| e.is_finite()));
        // synergy is observed minus expected where observed exists
        let diff = analysis.observed[0][0] - analysis.expected[0][0];
        assert_relative_eq!(analysis.synergy[0][0], diff);
    }
}
