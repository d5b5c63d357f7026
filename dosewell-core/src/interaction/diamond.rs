use log::warn;

use crate::dose_response::Model;

/// One combination's isobologram comparison: each combination dose pair
/// expressed in units of the constituent single-drug EC50s. Points on the
/// `x + y = 1` diagonal are additive; inside it, synergistic.
#[derive(Clone, Debug)]
pub struct DiamondAnalysis {
    pub label: String,
    pub drug_a: String,
    pub drug_b: String,
    /// `(dose_a / EC50_a, dose_b / EC50_b)` per combination condition.
    pub points: Vec<(f64, f64)>,
    pub max_x: f64,
    pub max_y: f64,
}

/// Compare a combination model against its two single-drug models.
///
/// Returns `None` when either single-drug EC50 is unreachable (nothing to
/// normalize against) or the combination has no dosed pairs; the caller
/// skips such combinations without error.
pub fn analyze_diamond(model_a: &Model, model_b: &Model, combo: &Model) -> Option<DiamondAnalysis> {
    let ec50_a = model_a.effective_concentration(0.5);
    let ec50_b = model_b.effective_concentration(0.5);
    if !ec50_a.is_finite() || !ec50_b.is_finite() {
        warn!(
            "{}: single-drug EC50 unreachable (a {}, b {}), skipping diamond analysis",
            combo.condition_name(),
            ec50_a,
            ec50_b
        );
        return None;
    }
    let drug_a = model_a.cocktail.drugs()[0].clone();
    let drug_b = model_b.cocktail.drugs()[0].clone();

    let points: Vec<(f64, f64)> = combo
        .conditions
        .iter()
        .filter_map(|solution| {
            let da = solution.dose_of(&drug_a)?;
            let db = solution.dose_of(&drug_b)?;
            (da > 0.0 && db > 0.0).then_some((da / ec50_a, db / ec50_b))
        })
        .collect();
    if points.is_empty() {
        return None;
    }

    // shared charts start from a unit diamond; extents only ever grow
    let max_x = points.iter().map(|p| p.0).fold(1.0, f64::max);
    let max_y = points.iter().map(|p| p.1).fold(1.0, f64::max);

    Some(DiamondAnalysis {
        label: combo.condition_name(),
        drug_a,
        drug_b,
        points,
        max_x,
        max_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Cocktail, Conversions, Solution};
    use crate::dose_response::Ll4;
    use approx::assert_relative_eq;

    fn single_model(drug: &str, ec50: f64) -> Model {
        let truth = Ll4 { top: 100.0, bottom: 0.0, log_ec50: ec50.log10(), hill: 1.0 };
        let mut conditions = Vec::new();
        let mut scores = Vec::new();
        for mult in [0.01, 0.1, 0.3, 1.0, 3.0, 10.0, 100.0] {
            let x = ec50 * mult;
            conditions.push(
                Solution::parse(&format!("{} {}μM", drug, x), &Conversions::new()).unwrap(),
            );
            scores.push(truth.response(x));
        }
        Model::fit(conditions, scores, Cocktail::single(drug), 0.0)
    }

    fn combo_model(pairs: &[(f64, f64)]) -> Model {
        let conditions: Vec<Solution> = pairs
            .iter()
            .map(|(da, db)| {
                Solution::parse(
                    &format!("Alpha {}μM + Beta {}μM", da, db),
                    &Conversions::new(),
                )
                .unwrap()
            })
            .collect();
        let scores = vec![50.0; conditions.len()];
        let cocktail = Cocktail::new(["Alpha".to_string(), "Beta".to_string()]);
        Model::fit(conditions, scores, cocktail, 0.0)
    }

    #[test]
    fn normalizes_against_single_ec50s() {
        let model_a = single_model("Alpha", 10.0);
        let model_b = single_model("Beta", 50.0);
        let combo = combo_model(&[(5.0, 25.0), (20.0, 100.0)]);

        let analysis = analyze_diamond(&model_a, &model_b, &combo).unwrap();
        assert_eq!(analysis.points.len(), 2);
        assert_relative_eq!(analysis.points[0].0, 0.5, epsilon = 0.1);
        assert_relative_eq!(analysis.points[0].1, 0.5, epsilon = 0.1);
        assert!(analysis.max_x >= 1.0);
        assert!(analysis.max_y >= analysis.points[1].1 - 1e-12);
    }

    #[test]
    fn no_dosed_pairs_is_none() {
        let model_a = single_model("Alpha", 10.0);
        let model_b = single_model("Beta", 50.0);
        // combination conditions dosed with entirely different drugs
        let conditions =
            vec![Solution::parse("Gamma 5μM + Delta 1μM", &Conversions::new()).unwrap()];
        let cocktail = Cocktail::new(["Gamma".to_string(), "Delta".to_string()]);
        let combo = Model::fit(conditions, vec![50.0], cocktail, 0.0);
        assert!(analyze_diamond(&model_a, &model_b, &combo).is_none());
    }
}
