use log::debug;
use serde::{Deserialize, Serialize};

use crate::condition::{Cocktail, Solution};
use crate::stats::{nan_mean, nan_median};

/// Convergence threshold - below this residual, consider the fit converged.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-9;

const MAX_STEPS: usize = 4000;
const LINE_SEARCH_TRIES: usize = 40;

/// Four-parameter log-logistic curve.
///
/// Scores fall from `top` (undosed response) toward `bottom` (saturated
/// response) as concentration grows; `log_ec50` is the log10 midpoint and
/// `hill` the slope at it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Ll4 {
    pub top: f64,
    pub bottom: f64,
    pub log_ec50: f64,
    pub hill: f64,
}

impl Ll4 {
    pub fn response(&self, concentration: f64) -> f64 {
        if concentration <= 0.0 {
            return self.top;
        }
        let lc = concentration.log10();
        self.top
            + (self.bottom - self.top) / (1.0 + 10f64.powf(self.hill * (self.log_ec50 - lc)))
    }

    fn from_vec(v: [f64; 4]) -> Ll4 {
        Ll4 {
            top: v[0],
            bottom: v[1],
            log_ec50: v[2],
            // fits never flip orientation; the curve always decays with dose
            hill: v[3].max(0.05),
        }
    }

    fn to_vec(self) -> [f64; 4] {
        [self.top, self.bottom, self.log_ec50, self.hill]
    }
}

/// A fitted dose-response model for one cocktail.
///
/// Holds the ordered conditions it was fit from (controls prepended), their
/// summary scores, and the run's `e_max` reference (the score representing
/// 100% effect). Created once per non-control cocktail, never mutated.
#[derive(Clone, Debug)]
pub struct Model {
    pub cocktail: Cocktail,
    pub conditions: Vec<Solution>,
    pub scores: Vec<f64>,
    pub e_max: f64,
    params: Ll4,
}

impl Model {
    /// Fit a model from ordered conditions and their summary scores.
    ///
    /// Fitting is damped steepest descent on the sum of squared residuals
    /// with a backtracking line search; clean dose series converge in well
    /// under [`MAX_STEPS`] iterations, and degenerate inputs simply keep the
    /// best parameters seen.
    pub fn fit(conditions: Vec<Solution>, scores: Vec<f64>, cocktail: Cocktail, e_max: f64) -> Model {
        let points: Vec<(f64, f64)> = conditions
            .iter()
            .zip(scores.iter())
            .filter(|(_, score)| score.is_finite())
            .map(|(solution, &score)| (solution.total_micromolar(), score))
            .collect();

        let params = Self::train(&points, e_max);
        debug!(
            "{}: fitted top {:.2}, bottom {:.2}, log EC50 {:.3}, hill {:.3}",
            cocktail, params.top, params.bottom, params.log_ec50, params.hill
        );
        Model { cocktail, conditions, scores, e_max, params }
    }

    fn initial(points: &[(f64, f64)], e_max: f64) -> Ll4 {
        let zero_scores: Vec<f64> =
            points.iter().filter(|(x, _)| *x <= 0.0).map(|(_, y)| *y).collect();
        let all_scores: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
        let top = if zero_scores.is_empty() {
            all_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        } else {
            nan_mean(&zero_scores)
        };
        let bottom = if e_max.is_finite() {
            e_max
        } else {
            all_scores.iter().copied().fold(f64::INFINITY, f64::min)
        };
        let logs: Vec<f64> =
            points.iter().filter(|(x, _)| *x > 0.0).map(|(x, _)| x.log10()).collect();
        let log_ec50 = if logs.is_empty() { 0.0 } else { nan_median(&logs) };
        Ll4 { top, bottom, log_ec50, hill: 1.0 }
    }

    fn sse(params: &Ll4, points: &[(f64, f64)]) -> f64 {
        points
            .iter()
            .map(|&(x, y)| {
                let r = params.response(x) - y;
                r * r
            })
            .sum()
    }

    fn train(points: &[(f64, f64)], e_max: f64) -> Ll4 {
        let mut params = Self::initial(points, e_max);
        if points.len() < 2 {
            return params;
        }
        let mut error = Self::sse(&params, points);
        let mut step_size = 0.1;
        for step in 0..MAX_STEPS {
            if !error.is_finite() || error < CONVERGENCE_THRESHOLD {
                break;
            }
            // central-difference gradient
            let v = params.to_vec();
            let mut grad = [0.0; 4];
            for i in 0..4 {
                let h = (v[i].abs() * 1e-6).max(1e-8);
                let mut hi = v;
                hi[i] += h;
                let mut lo = v;
                lo[i] -= h;
                grad[i] =
                    (Self::sse(&Ll4::from_vec(hi), points) - Self::sse(&Ll4::from_vec(lo), points))
                        / (2.0 * h);
            }
            let magnitude = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            if magnitude == 0.0 || magnitude.is_nan() {
                debug!("  stopping at step {}: gradient magnitude {}", step, magnitude);
                break;
            }

            let mut improved = false;
            for _ in 0..LINE_SEARCH_TRIES {
                let mut candidate = v;
                for i in 0..4 {
                    candidate[i] -= grad[i] / magnitude * step_size;
                }
                let candidate = Ll4::from_vec(candidate);
                let candidate_error = Self::sse(&candidate, points);
                if candidate_error.is_finite() && candidate_error < error {
                    params = candidate;
                    error = candidate_error;
                    step_size *= 1.5;
                    improved = true;
                    break;
                }
                step_size *= 0.5;
            }
            if !improved {
                debug!("  stopping at step {}: no descent direction, error {}", step, error);
                break;
            }
        }
        params
    }

    pub fn params(&self) -> Ll4 {
        self.params
    }

    pub fn is_combo(&self) -> bool {
        self.cocktail.is_combo()
    }

    /// Display name of the condition this model covers.
    pub fn condition_name(&self) -> String {
        self.cocktail.to_string()
    }

    /// Unit token for the concentration axis, from the first dosed condition.
    pub fn x_units(&self) -> &str {
        self.conditions
            .iter()
            .map(|s| s.x_units())
            .find(|u| !u.is_empty())
            .unwrap_or("μM")
    }

    /// Smallest and largest nonzero tested concentrations.
    pub fn tested_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for solution in &self.conditions {
            let x = solution.total_micromolar();
            if x > 0.0 {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(x), hi.max(x)),
                    None => (x, x),
                });
            }
        }
        range
    }

    pub fn response_at(&self, concentration: f64) -> f64 {
        self.params.response(concentration)
    }

    /// Fraction of maximum effect at a concentration: 0 at the fitted top,
    /// 1 where the response reaches `e_max`.
    pub fn effect_at(&self, concentration: f64) -> f64 {
        let span = self.params.top - self.e_max;
        if span == 0.0 || !span.is_finite() {
            return f64::NAN;
        }
        (self.params.top - self.response_at(concentration)) / span
    }

    /// Concentration producing `level` (0..1) of the maximum effect, or NaN
    /// when that effect level is unreachable within the tested dose range.
    pub fn effective_concentration(&self, level: f64) -> f64 {
        let Ll4 { top, bottom, log_ec50, hill } = self.params;
        let span = top - self.e_max;
        if span == 0.0 || !span.is_finite() {
            return f64::NAN;
        }
        let (lo, hi) = match self.tested_range() {
            Some(range) => range,
            None => return f64::NAN,
        };
        let target = top - level * span;
        let f = (target - top) / (bottom - top);
        if !(f > 0.0 && f < 1.0) {
            return f64::NAN;
        }
        let lc = log_ec50 - ((1.0 - f) / f).log10() / hill;
        let c = 10f64.powf(lc);
        if !c.is_finite() || c < lo || c > hi {
            return f64::NAN;
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Conversions;
    use approx::assert_relative_eq;
    use test_log::test;

    fn synthetic_model() -> Model {
        // true curve: top 100, bottom 10, EC50 10μM, hill 1
        let truth = Ll4 { top: 100.0, bottom: 10.0, log_ec50: 1.0, hill: 1.0 };
        let mut conditions = vec![Solution::parse("Ctrl", &Conversions::new()).unwrap()];
        let mut scores = vec![100.0];
        for x in [0.1, 0.3, 1.0, 3.0, 10.0, 30.0, 100.0, 300.0] {
            let label = format!("Gent {}μM", x);
            conditions.push(Solution::parse(&label, &Conversions::new()).unwrap());
            scores.push(truth.response(x));
        }
        Model::fit(conditions, scores, Cocktail::single("Gent"), 10.0)
    }

    #[test]
    fn fit_recovers_midpoint() {
        let model = synthetic_model();
        let ec50 = model.effective_concentration(0.5);
        assert!(
            (ec50 - 10.0).abs() < 2.0,
            "EC50 {} should be near 10μM (params {:?})",
            ec50,
            model.params()
        );
    }

    #[test]
    fn ec_inversion_round_trips() {
        let model = synthetic_model();
        for level in [0.25, 0.5, 0.75] {
            let c = model.effective_concentration(level);
            assert!(c.is_finite(), "EC at level {} should be reachable", level);
            assert_relative_eq!(model.effect_at(c), level, epsilon = 1e-6);
        }
    }

    #[test]
    fn unreachable_level_is_nan() {
        let model = synthetic_model();
        // 99% of max effect needs ~1000μM; the series stops at 300μM
        assert!(model.effective_concentration(0.99).is_nan());
    }

    #[test]
    fn zero_dose_response_is_top() {
        let truth = Ll4 { top: 100.0, bottom: 0.0, log_ec50: 0.0, hill: 1.0 };
        assert_relative_eq!(truth.response(0.0), 100.0);
        assert_relative_eq!(truth.response(1.0), 50.0);
    }

    #[test]
    fn degenerate_input_keeps_initial_params() {
        let conditions = vec![Solution::parse("Gent 10μM", &Conversions::new()).unwrap()];
        let model = Model::fit(conditions, vec![50.0], Cocktail::single("Gent"), 10.0);
        // one point: nothing to descend on, but the model is still usable
        assert!(model.response_at(10.0).is_finite());
    }
}
