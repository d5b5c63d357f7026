use std::fmt::{self, Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{Conversions, Dose};
use crate::error::UserError;

/// A single well's treatment: one or more doses, parsed from a label whose
/// dose tokens are joined by `+`.
///
/// Identity is the normalized dose sequence — `Gent 1mM + Neo 10μM` and
/// `Gent 1000μM +Neo 10uM` are the same solution — so solutions key the
/// results mapping directly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Solution {
    pub doses: Vec<Dose>,
}

impl Solution {
    /// Parse a condition label. Each `+`-separated token is first looked up
    /// in the conversion table (symbolic labels like `ABC50` map to their
    /// concrete form there) and then parsed as a dose.
    pub fn parse(label: &str, conversions: &Conversions) -> Result<Solution, UserError> {
        let mut doses = Vec::new();
        for token in label.split('+') {
            let token = token.trim();
            if token.is_empty() {
                return Err(UserError::MalformedLabel {
                    label: label.to_string(),
                    reason: "empty dose token".to_string(),
                });
            }
            let token = conversions.get(token).map(String::as_str).unwrap_or(token);
            doses.push(Dose::parse(token)?);
        }
        Ok(Solution { doses })
    }

    pub fn drugs(&self) -> Vec<&str> {
        self.doses.iter().map(|d| d.drug.as_str()).collect()
    }

    pub fn cocktail(&self) -> super::Cocktail {
        super::Cocktail::new(self.doses.iter().map(|d| d.drug.clone()))
    }

    pub fn is_combo(&self) -> bool {
        self.doses.len() >= 2
    }

    /// Micromolar dose of the named drug, if this solution contains it.
    pub fn dose_of(&self, drug: &str) -> Option<f64> {
        self.doses.iter().find(|d| d.drug == drug).map(Dose::micromolar)
    }

    /// Total micromolar load across all doses (the x coordinate a
    /// combination contributes to its cocktail's dose-response curve).
    pub fn total_micromolar(&self) -> f64 {
        self.doses.iter().map(Dose::micromolar).sum()
    }

    /// Unit token of the first dosed component, for axis labeling.
    pub fn x_units(&self) -> &str {
        self.doses
            .iter()
            .find(|d| d.is_dosed())
            .map(|d| d.concentration.unit())
            .unwrap_or("")
    }

    /// The parsed dose tokens, quoted and comma-joined, for error messages.
    pub fn quoted_tokens(&self) -> String {
        self.doses.iter().map(|d| format!("\"{}\"", d)).join(", ")
    }
}

impl Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doses.iter().map(|d| d.to_string()).join(" + "))
    }
}
