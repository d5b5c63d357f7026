use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The set of drug names in a solution, ignoring concentrations.
///
/// Drugs are kept sorted and deduplicated so any two solutions of the same
/// drugs — at any doses, written in any order — share a cocktail.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cocktail {
    drugs: Vec<String>,
}

impl Cocktail {
    pub fn new(drugs: impl IntoIterator<Item = String>) -> Self {
        let mut drugs: Vec<String> = drugs.into_iter().collect();
        drugs.sort();
        drugs.dedup();
        Cocktail { drugs }
    }

    pub fn single(drug: &str) -> Self {
        Cocktail { drugs: vec![drug.to_string()] }
    }

    pub fn drugs(&self) -> &[String] {
        &self.drugs
    }

    pub fn is_combo(&self) -> bool {
        self.drugs.len() >= 2
    }

    /// The first two drugs, for pairwise interaction analysis.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match self.drugs.as_slice() {
            [a, b, ..] => Some((a.as_str(), b.as_str())),
            _ => None,
        }
    }
}

impl Display for Cocktail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.drugs.join(" + "))
    }
}
