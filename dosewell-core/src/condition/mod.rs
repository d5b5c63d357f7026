//! The condition data model: doses, solutions, cocktails, and grouping.
//!
//! A well's textual condition label parses into a [`Solution`] (one or more
//! [`Dose`]s). Solutions that resolve to the same normalized dose sequence
//! compare equal regardless of how the label was written, so they key the
//! results mapping. A [`Cocktail`] is a solution's drug set with the
//! concentrations erased; it is the unit of dose-response modeling.

mod cocktail;
mod dose;
mod group;
mod solution;

pub use cocktail::Cocktail;
pub use dose::{Concentration, Dose};
pub use group::{group_by_cocktail, DrugConditions};
pub use solution::Solution;

use std::collections::BTreeMap;

use crate::error::UserError;

/// Label-to-replacement conversions, e.g. `ABC50` → `ABC 1mM`.
pub type Conversions = BTreeMap<String, String>;

/// Raw per-condition replicate scores as produced upstream (and as cached):
/// keyed by the label text, not yet resolved to [`Solution`]s.
pub type RawResults = BTreeMap<String, Vec<f64>>;

/// Resolved per-condition replicate scores, keyed by parsed [`Solution`].
pub type Results = BTreeMap<Solution, Vec<f64>>;

/// Resolve raw label-keyed results into solution-keyed results.
///
/// Textually different labels that normalize to the same solution have their
/// replicate lists concatenated, keeping the total well count intact.
pub fn resolve_results(raw: &RawResults, conversions: &Conversions) -> Result<Results, UserError> {
    let mut results = Results::new();
    for (label, values) in raw {
        let solution = Solution::parse(label, conversions)?;
        results.entry(solution).or_default().extend(values.iter().copied());
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_labels_merge() {
        let raw: RawResults = [
            ("Gent 1mM".to_string(), vec![10.0]),
            ("Gent 1000μM".to_string(), vec![20.0]),
        ]
        .into_iter()
        .collect();
        let results = resolve_results(&raw, &Conversions::new()).unwrap();
        assert_eq!(results.len(), 1);
        let values = results.values().next().unwrap();
        assert_eq!(values.len(), 2);
    }
}
