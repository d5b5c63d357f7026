use std::collections::BTreeMap;

use log::debug;

use super::{Cocktail, Results, Solution};

/// Solutions partitioned by cocktail, membership in results-iteration order.
pub type DrugConditions = BTreeMap<Cocktail, Vec<Solution>>;

/// Partition every solution in the results mapping by its cocktail.
///
/// Membership order follows the results mapping's own (sorted, hence
/// dose-ascending) iteration order and is never re-sorted afterwards, so
/// repeated runs over the same results produce identical groupings.
pub fn group_by_cocktail(results: &Results) -> DrugConditions {
    let mut groups = DrugConditions::new();
    for solution in results.keys() {
        groups.entry(solution.cocktail()).or_default().push(solution.clone());
    }
    debug!(
        "grouped {} conditions into {} cocktails",
        results.len(),
        groups.len()
    );
    groups
}
