//! Per-cocktail dose-response modeling.

mod model;

pub use model::{Ll4, Model, CONVERGENCE_THRESHOLD};
