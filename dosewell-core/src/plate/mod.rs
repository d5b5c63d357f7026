//! Plate geometry and the schematic layout engine.

mod format;
mod layout;

pub use format::PlateFormat;
pub use layout::{build_matrix, compact_label, LayoutOptions, PlateMatrix};

/// A 2-D grid of raw condition labels as authored in the plate layout file.
/// Rows may be ragged; empty rows are pruned before layout.
pub type Schematic = Vec<Vec<String>>;
