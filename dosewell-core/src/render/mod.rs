//! Rendered artifacts: plate heatmaps, dose-response charts, diamond and
//! checkerboard charts. All output is PNG via plotters' bitmap backend.

mod charts;
mod heatmap;

pub use charts::{render_diamond, render_dose_response};
pub use heatmap::{render_checkerboard, render_plate_heatmap};
