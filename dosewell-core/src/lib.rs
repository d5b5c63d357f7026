//! Core analysis engine for plate-based brightness assays.
//!
//! Turns per-well measurements from multi-well plates into:
//! - spatially-faithful plate heatmaps (with multi-plate spillover),
//! - per-cocktail dose-response models with effective-concentration queries,
//! - pairwise drug-interaction analyses (diamond and checkerboard designs),
//!   including a bootstrap response-surface test for irregular designs.
//!
//! The [`pipeline`] module sequences everything; the remaining modules are
//! usable on their own.

pub mod cache;
pub mod condition;
pub mod dose_response;
pub mod error;
pub mod interaction;
pub mod output;
pub mod pipeline;
pub mod plate;
pub mod render;
pub mod stats;

// Re-export key types for external use
pub use cache::{CacheKey, ResultsCache};
pub use condition::{
    group_by_cocktail, resolve_results, Cocktail, Concentration, Conversions, Dose, RawResults,
    Results, Solution,
};
pub use dose_response::Model;
pub use error::{SurfaceError, UserError};
pub use interaction::{
    analyze_checkerboard, analyze_diamond, response_surface, CheckerboardAnalysis,
    DiamondAnalysis, SurfaceConfig, SurfaceVerdict,
};
pub use output::{OutputConfig, RunToken, ScaleTag};
pub use pipeline::{AnalyzeRequest, MeasurementSource, Pipeline, RunConfig, RunSummary};
pub use plate::{build_matrix, LayoutOptions, PlateFormat, PlateMatrix, Schematic};

/// Parse a log level string into LevelFilter.
pub fn parse_log_level(level: Option<&str>) -> log::LevelFilter {
    match level {
        Some("error") => log::LevelFilter::Error,
        Some("warn") => log::LevelFilter::Warn,
        Some("info") | Some("") | None => log::LevelFilter::Info,
        Some("debug") => log::LevelFilter::Debug,
        Some("trace") => log::LevelFilter::Trace,
        Some(level) => panic!("invalid log level: {}", level),
    }
}
