//! Pairwise drug-interaction analysis.
//!
//! Two mutually exclusive modes, selected per run:
//! - diamond: single-combination isobologram comparison against the two
//!   single-drug models' EC50s;
//! - checkerboard: Bliss-independence grid over the full dose matrix, plus
//!   a bootstrap response-surface significance test.

mod checkerboard;
mod diamond;
mod surface;

pub use checkerboard::{analyze_checkerboard, bliss, CheckerboardAnalysis};
pub use diamond::{analyze_diamond, DiamondAnalysis};
pub use surface::{
    response_surface, squarify, try_response_surface, SurfaceConfig, SurfaceInputs, SurfaceVerdict,
};
