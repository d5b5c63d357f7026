//! Output locations and artifact naming.
//!
//! The output directory and the per-run uniqueness token are passed in
//! explicitly (rather than read from a global config and the wall clock at
//! the point of use), so tests can assert exact filenames.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonically-varying token appended to artifact filenames so repeated
/// runs never overwrite each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunToken(String);

impl RunToken {
    pub fn new(token: impl Into<String>) -> Self {
        RunToken(token.into())
    }

    /// Token derived from the wall clock, for normal CLI runs.
    pub fn from_clock() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        RunToken((millis % 1_620_000_000_000).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which rescale window (if any) a schematic was rendered with; drives the
/// filename suffix and the chart title.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTag {
    /// Raw scores, default ceiling.
    None,
    /// Raw scores on a compressed (log-style) ceiling below 100.
    Log,
    /// Rescaled against an absolute-brightness window.
    Absolute,
    /// Rescaled against the plate's own control window.
    Scaled,
}

impl ScaleTag {
    /// Classify from the rescale window and display ceiling.
    pub fn classify(scale: Option<(f64, f64)>, max_val: f64) -> ScaleTag {
        if max_val < 100.0 {
            ScaleTag::Log
        } else {
            match scale {
                None => ScaleTag::None,
                Some((_, max)) if max > 10_000.0 => ScaleTag::Absolute,
                Some(_) => ScaleTag::Scaled,
            }
        }
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            ScaleTag::None => "",
            ScaleTag::Log => "_log",
            ScaleTag::Absolute => "_absolute",
            ScaleTag::Scaled => "_scaled",
        }
    }

    pub fn title_suffix(&self) -> &'static str {
        match self {
            ScaleTag::None => "",
            ScaleTag::Log => ", Log",
            ScaleTag::Absolute => ", Absolute",
            ScaleTag::Scaled => ", Scaled",
        }
    }
}

/// Where artifacts land and how they are named.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub token: RunToken,
    /// Presentation mode: enlarged fonts in rendered artifacts.
    pub talk: bool,
}

impl OutputConfig {
    pub fn new(dir: impl AsRef<Path>, token: RunToken) -> Self {
        OutputConfig { dir: dir.as_ref().to_path_buf(), token, talk: false }
    }

    pub fn schematic_path(&self, plate_info: &str, well_count: usize, tag: ScaleTag) -> PathBuf {
        self.dir.join(format!(
            "{}_{}-well_schematic_heatmap{}_{}.png",
            plate_info,
            well_count,
            tag.file_suffix(),
            self.token.as_str(),
        ))
    }

    pub fn chart_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.png", stem, self.token.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schematic_names_are_deterministic() {
        let output = OutputConfig::new("/tmp/out", RunToken::new("42"));
        assert_eq!(
            output.schematic_path("plateA", 96, ScaleTag::Scaled),
            PathBuf::from("/tmp/out/plateA_96-well_schematic_heatmap_scaled_42.png")
        );
        assert_eq!(
            output.schematic_path("plateA", 96, ScaleTag::None),
            PathBuf::from("/tmp/out/plateA_96-well_schematic_heatmap_42.png")
        );
    }

    #[test]
    fn scale_tag_classification() {
        assert_eq!(ScaleTag::classify(None, 100.0), ScaleTag::None);
        assert_eq!(ScaleTag::classify(None, 10.0), ScaleTag::Log);
        assert_eq!(ScaleTag::classify(Some((0.0, 50_000.0)), 100.0), ScaleTag::Absolute);
        assert_eq!(ScaleTag::classify(Some((20.0, 100.0)), 100.0), ScaleTag::Scaled);
    }
}
