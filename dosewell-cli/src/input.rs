//! File-backed measurement and schematic sources.
//!
//! The analyzer proper (image acquisition, per-well brightness extraction)
//! lives outside this tool; here its contract is satisfied from files: a
//! JSON measurement dump (`label -> [scores]`) and a CSV plate schematic.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use regex::Regex;

use dosewell_core::pipeline::{AnalyzeRequest, MeasurementSource};
use dosewell_core::plate::Schematic;
use dosewell_core::{RawResults, UserError};

pub struct FileMeasurementSource {
    pub measurements: PathBuf,
    pub absolute_measurements: Option<PathBuf>,
}

/// `scores.json` → `scores_absolute.json`, next to the original.
pub fn absolute_sibling(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("measurements");
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    path.with_file_name(format!("{}_absolute.{}", stem, extension))
}

impl FileMeasurementSource {
    fn read_results(&self, path: &Path, request: &AnalyzeRequest) -> Result<RawResults, UserError> {
        let text = fs::read_to_string(path).map_err(|e| UserError::io(path, e))?;
        let raw: RawResults =
            serde_json::from_str(&text).map_err(|e| UserError::MalformedFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let pattern =
            Regex::new(&request.group_pattern).map_err(|e| UserError::BadGroupPattern {
                pattern: request.group_pattern.clone(),
                reason: e.to_string(),
            })?;
        Ok(raw
            .into_iter()
            .filter(|(label, _)| {
                pattern.is_match(label) && !request.plate_ignore.contains(label)
            })
            .collect())
    }
}

impl MeasurementSource for FileMeasurementSource {
    fn analyze(&self, request: &AnalyzeRequest) -> Result<RawResults, UserError> {
        self.read_results(&self.measurements, request)
    }

    fn analyze_absolute(&self, request: &AnalyzeRequest) -> Result<RawResults, UserError> {
        let path = self
            .absolute_measurements
            .clone()
            .unwrap_or_else(|| absolute_sibling(&self.measurements));
        self.read_results(&path, request)
    }

    fn schematic(&self, request: &AnalyzeRequest) -> Result<Schematic, UserError> {
        let path = match &request.platefile {
            Some(path) => PathBuf::from(path),
            None => {
                return Err(UserError::MalformedFile {
                    path: PathBuf::from("<none>"),
                    reason: "no platefile supplied".to_string(),
                })
            }
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| UserError::MalformedFile { path: path.clone(), reason: e.to_string() })?;
        let mut schematic = Schematic::new();
        for record in reader.records() {
            let record = record.map_err(|e| UserError::MalformedFile {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let row: Vec<String> = record
                .iter()
                .map(str::trim)
                .filter(|cell| !cell.is_empty() && !request.plate_ignore.iter().any(|i| i == cell))
                .map(str::to_string)
                .collect();
            schematic.push(row);
        }
        debug!("read {} schematic rows from {}", schematic.len(), path.display());
        Ok(schematic)
    }

    fn context_name(&self) -> Option<String> {
        self.measurements
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_sibling_renames_stem() {
        assert_eq!(
            absolute_sibling(Path::new("/data/run1/scores.json")),
            PathBuf::from("/data/run1/scores_absolute.json")
        );
    }

    #[test]
    fn schematic_drops_empty_and_ignored_cells() {
        let dir = tempfile::tempdir().unwrap();
        let platefile = dir.path().join("plate.csv");
        fs::write(&platefile, "Gent 1mM,IGNORE,Gent 2mM\n,,\nB,B,\n").unwrap();

        let source = FileMeasurementSource {
            measurements: dir.path().join("scores.json"),
            absolute_measurements: None,
        };
        let request = AnalyzeRequest {
            platefile: Some(platefile.to_string_lossy().into_owned()),
            plate_ignore: vec!["IGNORE".to_string()],
            ..AnalyzeRequest::default()
        };
        let schematic = source.schematic(&request).unwrap();
        assert_eq!(schematic[0], vec!["Gent 1mM", "Gent 2mM"]);
        assert!(schematic[1].is_empty());
        assert_eq!(schematic[2], vec!["B", "B"]);
    }

    #[test]
    fn group_pattern_filters_labels() {
        let dir = tempfile::tempdir().unwrap();
        let measurements = dir.path().join("scores.json");
        fs::write(&measurements, r#"{"Gent 1mM": [50.0], "Neo 1mM": [60.0]}"#).unwrap();

        let source =
            FileMeasurementSource { measurements, absolute_measurements: None };
        let request =
            AnalyzeRequest { group_pattern: "^Gent".to_string(), ..AnalyzeRequest::default() };
        let results = source.analyze(&request).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("Gent 1mM"));
    }

    #[test]
    fn bad_group_pattern_is_user_error() {
        let dir = tempfile::tempdir().unwrap();
        let measurements = dir.path().join("scores.json");
        fs::write(&measurements, "{}").unwrap();
        let source =
            FileMeasurementSource { measurements, absolute_measurements: None };
        let request =
            AnalyzeRequest { group_pattern: "(".to_string(), ..AnalyzeRequest::default() };
        assert!(matches!(
            source.analyze(&request),
            Err(UserError::BadGroupPattern { .. })
        ));
    }
}
