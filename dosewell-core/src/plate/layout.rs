use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;

use crate::condition::{Conversions, Results, Solution};
use crate::error::UserError;
use crate::stats::rescale;

use super::format::PlateFormat;
use super::Schematic;

/// Options for one schematic layout pass.
pub struct LayoutOptions<'a> {
    pub conversions: &'a Conversions,
    /// Linear rescale window applied to every value before formatting.
    pub scale: Option<(f64, f64)>,
    pub well_count: usize,
    /// Display ceiling for unscaled values.
    pub max_val: f64,
}

/// An annotated response matrix ready for heatmap rendering.
///
/// `annotations` and `responses` are always rectangular; cells a ragged
/// schematic row never reached hold the empty-string / NaN sentinels.
#[derive(Clone, Debug)]
pub struct PlateMatrix {
    pub annotations: Vec<Vec<String>>,
    pub responses: Vec<Vec<f64>>,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// Top of the fixed color scale (1 when rescaled, `max_val` otherwise).
    pub vmax: f64,
    /// Percentage formatting (rescaled) vs raw-score formatting.
    pub percent: bool,
    /// Number of physical plates stacked vertically.
    pub plates: usize,
}

impl PlateMatrix {
    pub fn height(&self) -> usize {
        self.responses.len()
    }

    pub fn width(&self) -> usize {
        self.responses.first().map_or(0, Vec::len)
    }
}

fn abbrev_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Z])([A-Za-z])\w+\s?([\d./]+)?([A-Za-zμ ]+)?").expect("valid abbrev regex")
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Compact a raw condition label for in-cell annotation: drug names shrink
/// to their first two letters plus the concentration digits (units and
/// whitespace dropped), and multi-drug labels break at `+`.
pub fn compact_label(label: &str) -> String {
    let abbreviated = abbrev_re().replace_all(label, |caps: &regex::Captures| {
        format!(
            "{}{}{}",
            &caps[1],
            caps[2].to_lowercase(),
            caps.get(3).map_or("", |m| m.as_str()),
        )
    });
    let compact = whitespace_re().replace_all(&abbreviated, "");
    compact.replace('+', "+\n")
}

/// Lay a schematic and its results out as an annotated response matrix.
///
/// The results mapping is copied into per-condition queues before any
/// consumption, so the caller's mapping is untouched and stays usable for
/// downstream modeling. Each populated cell pops one measurement from its
/// condition's queue; a dry (or unknown) condition is a [`UserError`] naming
/// the offending label and its parsed dose tokens.
pub fn build_matrix(
    schematic: &Schematic,
    results: &Results,
    opts: &LayoutOptions,
) -> Result<PlateMatrix, UserError> {
    let rows: Vec<&Vec<String>> = schematic.iter().filter(|row| !row.is_empty()).collect();
    if rows.is_empty() {
        return Err(UserError::EmptySchematic);
    }
    let height = rows.len();
    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let format = PlateFormat::for_well_count(opts.well_count)?;

    let (vmax, percent) = match opts.scale {
        Some(_) => (1.0, true),
        None => (opts.max_val, false),
    };

    // Working copy: consumption is destructive, the caller's mapping is not.
    let mut queues: BTreeMap<Solution, VecDeque<f64>> = results
        .iter()
        .map(|(solution, values)| {
            let values = values
                .iter()
                .map(|&v| match opts.scale {
                    Some((min, max)) => rescale(v, min, max),
                    None => v,
                })
                .collect();
            (solution.clone(), values)
        })
        .collect();

    let mut annotations = vec![vec![String::new(); width]; height];
    let mut responses = vec![vec![f64::NAN; width]; height];

    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, label) in row.iter().enumerate() {
            let solution = Solution::parse(label, opts.conversions)?;
            let value = queues
                .get_mut(&solution)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| UserError::ConditionNotFound {
                    label: solution.to_string(),
                    tokens: solution.quoted_tokens(),
                })?;
            let formatted = if percent {
                format!("{:.0}%", value * 100.0)
            } else {
                format!("{:.0}", value)
            };
            annotations[row_idx][col_idx] = format!("{}\n{}", formatted, compact_label(label));
            responses[row_idx][col_idx] = value;
        }
    }

    let leftover: usize = queues.values().map(VecDeque::len).sum();
    if leftover > 0 {
        debug!("{} measurements left unconsumed after layout", leftover);
    }

    // Stack onto physical plates: one empty separator row per boundary,
    // interior row labels restarting on each sub-plate.
    let chunk = format.interior_height().max(1);
    let plates = height.div_ceil(chunk);
    for boundary in (1..plates).rev() {
        let idx = boundary * chunk;
        annotations.insert(idx, vec![String::new(); width]);
        responses.insert(idx, vec![f64::NAN; width]);
    }

    let plate_row_labels = format.interior_row_labels();
    let mut row_labels = Vec::new();
    for plate_idx in 0..plates {
        let rows_in_plate = chunk.min(height - plate_idx * chunk);
        row_labels.extend(plate_row_labels.iter().take(rows_in_plate).cloned());
        if plate_idx + 1 < plates {
            row_labels.push(String::new());
        }
    }

    let col_labels: Vec<String> = format.interior_col_labels().into_iter().take(width).collect();
    if col_labels.len() < width {
        warn!(
            "schematic is {} columns wide but the {}-well interior has only {}",
            width,
            opts.well_count,
            col_labels.len()
        );
    }

    Ok(PlateMatrix { annotations, responses, row_labels, col_labels, vmax, percent, plates })
}
