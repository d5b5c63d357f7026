use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;

use crate::interaction::CheckerboardAnalysis;
use crate::output::{OutputConfig, ScaleTag};
use crate::plate::PlateMatrix;

const CELL: i32 = 64;
const MARGIN_LEFT: i32 = 70;
const MARGIN_TOP: i32 = 90;
const MARGIN_RIGHT: i32 = 140;
const MARGIN_BOTTOM: i32 = 30;

/// An annotated, color-mapped grid with row/column labels and a two-tick
/// colorbar. Both the plate schematic and the checkerboard chart render
/// through this.
struct GridSpec<'a> {
    values: &'a [Vec<f64>],
    annotations: Option<&'a [Vec<String>]>,
    row_labels: &'a [String],
    col_labels: &'a [String],
    vmin: f64,
    vmax: f64,
    title: &'a str,
    colorbar_label: &'a str,
    percent: bool,
    talk: bool,
}

fn format_tick(value: f64, percent: bool) -> String {
    if percent {
        format!("{:.0}%", value * 100.0)
    } else {
        format!("{:.0}", value)
    }
}

fn render_grid(spec: &GridSpec, path: &Path) -> Result<()> {
    let rows = spec.values.len() as i32;
    let cols = spec.values.first().map_or(0, Vec::len) as i32;
    let width = (MARGIN_LEFT + cols * CELL + MARGIN_RIGHT) as u32;
    let height = (MARGIN_TOP + rows * CELL + MARGIN_BOTTOM) as u32;

    let base_font: i32 = if spec.talk { 18 } else { 13 };
    let title_font: u32 = if spec.talk { 30 } else { 22 };

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let centered = Pos::new(HPos::Center, VPos::Center);
    let label_style =
        ("sans-serif", base_font as u32).into_font().color(&BLACK).pos(centered);
    root.draw(&Text::new(
        spec.title.to_string(),
        (width as i32 / 2, MARGIN_TOP / 3),
        ("sans-serif", title_font).into_font().color(&BLACK).pos(centered),
    ))?;

    // column labels anchored above the grid, row labels to its left
    for (col, label) in spec.col_labels.iter().enumerate() {
        let x = MARGIN_LEFT + col as i32 * CELL + CELL / 2;
        root.draw(&Text::new(label.clone(), (x, MARGIN_TOP - base_font), label_style.clone()))?;
    }
    for (row, label) in spec.row_labels.iter().enumerate() {
        let y = MARGIN_TOP + row as i32 * CELL + CELL / 2;
        root.draw(&Text::new(label.clone(), (MARGIN_LEFT / 2, y), label_style.clone()))?;
    }

    let span = spec.vmax - spec.vmin;
    for (row, row_values) in spec.values.iter().enumerate() {
        for (col, &value) in row_values.iter().enumerate() {
            if !value.is_finite() {
                continue;
            }
            let x0 = MARGIN_LEFT + col as i32 * CELL;
            let y0 = MARGIN_TOP + row as i32 * CELL;
            let t = ((value - spec.vmin) / span).clamp(0.0, 1.0);
            let color = ViridisRGB.get_color(t as f32);
            // 1px inset leaves a white grid line between cells
            root.draw(&Rectangle::new(
                [(x0 + 1, y0 + 1), (x0 + CELL - 1, y0 + CELL - 1)],
                color.filled(),
            ))?;
            if let Some(annotations) = spec.annotations {
                let text_color = if t > 0.6 { BLACK } else { WHITE };
                let style = ("sans-serif", base_font as u32)
                    .into_font()
                    .color(&text_color)
                    .pos(centered);
                let lines: Vec<&str> = annotations[row][col].lines().collect();
                let line_height = base_font + 2;
                let mut y = y0 + CELL / 2 - (lines.len() as i32 - 1) * line_height / 2;
                for line in lines {
                    root.draw(&Text::new(line.to_string(), (x0 + CELL / 2, y), style.clone()))?;
                    y += line_height;
                }
            }
        }
    }

    // colorbar with ticks at the scale extremes only
    let bar_x = MARGIN_LEFT + cols * CELL + 30;
    let bar_height = rows * CELL;
    for offset in 0..bar_height {
        let t = 1.0 - offset as f64 / bar_height as f64;
        let color = ViridisRGB.get_color(t as f32);
        root.draw(&Rectangle::new(
            [(bar_x, MARGIN_TOP + offset), (bar_x + 20, MARGIN_TOP + offset + 1)],
            color.filled(),
        ))?;
    }
    let tick_style = ("sans-serif", base_font as u32)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    root.draw(&Text::new(
        format_tick(spec.vmax, spec.percent),
        (bar_x + 26, MARGIN_TOP),
        tick_style.clone(),
    ))?;
    root.draw(&Text::new(
        format_tick(spec.vmin, spec.percent),
        (bar_x + 26, MARGIN_TOP + bar_height),
        tick_style,
    ))?;
    root.draw(&Text::new(
        spec.colorbar_label.to_string(),
        (bar_x + 60, MARGIN_TOP + bar_height / 2),
        ("sans-serif", base_font as u32)
            .into_font()
            .color(&BLACK)
            .pos(centered)
            .transform(FontTransform::Rotate270),
    ))?;

    root.present()?;
    Ok(())
}

/// Render a plate schematic heatmap; returns the artifact path.
pub fn render_plate_heatmap(
    matrix: &PlateMatrix,
    plate_info: &str,
    well_count: usize,
    tag: ScaleTag,
    output: &OutputConfig,
) -> Result<PathBuf> {
    let path = output.schematic_path(plate_info, well_count, tag);
    let title = format!(
        "{} {}-well Plate Schematic{}",
        plate_info,
        well_count,
        tag.title_suffix()
    );
    let colorbar_label = if matrix.percent { "Remaining Brightness" } else { "Pipeline Score" };
    render_grid(
        &GridSpec {
            values: &matrix.responses,
            annotations: Some(&matrix.annotations),
            row_labels: &matrix.row_labels,
            col_labels: &matrix.col_labels,
            vmin: 0.0,
            vmax: matrix.vmax,
            title: &title,
            colorbar_label,
            percent: matrix.percent,
            talk: output.talk,
        },
        &path,
    )?;
    Ok(path)
}

/// Render a checkerboard synergy grid; returns the artifact path.
pub fn render_checkerboard(
    analysis: &CheckerboardAnalysis,
    plate_info: &str,
    output: &OutputConfig,
) -> Result<PathBuf> {
    let stem = format!("{}_checkerboard_{}-{}", plate_info, analysis.drug_a, analysis.drug_b);
    let path = output.chart_path(&stem);
    let title = format!("{} + {} Bliss Synergy", analysis.drug_a, analysis.drug_b);

    let annotations: Vec<Vec<String>> = analysis
        .synergy
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| if v.is_finite() { format!("{:+.2}", v) } else { String::new() })
                .collect()
        })
        .collect();
    let row_labels: Vec<String> =
        analysis.doses_a.iter().map(|d| format!("{:.3}", d)).collect();
    let col_labels: Vec<String> =
        analysis.doses_b.iter().map(|d| format!("{:.3}", d)).collect();

    render_grid(
        &GridSpec {
            values: &analysis.synergy,
            annotations: Some(&annotations),
            row_labels: &row_labels,
            col_labels: &col_labels,
            vmin: -1.0,
            vmax: 1.0,
            title: &title,
            colorbar_label: "Observed - Expected Effect",
            percent: false,
            talk: output.talk,
        },
        &path,
    )?;
    Ok(path)
}
