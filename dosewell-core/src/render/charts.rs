use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use plotters::prelude::*;

use crate::condition::Solution;
use crate::dose_response::Model;
use crate::interaction::DiamondAnalysis;
use crate::output::OutputConfig;

fn font_sizes(talk: bool) -> (u32, u32) {
    if talk {
        (32, 20)
    } else {
        (24, 15)
    }
}

fn slug(name: &str) -> String {
    name.replace(' ', "").replace('+', "-")
}

/// Render one cocktail's dose-response chart: raw replicate datapoints, the
/// fitted curve, and the EC50 marker, on the shared `[e_max, 100]` scale.
pub fn render_dose_response(
    model: &Model,
    datapoints: &BTreeMap<Solution, Vec<f64>>,
    scale: (f64, f64),
    name: &str,
    output: &OutputConfig,
) -> Result<PathBuf> {
    let path = output.chart_path(&slug(name));
    let (title_font, axis_font) = font_sizes(output.talk);

    let (range_lo, range_hi) = model.tested_range().unwrap_or((0.1, 1000.0));
    // zero-dose (control) datapoints anchor one decade below the lowest dose
    let zero_anchor = range_lo / 10.0;
    let x_min = zero_anchor / 2.0;
    let x_max = range_hi * 2.0;

    let observed: Vec<f64> = datapoints.values().flatten().copied().collect();
    let y_lo = observed
        .iter()
        .copied()
        .fold(scale.0.min(scale.1), f64::min)
        - 5.0;
    let y_hi = observed
        .iter()
        .copied()
        .fold(scale.0.max(scale.1), f64::max)
        + 5.0;

    let root = BitMapBackend::new(&path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} Dose-Response", model.condition_name()), ("sans-serif", title_font))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min..x_max).log_scale(), y_lo..y_hi)?;

    let units = model.x_units().to_string();
    chart
        .configure_mesh()
        .x_desc(format!("Concentration ({})", units))
        .y_desc("Score")
        .axis_desc_style(("sans-serif", axis_font))
        .draw()?;

    // fitted curve over log-spaced points
    let n_points = 200;
    let log_lo = x_min.log10();
    let log_hi = x_max.log10();
    let curve: Vec<(f64, f64)> = (0..=n_points)
        .map(|i| {
            let lc = log_lo + (log_hi - log_lo) * i as f64 / n_points as f64;
            let c = 10f64.powf(lc);
            (c, model.response_at(c))
        })
        .collect();
    chart
        .draw_series(LineSeries::new(curve, BLACK.stroke_width(2)))?
        .label("Fitted curve")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], BLACK.stroke_width(2)));

    let points: Vec<(f64, f64)> = datapoints
        .iter()
        .flat_map(|(solution, values)| {
            let x = solution.total_micromolar();
            let x = if x > 0.0 { x } else { zero_anchor };
            values.iter().filter(|v| v.is_finite()).map(move |&v| (x, v))
        })
        .collect();
    chart
        .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, RED.filled())))?
        .label("Replicates")
        .legend(|(x, y)| Circle::new((x + 6, y), 4, RED.filled()));

    let ec50 = model.effective_concentration(0.5);
    if ec50.is_finite() {
        chart
            .draw_series(LineSeries::new(
                vec![(ec50, y_lo), (ec50, y_hi)],
                MAGENTA.stroke_width(2),
            ))?
            .label("EC50")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], MAGENTA.stroke_width(2)));
    }

    chart.configure_series_labels().border_style(&BLACK).draw()?;
    root.present()?;
    drop(chart);
    drop(root);
    Ok(path)
}

/// Render a single shared diamond chart covering every analyzed combination,
/// on one consistent axis scale.
pub fn render_diamond(
    analyses: &[DiamondAnalysis],
    max_x: f64,
    max_y: f64,
    name: &str,
    output: &OutputConfig,
) -> Result<PathBuf> {
    let path = output.chart_path(&slug(name));
    let (title_font, axis_font) = font_sizes(output.talk);

    let root = BitMapBackend::new(&path, (900, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Combination Isobologram", ("sans-serif", title_font))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_x * 1.05, 0.0..max_y * 1.05)?;

    let (x_desc, y_desc) = analyses
        .first()
        .map(|a| {
            (format!("{} dose / EC50", a.drug_a), format!("{} dose / EC50", a.drug_b))
        })
        .unwrap_or_else(|| ("dose / EC50".to_string(), "dose / EC50".to_string()));
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", axis_font))
        .draw()?;

    // the additive diamond edge
    chart
        .draw_series(LineSeries::new(vec![(0.0, 1.0), (1.0, 0.0)], BLACK.stroke_width(2)))?
        .label("Additive")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], BLACK.stroke_width(2)));

    for (idx, analysis) in analyses.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.9);
        chart
            .draw_series(
                analysis
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 5, color.filled())),
            )?
            .label(analysis.label.clone())
            .legend(move |(x, y)| Circle::new((x + 6, y), 5, color.filled()));
    }

    chart.configure_series_labels().border_style(&BLACK).draw()?;
    root.present()?;
    drop(chart);
    drop(root);
    Ok(path)
}
