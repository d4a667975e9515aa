//! Two-curve energy plot of a bond-length scan
//!
//! PNG or SVG is chosen from the file extension; anything other than `.svg`
//! is rendered as a bitmap.

use color_eyre::eyre::{eyre, Result};
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

pub const X_LABEL: &str = "Bond length (Å)";
pub const Y_LABEL: &str = "Energy (Hartree)";
pub const GROUND_LABEL: &str = "Ground state (S0)";
pub const EXCITED_LABEL: &str = "First excited state (S1)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => PlotFormat::Svg,
            _ => PlotFormat::Png,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub caption: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        PlotStyle {
            caption: "CN potential energy curves (FCI)".to_string(),
            width: 1000,
            height: 700,
        }
    }
}

/// Reject series that cannot be drawn against the distance axis.
pub fn validate_series(distances: &[f64], ground: &[f64], excited: &[f64]) -> Result<()> {
    if distances.is_empty() {
        return Err(eyre!("Nothing to plot: the distance series is empty"));
    }
    if ground.len() != distances.len() || excited.len() != distances.len() {
        return Err(eyre!(
            "Series lengths differ: {} distances, {} ground, {} excited",
            distances.len(),
            ground.len(),
            excited.len()
        ));
    }
    if distances
        .iter()
        .chain(ground)
        .chain(excited)
        .any(|v| !v.is_finite())
    {
        return Err(eyre!("Plot data contains non-finite values"));
    }
    Ok(())
}

fn bounds<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

/// Axis ranges with a 5% margin on the energy axis.
fn axis_ranges(distances: &[f64], ground: &[f64], excited: &[f64]) -> ((f64, f64), (f64, f64)) {
    let (mut x_min, mut x_max) = bounds(distances.iter());
    let (y_min, y_max) = bounds(ground.iter().chain(excited));
    if x_max - x_min < 1e-12 {
        x_min -= 0.1;
        x_max += 0.1;
    }
    let margin = ((y_max - y_min) * 0.05).max(1e-3);
    ((x_min, x_max), (y_min - margin, y_max + margin))
}

pub fn plot_energy_curves(
    distances: &[f64],
    ground: &[f64],
    excited: &[f64],
    output_path: &Path,
    style: &PlotStyle,
) -> Result<()> {
    validate_series(distances, ground, excited)?;
    let size = (style.width, style.height);
    match PlotFormat::from_path(output_path) {
        PlotFormat::Svg => {
            let root = SVGBackend::new(output_path, size).into_drawing_area();
            draw_chart(&root, distances, ground, excited, &style.caption)?;
            root.present().map_err(|e| eyre!("{:?}", e))?;
        }
        PlotFormat::Png => {
            let root = BitMapBackend::new(output_path, size).into_drawing_area();
            draw_chart(&root, distances, ground, excited, &style.caption)?;
            root.present().map_err(|e| eyre!("{:?}", e))?;
        }
    }
    info!("Energy curves written to {}", output_path.display());
    Ok(())
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    distances: &[f64],
    ground: &[f64],
    excited: &[f64],
    caption: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(|e| eyre!("{:?}", e))?;
    let ((x_min, x_max), (y_min, y_max)) = axis_ranges(distances, ground, excited);

    let mut chart = ChartBuilder::on(root)
        .caption(caption, ("sans-serif", 26).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| eyre!("{:?}", e))?;

    chart
        .configure_mesh()
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .y_label_formatter(&|y| format!("{:.3}", y))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| eyre!("{:?}", e))?;

    let curves = [
        (ground, GROUND_LABEL, RGBColor(0, 102, 204)),
        (excited, EXCITED_LABEL, RGBColor(204, 51, 0)),
    ];
    for (values, label, color) in curves {
        let points: Vec<(f64, f64)> = distances.iter().cloned().zip(values.iter().cloned()).collect();
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .map_err(|e| eyre!("{:?}", e))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart
            .draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))
            .map_err(|e| eyre!("{:?}", e))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| eyre!("{:?}", e))?;
    Ok(())
}
