use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint, Ranged};
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::error::RenderError;
use super::palette::Rgb;
use super::render::{Axis, RenderContext, Surface};

fn backend_error<E: std::fmt::Display>(error: E) -> RenderError {
    RenderError::Backend(error.to_string())
}

fn to_rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

/// A linear f64 coordinate whose grid sits exactly on an [`Axis`]'s ticks.
///
/// Bold grid lines and labels come from the major ticks, light grid lines from the minor
/// ticks.
#[derive(Debug, Clone)]
struct TickedRange {
    min: f64,
    max: f64,
    major: Vec<f64>,
    minor: Vec<f64>,
}

impl From<&Axis> for TickedRange {
    fn from(axis: &Axis) -> Self {
        Self {
            min: axis.min,
            max: axis.max,
            major: axis.major.clone(),
            minor: axis.minor.clone(),
        }
    }
}

impl Ranged for TickedRange {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return limit.0;
        }
        let fraction = (value - self.min) / span;
        limit.0 + ((limit.1 - limit.0) as f64 * fraction + 1.0e-3).floor() as i32
    }

    fn key_points<Hint: KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        if hint.weight().allow_light_points() {
            self.minor.clone()
        } else {
            self.major.clone()
        }
    }

    fn range(&self) -> Range<f64> {
        self.min..self.max
    }
}

/// A PNG figure drawn with plotters.
///
/// Drawing calls are buffered; nothing touches the disk until [`PlotSurface::present`].
#[derive(Debug)]
pub struct PlotSurface {
    path: PathBuf,
    context: RenderContext,
    title: String,
    x_axis: Axis,
    y_axis: Axis,
    lines: Vec<(Vec<(f64, f64)>, Rgb)>,
}

impl PlotSurface {
    pub fn new(path: &Path, context: &RenderContext) -> Self {
        Self {
            path: path.to_path_buf(),
            context: *context,
            title: String::new(),
            x_axis: Axis::default(),
            y_axis: Axis::default(),
            lines: Vec::new(),
        }
    }

    /// Rasterise everything drawn so far and write the image
    pub fn present(&self) -> Result<(), RenderError> {
        let figure = self.context.figure;
        let scale = figure.scale();
        let background = to_rgb(self.context.style.background);
        let foreground = to_rgb(self.context.style.foreground);
        let scaled = |v: f64| (v * scale).round() as i32;

        let root = BitMapBackend::new(&self.path, figure.pixel_size()).into_drawing_area();
        root.fill(&background).map_err(backend_error)?;

        let x = &self.x_axis;
        let y = &self.y_axis;
        let mut chart = ChartBuilder::on(&root)
            .caption(
                &self.title,
                ("sans-serif", 16.0 * scale).into_font().color(&foreground),
            )
            .margin(scaled(10.0))
            .set_label_area_size(LabelAreaPosition::Left, scaled(50.0))
            .set_label_area_size(LabelAreaPosition::Bottom, scaled(40.0))
            .build_cartesian_2d(TickedRange::from(x), TickedRange::from(y))
            .map_err(backend_error)?;

        let x_label = |v: &f64| x.label_at(*v).unwrap_or_default().to_string();
        let y_label = |v: &f64| y.label_at(*v).unwrap_or_default().to_string();
        chart
            .configure_mesh()
            .x_labels(x.major.len())
            .y_labels(y.major.len())
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
            .x_desc("Minutes")
            .y_desc("Time (UTC)")
            .axis_style(foreground)
            .bold_line_style(foreground.mix(0.25))
            .light_line_style(foreground.mix(0.08))
            .label_style(("sans-serif", 12.0 * scale).into_font().color(&foreground))
            .draw()
            .map_err(backend_error)?;

        for (points, color) in self.lines.iter() {
            chart
                .draw_series(LineSeries::new(points.iter().copied(), to_rgb(*color)))
                .map_err(backend_error)?;
        }

        root.present().map_err(backend_error)?;
        spdlog::debug!("Wrote {}", self.path.to_string_lossy());
        Ok(())
    }
}

impl Surface for PlotSurface {
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_x_axis(&mut self, axis: &Axis) {
        self.x_axis = axis.clone();
    }

    fn set_y_axis(&mut self, axis: &Axis) {
        self.y_axis = axis.clone();
    }

    fn plot_line(&mut self, points: &[(f64, f64)], color: Rgb) {
        if !points.is_empty() {
            self.lines.push((points.to_vec(), color));
        }
    }
}
