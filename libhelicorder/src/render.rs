//! Drum (helicorder) layout.
//!
//! A day of one channel is cut into rows of `interval` minutes. Row k starts at
//! `00:00 + k * interval` and is drawn at height `lines - k`, so the first row of the day sits
//! at the top of the figure. Every trace is normalized by one shared factor so that amplitudes
//! compare across rows.
//!
//! Layout is a pure transform from a stream to a [`Helicorder`]; painting goes through the
//! [`Surface`] trait so that the same layout can be rasterised or inspected.
use time::{Date, OffsetDateTime};

use super::channel_id::ChannelId;
use super::constants::{MINUTES_PER_DAY, MINUTES_PER_HOUR, PALETTE_CYCLE, X_MAJOR_DIVISIONS};
use super::error::RenderError;
use super::palette::{Palette, Rgb, Style};
use super::stream::{offset_seconds, start_of_day, Stream};

/// Figure geometry in inches at a given resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Figure {
    pub width: f64,
    pub height: f64,
    pub dpi: u32,
}

impl Default for Figure {
    fn default() -> Self {
        Self {
            width: 9.0,
            height: 11.0,
            dpi: 100,
        }
    }
}

impl Figure {
    /// Size of the raster in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width * self.dpi as f64).round() as u32,
            (self.height * self.dpi as f64).round() as u32,
        )
    }

    /// Scale for fonts and margins relative to a 100 dpi figure
    pub fn scale(&self) -> f64 {
        self.dpi as f64 / 100.0
    }
}

/// Explicit per-render drawing state. Each render owns one; nothing is shared between renders.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderContext {
    pub palette: Palette,
    pub style: Style,
    pub figure: Figure,
}

/// Numeric parameters of a helicorder layout
#[derive(Debug, Clone, PartialEq)]
pub struct HelicorderParams {
    /// Minutes per row. Must divide an hour evenly.
    pub interval: u32,
    /// Normalization floor
    pub norm_factor: f64,
    /// Text describing the applied filters, used in the title
    pub filter_description: String,
}

/// A plot axis: fixed domain, major ticks with labels and unlabelled minor ticks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub major: Vec<f64>,
    pub minor: Vec<f64>,
    /// One label per major tick
    pub labels: Vec<String>,
}

impl Axis {
    /// Label of the major tick at `value`, if there is one
    pub fn label_at(&self, value: f64) -> Option<&str> {
        self.major
            .iter()
            .position(|tick| (tick - value).abs() < 1.0e-6)
            .and_then(|idx| self.labels.get(idx))
            .map(|label| label.as_str())
    }
}

/// One interval of the day
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Position in the day, 0 for the row starting at 00:00
    pub index: usize,
    pub y_offset: f64,
    pub color: Rgb,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    /// One polyline per segment in the row, as (minutes since row start, y) points
    pub traces: Vec<Vec<(f64, f64)>>,
}

impl Row {
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

/// A fully laid out helicorder, ready to paint
#[derive(Debug, Clone, PartialEq)]
pub struct Helicorder {
    pub id: ChannelId,
    pub day: Date,
    pub title: String,
    pub lines: usize,
    pub norm_factor: f64,
    pub rows: Vec<Row>,
    pub x_axis: Axis,
    pub y_axis: Axis,
}

/// A 2-D drawing target
pub trait Surface {
    fn set_title(&mut self, title: &str);
    fn set_x_axis(&mut self, axis: &Axis);
    fn set_y_axis(&mut self, axis: &Axis);
    fn plot_line(&mut self, points: &[(f64, f64)], color: Rgb);
}

fn format_minutes(value: f64) -> String {
    if (value - value.round()).abs() < 1.0e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn x_axis(interval: u32) -> Axis {
    let step = interval as f64 / X_MAJOR_DIVISIONS;
    let major: Vec<f64> = (0..=X_MAJOR_DIVISIONS as usize)
        .map(|idx| idx as f64 * step)
        .collect();
    let labels = major.iter().map(|v| format_minutes(*v)).collect();
    Axis {
        min: 0.0,
        max: interval as f64,
        major,
        minor: (0..=interval).map(|m| m as f64).collect(),
        labels,
    }
}

fn y_axis(interval: u32, lines: usize) -> Axis {
    let step = (MINUTES_PER_HOUR / interval) as usize;
    let major: Vec<f64> = (step..=lines).step_by(step).map(|v| v as f64).collect();
    // The lowest tick marks the last hour of the day
    let n_labels = major.len();
    let labels = (0..n_labels)
        .map(|idx| format!("{:02}:00", n_labels - 1 - idx))
        .collect();
    Axis {
        min: 0.0,
        max: (lines + 1) as f64,
        major,
        minor: (0..=lines + 1).map(|v| v as f64).collect(),
        labels,
    }
}

/// Lay out one day of a single-channel stream.
///
/// The day becomes exactly `1440 / interval` rows. Row k covers
/// `[00:00 + k * interval, 00:00 + (k + 1) * interval)` and sits at `y = lines - k`, so the
/// midnight row is at the top and y = 0 stays an empty margin below the last row of the day.
///
/// Fails with [`RenderError::EmptyStream`] for an empty stream and
/// [`RenderError::MixedChannels`] when more than one channel is present. Rows with no data
/// are kept, with no traces.
pub fn layout(
    stream: &Stream,
    day: Date,
    params: &HelicorderParams,
    context: &RenderContext,
) -> Result<Helicorder, RenderError> {
    let ids = stream.channel_ids();
    let id = match ids.as_slice() {
        [] => return Err(RenderError::EmptyStream),
        [id] => id.clone(),
        [first, second, ..] => {
            return Err(RenderError::MixedChannels(
                first.to_string(),
                second.to_string(),
            ))
        }
    };

    let norm_factor = f64::max(params.norm_factor, stream.max_abs());
    let lines = (MINUTES_PER_DAY / params.interval) as usize;
    let interval_seconds = params.interval as f64 * 60.0;
    let colors = context.palette.cycle(lines, PALETTE_CYCLE);
    let day_start = start_of_day(day);

    let mut rows = Vec::with_capacity(lines);
    for (index, color) in colors.into_iter().enumerate() {
        let start = offset_seconds(day_start, index as f64 * interval_seconds);
        let end = offset_seconds(start, interval_seconds);
        let y_offset = (lines - index) as f64;
        let traces = stream
            .slice(start, end)
            .iter()
            .map(|segment| {
                segment
                    .times_from(start)
                    .zip(segment.samples.iter())
                    .map(|(t, s)| (t / 60.0, s / norm_factor + y_offset))
                    .collect::<Vec<(f64, f64)>>()
            })
            .collect();
        rows.push(Row {
            index,
            y_offset,
            color,
            start,
            end,
            traces,
        });
    }

    let n_empty = rows.iter().filter(|row| row.is_empty()).count();
    if n_empty > 0 {
        spdlog::warn!("{} of {} rows for {} on {} have no data", n_empty, lines, id, day);
    }

    Ok(Helicorder {
        title: format!("{} - {} - {}", id, day, params.filter_description),
        id,
        day,
        lines,
        norm_factor,
        rows,
        x_axis: x_axis(params.interval),
        y_axis: y_axis(params.interval, lines),
    })
}

/// Paint a laid out helicorder onto a surface
pub fn draw<S: Surface>(surface: &mut S, helicorder: &Helicorder) {
    surface.set_title(&helicorder.title);
    surface.set_x_axis(&helicorder.x_axis);
    surface.set_y_axis(&helicorder.y_axis);
    for row in helicorder.rows.iter() {
        for trace in row.traces.iter() {
            surface.plot_line(trace, row.color);
        }
    }
}

/// Lay out and paint in one step, returning the layout
pub fn render<S: Surface>(
    surface: &mut S,
    stream: &Stream,
    day: Date,
    params: &HelicorderParams,
    context: &RenderContext,
) -> Result<Helicorder, RenderError> {
    let helicorder = layout(stream, day, params, context)?;
    draw(surface, &helicorder);
    Ok(helicorder)
}
