use core::fmt::Debug;
use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use dyn_clone::{DynClone, clone_trait_object};
use itertools::Itertools;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::{BenchmarkRecord, duplicate_groups, time_bounds};

/// Lower bound factor for the padded value axis
pub const AXIS_PAD_LOW: f64 = 0.95;
/// Upper bound factor for the padded value axis
pub const AXIS_PAD_HIGH: f64 = 1.05;

const FONT: &str = "sans-serif";

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("No benchmark records to plot")]
    EmptyDataset,
    #[error("Could not create plot directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Drawing {path:?} failed: {message}")]
    Draw { path: PathBuf, message: String },
}

fn draw_error(path: &Path, err: impl Display) -> PlotError {
    PlotError::Draw {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[typetag::serde(tag = "type")]
pub trait Plot: Debug + DynClone + Send + Sync {
    /// Name of the plot, for identification
    fn name(&self) -> &'static str;
    /// Renders the aggregated records to an image
    ///
    /// Arguments:
    /// * `records` - The aggregated records, in source order
    /// * `output` - Image file to write, its parent directories are created
    fn plot(&self, records: &[BenchmarkRecord], output: &Path) -> Result<(), PlotError>;
}
clone_trait_object!(Plot);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub legend_title: Option<String>,
}

/// Physical figure size, rendered at `dpi` pixels per inch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl Default for FigureSize {
    fn default() -> Self {
        Self {
            width_in: 8.0,
            height_in: 5.0,
            dpi: 300,
        }
    }
}

impl FigureSize {
    pub fn pixels(&self) -> (u32, u32) {
        let dpi = self.dpi as f64;
        (
            (self.width_in * dpi).round().max(1.0) as u32,
            (self.height_in * dpi).round().max(1.0) as u32,
        )
    }

    /// Typographic points to pixels
    pub fn pt(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }
}

/// `(min * 0.95, max * 1.05)` over `values`
pub fn padded_bounds(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((min, max)) => Some((min.min(v), max.max(v))),
            None => Some((v, v)),
        })
        .map(|(min, max)| (min * AXIS_PAD_LOW, max * AXIS_PAD_HIGH))
}

/// Display order of categories: the explicit order when given, otherwise first-seen
pub fn hue_order(records: &[BenchmarkRecord], explicit: Option<&[String]>) -> Vec<String> {
    match explicit {
        Some(order) => order.iter().unique().cloned().collect(),
        None => records.iter().map(|r| r.category.clone()).unique().collect(),
    }
}

fn value_range(records: &[BenchmarkRecord], padded: bool) -> (f64, f64) {
    let (lo, hi) = if padded {
        padded_bounds(records.iter().map(|r| r.time_seconds)).unwrap_or((0.0, 1.0))
    } else {
        let (_, max) = time_bounds(records).unwrap_or((0.0, 1.0));
        (0.0, max * AXIS_PAD_HIGH)
    };
    if hi > lo { (lo, hi) } else { (lo, lo + 1.0) }
}

/// Records whose category is in `hues`, refusing an empty result
fn plottable(
    records: &[BenchmarkRecord],
    hues: &[String],
) -> Result<Vec<BenchmarkRecord>, PlotError> {
    let kept = records
        .iter()
        .filter(|r| hues.contains(&r.category))
        .cloned()
        .collect::<Vec<_>>();
    if kept.len() != records.len() {
        let missing = records
            .iter()
            .map(|r| r.category.as_str())
            .filter(|c| !hues.iter().any(|h| h.as_str() == *c))
            .unique()
            .join(", ");
        warn!("Categories not in display order are left out: {missing}");
    }
    if kept.is_empty() {
        return Err(PlotError::EmptyDataset);
    }
    Ok(kept)
}

/// Duplicate groups among the drawn records, logged once per layout
fn drawn_duplicates(kept: &[BenchmarkRecord]) -> Vec<(u32, String)> {
    let duplicates = duplicate_groups(kept);
    if !duplicates.is_empty() {
        warn!("Duplicate (threads, category) groups are all drawn, last on top: {duplicates:?}");
    }
    duplicates
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub threads: u32,
    pub category: String,
    pub hue: usize,
    /// Left and right edge on the x axis
    pub x: (f64, f64),
    pub value: f64,
}

/// Bars grouped by thread count, one slot per distinct count
#[derive(Debug, Clone, PartialEq)]
pub struct BarLayout {
    pub threads: Vec<u32>,
    pub hues: Vec<String>,
    pub bars: Vec<Bar>,
    pub y_range: (f64, f64),
    /// `(threads, category)` groups with more than one drawn bar
    pub duplicates: Vec<(u32, String)>,
}

impl BarLayout {
    /// Every record becomes one bar. Slot `i` is centred on `i` and `bar_width`
    /// wide, split evenly among the hues.
    pub fn new(
        records: &[BenchmarkRecord],
        hues: Vec<String>,
        bar_width: f64,
        padded: bool,
    ) -> Result<Self, PlotError> {
        if records.is_empty() {
            return Err(PlotError::EmptyDataset);
        }
        let kept = plottable(records, &hues)?;

        let threads = kept.iter().map(|r| r.threads).unique().sorted().collect::<Vec<_>>();
        let width = bar_width / hues.len() as f64;
        let bars = kept
            .iter()
            .filter_map(|r| {
                let slot = threads.iter().position(|t| *t == r.threads)?;
                let hue = hues.iter().position(|h| *h == r.category)?;
                let left = slot as f64 - bar_width / 2.0 + hue as f64 * width;
                Some(Bar {
                    threads: r.threads,
                    category: r.category.clone(),
                    hue,
                    x: (left, left + width),
                    value: r.time_seconds,
                })
            })
            .collect::<Vec<_>>();

        Ok(Self {
            threads,
            hues,
            bars,
            y_range: value_range(&kept, padded),
            duplicates: drawn_duplicates(&kept),
        })
    }

    /// Thread count under slot `x`, blank between slots
    fn slot_label(&self, x: f64) -> String {
        let slot = x.round();
        if slot < 0.0 || (x - slot).abs() > 1e-6 {
            return String::new();
        }
        self.threads
            .get(slot as usize)
            .map(|t| t.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub category: String,
    /// `(threads, time_seconds)` sorted by threads
    pub points: Vec<(u32, f64)>,
}

/// One line per category over a numeric thread axis
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    pub series: Vec<Series>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub duplicates: Vec<(u32, String)>,
}

impl LineLayout {
    pub fn new(
        records: &[BenchmarkRecord],
        hues: Vec<String>,
        padded: bool,
    ) -> Result<Self, PlotError> {
        if records.is_empty() {
            return Err(PlotError::EmptyDataset);
        }
        let kept = plottable(records, &hues)?;

        let series = hues
            .iter()
            .map(|hue| Series {
                category: hue.clone(),
                points: kept
                    .iter()
                    .filter(|r| r.category == *hue)
                    .map(|r| (r.threads, r.time_seconds))
                    .sorted_by_key(|p| p.0)
                    .collect(),
            })
            .collect::<Vec<_>>();

        let (min_t, max_t) = kept
            .iter()
            .map(|r| r.threads)
            .minmax()
            .into_option()
            .ok_or(PlotError::EmptyDataset)?;
        let x_range = if min_t == max_t {
            (min_t as f64 - 1.0, max_t as f64 + 1.0)
        } else {
            (min_t as f64, max_t as f64)
        };

        Ok(Self {
            series,
            x_range,
            y_range: value_range(&kept, padded),
            duplicates: drawn_duplicates(&kept),
        })
    }
}

pub fn ensure_plot_dir(output: &Path) -> Result<(), PlotError> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|source| PlotError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub fn draw_grouped_bars(
    layout: &BarLayout,
    labels: &ChartLabels,
    figure: &FigureSize,
    output: &Path,
) -> Result<(), PlotError> {
    ensure_plot_dir(output)?;
    let root = BitMapBackend::new(output, figure.pixels()).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_error(output, e))?;

    let slots = layout.threads.len() as f64;
    let mut chart = ChartBuilder::on(&root)
        .caption(&labels.title, (FONT, figure.pt(14.0)).into_font())
        .margin(figure.pt(8.0) as u32)
        .x_label_area_size(figure.pt(36.0) as u32)
        .y_label_area_size(figure.pt(48.0) as u32)
        .build_cartesian_2d(-0.5..slots - 0.5, layout.y_range.0..layout.y_range.1)
        .map_err(|e| draw_error(output, e))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(layout.threads.len())
        .x_desc(&labels.x_label)
        .y_desc(&labels.y_label)
        .x_label_formatter(&|x| layout.slot_label(*x))
        .label_style((FONT, figure.pt(10.0)).into_font())
        .axis_desc_style((FONT, figure.pt(11.0)).into_font())
        .draw()
        .map_err(|e| draw_error(output, e))?;

    if let Some(title) = &labels.legend_title {
        chart
            .draw_series(std::iter::empty::<Circle<(f64, f64), u32>>())
            .map_err(|e| draw_error(output, e))?
            .label(title)
            .legend(|(x, y)| EmptyElement::at((x, y)));
    }

    let base = layout.y_range.0;
    for (idx, hue) in layout.hues.iter().enumerate() {
        let color = Palette99::pick(idx).mix(1.0);
        // Bars are drawn in record order, so a duplicate group shows its last record
        chart
            .draw_series(layout.bars.iter().filter(|bar| bar.hue == idx).map(|bar| {
                Rectangle::new([(bar.x.0, base), (bar.x.1, bar.value)], color.filled())
            }))
            .map_err(|e| draw_error(output, e))?
            .label(hue)
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 18, y + 6)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .label_font((FONT, figure.pt(10.0)).into_font())
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| draw_error(output, e))?;

    root.present().map_err(|e| draw_error(output, e))?;
    debug!("Wrote {} bars to {output:?}", layout.bars.len());
    Ok(())
}

pub fn draw_lines(
    layout: &LineLayout,
    labels: &ChartLabels,
    figure: &FigureSize,
    grid: bool,
    markers: bool,
    output: &Path,
) -> Result<(), PlotError> {
    ensure_plot_dir(output)?;
    let root = BitMapBackend::new(output, figure.pixels()).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_error(output, e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&labels.title, (FONT, figure.pt(14.0)).into_font())
        .margin(figure.pt(8.0) as u32)
        .x_label_area_size(figure.pt(36.0) as u32)
        .y_label_area_size(figure.pt(48.0) as u32)
        .build_cartesian_2d(
            layout.x_range.0..layout.x_range.1,
            layout.y_range.0..layout.y_range.1,
        )
        .map_err(|e| draw_error(output, e))?;

    let mut mesh = chart.configure_mesh();
    if !grid {
        mesh.disable_mesh();
    }
    mesh.x_desc(&labels.x_label)
        .y_desc(&labels.y_label)
        .label_style((FONT, figure.pt(10.0)).into_font())
        .axis_desc_style((FONT, figure.pt(11.0)).into_font())
        .draw()
        .map_err(|e| draw_error(output, e))?;

    if let Some(title) = &labels.legend_title {
        chart
            .draw_series(std::iter::empty::<Circle<(f64, f64), u32>>())
            .map_err(|e| draw_error(output, e))?
            .label(title)
            .legend(|(x, y)| EmptyElement::at((x, y)));
    }

    let marker_size = figure.pt(3.0) as u32;
    for (idx, series) in layout.series.iter().enumerate() {
        let color = Palette99::pick(idx).mix(1.0);
        let points = series
            .points
            .iter()
            .map(|(t, v)| (*t as f64, *v))
            .collect::<Vec<_>>();
        chart
            .draw_series(LineSeries::new(
                points.clone(),
                color.stroke_width(figure.pt(1.5) as u32),
            ))
            .map_err(|e| draw_error(output, e))?
            .label(&series.category)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
        if markers {
            chart
                .draw_series(
                    points
                        .into_iter()
                        .map(|p| Circle::new(p, marker_size, color.filled())),
                )
                .map_err(|e| draw_error(output, e))?;
        }
    }

    if layout.series.len() > 1 || labels.legend_title.is_some() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font((FONT, figure.pt(10.0)).into_font())
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| draw_error(output, e))?;
    }

    root.present().map_err(|e| draw_error(output, e))?;
    debug!("Wrote {} line series to {output:?}", layout.series.len());
    Ok(())
}
