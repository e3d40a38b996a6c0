use std::path::Path;

use common::{
    plot::{BarLayout, ChartLabels, FigureSize, Plot, PlotError, draw_grouped_bars, hue_order},
    record::BenchmarkRecord,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bars keyed by thread count, one colour per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupedBar {
    pub labels: ChartLabels,
    /// Category display order, ie. `[Broker, Direct]`. First-seen order when unset
    pub hue_order: Option<Vec<String>>,
    /// Width of one thread slot shared by all its bars
    pub bar_width: f64,
    /// Use `[min * 0.95, max * 1.05]` for the value axis instead of starting at zero
    pub pad_axis: bool,
    pub figure: FigureSize,
}

impl Default for GroupedBar {
    fn default() -> Self {
        Self {
            labels: ChartLabels::default(),
            hue_order: None,
            bar_width: 0.8,
            pad_axis: false,
            figure: FigureSize::default(),
        }
    }
}

#[typetag::serde]
impl Plot for GroupedBar {
    fn name(&self) -> &'static str {
        "GroupedBar"
    }

    fn plot(&self, records: &[BenchmarkRecord], output: &Path) -> Result<(), PlotError> {
        let hues = hue_order(records, self.hue_order.as_deref());
        let layout = BarLayout::new(records, hues, self.bar_width, self.pad_axis)?;
        debug!(
            "{} bars over {} thread levels for {:?}",
            layout.bars.len(),
            layout.threads.len(),
            layout.hues
        );
        draw_grouped_bars(&layout, &self.labels, &self.figure, output)
    }
}
