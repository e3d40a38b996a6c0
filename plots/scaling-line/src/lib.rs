use std::path::Path;

use common::{
    plot::{ChartLabels, FigureSize, LineLayout, Plot, PlotError, draw_lines, hue_order},
    record::BenchmarkRecord,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Time over thread count, one line per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingLine {
    pub labels: ChartLabels,
    pub hue_order: Option<Vec<String>>,
    pub pad_axis: bool,
    pub grid: bool,
    pub markers: bool,
    pub figure: FigureSize,
}

impl Default for ScalingLine {
    fn default() -> Self {
        Self {
            labels: ChartLabels::default(),
            hue_order: None,
            pad_axis: true,
            grid: true,
            markers: true,
            figure: FigureSize::default(),
        }
    }
}

#[typetag::serde]
impl Plot for ScalingLine {
    fn name(&self) -> &'static str {
        "ScalingLine"
    }

    fn plot(&self, records: &[BenchmarkRecord], output: &Path) -> Result<(), PlotError> {
        let hues = hue_order(records, self.hue_order.as_deref());
        let layout = LineLayout::new(records, hues, self.pad_axis)?;
        debug!(
            "Value axis {:?} over threads {:?}",
            layout.y_range, layout.x_range
        );
        draw_lines(
            &layout,
            &self.labels,
            &self.figure,
            self.grid,
            self.markers,
            output,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_size(path: &Path) -> (u32, u32) {
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        let be = |at: usize| u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap());
        (be(16), be(20))
    }

    #[test]
    fn defaults_match_the_scaling_chart() {
        let line: ScalingLine = serde_yml::from_str("labels:\n  title: Parallel\n").unwrap();
        assert!(line.pad_axis);
        assert!(line.grid);
        assert!(line.markers);
        assert_eq!(line.labels.title, "Parallel");
        assert_eq!(line.figure.pixels(), (2400, 1500));
    }

    #[test]
    fn deserializes_as_plot_object() {
        let plot: Box<dyn Plot> =
            serde_yml::from_str("type: ScalingLine\ngrid: false\n").unwrap();
        assert_eq!(plot.name(), "ScalingLine");
    }

    #[test]
    fn empty_records_do_not_create_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("parallel_benchmark.png");
        let err = ScalingLine::default().plot(&[], &output).unwrap_err();
        assert!(matches!(err, PlotError::EmptyDataset));
        assert!(!output.exists());
    }

    #[test]
    fn renders_parallel_scaling_at_300_dpi() {
        let records = [(1, 12.0e9), (2, 6.5e9), (4, 3.6e9), (8, 2.2e9)].map(|(threads, ns)| {
            BenchmarkRecord::new(format!("BenchmarkGol/512x512x1000-{threads}"), threads, ns, "Parallel")
        });
        let plot = ScalingLine {
            labels: ChartLabels {
                title: "Parallel Implementation on Distributed System Performance".to_owned(),
                x_label: "Number of Threads in Each Worker".to_owned(),
                y_label: "Time (seconds)".to_owned(),
                legend_title: None,
            },
            ..ScalingLine::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("plots").join("parallel_benchmark.png");
        plot.plot(&records, &output).unwrap();
        assert!(output.is_file());
        assert_eq!(png_size(&output), (2400, 1500));
    }
}
