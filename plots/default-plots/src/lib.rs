use common::plot::Plot;

pub use grouped_bar::GroupedBar;
pub use scaling_line::ScalingLine;

/// Names of the plot types available to configs.
///
/// Calling this keeps every plugin crate linked into the binary, otherwise
/// their typetag registrations can be dropped and configs fail to parse.
pub fn init_plots() -> Vec<&'static str> {
    vec![GroupedBar::default().name(), ScalingLine::default().name()]
}
