//! # ny511 Charts
//!
//! PNG renderers for the three dashboard views, drawn with plotters: the event
//! map, the calendar heatmap and the top categories bar chart. A view whose data
//! failed to load is drawn as an [`ErrorChart`] instead.

#![warn(clippy::all)]

pub mod calendar_heatmap;
pub mod category_bar;
pub mod event_map;
pub mod renderer;
pub mod style;

pub use calendar_heatmap::{calendar_cells, CalendarCell, CalendarHeatmapChart};
pub use category_bar::{value_axis_max, CategoryBarChart};
pub use event_map::{map_bounds, EventMapChart, MapBounds, NEW_YORK_BOUNDS};
pub use renderer::{ChartRenderer, ErrorChart};
pub use style::{interpolate, parse_color, ChartStyle};
