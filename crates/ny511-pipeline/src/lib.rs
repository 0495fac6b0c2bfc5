//! # ny511 Pipeline
//!
//! Turns a date range into the three dashboard datasets: the raw event table
//! behind the map, per-day counts behind the calendar heatmap and the top event
//! categories behind the bar chart.
//!
//! Every request goes through a [`ny511_common::DatasetSource`], so the whole
//! pipeline runs unchanged against the live SODA endpoint or an in-memory fixture.

pub mod categories;
pub mod daily;
pub mod dashboard;
pub mod events;
pub mod paging;
pub mod picker;
pub mod rows;

pub use categories::{rank_categories, CategoryAdapter, DEFAULT_TOP_CATEGORIES};
pub use daily::{group_by_day, DailyCountAdapter};
pub use dashboard::{Dashboard, DashboardUpdate, DateRangeChanged, View};
pub use events::RangeQueryBuilder;
pub use paging::PageStrategy;
pub use picker::DatePicker;
