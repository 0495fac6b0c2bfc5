//! Calendar heatmap of events per day.
//!
//! Days are laid out GitHub style: one column per week, Monday on the top row.

use crate::renderer::ChartRenderer;
use crate::style::{interpolate, ChartStyle, FONT_FAMILY};
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use ny511_common::{DailyCount, DateRange, Result};
use plotters::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// One day of the heatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarCell {
    pub day: NaiveDate,
    /// Column, counted from the week containing the first day.
    pub week: u32,
    /// Row, 0 for Monday.
    pub weekday: u32,
    pub count: u64,
    /// `count` relative to the busiest day, in `0.0..=1.0`.
    pub intensity: f64,
}

/// Monday on or before `day`.
fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// One cell per day of `range`, days without events included. Counts outside
/// `range` are ignored.
pub fn calendar_cells(counts: &[DailyCount], range: &DateRange) -> Vec<CalendarCell> {
    let by_day: HashMap<NaiveDate, u64> = counts
        .iter()
        .filter(|c| range.contains(c.day))
        .map(|c| (c.day, c.count))
        .collect();
    let busiest = by_day.values().copied().max().unwrap_or(0);
    let origin = week_start(range.start());

    range
        .start()
        .iter_days()
        .take_while(|day| *day <= range.end())
        .map(|day| {
            let count = by_day.get(&day).copied().unwrap_or(0);
            CalendarCell {
                day,
                week: ((day - origin).num_days() / 7) as u32,
                weekday: day.weekday().num_days_from_monday(),
                count,
                intensity: if busiest == 0 {
                    0.0
                } else {
                    count as f64 / busiest as f64
                },
            }
        })
        .collect()
}

/// Range spanned by `counts`, used when no explicit range is given.
fn span_of(counts: &[DailyCount]) -> Option<DateRange> {
    let first = counts.iter().map(|c| c.day).min()?;
    let last = counts.iter().map(|c| c.day).max()?;
    DateRange::new(first, last).ok()
}

#[derive(Debug, Clone)]
pub struct CalendarHeatmapChart {
    style: ChartStyle,
    title: String,
    range: Option<DateRange>,
}

impl CalendarHeatmapChart {
    pub fn new(style: ChartStyle) -> Self {
        Self {
            style,
            title: "Events per day".to_string(),
            range: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Lay out every day of `range`, not only the days with events.
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    fn draw(&self, counts: &[DailyCount], path: &Path) -> Result<()> {
        let cells = match self.range.or_else(|| span_of(counts)) {
            Some(range) => calendar_cells(counts, &range),
            None => Vec::new(),
        };
        let weeks = cells.last().map_or(1, |c| c.week + 1) as i32;
        let origin = cells.first().map(|c| week_start(c.day));

        let fg = self.style.foreground;
        let root = BitMapBackend::new(path, self.style.size()).into_drawing_area();
        root.fill(&self.style.background)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                &self.title,
                (FONT_FAMILY, self.style.caption_size()).into_font().color(&fg),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0..weeks, 0..7)?;

        let month_of_week = |week: &i32| {
            origin
                .map(|o| (o + Duration::weeks(i64::from(*week))).format("%b %Y").to_string())
                .unwrap_or_default()
        };
        let weekday_of_row = |row: &i32| {
            usize::try_from(6 - *row)
                .ok()
                .and_then(|i| WEEKDAY_NAMES.get(i))
                .map(|name| name.to_string())
                .unwrap_or_default()
        };

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(8)
            .y_labels(7)
            .x_label_formatter(&month_of_week)
            .y_label_formatter(&weekday_of_row)
            .axis_style(&fg)
            .label_style((FONT_FAMILY, self.style.label_size()).into_font().color(&fg))
            .draw()?;

        let (low, high) = (self.style.heat_low, self.style.heat_high);
        chart.draw_series(cells.iter().map(|cell| {
            let row = 6 - cell.weekday as i32;
            let column = cell.week as i32;
            let mut rect = Rectangle::new(
                [(column, row), (column + 1, row + 1)],
                interpolate(low, high, cell.intensity).filled(),
            );
            rect.set_margin(1, 1, 1, 1);
            rect
        }))?;

        root.present()?;
        info!("Rendered {} calendar days to {}", cells.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl ChartRenderer for CalendarHeatmapChart {
    type Data = Vec<DailyCount>;

    async fn render_to_file(&self, data: &Self::Data, path: &Path) -> Result<()> {
        self.draw(data, path)
    }

    fn name(&self) -> &'static str {
        "calendar"
    }

    fn description(&self) -> &'static str {
        "Events per day as a weekday by week calendar heatmap"
    }
}
