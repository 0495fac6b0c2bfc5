//! One dashboard refresh: resolve the range, run the adapters, write the outputs.

use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use ny511_charts::{
    CalendarHeatmapChart, CategoryBarChart, ChartRenderer, ChartStyle, ErrorChart, EventMapChart,
};
use ny511_common::{DashError, DatasetSource, EventTable, SocrataClient};
use ny511_config::Config;
use ny511_pipeline::{Dashboard, DashboardUpdate, DatePicker, RangeQueryBuilder, View};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const EVENTS_FILE: &str = "events.json";
pub const DAILY_COUNTS_FILE: &str = "daily_counts.json";
pub const TOP_CATEGORIES_FILE: &str = "top_categories.json";

/// What a single run should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub output_dir: PathBuf,
    pub render_charts: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start: None,
            end: None,
            output_dir: PathBuf::from(&config.charts.output_dir),
            render_charts: true,
        }
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct RunReport {
    pub update: DashboardUpdate,
    /// Month the date picker opens on.
    pub visible_month: NaiveDate,
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.update.is_complete()
    }

    /// Turn failed views into an error once the outputs are on disk.
    pub fn ensure_complete(&self) -> AppResult<()> {
        let failures = self.update.failures();
        if failures.is_empty() {
            return Ok(());
        }
        let views = failures
            .iter()
            .map(|(view, _)| view.name())
            .collect::<Vec<_>>()
            .join(", ");
        Err(AppError::Incomplete {
            failed: failures.len(),
            views,
        })
    }
}

/// Dashboard host backed by any dataset source.
pub struct DashboardApp {
    config: Config,
    source: Arc<dyn DatasetSource>,
}

impl std::fmt::Debug for DashboardApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardApp")
            .field("config", &self.config)
            .field("source", &"<DatasetSource>")
            .finish()
    }
}

impl DashboardApp {
    pub fn new(config: Config, source: Arc<dyn DatasetSource>) -> Self {
        Self { config, source }
    }

    /// App talking to the configured SODA endpoint.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let client = SocrataClient::new(config.socrata_config())?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Picker bounded by the latest day in the dataset. Falls back to today when
    /// that lookup fails, so the views can still report their own errors.
    async fn picker(&self, builder: &RangeQueryBuilder) -> AppResult<DatePicker> {
        let today = chrono::Local::now().date_naive();
        match DatePicker::discover(builder, &self.config.picker, today).await {
            Ok(picker) => Ok(picker),
            Err(e) if e.is_remote_fetch() => {
                warn!("Could not look up the latest day, using {}: {}", today, e);
                Ok(DatePicker::from_settings(&self.config.picker, today)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Dispatch one range change and write every view that loaded.
    #[instrument(skip(self, options), fields(output = %options.output_dir.display()))]
    pub async fn run_once(&self, options: &RunOptions) -> AppResult<RunReport> {
        let builder = RangeQueryBuilder::from_config(self.source.clone(), &self.config);
        let picker = self.picker(&builder).await?;
        let range = picker.resolve(options.start, options.end)?;
        let visible_month = picker.initial_visible_month();
        info!("Showing {} (picker opens on {})", range, visible_month.format("%B %Y"));

        let dashboard = Dashboard::from_config(self.source.clone(), &self.config).with_picker(picker);
        let update = dashboard.on_range_changed(range.into()).await?;

        let dir = options.output_dir.as_path();
        fs::create_dir_all(dir).map_err(|e| AppError::output(dir, e))?;

        let mut written = Vec::new();
        if let Ok(table) = &update.events {
            written.push(write_json(dir, EVENTS_FILE, table.rows())?);
        }
        if let Ok(counts) = &update.daily_counts {
            written.push(write_json(dir, DAILY_COUNTS_FILE, counts)?);
        }
        if let Ok(top) = &update.top_categories {
            written.push(write_json(dir, TOP_CATEGORIES_FILE, top)?);
        }

        if options.render_charts {
            written.extend(self.render_charts(&update, dir).await);
        }

        info!("Wrote {} files to {}", written.len(), dir.display());
        Ok(RunReport {
            update,
            visible_month,
            written,
        })
    }

    /// Draw each view, or its error state when the view failed. A chart that
    /// cannot be drawn is logged and skipped.
    async fn render_charts(&self, update: &DashboardUpdate, dir: &Path) -> Vec<PathBuf> {
        let style = ChartStyle::from_settings(&self.config.charts);
        let mut written = Vec::new();

        let points = update.events.as_ref().map(EventTable::map_points);
        let map = EventMapChart::new(style.clone()).with_title(&update.label);
        written.extend(render_view(&map, View::Map, points.as_ref().map_err(|e| *e), &style, dir).await);

        let calendar = CalendarHeatmapChart::new(style.clone())
            .with_title(format!("Events per day, {}", update.label))
            .with_range(update.range);
        written.extend(
            render_view(&calendar, View::Heatmap, update.daily_counts.as_ref(), &style, dir).await,
        );

        let bars = CategoryBarChart::new(style.clone());
        written.extend(
            render_view(&bars, View::Categories, update.top_categories.as_ref(), &style, dir).await,
        );

        written
    }
}

async fn render_view<R: ChartRenderer>(
    chart: &R,
    view: View,
    outcome: Result<&R::Data, &DashError>,
    style: &ChartStyle,
    dir: &Path,
) -> Option<PathBuf> {
    let path = dir.join(format!("{}.png", chart.name()));
    let result = match outcome {
        Ok(data) => chart.render_to_file(data, &path).await,
        Err(error) => {
            ErrorChart::new(style.clone(), chart.description())
                .render_to_file(&error.to_string(), &path)
                .await
        }
    };

    match result {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Could not draw the {} view: {}", view.name(), e);
            None
        }
    }
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> AppResult<PathBuf> {
    let path = dir.join(name);
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(&path, body).map_err(|e| AppError::output(&path, e))?;
    Ok(path)
}
