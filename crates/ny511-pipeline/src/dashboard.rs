//! The date-range-changed event contract.
//!
//! A [`DateRangeChanged`] event runs the adapters concurrently over the same
//! range. Each view reports its own outcome, so one failed view never blanks
//! the others. With [`DailyStrategy::FromEvents`] the heatmap is grouped from
//! the same event table the map shows.

use crate::categories::{CategoryAdapter, DEFAULT_TOP_CATEGORIES};
use crate::daily::{group_by_day, DailyCountAdapter};
use crate::events::RangeQueryBuilder;
use crate::picker::DatePicker;
use chrono::NaiveDate;
use ny511_common::{
    format_range_label, CategoryCount, DailyCount, DashError, DatasetSource, DateRange,
    EventTable, MapPoint, Result,
};
use ny511_config::{Config, DailyStrategy};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// The user picked a new date range. Bounds are unchecked until dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeChanged {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRangeChanged {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl From<DateRange> for DateRangeChanged {
    fn from(range: DateRange) -> Self {
        Self::new(range.start(), range.end())
    }
}

/// Which view an adapter feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Map,
    Heatmap,
    Categories,
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Heatmap => "heatmap",
            Self::Categories => "categories",
        }
    }
}

/// Outcome of one dispatched range change.
#[derive(Debug)]
pub struct DashboardUpdate {
    /// Increases by one per accepted event.
    pub generation: u64,
    pub range: DateRange,
    /// Title shown above the views.
    pub label: String,
    pub events: Result<EventTable>,
    pub daily_counts: Result<Vec<DailyCount>>,
    pub top_categories: Result<Vec<CategoryCount>>,
}

impl DashboardUpdate {
    /// Whether every adapter succeeded.
    pub fn is_complete(&self) -> bool {
        self.events.is_ok() && self.daily_counts.is_ok() && self.top_categories.is_ok()
    }

    /// The failed views with their errors.
    pub fn failures(&self) -> Vec<(View, &DashError)> {
        let mut failures = Vec::new();
        if let Err(e) = &self.events {
            failures.push((View::Map, e));
        }
        if let Err(e) = &self.daily_counts {
            failures.push((View::Heatmap, e));
        }
        if let Err(e) = &self.top_categories {
            failures.push((View::Categories, e));
        }
        failures
    }

    /// Map view projection of the event table.
    pub fn map_points(&self) -> Option<Vec<MapPoint>> {
        self.events.as_ref().ok().map(EventTable::map_points)
    }
}

/// Dispatches range changes to the adapters.
#[derive(Debug)]
pub struct Dashboard {
    events: RangeQueryBuilder,
    daily: DailyCountAdapter,
    categories: CategoryAdapter,
    top_categories: u32,
    picker: Option<DatePicker>,
    generation: AtomicU64,
}

impl Dashboard {
    pub fn new(builder: RangeQueryBuilder, daily_strategy: DailyStrategy) -> Self {
        Self {
            daily: DailyCountAdapter::new(builder.clone(), daily_strategy),
            categories: CategoryAdapter::new(builder.clone()),
            events: builder,
            top_categories: DEFAULT_TOP_CATEGORIES,
            picker: None,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(source: Arc<dyn DatasetSource>, config: &Config) -> Self {
        Self::new(
            RangeQueryBuilder::from_config(source, config),
            config.pipeline.daily_strategy,
        )
        .with_top_categories(config.pipeline.top_categories)
    }

    pub fn with_top_categories(mut self, limit: u32) -> Self {
        self.top_categories = limit;
        self
    }

    /// Reject events outside the picker window.
    pub fn with_picker(mut self, picker: DatePicker) -> Self {
        self.picker = Some(picker);
        self
    }

    pub fn builder(&self) -> &RangeQueryBuilder {
        &self.events
    }

    pub fn picker(&self) -> Option<&DatePicker> {
        self.picker.as_ref()
    }

    /// Validate the event, then run all adapters concurrently.
    ///
    /// An invalid range is returned as an error before any request is issued;
    /// adapter failures are reported inside the update.
    #[instrument(skip(self), fields(start = %event.start, end = %event.end))]
    pub async fn on_range_changed(&self, event: DateRangeChanged) -> Result<DashboardUpdate> {
        let range = DateRange::new(event.start, event.end)?;
        if let Some(picker) = &self.picker {
            picker.check(&range)?;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (events, daily_counts, top_categories) = match self.daily.strategy() {
            DailyStrategy::FromEvents => {
                let (events, top_categories) = tokio::join!(
                    self.events.fetch_events(&range),
                    self.categories.fetch_top_categories(&range, self.top_categories),
                );
                let daily_counts = events.as_ref().map(group_by_day).map_err(|e| {
                    DashError::remote_fetch(format!("Event table unavailable: {e}"))
                });
                (events, daily_counts, top_categories)
            }
            DailyStrategy::ServerSide => tokio::join!(
                self.events.fetch_events(&range),
                self.daily.fetch_daily_counts(&range),
                self.categories.fetch_top_categories(&range, self.top_categories),
            ),
        };

        let update = DashboardUpdate {
            generation,
            range,
            label: format_range_label(&range),
            events,
            daily_counts,
            top_categories,
        };

        for (view, error) in update.failures() {
            warn!("{} view failed for {}: {}", view.name(), range, error);
        }
        info!(
            "Update {} for {} complete={}",
            generation,
            range,
            update.is_complete()
        );

        Ok(update)
    }

    /// Serve events from `events` until the channel closes or every update
    /// receiver is gone. Rejected events are logged and skipped.
    pub async fn listen(
        &self,
        mut events: mpsc::Receiver<DateRangeChanged>,
        updates: watch::Sender<Option<Arc<DashboardUpdate>>>,
    ) {
        while let Some(event) = events.recv().await {
            match self.on_range_changed(event).await {
                Ok(update) => {
                    if updates.send(Some(Arc::new(update))).is_err() {
                        info!("No update receivers left, stopping listener");
                        break;
                    }
                }
                Err(e) => warn!("Ignoring range change {:?}: {}", event, e),
            }
        }
    }

    /// Spawn [`Dashboard::listen`] on the runtime. The watch receiver always holds
    /// the latest update.
    pub fn spawn_listener(
        self: Arc<Self>,
        buffer: usize,
    ) -> (
        mpsc::Sender<DateRangeChanged>,
        watch::Receiver<Option<Arc<DashboardUpdate>>>,
        JoinHandle<()>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        let (update_tx, update_rx) = watch::channel(None);
        let handle = tokio::spawn(async move { self.listen(event_rx, update_tx).await });
        (event_tx, update_rx, handle)
    }
}
