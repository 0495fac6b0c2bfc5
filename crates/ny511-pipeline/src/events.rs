//! Range-query builder: date-filtered, paginated fetches of raw event rows.

use crate::paging::PageStrategy;
use crate::rows::{decode_events, decode_latest_day};
use chrono::NaiveDate;
use futures::future::try_join_all;
use ny511_common::{
    DashError, DatasetSource, DateRange, EventFilter, EventRecord, EventTable, Result, SoqlQuery,
};
use ny511_config::Config;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Region matched when none is configured.
pub const DEFAULT_REGION: &str = "NY";

/// Builds and runs the filtered queries every adapter shares.
///
/// Cloning is cheap; clones share the same dataset source.
#[derive(Clone)]
pub struct RangeQueryBuilder {
    source: Arc<dyn DatasetSource>,
    region: String,
    strategy: PageStrategy,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for RangeQueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeQueryBuilder")
            .field("region", &self.region)
            .field("strategy", &self.strategy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RangeQueryBuilder {
    /// Builder over `source` with the reference page layout and no overall
    /// timeout.
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self {
            source,
            region: DEFAULT_REGION.to_string(),
            strategy: PageStrategy::default(),
            timeout: None,
        }
    }

    /// Builder configured from the `dataset`, `paging` and `pipeline` sections.
    pub fn from_config(source: Arc<dyn DatasetSource>, config: &Config) -> Self {
        Self::new(source)
            .with_region(config.dataset.region.clone())
            .with_strategy(PageStrategy::from_settings(&config.paging))
            .with_timeout(Duration::from_secs(config.pipeline.overall_timeout_seconds))
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_strategy(mut self, strategy: PageStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bound every adapter call, retries and all pages included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn strategy(&self) -> PageStrategy {
        self.strategy
    }

    /// The region and day predicate for `range`.
    pub fn filter(&self, range: &DateRange) -> EventFilter {
        EventFilter::new(self.region.clone(), *range)
    }

    pub(crate) fn source(&self) -> &dyn DatasetSource {
        self.source.as_ref()
    }

    /// Run `future` under the overall timeout, if one is set.
    pub(crate) async fn bounded<T, F>(&self, what: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
                DashError::remote_fetch(format!(
                    "{what} did not complete within {}s",
                    limit.as_secs_f64()
                ))
            })?,
            None => future.await,
        }
    }

    /// Fetch the event rows of `range`, concatenated in page order.
    ///
    /// Fails with a remote-fetch error if any page fails or cannot be decoded.
    #[instrument(skip(self, range), fields(range = %range, region = %self.region))]
    pub async fn fetch_events(&self, range: &DateRange) -> Result<EventTable> {
        let filter = self.filter(range);
        let table = self
            .bounded("Event fetch", async {
                match self.strategy {
                    PageStrategy::Fixed {
                        page_size,
                        page_count,
                        concurrent,
                    } => self.fetch_fixed(&filter, page_size, page_count, concurrent).await,
                    PageStrategy::Cursor {
                        page_size,
                        max_pages,
                    } => self.fetch_cursor(&filter, page_size, max_pages).await,
                }
            })
            .await?;

        info!("Fetched {} events for {}", table.len(), range);
        Ok(table)
    }

    async fn fetch_page(&self, filter: &EventFilter, offset: u32, limit: u32) -> Result<Vec<EventRecord>> {
        let query = SoqlQuery::events_page(filter.clone(), offset, limit);
        let rows = self.source.fetch_rows(&query).await?;
        let records = decode_events(rows)?;
        debug!("Page at offset {} returned {} rows", offset, records.len());
        Ok(records)
    }

    async fn fetch_fixed(
        &self,
        filter: &EventFilter,
        page_size: u32,
        page_count: u32,
        concurrent: bool,
    ) -> Result<EventTable> {
        let offsets: Vec<u32> = (0..page_count).map(|i| self.strategy.offset(i)).collect();

        // try_join_all yields results in input order, whatever order they finish in
        let pages = if concurrent {
            try_join_all(
                offsets
                    .iter()
                    .map(|&offset| self.fetch_page(filter, offset, page_size)),
            )
            .await?
        } else {
            let mut pages = Vec::with_capacity(offsets.len());
            for &offset in &offsets {
                pages.push(self.fetch_page(filter, offset, page_size).await?);
            }
            pages
        };

        let mut table = EventTable::new();
        for (index, page) in pages.into_iter().enumerate() {
            if (page.len() as u64) < u64::from(page_size) {
                debug!("Page {} is short ({} of {} rows)", index, page.len(), page_size);
            }
            table.extend_page(page);
        }

        if table.len() as u64 >= self.strategy.row_cap() {
            warn!(
                "Fetched the full {} rows of {} fixed pages; later events in {} were not requested",
                table.len(),
                page_count,
                filter.range()
            );
        }

        Ok(table)
    }

    async fn fetch_cursor(&self, filter: &EventFilter, page_size: u32, max_pages: u32) -> Result<EventTable> {
        let mut table = EventTable::new();

        for index in 0..max_pages {
            let page = self
                .fetch_page(filter, self.strategy.offset(index), page_size)
                .await?;
            let short = (page.len() as u64) < u64::from(page_size);
            table.extend_page(page);
            if short {
                debug!("Cursor stopped after {} pages", index + 1);
                return Ok(table);
            }
        }

        warn!(
            "Cursor reached its limit of {} pages; later events in {} were not requested",
            max_pages,
            filter.range()
        );
        Ok(table)
    }

    /// Latest creation day in the whole dataset, `None` when it is empty.
    #[instrument(skip(self))]
    pub async fn fetch_latest_day(&self) -> Result<Option<NaiveDate>> {
        self.bounded("Latest day lookup", async {
            let rows = self.source.fetch_rows(&SoqlQuery::latest_day()).await?;
            decode_latest_day(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ny511_common::test_utils::{day, range, rows, FixtureSource};
    use ny511_common::Projection;

    fn builder(source: Arc<FixtureSource>) -> RangeQueryBuilder {
        RangeQueryBuilder::new(source)
    }

    #[tokio::test]
    async fn test_rows_within_range() {
        let source = Arc::new(FixtureSource::new(vec![
            rows::event("A", "2019-12-31"),
            rows::event("B", "2020-01-01"),
            rows::event("C", "2020-01-03"),
            rows::event("D", "2020-01-04"),
        ]));
        let range = range(day(2020, 1, 1), day(2020, 1, 3));

        let table = builder(source).fetch_events(&range).await.unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| range.contains(r.create_time)));
    }

    #[tokio::test]
    async fn test_all_fixed_pages_requested_after_short_page() {
        let source = Arc::new(FixtureSource::new(vec![rows::event("A", "2020-01-01")]));
        let table = builder(source.clone())
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(source.call_count(Projection::Events), 5);
        let offsets: Vec<Option<u32>> = {
            let mut offsets: Vec<_> = source.queries().iter().map(|q| q.offset()).collect();
            offsets.sort();
            offsets
        };
        assert_eq!(offsets, vec![Some(0), Some(1000), Some(2000), Some(3000), Some(4000)]);
    }

    #[tokio::test]
    async fn test_sequential_fixed_pages_in_order() {
        let source = Arc::new(FixtureSource::new(rows::many("A", "2020-01-01", 5)));
        let strategy = PageStrategy::Fixed {
            page_size: 2,
            page_count: 3,
            concurrent: false,
        };
        let table = builder(source.clone())
            .with_strategy(strategy)
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap();

        assert_eq!(table.len(), 5);
        let offsets: Vec<Option<u32>> = source.queries().iter().map(|q| q.offset()).collect();
        assert_eq!(offsets, vec![Some(0), Some(2), Some(4)]);
    }

    #[tokio::test]
    async fn test_cursor_stops_on_short_page() {
        let source = Arc::new(FixtureSource::new(rows::many("A", "2020-01-01", 5)));
        let table = builder(source.clone())
            .with_strategy(PageStrategy::cursor(2, 10))
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap();

        assert_eq!(table.len(), 5);
        assert_eq!(source.call_count(Projection::Events), 3);
    }

    #[tokio::test]
    async fn test_cursor_respects_page_limit() {
        let source = Arc::new(FixtureSource::new(rows::many("A", "2020-01-01", 10)));
        let table = builder(source.clone())
            .with_strategy(PageStrategy::cursor(2, 3))
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap();

        assert_eq!(table.len(), 6);
        assert_eq!(source.call_count(Projection::Events), 3);
    }

    #[tokio::test]
    async fn test_failing_page_fails_fetch() {
        let source = Arc::new(
            FixtureSource::new(vec![rows::event("A", "2020-01-01")]).failing_on(Projection::Events),
        );
        let err = builder(source)
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap_err();
        assert!(err.is_remote_fetch());
    }

    #[tokio::test]
    async fn test_malformed_rows_fail_fetch() {
        let source = Arc::new(
            FixtureSource::new(vec![rows::event("A", "2020-01-01")]).malformed_on(Projection::Events),
        );
        let err = builder(source)
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap_err();
        assert!(err.is_remote_fetch());
    }

    #[tokio::test]
    async fn test_overall_timeout_is_remote_fetch_error() {
        let source = Arc::new(
            FixtureSource::new(vec![rows::event("A", "2020-01-01")])
                .with_page_delay(0, Duration::from_millis(500)),
        );
        let err = builder(source)
            .with_timeout(Duration::from_millis(20))
            .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
            .await
            .unwrap_err();
        assert!(err.is_remote_fetch());
        assert!(err.to_string().contains("did not complete"));
    }

    #[tokio::test]
    async fn test_latest_day() {
        let source = Arc::new(FixtureSource::new(vec![
            rows::event("A", "2020-01-01"),
            rows::event("B", "2024-03-05"),
        ]));
        assert_eq!(
            builder(source).fetch_latest_day().await.unwrap(),
            Some(day(2024, 3, 5))
        );

        let empty = Arc::new(FixtureSource::new(Vec::new()));
        assert_eq!(builder(empty).fetch_latest_day().await.unwrap(), None);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.dataset.region = "NJ".to_string();
        config.paging.page_size = 10;
        let builder = RangeQueryBuilder::from_config(Arc::new(FixtureSource::default()), &config);
        assert_eq!(builder.region(), "NJ");
        assert_eq!(builder.strategy().page_size(), 10);
        assert_eq!(builder.filter(&range(day(2020, 1, 1), day(2020, 1, 2))).region(), "NJ");
    }
}
