//! Per-day event counts for the calendar heatmap.

use crate::events::RangeQueryBuilder;
use crate::rows::decode_daily_counts;
use chrono::NaiveDate;
use ny511_common::{DailyCount, DateRange, EventTable, Result, SoqlQuery};
use ny511_config::DailyStrategy;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Count the rows of `table` per creation day, ascending by day.
pub fn group_by_day(table: &EventTable) -> Vec<DailyCount> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in table {
        *counts.entry(record.create_time).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(day, count)| DailyCount { day, count })
        .collect()
}

/// Produces the heatmap series for a date range.
#[derive(Debug, Clone)]
pub struct DailyCountAdapter {
    builder: RangeQueryBuilder,
    strategy: DailyStrategy,
}

impl DailyCountAdapter {
    pub fn new(builder: RangeQueryBuilder, strategy: DailyStrategy) -> Self {
        Self { builder, strategy }
    }

    pub fn strategy(&self) -> DailyStrategy {
        self.strategy
    }

    /// Per-day counts of `range`, ascending by day.
    ///
    /// With [`DailyStrategy::FromEvents`] the counts come from a paged event
    /// fetch of their own and share its row cap. The dashboard skips that fetch
    /// and groups the map's table with [`group_by_day`].
    #[instrument(skip(self, range), fields(range = %range, strategy = %self.strategy))]
    pub async fn fetch_daily_counts(&self, range: &DateRange) -> Result<Vec<DailyCount>> {
        let counts = match self.strategy {
            DailyStrategy::FromEvents => {
                let table = self.builder.fetch_events(range).await?;
                group_by_day(&table)
            }
            DailyStrategy::ServerSide => {
                let query = SoqlQuery::daily_counts(self.builder.filter(range));
                let mut counts = self
                    .builder
                    .bounded("Daily count query", async {
                        decode_daily_counts(self.builder.source().fetch_rows(&query).await?)
                    })
                    .await?;
                counts.sort_by_key(|c| c.day);
                counts
            }
        };

        debug!("Aggregated {} daily counts", counts.len());
        Ok(counts)
    }
}
