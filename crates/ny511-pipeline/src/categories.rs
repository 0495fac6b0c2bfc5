//! Top-N event categories for the bar chart.

use crate::events::RangeQueryBuilder;
use crate::rows::decode_category_counts;
use ny511_common::{CategoryCount, DateRange, Result, SoqlQuery};
use tracing::{debug, instrument, warn};

/// Categories shown by default.
pub const DEFAULT_TOP_CATEGORIES: u32 = 5;

/// Order busiest first and keep at most `limit` rows. The sort is stable, so
/// ties keep the order the server returned them in.
pub fn rank_categories(mut counts: Vec<CategoryCount>, limit: usize) -> Vec<CategoryCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// Produces the bar chart series for a date range.
#[derive(Debug, Clone)]
pub struct CategoryAdapter {
    builder: RangeQueryBuilder,
}

impl CategoryAdapter {
    pub fn new(builder: RangeQueryBuilder) -> Self {
        Self { builder }
    }

    /// The `limit` busiest event types of `range`, count non-increasing.
    ///
    /// Always a server-side grouped query, independent of the event fetch.
    #[instrument(skip(self, range), fields(range = %range))]
    pub async fn fetch_top_categories(&self, range: &DateRange, limit: u32) -> Result<Vec<CategoryCount>> {
        let query = SoqlQuery::category_counts(self.builder.filter(range), limit);
        let counts = self
            .builder
            .bounded("Category count query", async {
                decode_category_counts(self.builder.source().fetch_rows(&query).await?)
            })
            .await?;

        let limit = limit as usize;
        if counts.len() > limit {
            warn!("Server returned {} categories for a limit of {}", counts.len(), limit);
        }

        let ranked = rank_categories(counts, limit);
        debug!("Top categories: {:?}", ranked);
        Ok(ranked)
    }
}
