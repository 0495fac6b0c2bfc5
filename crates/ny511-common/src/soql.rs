//! Typed SoQL queries against the 511 NY event dataset.
//!
//! Every request the pipeline issues is described by a [`SoqlQuery`]: what to
//! project, which rows to keep, and which page to return. The query renders to the
//! `$select` / `$where` / `$group` / `$order` / `$limit` / `$offset` parameters of a
//! SODA resource endpoint. Keeping the query typed (rather than assembling strings at
//! each call site) lets all adapters share one filter predicate and lets test
//! fixtures evaluate a query without parsing SoQL.

use crate::error::{DashError, Result};
use crate::types::DateRange;
use chrono::NaiveDate;
use std::fmt;
use url::Url;

/// Raw creation timestamp column.
pub const CREATE_TIME_COLUMN: &str = "create_time";
/// Column holding the two-letter state code.
pub const REGION_COLUMN: &str = "state";
/// Event category column.
pub const EVENT_TYPE_COLUMN: &str = "event_type";
/// Alias of the day-truncated creation timestamp in result rows.
pub const CREATE_DAY_ALIAS: &str = "create_day";
/// Alias of `count(*)` in grouped result rows.
pub const COUNT_ALIAS: &str = "event_count";

/// Columns projected for raw event rows, in addition to the truncated day.
pub const EVENT_COLUMNS: [&str; 7] = [
    "event_type",
    "organization_name",
    "facility_name",
    "city",
    "responding_organization_id",
    "latitude",
    "longitude",
];

/// Upper bound on `$limit` for grouped queries.
const MAX_GROUP_ROWS: u32 = 50_000;

fn truncated_day() -> String {
    format!("date_trunc_ymd({CREATE_TIME_COLUMN})")
}

/// Quote a SoQL string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn iso(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// What a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Raw event rows with the fixed column set.
    Events,
    /// `(create_day, event_count)` grouped by truncated creation day.
    DailyCounts,
    /// `(event_type, event_count)` grouped by event type, busiest first.
    CategoryCounts,
    /// The latest truncated creation day in the dataset.
    LatestDay,
}

/// Row filter shared by every adapter: one region, one inclusive day range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    region: String,
    range: DateRange,
}

impl EventFilter {
    pub fn new(region: impl Into<String>, range: DateRange) -> Self {
        Self {
            region: region.into(),
            range,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    /// Render the `$where` predicate.
    pub fn to_soql(&self) -> String {
        format!(
            "{REGION_COLUMN} = {} AND {} between {} and {}",
            quote(&self.region),
            truncated_day(),
            quote(&iso(self.range.start())),
            quote(&iso(self.range.end())),
        )
    }

    /// Evaluate the predicate locally against a row's region and creation day.
    pub fn matches(&self, region: &str, day: NaiveDate) -> bool {
        region == self.region && self.range.contains(day)
    }
}

/// One request against the dataset endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoqlQuery {
    projection: Projection,
    filter: Option<EventFilter>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl SoqlQuery {
    /// One page of raw event rows.
    pub fn events_page(filter: EventFilter, offset: u32, limit: u32) -> Self {
        Self {
            projection: Projection::Events,
            filter: Some(filter),
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Event counts per truncated creation day. The limit covers every day of the
    /// range so the server's default row cap never truncates the result.
    pub fn daily_counts(filter: EventFilter) -> Self {
        let days = u32::try_from(filter.range().num_days()).unwrap_or(MAX_GROUP_ROWS);
        Self {
            projection: Projection::DailyCounts,
            filter: Some(filter),
            limit: Some(days.clamp(1, MAX_GROUP_ROWS)),
            offset: None,
        }
    }

    /// The `limit` busiest event types.
    pub fn category_counts(filter: EventFilter, limit: u32) -> Self {
        Self {
            projection: Projection::CategoryCounts,
            filter: Some(filter),
            limit: Some(limit),
            offset: None,
        }
    }

    /// Latest creation day across the whole dataset.
    pub fn latest_day() -> Self {
        Self {
            projection: Projection::LatestDay,
            filter: None,
            limit: None,
            offset: None,
        }
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn filter(&self) -> Option<&EventFilter> {
        self.filter.as_ref()
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    pub fn select_clause(&self) -> String {
        match self.projection {
            Projection::Events => format!(
                "{}, {} as {CREATE_DAY_ALIAS}",
                EVENT_COLUMNS.join(", "),
                truncated_day()
            ),
            Projection::DailyCounts => format!(
                "{} as {CREATE_DAY_ALIAS}, count(*) as {COUNT_ALIAS}",
                truncated_day()
            ),
            Projection::CategoryCounts => {
                format!("{EVENT_TYPE_COLUMN}, count(*) as {COUNT_ALIAS}")
            }
            Projection::LatestDay => format!(
                "date_trunc_ymd(max({CREATE_TIME_COLUMN})) as {CREATE_DAY_ALIAS}"
            ),
        }
    }

    pub fn group_clause(&self) -> Option<String> {
        match self.projection {
            Projection::DailyCounts => Some(truncated_day()),
            Projection::CategoryCounts => Some(EVENT_TYPE_COLUMN.to_string()),
            Projection::Events | Projection::LatestDay => None,
        }
    }

    /// Ordering. Event pages are ordered by row id so that offsets address a
    /// stable sequence across requests.
    pub fn order_clause(&self) -> Option<String> {
        match self.projection {
            Projection::Events => Some(":id".to_string()),
            Projection::DailyCounts => Some(truncated_day()),
            Projection::CategoryCounts => Some(format!("{COUNT_ALIAS} DESC")),
            Projection::LatestDay => None,
        }
    }

    /// Query-string parameters in a fixed order.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("$select", self.select_clause())];
        if let Some(filter) = &self.filter {
            params.push(("$where", filter.to_soql()));
        }
        if let Some(group) = self.group_clause() {
            params.push(("$group", group));
        }
        if let Some(order) = self.order_clause() {
            params.push(("$order", order));
        }
        if let Some(limit) = self.limit {
            params.push(("$limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("$offset", offset.to_string()));
        }
        params
    }

    /// Full request URL for a resource endpoint, percent-encoded.
    pub fn to_url(&self, endpoint: &str) -> Result<Url> {
        let params = self.to_params();
        Url::parse_with_params(endpoint, params.iter().map(|(k, v)| (*k, v.as_str())))
            .map_err(|e| DashError::config_with_source(format!("Invalid dataset endpoint '{endpoint}'"), e))
    }
}

impl fmt::Display for SoqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .to_params()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        write!(f, "{}", rendered.join("&"))
    }
}
