//! Test utilities and shared test helpers for ny511-dash.
//!
//! The centrepiece is [`FixtureSource`], an in-memory [`DatasetSource`] that
//! evaluates typed [`SoqlQuery`] values against a fixed set of raw rows the way the
//! SODA endpoint would: region/day filtering, offset/limit paging and grouped counts.

use crate::error::{DashError, Result};
use crate::soql::{Projection, SoqlQuery, COUNT_ALIAS, CREATE_DAY_ALIAS, EVENT_COLUMNS, REGION_COLUMN};
use crate::socrata::DatasetSource;
use crate::types::DateRange;
use crate::utils::parse_day;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, Once};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize logging for tests. Safe to call any number of times.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
    });
}

/// Shorthand for a calendar day.
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Shorthand for a validated range.
pub fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end).expect("fixture range must be ordered")
}

/// Raw dataset rows as the SODA endpoint stores them.
pub mod rows {
    use super::*;

    /// A New York event created at noon on `created` (`YYYY-MM-DD`).
    pub fn event(event_type: &str, created: &str) -> Value {
        event_at(event_type, created, Some("42.6526"), Some("-73.7562"))
    }

    /// A New York event with explicit coordinate strings.
    pub fn event_at(event_type: &str, created: &str, lat: Option<&str>, lon: Option<&str>) -> Value {
        event_in("NY", event_type, created, lat, lon)
    }

    /// An event in an arbitrary region.
    pub fn event_in(
        region: &str,
        event_type: &str,
        created: &str,
        lat: Option<&str>,
        lon: Option<&str>,
    ) -> Value {
        let mut row = Map::new();
        row.insert("event_type".into(), json!(event_type));
        row.insert("organization_name".into(), json!("NYSDOT"));
        row.insert("facility_name".into(), json!("I-87"));
        row.insert("city".into(), json!("Albany"));
        row.insert("county".into(), json!("Albany"));
        row.insert(REGION_COLUMN.into(), json!(region));
        row.insert("responding_organization_id".into(), json!("17"));
        row.insert("create_time".into(), json!(format!("{created}T12:00:00.000")));
        if let Some(lat) = lat {
            row.insert("latitude".into(), json!(lat));
        }
        if let Some(lon) = lon {
            row.insert("longitude".into(), json!(lon));
        }
        Value::Object(row)
    }

    /// `count` identical events on one day, numbered through `facility_name` so
    /// rows stay distinguishable.
    pub fn many(event_type: &str, created: &str, count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                let mut row = event(event_type, created);
                row["facility_name"] = json!(format!("segment-{i}"));
                row
            })
            .collect()
    }
}

/// In-memory dataset that answers [`SoqlQuery`] values.
#[derive(Default)]
pub struct FixtureSource {
    rows: Vec<Value>,
    page_delays: HashMap<u32, Duration>,
    failing: Vec<Projection>,
    malformed: Vec<Projection>,
    queries: Mutex<Vec<SoqlQuery>>,
}

impl FixtureSource {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Delay the response to the event page starting at `offset`.
    pub fn with_page_delay(mut self, offset: u32, delay: Duration) -> Self {
        self.page_delays.insert(offset, delay);
        self
    }

    /// Fail every query with this projection as a transport error would.
    pub fn failing_on(mut self, projection: Projection) -> Self {
        self.failing.push(projection);
        self
    }

    /// Answer queries with this projection with rows that do not decode.
    pub fn malformed_on(mut self, projection: Projection) -> Self {
        self.malformed.push(projection);
        self
    }

    /// Every query received so far, in arrival order.
    pub fn queries(&self) -> Vec<SoqlQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Number of queries received with the given projection.
    pub fn call_count(&self, projection: Projection) -> usize {
        self.queries()
            .iter()
            .filter(|q| q.projection() == projection)
            .count()
    }

    fn matching_rows(&self, query: &SoqlQuery) -> Vec<(NaiveDate, &Map<String, Value>)> {
        self.rows
            .iter()
            .filter_map(|row| row.as_object())
            .filter_map(|row| {
                let day = row.get("create_time").and_then(Value::as_str).and_then(parse_day)?;
                let region = row.get(REGION_COLUMN).and_then(Value::as_str).unwrap_or_default();
                match query.filter() {
                    Some(filter) if !filter.matches(region, day) => None,
                    _ => Some((day, row)),
                }
            })
            .collect()
    }

    fn evaluate(&self, query: &SoqlQuery) -> Vec<Value> {
        let matching = self.matching_rows(query);
        let offset = query.offset().unwrap_or(0) as usize;
        let limit = query.limit().map_or(usize::MAX, |l| l as usize);

        let rows: Vec<Value> = match query.projection() {
            Projection::Events => matching
                .into_iter()
                .map(|(day, row)| {
                    let mut out = Map::new();
                    for column in EVENT_COLUMNS {
                        if let Some(value) = row.get(column) {
                            out.insert(column.to_string(), value.clone());
                        }
                    }
                    out.insert(CREATE_DAY_ALIAS.into(), json!(floating(day)));
                    Value::Object(out)
                })
                .collect(),
            Projection::DailyCounts => {
                let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
                for (day, _) in matching {
                    *by_day.entry(day).or_insert(0) += 1;
                }
                by_day
                    .into_iter()
                    .map(|(day, count)| {
                        json!({ CREATE_DAY_ALIAS: floating(day), COUNT_ALIAS: count.to_string() })
                    })
                    .collect()
            }
            Projection::CategoryCounts => {
                let mut by_type: HashMap<Option<String>, u64> = HashMap::new();
                for (_, row) in matching {
                    let event_type = row.get("event_type").and_then(Value::as_str).map(str::to_string);
                    *by_type.entry(event_type).or_insert(0) += 1;
                }
                let mut grouped: Vec<(Option<String>, u64)> = by_type.into_iter().collect();
                grouped.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                grouped
                    .into_iter()
                    .map(|(event_type, count)| {
                        let mut out = Map::new();
                        if let Some(event_type) = event_type {
                            out.insert("event_type".into(), json!(event_type));
                        }
                        out.insert(COUNT_ALIAS.into(), json!(count.to_string()));
                        Value::Object(out)
                    })
                    .collect()
            }
            Projection::LatestDay => {
                // SODA answers an aggregate over zero rows with one empty object
                match matching.into_iter().map(|(day, _)| day).max() {
                    Some(day) => vec![json!({ CREATE_DAY_ALIAS: floating(day) })],
                    None => vec![json!({})],
                }
            }
        };

        rows.into_iter().skip(offset).take(limit).collect()
    }
}

fn floating(day: NaiveDate) -> String {
    format!("{}T00:00:00.000", day.format("%Y-%m-%d"))
}

#[async_trait]
impl DatasetSource for FixtureSource {
    async fn fetch_rows(&self, query: &SoqlQuery) -> Result<Vec<Value>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        if query.projection() == Projection::Events {
            if let Some(delay) = self.page_delays.get(&query.offset().unwrap_or(0)) {
                tokio::time::sleep(*delay).await;
            }
        }

        if self.failing.contains(&query.projection()) {
            return Err(DashError::remote_fetch_with_status(
                "fixture: service unavailable",
                503,
            ));
        }

        if self.malformed.contains(&query.projection()) {
            return Ok(vec![json!({ CREATE_DAY_ALIAS: 42, COUNT_ALIAS: "many" })]);
        }

        Ok(self.evaluate(query))
    }
}

/// Configuration-related test utilities.
pub mod config_fixtures {
    /// A minimal valid configuration as YAML.
    pub fn minimal_config_yaml() -> &'static str {
        r#"
dataset:
  endpoint: "https://data.ny.gov/resource/ah74-pg4w.json"
  region: "NY"
"#
    }

    /// A configuration exercising every section.
    pub fn full_config_yaml() -> &'static str {
        concat!(
            "dataset:\n",
            "  endpoint: \"https://data.ny.gov/resource/ah74-pg4w.json\"\n",
            "  app_token: \"fixture-token\"\n",
            "  region: \"NY\"\n",
            "  timeout_seconds: 20\n",
            "  max_retries: 2\n",
            "  rate_limit_per_sec: 5\n",
            "\n",
            "paging:\n",
            "  mode: cursor\n",
            "  page_size: 500\n",
            "  page_count: 4\n",
            "  cursor_page_limit: 20\n",
            "  concurrent: false\n",
            "\n",
            "pipeline:\n",
            "  daily_strategy: server_side\n",
            "  top_categories: 5\n",
            "  overall_timeout_seconds: 60\n",
            "\n",
            "picker:\n",
            "  min_date: \"2012-11-06\"\n",
            "  default_start: \"2020-01-20\"\n",
            "  default_end: \"2020-04-20\"\n",
            "  default_span_days: 30\n",
            "\n",
            "charts:\n",
            "  width: 1024\n",
            "  height: 768\n",
            "  dark_theme: true\n",
            "  background_color: \"#111111\"\n",
            "  point_color: \"#ff7f0e\"\n",
            "  point_opacity: 0.5\n",
            "  heat_low_color: \"#0e4429\"\n",
            "  heat_high_color: \"#39d353\"\n",
            "  bar_color: \"#1f77b4\"\n",
            "  output_dir: \"out\"\n",
            "\n",
            "logging:\n",
            "  level: \"debug\"\n",
            "  json: false\n"
        )
    }
}
