//! Decoding of SODA result rows into domain types.
//!
//! SODA serialises every value as a string, counts included, and omits keys whose
//! value is null. Decoding is lenient where the dashboard can live with a gap
//! (coordinates, descriptive text) and strict where it cannot (days, counts): a
//! row without a usable day or count fails the whole response.

use chrono::NaiveDate;
use ny511_common::{parse_day, CategoryCount, DailyCount, DashError, EventRecord, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Event type reported for rows whose category is null.
pub const UNKNOWN_EVENT_TYPE: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(default, deserialize_with = "lenient_string")]
    event_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    organization_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    facility_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    responding_organization_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(deserialize_with = "required_day")]
    create_day: NaiveDate,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            event_type: row.event_type,
            organization_name: row.organization_name,
            facility_name: row.facility_name,
            location: row.city,
            create_time: row.create_day,
            responding_org_id: row.responding_organization_id,
            lat: row.latitude,
            lon: row.longitude,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DayCountRow {
    #[serde(deserialize_with = "required_day")]
    create_day: NaiveDate,
    #[serde(deserialize_with = "count")]
    event_count: u64,
}

#[derive(Debug, Deserialize)]
struct CategoryRow {
    #[serde(default, deserialize_with = "lenient_string")]
    event_type: Option<String>,
    #[serde(deserialize_with = "count")]
    event_count: u64,
}

#[derive(Debug, Deserialize)]
struct LatestDayRow {
    #[serde(default, deserialize_with = "optional_day")]
    create_day: Option<NaiveDate>,
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row).map_err(|e| {
                DashError::remote_fetch_with_source(format!("Malformed {what} row at index {index}"), e)
            })
        })
        .collect()
}

/// Raw event rows, in response order.
pub fn decode_events(rows: Vec<Value>) -> Result<Vec<EventRecord>> {
    Ok(decode_rows::<EventRow>(rows, "event")?
        .into_iter()
        .map(EventRecord::from)
        .collect())
}

/// Grouped per-day counts.
pub fn decode_daily_counts(rows: Vec<Value>) -> Result<Vec<DailyCount>> {
    Ok(decode_rows::<DayCountRow>(rows, "daily count")?
        .into_iter()
        .map(|row| DailyCount {
            day: row.create_day,
            count: row.event_count,
        })
        .collect())
}

/// Grouped per-type counts; a null type becomes [`UNKNOWN_EVENT_TYPE`].
pub fn decode_category_counts(rows: Vec<Value>) -> Result<Vec<CategoryCount>> {
    Ok(decode_rows::<CategoryRow>(rows, "category count")?
        .into_iter()
        .map(|row| CategoryCount {
            event_type: row
                .event_type
                .unwrap_or_else(|| UNKNOWN_EVENT_TYPE.to_string()),
            count: row.event_count,
        })
        .collect())
}

/// The single aggregate row of a latest-day query. An empty dataset yields one
/// row without the day.
pub fn decode_latest_day(rows: Vec<Value>) -> Result<Option<NaiveDate>> {
    Ok(decode_rows::<LatestDayRow>(rows, "latest day")?
        .into_iter()
        .next()
        .and_then(|row| row.create_day))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}

fn optional_day<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => parse_day(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid date '{s}'"))),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(de::Error::custom(format!("expected a date string, got {other}"))),
    }
}

fn required_day<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    optional_day(deserializer)?.ok_or_else(|| de::Error::custom("missing date"))
}

fn count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("invalid count {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("invalid count '{s}'"))),
        other => Err(de::Error::custom(format!("expected a count, got {other}"))),
    }
}
