//! Domain types shared by the query pipeline, the renderers and the host.

use crate::error::{DashError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive calendar-day range selected by the user.
///
/// Construction goes through [`DateRange::new`], so a value of this type always
/// satisfies `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct UncheckedDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<UncheckedDateRange> for DateRange {
    type Error = DashError;

    fn try_from(raw: UncheckedDateRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DashError::validation_field(
                format!("start date {start} is after end date {end}"),
                "range",
            ));
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn single_day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `day` lies within the range, bounds included.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Number of calendar days covered, bounds included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// One row of the raw event dataset, with canonical field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_type: Option<String>,
    pub organization_name: Option<String>,
    pub facility_name: Option<String>,
    /// City the event was reported in.
    pub location: Option<String>,
    /// Creation timestamp truncated to the calendar day.
    pub create_time: NaiveDate,
    pub responding_org_id: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl EventRecord {
    /// Coordinates when both are present, finite and inside the valid
    /// latitude/longitude ranges.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        valid_coordinates(self.lat, self.lon)
    }
}

/// Ordered event rows; insertion order is page-fetch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTable {
    rows: Vec<EventRecord>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one page of rows, keeping their order.
    pub fn extend_page(&mut self, page: Vec<EventRecord>) {
        self.rows.extend(page);
    }

    pub fn rows(&self) -> &[EventRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventRecord> {
        self.rows.iter()
    }

    /// Project the table onto the fields the map view consumes. Rows without
    /// usable coordinates are kept; the map renderer skips them.
    pub fn map_points(&self) -> Vec<MapPoint> {
        self.rows.iter().map(MapPoint::from).collect()
    }

    pub fn into_rows(self) -> Vec<EventRecord> {
        self.rows
    }
}

impl From<Vec<EventRecord>> for EventTable {
    fn from(rows: Vec<EventRecord>) -> Self {
        Self { rows }
    }
}

impl<'a> IntoIterator for &'a EventTable {
    type Item = &'a EventRecord;
    type IntoIter = std::slice::Iter<'a, EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Number of events created on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: u64,
}

/// Number of events of one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub event_type: String,
    pub count: u64,
}

/// Fields of an event shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub event_type: Option<String>,
    pub organization_name: Option<String>,
    pub responding_org_id: Option<String>,
    pub location: Option<String>,
}

impl From<&EventRecord> for MapPoint {
    fn from(record: &EventRecord) -> Self {
        Self {
            lat: record.lat,
            lon: record.lon,
            event_type: record.event_type.clone(),
            organization_name: record.organization_name.clone(),
            responding_org_id: record.responding_org_id.clone(),
            location: record.location.clone(),
        }
    }
}

impl MapPoint {
    /// `(lon, lat)` when both coordinates are usable.
    pub fn plot_position(&self) -> Option<(f64, f64)> {
        valid_coordinates(self.lat, self.lon).map(|(lat, lon)| (lon, lat))
    }
}

fn valid_coordinates(lat: Option<f64>, lon: Option<f64>) -> Option<(f64, f64)> {
    match (lat, lon) {
        (Some(lat), Some(lon))
            if lat.is_finite()
                && lon.is_finite()
                && (-90.0..=90.0).contains(&lat)
                && (-180.0..=180.0).contains(&lon) =>
        {
            Some((lat, lon))
        }
        _ => None,
    }
}
