//! Selectable date window and default range resolution.

use crate::events::RangeQueryBuilder;
use chrono::{Datelike, Duration, NaiveDate};
use ny511_common::{DashError, DateRange, Result};
use ny511_config::PickerSettings;
use tracing::{info, instrument};

/// Bounds of the date picker plus its defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePicker {
    min_date: NaiveDate,
    max_date: NaiveDate,
    default_range: Option<DateRange>,
    default_span_days: u32,
}

impl DatePicker {
    pub fn new(min_date: NaiveDate, max_date: NaiveDate) -> Result<Self> {
        if min_date > max_date {
            return Err(DashError::validation_field(
                format!("earliest selectable day {min_date} is after the latest {max_date}"),
                "picker",
            ));
        }
        Ok(Self {
            min_date,
            max_date,
            default_range: None,
            default_span_days: 30,
        })
    }

    /// Window from configuration, ending at `latest`.
    pub fn from_settings(settings: &PickerSettings, latest: NaiveDate) -> Result<Self> {
        let mut picker = Self::new(settings.min_date, latest)?;
        picker.default_span_days = settings.default_span_days.max(1);
        if let (Some(start), Some(end)) = (settings.default_start, settings.default_end) {
            picker.default_range = Some(DateRange::new(start, end)?);
        }
        Ok(picker)
    }

    /// Window ending at the latest day in the dataset, or at `fallback` when the
    /// dataset is empty.
    #[instrument(skip(builder, settings))]
    pub async fn discover(
        builder: &RangeQueryBuilder,
        settings: &PickerSettings,
        fallback: NaiveDate,
    ) -> Result<Self> {
        let latest = builder.fetch_latest_day().await?.unwrap_or(fallback);
        info!("Latest available day is {}", latest);
        Self::from_settings(settings, latest)
    }

    pub fn min_date(&self) -> NaiveDate {
        self.min_date
    }

    pub fn max_date(&self) -> NaiveDate {
        self.max_date
    }

    /// First day of the month containing the latest selectable day.
    pub fn initial_visible_month(&self) -> NaiveDate {
        self.max_date.with_day(1).unwrap_or(self.max_date)
    }

    /// Reject ranges that leave the selectable window.
    pub fn check(&self, range: &DateRange) -> Result<()> {
        if range.start() < self.min_date || range.end() > self.max_date {
            return Err(DashError::validation_field(
                format!(
                    "range {range} is outside the selectable window {}..={}",
                    self.min_date, self.max_date
                ),
                "range",
            ));
        }
        Ok(())
    }

    /// Resolve the range to show: explicit bounds first, then the configured
    /// default, otherwise the last `default_span_days` days of the window.
    pub fn resolve(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<DateRange> {
        let range = match (start, end) {
            (Some(start), Some(end)) => DateRange::new(start, end)?,
            (Some(start), None) => DateRange::new(start, self.max_date)?,
            (None, Some(end)) => DateRange::new(self.span_start(end), end)?,
            (None, None) => match self.default_range {
                Some(range) => range,
                None => DateRange::new(self.span_start(self.max_date), self.max_date)?,
            },
        };
        self.check(&range)?;
        Ok(range)
    }

    fn span_start(&self, end: NaiveDate) -> NaiveDate {
        let span = Duration::days(i64::from(self.default_span_days) - 1);
        end.checked_sub_signed(span)
            .map_or(self.min_date, |start| start.max(self.min_date))
    }
}
