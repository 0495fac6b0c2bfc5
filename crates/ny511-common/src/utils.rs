//! Shared formatting and parsing helpers.

use crate::types::DateRange;
use chrono::NaiveDate;

/// Human-readable label for a date range, e.g.
/// `"January 20, 2020 - April 20, 2020"`.
pub fn format_range_label(range: &DateRange) -> String {
    format!(
        "{} - {}",
        format_long_date(range.start()),
        format_long_date(range.end())
    )
}

/// `"January 20, 2020"`
pub fn format_long_date(day: NaiveDate) -> String {
    day.format("%B %-d, %Y").to_string()
}

/// Parse the calendar day out of a SODA date or floating timestamp
/// (`2020-01-01`, `2020-01-01T08:15:00.000`).
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Truncates a string to a maximum number of characters with ellipsis.
pub fn truncate_label(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        input.to_string()
    } else {
        let kept: String = input.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_range_label() {
        let range = DateRange::new(day(2020, 1, 20), day(2020, 4, 20)).unwrap();
        assert_eq!(
            format_range_label(&range),
            "January 20, 2020 - April 20, 2020"
        );
    }

    #[test]
    fn test_format_long_date_has_no_padding() {
        assert_eq!(format_long_date(day(2021, 11, 6)), "November 6, 2021");
    }

    #[test]
    fn test_parse_day_variants() {
        assert_eq!(parse_day("2020-01-01"), Some(day(2020, 1, 1)));
        assert_eq!(parse_day("2020-01-01T08:15:00.000"), Some(day(2020, 1, 1)));
        assert_eq!(parse_day(" 2020-02-29T00:00:00 "), Some(day(2020, 2, 29)));
        assert_eq!(parse_day("01/02/2020"), None);
        assert_eq!(parse_day(""), None);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Short", 20), "Short");
        assert_eq!(
            truncate_label("This is a very long string that should be truncated", 20),
            "This is a very lo..."
        );
        // multi-byte characters must not split
        assert_eq!(truncate_label("ÄÖÜÄÖÜÄÖÜ", 6), "ÄÖÜ...");
    }
}
