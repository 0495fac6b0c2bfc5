//! Configuration schema definitions using serde with validation attributes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError, ValidationErrors};

/// Main configuration structure for ny511-dash.
///
/// Every section falls back to its defaults when omitted, so a file only has to
/// mention what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Remote dataset and HTTP client settings.
    #[validate]
    pub dataset: DatasetSettings,
    /// How raw event pages are requested.
    #[validate]
    pub paging: PagingSettings,
    /// Adapter strategies and limits.
    #[validate]
    pub pipeline: PipelineSettings,
    /// Selectable date window and default range.
    #[validate]
    pub picker: PickerSettings,
    /// Chart output.
    #[validate]
    pub charts: ChartSettings,
    /// Log output.
    #[validate]
    pub logging: LogSettings,
}

/// Remote dataset configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatasetSettings {
    /// SODA resource endpoint.
    #[validate(url(message = "Dataset endpoint must be a valid URL"))]
    pub endpoint: String,

    /// Socrata application token sent as `X-App-Token`.
    #[validate(custom(
        function = "crate::validation::validate_app_token",
        message = "App token cannot be blank"
    ))]
    pub app_token: Option<String>,

    /// File holding the application token. Read at load time when `app_token`
    /// is not set.
    #[validate(custom(
        function = "crate::validation::validate_file_path",
        message = "Invalid app token file path"
    ))]
    pub app_token_file: Option<String>,

    /// Two-letter code matched against the `state` column.
    #[validate(regex(
        path = "crate::validation::REGION_REGEX",
        message = "Region must be a two-letter upper-case code"
    ))]
    pub region: String,

    /// Per-request timeout in seconds.
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// Retries after a failed request.
    #[validate(range(max = 10, message = "Max retries cannot exceed 10"))]
    pub max_retries: usize,

    /// Client-side request rate limit.
    #[validate(range(min = 1, max = 1000, message = "Rate limit must be between 1 and 1000 requests per second"))]
    pub rate_limit_per_sec: u32,
}

/// Page fan-out strategy for raw event rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingMode {
    /// Always request `page_count` pages of `page_size` rows.
    Fixed,
    /// Request pages until a short page, bounded by `cursor_page_limit`.
    Cursor,
}

impl FromStr for PagingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "cursor" => Ok(Self::Cursor),
            other => Err(format!("unknown paging mode '{other}' (expected fixed or cursor)")),
        }
    }
}

impl fmt::Display for PagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Cursor => write!(f, "cursor"),
        }
    }
}

/// Paging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PagingSettings {
    pub mode: PagingMode,

    #[validate(range(min = 1, max = 50000, message = "Page size must be between 1 and 50000 rows"))]
    pub page_size: u32,

    /// Number of pages requested in fixed mode.
    #[validate(range(min = 1, max = 100, message = "Page count must be between 1 and 100"))]
    pub page_count: u32,

    /// Upper bound on pages in cursor mode.
    #[validate(range(min = 1, max = 1000, message = "Cursor page limit must be between 1 and 1000"))]
    pub cursor_page_limit: u32,

    /// Issue fixed-mode pages concurrently.
    pub concurrent: bool,
}

/// How per-day counts are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyStrategy {
    /// Group the fetched event table locally.
    FromEvents,
    /// Issue one grouped-count query.
    ServerSide,
}

impl fmt::Display for DailyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromEvents => write!(f, "from_events"),
            Self::ServerSide => write!(f, "server_side"),
        }
    }
}

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineSettings {
    pub daily_strategy: DailyStrategy,

    /// Number of categories shown in the bar chart.
    #[validate(range(min = 1, max = 50, message = "Top categories must be between 1 and 50"))]
    pub top_categories: u32,

    /// Upper bound on one adapter run, retries included.
    #[validate(range(min = 1, max = 3600, message = "Overall timeout must be between 1 and 3600 seconds"))]
    pub overall_timeout_seconds: u64,
}

/// Date picker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PickerSettings {
    /// Earliest selectable day.
    pub min_date: NaiveDate,
    pub default_start: Option<NaiveDate>,
    pub default_end: Option<NaiveDate>,
    /// Length of the fallback range ending at the latest available day.
    #[validate(range(min = 1, max = 3660, message = "Default span must be between 1 and 3660 days"))]
    pub default_span_days: u32,
}

impl PickerSettings {
    /// Cross-field checks the derive cannot express.
    pub fn validate_window(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match (self.default_start, self.default_end) {
            (Some(start), Some(end)) => {
                if start > end {
                    errors.add("default_start", ValidationError::new("default_range_reversed"));
                }
                if start < self.min_date {
                    errors.add("default_start", ValidationError::new("default_start_before_min_date"));
                }
            }
            (None, None) => {}
            _ => errors.add("default_end", ValidationError::new("default_range_incomplete")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Chart rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ChartSettings {
    #[validate(range(min = 100, max = 4000, message = "Width must be between 100 and 4000 pixels"))]
    pub width: u32,

    #[validate(range(min = 100, max = 4000, message = "Height must be between 100 and 4000 pixels"))]
    pub height: u32,

    /// Light text on dark backgrounds.
    pub dark_theme: bool,

    #[validate(regex(path = "crate::validation::HEX_COLOR_REGEX", message = "Background color must be valid hex color"))]
    pub background_color: String,

    #[validate(regex(path = "crate::validation::HEX_COLOR_REGEX", message = "Point color must be valid hex color"))]
    pub point_color: String,

    #[validate(range(min = 0.0, max = 1.0, message = "Point opacity must be between 0 and 1"))]
    pub point_opacity: f64,

    #[validate(range(min = 1, max = 20, message = "Point size must be between 1 and 20 pixels"))]
    pub point_size: u32,

    #[validate(regex(path = "crate::validation::HEX_COLOR_REGEX", message = "Heatmap low color must be valid hex color"))]
    pub heat_low_color: String,

    #[validate(regex(path = "crate::validation::HEX_COLOR_REGEX", message = "Heatmap high color must be valid hex color"))]
    pub heat_high_color: String,

    #[validate(regex(path = "crate::validation::HEX_COLOR_REGEX", message = "Bar color must be valid hex color"))]
    pub bar_color: String,

    /// Directory the CLI writes datasets and images to.
    #[validate(custom(
        function = "crate::validation::validate_file_path",
        message = "Invalid output directory"
    ))]
    pub output_dir: String,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LogSettings {
    /// Log level (trace, debug, info, warn, error)
    #[validate(custom(
        function = "crate::validation::validate_log_level",
        message = "Log level must be one of: trace, debug, info, warn, error"
    ))]
    pub level: String,

    /// One JSON object per event.
    pub json: bool,

    /// Multi-line human-readable output.
    pub pretty: bool,

    /// Optional log file path
    #[validate(custom(
        function = "crate::validation::validate_file_path",
        message = "Invalid log file path"
    ))]
    pub file: Option<String>,
}

impl Config {
    /// Derive validation plus the cross-field checks.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.picker.validate_window()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate_all().is_ok());
        assert_eq!(config.paging.mode, PagingMode::Fixed);
        assert_eq!(config.paging.page_size, 1000);
        assert_eq!(config.paging.page_count, 5);
        assert_eq!(config.pipeline.daily_strategy, DailyStrategy::FromEvents);
        assert_eq!(config.pipeline.top_categories, 5);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).expect("Failed to serialize to YAML");
        assert!(yaml.contains("dataset:"));
        assert!(yaml.contains("mode: fixed"));
        assert!(yaml.contains("daily_strategy: from_events"));

        let deserialized: Config = serde_yaml::from_str(&yaml).expect("Failed to deserialize");
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_nested_sections_are_validated() {
        let mut config = Config::default();
        config.paging.page_size = 0;
        assert!(config.validate_all().is_err());

        let mut config = Config::default();
        config.dataset.region = "ny".to_string();
        assert!(config.validate_all().is_err());

        let mut config = Config::default();
        config.dataset.endpoint = "not a url".to_string();
        assert!(config.validate_all().is_err());
    }

    #[test]
    fn test_chart_settings_validation() {
        let mut charts = ChartSettings::default();
        assert!(charts.validate().is_ok());

        charts.point_opacity = 1.5;
        assert!(charts.validate().is_err());

        charts.point_opacity = 0.5;
        charts.bar_color = "#FFF".to_string();
        assert!(charts.validate().is_err());
    }

    #[test]
    fn test_logging_settings_validation() {
        let mut logging = LogSettings::default();
        assert!(logging.validate().is_ok());

        logging.level = "loud".to_string();
        assert!(logging.validate().is_err());
    }

    #[test]
    fn test_paging_mode_from_str() {
        assert_eq!("cursor".parse::<PagingMode>(), Ok(PagingMode::Cursor));
        assert_eq!("FIXED".parse::<PagingMode>(), Ok(PagingMode::Fixed));
        assert!("sometimes".parse::<PagingMode>().is_err());
        assert_eq!(PagingMode::Cursor.to_string(), "cursor");
    }

    #[test]
    fn test_blank_app_token_rejected() {
        let mut dataset = DatasetSettings::default();
        dataset.app_token = Some("  ".to_string());
        assert!(dataset.validate().is_err());

        dataset.app_token = None;
        assert!(dataset.validate().is_ok());
    }

    #[test]
    fn test_picker_window_checks() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let mut picker = PickerSettings::default();
        assert!(picker.validate_window().is_ok());

        picker.default_start = Some(day(2020, 4, 20));
        picker.default_end = Some(day(2020, 1, 20));
        assert!(picker.validate_window().is_err());

        picker.default_start = Some(day(2010, 1, 1));
        picker.default_end = Some(day(2010, 2, 1));
        assert!(picker.validate_window().is_err());

        picker.default_start = Some(day(2020, 1, 20));
        picker.default_end = None;
        assert!(picker.validate_window().is_err());

        picker.default_start = None;
        assert!(picker.validate_window().is_ok());
    }

    proptest! {
        #[test]
        fn prop_paging_mode_display_parses_back(cursor in any::<bool>(), upper in any::<bool>()) {
            let mode = if cursor { PagingMode::Cursor } else { PagingMode::Fixed };
            let text = if upper { mode.to_string().to_uppercase() } else { mode.to_string() };
            prop_assert_eq!(text.parse::<PagingMode>(), Ok(mode));
        }

        #[test]
        fn prop_default_window_accepts_ordered_days(a in 0i64..5000, b in 0i64..5000) {
            let picker = PickerSettings::default();
            let first = picker.min_date + chrono::Duration::days(a.min(b));
            let last = picker.min_date + chrono::Duration::days(a.max(b));

            let ordered = PickerSettings {
                default_start: Some(first),
                default_end: Some(last),
                ..picker.clone()
            };
            prop_assert!(ordered.validate_window().is_ok());

            let reversed = PickerSettings {
                default_start: Some(last),
                default_end: Some(first),
                ..picker
            };
            prop_assert_eq!(reversed.validate_window().is_ok(), a == b);
        }
    }
}
