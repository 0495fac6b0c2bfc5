//! Default values for every configuration section.

use crate::schema::*;
use chrono::NaiveDate;
use ny511_common::DEFAULT_ENDPOINT;

/// First day with data in the 511 NY events dataset.
pub const DATASET_MIN_DATE: (i32, u32, u32) = (2012, 11, 6);
/// Default range shown on start-up.
pub const DEFAULT_RANGE_START: (i32, u32, u32) = (2020, 1, 20);
pub const DEFAULT_RANGE_END: (i32, u32, u32) = (2020, 4, 20);

fn ymd((year, month, day): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: DatasetSettings::default(),
            paging: PagingSettings::default(),
            pipeline: PipelineSettings::default(),
            picker: PickerSettings::default(),
            charts: ChartSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_token: None,
            app_token_file: None,
            region: "NY".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            rate_limit_per_sec: 10,
        }
    }
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            mode: PagingMode::Fixed,
            page_size: 1000,
            page_count: 5,
            cursor_page_limit: 50,
            concurrent: true,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            daily_strategy: DailyStrategy::FromEvents,
            top_categories: 5,
            overall_timeout_seconds: 120,
        }
    }
}

impl Default for PickerSettings {
    fn default() -> Self {
        Self {
            min_date: ymd(DATASET_MIN_DATE).unwrap_or_default(),
            default_start: ymd(DEFAULT_RANGE_START),
            default_end: ymd(DEFAULT_RANGE_END),
            default_span_days: 90,
        }
    }
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            dark_theme: true,
            background_color: "#1E1E1E".to_string(),
            point_color: "#FF7F0E".to_string(),
            point_opacity: 0.5,
            point_size: 3,
            heat_low_color: "#0E4429".to_string(),
            heat_high_color: "#39D353".to_string(),
            bar_color: "#1F77B4".to_string(),
            output_dir: "dashboard".to_string(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            pretty: false,
            file: None,
        }
    }
}
