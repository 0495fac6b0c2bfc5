//! Shared building blocks for ny511-dash: domain types, the SODA client, the typed
//! query model, error handling and logging setup.

pub mod error;
pub mod logging;
pub mod socrata;
pub mod soql;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use error::{DashError, Result};
pub use logging::{init_default_logging, init_logging, LoggingConfig};
pub use socrata::{ClientMetrics, DatasetSource, SocrataClient, SocrataConfig, DEFAULT_ENDPOINT};
pub use soql::{EventFilter, Projection, SoqlQuery};
pub use types::{CategoryCount, DailyCount, DateRange, EventRecord, EventTable, MapPoint};
pub use utils::{format_long_date, format_range_label, parse_day, truncate_label};

/// Re-export commonly used external dependencies
pub use async_trait::async_trait;
pub use chrono;
pub use serde::{Deserialize, Serialize};
pub use tracing::{debug, error, info, instrument, trace, warn};
