//! ny511-dash - Main Entry Point

use anyhow::Result;
use clap::Parser;
use ny511_common::init_logging;
use ny511_config::ConfigLoader;
use ny511_dash::{Args, DashboardApp};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::load_from(args.config.as_deref())?;

    let mut logging = config.logging_config();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }
    init_logging(logging)?;

    info!("Starting ny511-dash {}", env!("CARGO_PKG_VERSION"));
    info!("Dataset endpoint: {}", config.dataset.endpoint);

    let options = args.run_options(&config);
    let app = DashboardApp::from_config(config)?;
    let report = app.run_once(&options).await?;

    for path in &report.written {
        info!("Wrote {}", path.display());
    }
    if let Err(e) = report.ensure_complete() {
        error!("{}", e);
        return Err(e.into());
    }

    info!("Dashboard for {} is ready", report.update.label);
    Ok(())
}
