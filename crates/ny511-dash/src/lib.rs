//! # ny511 Dash
//!
//! Command line host for the 511 NY event dashboard. Each run resolves a date
//! range against the dataset, dispatches it to the pipeline and writes the three
//! datasets plus their charts to an output directory.

#![warn(clippy::all)]

pub mod app;
pub mod cli;
pub mod error;

pub use app::{DashboardApp, RunOptions, RunReport};
pub use cli::Args;
pub use error::{AppError, AppResult};
