//! Core library for ghpulse.
//!
//! Turns an account name and a number of days into a dense, per-day series
//! of commit counts and line changes across the account's repositories.
//!
//! # Modules
//!
//! - [`activity`] - The orchestrator, its report, and absorbed diagnostics
//! - [`aggregate`] - Day windows, buckets, folding and merging
//! - [`commits`] - Commit listing and per-commit line statistics
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//! - [`http`] - The JSON fetch seam and its reqwest implementation
//! - [`repos`] - Repository listing
//!
//! # Quick Start
//!
//! ```no_run
//! use ghpulse_core::{ActivityPipeline, ActivityRequest, ConfigLoader};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let report = ActivityPipeline::from_config(&config)?
//!     .run(&ActivityRequest::new("octocat", 30), None)
//!     .await?;
//!
//! for day in &report.days {
//!     println!("{} {} commits", day.date, day.count);
//! }
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod activity;

pub mod aggregate;

pub mod commits;

pub mod config;

pub mod error;

pub mod http;

pub mod repos;

#[cfg(test)]
mod test_support;

pub use activity::{
    ActivityEvent, ActivityPipeline, ActivityReport, ActivityRequest, Diagnostic, compute_activity,
};

pub use aggregate::{DayBucket, DayTable, Window};

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ActivityError, ActivityResult, ConfigError, ConfigResult, FetchError, FetchResult};
