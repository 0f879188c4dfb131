pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub mod app;

pub use adapters::contrast::ContrastClient;
pub use config::AppConfig;
pub use crate::core::engine::{BatchReport, EnableOptions, IntegrationEngine, RuleOutcome};
pub use crate::core::integration::Integration;
pub use domain::model::Provider;
pub use utils::error::{IntegrationError, Result};
