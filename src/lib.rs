//! # HealthLens
//!
//! Health time-series analytics - correlates daily nutrition with sleep,
//! readiness and activity from a wearable, and reports what it finds.
//!
//! ## Features
//!
//! - **Daily aggregation**: Meals and wearable summaries → one value per metric per day
//! - **Correlations**: Lagged Pearson r with a two-sided p-value from the incomplete beta function
//! - **Causal graph**: Approximate Granger test over the strongest correlations
//! - **Forecasts**: Linear extrapolation and exponential smoothing with intervals
//! - **Trends and risks**: Trajectory labels, anomalies and rule-based risk scores
//! - **Summary**: Plain-language findings without any external service
//!
//! ## Modules
//!
//! - [`metrics`]: Metric vocabulary and daily aggregation
//! - [`analysis`]: Statistics, correlations, causality, forecasts, trends, risk
//! - [`sources`]: Where raw records come from (files, CSV, memory)
//! - [`service`]: Async pipeline tying sources to the analytics engine
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healthlens::analysis::AnalyticsEngine;
//! use healthlens::service::AnalysisService;
//! use healthlens::sources::FileSource;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = FileSource::new()
//!         .with_meals("meals.csv")
//!         .with_wearable("wearable.json");
//!
//!     let service = AnalysisService::new(Arc::new(source), AnalyticsEngine::default())
//!         .with_lookback(Some(90));
//!
//!     let report = service.run().await?;
//!     println!("{}", report.summary);
//!
//!     for c in &report.correlations {
//!         println!("{} → {}: r = {:.2}", c.metric_a, c.metric_b, c.coefficient);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod metrics;
pub mod service;
pub mod sources;

// Re-export top-level types for convenience
pub use analysis::{
    AnalysisReport, AnalyticsConfig, AnalyticsEngine, AnalyticsError, AnalyticsResult,
    RiskConfig,
};

pub use config::{Config, ConfigError, LoggingConfig, SourcesConfig};

pub use metrics::{DailyMetrics, MealRecord, MetricId, WearableDay};

pub use service::{AnalysisService, DailyInputs, ServiceError};

pub use sources::{FileSource, HealthDataSource, MemorySource, SourceError};
