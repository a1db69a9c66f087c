//! Health Analytics
//!
//! Statistical analysis over aligned daily nutrition and wearable metrics.
//!
//! ## Architecture
//!
//! - **CorrelationEngine**: Lagged Pearson correlations with p-values
//! - **CausalEngine**: Approximate Granger test and causal graph
//! - **Forecasting**: Moving average, exponential smoothing, linear extrapolation
//! - **Trends / Risk**: Trajectory labels, anomalies, rule-based risk scoring
//! - **AnalyticsEngine**: Runs all of the above and builds an `AnalysisReport`
//!
//! ## Data Flow
//!
//! 1. Aggregated daily mappings come in from `metrics`
//! 2. Correlations are computed and ranked by |r|
//! 3. The top correlations feed the causal graph
//! 4. Wearable metrics get trends, forecasts and risk assessments
//! 5. A fallback summary is assembled from the top findings

mod causal;
mod config;
mod correlations;
mod engine;
mod error;
mod forecast;
mod risk;
pub mod stats;
mod summary;
mod trends;

pub use causal::{
    granger_test, CausalEdge, CausalEngine, CausalGraph, CausalNode, Evidence, GrangerResult,
};
pub use config::{
    default_catalog, AnalyticsConfig, CorrelationCategory, CorrelationPair, RiskConfig,
};
pub use correlations::{
    align_with_lag, correlate_pair, insufficient_data_message, AlignedPoint, AnalysisStatus,
    CorrelationEngine, CorrelationReport, CorrelationResult, Direction, Strength,
};
pub use engine::{
    log_dropped, sort_predictions, wearable_metrics, AnalysisReport, AnalyticsEngine,
};
pub use error::{AnalyticsError, AnalyticsResult};
pub use forecast::{
    exponential_smoothing, linear_forecast, moving_average, predict_metric, predict_smoothed,
    HealthPrediction, LinearForecast, Smoothed, LINEAR_MODEL, MIN_FORECAST_POINTS,
    SMOOTHING_MODEL,
};
pub use risk::{
    assess_all, assess_burnout, assess_recovery_decline, assess_sleep_decline, HealthRiskAssessment,
    RiskCategory, RiskFactor, RiskLevel, RiskType,
};
pub use summary::fallback_summary;
pub use trends::{
    analyze_trend, classify_trend, detect_anomalies, AnomalyPoint, HealthTrend, Significance,
    TrendType, MIN_TREND_POINTS,
};
