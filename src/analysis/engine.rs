//! Batch analytics driver
//!
//! Runs every engine over one pair of daily mappings and bundles the output
//! into an [`AnalysisReport`]. Per-item failures are logged and dropped.

use crate::analysis::causal::{CausalEngine, CausalGraph};
use crate::analysis::config::{AnalyticsConfig, RiskConfig};
use crate::analysis::correlations::{AnalysisStatus, CorrelationEngine, CorrelationReport, CorrelationResult};
use crate::analysis::error::{AnalyticsError, AnalyticsResult};
use crate::analysis::forecast::{self, HealthPrediction, MIN_FORECAST_POINTS};
use crate::analysis::risk::{self, HealthRiskAssessment};
use crate::analysis::summary::fallback_summary;
use crate::analysis::trends::{self, HealthTrend};
use crate::metrics::{DailyMetrics, Domain, MetricId};
use serde::{Deserialize, Serialize};

/// Everything one analysis run produces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub overlapping_days: usize,
    pub correlations: Vec<CorrelationResult>,
    pub causal_graph: CausalGraph,
    pub predictions: Vec<HealthPrediction>,
    pub trends: Vec<HealthTrend>,
    pub risks: Vec<HealthRiskAssessment>,
    pub summary: String,
}

impl AnalysisReport {
    /// Assemble a report from already computed parts
    pub fn assemble(
        correlations: CorrelationReport,
        causal_graph: CausalGraph,
        predictions: Vec<HealthPrediction>,
        trends: Vec<HealthTrend>,
        risks: Vec<HealthRiskAssessment>,
    ) -> Self {
        let summary = fallback_summary(&correlations.correlations, &trends, &risks);
        Self {
            status: correlations.status,
            message: correlations.message,
            overlapping_days: correlations.overlapping_days,
            correlations: correlations.correlations,
            causal_graph,
            predictions,
            trends,
            risks,
            summary,
        }
    }
}

/// Synchronous analytics engine
///
/// Holds only immutable configuration, so one instance can be shared across
/// threads and called concurrently.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    analytics: AnalyticsConfig,
    risk: RiskConfig,
    correlation: CorrelationEngine,
    causal: CausalEngine,
}

impl AnalyticsEngine {
    pub fn new(analytics: AnalyticsConfig, risk: RiskConfig) -> Self {
        Self {
            correlation: CorrelationEngine::new(analytics.clone()),
            causal: CausalEngine::new(analytics.clone()),
            analytics,
            risk,
        }
    }

    pub fn analytics_config(&self) -> &AnalyticsConfig {
        &self.analytics
    }

    pub fn risk_config(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn correlations(&self, nutrition: &DailyMetrics, wearable: &DailyMetrics) -> CorrelationReport {
        self.correlation.calculate_all(nutrition, wearable)
    }

    pub fn causal_graph(
        &self,
        correlations: &[CorrelationResult],
        nutrition: &DailyMetrics,
        wearable: &DailyMetrics,
    ) -> CausalGraph {
        self.causal.build_graph(correlations, nutrition, wearable)
    }

    /// Trend for one wearable metric
    pub fn trend(&self, metric: MetricId, wearable: &DailyMetrics) -> AnalyticsResult<HealthTrend> {
        trends::analyze_trend(&wearable.series(metric), self.analytics.stable_slope_threshold)
    }

    /// Linear predictions at every configured horizon plus a smoothed next-day value
    pub fn forecast(&self, metric: MetricId, data: &DailyMetrics) -> AnalyticsResult<Vec<HealthPrediction>> {
        let series = data.series(metric);
        if series.len() < MIN_FORECAST_POINTS {
            return Err(AnalyticsError::insufficient(MIN_FORECAST_POINTS, series.len()));
        }

        let mut predictions = forecast::predict_metric(&series, &self.analytics.forecast_horizons);
        predictions.extend(forecast::predict_smoothed(&series, self.analytics.smoothing_alpha));
        Ok(predictions)
    }

    /// Trends for every wearable metric with enough history, in metric order
    pub fn trends(&self, wearable: &DailyMetrics) -> Vec<HealthTrend> {
        collect_per_metric(wearable, "trend", |metric| self.trend(metric, wearable))
    }

    /// Predictions for every wearable metric with enough history
    pub fn predictions(&self, wearable: &DailyMetrics) -> Vec<HealthPrediction> {
        let mut predictions: Vec<HealthPrediction> =
            collect_per_metric(wearable, "forecast", |metric| self.forecast(metric, wearable))
                .into_iter()
                .flatten()
                .collect();
        sort_predictions(&mut predictions);
        predictions
    }

    pub fn risks(&self, wearable: &DailyMetrics) -> Vec<HealthRiskAssessment> {
        risk::assess_all(wearable, &self.risk)
    }

    /// Run the full pipeline
    pub fn analyze(&self, nutrition: &DailyMetrics, wearable: &DailyMetrics) -> AnalysisReport {
        let correlations = self.correlations(nutrition, wearable);
        let causal_graph = self.causal_graph(&correlations.correlations, nutrition, wearable);
        let predictions = self.predictions(wearable);
        let trends = self.trends(wearable);
        let risks = self.risks(wearable);

        AnalysisReport::assemble(correlations, causal_graph, predictions, trends, risks)
    }
}

/// Wearable metrics recorded in `data`, in vocabulary order
pub fn wearable_metrics(data: &DailyMetrics) -> Vec<MetricId> {
    data.metrics()
        .into_iter()
        .filter(|m| m.domain() == Domain::Wearable)
        .collect()
}

/// Stable ordering for predictions: metric, then horizon, then model
pub fn sort_predictions(predictions: &mut [HealthPrediction]) {
    predictions.sort_by(|a, b| {
        a.metric
            .cmp(&b.metric)
            .then(a.horizon_days.cmp(&b.horizon_days))
            .then(a.model.cmp(&b.model))
    });
}

/// Log a dropped per-metric failure at a level matching its cause
pub fn log_dropped(metric: MetricId, kind: &str, error: &AnalyticsError) {
    if error.is_insufficient_data() {
        tracing::debug!(metric = %metric, kind, error = %error, "Skipping metric");
    } else {
        tracing::warn!(metric = %metric, kind, error = %error, "Metric analysis failed");
    }
}

fn collect_per_metric<T>(
    data: &DailyMetrics,
    kind: &str,
    run: impl Fn(MetricId) -> AnalyticsResult<T>,
) -> Vec<T> {
    wearable_metrics(data)
        .into_iter()
        .filter_map(|metric| match run(metric) {
            Ok(value) => Some(value),
            Err(e) => {
                log_dropped(metric, kind, &e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::forecast::{LINEAR_MODEL, SMOOTHING_MODEL};
    use chrono::{Duration, NaiveDate};

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap() + Duration::days(i as i64)
    }

    /// 21 days where sugar drags sleep down the same day
    fn sample() -> (DailyMetrics, DailyMetrics) {
        let mut nutrition = DailyMetrics::new();
        let mut wearable = DailyMetrics::new();
        for i in 0..21 {
            let sugar = 20.0 + ((i * 7) % 11) as f64 * 5.0;
            nutrition.insert(day(i), MetricId::SugarG, sugar);
            nutrition.insert(day(i), MetricId::Calories, 2000.0 + (i % 3) as f64 * 50.0);
            wearable.insert(day(i), MetricId::SleepScore, 100.0 - sugar * 0.5);
            wearable.insert(day(i), MetricId::ReadinessScore, 60.0 + i as f64);
            wearable.insert(day(i), MetricId::Steps, 8000.0);
        }
        (nutrition, wearable)
    }

    #[test]
    fn test_full_analysis() {
        let (nutrition, wearable) = sample();
        let engine = AnalyticsEngine::default();
        let report = engine.analyze(&nutrition, &wearable);

        assert!(report.status.is_ok());
        assert_eq!(report.overlapping_days, 21);

        let top = &report.correlations[0];
        assert_eq!(top.metric_a, MetricId::SugarG);
        assert_eq!(top.metric_b, MetricId::SleepScore);
        assert!(top.coefficient < -0.99);

        assert!(!report.causal_graph.is_empty());
        assert_eq!(report.trends.len(), 3);
        assert!(!report.summary.is_empty());
    }

    #[test]
    fn test_predictions_sorted_and_complete() {
        let (_, wearable) = sample();
        let engine = AnalyticsEngine::default();
        let predictions = engine.predictions(&wearable);

        // Three metrics, three horizons plus one smoothed prediction each
        assert_eq!(predictions.len(), 12);
        assert_eq!(predictions[0].metric, MetricId::SleepScore);
        assert_eq!(predictions[0].model, SMOOTHING_MODEL);
        assert_eq!(predictions[1].model, LINEAR_MODEL);
        assert_eq!(predictions[1].horizon_days, 7);
    }

    #[test]
    fn test_insufficient_overlap_still_reports_wearable_analysis() {
        let (_, wearable) = sample();
        let nutrition = DailyMetrics::new().with(day(0), MetricId::SugarG, 40.0);
        let report = AnalyticsEngine::default().analyze(&nutrition, &wearable);

        assert!(!report.status.is_ok());
        assert!(report.message.as_deref().unwrap().starts_with("Need 4 more days"));
        assert!(report.correlations.is_empty());
        assert!(report.causal_graph.is_empty());
        assert!(!report.trends.is_empty());
    }

    #[test]
    fn test_forecast_needs_three_points() {
        let wearable = DailyMetrics::new()
            .with(day(0), MetricId::Steps, 5000.0)
            .with(day(1), MetricId::Steps, 6000.0);
        let err = AnalyticsEngine::default()
            .forecast(MetricId::Steps, &wearable)
            .unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_report_serializes_flat_status() {
        let (nutrition, wearable) = sample();
        let report = AnalyticsEngine::default().analyze(&nutrition, &wearable);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["causal_graph"]["edges"].is_array());
    }
}
