//! Analysis Service
//!
//! Async calling layer around the synchronous [`AnalyticsEngine`]. Fetches raw
//! records from a [`HealthDataSource`], aggregates them and runs the
//! CPU-bound work on the blocking pool.
//!
//! Per-metric trends and forecasts fan out over a `JoinSet`; results are
//! re-sorted afterwards so completion order never shows in the output.

use crate::analysis::{
    log_dropped, sort_predictions, wearable_metrics, AnalysisReport, AnalyticsEngine,
    AnalyticsError, CorrelationReport, HealthPrediction, HealthRiskAssessment, HealthTrend,
};
use crate::metrics::{aggregate_nutrition, aggregate_wearable, DailyMetrics, Domain, MetricId};
use crate::sources::{filter_range, DateRange, HealthDataSource, SourceError};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Aggregated inputs for one analysis run
#[derive(Debug, Clone, Default)]
pub struct DailyInputs {
    pub nutrition: DailyMetrics,
    pub wearable: DailyMetrics,
}

/// Runs analyses against a data source
pub struct AnalysisService {
    source: Arc<dyn HealthDataSource>,
    engine: Arc<AnalyticsEngine>,
    lookback_days: Option<u32>,
}

impl AnalysisService {
    pub fn new(source: Arc<dyn HealthDataSource>, engine: AnalyticsEngine) -> Self {
        Self {
            source,
            engine: Arc::new(engine),
            lookback_days: None,
        }
    }

    /// Only analyse the `days` days ending on the latest record
    pub fn with_lookback(mut self, days: Option<u32>) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn engine(&self) -> &AnalyticsEngine {
        &self.engine
    }

    /// Fetch raw records and aggregate them into daily mappings
    pub async fn load(&self) -> Result<DailyInputs, ServiceError> {
        let (meals, days) = tokio::try_join!(
            self.source.fetch_meals(None),
            self.source.fetch_wearable_days(None)
        )?;

        let (meals, days) = match self.lookback_days {
            Some(lookback) => {
                let latest = meals
                    .iter()
                    .map(|m| m.timestamp.date())
                    .chain(days.iter().map(|d| d.date))
                    .max();
                match latest {
                    Some(end) => {
                        let range = Some(DateRange::last_days(end, lookback as i64));
                        (
                            filter_range(meals, range, |m| m.timestamp.date()),
                            filter_range(days, range, |d| d.date),
                        )
                    }
                    None => (meals, days),
                }
            }
            None => (meals, days),
        };

        tracing::debug!(
            source = self.source.name(),
            meals = meals.len(),
            wearable_days = days.len(),
            "Fetched raw records"
        );

        Ok(DailyInputs {
            nutrition: aggregate_nutrition(&meals),
            wearable: aggregate_wearable(&days),
        })
    }

    /// Full pipeline: correlations, causal graph, forecasts, trends, risks, summary
    pub async fn run(&self) -> Result<AnalysisReport, ServiceError> {
        let run_id = uuid::Uuid::new_v4();
        self.run_inner()
            .instrument(tracing::info_span!("analysis", %run_id))
            .await
    }

    async fn run_inner(&self) -> Result<AnalysisReport, ServiceError> {
        let start = std::time::Instant::now();
        let inputs = Arc::new(self.load().await?);

        let engine = Arc::clone(&self.engine);
        let batch_inputs = Arc::clone(&inputs);
        let batch = tokio::task::spawn_blocking(move || {
            let correlations = engine.correlations(&batch_inputs.nutrition, &batch_inputs.wearable);
            let graph = engine.causal_graph(
                &correlations.correlations,
                &batch_inputs.nutrition,
                &batch_inputs.wearable,
            );
            let risks = engine.risks(&batch_inputs.wearable);
            (correlations, graph, risks)
        });

        let (trends, predictions) = self.per_metric(Arc::clone(&inputs)).await;
        let (correlations, graph, risks) = batch.await?;

        let report = AnalysisReport::assemble(correlations, graph, predictions, trends, risks);

        tracing::info!(
            correlations = report.correlations.len(),
            edges = report.causal_graph.edges.len(),
            trends = report.trends.len(),
            predictions = report.predictions.len(),
            risks = report.risks.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(report)
    }

    pub async fn correlations(&self) -> Result<CorrelationReport, ServiceError> {
        let inputs = self.load().await?;
        let engine = Arc::clone(&self.engine);
        let report = tokio::task::spawn_blocking(move || {
            engine.correlations(&inputs.nutrition, &inputs.wearable)
        })
        .await?;
        Ok(report)
    }

    pub async fn trends(&self) -> Result<Vec<HealthTrend>, ServiceError> {
        let inputs = Arc::new(self.load().await?);
        let (trends, _) = self.per_metric(inputs).await;
        Ok(trends)
    }

    pub async fn risks(&self) -> Result<Vec<HealthRiskAssessment>, ServiceError> {
        let inputs = self.load().await?;
        let engine = Arc::clone(&self.engine);
        Ok(tokio::task::spawn_blocking(move || engine.risks(&inputs.wearable)).await?)
    }

    /// Forecasts for a single metric from either domain
    pub async fn forecast(&self, metric: MetricId) -> Result<Vec<HealthPrediction>, ServiceError> {
        let inputs = self.load().await?;
        let engine = Arc::clone(&self.engine);
        let predictions = tokio::task::spawn_blocking(move || {
            let data = match metric.domain() {
                Domain::Nutrition => &inputs.nutrition,
                Domain::Wearable => &inputs.wearable,
            };
            engine.forecast(metric, data)
        })
        .await??;
        Ok(predictions)
    }

    /// Trends and predictions for every wearable metric, one task per metric
    async fn per_metric(
        &self,
        inputs: Arc<DailyInputs>,
    ) -> (Vec<HealthTrend>, Vec<HealthPrediction>) {
        let engine = Arc::clone(&self.engine);
        let metrics = wearable_metrics(&inputs.wearable);

        let results = fan_out(metrics, move |metric| {
            let trend = engine.trend(metric, &inputs.wearable);
            let forecast = engine.forecast(metric, &inputs.wearable);
            (metric, trend, forecast)
        })
        .await;

        let mut trends = Vec::new();
        let mut predictions = Vec::new();

        for (metric, trend, forecast) in results {
            match trend {
                Ok(trend) => trends.push(trend),
                Err(e) => log_dropped(metric, "trend", &e),
            }
            match forecast {
                Ok(p) => predictions.extend(p),
                Err(e) => log_dropped(metric, "forecast", &e),
            }
        }

        trends.sort_by_key(|t| t.metric);
        sort_predictions(&mut predictions);
        (trends, predictions)
    }
}

/// Run `work` for each metric on the blocking pool
///
/// Results come back in completion order. A task that panics or is cancelled
/// is logged and left out.
async fn fan_out<T, F>(metrics: Vec<MetricId>, work: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(MetricId) -> T + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let mut tasks = JoinSet::new();

    for metric in metrics {
        let work = Arc::clone(&work);
        tasks.spawn_blocking(move || work(metric));
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(value) => results.push(value),
            Err(e) => tracing::warn!(
                error = %e,
                panicked = e.is_panic(),
                "Per-metric analysis task failed"
            ),
        }
    }
    results
}

/// Errors that can occur while running an analysis
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Analysis error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Analysis task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MealRecord, ReadinessSummary, SleepSummary, WearableDay};
    use crate::sources::MemorySource;
    use chrono::{Duration, NaiveDate};

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap() + Duration::days(i as i64)
    }

    fn source(days: usize) -> MemorySource {
        let mut meals = Vec::new();
        let mut wearable = Vec::new();
        for i in 0..days {
            let sugar = 15.0 + ((i * 5) % 9) as f64 * 6.0;
            meals.push(
                MealRecord::at(day(i).and_hms_opt(19, 30, 0).unwrap())
                    .macros(2100.0 + (i % 4) as f64 * 40.0, 90.0, 250.0, 70.0)
                    .micros(25.0, sugar, 2300.0),
            );
            wearable.push(
                WearableDay::new(day(i))
                    .sleep(SleepSummary {
                        score: Some(95.0 - sugar * 0.4),
                        efficiency: Some(88.0),
                        deep_sleep_duration: Some(5400.0),
                    })
                    .readiness(ReadinessSummary {
                        score: Some(70.0 + (i % 5) as f64),
                        hrv_balance: Some(60.0),
                        ..ReadinessSummary::default()
                    }),
            );
        }
        MemorySource::new(meals, wearable)
    }

    #[tokio::test]
    async fn test_run_matches_synchronous_engine() {
        let service = AnalysisService::new(Arc::new(source(20)), AnalyticsEngine::default());
        let report = service.run().await.unwrap();

        let inputs = service.load().await.unwrap();
        let expected = AnalyticsEngine::default().analyze(&inputs.nutrition, &inputs.wearable);
        assert_eq!(report, expected);
        assert!(!report.correlations.is_empty());
        assert_eq!(report.correlations[0].metric_a, MetricId::SugarG);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_runs_are_deterministic() {
        let service = AnalysisService::new(Arc::new(source(30)), AnalyticsEngine::default());
        let first = service.run().await.unwrap();
        for _ in 0..3 {
            assert_eq!(service.run().await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_lookback_limits_days() {
        let service = AnalysisService::new(Arc::new(source(30)), AnalyticsEngine::default())
            .with_lookback(Some(10));
        let inputs = service.load().await.unwrap();
        assert_eq!(inputs.wearable.len(), 10);
        assert_eq!(inputs.nutrition.len(), 10);
        assert_eq!(inputs.wearable.dates().next(), Some(&day(20)));
    }

    #[tokio::test]
    async fn test_forecast_for_nutrition_metric() {
        let service = AnalysisService::new(Arc::new(source(10)), AnalyticsEngine::default());
        let predictions = service.forecast(MetricId::Calories).await.unwrap();
        assert_eq!(predictions.len(), 4);
        assert!(predictions.iter().all(|p| p.metric == MetricId::Calories));
    }

    #[tokio::test]
    async fn test_failed_metric_task_is_skipped() {
        let mut done = fan_out(
            vec![MetricId::SleepScore, MetricId::Steps, MetricId::HrvBalance],
            |metric| {
                if metric == MetricId::Steps {
                    panic!("steps task failed");
                }
                metric
            },
        )
        .await;
        done.sort();
        assert_eq!(done, vec![MetricId::SleepScore, MetricId::HrvBalance]);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let service = AnalysisService::new(Arc::new(MemorySource::default()), AnalyticsEngine::default());
        let report = service.run().await.unwrap();
        assert!(!report.status.is_ok());
        assert!(report.trends.is_empty());
        assert!(report.risks.is_empty());

        let err = service.forecast(MetricId::Steps).await.unwrap_err();
        assert!(matches!(err, ServiceError::Analytics(ref e) if e.is_insufficient_data()));
    }
}
