//! Trend classification
//!
//! Fits a line over a metric's full window and labels the trajectory,
//! flags outlying days and attaches short-horizon forecasts.

use crate::analysis::error::{AnalyticsError, AnalyticsResult};
use crate::analysis::forecast::{clamp_to_bounds, linear_forecast};
use crate::analysis::stats;
use crate::metrics::{DailyMetricSeries, MetricId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fewest points a trend is computed from
pub const MIN_TREND_POINTS: usize = 7;

/// Size of the "recent" window compared against the rest of the series
pub const RECENT_WINDOW: usize = 7;

/// Fits with R² below this are too noisy to call a direction
const FLUCTUATING_R_SQUARED: f64 = 0.3;

/// |z| above which a day is reported as an anomaly
const ANOMALY_Z: f64 = 2.0;

/// Direction of a metric's trajectory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendType {
    Improving,
    Declining,
    Stable,
    Fluctuating,
}

impl std::fmt::Display for TrendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendType::Improving => write!(f, "improving"),
            TrendType::Declining => write!(f, "declining"),
            TrendType::Stable => write!(f, "stable"),
            TrendType::Fluctuating => write!(f, "fluctuating"),
        }
    }
}

/// How much a trend matters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Noise,
    Minor,
    Notable,
    ClinicallySignificant,
}

impl Significance {
    pub fn classify(percent_change: f64, r_squared: f64) -> Self {
        let change = percent_change.abs();
        if change > 10.0 && r_squared > 0.5 {
            Significance::ClinicallySignificant
        } else if change > 5.0 && r_squared > 0.3 {
            Significance::Notable
        } else if change > 2.0 {
            Significance::Minor
        } else {
            Significance::Noise
        }
    }
}

impl std::fmt::Display for Significance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Significance::Noise => write!(f, "noise"),
            Significance::Minor => write!(f, "minor"),
            Significance::Notable => write!(f, "notable"),
            Significance::ClinicallySignificant => write!(f, "clinically significant"),
        }
    }
}

/// A day whose value sits more than two standard deviations from the mean
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnomalyPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub z_score: f64,
}

/// Trajectory summary for one metric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthTrend {
    pub metric: MetricId,
    pub trend_type: TrendType,
    /// Units per day
    pub slope: f64,
    pub r_squared: f64,
    pub average: f64,
    pub std_dev: f64,
    /// Recent window vs. earlier values, in percent
    pub percent_change: f64,
    pub absolute_change: f64,
    pub anomalies: Vec<AnomalyPoint>,
    pub forecast_7d: Option<f64>,
    pub forecast_14d: Option<f64>,
    pub forecast_30d: Option<f64>,
    pub significance: Significance,
}

/// Label a fitted line
///
/// Metrics where lower is better have their direction inverted.
pub fn classify_trend(
    metric: MetricId,
    slope: f64,
    r_squared: f64,
    stable_slope_threshold: f64,
) -> TrendType {
    if r_squared < FLUCTUATING_R_SQUARED {
        return TrendType::Fluctuating;
    }
    if slope.abs() < stable_slope_threshold {
        return TrendType::Stable;
    }

    let rising = slope > 0.0;
    match (rising, metric.lower_is_better()) {
        (true, false) | (false, true) => TrendType::Improving,
        _ => TrendType::Declining,
    }
}

/// Mean of the last seven values against the mean of everything before them
///
/// Returns `(percent_change, absolute_change)`. A series of exactly seven
/// values is compared against its first value.
pub fn recent_change(values: &[f64]) -> (f64, f64) {
    let split = values.len().saturating_sub(RECENT_WINDOW);
    let (earlier, recent) = values.split_at(split);

    let Some(recent_avg) = stats::mean(recent) else {
        return (0.0, 0.0);
    };
    let baseline = match stats::mean(earlier) {
        Some(avg) => avg,
        None => values[0],
    };

    let absolute = recent_avg - baseline;
    let percent = if baseline == 0.0 {
        0.0
    } else {
        absolute / baseline.abs() * 100.0
    };
    (percent, absolute)
}

/// Points with |z| > 2
pub fn detect_anomalies(series: &DailyMetricSeries) -> Vec<AnomalyPoint> {
    let values = series.values();
    stats::z_scores(&values)
        .into_iter()
        .zip(series.points.iter())
        .filter(|(z, _)| z.abs() > ANOMALY_Z)
        .map(|(z_score, (date, value))| AnomalyPoint {
            date: *date,
            value: *value,
            z_score,
        })
        .collect()
}

/// Classify a metric's trajectory over its full window
pub fn analyze_trend(
    series: &DailyMetricSeries,
    stable_slope_threshold: f64,
) -> AnalyticsResult<HealthTrend> {
    if series.len() < MIN_TREND_POINTS {
        return Err(AnalyticsError::insufficient(MIN_TREND_POINTS, series.len()));
    }

    let values = series.values();
    let fit = stats::linear_regression(&values).ok_or_else(|| {
        AnalyticsError::NumericDegenerate(format!("no regression for {}", series.metric))
    })?;
    if !fit.slope.is_finite() || !fit.r_squared.is_finite() {
        return Err(AnalyticsError::NumericDegenerate(format!(
            "non-finite fit for {}",
            series.metric
        )));
    }

    let average = stats::mean(&values).unwrap_or(0.0);
    let std_dev = stats::std_dev(&values).unwrap_or(0.0);
    let (percent_change, absolute_change) = recent_change(&values);

    let forecast = |h: u32| {
        linear_forecast(&values, h).map(|f| clamp_to_bounds(series.metric, f.value))
    };

    let trend = HealthTrend {
        metric: series.metric,
        trend_type: classify_trend(series.metric, fit.slope, fit.r_squared, stable_slope_threshold),
        slope: fit.slope,
        r_squared: fit.r_squared.clamp(0.0, 1.0),
        average,
        std_dev,
        percent_change,
        absolute_change,
        anomalies: detect_anomalies(series),
        forecast_7d: forecast(7),
        forecast_14d: forecast(14),
        forecast_30d: forecast(30),
        significance: Significance::classify(percent_change, fit.r_squared),
    };

    tracing::debug!(
        metric = %trend.metric,
        trend = %trend.trend_type,
        slope = trend.slope,
        r_squared = trend.r_squared,
        anomalies = trend.anomalies.len(),
        "Classified trend"
    );

    Ok(trend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(metric: MetricId, values: &[f64]) -> DailyMetricSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        DailyMetricSeries::new(
            metric,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
    }

    #[test]
    fn test_flat_noisy_series_is_fluctuating() {
        let s = series(MetricId::SleepScore, &[85.0, 65.0, 85.0, 65.0, 85.0, 65.0, 85.0]);
        let trend = analyze_trend(&s, 0.1).unwrap();
        assert!(trend.slope.abs() < 1e-9);
        assert!(trend.r_squared < 0.3);
        assert_eq!(trend.trend_type, TrendType::Fluctuating);
    }

    #[test]
    fn test_monotonic_increase_is_improving() {
        let values: Vec<f64> = (0..10).map(|i| 60.0 + 2.0 * i as f64).collect();
        let trend = analyze_trend(&series(MetricId::ReadinessScore, &values), 0.1).unwrap();
        assert!(trend.r_squared > 0.8);
        assert_eq!(trend.trend_type, TrendType::Improving);
        assert!(trend.percent_change > 0.0);
    }

    #[test]
    fn test_lower_is_better_inverts_direction() {
        let values: Vec<f64> = (0..10).map(|i| 50.0 + i as f64).collect();
        let trend = analyze_trend(&series(MetricId::RestingHeartRate, &values), 0.1).unwrap();
        assert_eq!(trend.trend_type, TrendType::Declining);

        let falling: Vec<f64> = (0..10).map(|i| 70.0 - i as f64).collect();
        let trend = analyze_trend(&series(MetricId::RestingHeartRate, &falling), 0.1).unwrap();
        assert_eq!(trend.trend_type, TrendType::Improving);
    }

    #[test]
    fn test_constant_series_is_stable() {
        let trend = analyze_trend(&series(MetricId::Steps, &[8000.0; 9]), 0.1).unwrap();
        assert_eq!(trend.trend_type, TrendType::Stable);
        assert_eq!(trend.r_squared, 1.0);
        assert!(trend.anomalies.is_empty());
        assert_eq!(trend.significance, Significance::Noise);
    }

    #[test]
    fn test_requires_seven_points() {
        let err = analyze_trend(&series(MetricId::Steps, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 0.1)
            .unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_anomaly_detection() {
        let mut values = vec![70.0; 10];
        values.push(100.0);
        let s = series(MetricId::HrvBalance, &values);
        let anomalies = detect_anomalies(&s);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, 100.0);
        assert!(anomalies[0].z_score > 2.0);
        assert_eq!(anomalies[0].date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn test_significance_levels() {
        assert_eq!(Significance::classify(12.0, 0.6), Significance::ClinicallySignificant);
        assert_eq!(Significance::classify(12.0, 0.4), Significance::Notable);
        assert_eq!(Significance::classify(-6.0, 0.35), Significance::Notable);
        assert_eq!(Significance::classify(6.0, 0.1), Significance::Minor);
        assert_eq!(Significance::classify(1.5, 0.9), Significance::Noise);
    }

    #[test]
    fn test_recent_change() {
        let values = vec![50.0, 50.0, 60.0, 60.0, 60.0, 60.0, 60.0, 60.0, 60.0];
        let (pct, abs) = recent_change(&values);
        assert!((abs - 10.0).abs() < 1e-9);
        assert!((pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_forecasts_clamped() {
        let values: Vec<f64> = (0..10).map(|i| 80.0 + 2.0 * i as f64).collect();
        let trend = analyze_trend(&series(MetricId::SleepScore, &values), 0.1).unwrap();
        assert_eq!(trend.forecast_30d, Some(100.0));
        assert!(trend.forecast_7d.unwrap() <= 100.0);
    }
}
