//! Forecasting Engine
//!
//! Lightweight statistical models for short-horizon prediction of a single
//! metric: trailing moving average, exponential smoothing and least-squares
//! linear extrapolation with a 95% band.
//!
//! All functions are pure; identical input always yields identical output.

use crate::analysis::stats;
use crate::metrics::{DailyMetricSeries, MetricId};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Model identity of linear-regression predictions
pub const LINEAR_MODEL: &str = "linear_v1";

/// Model identity of exponential-smoothing predictions
pub const SMOOTHING_MODEL: &str = "exp_smoothing_v1";

/// Fewest points a prediction is made from
pub const MIN_FORECAST_POINTS: usize = 3;

/// Two-sided 95% normal quantile
const Z_95: f64 = 1.96;

/// Trailing mean over `window` values
///
/// Element `i` of the output is the mean of `values[i..i + window]`. Empty when
/// the window is zero or longer than the input.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > values.len() {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Output of exponential smoothing
#[derive(Debug, Clone, PartialEq)]
pub struct Smoothed {
    /// `S_t` for every input value
    pub smoothed: Vec<f64>,
    /// Next-step forecast, `S_last`
    pub forecast: f64,
}

/// `S_t = α·v_t + (1−α)·S_{t−1}` with `S_0 = v_0`
///
/// `alpha` is clamped to `[0, 1]`. Returns `None` for empty input.
pub fn exponential_smoothing(values: &[f64], alpha: f64) -> Option<Smoothed> {
    let (&first, rest) = values.split_first()?;
    let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 0.3 };

    let mut smoothed = Vec::with_capacity(values.len());
    smoothed.push(first);
    let mut level = first;
    for &v in rest {
        level = alpha * v + (1.0 - alpha) * level;
        smoothed.push(level);
    }

    Some(Smoothed {
        smoothed,
        forecast: level,
    })
}

/// Linear extrapolation `days_ahead` steps past the last observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearForecast {
    pub days_ahead: u32,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub residual_std: f64,
}

/// Fit `y = m·x + b` over `x = 0..n−1` and evaluate at `x = n + days_ahead − 1`
///
/// The band is `±1.96·σ`, σ being the residual standard deviation of the fit.
/// With fewer than three points the last value is returned with a zero-width
/// band. `None` for empty input.
pub fn linear_forecast(values: &[f64], days_ahead: u32) -> Option<LinearForecast> {
    let &last = values.last()?;

    let fit = match stats::linear_regression(values) {
        Some(fit) if values.len() >= MIN_FORECAST_POINTS => fit,
        _ => {
            return Some(LinearForecast {
                days_ahead,
                value: last,
                lower: last,
                upper: last,
                slope: 0.0,
                intercept: last,
                r_squared: 0.0,
                residual_std: 0.0,
            })
        }
    };

    let x = (values.len() as u32 + days_ahead) as f64 - 1.0;
    let value = fit.at(x);
    let margin = Z_95 * fit.residual_std;

    Some(LinearForecast {
        days_ahead,
        value,
        lower: value - margin,
        upper: value + margin,
        slope: fit.slope,
        intercept: fit.intercept,
        r_squared: fit.r_squared,
        residual_std: fit.residual_std,
    })
}

/// A forecast value for one metric on one future date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthPrediction {
    pub metric: MetricId,
    pub prediction_date: NaiveDate,
    pub horizon_days: u32,
    pub predicted_value: f64,
    /// Confidence score (0 to 1)
    pub confidence: f64,
    /// (lower, upper)
    pub confidence_interval: (f64, f64),
    pub model: String,
}

/// Clamp a value into the metric's natural range
pub(crate) fn clamp_to_bounds(metric: MetricId, value: f64) -> f64 {
    match metric.bounds() {
        Some((lo, hi)) => value.clamp(lo, hi),
        None => value,
    }
}

/// `±margin` band around a clamped prediction, cut at the metric's range
///
/// The centre is clamped first, so only the end that crosses a bound moves
/// and the band keeps a non-zero width whenever `margin > 0`.
fn bounded_interval(metric: MetricId, value: f64, margin: f64) -> (f64, f64) {
    let center = clamp_to_bounds(metric, value);
    (
        clamp_to_bounds(metric, center - margin),
        clamp_to_bounds(metric, center + margin),
    )
}

/// Linear predictions for each horizon
///
/// Empty when the series has fewer than three points. Confidence decays with
/// the horizon: `R² · n / (n + h)`.
pub fn predict_metric(series: &DailyMetricSeries, horizons: &[u32]) -> Vec<HealthPrediction> {
    let Some(last_date) = series.last_date() else {
        return Vec::new();
    };
    if series.len() < MIN_FORECAST_POINTS {
        return Vec::new();
    }

    let values = series.values();
    let n = values.len() as f64;

    horizons
        .iter()
        .filter_map(|&h| {
            let forecast = linear_forecast(&values, h)?;
            let confidence = (forecast.r_squared * n / (n + h as f64)).clamp(0.0, 1.0);
            Some(HealthPrediction {
                metric: series.metric,
                prediction_date: last_date + Duration::days(h as i64),
                horizon_days: h,
                predicted_value: clamp_to_bounds(series.metric, forecast.value),
                confidence,
                confidence_interval: bounded_interval(
                    series.metric,
                    forecast.value,
                    forecast.upper - forecast.value,
                ),
                model: LINEAR_MODEL.to_string(),
            })
        })
        .collect()
}

/// Next-day prediction from exponential smoothing
///
/// The band uses the spread of one-step-ahead errors; confidence is one minus
/// the mean absolute percentage error.
pub fn predict_smoothed(series: &DailyMetricSeries, alpha: f64) -> Option<HealthPrediction> {
    if series.len() < MIN_FORECAST_POINTS {
        return None;
    }
    let last_date = series.last_date()?;
    let values = series.values();
    let smoothed = exponential_smoothing(&values, alpha)?;

    // S_{t-1} is the forecast made for v_t
    let errors: Vec<f64> = values
        .iter()
        .skip(1)
        .zip(smoothed.smoothed.iter())
        .map(|(actual, predicted)| actual - predicted)
        .collect();

    let sigma = (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt();

    let pct_errors: Vec<f64> = values
        .iter()
        .skip(1)
        .zip(errors.iter())
        .filter(|(actual, _)| **actual != 0.0)
        .map(|(actual, err)| (err / actual).abs())
        .collect();
    let mape = stats::mean(&pct_errors).unwrap_or(1.0);

    let margin = Z_95 * sigma;
    Some(HealthPrediction {
        metric: series.metric,
        prediction_date: last_date + Duration::days(1),
        horizon_days: 1,
        predicted_value: clamp_to_bounds(series.metric, smoothed.forecast),
        confidence: (1.0 - mape).clamp(0.0, 1.0),
        confidence_interval: bounded_interval(series.metric, smoothed.forecast, margin),
        model: SMOOTHING_MODEL.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(metric: MetricId, values: &[f64]) -> DailyMetricSeries {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        DailyMetricSeries::new(
            metric,
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
    }

    #[test]
    fn test_moving_average() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ma, vec![2.0, 3.0, 4.0]);
        assert!(moving_average(&[1.0, 2.0], 3).is_empty());
        assert!(moving_average(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_exponential_smoothing() {
        let result = exponential_smoothing(&[10.0, 20.0, 20.0], 0.5).unwrap();
        assert_eq!(result.smoothed, vec![10.0, 15.0, 17.5]);
        assert_eq!(result.forecast, 17.5);
        assert!(exponential_smoothing(&[], 0.3).is_none());
    }

    #[test]
    fn test_linear_forecast_exact_line() {
        for n in [3_usize, 7, 20] {
            let values: Vec<f64> = (0..n).map(|i| 2.0 * i as f64 + 3.0).collect();
            for h in [1_u32, 7, 30] {
                let forecast = linear_forecast(&values, h).unwrap();
                let expected = 2.0 * (n as f64 + h as f64 - 1.0) + 3.0;
                assert!((forecast.value - expected).abs() < 1e-9);
                assert!((forecast.upper - forecast.lower).abs() < 1e-9);
                assert!(forecast.residual_std < 1e-9);
            }
        }
    }

    #[test]
    fn test_linear_forecast_noisy_has_band() {
        let values = vec![10.0, 12.0, 11.0, 14.0, 13.0, 16.0];
        let forecast = linear_forecast(&values, 1).unwrap();
        assert!(forecast.residual_std > 0.0);
        assert!(forecast.lower < forecast.value && forecast.value < forecast.upper);
        let margin = forecast.upper - forecast.value;
        assert!((margin - 1.96 * forecast.residual_std).abs() < 1e-12);
    }

    #[test]
    fn test_linear_forecast_too_few_points() {
        let forecast = linear_forecast(&[4.0, 9.0], 7).unwrap();
        assert_eq!(forecast.value, 9.0);
        assert_eq!(forecast.lower, 9.0);
        assert_eq!(forecast.upper, 9.0);
        assert!(linear_forecast(&[], 7).is_none());
    }

    #[test]
    fn test_predict_metric_horizons_and_dates() {
        let s = series(MetricId::Steps, &[8000.0, 8200.0, 8400.0, 8600.0, 8800.0]);
        let predictions = predict_metric(&s, &[7, 14, 30]);
        assert_eq!(predictions.len(), 3);

        let week = &predictions[0];
        assert_eq!(week.model, LINEAR_MODEL);
        assert_eq!(week.horizon_days, 7);
        assert_eq!(week.prediction_date, NaiveDate::from_ymd_opt(2024, 6, 12).unwrap());
        assert!((week.predicted_value - 10200.0).abs() < 1e-6);
        assert!(predictions[0].confidence > predictions[2].confidence);
        assert!(predictions.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
    }

    #[test]
    fn test_predict_metric_clamps_to_bounds() {
        let s = series(MetricId::SleepScore, &[80.0, 85.0, 90.0, 95.0]);
        let predictions = predict_metric(&s, &[30]);
        assert_eq!(predictions[0].predicted_value, 100.0);
        assert!(predictions[0].confidence_interval.1 <= 100.0);
    }

    #[test]
    fn test_band_keeps_width_at_bounds() {
        let s = series(MetricId::SleepScore, &[80.0, 86.0, 89.0, 96.0, 98.0]);
        let residual_std = linear_forecast(&s.values(), 30).unwrap().residual_std;
        assert!(residual_std > 0.0);

        let p = &predict_metric(&s, &[30])[0];
        let (lo, hi) = p.confidence_interval;
        assert_eq!(p.predicted_value, 100.0);
        assert_eq!(hi, 100.0);
        assert!((lo - (100.0 - 1.96 * residual_std)).abs() < 1e-9);

        let s = series(MetricId::SleepScore, &[97.0, 100.0, 98.0, 100.0, 99.0]);
        let p = predict_smoothed(&s, 0.3).unwrap();
        let (lo, hi) = p.confidence_interval;
        assert!(hi <= 100.0);
        assert!(lo < p.predicted_value && p.predicted_value <= hi);
    }

    #[test]
    fn test_predict_metric_needs_three_points() {
        let s = series(MetricId::Steps, &[8000.0, 8200.0]);
        assert!(predict_metric(&s, &[7]).is_empty());
        assert!(predict_smoothed(&s, 0.3).is_none());
    }

    #[test]
    fn test_predict_smoothed() {
        let s = series(MetricId::ReadinessScore, &[70.0, 72.0, 71.0, 73.0, 72.0]);
        let prediction = predict_smoothed(&s, 0.3).unwrap();
        assert_eq!(prediction.model, SMOOTHING_MODEL);
        assert_eq!(prediction.horizon_days, 1);
        let (lo, hi) = prediction.confidence_interval;
        assert!(lo <= prediction.predicted_value && prediction.predicted_value <= hi);
        assert!(prediction.confidence > 0.9);
    }
}
