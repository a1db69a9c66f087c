//! Correlation Engine
//!
//! Calculates lagged Pearson correlations between nutrition and biometric
//! metrics for every pair in the configured catalog, attaches a two-tailed
//! p-value, and keeps only the statistically significant pairs.

use crate::analysis::config::{AnalyticsConfig, CorrelationCategory, CorrelationPair};
use crate::analysis::error::{AnalyticsError, AnalyticsResult};
use crate::analysis::stats;
use crate::metrics::{date_union, overlapping_days, DailyMetrics, Domain, MetricId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Human-readable correlation strength
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    /// Classify |r|: strong ≥ 0.7, moderate ≥ 0.5, otherwise weak
    pub fn from_coefficient(r: f64) -> Self {
        let abs_r = r.abs();
        if abs_r >= 0.7 {
            Strength::Strong
        } else if abs_r >= 0.5 {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strength::Weak => write!(f, "weak"),
            Strength::Moderate => write!(f, "moderate"),
            Strength::Strong => write!(f, "strong"),
        }
    }
}

/// Sign of a correlation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn from_coefficient(r: f64) -> Self {
        if r < 0.0 {
            Direction::Negative
        } else {
            Direction::Positive
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Positive => write!(f, "positive"),
            Direction::Negative => write!(f, "negative"),
        }
    }
}

/// One aligned observation: `metric_a` on `date`, `metric_b` `lag` days later
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AlignedPoint {
    pub date: NaiveDate,
    pub a: f64,
    pub b: f64,
}

/// A correlation between two metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationResult {
    pub metric_a: MetricId,
    pub metric_b: MetricId,
    pub category: CorrelationCategory,
    /// Days `metric_a` is observed before `metric_b`
    pub lag_days: usize,
    /// Pearson correlation coefficient (-1 to 1)
    pub coefficient: f64,
    /// Two-tailed p-value (0 to 1)
    pub p_value: f64,
    /// Number of aligned pairs used
    pub sample_size: usize,
    pub strength: Strength,
    pub direction: Direction,
    pub data_points: Vec<AlignedPoint>,
}

impl CorrelationResult {
    /// Whether this pair passes the |r| and p-value thresholds
    pub fn is_significant(&self, config: &AnalyticsConfig) -> bool {
        self.coefficient.abs() >= config.min_abs_r && self.p_value < config.max_p_value
    }

    /// Whether either side of the pair is `metric`
    pub fn involves(&self, metric: MetricId) -> bool {
        self.metric_a == metric || self.metric_b == metric
    }
}

/// Whether an analysis had enough data to say anything
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    InsufficientData {
        days_available: usize,
        days_needed: usize,
    },
}

impl AnalysisStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, AnalysisStatus::Ok)
    }
}

/// Ranked correlations plus the data coverage they were computed from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorrelationReport {
    #[serde(flatten)]
    pub status: AnalysisStatus,
    /// Dates with both nutrition and wearable data
    pub overlapping_days: usize,
    /// Significant correlations, strongest first
    pub correlations: Vec<CorrelationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Calculate correlations between nutrition and biometric metrics
#[derive(Debug, Clone, Default)]
pub struct CorrelationEngine {
    config: AnalyticsConfig,
}

impl CorrelationEngine {
    /// Create a new correlation engine
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Calculate correlations for every catalog pair
    ///
    /// Returns significant correlations sorted by |r| (strongest first). Pairs
    /// with too little aligned data are skipped; a failing pair is logged and
    /// dropped without affecting the others.
    pub fn calculate_all(&self, nutrition: &DailyMetrics, wearable: &DailyMetrics) -> CorrelationReport {
        let overlap = overlapping_days(nutrition, wearable);
        let needed = self.config.min_samples;

        // Same-day overlap only sets the status; lagged pairs are counted per triple
        let status = if overlap < needed {
            tracing::info!(
                overlapping_days = overlap,
                days_needed = needed,
                "Not enough same-day overlap for correlations"
            );
            AnalysisStatus::InsufficientData {
                days_available: overlap,
                days_needed: needed,
            }
        } else {
            AnalysisStatus::Ok
        };

        let dates = date_union(nutrition, wearable);
        let mut correlations = Vec::new();

        for (index, pair) in self.config.pairs.iter().enumerate() {
            match correlate_pair(pair, nutrition, wearable, &dates, &self.config) {
                Ok(result) if result.is_significant(&self.config) => {
                    tracing::debug!(
                        metric_a = %pair.metric_a,
                        metric_b = %pair.metric_b,
                        lag = pair.lag_days,
                        r = result.coefficient,
                        p = result.p_value,
                        "Significant correlation"
                    );
                    correlations.push((index, result));
                }
                Ok(result) => {
                    tracing::trace!(
                        pair = %pair.label(),
                        r = result.coefficient,
                        p = result.p_value,
                        "Correlation below significance thresholds"
                    );
                }
                Err(e) if e.is_insufficient_data() => {
                    tracing::trace!(pair = %pair.label(), error = %e, "Skipping pair");
                }
                Err(e) => {
                    tracing::warn!(pair = %pair.label(), error = %e, "Failed to correlate pair");
                }
            }
        }

        // Strongest first; catalog order breaks ties so output is stable
        correlations.sort_by(|(ia, a), (ib, b)| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });

        let correlations: Vec<CorrelationResult> =
            correlations.into_iter().map(|(_, c)| c).collect();

        tracing::info!(
            pairs = self.config.pairs.len(),
            significant = correlations.len(),
            overlapping_days = overlap,
            "Calculated correlations"
        );

        let message = if !status.is_ok() {
            Some(insufficient_data_message(overlap, needed))
        } else if correlations.is_empty() {
            Some("No significant nutrition and biometric correlations found yet.".to_string())
        } else {
            None
        };

        CorrelationReport {
            status,
            overlapping_days: overlap,
            correlations,
            message,
        }
    }

    /// Significant correlations that involve a specific metric
    pub fn correlations_for_metric(
        &self,
        metric: MetricId,
        nutrition: &DailyMetrics,
        wearable: &DailyMetrics,
    ) -> Vec<CorrelationResult> {
        self.calculate_all(nutrition, wearable)
            .correlations
            .into_iter()
            .filter(|c| c.involves(metric))
            .collect()
    }
}

/// Message telling the user how much more data is required
pub fn insufficient_data_message(available: usize, needed: usize) -> String {
    let missing = needed.saturating_sub(available);
    format!(
        "Need {} more day{} of overlapping nutrition and wearable data (have {}, need {}).",
        missing,
        if missing == 1 { "" } else { "s" },
        available,
        needed
    )
}

/// Look a metric up in whichever mapping its domain lives in
fn lookup(
    metric: MetricId,
    date: &NaiveDate,
    nutrition: &DailyMetrics,
    wearable: &DailyMetrics,
) -> Option<f64> {
    match metric.domain() {
        Domain::Nutrition => nutrition.valid(date, metric),
        Domain::Wearable => wearable.valid(date, metric),
    }
}

/// Pair `metric_a` on `dates[i]` with `metric_b` on `dates[i + lag]`
///
/// Pairs where either value is missing (zero for non zero-tolerant metrics)
/// are dropped.
pub fn align_with_lag(
    pair: &CorrelationPair,
    nutrition: &DailyMetrics,
    wearable: &DailyMetrics,
    dates: &[NaiveDate],
) -> Vec<AlignedPoint> {
    let lag = pair.lag_days;
    if lag >= dates.len() {
        return Vec::new();
    }

    dates
        .iter()
        .zip(dates.iter().skip(lag))
        .filter_map(|(date_a, date_b)| {
            let a = lookup(pair.metric_a, date_a, nutrition, wearable)?;
            let b = lookup(pair.metric_b, date_b, nutrition, wearable)?;
            Some(AlignedPoint { date: *date_a, a, b })
        })
        .collect()
}

/// Correlate one catalog pair, regardless of significance
///
/// Fails with `InsufficientData` below `min_samples` aligned pairs. A zero
/// variance side yields `r = 0, p = 1`.
pub fn correlate_pair(
    pair: &CorrelationPair,
    nutrition: &DailyMetrics,
    wearable: &DailyMetrics,
    dates: &[NaiveDate],
    config: &AnalyticsConfig,
) -> AnalyticsResult<CorrelationResult> {
    let points = align_with_lag(pair, nutrition, wearable, dates);
    let n = points.len();
    let needed = config.min_samples.max(3);

    if n < needed {
        return Err(AnalyticsError::insufficient(needed, n));
    }

    let xs: Vec<f64> = points.iter().map(|p| p.a).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.b).collect();

    let (coefficient, p_value) = match stats::pearson(&xs, &ys) {
        Some(r) => (r, stats::correlation_p_value(r, n)),
        None => (0.0, 1.0),
    };

    if !p_value.is_finite() {
        return Err(AnalyticsError::failure(
            pair.label(),
            format!("non-finite p-value for r={}", coefficient),
        ));
    }

    Ok(CorrelationResult {
        metric_a: pair.metric_a,
        metric_b: pair.metric_b,
        category: pair.category,
        lag_days: pair.lag_days,
        coefficient,
        p_value,
        sample_size: n,
        strength: Strength::from_coefficient(coefficient),
        direction: Direction::from_coefficient(coefficient),
        data_points: points,
    })
}
