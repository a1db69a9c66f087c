//! Rule-based risk assessment
//!
//! Each risk is an additive score over independent factors. A factor is a
//! plain function returning `Some(RiskFactor)` when it fires, so rules can be
//! tested and recombined one component at a time.
//!
//! - **Sleep decline**: falling, dropping, low or erratic sleep scores
//! - **Recovery decline**: low readiness and suppressed HRV
//! - **Burnout**: sustained low sleep and readiness over two weeks

use crate::analysis::config::RiskConfig;
use crate::analysis::error::{AnalyticsError, AnalyticsResult};
use crate::analysis::stats;
use crate::metrics::{DailyMetrics, MetricId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Window used for "recent" averages
pub const RECENT_DAYS: usize = 7;

/// History burnout assessment needs
pub const BURNOUT_DAYS: usize = 14;

const MIN_AVERAGE_DROP: f64 = 5.0;
const DECLINE_SLOPE: f64 = -0.5;
const DECLINE_R_SQUARED: f64 = 0.3;
const HIGH_VARIABILITY: f64 = 10.0;
const HIGH_ACTIVITY: f64 = 80.0;
const LOW_READINESS_DAYS: usize = 5;
const BURNOUT_LOW_DAYS: usize = 10;

const DECLINE_MIN_SCORE: f64 = 0.3;
const BURNOUT_MIN_SCORE: f64 = 0.4;

/// Kind of risk being assessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    SleepDecline,
    RecoveryDecline,
    Burnout,
}

impl RiskType {
    pub fn category(&self) -> RiskCategory {
        match self {
            RiskType::SleepDecline => RiskCategory::Sleep,
            RiskType::RecoveryDecline => RiskCategory::Recovery,
            RiskType::Burnout => RiskCategory::Wellbeing,
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            RiskType::SleepDecline => &[
                "Keep a consistent bedtime and wake time, including weekends",
                "Finish the last meal at least three hours before bed",
                "Cut back on added sugar and alcohol in the evening",
                "Keep the bedroom dark, quiet and cool",
            ],
            RiskType::RecoveryDecline => &[
                "Schedule a lighter training day or active recovery",
                "Prioritise protein intake spread across the day",
                "Aim for an extra 30 to 60 minutes of sleep",
                "Stay hydrated and limit alcohol",
            ],
            RiskType::Burnout => &[
                "Reduce training volume for at least a week",
                "Protect eight hours in bed every night",
                "Plan rest days and low-stress activities",
                "Talk to a healthcare professional if fatigue persists",
            ],
        }
    }

    pub fn early_warning_signs(&self) -> &'static [&'static str] {
        match self {
            RiskType::SleepDecline => &[
                "Taking longer to fall asleep",
                "Waking during the night",
                "Daytime drowsiness",
            ],
            RiskType::RecoveryDecline => &[
                "Elevated resting heart rate",
                "Falling HRV",
                "Persistent muscle soreness",
            ],
            RiskType::Burnout => &[
                "Constant fatigue despite rest",
                "Loss of motivation to train",
                "Irritability and poor concentration",
                "Frequent minor illness",
            ],
        }
    }
}

impl std::fmt::Display for RiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskType::SleepDecline => write!(f, "sleep decline"),
            RiskType::RecoveryDecline => write!(f, "recovery decline"),
            RiskType::Burnout => write!(f, "burnout"),
        }
    }
}

/// Health area a risk belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Sleep,
    Recovery,
    Wellbeing,
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::Sleep => write!(f, "sleep"),
            RiskCategory::Recovery => write!(f, "recovery"),
            RiskCategory::Wellbeing => write!(f, "wellbeing"),
        }
    }
}

/// Ordinal bucket of a risk score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            RiskLevel::Critical
        } else if score >= 0.5 {
            RiskLevel::High
        } else if score >= 0.3 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// One triggered rule component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    pub description: String,
    /// Weight this factor added to the risk score
    pub impact_score: f64,
}

impl RiskFactor {
    pub fn new(description: impl Into<String>, impact_score: f64) -> Self {
        Self {
            description: description.into(),
            impact_score,
        }
    }
}

/// A realized risk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthRiskAssessment {
    pub risk_type: RiskType,
    pub category: RiskCategory,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Ordered by impact, largest first
    pub contributing_factors: Vec<RiskFactor>,
    pub recommendations: Vec<String>,
    pub early_warning_signs: Vec<String>,
}

impl HealthRiskAssessment {
    fn from_factors(risk_type: RiskType, mut factors: Vec<RiskFactor>, level: RiskLevel) -> Self {
        factors.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));
        Self {
            risk_type,
            category: risk_type.category(),
            risk_score: total_score(&factors),
            risk_level: level,
            contributing_factors: factors,
            recommendations: risk_type.recommendations().iter().map(|s| s.to_string()).collect(),
            early_warning_signs: risk_type
                .early_warning_signs()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Sum of factor weights, clamped to `[0, 1]`
///
/// Rounded to six places so `0.3 + 0.2` lands on the 0.5 boundary.
pub fn total_score(factors: &[RiskFactor]) -> f64 {
    let sum: f64 = factors.iter().map(|f| f.impact_score).sum();
    ((sum * 1e6).round() / 1e6).clamp(0.0, 1.0)
}

// Factors

/// +0.3 when the recent window falls faster than 0.5 points/day with R² > 0.3
pub fn declining_slope_factor(recent: &[f64], label: &str) -> Option<RiskFactor> {
    let fit = stats::linear_regression(recent)?;
    (fit.slope < DECLINE_SLOPE && fit.r_squared > DECLINE_R_SQUARED).then(|| {
        RiskFactor::new(
            format!("{} falling {:.1} points per day over the last week", label, -fit.slope),
            0.3,
        )
    })
}

/// +0.3 when the recent average sits at least 5 points below the overall average
pub fn average_drop_factor(overall: &[f64], recent: &[f64], label: &str) -> Option<RiskFactor> {
    let overall_avg = stats::mean(overall)?;
    let recent_avg = stats::mean(recent)?;
    let drop = overall_avg - recent_avg;
    (drop >= MIN_AVERAGE_DROP).then(|| {
        RiskFactor::new(
            format!(
                "{} averaged {:.1} this week, {:.1} below the usual {:.1}",
                label, recent_avg, drop, overall_avg
            ),
            0.3,
        )
    })
}

/// Fires with `impact` when the recent average is below `threshold`
pub fn low_average_factor(
    recent: &[f64],
    threshold: f64,
    label: &str,
    impact: f64,
) -> Option<RiskFactor> {
    let avg = stats::mean(recent)?;
    (avg < threshold).then(|| {
        RiskFactor::new(
            format!("{} averaged {:.1} this week, below {:.0}", label, avg, threshold),
            impact,
        )
    })
}

/// +0.2 when the recent standard deviation exceeds 10
pub fn variability_factor(recent: &[f64], label: &str) -> Option<RiskFactor> {
    let sd = stats::std_dev(recent)?;
    (sd > HIGH_VARIABILITY).then(|| {
        RiskFactor::new(
            format!("{} swinging widely (std-dev {:.1})", label, sd),
            0.2,
        )
    })
}

/// +0.2 when at least 5 of the last 7 days are below `threshold`
pub fn frequent_low_days_factor(recent: &[f64], threshold: f64, label: &str) -> Option<RiskFactor> {
    let low = recent.iter().filter(|v| **v < threshold).count();
    (low >= LOW_READINESS_DAYS).then(|| {
        RiskFactor::new(
            format!("{} below {:.0} on {} of the last {} days", label, threshold, low, recent.len()),
            0.2,
        )
    })
}

/// +0.4 when both two-week sleep and readiness averages are low
pub fn sustained_low_factor(sleep: &[f64], readiness: &[f64], threshold: f64) -> Option<RiskFactor> {
    let sleep_avg = stats::mean(sleep)?;
    let readiness_avg = stats::mean(readiness)?;
    (sleep_avg < threshold && readiness_avg < threshold).then(|| {
        RiskFactor::new(
            format!(
                "Two-week sleep ({:.1}) and readiness ({:.1}) both below {:.0}",
                sleep_avg, readiness_avg, threshold
            ),
            0.4,
        )
    })
}

/// +0.3 when activity stays high while readiness is low
pub fn overtraining_factor(
    activity_recent: &[f64],
    readiness_recent: &[f64],
    threshold: f64,
) -> Option<RiskFactor> {
    let activity_avg = stats::mean(activity_recent)?;
    let readiness_avg = stats::mean(readiness_recent)?;
    (activity_avg > HIGH_ACTIVITY && readiness_avg < threshold).then(|| {
        RiskFactor::new(
            format!(
                "High activity ({:.1}) while readiness is low ({:.1})",
                activity_avg, readiness_avg
            ),
            0.3,
        )
    })
}

/// Count of days where sleep or readiness (whichever is recorded) is low
pub fn low_day_count(wearable: &DailyMetrics, dates: &[NaiveDate], threshold: f64) -> usize {
    dates
        .iter()
        .filter(|date| {
            let low = |metric| {
                wearable
                    .valid(date, metric)
                    .map(|v| v < threshold)
                    .unwrap_or(false)
            };
            low(MetricId::SleepScore) || low(MetricId::ReadinessScore)
        })
        .count()
}

/// +0.3 when at least 10 of the last 14 days show low sleep or readiness
pub fn chronic_low_days_factor(
    wearable: &DailyMetrics,
    dates: &[NaiveDate],
    threshold: f64,
) -> Option<RiskFactor> {
    let low = low_day_count(wearable, dates, threshold);
    (low >= BURNOUT_LOW_DAYS).then(|| {
        RiskFactor::new(
            format!("Low sleep or readiness on {} of the last {} days", low, dates.len()),
            0.3,
        )
    })
}

// Rules

fn require(metric: MetricId, values: &[f64], needed: usize) -> AnalyticsResult<()> {
    if values.len() < needed {
        tracing::debug!(
            metric = %metric,
            available = values.len(),
            needed,
            "Not enough history for risk rule"
        );
        return Err(AnalyticsError::insufficient(needed, values.len()));
    }
    Ok(())
}

fn recent(values: &[f64], days: usize) -> &[f64] {
    &values[values.len().saturating_sub(days)..]
}

/// Sleep-decline risk; `Ok(None)` when the score stays under 0.3
pub fn assess_sleep_decline(
    wearable: &DailyMetrics,
    config: &RiskConfig,
) -> AnalyticsResult<Option<HealthRiskAssessment>> {
    let sleep = wearable.series(MetricId::SleepScore).values();
    require(MetricId::SleepScore, &sleep, RECENT_DAYS)?;
    let last_week = recent(&sleep, RECENT_DAYS);

    let factors: Vec<RiskFactor> = [
        declining_slope_factor(last_week, "Sleep score"),
        average_drop_factor(&sleep, last_week, "Sleep score"),
        low_average_factor(last_week, config.low_score_threshold, "Sleep score", 0.2),
        variability_factor(last_week, "Sleep score"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let score = total_score(&factors);
    if score < DECLINE_MIN_SCORE {
        return Ok(None);
    }
    Ok(Some(HealthRiskAssessment::from_factors(
        RiskType::SleepDecline,
        factors,
        RiskLevel::from_score(score),
    )))
}

/// Recovery-decline risk from readiness and HRV balance
pub fn assess_recovery_decline(
    wearable: &DailyMetrics,
    config: &RiskConfig,
) -> AnalyticsResult<Option<HealthRiskAssessment>> {
    let readiness = wearable.series(MetricId::ReadinessScore).values();
    require(MetricId::ReadinessScore, &readiness, RECENT_DAYS)?;
    let hrv = wearable.series(MetricId::HrvBalance).values();
    let readiness_week = recent(&readiness, RECENT_DAYS);

    let factors: Vec<RiskFactor> = [
        low_average_factor(readiness_week, config.low_score_threshold, "Readiness", 0.3),
        average_drop_factor(&hrv, recent(&hrv, RECENT_DAYS), "HRV balance"),
        frequent_low_days_factor(readiness_week, config.low_score_threshold, "Readiness"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let score = total_score(&factors);
    if score < DECLINE_MIN_SCORE {
        return Ok(None);
    }
    Ok(Some(HealthRiskAssessment::from_factors(
        RiskType::RecoveryDecline,
        factors,
        RiskLevel::from_score(score),
    )))
}

/// Burnout risk; needs two weeks of sleep and readiness
pub fn assess_burnout(
    wearable: &DailyMetrics,
    config: &RiskConfig,
) -> AnalyticsResult<Option<HealthRiskAssessment>> {
    let sleep_series = wearable.series(MetricId::SleepScore);
    let readiness_series = wearable.series(MetricId::ReadinessScore);
    let sleep = sleep_series.values();
    let readiness = readiness_series.values();
    require(MetricId::SleepScore, &sleep, BURNOUT_DAYS)?;
    require(MetricId::ReadinessScore, &readiness, BURNOUT_DAYS)?;

    let activity = wearable.series(MetricId::ActivityScore).values();

    let mut dates: Vec<NaiveDate> = sleep_series
        .points
        .iter()
        .chain(readiness_series.points.iter())
        .map(|(d, _)| *d)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let dates = dates.split_off(dates.len().saturating_sub(BURNOUT_DAYS));

    let threshold = config.low_score_threshold;
    let factors: Vec<RiskFactor> = [
        sustained_low_factor(
            recent(&sleep, BURNOUT_DAYS),
            recent(&readiness, BURNOUT_DAYS),
            threshold,
        ),
        overtraining_factor(
            recent(&activity, RECENT_DAYS),
            recent(&readiness, RECENT_DAYS),
            threshold,
        ),
        chronic_low_days_factor(wearable, &dates, threshold),
    ]
    .into_iter()
    .flatten()
    .collect();

    let score = total_score(&factors);
    if score < BURNOUT_MIN_SCORE {
        return Ok(None);
    }
    let level = if score >= 0.7 {
        RiskLevel::Critical
    } else {
        RiskLevel::High
    };
    Ok(Some(HealthRiskAssessment::from_factors(RiskType::Burnout, factors, level)))
}

/// Run every enabled rule, most severe first
///
/// Rules lacking history are skipped; other failures are logged and dropped.
pub fn assess_all(wearable: &DailyMetrics, config: &RiskConfig) -> Vec<HealthRiskAssessment> {
    type Rule = fn(&DailyMetrics, &RiskConfig) -> AnalyticsResult<Option<HealthRiskAssessment>>;

    let rules: [(RiskType, bool, Rule); 3] = [
        (RiskType::SleepDecline, config.sleep_decline, assess_sleep_decline),
        (RiskType::RecoveryDecline, config.recovery_decline, assess_recovery_decline),
        (RiskType::Burnout, config.burnout, assess_burnout),
    ];

    let mut risks: Vec<HealthRiskAssessment> = rules
        .iter()
        .filter(|(_, enabled, _)| *enabled)
        .filter_map(|(risk_type, _, rule)| match rule(wearable, config) {
            Ok(risk) => risk,
            Err(e) if e.is_insufficient_data() => {
                tracing::debug!(risk = %risk_type, error = %e, "Skipping risk rule");
                None
            }
            Err(e) => {
                tracing::warn!(risk = %risk_type, error = %e, "Risk rule failed");
                None
            }
        })
        .collect();

    risks.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then(a.risk_type.cmp(&b.risk_type))
    });

    tracing::info!(realized = risks.len(), "Risk assessment complete");
    risks
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + Duration::days(i as i64)
    }

    fn wearable(metric: MetricId, values: &[f64]) -> DailyMetrics {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (day(i), metric, *v))
            .collect()
    }

    fn add(mut base: DailyMetrics, metric: MetricId, values: &[f64]) -> DailyMetrics {
        for (i, v) in values.iter().enumerate() {
            base.insert(day(i), metric, *v);
        }
        base
    }

    #[test]
    fn test_flat_low_sleep_is_not_a_decline() {
        let data = wearable(MetricId::SleepScore, &[60.0; 14]);
        let risk = assess_sleep_decline(&data, &RiskConfig::default()).unwrap();
        assert!(risk.is_none());
    }

    #[test]
    fn test_sleep_decline_detected() {
        let mut values = vec![85.0; 7];
        values.extend([80.0, 76.0, 72.0, 68.0, 64.0, 60.0, 56.0]);
        let data = wearable(MetricId::SleepScore, &values);

        let risk = assess_sleep_decline(&data, &RiskConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(risk.risk_type, RiskType::SleepDecline);
        assert_eq!(risk.category, RiskCategory::Sleep);
        assert_eq!(risk.contributing_factors.len(), 3);
        assert!((risk.risk_score - 0.8).abs() < 1e-9);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
        assert_eq!(risk.contributing_factors[0].impact_score, 0.3);
        assert_eq!(risk.contributing_factors[2].impact_score, 0.2);
        assert!(!risk.recommendations.is_empty());
        assert!(!risk.early_warning_signs.is_empty());
    }

    #[test]
    fn test_sleep_decline_needs_a_week() {
        let data = wearable(MetricId::SleepScore, &[50.0; 6]);
        let err = assess_sleep_decline(&data, &RiskConfig::default()).unwrap_err();
        assert!(err.is_insufficient_data());
    }

    #[test]
    fn test_sleep_factors_independent() {
        let erratic = [90.0, 60.0, 90.0, 60.0, 90.0, 60.0, 90.0];
        assert!(variability_factor(&erratic, "Sleep").is_some());
        assert!(declining_slope_factor(&erratic, "Sleep").is_none());
        assert!(low_average_factor(&erratic, 70.0, "Sleep", 0.2).is_none());

        let falling = [80.0, 78.0, 76.0, 74.0, 72.0, 70.0, 68.0];
        assert!(declining_slope_factor(&falling, "Sleep").is_some());
        assert!(variability_factor(&falling, "Sleep").is_none());
    }

    #[test]
    fn test_recovery_decline_detected() {
        let mut readiness = vec![80.0; 7];
        readiness.extend([65.0; 7]);
        let mut hrv = vec![60.0; 7];
        hrv.extend([50.0; 7]);
        let data = add(wearable(MetricId::ReadinessScore, &readiness), MetricId::HrvBalance, &hrv);

        let risk = assess_recovery_decline(&data, &RiskConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(risk.contributing_factors.len(), 3);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
        assert_eq!(risk.category, RiskCategory::Recovery);
    }

    #[test]
    fn test_recovery_without_hrv() {
        let data = wearable(MetricId::ReadinessScore, &[65.0; 7]);
        let risk = assess_recovery_decline(&data, &RiskConfig::default())
            .unwrap()
            .unwrap();
        // Low average + frequent low days
        assert!((risk.risk_score - 0.5).abs() < 1e-9);
        assert_eq!(risk.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_burnout_detected() {
        let data = add(
            add(wearable(MetricId::SleepScore, &[60.0; 14]), MetricId::ReadinessScore, &[60.0; 14]),
            MetricId::ActivityScore,
            &[85.0; 14],
        );
        let risk = assess_burnout(&data, &RiskConfig::default()).unwrap().unwrap();
        assert_eq!(risk.risk_score, 1.0);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
        assert_eq!(risk.contributing_factors[0].impact_score, 0.4);
        assert_eq!(risk.category, RiskCategory::Wellbeing);
    }

    #[test]
    fn test_burnout_needs_two_weeks() {
        let data = add(
            wearable(MetricId::SleepScore, &[60.0; 13]),
            MetricId::ReadinessScore,
            &[60.0; 13],
        );
        assert!(assess_burnout(&data, &RiskConfig::default())
            .unwrap_err()
            .is_insufficient_data());
    }

    #[test]
    fn test_burnout_threshold() {
        let data = add(
            wearable(MetricId::SleepScore, &[65.0; 14]),
            MetricId::ReadinessScore,
            &[75.0; 14],
        );
        // Only the chronic low-days factor fires
        let risk = assess_burnout(&data, &RiskConfig::default()).unwrap();
        assert!(risk.is_none());

        let data = add(
            wearable(MetricId::SleepScore, &[65.0; 14]),
            MetricId::ReadinessScore,
            &[65.0; 14],
        );
        let risk = assess_burnout(&data, &RiskConfig::default()).unwrap().unwrap();
        assert!((risk.risk_score - 0.7).abs() < 1e-9);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_assess_all_respects_toggles() {
        let data = add(
            add(wearable(MetricId::SleepScore, &[60.0; 14]), MetricId::ReadinessScore, &[60.0; 14]),
            MetricId::ActivityScore,
            &[85.0; 14],
        );

        let all = assess_all(&data, &RiskConfig::default());
        assert_eq!(all[0].risk_type, RiskType::Burnout);
        assert!(all.iter().any(|r| r.risk_type == RiskType::RecoveryDecline));

        let config = RiskConfig {
            burnout: false,
            ..RiskConfig::default()
        };
        let without = assess_all(&data, &config);
        assert!(without.iter().all(|r| r.risk_type != RiskType::Burnout));
    }

    #[test]
    fn test_risk_level_buckets() {
        assert_eq!(RiskLevel::from_score(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.5), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::Critical);
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_string(&RiskType::RecoveryDecline).unwrap();
        assert_eq!(json, "\"recovery_decline\"");
        let json = serde_json::to_string(&RiskLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
