//! Fallback summary
//!
//! Builds a short plain-language summary from the top-ranked correlation,
//! the most notable trend and the most severe risk. Used when no language
//! model is available to write one; output depends only on the inputs.

use crate::analysis::correlations::{CorrelationResult, Direction};
use crate::analysis::risk::HealthRiskAssessment;
use crate::analysis::trends::{HealthTrend, Significance, TrendType};

const NO_FINDINGS: &str = "Not enough data yet to identify patterns. \
     Keep logging meals and syncing your wearable to unlock insights.";

/// Assemble the summary sentence(s)
///
/// Inputs are expected in their ranked order (strongest correlation and most
/// severe risk first); trends are ranked here.
pub fn fallback_summary(
    correlations: &[CorrelationResult],
    trends: &[HealthTrend],
    risks: &[HealthRiskAssessment],
) -> String {
    let mut parts = Vec::new();

    if let Some(top) = correlations.first() {
        parts.push(describe_correlation(top));
    }

    if let Some(trend) = most_notable_trend(trends) {
        parts.push(describe_trend(trend));
    }

    if let Some(risk) = risks.first() {
        parts.push(describe_risk(risk));
    }

    if parts.is_empty() {
        NO_FINDINGS.to_string()
    } else {
        parts.join(" ")
    }
}

fn describe_correlation(c: &CorrelationResult) -> String {
    let relation = match c.direction {
        Direction::Positive => "higher",
        Direction::Negative => "lower",
    };
    let timing = match c.lag_days {
        0 => "the same day".to_string(),
        1 => "the next day".to_string(),
        n => format!("{} days later", n),
    };
    format!(
        "Higher {} is linked to {} {} {} ({} correlation, r = {:.2} across {} days).",
        c.metric_a.display_name(),
        relation,
        c.metric_b.display_name(),
        timing,
        c.strength,
        c.coefficient,
        c.sample_size
    )
}

/// Highest significance, then largest |%Δ|; noise and fluctuating trends are skipped
fn most_notable_trend(trends: &[HealthTrend]) -> Option<&HealthTrend> {
    trends
        .iter()
        .filter(|t| t.significance > Significance::Noise && t.trend_type != TrendType::Fluctuating)
        .max_by(|a, b| {
            a.significance
                .cmp(&b.significance)
                .then(a.percent_change.abs().total_cmp(&b.percent_change.abs()))
                // Prefer the earlier metric on exact ties
                .then(b.metric.cmp(&a.metric))
        })
}

fn describe_trend(t: &HealthTrend) -> String {
    let name = t.metric.display_name();
    match t.trend_type {
        TrendType::Stable => format!(
            "Your {} has held steady around {:.1} ({:+.1}% recently).",
            name, t.average, t.percent_change
        ),
        _ => format!(
            "Your {} is {} ({:+.1}% over the last week, {}).",
            name, t.trend_type, t.percent_change, t.significance
        ),
    }
}

fn describe_risk(r: &HealthRiskAssessment) -> String {
    let level = r.risk_level.to_string();
    let mut level_chars = level.chars();
    let level = match level_chars.next() {
        Some(first) => first.to_uppercase().chain(level_chars).collect(),
        None => level,
    };

    match r.contributing_factors.first() {
        Some(factor) => format!(
            "{} {} risk: {}.",
            level, r.risk_type, factor.description
        ),
        None => format!("{} {} risk detected.", level, r.risk_type),
    }
}
