//! Causal Inference Engine
//!
//! Turns ranked correlations into a directed graph of likely
//! nutrition → biometric influences.
//!
//! Each edge combines three pieces of evidence:
//! - correlation strength (|r|, the base score)
//! - temporal precedence (the pair was configured with a lag > 0)
//! - an approximate Granger test over the raw aligned series
//!
//! The Granger test here is a heuristic: the restricted model predicts `Y_t`
//! from its own mean, and the unrestricted RSS is the restricted RSS reduced
//! in proportion to `|corr(X_{t-k}, Y_t)|`, capped at 30%. It is not an ARX fit.

use crate::analysis::config::{AnalyticsConfig, CorrelationCategory};
use crate::analysis::correlations::CorrelationResult;
use crate::analysis::error::{AnalyticsError, AnalyticsResult};
use crate::analysis::stats;
use crate::metrics::{date_union, DailyMetrics, Domain, MetricId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest lag tried by the Granger test
const GRANGER_MAX_LAG: usize = 3;

/// F-ratio a lag must exceed to become a candidate
const GRANGER_F_THRESHOLD: f64 = 3.0;

/// Approximate p-value a candidate must stay below
const GRANGER_SIGNIFICANCE: f64 = 0.10;

/// Upper bound on the RSS reduction credited to X
const MAX_RSS_REDUCTION: f64 = 0.3;

/// Share of |corr| credited as RSS reduction
const RSS_REDUCTION_PER_CORR: f64 = 0.5;

const GRANGER_BONUS: f64 = 0.2;
const PRECEDENCE_BONUS: f64 = 0.1;

/// Kinds of evidence supporting a causal edge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    Correlation,
    TemporalPrecedence,
    GrangerCausality,
}

/// Outcome of the approximate Granger test at its best lag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrangerResult {
    pub lag: usize,
    pub f_statistic: f64,
    pub p_value: f64,
}

impl GrangerResult {
    pub fn is_significant(&self) -> bool {
        self.p_value < GRANGER_SIGNIFICANCE
    }
}

/// Run the approximate Granger test of `x` → `y`
///
/// Returns the lag with the smallest approximate p-value among lags whose
/// F-ratio exceeds 3.0, or `None` when no lag qualifies.
pub fn granger_test(x: &[f64], y: &[f64]) -> Option<GrangerResult> {
    let n = x.len().min(y.len());
    let mut best: Option<GrangerResult> = None;

    for k in 1..=GRANGER_MAX_LAG {
        let Some(candidate) = granger_at_lag(&x[..n], &y[..n], k) else {
            continue;
        };

        if candidate.f_statistic <= GRANGER_F_THRESHOLD {
            continue;
        }

        match &best {
            Some(b) if b.p_value <= candidate.p_value => {}
            _ => best = Some(candidate),
        }
    }

    best
}

fn granger_at_lag(x: &[f64], y: &[f64], k: usize) -> Option<GrangerResult> {
    let n = y.len();
    if n <= 2 * k + 1 {
        return None;
    }
    let residual_df = (n - 2 * k - 1) as f64;

    let target = &y[k..];
    let target_mean = stats::mean(target)?;
    let rss_restricted: f64 = target.iter().map(|v| (v - target_mean).powi(2)).sum();

    let lagged_corr = stats::pearson(&x[..n - k], target).unwrap_or(0.0);
    let reduction = (RSS_REDUCTION_PER_CORR * lagged_corr.abs()).min(MAX_RSS_REDUCTION);
    let rss_unrestricted = rss_restricted * (1.0 - reduction);

    if rss_unrestricted <= 0.0 || !rss_unrestricted.is_finite() {
        return None;
    }

    let f_statistic =
        ((rss_restricted - rss_unrestricted) / k as f64) / (rss_unrestricted / residual_df);

    Some(GrangerResult {
        lag: k,
        f_statistic,
        p_value: 1.0 / (1.0 + f_statistic / 3.0),
    })
}

/// A metric in the causal graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CausalNode {
    pub id: MetricId,
    pub label: String,
    pub domain: Domain,
}

impl CausalNode {
    fn from_metric(metric: MetricId) -> Self {
        Self {
            id: metric,
            label: metric.display_name().to_string(),
            domain: metric.domain(),
        }
    }
}

/// Directed edge `from → to`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CausalEdge {
    pub from: MetricId,
    pub to: MetricId,
    pub category: CorrelationCategory,
    pub correlation: f64,
    pub granger_p_value: Option<f64>,
    /// Granger lag when found, otherwise the correlation's lag
    pub optimal_lag: usize,
    /// Composite score (0 to 1)
    pub causality_score: f64,
    pub evidence: Vec<Evidence>,
}

impl CausalEdge {
    pub fn has_evidence(&self, evidence: Evidence) -> bool {
        self.evidence.contains(&evidence)
    }
}

/// Causal graph of nutrition → biometric relationships
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CausalGraph {
    pub nodes: Vec<CausalNode>,
    /// Sorted by causality score, highest first
    pub edges: Vec<CausalEdge>,
}

impl CausalGraph {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges pointing at `metric`
    pub fn causes_of(&self, metric: MetricId) -> Vec<&CausalEdge> {
        self.edges.iter().filter(|e| e.to == metric).collect()
    }

    /// Edges leaving `metric`
    pub fn effects_of(&self, metric: MetricId) -> Vec<&CausalEdge> {
        self.edges.iter().filter(|e| e.from == metric).collect()
    }

    /// Highest-scoring cause of `metric`
    pub fn strongest_cause(&self, metric: MetricId) -> Option<&CausalEdge> {
        self.causes_of(metric).into_iter().max_by(|a, b| {
            a.causality_score
                .partial_cmp(&b.causality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Builds causal graphs from ranked correlations
#[derive(Debug, Clone, Default)]
pub struct CausalEngine {
    config: AnalyticsConfig,
}

impl CausalEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Build the causal graph from the top correlations
    ///
    /// Considers at most `max_causal_pairs` correlations (by |r|) and keeps
    /// edges whose causality score exceeds the configured threshold.
    pub fn build_graph(
        &self,
        correlations: &[CorrelationResult],
        nutrition: &DailyMetrics,
        wearable: &DailyMetrics,
    ) -> CausalGraph {
        let mut ranked: Vec<(usize, &CorrelationResult)> = correlations.iter().enumerate().collect();
        ranked.sort_by(|(ia, a), (ib, b)| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });
        ranked.truncate(self.config.max_causal_pairs);

        let mut edges = Vec::new();
        for (index, correlation) in &ranked {
            match self.analyze_pair(correlation, nutrition, wearable) {
                Ok(edge) if edge.causality_score > self.config.causal_score_threshold => {
                    tracing::debug!(
                        from = %edge.from,
                        to = %edge.to,
                        score = edge.causality_score,
                        granger = edge.granger_p_value.is_some(),
                        "Causal edge"
                    );
                    edges.push((*index, edge));
                }
                Ok(edge) => {
                    tracing::trace!(
                        from = %edge.from,
                        to = %edge.to,
                        score = edge.causality_score,
                        "Causal edge below threshold"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        from = %correlation.metric_a,
                        to = %correlation.metric_b,
                        error = %e,
                        "Failed to analyse causal pair"
                    );
                }
            }
        }

        edges.sort_by(|(ia, a), (ib, b)| {
            b.causality_score
                .partial_cmp(&a.causality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        });
        let edges: Vec<CausalEdge> = edges.into_iter().map(|(_, e)| e).collect();

        let mut nodes = BTreeMap::new();
        for edge in &edges {
            nodes
                .entry(edge.from)
                .or_insert_with(|| CausalNode::from_metric(edge.from));
            nodes
                .entry(edge.to)
                .or_insert_with(|| CausalNode::from_metric(edge.to));
        }

        tracing::info!(
            considered = ranked.len(),
            edges = edges.len(),
            nodes = nodes.len(),
            "Built causal graph"
        );

        CausalGraph {
            nodes: nodes.into_values().collect(),
            edges,
        }
    }

    /// Score one correlation as a causal edge, without threshold pruning
    pub fn analyze_pair(
        &self,
        correlation: &CorrelationResult,
        nutrition: &DailyMetrics,
        wearable: &DailyMetrics,
    ) -> AnalyticsResult<CausalEdge> {
        if !correlation.coefficient.is_finite() {
            return Err(AnalyticsError::NumericDegenerate(format!(
                "non-finite correlation between {} and {}",
                correlation.metric_a, correlation.metric_b
            )));
        }

        let (xs, ys) = align_all(correlation.metric_a, correlation.metric_b, nutrition, wearable);

        let granger = if xs.len() >= self.config.causal_min_points {
            granger_test(&xs, &ys).filter(GrangerResult::is_significant)
        } else {
            None
        };

        let mut evidence = vec![Evidence::Correlation];
        let mut score = correlation.coefficient.abs();

        if correlation.lag_days > 0 {
            evidence.push(Evidence::TemporalPrecedence);
            score += PRECEDENCE_BONUS;
        }
        if granger.is_some() {
            evidence.push(Evidence::GrangerCausality);
            score += GRANGER_BONUS;
        }

        Ok(CausalEdge {
            from: correlation.metric_a,
            to: correlation.metric_b,
            category: correlation.category,
            correlation: correlation.coefficient,
            granger_p_value: granger.map(|g| g.p_value),
            optimal_lag: granger.map(|g| g.lag).unwrap_or(correlation.lag_days),
            causality_score: score.clamp(0.0, 1.0),
            evidence,
        })
    }
}

/// Same-day `(x, y)` values for every date where both are present
fn align_all(
    x_metric: MetricId,
    y_metric: MetricId,
    nutrition: &DailyMetrics,
    wearable: &DailyMetrics,
) -> (Vec<f64>, Vec<f64>) {
    let source = move |metric: MetricId| match metric.domain() {
        Domain::Nutrition => nutrition,
        Domain::Wearable => wearable,
    };
    let x_source = source(x_metric);
    let y_source = source(y_metric);

    date_union(nutrition, wearable)
        .iter()
        .filter_map(|date| Some((x_source.valid(date, x_metric)?, y_source.valid(date, y_metric)?)))
        .unzip()
}
