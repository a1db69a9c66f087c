//! Daily metric vocabulary and aggregation
//!
//! - **types**: `MetricId`, `DailyMetrics`, `DailyMetricSeries`
//! - **aggregator**: Raw meal and wearable records → daily mappings

pub mod aggregator;
pub mod types;

pub use aggregator::{
    aggregate_nutrition, aggregate_wearable, ActivitySummary, MealRecord, ReadinessSummary,
    SleepSummary, WearableDay,
};
pub use types::{
    date_union, overlapping_days, DailyMetricSeries, DailyMetrics, Domain, MetricId, MetricValues,
    UnknownMetric,
};
