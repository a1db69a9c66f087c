//! Health Data Sources
//!
//! This module provides the boundary where raw records enter the system:
//! - File-backed meals (JSON or CSV) and wearable days (JSON)
//! - CSV meal import with flexible column mapping
//! - An in-memory source for tests and embedding
//!
//! Network clients for wearable or nutrition services implement the same
//! [`HealthDataSource`] trait.

mod csv_import;
mod file;

pub use csv_import::{import_meals_csv, MealCsvImporter, MealField, MealImportResult};
pub use file::FileSource;

use crate::metrics::{MealRecord, WearableDay};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

/// Common trait for all raw-data providers
#[async_trait]
pub trait HealthDataSource: Send + Sync {
    /// Unique name for this source
    fn name(&self) -> &str;

    /// Meals logged within `range` (all meals when `None`)
    async fn fetch_meals(&self, range: Option<DateRange>) -> Result<Vec<MealRecord>, SourceError>;

    /// Wearable days within `range` (all days when `None`)
    async fn fetch_wearable_days(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<WearableDay>, SourceError>;
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` days ending on `end`, inclusive
    pub fn last_days(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days((days - 1).max(0)),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Keep only items whose date falls in `range`
pub(crate) fn filter_range<T>(
    items: Vec<T>,
    range: Option<DateRange>,
    date_of: impl Fn(&T) -> NaiveDate,
) -> Vec<T> {
    match range {
        Some(range) => items.into_iter().filter(|i| range.contains(date_of(i))).collect(),
        None => items,
    }
}

/// Source holding records in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    meals: Vec<MealRecord>,
    days: Vec<WearableDay>,
}

impl MemorySource {
    pub fn new(meals: Vec<MealRecord>, days: Vec<WearableDay>) -> Self {
        Self { meals, days }
    }
}

#[async_trait]
impl HealthDataSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_meals(&self, range: Option<DateRange>) -> Result<Vec<MealRecord>, SourceError> {
        Ok(filter_range(self.meals.clone(), range, |m| m.timestamp.date()))
    }

    async fn fetch_wearable_days(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<WearableDay>, SourceError> {
        Ok(filter_range(self.days.clone(), range, |d| d.date))
    }
}

/// Errors that can occur while fetching raw records
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::last_days(date(10), 7);
        assert_eq!(range.start, date(4));
        assert!(range.contains(date(4)));
        assert!(range.contains(date(10)));
        assert!(!range.contains(date(3)));
        assert!(!range.contains(date(11)));
    }

    #[tokio::test]
    async fn test_memory_source_filters_by_range() {
        let meals = vec![
            MealRecord::at(date(1).and_hms_opt(8, 0, 0).unwrap()),
            MealRecord::at(date(5).and_hms_opt(19, 0, 0).unwrap()),
        ];
        let days = vec![WearableDay::new(date(1)), WearableDay::new(date(5))];
        let source = MemorySource::new(meals, days);

        let range = Some(DateRange::new(date(3), date(6)));
        assert_eq!(source.fetch_meals(range).await.unwrap().len(), 1);
        assert_eq!(source.fetch_wearable_days(range).await.unwrap().len(), 1);
        assert_eq!(source.fetch_meals(None).await.unwrap().len(), 2);
        assert_eq!(source.name(), "memory");
    }
}
