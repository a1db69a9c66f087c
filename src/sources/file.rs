//! File-backed data source
//!
//! Meals come from a JSON array of [`MealRecord`] or a CSV export; wearable
//! days come from a JSON array of [`WearableDay`]. An unset path yields no
//! records.

use super::{filter_range, DateRange, HealthDataSource, MealCsvImporter, SourceError};
use crate::metrics::{MealRecord, WearableDay};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct FileSource {
    meals_path: Option<PathBuf>,
    wearable_path: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from optional paths; at least one must be set
    pub fn from_paths(
        meals_path: Option<PathBuf>,
        wearable_path: Option<PathBuf>,
    ) -> Result<Self, SourceError> {
        if meals_path.is_none() && wearable_path.is_none() {
            return Err(SourceError::NotConfigured(
                "no meals or wearable file given".to_string(),
            ));
        }
        Ok(Self {
            meals_path,
            wearable_path,
        })
    }

    pub fn with_meals(mut self, path: impl Into<PathBuf>) -> Self {
        self.meals_path = Some(path.into());
        self
    }

    pub fn with_wearable(mut self, path: impl Into<PathBuf>) -> Self {
        self.wearable_path = Some(path.into());
        self
    }

    pub fn meals_path(&self) -> Option<&Path> {
        self.meals_path.as_deref()
    }

    pub fn wearable_path(&self) -> Option<&Path> {
        self.wearable_path.as_deref()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

async fn load_meals(path: &Path) -> Result<Vec<MealRecord>, SourceError> {
    let content = tokio::fs::read_to_string(path).await?;

    if is_csv(path) {
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers = reader.headers()?.clone();
        let mut importer = MealCsvImporter::new();
        importer.auto_detect_columns(&headers);

        let result = importer.import_str(&content);
        for error in &result.errors {
            tracing::warn!(path = %path.display(), error = %error, "Skipped meal row");
        }
        return Ok(result.meals);
    }

    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl HealthDataSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_meals(&self, range: Option<DateRange>) -> Result<Vec<MealRecord>, SourceError> {
        let Some(path) = &self.meals_path else {
            return Ok(Vec::new());
        };
        let meals = load_meals(path).await?;
        tracing::debug!(path = %path.display(), meals = meals.len(), "Loaded meals");
        Ok(filter_range(meals, range, |m| m.timestamp.date()))
    }

    async fn fetch_wearable_days(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<WearableDay>, SourceError> {
        let Some(path) = &self.wearable_path else {
            return Ok(Vec::new());
        };
        let content = tokio::fs::read_to_string(path).await?;
        let days: Vec<WearableDay> = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), days = days.len(), "Loaded wearable days");
        Ok(filter_range(days, range, |d| d.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_json_meals_and_wearable() {
        let meals = write_temp(
            ".json",
            r#"[
                {"timestamp": "2024-04-01T08:00:00", "calories": 500, "sugar_g": 10},
                {"timestamp": "2024-04-02T20:30:00", "calories": 900}
            ]"#,
        );
        let wearable = write_temp(
            ".json",
            r#"[
                {"date": "2024-04-01", "sleep": {"score": 82, "deep_sleep_duration": 5400}},
                {"date": "2024-04-02", "readiness": {"score": 75}}
            ]"#,
        );

        let source = FileSource::new()
            .with_meals(meals.path())
            .with_wearable(wearable.path());

        let loaded = source.fetch_meals(None).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].sugar_g, 10.0);
        assert_eq!(loaded[1].protein_g, 0.0);

        let days = source.fetch_wearable_days(None).await.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].sleep.as_ref().unwrap().score, Some(82.0));
        assert!(days[1].sleep.is_none());

        let day = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let range = Some(DateRange::new(day, day));
        assert_eq!(source.fetch_meals(range).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_csv_meals() {
        let meals = write_temp(
            ".csv",
            "date,calories,protein\n2024-04-01 12:30,650,35\n2024-04-01 19:00,700,40\n",
        );
        let source = FileSource::new().with_meals(meals.path());
        let loaded = source.fetch_meals(None).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].protein_g, 40.0);
    }

    #[tokio::test]
    async fn test_unset_paths_yield_nothing() {
        let source = FileSource::new();
        assert!(source.fetch_meals(None).await.unwrap().is_empty());
        assert!(source.fetch_wearable_days(None).await.unwrap().is_empty());
        assert!(FileSource::from_paths(None, None).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = FileSource::new().with_wearable("/nonexistent/healthlens/days.json");
        let err = source.fetch_wearable_days(None).await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }
}
