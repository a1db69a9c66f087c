//! CSV Meal Import
//!
//! Reads meal logs exported from nutrition trackers. Supports flexible
//! column mapping and multiple timestamp formats.

use super::SourceError;
use crate::metrics::MealRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::Path;

/// Nutrient a CSV column maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealField {
    Calories,
    ProteinG,
    CarbsG,
    FatG,
    FiberG,
    SugarG,
    SodiumMg,
}

impl MealField {
    /// Recognise common header spellings
    pub fn from_header(header: &str) -> Option<Self> {
        let h = header.trim().to_lowercase().replace([' ', '-'], "_");
        let field = if h.starts_with("calorie") || h == "kcal" || h == "energy_kcal" {
            MealField::Calories
        } else if h.starts_with("protein") {
            MealField::ProteinG
        } else if h.starts_with("carb") {
            MealField::CarbsG
        } else if h.starts_with("fat") || h == "total_fat" {
            MealField::FatG
        } else if h.starts_with("fiber") || h.starts_with("fibre") {
            MealField::FiberG
        } else if h.starts_with("sugar") {
            MealField::SugarG
        } else if h.starts_with("sodium") {
            MealField::SodiumMg
        } else {
            return None;
        };
        Some(field)
    }

    fn apply(&self, meal: &mut MealRecord, value: f64) {
        match self {
            MealField::Calories => meal.calories = value,
            MealField::ProteinG => meal.protein_g = value,
            MealField::CarbsG => meal.carbs_g = value,
            MealField::FatG => meal.fat_g = value,
            MealField::FiberG => meal.fiber_g = value,
            MealField::SugarG => meal.sugar_g = value,
            MealField::SodiumMg => meal.sodium_mg = value,
        }
    }
}

/// CSV meal importer with configurable column mapping
pub struct MealCsvImporter {
    /// Column index for timestamps (0-indexed)
    timestamp_column: usize,
    /// Format string tried before the built-in formats
    timestamp_format: String,
    field_columns: Vec<(usize, MealField)>,
    has_header: bool,
}

/// Result of a CSV import operation
#[derive(Debug)]
pub struct MealImportResult {
    pub meals: Vec<MealRecord>,
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

impl Default for MealCsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MealCsvImporter {
    pub fn new() -> Self {
        Self {
            timestamp_column: 0,
            timestamp_format: "%Y-%m-%d %H:%M".to_string(),
            field_columns: Vec::new(),
            has_header: true,
        }
    }

    pub fn with_timestamp_column(mut self, column: usize) -> Self {
        self.timestamp_column = column;
        self
    }

    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    /// Map a column onto a nutrient
    pub fn with_field_column(mut self, column: usize, field: MealField) -> Self {
        self.field_columns.push((column, field));
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Detect the timestamp and nutrient columns from a header row
    ///
    /// Columns that match neither are ignored.
    pub fn auto_detect_columns(&mut self, headers: &csv::StringRecord) {
        self.field_columns.clear();

        for (idx, header) in headers.iter().enumerate() {
            let header_lower = header.to_lowercase();

            if header_lower.contains("date")
                || header_lower.contains("time")
                || header_lower.contains("timestamp")
            {
                self.timestamp_column = idx;
                continue;
            }

            if let Some(field) = MealField::from_header(&header_lower) {
                self.field_columns.push((idx, field));
            }
        }
    }

    fn parse_timestamp(&self, ts_str: &str) -> Result<NaiveDateTime, SourceError> {
        if let Ok(dt) = NaiveDateTime::parse_from_str(ts_str, &self.timestamp_format) {
            return Ok(dt);
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
            "%m/%d/%Y %H:%M",
        ];
        for fmt in formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(ts_str, fmt) {
                return Ok(dt);
            }
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(ts_str) {
            return Ok(dt.naive_local());
        }

        // Date only: treat as a midday meal
        for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
            if let Some(dt) = NaiveDate::parse_from_str(ts_str, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(12, 0, 0))
            {
                return Ok(dt);
            }
        }

        Err(SourceError::Parse(format!(
            "Could not parse timestamp: {}",
            ts_str
        )))
    }

    /// Import meals from a CSV file
    pub fn import(&self, path: &Path) -> Result<MealImportResult, SourceError> {
        let file = std::fs::File::open(path)?;
        let result = self.import_reader(file);
        tracing::info!(
            path = %path.display(),
            meals = result.meals.len(),
            failed = result.rows_failed,
            "Imported meal CSV"
        );
        Ok(result)
    }

    /// Import from a CSV string
    pub fn import_str(&self, csv_data: &str) -> MealImportResult {
        self.import_reader(csv_data.as_bytes())
    }

    fn import_reader<R: Read>(&self, source: R) -> MealImportResult {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .flexible(true)
            .from_reader(source);

        let mut meals = Vec::new();
        let mut rows_failed = 0;
        let mut errors = Vec::new();

        for (line_num, result) in reader.records().enumerate() {
            let actual_line = if self.has_header {
                line_num + 2
            } else {
                line_num + 1
            };

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(format!("Line {}: {}", actual_line, e));
                    rows_failed += 1;
                    continue;
                }
            };

            let ts_str = match record.get(self.timestamp_column) {
                Some(s) => s.trim(),
                None => {
                    errors.push(format!("Line {}: missing timestamp column", actual_line));
                    rows_failed += 1;
                    continue;
                }
            };

            let timestamp = match self.parse_timestamp(ts_str) {
                Ok(ts) => ts,
                Err(e) => {
                    errors.push(format!("Line {}: {}", actual_line, e));
                    rows_failed += 1;
                    continue;
                }
            };

            let mut meal = MealRecord::at(timestamp);
            let mut row_has_data = false;
            for (col_idx, field) in &self.field_columns {
                let Some(value_str) = record.get(*col_idx).map(str::trim) else {
                    continue;
                };
                if value_str.is_empty() {
                    continue;
                }
                // Non-numeric cells are skipped
                if let Ok(value) = value_str.parse::<f64>() {
                    field.apply(&mut meal, value);
                    row_has_data = true;
                }
            }

            if row_has_data {
                meals.push(meal);
            }
        }

        if errors.len() > 100 {
            let total = errors.len();
            errors.truncate(100);
            errors.push(format!("... and {} more errors", total - 100));
        }

        MealImportResult {
            rows_processed: meals.len(),
            meals,
            rows_failed,
            errors,
        }
    }
}

/// Import a meal CSV, detecting columns from its header
pub fn import_meals_csv(path: &Path) -> Result<MealImportResult, SourceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut importer = MealCsvImporter::new();
    importer.auto_detect_columns(&headers);

    importer.import(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_columns() {
        let csv_data = "time,kcal,protein
2024-01-15 08:30,450,25
2024-01-15 19:45,800,40
2024-01-16 12:00,600,30";

        let importer = MealCsvImporter::new()
            .with_timestamp_column(0)
            .with_field_column(1, MealField::Calories)
            .with_field_column(2, MealField::ProteinG);

        let result = importer.import_str(csv_data);
        assert_eq!(result.rows_processed, 3);
        assert_eq!(result.rows_failed, 0);
        assert_eq!(result.meals[1].calories, 800.0);
        assert_eq!(result.meals[1].protein_g, 40.0);
        assert_eq!(result.meals[1].timestamp.format("%H:%M").to_string(), "19:45");
    }

    #[test]
    fn test_bad_rows_reported() {
        let csv_data = "date,calories
not-a-date,500
2024-01-16,
2024-01-17,700";

        let importer = MealCsvImporter::new().with_field_column(1, MealField::Calories);
        let result = importer.import_str(csv_data);

        assert_eq!(result.rows_failed, 1);
        assert_eq!(result.rows_processed, 1);
        assert!(result.errors[0].starts_with("Line 2"));
        assert_eq!(result.meals[0].timestamp.format("%H").to_string(), "12");
    }

    #[test]
    fn test_header_detection() {
        assert_eq!(MealField::from_header("Total Fat"), Some(MealField::FatG));
        assert_eq!(MealField::from_header("Carbohydrates (g)"), Some(MealField::CarbsG));
        assert_eq!(MealField::from_header("Fibre"), Some(MealField::FiberG));
        assert_eq!(MealField::from_header("meal"), None);
    }

    #[test]
    fn test_import_meals_csv_auto_detects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "meal,timestamp,Calories,Sugar (g),Sodium (mg)").unwrap();
        writeln!(file, "breakfast,2024-02-01T08:00:00,420,12,300").unwrap();
        writeln!(file, "dinner,2024-02-01T20:15:00,900,30,1200").unwrap();

        let result = import_meals_csv(file.path()).unwrap();
        assert_eq!(result.meals.len(), 2);
        assert_eq!(result.meals[1].sugar_g, 30.0);
        assert_eq!(result.meals[1].sodium_mg, 1200.0);
    }
}
