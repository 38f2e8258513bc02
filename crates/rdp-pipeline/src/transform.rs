//! Schema normalization
//!
//! Turns noisy catalog exports into artifacts that satisfy the warehouse
//! schema contract. Cleaning happens per file, in a fixed order:
//!
//! 1. Parse as CSV with a header row.
//! 2. Drop any row with a missing value (no partial-row repair).
//! 3. Strip the currency symbol and thousands separators from the two price
//!    columns, the percent sign from the discount column, thousands
//!    separators from the rating count, and everything but digits and the
//!    decimal point from the rating.
//! 4. Cast the five numeric columns and write the cleaned table to
//!    `transformed_<name>.csv` in the output directory.
//!
//! Empty or unreadable files are skipped with a warning. A missing contract
//! column or a value that still fails to parse after cleaning aborts the
//! batch: that file needs a human, and retrying it changes nothing.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Prefix for transformed artifact file names
pub const ARTIFACT_PREFIX: &str = "transformed_";

/// Columns every input file must carry. Other columns pass through
/// untouched.
const CONTRACT_COLUMNS: [&str; 6] = [
    "product_name",
    "discounted_price",
    "actual_price",
    "discount_percentage",
    "rating",
    "rating_count",
];

/// Derive the artifact file name for an input path
/// (`b.csv` becomes `transformed_b.csv`)
pub fn artifact_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    format!("{ARTIFACT_PREFIX}{stem}.csv")
}

/// Transformation stage
pub struct Transformer {
    output_dir: PathBuf,
}

impl Transformer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
        }
    }

    /// Transform each input file into a cleaned artifact
    ///
    /// Returns artifact paths in input order. Skipped files (empty or
    /// unreadable) are excluded from the result; contract violations abort
    /// the whole batch.
    pub fn transform(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut artifacts = Vec::new();
        for input in inputs {
            if let Some(artifact) = self.transform_file(input)? {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }

    fn transform_file(&self, input: &Path) -> Result<Option<PathBuf>> {
        let file = input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("<non-utf8>")
            .to_string();

        let mut reader = match csv::Reader::from_path(input) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(file = %file, error = %err, "Skipping unreadable input file");
                return Ok(None);
            },
        };

        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(err) => {
                warn!(file = %file, error = %err, "Skipping unreadable input file");
                return Ok(None);
            },
        };
        if headers.is_empty() {
            warn!(file = %file, "Skipping empty input file");
            return Ok(None);
        }

        let column_index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name, idx))
            .collect();
        for column in CONTRACT_COLUMNS {
            if !column_index.contains_key(column) {
                return Err(PipelineError::SchemaViolation {
                    file: file.clone(),
                    column: column.to_string(),
                });
            }
        }

        // Rows with a missing value anywhere are dropped entirely.
        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for record in reader.records() {
            let record = record?;
            if record.iter().any(|field| field.trim().is_empty()) {
                dropped += 1;
                continue;
            }
            rows.push(record);
        }

        if rows.is_empty() && dropped == 0 {
            warn!(file = %file, "Skipping empty input file");
            return Ok(None);
        }

        let mut seen = HashSet::new();
        let duplicates = rows
            .iter()
            .filter(|row| !seen.insert(row.iter().collect::<Vec<_>>().join("\u{1f}")))
            .count();
        if duplicates > 0 {
            info!(file = %file, duplicates, "Duplicate rows present in input, keeping them");
        }

        let price_columns = [
            column_index["discounted_price"],
            column_index["actual_price"],
        ];
        let percent_column = column_index["discount_percentage"];
        let count_column = column_index["rating_count"];
        let rating_column = column_index["rating"];

        let artifact_path = self.output_dir.join(artifact_file_name(input));
        let mut writer = csv::Writer::from_path(&artifact_path)?;
        writer.write_record(&headers)?;

        for row in &rows {
            let mut out: Vec<String> = row.iter().map(str::to_string).collect();
            for &idx in &price_columns {
                out[idx] = cast_numeric(strip_currency(&row[idx]), &file, &headers[idx], &row[idx])?;
            }
            out[percent_column] = cast_numeric(
                strip_percent(&row[percent_column]),
                &file,
                &headers[percent_column],
                &row[percent_column],
            )?;
            out[count_column] = cast_numeric(
                strip_separators(&row[count_column]),
                &file,
                &headers[count_column],
                &row[count_column],
            )?;
            out[rating_column] = cast_numeric(
                strip_rating_noise(&row[rating_column]),
                &file,
                &headers[rating_column],
                &row[rating_column],
            )?;
            writer.write_record(&out)?;
        }
        writer.flush()?;

        info!(
            file = %file,
            rows = rows.len(),
            rows_dropped = dropped,
            artifact = %artifact_path.display(),
            "Transformed input file"
        );
        Ok(Some(artifact_path))
    }
}

/// Strip the currency symbol and thousands separators (`₹1,234` to `1234`)
fn strip_currency(raw: &str) -> String {
    raw.trim().replace(['₹', ','], "")
}

/// Strip the percent sign (`64%` to `64`)
fn strip_percent(raw: &str) -> String {
    raw.trim().replace('%', "")
}

/// Strip thousands separators (`24,269` to `24269`)
fn strip_separators(raw: &str) -> String {
    raw.trim().replace(',', "")
}

/// Keep only digits and decimal points (`4.1 stars` to `4.1`)
fn strip_rating_noise(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

/// Parse a cleaned field as a number and render it canonically: integral
/// values without a decimal point, fractional values as-is.
fn cast_numeric(cleaned: String, file: &str, column: &str, original: &str) -> Result<String> {
    let value: f64 = cleaned
        .parse()
        .map_err(|_| PipelineError::CastFailure {
            file: file.to_string(),
            column: column.to_string(),
            value: original.to_string(),
        })?;

    if value.fract() == 0.0 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str =
        "product_name,category,discounted_price,actual_price,discount_percentage,rating,rating_count";

    fn transformer_for(dir: &TempDir) -> Transformer {
        let config = PipelineConfig {
            input_dir: dir.path().join("files"),
            output_dir: dir.path().join("transformed_files"),
            ledger_path: dir.path().join("processed_files.txt"),
            ..PipelineConfig::default()
        };
        Transformer::new(&config)
    }

    fn write_input(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_cleaning_helpers() {
        assert_eq!(strip_currency("₹1,234"), "1234");
        assert_eq!(strip_percent("64%"), "64");
        assert_eq!(strip_separators("24,269"), "24269");
        assert_eq!(strip_rating_noise("4.1 stars"), "4.1");
        assert_eq!(strip_rating_noise("4.2"), "4.2");
    }

    #[test]
    fn test_cast_numeric_rendering() {
        assert_eq!(cast_numeric("1234".into(), "f", "c", "₹1,234").unwrap(), "1234");
        assert_eq!(cast_numeric("45".into(), "f", "c", "45%").unwrap(), "45");
        assert_eq!(cast_numeric("4.1".into(), "f", "c", "4.1").unwrap(), "4.1");
        assert!(cast_numeric("".into(), "f", "c", "junk").is_err());
    }

    #[test]
    fn test_transform_cleans_and_drops_rows() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "b.csv",
            &format!(
                "{HEADER}\n\
                 USB Cable,Electronics,\"₹999\",\"₹1,599\",38%,4.1,\"24,269\"\n\
                 Wall Charger,Electronics,\"₹399\",\"₹799\",50%,4,\n\
                 HDMI Lead,Electronics,\"₹249\",\"₹499\",50%,3.9,512\n"
            ),
        );

        let transformer = transformer_for(&dir);
        let artifacts = transformer.transform(&[input]).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].ends_with("transformed_b.csv"));

        let output = std::fs::read_to_string(&artifacts[0]).unwrap();
        let lines: Vec<_> = output.lines().collect();
        // Header plus two surviving rows; the charger row had a missing
        // rating_count and is gone.
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "USB Cable,Electronics,999,1599,38,4.1,24269");
        assert_eq!(lines[2], "HDMI Lead,Electronics,249,499,50,3.9,512");
    }

    #[test]
    fn test_missing_column_is_schema_violation() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "bad.csv",
            "product_name,discounted_price,actual_price,discount_percentage,rating\n\
             Widget,₹10,₹20,50%,4.0\n",
        );

        let err = transformer_for(&dir).transform(&[input]).unwrap_err();
        match err {
            PipelineError::SchemaViolation { column, .. } => {
                assert_eq!(column, "rating_count");
            },
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_rating_is_cast_failure() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "bad.csv",
            &format!("{HEADER}\nWidget,Electronics,₹10,₹20,50%,unrated,100\n"),
        );

        let err = transformer_for(&dir).transform(&[input]).unwrap_err();
        assert!(matches!(err, PipelineError::CastFailure { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let empty = write_input(&dir, "empty.csv", "");
        let header_only = write_input(&dir, "header_only.csv", &format!("{HEADER}\n"));

        let artifacts = transformer_for(&dir)
            .transform(&[empty, header_only])
            .unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name(Path::new("/data/files/b.csv")),
            "transformed_b.csv"
        );
    }
}
