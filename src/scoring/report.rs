/*!
 * Per-backend truthfulness report.
 *
 * One CSV per backend: a `line` column, one score column per language pair,
 * and a final `Average Truthfulness` row. Columns may differ in length; missing
 * cells stay empty. A JSON sidecar records how each column was aligned.
 */

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::JobError;
use crate::file_utils::FileManager;
use crate::scoring::engine::ScoreSeries;

pub const AVERAGE_LABEL: &str = "Average Truthfulness";

/// Round for presentation; data cells are never rounded
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Collects the score series of one backend in insertion order
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    backend_id: String,
    similarity_id: String,
    precision: u32,
    series: Vec<ScoreSeries>,
}

impl ReportAggregator {
    pub fn new(backend_id: impl Into<String>, similarity_id: impl Into<String>, precision: u32) -> Self {
        Self {
            backend_id: backend_id.into(),
            similarity_id: similarity_id.into(),
            precision,
            series: Vec::new(),
        }
    }

    /// Add a column; a repeated pair replaces the earlier column in place
    pub fn add(&mut self, series: ScoreSeries) {
        match self.series.iter_mut().find(|s| s.pair == series.pair) {
            Some(existing) => *existing = series,
            None => self.series.push(series),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn build(self) -> Report {
        Report {
            backend_id: self.backend_id,
            similarity_id: self.similarity_id,
            precision: self.precision,
            columns: self.series,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    backend_id: String,
    similarity_id: String,
    precision: u32,
    columns: Vec<ScoreSeries>,
}

/// Alignment details of one report column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub pair: String,
    pub original_len: usize,
    pub translated_len: usize,
    pub scored: usize,
    pub dropped: usize,
    pub average: Option<f64>,
}

/// Contents of the `.meta.json` sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub run_id: String,
    pub generated_at: String,
    pub backend: String,
    pub similarity: String,
    pub precision: u32,
    pub columns: Vec<ColumnMetadata>,
}

/// Where a report was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub metadata: PathBuf,
}

impl Report {
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.pair.id()).collect()
    }

    /// Number of data rows, the longest column
    pub fn rows(&self) -> usize {
        self.columns.iter().map(|c| c.scores.len()).max().unwrap_or(0)
    }

    /// Score at 0-based `row` of column `column`, if present
    pub fn cell(&self, row: usize, column: usize) -> Option<f64> {
        self.columns.get(column).and_then(|c| c.scores.get(row)).copied()
    }

    /// Column averages over present values, rounded to the report precision
    pub fn averages(&self) -> Vec<Option<f64>> {
        self.columns
            .iter()
            .map(|c| c.mean().map(|mean| round_to(mean, self.precision)))
            .collect()
    }

    pub fn file_stem(backend_id: &str) -> String {
        format!("{}_truthfulness", backend_id)
    }

    pub fn paths_in(dir: &Path, backend_id: &str) -> ReportPaths {
        let stem = Self::file_stem(backend_id);
        ReportPaths {
            csv: dir.join(format!("{}.csv", stem)),
            metadata: dir.join(format!("{}.meta.json", stem)),
        }
    }

    pub fn metadata(&self) -> ReportMetadata {
        ReportMetadata {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            backend: self.backend_id.clone(),
            similarity: self.similarity_id.clone(),
            precision: self.precision,
            columns: self
                .columns
                .iter()
                .zip(self.averages())
                .map(|(c, average)| ColumnMetadata {
                    pair: c.pair.id(),
                    original_len: c.original_len,
                    translated_len: c.translated_len,
                    scored: c.scores.len(),
                    dropped: c.dropped,
                    average,
                })
                .collect(),
        }
    }

    fn write_csv(&self, path: &Path) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["line".to_string()];
        header.extend(self.headers());
        writer.write_record(&header)?;

        for row in 0..self.rows() {
            let mut record = vec![(row + 1).to_string()];
            record.extend(
                (0..self.columns.len()).map(|col| self.cell(row, col).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }

        let mut average_row = vec![AVERAGE_LABEL.to_string()];
        average_row.extend(self.averages().into_iter().map(|a| a.map(|v| v.to_string()).unwrap_or_default()));
        writer.write_record(&average_row)?;

        writer.flush()?;
        Ok(())
    }

    /// Write the CSV and its metadata sidecar into `dir`, replacing earlier ones
    pub fn write(&self, dir: &Path) -> Result<ReportPaths, JobError> {
        FileManager::ensure_dir(dir).map_err(|e| JobError::persistence(dir, e))?;
        let paths = Self::paths_in(dir, &self.backend_id);

        self.write_csv(&paths.csv)
            .map_err(|e| JobError::Report(format!("{}: {}", paths.csv.display(), e)))?;

        let metadata = serde_json::to_string_pretty(&self.metadata())
            .map_err(|e| JobError::Report(format!("{}: {}", paths.metadata.display(), e)))?;
        fs::write(&paths.metadata, metadata).map_err(|e| JobError::persistence(&paths.metadata, e))?;

        info!(
            "Wrote {} report with {} columns to {}",
            self.backend_id,
            self.columns.len(),
            paths.csv.display()
        );
        Ok(paths)
    }
}
