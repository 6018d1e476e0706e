//! Export per-word selection results.
//!
//! - JSON: the full summaries (scores, skipped candidates) plus run metadata
//! - CSV: one flat row per word and strategy, for spreadsheets

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{SelectorConfig, SelectorKind, WordSelection};
use crate::error::AppError;

/// Schema of the JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub selectors: Vec<SelectorKind>,
    pub config: SelectorConfig,
    pub results: Vec<WordSelection>,
}

impl SelectionReport {
    pub fn new(selectors: Vec<SelectorKind>, config: SelectorConfig, results: Vec<WordSelection>) -> Self {
        Self {
            tool: "hmmsel".to_string(),
            generated_at: Utc::now(),
            selectors,
            config,
            results,
        }
    }
}

/// Write the JSON export.
pub fn write_results_json(path: &Path, report: &SelectionReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON: {e}")))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    word: &'a str,
    selector: SelectorKind,
    n_instances: usize,
    n_rows: usize,
    n_states: Option<usize>,
    fallback: bool,
    best_score: Option<f64>,
    log_likelihood: Option<f64>,
    n_scored: usize,
    n_skipped: usize,
    error: Option<&'a str>,
}

impl<'a> From<&'a WordSelection> for CsvRow<'a> {
    fn from(r: &'a WordSelection) -> Self {
        let best_score = r
            .n_states
            .and_then(|n| r.scores.iter().find(|s| s.n_states == n))
            .map(|s| s.score);
        Self {
            word: &r.word,
            selector: r.selector,
            n_instances: r.n_instances,
            n_rows: r.n_rows,
            n_states: r.n_states,
            fallback: r.fallback,
            best_score,
            log_likelihood: r.log_likelihood,
            n_scored: r.scores.len(),
            n_skipped: r.skipped.len(),
            error: r.error.as_deref(),
        }
    }
}

/// Write one CSV row per result to a file.
pub fn write_results_csv(path: &Path, results: &[WordSelection]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_results_csv_to(file, results)
}

/// Write one CSV row per result to any writer.
pub fn write_results_csv_to<W: Write>(out: W, results: &[WordSelection]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    for r in results {
        writer
            .serialize(CsvRow::from(r))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScoreRecord, SkippedCandidate};

    fn results() -> Vec<WordSelection> {
        vec![
            WordSelection {
                word: "JOHN".to_string(),
                selector: SelectorKind::Bic,
                n_instances: 5,
                n_rows: 50,
                n_states: Some(3),
                fallback: false,
                scores: vec![
                    ScoreRecord { n_states: 2, score: 283.0 },
                    ScoreRecord { n_states: 3, score: 278.25 },
                ],
                skipped: vec![SkippedCandidate {
                    n_states: 4,
                    reason: "training failed".to_string(),
                }],
                log_likelihood: Some(-100.0),
                occupancy: vec![20, 18, 12],
                error: None,
            },
            WordSelection {
                word: "MARY, JR".to_string(),
                selector: SelectorKind::Bic,
                n_instances: 1,
                n_rows: 3,
                n_states: None,
                fallback: true,
                scores: Vec::new(),
                skipped: Vec::new(),
                log_likelihood: None,
                occupancy: Vec::new(),
                error: Some("no model could be trained".to_string()),
            },
        ]
    }

    #[test]
    fn csv_has_one_row_per_result() {
        let mut buf = Vec::new();
        write_results_csv_to(&mut buf, &results()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "word,selector,n_instances,n_rows,n_states,fallback,best_score,log_likelihood,n_scored,n_skipped,error"
        );
        assert_eq!(lines[1], "JOHN,bic,5,50,3,false,278.25,-100.0,2,1,");
        assert!(lines[2].starts_with("\"MARY, JR\",bic,1,3,,true,,,0,0,"));
    }

    #[test]
    fn json_export_reads_back() {
        let path = std::env::temp_dir().join(format!("hmmsel-export-{}.json", std::process::id()));
        let report = SelectionReport::new(vec![SelectorKind::Bic], SelectorConfig::default(), results());

        write_results_json(&path, &report).unwrap();
        let back: SelectionReport = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back, report);
        assert_eq!(back.tool, "hmmsel");
        assert_eq!(back.results[0].occupancy, vec![20, 18, 12]);
    }
}
