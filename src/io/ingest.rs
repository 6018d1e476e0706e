//! CSV ingest of per-frame word features.
//!
//! Expected layout is "long": one row per frame.
//!
//! ```text
//! word,instance,f0,f1
//! JOHN,0,0.12,-1.3
//! JOHN,0,0.10,-1.1
//! JOHN,1,0.40,-0.9
//! ```
//!
//! Rows of one `(word, instance)` pair are frames in file order. Instances of a
//! word are ordered by first appearance, which is the order fold splitting
//! later indexes into.
//!
//! Bad rows are skipped and reported; missing schema columns are fatal
//! (exit code 2) and so is an empty result (exit code 3).

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::domain::{FeatureSequence, WordSequenceCatalog};
use crate::error::AppError;

const WORD_COLUMN: &str = "word";
const INSTANCE_COLUMN: &str = "instance";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub word: Option<String>,
    pub message: String,
}

/// Ingest output: the sequence catalog plus bookkeeping for the report.
#[derive(Debug, Clone)]
pub struct IngestedWords {
    pub words: WordSequenceCatalog,
    /// Normalized names of the feature columns, in matrix column order.
    pub feature_names: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a long-format feature CSV from disk.
pub fn load_word_sequences(path: &Path, features: Option<&[String]>) -> Result<IngestedWords, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_word_sequences(file, features)
}

/// Parse a long-format feature CSV from any reader.
pub fn read_word_sequences<R: Read>(input: R, features: Option<&[String]>) -> Result<IngestedWords, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    let word_idx = require_column(&header_map, WORD_COLUMN)?;
    let instance_idx = require_column(&header_map, INSTANCE_COLUMN)?;
    let (feature_names, feature_idx) = resolve_feature_columns(&headers, &header_map, features)?;

    // (word, instance id) -> position in that word's instance list.
    let mut instance_slots: HashMap<(String, String), usize> = HashMap::new();
    let mut words = WordSequenceCatalog::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_used = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    word: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let word = match get_required(&record, word_idx, WORD_COLUMN) {
            Ok(w) => w.to_string(),
            Err(message) => {
                row_errors.push(RowError { line, word: None, message });
                continue;
            }
        };
        let instance = match get_required(&record, instance_idx, INSTANCE_COLUMN) {
            Ok(i) => i.to_string(),
            Err(message) => {
                row_errors.push(RowError {
                    line,
                    word: Some(word),
                    message,
                });
                continue;
            }
        };
        let frame = match parse_frame(&record, &feature_idx, &feature_names) {
            Ok(f) => f,
            Err(message) => {
                row_errors.push(RowError {
                    line,
                    word: Some(word),
                    message,
                });
                continue;
            }
        };

        let instances = words.entry(word.clone()).or_default();
        let slot = *instance_slots.entry((word, instance)).or_insert_with(|| {
            instances.push(FeatureSequence::new());
            instances.len() - 1
        });
        instances[slot].push(frame);
        rows_used += 1;
    }

    if rows_used == 0 {
        return Err(AppError::new(3, "No valid feature rows found in the CSV."));
    }

    debug!(
        rows_read,
        rows_used,
        words = words.len(),
        row_errors = row_errors.len(),
        "ingested feature CSV"
    );

    Ok(IngestedWords {
        words,
        feature_names,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

/// Feature columns in matrix order: the explicit list, or every non-key column.
fn resolve_feature_columns(
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
    features: Option<&[String]>,
) -> Result<(Vec<String>, Vec<usize>), AppError> {
    let (names, indices): (Vec<String>, Vec<usize>) = match features {
        Some(requested) => {
            let mut names = Vec::with_capacity(requested.len());
            let mut indices = Vec::with_capacity(requested.len());
            for raw in requested {
                let name = normalize_header_name(raw);
                if name == WORD_COLUMN || name == INSTANCE_COLUMN {
                    return Err(AppError::new(2, format!("`{name}` cannot be used as a feature column.")));
                }
                let idx = header_map
                    .get(&name)
                    .copied()
                    .ok_or_else(|| AppError::new(2, format!("Missing requested feature column: `{name}`")))?;
                names.push(name);
                indices.push(idx);
            }
            (names, indices)
        }
        None => headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (normalize_header_name(name), idx))
            .filter(|(name, _)| name != WORD_COLUMN && name != INSTANCE_COLUMN)
            .unzip(),
    };

    if names.is_empty() {
        return Err(AppError::new(2, "No feature columns found in the CSV."));
    }
    Ok((names, indices))
}

fn parse_frame(record: &StringRecord, feature_idx: &[usize], feature_names: &[String]) -> Result<Vec<f64>, String> {
    feature_idx
        .iter()
        .zip(feature_names)
        .map(|(&idx, name)| {
            let raw = get_required(record, idx, name)?;
            let v = raw
                .parse::<f64>()
                .map_err(|_| format!("Invalid number '{raw}' in `{name}`."))?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(format!("Non-finite value in `{name}`."))
            }
        })
        .collect()
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest(csv: &str, features: Option<&[String]>) -> Result<IngestedWords, AppError> {
        read_word_sequences(csv.as_bytes(), features)
    }

    #[test]
    fn groups_frames_by_word_and_instance() {
        let csv = "\u{feff}Word,Instance,F0,F1\n\
                   JOHN,a,1,2\n\
                   JOHN,a,3,4\n\
                   MARY,x,5,6\n\
                   JOHN,b,7,8\n\
                   JOHN,a,9,10\n";
        let data = ingest(csv, None).unwrap();

        assert_eq!(data.feature_names, vec!["f0", "f1"]);
        assert_eq!(data.rows_used, 5);
        let john = &data.words["JOHN"];
        assert_eq!(john.len(), 2);
        assert_eq!(john[0], vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![9.0, 10.0]]);
        assert_eq!(john[1], vec![vec![7.0, 8.0]]);
        assert_eq!(data.words["MARY"][0], vec![vec![5.0, 6.0]]);
    }

    #[test]
    fn instances_keep_first_appearance_order() {
        let csv = "word,instance,f\nJOHN,9,1\nJOHN,1,2\nJOHN,5,3\n";
        let data = ingest(csv, None).unwrap();
        let firsts: Vec<f64> = data.words["JOHN"].iter().map(|s| s[0][0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn explicit_features_select_and_order_columns() {
        let csv = "word,instance,a,b,c\nJOHN,0,1,2,3\n";
        let features = vec!["C".to_string(), "a".to_string()];
        let data = ingest(csv, Some(&features)).unwrap();
        assert_eq!(data.feature_names, vec!["c", "a"]);
        assert_eq!(data.words["JOHN"][0][0], vec![3.0, 1.0]);
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let csv = "word,instance,f0,f1\n\
                   JOHN,0,1,2\n\
                   JOHN,0,abc,2\n\
                   JOHN,0,1\n\
                   ,0,1,2\n\
                   JOHN,0,3,4\n";
        let data = ingest(csv, None).unwrap();

        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(data.row_errors[0].message.contains("abc"));
        assert_eq!(data.row_errors[2].word, None);
    }

    #[test]
    fn missing_schema_columns_are_usage_errors() {
        let err = ingest("word,f0\nJOHN,1\n", None).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = ingest("word,instance\nJOHN,0\n", None).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let features = vec!["nope".to_string()];
        let err = ingest("word,instance,f0\nJOHN,0,1\n", Some(&features)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn no_usable_rows_is_insufficient_data() {
        let err = ingest("word,instance,f0\nJOHN,0,x\n", None).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
