//! Formatted terminal output.
//!
//! Formatting lives here so the selection code never builds strings for
//! display and output changes stay localized.

use std::collections::BTreeMap;

use crate::domain::{SelectorConfig, SelectorKind, WordSelection};
use crate::io::ingest::RowError;

/// Row errors shown before the list is cut short.
const MAX_ROW_ERRORS: usize = 10;

/// Header block: data source, strategy and candidate range.
pub fn format_run_header(source: &str, selectors: &[SelectorKind], config: &SelectorConfig, n_words: usize) -> String {
    let names: Vec<&str> = selectors.iter().map(|k| k.display_name()).collect();
    let mut out = String::new();
    out.push_str("=== hmmsel - HMM state-count selection ===\n");
    out.push_str(&format!("Data: {source} | words={n_words}\n"));
    out.push_str(&format!("Selector: {}\n", names.join(", ")));
    out.push_str(&format!(
        "Candidates: n=[{}, {}] | constant={} | seed={}\n",
        config.min_n, config.max_n, config.n_constant, config.seed
    ));
    out
}

/// Summarize skipped CSV rows, listing the first few.
pub fn format_row_errors(errors: &[RowError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut out = format!("Skipped {} CSV row(s):\n", errors.len());
    for e in errors.iter().take(MAX_ROW_ERRORS) {
        match &e.word {
            Some(word) => out.push_str(&format!("  line {} ({word}): {}\n", e.line, e.message)),
            None => out.push_str(&format!("  line {}: {}\n", e.line, e.message)),
        }
    }
    if errors.len() > MAX_ROW_ERRORS {
        out.push_str(&format!("  ... and {} more\n", errors.len() - MAX_ROW_ERRORS));
    }
    out
}

/// Per-word table for a single strategy.
///
/// `truth` holds generating state counts when the data is synthetic.
pub fn format_selection_table(results: &[WordSelection], truth: Option<&BTreeMap<String, usize>>) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<16} {:>5} {:>7} {:>6} {:>5} {:>12} {:>12}  {}",
            "word", "inst", "rows", "n", "true", "score", "logL", "note"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<16} {:->5} {:->7} {:->6} {:->5} {:->12} {:->12}  {:-<4}",
            "", "", "", "", "", "", "", ""
        ),
    );

    for r in results {
        let best_score = r
            .n_states
            .and_then(|n| r.scores.iter().find(|s| s.n_states == n))
            .map(|s| format!("{:.3}", s.score))
            .unwrap_or_else(|| "-".to_string());
        push_line(
            &mut out,
            format!(
                "{:<16} {:>5} {:>7} {:>6} {:>5} {:>12} {:>12}  {}",
                truncate(&r.word, 16),
                r.n_instances,
                r.n_rows,
                fmt_states(r),
                truth
                    .and_then(|t| t.get(&r.word))
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                best_score,
                r.log_likelihood.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string()),
                note(r),
            ),
        );
    }
    out
}

/// Word x strategy grid of chosen state counts.
///
/// `*` marks a constant fallback, `!` a failed selection.
pub fn format_compare_table(results: &[WordSelection]) -> String {
    let mut grid: BTreeMap<&str, BTreeMap<SelectorKind, String>> = BTreeMap::new();
    for r in results {
        grid.entry(r.word.as_str())
            .or_default()
            .insert(r.selector, fmt_states(r));
    }

    let mut out = String::new();
    let mut header = format!("{:<16}", "word");
    let mut rule = format!("{:-<16}", "");
    for kind in SelectorKind::ALL {
        header.push_str(&format!(" {:>9}", kind.display_name()));
        rule.push_str(&format!(" {:->9}", ""));
    }
    push_line(&mut out, header);
    push_line(&mut out, rule);

    for (word, cells) in &grid {
        let mut line = format!("{:<16}", truncate(word, 16));
        for kind in SelectorKind::ALL {
            let cell = cells.get(&kind).map(String::as_str).unwrap_or("");
            line.push_str(&format!(" {cell:>9}"));
        }
        push_line(&mut out, line);
    }

    if results.iter().any(|r| r.fallback || r.error.is_some()) {
        out.push_str("(* constant fallback, ! selection failed)\n");
    }
    out
}

/// Details for words that fell back or failed.
pub fn format_diagnostics(results: &[WordSelection]) -> String {
    let mut out = String::new();
    for r in results.iter().filter(|r| r.fallback || r.error.is_some()) {
        out.push_str(&format!("{} [{}]:\n", r.word, r.selector.display_name()));
        if let Some(err) = &r.error {
            out.push_str(&format!("  error: {err}\n"));
        }
        for s in &r.skipped {
            out.push_str(&format!("  (skipped n={}) {}\n", s.n_states, s.reason));
        }
    }
    out
}

/// Frames per state on each chosen model's Viterbi path over its own word.
pub fn format_state_occupancy(results: &[WordSelection]) -> String {
    let decoded: Vec<&WordSelection> = results.iter().filter(|r| !r.occupancy.is_empty()).collect();
    if decoded.is_empty() {
        return String::new();
    }

    let mut out = String::from("State occupancy (frames per state):\n");
    for r in decoded {
        let counts: Vec<String> = r.occupancy.iter().map(usize::to_string).collect();
        let unused = r.occupancy.iter().filter(|&&c| c == 0).count();
        let mut line = format!(
            "  {:<16} [{}] {}",
            truncate(&r.word, 16),
            r.selector.display_name(),
            counts.join(" ")
        );
        if unused > 0 {
            line.push_str(&format!("  ({unused} unused)"));
        }
        push_line(&mut out, line);
    }
    out
}

fn fmt_states(r: &WordSelection) -> String {
    match (r.n_states, r.fallback) {
        (Some(n), true) => format!("{n}*"),
        (Some(n), false) => n.to_string(),
        (None, _) => "!".to_string(),
    }
}

fn note(r: &WordSelection) -> String {
    if let Some(err) = &r.error {
        return format!("failed: {err}");
    }
    let mut parts = Vec::new();
    if r.fallback {
        parts.push("fallback".to_string());
    }
    if !r.skipped.is_empty() {
        parts.push(format!("{} skipped", r.skipped.len()));
    }
    parts.join(", ")
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
