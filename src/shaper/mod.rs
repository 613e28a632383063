//! Result shaping: bounded row samples and chart classification
//!
//! `sample` keeps tool results small enough to re-inject into an LLM
//! context; `classify` (through a [`ChartClassifier`]) picks how a tabular
//! result should be drawn.

pub mod classifier;
pub mod mock;

pub use classifier::{ChartClassifier, HttpChartClassifier};
pub use mock::MockChartClassifier;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rows kept from the start of a result when sampling
pub const DEFAULT_HEAD: usize = 3;
/// Rows kept from the end of a result when sampling
pub const DEFAULT_TAIL: usize = 3;

/// How a tabular result should be charted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Area,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Area => "area",
        };
        f.write_str(name)
    }
}

/// Chart kind + title, derived once per tabular result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_kind: ChartKind,
    pub title: String,
}

impl ChartSpec {
    /// Used when classification fails: a bar chart titled after the query
    pub fn fallback(query: &str) -> Self {
        Self {
            chart_kind: ChartKind::default(),
            title: query.trim().to_string(),
        }
    }
}

/// A bounded sample of rows plus the true size of the full set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampledRows<T> {
    pub rows: Vec<T>,
    #[serde(rename = "rowCount")]
    pub row_count: usize,
    pub truncated: bool,
}

/// Keep the first `head` and last `tail` rows, in original order.
///
/// Sets with at most `head + tail` rows are returned unchanged. `row_count`
/// always reports the size of the full set.
pub fn sample<T: Clone>(rows: &[T], head: usize, tail: usize) -> SampledRows<T> {
    let row_count = rows.len();
    let window = head.saturating_add(tail);
    if row_count <= window {
        return SampledRows {
            rows: rows.to_vec(),
            row_count,
            truncated: false,
        };
    }

    let mut kept = Vec::with_capacity(window);
    kept.extend_from_slice(&rows[..head]);
    kept.extend_from_slice(&rows[row_count - tail..]);
    SampledRows {
        rows: kept,
        row_count,
        truncated: true,
    }
}

/// `sample` with the default 3 + 3 window
pub fn sample_default<T: Clone>(rows: &[T]) -> SampledRows<T> {
    sample(rows, DEFAULT_HEAD, DEFAULT_TAIL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_identity_up_to_six_rows() {
        for n in 0..=6 {
            let rows: Vec<usize> = (0..n).collect();
            let sampled = sample(&rows, 3, 3);
            assert_eq!(sampled.rows, rows, "n = {}", n);
            assert_eq!(sampled.row_count, n);
            assert!(!sampled.truncated);
        }
    }

    #[test]
    fn test_sample_keeps_head_and_tail() {
        for n in [7usize, 8, 50, 500] {
            let rows: Vec<usize> = (0..n).collect();
            let sampled = sample(&rows, 3, 3);
            assert_eq!(sampled.rows, vec![0, 1, 2, n - 3, n - 2, n - 1]);
            assert_eq!(sampled.row_count, n);
            assert!(sampled.truncated);
        }
    }

    #[test]
    fn test_sample_asymmetric_window() {
        let rows: Vec<char> = "abcdefghij".chars().collect();
        let sampled = sample(&rows, 1, 2);
        assert_eq!(sampled.rows, vec!['a', 'i', 'j']);
        assert_eq!(sampled.row_count, 10);

        let sampled = sample(&rows, 0, 0);
        assert!(sampled.rows.is_empty());
        assert_eq!(sampled.row_count, 10);
    }

    #[test]
    fn test_sample_huge_window_is_identity() {
        let rows: Vec<usize> = (0..10).collect();
        for (head, tail) in [(usize::MAX, 1), (1, usize::MAX), (usize::MAX, usize::MAX)] {
            let sampled = sample(&rows, head, tail);
            assert_eq!(sampled.rows, rows);
            assert_eq!(sampled.row_count, 10);
            assert!(!sampled.truncated);
        }
    }

    #[test]
    fn test_sampled_rows_serializes_row_count_camel_case() {
        let value = serde_json::to_value(sample_default(&[1, 2, 3, 4, 5, 6, 7])).unwrap();
        assert_eq!(value["rowCount"], 7);
        assert_eq!(value["rows"], serde_json::json!([1, 2, 3, 5, 6, 7]));
    }

    #[test]
    fn test_chart_kind_serde() {
        assert_eq!(serde_json::to_value(ChartKind::Area).unwrap(), "area");
        let kind: ChartKind = serde_json::from_str("\"line\"").unwrap();
        assert_eq!(kind, ChartKind::Line);
        assert!(serde_json::from_str::<ChartKind>("\"pie\"").is_err());
        assert_eq!(ChartKind::default(), ChartKind::Bar);
    }

    #[test]
    fn test_fallback_spec() {
        let spec = ChartSpec::fallback("  stars per day ");
        assert_eq!(spec.chart_kind, ChartKind::Bar);
        assert_eq!(spec.title, "stars per day");
    }
}
