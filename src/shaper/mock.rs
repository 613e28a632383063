//! Mock chart classifier for tests

use super::classifier::ChartClassifier;
use super::ChartSpec;
use crate::error::ClassificationError;
use crate::gateway::Row;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns a fixed spec (or always fails) and records how many rows it saw.
pub struct MockChartClassifier {
    spec: Option<ChartSpec>,
    calls: AtomicUsize,
    seen_rows: Mutex<Vec<usize>>,
}

impl MockChartClassifier {
    pub fn returning(spec: ChartSpec) -> Self {
        Self {
            spec: Some(spec),
            calls: AtomicUsize::new(0),
            seen_rows: Mutex::new(Vec::new()),
        }
    }

    /// A classifier whose every call fails
    pub fn failing() -> Self {
        Self {
            spec: None,
            calls: AtomicUsize::new(0),
            seen_rows: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Row count of every classify call, in order
    pub fn seen_row_counts(&self) -> Vec<usize> {
        self.seen_rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChartClassifier for MockChartClassifier {
    async fn classify(&self, rows: &[Row]) -> Result<ChartSpec, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_rows.lock().unwrap().push(rows.len());
        self.spec
            .clone()
            .ok_or_else(|| ClassificationError::Decode("mock classifier failure".to_string()))
    }
}
