//! Join-barrier collection of per-page results.

use crate::types::ResultRecord;
use crate::{PagelaneError, Result};

/// Order of the final collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionOrder {
    /// Records appear in the order their jobs finished.
    #[default]
    Completion,
    /// Records are sorted by page number.
    ByPage,
}

/// Collects exactly one record per job.
///
/// Owned by the orchestrating flow and fed from task return values, so no
/// locking is involved.
#[derive(Debug)]
pub struct ResultAggregator {
    expected: usize,
    records: Vec<ResultRecord>,
}

impl ResultAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            records: Vec::with_capacity(expected),
        }
    }

    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    /// Record an error marker for the job at `index`.
    pub fn push_failure(&mut self, index: usize, error: &PagelaneError) {
        tracing::warn!("Page {} failed: {}", index + 1, error);
        self.records.push(ResultRecord::failed(index + 1, error));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Close the barrier and hand out the collection.
    ///
    /// # Errors
    ///
    /// Returns `PagelaneError::Other` if the number of collected records does
    /// not match the number of jobs.
    pub fn finish(mut self, order: CollectionOrder) -> Result<Vec<ResultRecord>> {
        if self.records.len() != self.expected {
            return Err(PagelaneError::Other(format!(
                "Result collection incomplete: expected {} records, collected {}",
                self.expected,
                self.records.len()
            )));
        }

        if order == CollectionOrder::ByPage {
            self.records.sort_by_key(|record| record.page);
        }

        Ok(self.records)
    }
}
