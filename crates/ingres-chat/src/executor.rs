//! Bounded filter execution against the document store.

use std::sync::Arc;

use tracing::{debug, error, warn};

use ingres_core::filter::QueryFilter;
use ingres_core::record::ResultRecord;
use ingres_storage::DocumentStore;

use crate::error::ChatError;

/// Default and maximum number of records returned per question.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Runs filters against a store and normalizes results for the model.
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    limit: usize,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_limit(store, DEFAULT_RESULT_LIMIT)
    }

    /// Use a smaller cap than the default. Larger values are clamped to
    /// [`DEFAULT_RESULT_LIMIT`].
    pub fn with_limit(store: Arc<dyn DocumentStore>, limit: usize) -> Self {
        let clamped = limit.min(DEFAULT_RESULT_LIMIT);
        if clamped != limit {
            warn!(requested = limit, limit = clamped, "Result limit clamped");
        }
        Self { store, limit: clamped }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fetch at most `limit` matching records, each with `_id` as a string.
    ///
    /// Every store-side fault is reported as [`ChatError::ExecutionFailed`].
    pub fn execute(&self, filter: &QueryFilter) -> Result<Vec<ResultRecord>, ChatError> {
        let documents = self.store.find(filter, self.limit).map_err(|e| {
            error!(error = %e, filter = %filter, "Query execution failed");
            ChatError::ExecutionFailed(e.to_string())
        })?;

        let records: Vec<ResultRecord> = documents.into_iter().map(|d| d.into_record()).collect();
        debug!(count = records.len(), limit = self.limit, "Query returned records");
        Ok(records)
    }
}
