use async_trait::async_trait;
use tracing::debug;

use super::{MetricsTransport, TransportError};
use crate::records::Record;

/// Default maximum number of records sent in a single request.
pub const DEFAULT_MAX_RECORDS_PER_REQUEST: usize = 1000;

/// Default maximum number of dimensions on a single record.
pub const DEFAULT_MAX_DIMENSIONS_PER_RECORD: usize = 30;

const MAX_NAME_LEN: usize = 255;
const MAX_DIMENSION_VALUE_LEN: usize = 1024;

fn truncate_chars(value: &mut String, max_chars: usize) -> bool {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => {
            value.truncate(index);
            true
        }
        None => false,
    }
}

/// A transport that enforces backend request limits in front of another transport.
///
/// Batches larger than the request limit are split and sent in order, one request at a time; the first failed request
/// fails the whole batch, and the remaining requests are not sent. Records are also trimmed to fit: excess dimensions
/// are dropped, and overlong names and dimension values are truncated.
pub struct BatchingTransport<T> {
    inner: T,
    max_records_per_request: usize,
    max_dimensions_per_record: usize,
}

impl<T> BatchingTransport<T> {
    /// Creates a new `BatchingTransport` with the default limits.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_records_per_request: DEFAULT_MAX_RECORDS_PER_REQUEST,
            max_dimensions_per_record: DEFAULT_MAX_DIMENSIONS_PER_RECORD,
        }
    }

    /// Sets the maximum number of records sent in a single request.
    ///
    /// Zero is treated as one.
    pub fn with_max_records_per_request(mut self, max: usize) -> Self {
        self.max_records_per_request = max.max(1);
        self
    }

    /// Sets the maximum number of dimensions on a single record.
    pub fn with_max_dimensions_per_record(mut self, max: usize) -> Self {
        self.max_dimensions_per_record = max;
        self
    }

    /// Returns a reference to the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn enforce_limits(&self, record: &mut Record) {
        if truncate_chars(record.name_mut(), MAX_NAME_LEN) {
            debug!(record = record.name(), "Truncated record name.");
        }

        let dimensions = record.dimensions_mut();
        if dimensions.len() > self.max_dimensions_per_record {
            let dropped = dimensions.len() - self.max_dimensions_per_record;
            dimensions.truncate(self.max_dimensions_per_record);
            debug!(record = record.name(), dropped, "Dropped dimensions over the per-record limit.");
        }

        for dimension in record.dimensions_mut() {
            truncate_chars(dimension.key_mut(), MAX_NAME_LEN);
            truncate_chars(dimension.value_mut(), MAX_DIMENSION_VALUE_LEN);
        }
    }
}

#[async_trait]
impl<T: MetricsTransport> MetricsTransport for BatchingTransport<T> {
    async fn put_metric_data(&self, namespace: &str, mut records: Vec<Record>) -> Result<(), TransportError> {
        for record in &mut records {
            self.enforce_limits(record);
        }

        let requests = records.len().div_ceil(self.max_records_per_request);
        if requests > 1 {
            debug!(records = records.len(), requests, "Splitting batch into multiple requests.");
        }

        while !records.is_empty() {
            let rest = records.split_off(records.len().min(self.max_records_per_request));
            self.inner.put_metric_data(namespace, records).await?;
            records = rest;
        }

        Ok(())
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
