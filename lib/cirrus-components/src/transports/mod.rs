//! Transports.
//!
//! A transport delivers a batch of [`Record`]s to a backend under a namespace. Transports are shared between concurrent
//! flushes, so every transport must be safe to call from multiple tasks at once.
use async_trait::async_trait;
use snafu::Snafu;

use crate::records::Record;

mod batching;
pub use self::batching::{BatchingTransport, DEFAULT_MAX_DIMENSIONS_PER_RECORD, DEFAULT_MAX_RECORDS_PER_REQUEST};

mod credentials;
pub use self::credentials::{CredentialSource, Credentials, CredentialsConfiguration, CredentialsError};

mod http;
pub use self::http::HttpTransport;

mod writer;
pub use self::writer::WriterTransport;

/// Transport error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum TransportError {
    /// The request could not be sent, or the response could not be read.
    #[snafu(display("Failed to send request to the backend."))]
    Http {
        /// Error source.
        source: reqwest::Error,
    },

    /// The backend rejected the request.
    #[snafu(display("Backend rejected request with status {}: {}", status, body))]
    Rejected {
        /// HTTP status code.
        status: u16,

        /// Response body, as far as it could be read.
        body: String,
    },

    /// Writing records to the output failed.
    #[snafu(display("Failed to write records to output."))]
    Io {
        /// Error source.
        source: std::io::Error,
    },

    /// Records could not be encoded.
    #[snafu(display("Failed to encode records."))]
    Encode {
        /// Error source.
        source: serde_json::Error,
    },

    /// The transport has been closed.
    #[snafu(display("Transport has been closed."))]
    Closed,
}

/// A metrics transport.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    /// Sends a batch of records under the given namespace.
    ///
    /// # Errors
    ///
    /// If the batch could not be delivered, an error is returned. No part of the batch is retried.
    async fn put_metric_data(&self, namespace: &str, records: Vec<Record>) -> Result<(), TransportError>;

    /// Releases any resources held by the transport.
    ///
    /// Closing is idempotent. Sending after the transport has been closed fails with [`TransportError::Closed`].
    async fn close(&self);
}

#[async_trait]
impl<T: MetricsTransport + ?Sized> MetricsTransport for std::sync::Arc<T> {
    async fn put_metric_data(&self, namespace: &str, records: Vec<Record>) -> Result<(), TransportError> {
        (**self).put_metric_data(namespace, records).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
