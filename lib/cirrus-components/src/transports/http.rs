use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::Serialize;
use snafu::ResultExt as _;
use tracing::debug;

use super::{Credentials, Encode, Http, MetricsTransport, Rejected, TransportError};
use crate::records::Record;

#[derive(Serialize)]
struct PutMetricDataRequest<'a> {
    #[serde(rename = "Namespace")]
    namespace: &'a str,

    #[serde(rename = "MetricData")]
    metric_data: &'a [Record],
}

/// A transport that sends records to an HTTP endpoint.
///
/// Each batch is sent as a single `POST` with a JSON body of the form `{"Namespace": ..., "MetricData": [...]}`. Any
/// response status outside of 2xx is treated as a rejection.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    credentials: Option<Credentials>,
    closed: AtomicBool,
}

impl HttpTransport {
    /// Creates a new `HttpTransport` sending to `endpoint`.
    ///
    /// Requests are authenticated with `credentials`, if any, and abandoned after `request_timeout`.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be built, an error is returned.
    pub fn connect(
        endpoint: Url, credentials: Option<Credentials>, request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(request_timeout).build().context(Http)?;

        debug!(%endpoint, authenticated = credentials.is_some(), "Created HTTP transport.");

        Ok(Self {
            client,
            endpoint,
            credentials,
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the endpoint records are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl MetricsTransport for HttpTransport {
    async fn put_metric_data(&self, namespace: &str, records: Vec<Record>) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let body = serde_json::to_vec(&PutMetricDataRequest {
            namespace,
            metric_data: &records,
        })
        .context(Encode)?;

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(credentials.access_key_id(), Some(credentials.secret_access_key()));
        }

        let response = request.send().await.context(Http)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Rejected {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        debug!(records = records.len(), %status, "Sent records.");
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
