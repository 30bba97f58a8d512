use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use snafu::ResultExt as _;

use super::{Io, MetricsTransport, TransportError};
use crate::{formatters::OutputFormatter, records::Record};

/// A transport that writes records to an output stream, such as standard output.
pub struct WriterTransport<W> {
    writer: Mutex<Option<W>>,
    formatter: Arc<dyn OutputFormatter>,
}

impl<W: Write + Send> WriterTransport<W> {
    /// Creates a new `WriterTransport` writing to `writer` in the format produced by `formatter`.
    pub fn new(writer: W, formatter: Arc<dyn OutputFormatter>) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            formatter,
        }
    }

    /// Consumes the transport, returning the underlying writer unless the transport was closed.
    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<W: Write + Send> MetricsTransport for WriterTransport<W> {
    async fn put_metric_data(&self, namespace: &str, records: Vec<Record>) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match writer.as_mut() {
            Some(writer) => self.formatter.format(namespace, &records, writer).context(Io),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut writer) = writer.take() {
            // Nothing is left to report a failed final flush to.
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::formatters::JsonLinesFormatter;

    #[tokio::test]
    async fn writes_formatted_records() {
        let transport = WriterTransport::new(Vec::new(), Arc::new(JsonLinesFormatter));
        let records = vec![Record::scalar("web", Utc::now(), 42.0)];
        transport.put_metric_data("AppMetrics", records).await.unwrap();

        let output = String::from_utf8(transport.into_inner().unwrap()).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("\"MetricName\":\"web\""));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = WriterTransport::new(Vec::new(), Arc::new(JsonLinesFormatter));
        transport.close().await;
        transport.close().await;

        let result = transport.put_metric_data("AppMetrics", Vec::new()).await;
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(transport.into_inner().is_none());
    }
}
