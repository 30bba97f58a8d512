//! Output formatters.
use std::io::{self, Write};

use serde::Serialize;

use crate::records::Record;

/// Renders records into a byte stream.
pub trait OutputFormatter: Send + Sync {
    /// Returns the media type of the rendered output.
    fn media_type(&self) -> &'static str;

    /// Writes `records`, sent under `namespace`, to `writer`.
    ///
    /// # Errors
    ///
    /// If writing fails, an error is returned.
    fn format(&self, namespace: &str, records: &[Record], writer: &mut dyn Write) -> io::Result<()>;
}

/// Formats records as JSON Lines: one JSON object per record, each tagged with its namespace.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLinesFormatter;

#[derive(Serialize)]
struct Line<'a> {
    #[serde(rename = "Namespace")]
    namespace: &'a str,

    #[serde(flatten)]
    record: &'a Record,
}

impl OutputFormatter for JsonLinesFormatter {
    fn media_type(&self) -> &'static str {
        "application/x-ndjson"
    }

    fn format(&self, namespace: &str, records: &[Record], writer: &mut dyn Write) -> io::Result<()> {
        for record in records {
            serde_json::to_writer(&mut *writer, &Line { namespace, record })?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}
