use std::time::Duration;

use cirrus_config::GenericConfiguration;
use cirrus_error::GenericError;
use serde::Deserialize;

use crate::{
    filters::FilterConfiguration,
    transports::{CredentialsConfiguration, DEFAULT_MAX_DIMENSIONS_PER_RECORD, DEFAULT_MAX_RECORDS_PER_REQUEST},
};

const DEFAULT_NAMESPACE: &str = "AppMetrics";
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL.as_secs()
}

fn default_max_records_per_request() -> usize {
    DEFAULT_MAX_RECORDS_PER_REQUEST
}

fn default_max_dimensions_per_record() -> usize {
    DEFAULT_MAX_DIMENSIONS_PER_RECORD
}

/// CloudWatch reporter configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct CloudWatchReporterConfiguration {
    /// Namespace records are sent under.
    ///
    /// Defaults to `AppMetrics`.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// How often to flush, in seconds.
    ///
    /// Zero is treated as unset. Defaults to 10 seconds.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// How long a single send may take, in seconds.
    ///
    /// Zero or unset means sends are not timed out by the reporter.
    #[serde(default)]
    pub send_timeout_secs: Option<u64>,

    /// Filter applied to every context before translation.
    #[serde(default)]
    pub filter: Option<FilterConfiguration>,

    /// Credentials used by the HTTP transport.
    #[serde(default)]
    pub credentials: CredentialsConfiguration,

    /// Endpoint to send records to.
    ///
    /// When unset, records are written to standard output instead.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Maximum number of records sent in a single request.
    ///
    /// Defaults to 1000.
    #[serde(default = "default_max_records_per_request")]
    pub max_records_per_request: usize,

    /// Maximum number of dimensions on a single record.
    ///
    /// Defaults to 30.
    #[serde(default = "default_max_dimensions_per_record")]
    pub max_dimensions_per_record: usize,
}

impl CloudWatchReporterConfiguration {
    /// Creates a new `CloudWatchReporterConfiguration` from the given configuration.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        Ok(config.as_typed()?)
    }

    /// Returns the flush interval, falling back to the default when unset.
    pub fn flush_interval(&self) -> Duration {
        match self.flush_interval_secs {
            0 => DEFAULT_FLUSH_INTERVAL,
            secs => Duration::from_secs(secs),
        }
    }

    /// Returns the send timeout, if any.
    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

impl Default for CloudWatchReporterConfiguration {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            flush_interval_secs: default_flush_interval_secs(),
            send_timeout_secs: None,
            filter: None,
            credentials: CredentialsConfiguration::default(),
            endpoint: None,
            max_records_per_request: default_max_records_per_request(),
            max_dimensions_per_record: default_max_dimensions_per_record(),
        }
    }
}
