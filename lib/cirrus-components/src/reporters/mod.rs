//! Reporter implementations.

mod cloudwatch;
pub use self::cloudwatch::{translate, CloudWatchReporter, CloudWatchReporterConfiguration, ReporterError};
