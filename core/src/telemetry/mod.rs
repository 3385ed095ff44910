pub mod log;
pub mod metrics;
pub mod publisher;

pub use self::log::LogManager;
pub use metrics::{MetricsRecorder, PipelineStats};
pub use publisher::TelemetryPublisher;
