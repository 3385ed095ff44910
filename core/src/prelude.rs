use std::time::Duration;

/// Distance reported for a sector with no obstacle or no data.
pub const NO_OBSTACLE: u16 = u16::MAX;

/// Number of distance slots carried by one `OBSTACLE_DISTANCE` message.
pub const MAX_WIRE_BINS: usize = 72;

/// Rejected pipeline configuration. Raised before any thread starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("bin_count must be greater than zero")]
    ZeroBins,
    #[error("bin_count {0} exceeds the {} distance slots of the wire message", MAX_WIRE_BINS)]
    TooManyBins(usize),
    #[error("min_distance_cm ({min}) must be below max_distance_cm ({max})")]
    DistanceRange { min: u16, max: u16 },
    #[error("max_distance_cm ({0}) collides with the no-obstacle sentinel")]
    SentinelCollision(u16),
    #[error("fov_deg must lie in (0, 360], got {0}")]
    FieldOfView(f32),
    #[error("publish_rate_hz must be positive and finite, got {0}")]
    PublishRate(f64),
}

/// Failure of the range sample source.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("range source unavailable: {0}")]
    Unavailable(String),
    #[error("range source stopped delivering scans")]
    Dropped,
}

/// Failure reported by the vehicle link.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("link i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("vehicle link is down")]
    Disconnected,
    #[error("vehicle rejected command: {0}")]
    Rejected(String),
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
}

/// A single obstacle-distance transmission failed. Never fatal to the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("obstacle distance transmission failed: {0}")]
    Transmit(#[from] LinkError),
}

/// Lifecycle misuse or failure of the fixed-rate scheduler.
#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,
    #[error("scheduler is not running")]
    NotRunning,
    #[error("scheduler period must be non-zero")]
    ZeroPeriod,
    #[error("failed to build timer runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("a tick panicked; timer thread terminated")]
    TickPanicked,
}

/// Errors surfaced by [`crate::TelemetryPipeline`].
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
