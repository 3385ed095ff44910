//! Obstacle-distance telemetry core for a LiDAR-equipped companion computer.
//!
//! Range samples from a spinning 2D LiDAR are binned into a fixed angular
//! distance profile and published to the autopilot as `OBSTACLE_DISTANCE`
//! messages on a fixed-rate timer that runs independently of the mission flow.

pub mod config;
pub mod interface;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod scheduler;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PipelineConfig;
pub use pipeline::{SourceStatus, TelemetryPipeline};
pub use prelude::{
    ConfigError, LinkError, PipelineError, PublishError, SchedulerError, SourceError,
};
