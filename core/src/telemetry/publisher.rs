use crate::config::PipelineConfig;
use crate::interface::message::ObstacleDistanceMessage;
use crate::interface::vehicle::VehicleLink;
use crate::prelude::PublishError;
use crate::processing::DistanceProfile;
use crate::telemetry::log::LogManager;
use std::time::{SystemTime, UNIX_EPOCH};

const FAILURE_LOG_EVERY: u64 = 50;

/// Turns profile snapshots into `OBSTACLE_DISTANCE` messages on the link.
pub struct TelemetryPublisher<L> {
    link: L,
    config: PipelineConfig,
    logger: LogManager,
    failure_streak: u64,
}

impl<L: VehicleLink> TelemetryPublisher<L> {
    pub fn new(link: L, config: PipelineConfig) -> Self {
        Self {
            link,
            config,
            logger: LogManager::new("obstaclecore::publisher"),
            failure_streak: 0,
        }
    }

    pub fn build_message(&self, profile: &DistanceProfile) -> ObstacleDistanceMessage {
        ObstacleDistanceMessage::from_profile(profile, &self.config, now_usec())
    }

    /// Sends one message. Failures are logged and returned, never retried here.
    pub fn publish(&mut self, profile: &DistanceProfile) -> Result<(), PublishError> {
        let message = self.build_message(profile);
        match self.link.send(&message) {
            Ok(()) => {
                if self.failure_streak > 0 {
                    self.logger.record(&format!(
                        "vehicle link recovered after {} failed publishes",
                        self.failure_streak
                    ));
                    self.failure_streak = 0;
                }
                Ok(())
            }
            Err(err) => {
                self.failure_streak += 1;
                self.logger.warn_throttled(
                    self.failure_streak,
                    FAILURE_LOG_EVERY,
                    &format!("obstacle distance publish failed: {}", err),
                );
                Err(PublishError::from(err))
            }
        }
    }

    pub fn failure_streak(&self) -> u64 {
        self.failure_streak
    }
}

fn now_usec() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}
