use crate::interface::message::{MAV_FRAME_BODY_FRD, MAV_DISTANCE_SENSOR_LASER};
use crate::prelude::{ConfigError, MAX_WIRE_BINS, NO_OBSTACLE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sensor geometry, clamping policy and publish cadence for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bin_count: usize,
    /// Field of view centred on vehicle forward.
    pub fov_deg: f32,
    pub min_distance_cm: u16,
    pub max_distance_cm: u16,
    pub publish_rate_hz: f64,
    pub sensor_type: u8,
    pub frame: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bin_count: 72,
            fov_deg: 180.0,
            min_distance_cm: 20,
            max_distance_cm: 1200,
            publish_rate_hz: 15.0,
            sensor_type: MAV_DISTANCE_SENSOR_LASER,
            frame: MAV_FRAME_BODY_FRD,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(ConfigError::ZeroBins);
        }
        if self.bin_count > MAX_WIRE_BINS {
            return Err(ConfigError::TooManyBins(self.bin_count));
        }
        if self.min_distance_cm >= self.max_distance_cm {
            return Err(ConfigError::DistanceRange {
                min: self.min_distance_cm,
                max: self.max_distance_cm,
            });
        }
        if self.max_distance_cm == NO_OBSTACLE {
            return Err(ConfigError::SentinelCollision(self.max_distance_cm));
        }
        if !self.fov_deg.is_finite() || self.fov_deg <= 0.0 || self.fov_deg > 360.0 {
            return Err(ConfigError::FieldOfView(self.fov_deg));
        }
        let period_ok = Duration::try_from_secs_f64(1.0 / self.publish_rate_hz).is_ok();
        if !self.publish_rate_hz.is_finite() || self.publish_rate_hz <= 0.0 || !period_ok {
            return Err(ConfigError::PublishRate(self.publish_rate_hz));
        }
        Ok(())
    }

    /// Angular width of one bin in degrees.
    pub fn bin_width_deg(&self) -> f32 {
        self.fov_deg / self.bin_count.max(1) as f32
    }

    /// Angle of the left edge of bin 0, relative to forward.
    pub fn start_angle_deg(&self) -> f32 {
        -self.fov_deg / 2.0
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.publish_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_sensor() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.bin_width_deg(), 2.5);
        assert_eq!(cfg.start_angle_deg(), -90.0);
        assert_eq!(cfg.publish_period(), Duration::from_secs_f64(1.0 / 15.0));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero = PipelineConfig {
            bin_count: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroBins));

        let wide = PipelineConfig {
            bin_count: 73,
            ..Default::default()
        };
        assert_eq!(wide.validate(), Err(ConfigError::TooManyBins(73)));

        let inverted = PipelineConfig {
            min_distance_cm: 1200,
            max_distance_cm: 1200,
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::DistanceRange { min: 1200, max: 1200 })
        ));

        let stalled = PipelineConfig {
            publish_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(matches!(stalled.validate(), Err(ConfigError::PublishRate(_))));

        let blind = PipelineConfig {
            fov_deg: 400.0,
            ..Default::default()
        };
        assert!(matches!(blind.validate(), Err(ConfigError::FieldOfView(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"bin_count": 36}"#).unwrap();
        assert_eq!(cfg.bin_count, 36);
        assert_eq!(cfg.max_distance_cm, 1200);
        assert_eq!(cfg.bin_width_deg(), 5.0);
    }
}
