use serde::{Deserialize, Serialize};

/// Circular obstacle around the vehicle, bearing measured clockwise from forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub bearing_deg: f32,
    pub range_cm: f32,
    pub radius_cm: f32,
}

impl Obstacle {
    pub fn new(bearing_deg: f32, range_cm: f32, radius_cm: f32) -> Self {
        Self {
            bearing_deg,
            range_cm,
            radius_cm,
        }
    }

    /// Distance along the ray at `bearing_deg` to the obstacle surface.
    fn intersect(&self, bearing_deg: f32) -> Option<f32> {
        let (ray_y, ray_x) = bearing_deg.to_radians().sin_cos();
        let (center_y, center_x) = self.bearing_deg.to_radians().sin_cos();
        let (cx, cy) = (center_x * self.range_cm, center_y * self.range_cm);

        let along = cx * ray_x + cy * ray_y;
        let perpendicular_sq = cx * cx + cy * cy - along * along;
        let radius_sq = self.radius_cm * self.radius_cm;
        if along <= 0.0 || perpendicular_sq > radius_sq {
            return None;
        }
        let near = along - (radius_sq - perpendicular_sq).sqrt();
        (near > 0.0).then_some(near)
    }
}

/// Synthetic surroundings and sensor behaviour for the simulated LiDAR.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub obstacles: Vec<Obstacle>,
    pub sensor_range_cm: f32,
    pub noise_cm: f32,
    pub seed: u64,
    pub scan_rate_hz: f32,
    pub angular_step_deg: f32,
    pub points_per_packet: usize,
    /// Stop delivering after this many revolutions.
    pub dropout_after_scans: Option<u64>,
    /// Refuse the subscription, as an unplugged sensor would.
    pub unavailable: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            obstacles: vec![
                Obstacle::new(0.0, 300.0, 30.0),
                Obstacle::new(-60.0, 150.0, 20.0),
                Obstacle::new(75.0, 800.0, 100.0),
            ],
            sensor_range_cm: 1200.0,
            noise_cm: 2.0,
            seed: 0,
            scan_rate_hz: 10.0,
            angular_step_deg: 0.8,
            points_per_packet: 12,
            dropout_after_scans: None,
            unavailable: false,
        }
    }
}

impl SceneConfig {
    /// Noise-free range to the closest obstacle, if within sensor range.
    pub fn range_at(&self, bearing_deg: f32) -> Option<f32> {
        self.obstacles
            .iter()
            .filter_map(|obstacle| obstacle.intersect(bearing_deg))
            .filter(|&range| range <= self.sensor_range_cm)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn normalized_step(&self) -> f32 {
        if self.angular_step_deg.is_finite() && self.angular_step_deg > 0.0 {
            self.angular_step_deg
        } else {
            1.0
        }
    }

    pub fn normalized_packet_len(&self) -> usize {
        self.points_per_packet.max(1)
    }

    pub fn normalized_scan_rate(&self) -> f32 {
        if self.scan_rate_hz.is_finite() && self.scan_rate_hz > 0.0 {
            self.scan_rate_hz
        } else {
            10.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_near_surface_of_obstacle_ahead() {
        let scene = SceneConfig {
            obstacles: vec![Obstacle::new(0.0, 300.0, 30.0)],
            ..Default::default()
        };
        let range = scene.range_at(0.0).unwrap();
        assert!((range - 270.0).abs() < 0.01);
        assert!(scene.range_at(90.0).is_none());
        assert!(scene.range_at(180.0).is_none());
    }

    #[test]
    fn closest_obstacle_shadows_farther_ones() {
        let scene = SceneConfig {
            obstacles: vec![
                Obstacle::new(10.0, 900.0, 200.0),
                Obstacle::new(10.0, 200.0, 20.0),
            ],
            ..Default::default()
        };
        let range = scene.range_at(10.0).unwrap();
        assert!((range - 180.0).abs() < 0.01);
    }

    #[test]
    fn obstacles_beyond_sensor_range_are_invisible() {
        let scene = SceneConfig {
            obstacles: vec![Obstacle::new(0.0, 2000.0, 50.0)],
            ..Default::default()
        };
        assert!(scene.range_at(0.0).is_none());
    }
}
