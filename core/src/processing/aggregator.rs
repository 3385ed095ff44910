use crate::config::PipelineConfig;
use crate::interface::range_source::RangeSample;
use crate::processing::profile::SharedProfile;

/// Bins sparse polar samples into the shared [`SharedProfile`].
///
/// Samples outside the field of view are dropped, distances are clamped into
/// `[min_distance_cm, max_distance_cm]`, the last sample of a bin wins, and
/// bins without a new sample keep their previous value.
#[derive(Debug, Clone)]
pub struct ProfileAggregator {
    profile: SharedProfile,
    bin_count: usize,
    start_angle_deg: f64,
    bin_width_deg: f64,
    min_distance_cm: u16,
    max_distance_cm: u16,
}

impl ProfileAggregator {
    pub fn new(config: &PipelineConfig, profile: SharedProfile) -> Self {
        Self {
            profile,
            bin_count: config.bin_count,
            start_angle_deg: config.start_angle_deg() as f64,
            bin_width_deg: config.bin_width_deg() as f64,
            min_distance_cm: config.min_distance_cm,
            max_distance_cm: config.max_distance_cm,
        }
    }

    pub fn bin_index(&self, angle_deg: f32) -> Option<usize> {
        let offset = (angle_deg as f64 - self.start_angle_deg) / self.bin_width_deg;
        if !offset.is_finite() || offset < 0.0 {
            return None;
        }
        let index = offset.floor() as usize;
        (index < self.bin_count).then_some(index)
    }

    pub fn clamp(&self, distance_cm: u16) -> u16 {
        distance_cm.clamp(self.min_distance_cm, self.max_distance_cm)
    }

    /// Writes `samples` into the profile and returns how many landed in a bin.
    pub fn update(&self, samples: &[RangeSample]) -> usize {
        let updates: Vec<(usize, u16)> = samples
            .iter()
            .filter_map(|sample| {
                self.bin_index(sample.angle_deg)
                    .map(|index| (index, self.clamp(sample.distance_cm)))
            })
            .collect();
        if !updates.is_empty() {
            self.profile.write_bins(&updates);
        }
        updates.len()
    }
}
