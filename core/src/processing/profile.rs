use crate::prelude::NO_OBSTACLE;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Fixed-length array of per-sector obstacle distances in centimetres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceProfile {
    bins: Vec<u16>,
}

impl DistanceProfile {
    /// Every bin starts out as [`NO_OBSTACLE`].
    pub fn new(bin_count: usize) -> Self {
        Self {
            bins: vec![NO_OBSTACLE; bin_count],
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[u16] {
        &self.bins
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        self.bins.get(index).copied()
    }

    pub(crate) fn set(&mut self, index: usize, distance_cm: u16) {
        if let Some(bin) = self.bins.get_mut(index) {
            *bin = distance_cm;
        }
    }

    /// Number of bins currently holding a measurement.
    pub fn occupied(&self) -> usize {
        self.bins.iter().filter(|&&d| d != NO_OBSTACLE).count()
    }

    /// Closest measured obstacle as `(bin, distance_cm)`.
    pub fn nearest(&self) -> Option<(usize, u16)> {
        self.bins
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, d)| d != NO_OBSTACLE)
            .min_by_key(|&(_, d)| d)
    }
}

/// The profile shared between the aggregator and the publisher.
///
/// One mutex guards the whole bin array; readers always copy it out so a
/// snapshot is never torn and no guard outlives the copy.
#[derive(Debug, Clone)]
pub struct SharedProfile {
    inner: Arc<Mutex<DistanceProfile>>,
}

impl SharedProfile {
    pub fn new(bin_count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DistanceProfile::new(bin_count))),
        }
    }

    pub fn snapshot(&self) -> DistanceProfile {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn write_bins(&self, updates: &[(usize, u16)]) {
        let mut profile = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for &(index, distance_cm) in updates {
            profile.set(index, distance_cm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profile_is_all_sentinel() {
        let profile = DistanceProfile::new(72);
        assert_eq!(profile.len(), 72);
        assert_eq!(profile.occupied(), 0);
        assert_eq!(profile.nearest(), None);
    }

    #[test]
    fn nearest_ignores_sentinel_bins() {
        let mut profile = DistanceProfile::new(4);
        profile.set(1, 900);
        profile.set(3, 120);
        profile.set(9, 5);
        assert_eq!(profile.nearest(), Some((3, 120)));
        assert_eq!(profile.occupied(), 2);
        assert_eq!(profile.len(), 4);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let shared = SharedProfile::new(3);
        shared.write_bins(&[(0, 50)]);
        let before = shared.snapshot();
        shared.write_bins(&[(0, 60), (2, 70)]);
        assert_eq!(before.bins(), &[50, NO_OBSTACLE, NO_OBSTACLE]);
        assert_eq!(shared.snapshot().bins(), &[60, NO_OBSTACLE, 70]);
    }
}
