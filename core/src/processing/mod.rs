pub mod aggregator;
pub mod profile;

pub use aggregator::ProfileAggregator;
pub use profile::{DistanceProfile, SharedProfile};
