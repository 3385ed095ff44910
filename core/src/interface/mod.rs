pub mod mavlink;
pub mod message;
pub mod range_source;
pub mod vehicle;

pub use mavlink::MavlinkFramer;
pub use message::ObstacleDistanceMessage;
pub use range_source::{LiveScan, RangeSample, RangeSource, ScanPacketMeta, Subscription};
pub use vehicle::{
    wait_until, GlobalPosition, VehicleCommand, VehicleLink, VehicleMode, VehicleState,
};
