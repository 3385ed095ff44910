pub mod lidar;
pub mod scene;
