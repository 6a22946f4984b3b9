pub mod cache;
pub mod gps;
pub mod normalize;
pub mod sensor_path;
pub mod series;
pub mod status;
pub mod vendor;
