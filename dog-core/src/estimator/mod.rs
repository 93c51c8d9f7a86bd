// estimator/mod.rs
pub mod smoothing;
pub mod tilt;

pub use smoothing::*;
pub use tilt::*;
