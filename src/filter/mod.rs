//! Motion model for tracked boxes.
//!
//! - `KalmanBoxFilter` - 8-state constant-velocity Kalman filter over
//!   `[cx, cy, aspect, h]` and their velocities
//! - `GaussianState` - mean and covariance produced by each filter step

mod kalman;

pub use kalman::{GaussianState, KalmanBoxFilter, MEASUREMENT_DIM, STATE_DIM};
