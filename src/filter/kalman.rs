//! Constant-velocity Kalman filter over bounding-box geometry.
//!
//! State is `[cx, cy, aspect, h, vcx, vcy, vaspect, vh]`; only the first four
//! components are observed. One step is one frame.

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use crate::internal::linalg::{cholesky_factor, cholesky_solve, invert};
use crate::{Error, Result};

/// State dimension (position/size plus velocities)
pub const STATE_DIM: usize = 8;
/// Measurement dimension (`[cx, cy, aspect, h]`)
pub const MEASUREMENT_DIM: usize = 4;

const INITIAL_POSITION_VARIANCE: f64 = 200.0;
const INITIAL_VELOCITY_VARIANCE: f64 = 10_000.0;
const PROCESS_NOISE_VARIANCE: f64 = 1.0;
const MEASUREMENT_NOISE_VARIANCE: f64 = 1.0;

/// Mean and covariance of the box state.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianState {
    /// 8-dimensional state mean
    pub mean: DVector<f64>,
    /// 8x8 state covariance
    pub covariance: DMatrix<f64>,
}

impl GaussianState {
    /// Observed part of the mean: `[cx, cy, aspect, h]`.
    pub fn xyah(&self) -> [f64; 4] {
        [self.mean[0], self.mean[1], self.mean[2], self.mean[3]]
    }
}

/// Kalman filter with fixed transition, measurement and noise matrices.
///
/// The filter itself is stateless; every track owns its `GaussianState` and
/// passes it through `predict` / `update`.
#[derive(Clone, Debug)]
pub struct KalmanBoxFilter {
    /// State transition matrix
    f: DMatrix<f64>,
    /// Measurement matrix
    h: DMatrix<f64>,
    /// Process noise covariance
    q: DMatrix<f64>,
    /// Measurement noise covariance
    r: DMatrix<f64>,
}

impl KalmanBoxFilter {
    pub fn new() -> Self {
        // F = [I, I; 0, I] for dt = 1
        let mut f = DMatrix::<f64>::identity(STATE_DIM, STATE_DIM);
        for i in 0..MEASUREMENT_DIM {
            f[(i, MEASUREMENT_DIM + i)] = 1.0;
        }

        // H = [I, 0]: velocities are never observed
        let mut h = DMatrix::<f64>::zeros(MEASUREMENT_DIM, STATE_DIM);
        for i in 0..MEASUREMENT_DIM {
            h[(i, i)] = 1.0;
        }

        Self {
            f,
            h,
            q: DMatrix::identity(STATE_DIM, STATE_DIM) * PROCESS_NOISE_VARIANCE,
            r: DMatrix::identity(MEASUREMENT_DIM, MEASUREMENT_DIM) * MEASUREMENT_NOISE_VARIANCE,
        }
    }

    /// Create a state from an unassociated measurement `[cx, cy, aspect, h]`.
    ///
    /// Velocities start at zero with a large variance.
    pub fn initiate(&self, measurement: &[f64]) -> Result<GaussianState> {
        check_measurement(measurement)?;

        let mut mean = DVector::<f64>::zeros(STATE_DIM);
        mean.rows_mut(0, MEASUREMENT_DIM).copy_from_slice(measurement);

        let mut covariance = DMatrix::<f64>::zeros(STATE_DIM, STATE_DIM);
        for i in 0..MEASUREMENT_DIM {
            covariance[(i, i)] = INITIAL_POSITION_VARIANCE;
            covariance[(MEASUREMENT_DIM + i, MEASUREMENT_DIM + i)] = INITIAL_VELOCITY_VARIANCE;
        }

        Ok(GaussianState { mean, covariance })
    }

    /// Project the state one frame ahead.
    pub fn predict(&self, state: &GaussianState) -> GaussianState {
        // x = F @ x
        let mean = &self.f * &state.mean;
        // P = F @ P @ F.T + Q
        let covariance = &self.f * &state.covariance * self.f.transpose() + &self.q;
        GaussianState { mean, covariance }
    }

    /// Correct the state with a measurement `[cx, cy, aspect, h]`.
    pub fn update(&self, state: &GaussianState, measurement: &[f64]) -> Result<GaussianState> {
        check_measurement(measurement)?;
        let z = DVector::from_column_slice(measurement);

        // y = z - H @ x (innovation)
        let innovation = z - &self.h * &state.mean;

        // S = H @ P @ H.T + R (innovation covariance)
        let s = &self.h * &state.covariance * self.h.transpose() + &self.r;

        // K = P @ H.T @ S^-1 (Kalman gain)
        let s_inv = innovation_inverse(&s)?;
        let gain = &state.covariance * self.h.transpose() * s_inv;

        // x = x + K @ y
        let mean = &state.mean + &gain * innovation;

        // P = (I - K @ H) @ P
        let identity = DMatrix::<f64>::identity(STATE_DIM, STATE_DIM);
        let covariance = (identity - &gain * &self.h) * &state.covariance;

        Ok(GaussianState { mean, covariance })
    }
}

impl Default for KalmanBoxFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn check_measurement(measurement: &[f64]) -> Result<()> {
    if measurement.len() != MEASUREMENT_DIM {
        return Err(Error::shape(
            format!("measurement of length {}", MEASUREMENT_DIM),
            format!("length {}", measurement.len()),
        ));
    }
    Ok(())
}

/// `S^-1` through the Cholesky factor of `S`, falling back to Gauss-Jordan
/// when `S` is not positive definite.
fn innovation_inverse(s: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let identity = DMatrix::<f64>::identity(s.nrows(), s.ncols());
    match cholesky_factor(s, true) {
        Ok(chol) => cholesky_solve(&chol, &identity),
        Err(Error::NotPositiveDefinite { index, pivot }) => {
            warn!(
                index,
                pivot, "innovation covariance is not positive definite, inverting directly"
            );
            invert(s)
        }
        Err(e) => Err(e),
    }
}
