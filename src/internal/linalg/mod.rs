//! Dense linear algebra kernels over `DMatrix<f64>`.
//!
//! The Kalman gain is computed by solving against a Cholesky factor of the
//! innovation covariance; `invert` is the general fallback when that matrix
//! turns out not to be positive definite.

mod cholesky;
mod inverse;

pub use cholesky::{cholesky_factor, cholesky_solve, CholeskyFactor};
pub use inverse::invert;
