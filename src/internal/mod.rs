//! Internal numeric kernels.
//!
//! - linalg: Cholesky factor/solve and Gauss-Jordan inversion
//! - scipy: linear sum assignment (port of scipy.optimize.linear_sum_assignment)

pub mod linalg;
pub mod scipy;
