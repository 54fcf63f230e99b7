//! SciPy functions port.
//!
//! Ported from scipy.optimize.linear_sum_assignment (rectangular LSAP solver).
//!
//! License: BSD 3-Clause (SciPy Developers)

mod optimize;

pub use optimize::*;
