//! # bytetrack-rs - Multi-Object Tracking Core
//!
//! ByteTrack-style tracking of bounding boxes across detection frames.
//!
//! Given per-frame boxes from an external object detector, the tracker decides
//! which boxes belong to previously seen objects, filters spurious detections
//! and predicts motion through gaps, assigning every physical object a stable
//! integer id.
//!
//! ## Components
//!
//! - Cholesky factorization and solve for symmetric positive-definite systems
//! - Jonker-Volgenant shortest-augmenting-path assignment (rectangular, min/max)
//! - IoU cost construction, score fusion and non-max suppression
//! - 8-state constant-velocity Kalman filter over box geometry
//! - Track lifecycle (Tentative / Confirmed / Deleted) and the three-stage
//!   association cascade
//!
//! ## Example
//!
//! ```rust
//! use bytetrack_rs::{ByteTracker, Detections, TrackerConfig};
//! use nalgebra::DMatrix;
//!
//! let mut tracker = ByteTracker::new(TrackerConfig::default())?;
//!
//! let xyxy = DMatrix::from_row_slice(1, 4, &[10.0, 10.0, 50.0, 80.0]);
//! let detections = Detections::new(xyxy)?.with_confidence(vec![0.9])?;
//!
//! let tracked = tracker.update(&detections)?;
//! for det in tracked.iter() {
//!     println!("{:?} -> {:?}", det.xyxy, det.tracker_id);
//! }
//! # Ok::<(), bytetrack_rs::Error>(())
//! ```

// Internal modules (numeric kernels: linear solver, assignment)
pub(crate) mod internal;

// Public modules
pub mod detection;
pub mod filter;
pub mod matching;
pub mod track;
pub mod tracker;
pub mod utils;

// Re-exports for convenience
pub use detection::{Detection, Detections};
pub use filter::{GaussianState, KalmanBoxFilter};
pub use internal::linalg::{cholesky_factor, cholesky_solve, invert, CholeskyFactor};
pub use internal::scipy::{linear_sum_assignment, Assignment, AssignmentResult};
pub use track::{IdAllocator, Track, TrackState};
pub use tracker::{ByteTracker, TrackerConfig};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while tracking.
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum Error {
        #[error("Invalid shape: expected {expected}, got {got}")]
        InvalidShape { expected: String, got: String },

        #[error("Matrix is not positive definite: pivot {pivot} at leading minor {index}")]
        NotPositiveDefinite { index: usize, pivot: f64 },

        #[error("Matrix is singular")]
        Singular,

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Assignment is infeasible: no finite augmenting path")]
        Infeasible,

        #[error("Index {index} out of range for batch of length {len}")]
        OutOfRange { index: usize, len: usize },

        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),
    }

    impl Error {
        pub(crate) fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
            Error::InvalidShape {
                expected: expected.into(),
                got: got.into(),
            }
        }
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
