//! Tracks and their lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::{GaussianState, KalmanBoxFilter};
use crate::utils::{xyah_to_tlwh, xyah_to_xyxy, xyxy_to_xyah};
use crate::Result;

/// Total hits (including the detection that spawned the track) after which a
/// tentative track is confirmed.
pub const CONFIRMATION_HITS: u32 = 3;

/// Lifecycle state of a track.
///
/// `Tentative -> Confirmed -> Deleted`, or `Tentative -> Deleted` directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackState::Tentative => "tentative",
            TrackState::Confirmed => "confirmed",
            TrackState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Issues track ids `1, 2, 3, ...` for one tracker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdAllocator {
    last_id: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused id.
    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Number of ids issued since creation or the last reset.
    pub fn issued(&self) -> u64 {
        self.last_id
    }

    /// Start again from id 1.
    pub fn reset(&mut self) {
        self.last_id = 0;
    }
}

/// A single tracked object.
#[derive(Clone, Debug)]
pub struct Track {
    /// Unique id within the owning tracker.
    pub id: u64,

    pub state: TrackState,

    /// Successful updates, counting the spawning detection.
    pub hits: u32,

    /// Frames since the last successful update.
    pub time_since_update: u32,

    /// Confidence of the last associated detection.
    pub score: f64,

    /// Box of the last associated detection.
    pub last_xyxy: [f64; 4],

    /// Kalman state over `[cx, cy, aspect, h]` and velocities.
    motion: GaussianState,
}

impl Track {
    /// Spawn a tentative track from a detection.
    pub fn new(id: u64, xyxy: [f64; 4], score: f64, filter: &KalmanBoxFilter) -> Result<Self> {
        let motion = filter.initiate(&xyxy_to_xyah(&xyxy))?;
        Ok(Self {
            id,
            state: TrackState::Tentative,
            hits: 1,
            time_since_update: 0,
            score,
            last_xyxy: xyxy,
            motion,
        })
    }

    /// Advance the motion state by one frame.
    pub fn predict(&mut self, filter: &KalmanBoxFilter) {
        if self.is_deleted() {
            return;
        }
        self.motion = filter.predict(&self.motion);
        self.time_since_update += 1;
    }

    /// Correct the motion state with an associated detection.
    pub fn update(&mut self, filter: &KalmanBoxFilter, xyxy: [f64; 4], score: f64) -> Result<()> {
        self.motion = filter.update(&self.motion, &xyxy_to_xyah(&xyxy))?;
        self.time_since_update = 0;
        self.hits += 1;
        self.score = score;
        self.last_xyxy = xyxy;

        if self.state == TrackState::Tentative && self.hits >= CONFIRMATION_HITS {
            self.state = TrackState::Confirmed;
        }
        Ok(())
    }

    /// Record a frame without an associated detection.
    ///
    /// Tentative tracks are deleted at once; confirmed tracks once they have
    /// gone more than `lost_track_buffer` frames without an update.
    pub fn mark_missed(&mut self, lost_track_buffer: u32) {
        match self.state {
            TrackState::Tentative => self.state = TrackState::Deleted,
            TrackState::Confirmed if self.time_since_update > lost_track_buffer => {
                self.state = TrackState::Deleted
            }
            _ => {}
        }
    }

    /// Force a track into the confirmed state (re-activation of a lost track).
    pub fn confirm(&mut self) {
        if self.state != TrackState::Deleted {
            self.state = TrackState::Confirmed;
        }
    }

    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    pub fn mean(&self) -> &nalgebra::DVector<f64> {
        &self.motion.mean
    }

    pub fn covariance(&self) -> &nalgebra::DMatrix<f64> {
        &self.motion.covariance
    }

    /// Estimated box as `[cx, cy, aspect, h]`.
    pub fn xyah(&self) -> [f64; 4] {
        self.motion.xyah()
    }

    /// Estimated box as `[x, y, w, h]` (top-left corner).
    pub fn tlwh(&self) -> [f64; 4] {
        xyah_to_tlwh(&self.xyah())
    }

    /// Estimated box as `[x1, y1, x2, y2]`.
    pub fn xyxy(&self) -> [f64; 4] {
        xyah_to_xyxy(&self.xyah())
    }
}
