//! ByteTrack-style multi-object tracker.
//!
//! Each call to [`ByteTracker::update`] runs one frame of the association
//! cascade: confirmed tracks are matched first, then lost tracks, then
//! tentative tracks, and whatever high-confidence detections remain spawn new
//! tracks.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::filter::KalmanBoxFilter;
use crate::matching::{fuse_score, iou, iou_distance, linear_assignment};
use crate::track::{IdAllocator, Track};
use crate::{AssignmentResult, Detections, Error, Result};

/// Detections below this confidence are discarded outright.
pub const LOW_CONFIDENCE_FLOOR: f64 = 0.1;

/// Cost threshold for matching tentative tracks.
pub const TENTATIVE_MATCH_THRESHOLD: f64 = 0.7;

/// Minimum IoU between an input detection and a track for the detection to
/// appear in the output.
pub const OUTPUT_IOU_THRESHOLD: f64 = 0.3;

/// Configuration for the tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this confidence are "high" and may spawn tracks.
    pub activation_threshold: f64,

    /// Minimum IoU for a match; the cost threshold is `1 - matching_threshold`.
    pub matching_threshold: f64,

    /// Frames a confirmed track may go unmatched before it is deleted.
    pub lost_track_buffer: u32,

    /// Frame rate of the source. Informational only.
    pub frame_rate: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 0.25,
            matching_threshold: 0.8,
            lost_track_buffer: 30,
            frame_rate: 30,
        }
    }
}

impl TrackerConfig {
    pub fn with_activation_threshold(mut self, threshold: f64) -> Self {
        self.activation_threshold = threshold;
        self
    }

    pub fn with_matching_threshold(mut self, threshold: f64) -> Self {
        self.matching_threshold = threshold;
        self
    }

    pub fn with_lost_track_buffer(mut self, frames: u32) -> Self {
        self.lost_track_buffer = frames;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Check that thresholds lie in `[0, 1]` and the frame rate is positive.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("activation_threshold", self.activation_threshold),
            ("matching_threshold", self.matching_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.frame_rate == 0 {
            return Err(Error::InvalidConfig(
                "frame_rate must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Multi-object tracker.
///
/// Owns two disjoint pools of tracks: `tracked` (tentative or confirmed,
/// matched recently) and `lost` (confirmed but currently unmatched, eligible
/// for re-activation).
#[derive(Clone, Debug)]
pub struct ByteTracker {
    config: TrackerConfig,
    tracked: Vec<Track>,
    lost: Vec<Track>,
    frame_id: u64,
    ids: IdAllocator,
    filter: KalmanBoxFilter,
}

impl ByteTracker {
    /// Create a new tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            tracked: Vec::new(),
            lost: Vec::new(),
            frame_id: 0,
            ids: IdAllocator::new(),
            filter: KalmanBoxFilter::new(),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Number of frames processed since creation or the last reset.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn tracked_tracks(&self) -> &[Track] {
        &self.tracked
    }

    pub fn lost_tracks(&self) -> &[Track] {
        &self.lost
    }

    /// Clear all tracks and the frame counter; ids start again from 1.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.lost.clear();
        self.frame_id = 0;
        self.ids.reset();
    }

    /// Process one frame of detections.
    ///
    /// Returns the input detections that could be attributed to a live track,
    /// in input order, with `tracker_id` filled in.
    ///
    /// Any error aborts the frame and leaves the tracker exactly as it was:
    /// the frame counter, track ages and ids are only committed on success.
    ///
    /// # Errors
    /// - `Error::InvalidInput` for non-finite boxes or confidences, or boxes
    ///   with non-positive height (see [`Detections::validate`])
    pub fn update(&mut self, detections: &Detections) -> Result<Detections> {
        detections.validate()?;

        let mut staged = self.clone();
        let output = staged.step(detections)?;
        *self = staged;
        Ok(output)
    }

    fn step(&mut self, detections: &Detections) -> Result<Detections> {
        self.frame_id += 1;

        if detections.is_empty() {
            self.retire_unmatched(&vec![false; self.tracked.len()]);
            self.remove_deleted();
            trace!(frame_id = self.frame_id, "empty frame");
            return self.associate_output(detections);
        }

        // Partition by confidence
        let mut high = Vec::new();
        let mut low_count = 0usize;
        for i in 0..detections.len() {
            let confidence = detections.confidence_at(i);
            if confidence >= self.config.activation_threshold {
                high.push(i);
            } else if confidence >= LOW_CONFIDENCE_FLOOR {
                // Low-confidence detections only count as "do not spawn"
                low_count += 1;
            }
        }

        for track in self.tracked.iter_mut().chain(self.lost.iter_mut()) {
            track.predict(&self.filter);
        }

        let match_threshold = 1.0 - self.config.matching_threshold;
        let mut matched = vec![false; self.tracked.len()];

        // Stage 1: confirmed tracks against high-confidence detections
        let confirmed: Vec<usize> = (0..self.tracked.len())
            .filter(|&i| self.tracked[i].is_confirmed())
            .collect();
        let remaining = self.match_pool(
            &confirmed,
            Pool::Tracked,
            detections,
            &high,
            match_threshold,
            &mut matched,
        )?;

        // Stage 2: lost tracks against what is left
        let lost_indices: Vec<usize> = (0..self.lost.len()).collect();
        let mut refound = vec![false; self.lost.len()];
        let remaining = self.match_pool(
            &lost_indices,
            Pool::Lost,
            detections,
            &remaining,
            match_threshold,
            &mut refound,
        )?;

        // Stage 3: tentative tracks with a looser threshold
        let tentative: Vec<usize> = (0..self.tracked.len())
            .filter(|&i| self.tracked[i].is_tentative())
            .collect();
        let remaining = self.match_pool(
            &tentative,
            Pool::Tracked,
            detections,
            &remaining,
            TENTATIVE_MATCH_THRESHOLD,
            &mut matched,
        )?;

        self.retire_unmatched(&matched);
        self.reactivate(&refound);

        for &det in &remaining {
            let id = self.ids.next_id();
            let track = Track::new(
                id,
                detections.box_at(det),
                detections.confidence_at(det),
                &self.filter,
            )?;
            debug!(track_id = id, frame_id = self.frame_id, "spawned track");
            self.tracked.push(track);
        }

        self.remove_deleted();

        trace!(
            frame_id = self.frame_id,
            high = high.len(),
            low = low_count,
            tracked = self.tracked.len(),
            lost = self.lost.len(),
            "frame processed"
        );

        self.associate_output(detections)
    }

    /// Match `track_indices` of one pool against `det_indices` and update
    /// matched tracks. Matched tracks are flagged in `matched`; the unmatched
    /// detection indices are returned in their original order.
    fn match_pool(
        &mut self,
        track_indices: &[usize],
        pool: Pool,
        detections: &Detections,
        det_indices: &[usize],
        threshold: f64,
        matched: &mut [bool],
    ) -> Result<Vec<usize>> {
        if track_indices.is_empty() || det_indices.is_empty() {
            return Ok(det_indices.to_vec());
        }

        let tracks = match pool {
            Pool::Tracked => &self.tracked,
            Pool::Lost => &self.lost,
        };
        let track_boxes: Vec<[f64; 4]> = track_indices.iter().map(|&i| tracks[i].xyxy()).collect();
        let cost = fused_cost(&track_boxes, detections, det_indices)?;
        let AssignmentResult {
            assignments,
            unmatched_cols,
            ..
        } = linear_assignment(&cost, threshold)?;

        let tracks = match pool {
            Pool::Tracked => &mut self.tracked,
            Pool::Lost => &mut self.lost,
        };
        for a in &assignments {
            let t = track_indices[a.row_idx];
            let d = det_indices[a.col_idx];
            tracks[t].update(&self.filter, detections.box_at(d), detections.confidence_at(d))?;
            matched[t] = true;
        }

        Ok(unmatched_cols.iter().map(|&j| det_indices[j]).collect())
    }

    /// Mark every tracked track not flagged in `matched` as missed and move
    /// the survivors into the lost pool.
    fn retire_unmatched(&mut self, matched: &[bool]) {
        let tracked = std::mem::take(&mut self.tracked);
        for (mut track, &hit) in tracked.into_iter().zip(matched) {
            if hit {
                self.tracked.push(track);
                continue;
            }
            track.mark_missed(self.config.lost_track_buffer);
            if track.is_deleted() {
                debug!(track_id = track.id, frame_id = self.frame_id, "removed track");
            } else {
                debug!(track_id = track.id, frame_id = self.frame_id, "lost track");
                self.lost.push(track);
            }
        }
    }

    /// Move refound lost tracks back into the tracked pool as confirmed;
    /// the rest are marked missed.
    fn reactivate(&mut self, refound: &[bool]) {
        // Tracks lost in this very frame were appended after `refound` was sized
        let lost = std::mem::take(&mut self.lost);
        for (i, mut track) in lost.into_iter().enumerate() {
            match refound.get(i) {
                Some(true) => {
                    track.confirm();
                    debug!(track_id = track.id, frame_id = self.frame_id, "refound track");
                    self.tracked.push(track);
                }
                Some(false) => {
                    track.mark_missed(self.config.lost_track_buffer);
                    self.lost.push(track);
                }
                None => self.lost.push(track),
            }
        }
    }

    fn remove_deleted(&mut self) {
        let frame_id = self.frame_id;
        self.tracked.retain(|t| !t.is_deleted());
        self.lost.retain(|t| {
            if t.is_deleted() {
                debug!(track_id = t.id, frame_id, "removed track");
            }
            !t.is_deleted()
        });
    }

    /// Attach to each input detection the id of the live track it overlaps
    /// most, dropping detections whose best IoU is not above
    /// [`OUTPUT_IOU_THRESHOLD`].
    fn associate_output(&self, detections: &Detections) -> Result<Detections> {
        let candidates: Vec<(u64, [f64; 4])> = self
            .tracked
            .iter()
            .chain(self.lost.iter())
            .filter(|t| !t.is_deleted())
            .map(|t| (t.id, t.xyxy()))
            .collect();

        let mut keep = Vec::new();
        let mut ids = Vec::new();
        for i in 0..detections.len() {
            let det_box = detections.box_at(i);
            let mut best: Option<(u64, f64)> = None;
            for (id, track_box) in &candidates {
                let overlap = iou(&det_box, track_box);
                if best.map_or(true, |(_, b)| overlap > b) {
                    best = Some((*id, overlap));
                }
            }
            if let Some((id, overlap)) = best {
                if overlap > OUTPUT_IOU_THRESHOLD {
                    keep.push(i);
                    ids.push(id);
                }
            }
        }

        detections.select(&keep)?.with_tracker_id(ids)
    }
}

#[derive(Clone, Copy, Debug)]
enum Pool {
    Tracked,
    Lost,
}

/// IoU distance between tracks (rows) and the selected detections (columns),
/// fused with detection confidence.
fn fused_cost(
    track_boxes: &[[f64; 4]],
    detections: &Detections,
    det_indices: &[usize],
) -> Result<DMatrix<f64>> {
    let det_boxes: Vec<[f64; 4]> = det_indices.iter().map(|&i| detections.box_at(i)).collect();
    let confidences: Vec<f64> = det_indices
        .iter()
        .map(|&i| detections.confidence_at(i))
        .collect();

    let distances = iou_distance(&boxes_matrix(track_boxes), &boxes_matrix(&det_boxes))?;
    fuse_score(&distances, &confidences)
}

fn boxes_matrix(boxes: &[[f64; 4]]) -> DMatrix<f64> {
    DMatrix::from_fn(boxes.len(), 4, |i, j| boxes[i][j])
}
