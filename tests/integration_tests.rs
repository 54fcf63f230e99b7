//! Integration tests for bytetrack-rs.
//!
//! These tests drive complete tracking workflows across multiple modules.

use approx::assert_relative_eq;
use nalgebra::DMatrix;

use bytetrack_rs::matching::{iou, linear_assignment, non_max_suppression};
use bytetrack_rs::{
    cholesky_factor, cholesky_solve, linear_sum_assignment, ByteTracker, Detections, Error,
    KalmanBoxFilter, TrackerConfig,
};

fn frame(boxes: &[[f64; 4]], confidence: &[f64]) -> Detections {
    Detections::from_boxes(boxes)
        .with_confidence(confidence.to_vec())
        .expect("valid detections")
}

fn moving_box(start: [f64; 4], vx: f64, vy: f64, t: usize) -> [f64; 4] {
    let (dx, dy) = (vx * t as f64, vy * t as f64);
    [start[0] + dx, start[1] + dy, start[2] + dx, start[3] + dy]
}

// =============================================================================
// Test 1: Complete Tracking Pipeline
// =============================================================================

#[test]
fn test_integration_complete_tracking_pipeline() {
    let mut tracker = ByteTracker::new(TrackerConfig::default()).expect("valid config");

    // One static object, one moving diagonally
    for t in 0..30 {
        let still = [100.0, 100.0, 160.0, 220.0];
        let moving = moving_box([400.0, 300.0, 440.0, 380.0], 3.0, 1.5, t);

        let out = tracker.update(&frame(&[still, moving], &[0.92, 0.85])).unwrap();

        assert_eq!(out.len(), 2, "frame {}", t);
        assert_eq!(out.tracker_id().unwrap(), &[1, 2], "frame {}", t);
    }

    assert_eq!(tracker.frame_id(), 30);
    assert_eq!(tracker.tracked_tracks().len(), 2);
    assert!(tracker.lost_tracks().is_empty());
    assert!(tracker.tracked_tracks().iter().all(|t| t.is_confirmed()));

    // Velocity of the moving track is learned
    let moving = tracker.tracked_tracks().iter().find(|t| t.id == 2).unwrap();
    assert_relative_eq!(moving.mean()[4], 3.0, epsilon = 0.3);
    assert_relative_eq!(moving.mean()[5], 1.5, epsilon = 0.3);
}

// =============================================================================
// Test 2: Occlusion and Re-identification by Motion
// =============================================================================

#[test]
fn test_integration_occlusion_recovery() {
    let mut tracker = ByteTracker::new(TrackerConfig::default()).unwrap();
    let object = [200.0, 200.0, 260.0, 320.0];
    let other = [600.0, 50.0, 650.0, 150.0];

    for _ in 0..5 {
        tracker.update(&frame(&[object, other], &[0.9, 0.9])).unwrap();
    }

    // Object hidden for 10 frames
    for _ in 0..10 {
        let out = tracker.update(&frame(&[other], &[0.9])).unwrap();
        assert_eq!(out.tracker_id().unwrap(), &[2]);
    }
    assert_eq!(tracker.lost_tracks().len(), 1);

    let out = tracker.update(&frame(&[object, other], &[0.9, 0.9])).unwrap();
    assert_eq!(out.tracker_id().unwrap(), &[1, 2]);
    assert!(tracker.lost_tracks().is_empty());
}

// =============================================================================
// Test 3: Track Expiry
// =============================================================================

#[test]
fn test_integration_track_expiry_and_new_id() {
    let config = TrackerConfig::default().with_lost_track_buffer(5);
    let mut tracker = ByteTracker::new(config).unwrap();
    let object = [10.0, 10.0, 60.0, 110.0];

    for _ in 0..4 {
        tracker.update(&frame(&[object], &[0.9])).unwrap();
    }
    for _ in 0..10 {
        tracker.update(&Detections::empty()).unwrap();
    }

    // Empty frames do not age lost tracks, so the track is still held
    assert_eq!(tracker.lost_tracks().len(), 1);

    let far = [500.0, 500.0, 550.0, 600.0];
    for _ in 0..6 {
        tracker.update(&frame(&[far], &[0.9])).unwrap();
    }
    assert!(tracker.lost_tracks().is_empty());

    // The original object comes back as a new identity
    let out = tracker.update(&frame(&[object, far], &[0.9, 0.9])).unwrap();
    assert_eq!(out.tracker_id().unwrap(), &[3, 2]);
}

// =============================================================================
// Test 4: Confidence Handling
// =============================================================================

#[test]
fn test_integration_confidence_partitioning() {
    let mut tracker = ByteTracker::new(TrackerConfig::default()).unwrap();
    let boxes = [
        [0.0, 0.0, 50.0, 50.0],
        [100.0, 0.0, 150.0, 50.0],
        [200.0, 0.0, 250.0, 50.0],
    ];

    // Only the high-confidence box spawns
    let out = tracker.update(&frame(&boxes, &[0.9, 0.2, 0.05])).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.get(0).unwrap().xyxy, boxes[0]);
    assert_eq!(tracker.tracked_tracks().len(), 1);

    // Activation threshold is configurable
    let config = TrackerConfig::default().with_activation_threshold(0.1);
    let mut permissive = ByteTracker::new(config).unwrap();
    let out = permissive.update(&frame(&boxes, &[0.9, 0.2, 0.05])).unwrap();
    assert_eq!(out.tracker_id().unwrap(), &[1, 2]);
}

#[test]
fn test_integration_nms_before_tracking() {
    let dets = frame(
        &[
            [0.0, 0.0, 100.0, 100.0],
            [2.0, 2.0, 102.0, 102.0],
            [300.0, 300.0, 350.0, 350.0],
        ],
        &[0.6, 0.9, 0.8],
    )
    .with_nms(0.5)
    .unwrap();
    assert_eq!(dets.len(), 2);

    let mut tracker = ByteTracker::new(TrackerConfig::default()).unwrap();
    let out = tracker.update(&dets).unwrap();
    assert_eq!(out.confidence().unwrap(), &[0.9, 0.8]);
    assert_eq!(out.tracker_id().unwrap(), &[1, 2]);
}

// =============================================================================
// Test 5: Numeric Building Blocks Together
// =============================================================================

#[test]
fn test_integration_iou_cost_assignment() {
    let tracks = [[0.0, 0.0, 10.0, 10.0], [20.0, 20.0, 30.0, 30.0]];
    let dets = [
        [21.0, 21.0, 31.0, 31.0],
        [100.0, 100.0, 110.0, 110.0],
        [1.0, 0.0, 11.0, 10.0],
    ];
    let cost = DMatrix::from_fn(2, 3, |i, j| 1.0 - iou(&tracks[i], &dets[j]));

    let result = linear_assignment(&cost, 0.5).unwrap();
    let pairs: Vec<(usize, usize)> = result
        .assignments
        .iter()
        .map(|a| (a.row_idx, a.col_idx))
        .collect();
    assert_eq!(pairs, vec![(0, 2), (1, 0)]);
    assert!(result.unmatched_rows.is_empty());
    assert_eq!(result.unmatched_cols, vec![1]);
}

#[test]
fn test_integration_assignment_concrete() {
    let cost = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 3.0, 2.0, 0.0, 5.0, 3.0, 2.0, 2.0]);

    let min = linear_sum_assignment(&cost, false).unwrap();
    assert_relative_eq!(min.total_cost(&cost), 5.0);

    let max = linear_sum_assignment(&cost, true).unwrap();
    assert_relative_eq!(max.total_cost(&cost), 11.0);

    let bad = DMatrix::from_row_slice(1, 2, &[f64::NAN, 1.0]);
    assert!(matches!(
        linear_sum_assignment(&bad, false),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_integration_cholesky_solve() {
    let a = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 3.0]);
    let b = DMatrix::from_row_slice(2, 1, &[8.0, 7.0]);

    for lower in [true, false] {
        let chol = cholesky_factor(&a, lower).unwrap();
        let x = cholesky_solve(&chol, &b).unwrap();
        let ax = &a * &x;
        assert_relative_eq!(ax[(0, 0)], 8.0, epsilon = 1e-12);
        assert_relative_eq!(ax[(1, 0)], 7.0, epsilon = 1e-12);
    }
}

#[test]
fn test_integration_kalman_through_track_gap() {
    let kf = KalmanBoxFilter::new();
    let mut state = kf.initiate(&[100.0, 100.0, 0.5, 80.0]).unwrap();
    for t in 1..=10 {
        state = kf.predict(&state);
        state = kf
            .update(&state, &[100.0 + 4.0 * t as f64, 100.0, 0.5, 80.0])
            .unwrap();
    }

    // Coast through 5 frames without measurements
    for _ in 0..5 {
        state = kf.predict(&state);
    }
    assert_relative_eq!(state.mean[0], 160.0, epsilon = 3.0);
}

#[test]
fn test_integration_nms_mask() {
    let boxes = DMatrix::from_row_slice(
        3,
        4,
        &[0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 10.0, 10.0, 20.0, 20.0, 30.0, 30.0],
    );
    // Equal confidence: the earlier box wins
    let keep = non_max_suppression(&boxes, &[0.5, 0.5, 0.5], 0.5).unwrap();
    assert_eq!(keep, vec![true, false, true]);
}
