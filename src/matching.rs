//! Detection-to-track matching: IoU costs, score fusion, thresholded
//! assignment and non-max suppression.
//!
//! Box sets are `(n, 4)` matrices in `[x1, y1, x2, y2]` form.

use nalgebra::DMatrix;

use crate::internal::scipy::{linear_sum_assignment, Assignment, AssignmentResult};
use crate::{Error, Result};

/// Added to the threshold when clamping over-threshold costs.
const CLAMP_EPS: f64 = 1e-4;

/// Check if a matrix contains NaN values.
pub(crate) fn has_nan(matrix: &DMatrix<f64>) -> bool {
    matrix.iter().any(|&x| x.is_nan())
}

fn validate_boxes(boxes: &DMatrix<f64>) -> Result<()> {
    if boxes.ncols() != 4 {
        return Err(Error::shape(
            "(n, 4) boxes [x1, y1, x2, y2]",
            format!("({}, {})", boxes.nrows(), boxes.ncols()),
        ));
    }
    Ok(())
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes.
///
/// Returns 0 when the boxes do not overlap. Two zero-area boxes have an empty
/// union; callers must not pass those.
pub fn iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter_w = a[2].min(b[2]) - a[0].max(b[0]);
    if inter_w <= 0.0 {
        return 0.0;
    }
    let inter_h = a[3].min(b[3]) - a[1].max(b[1]);
    if inter_h <= 0.0 {
        return 0.0;
    }

    let inter = inter_w * inter_h;
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

fn row_box(boxes: &DMatrix<f64>, i: usize) -> [f64; 4] {
    [boxes[(i, 0)], boxes[(i, 1)], boxes[(i, 2)], boxes[(i, 3)]]
}

/// Pairwise IoU matrix of shape `(n, m)`.
pub fn iou_batch(boxes_a: &DMatrix<f64>, boxes_b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    validate_boxes(boxes_a)?;
    validate_boxes(boxes_b)?;

    let n = boxes_a.nrows();
    let m = boxes_b.nrows();
    let a: Vec<[f64; 4]> = (0..n).map(|i| row_box(boxes_a, i)).collect();
    let b: Vec<[f64; 4]> = (0..m).map(|j| row_box(boxes_b, j)).collect();

    Ok(DMatrix::from_fn(n, m, |i, j| iou(&a[i], &b[j])))
}

/// IoU distance (`1 - IoU`) matrix of shape `(n, m)`. Lower is better.
pub fn iou_distance(boxes_a: &DMatrix<f64>, boxes_b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    Ok(iou_batch(boxes_a, boxes_b)?.map(|x| 1.0 - x))
}

/// Fuse a distance matrix with per-column detection confidence.
///
/// Each entry becomes `distance * (2 - confidence[col])`, so low-confidence
/// detections are more expensive to match.
pub fn fuse_score(distances: &DMatrix<f64>, confidences: &[f64]) -> Result<DMatrix<f64>> {
    if confidences.len() != distances.ncols() {
        return Err(Error::shape(
            format!("{} confidences", distances.ncols()),
            format!("{} confidences", confidences.len()),
        ));
    }

    let mut fused = distances.clone();
    for (j, &conf) in confidences.iter().enumerate() {
        fused.column_mut(j).iter_mut().for_each(|d| *d *= 2.0 - conf);
    }
    Ok(fused)
}

/// Minimum-cost assignment that rejects pairs costing more than `threshold`.
///
/// Entries above the threshold are clamped to just over it before solving, so
/// they are discouraged but do not make the problem infeasible. Returned pairs
/// whose original cost exceeds the threshold are reported as unmatched.
pub fn linear_assignment(cost_matrix: &DMatrix<f64>, threshold: f64) -> Result<AssignmentResult> {
    let (num_rows, num_cols) = cost_matrix.shape();
    if num_rows == 0 || num_cols == 0 {
        return Ok(AssignmentResult::unmatched(num_rows, num_cols));
    }
    if has_nan(cost_matrix) {
        return Err(Error::InvalidInput(
            "Distance matrix contains NaN values".to_string(),
        ));
    }

    let ceiling = threshold + CLAMP_EPS;
    let clamped = cost_matrix.map(|x| if x > threshold { ceiling } else { x });

    let solved = linear_sum_assignment(&clamped, false)?;

    let assignments: Vec<Assignment> = solved
        .assignments
        .into_iter()
        .filter(|a| cost_matrix[(a.row_idx, a.col_idx)] <= threshold)
        .collect();

    Ok(AssignmentResult::from_pairs(assignments, num_rows, num_cols))
}

/// Greedy non-max suppression.
///
/// Visits boxes by descending confidence (stable for ties, so the earlier box
/// wins) and suppresses every later box whose IoU with a kept box exceeds
/// `threshold`. Returns a keep mask aligned with the input rows.
pub fn non_max_suppression(
    boxes: &DMatrix<f64>,
    confidences: &[f64],
    threshold: f64,
) -> Result<Vec<bool>> {
    validate_boxes(boxes)?;
    let n = boxes.nrows();
    if confidences.len() != n {
        return Err(Error::shape(
            format!("{} confidences", n),
            format!("{} confidences", confidences.len()),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    // slice::sort_by is stable
    order.sort_by(|&a, &b| {
        confidences[b]
            .partial_cmp(&confidences[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let rows: Vec<[f64; 4]> = (0..n).map(|i| row_box(boxes, i)).collect();
    let mut keep = vec![false; n];
    let mut suppressed = vec![false; n];

    for (pos, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep[i] = true;
        for &j in &order[pos + 1..] {
            if !suppressed[j] && iou(&rows[i], &rows[j]) > threshold {
                suppressed[j] = true;
            }
        }
    }

    Ok(keep)
}
